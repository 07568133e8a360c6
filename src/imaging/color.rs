//! CSS-style color strings.
//!
//! Draw styles carry colors as strings so that building a pipeline never
//! fails; they are parsed here when the draw stage actually runs.
//!
//! Accepted forms:
//! - `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`
//! - `rgb(r, g, b)` and `rgba(r, g, b, a)` with `a` in `[0, 1]`
//! - a named color (`red`, `green`, `transparent`, ...)

use super::ImagingError;
use image::Rgba;

/// Named colors understood by [`parse_color`]. CSS level 1 plus a few common extras.
const NAMED_COLORS: &[(&str, [u8; 4])] = &[
    ("black", [0, 0, 0, 255]),
    ("silver", [192, 192, 192, 255]),
    ("gray", [128, 128, 128, 255]),
    ("grey", [128, 128, 128, 255]),
    ("white", [255, 255, 255, 255]),
    ("maroon", [128, 0, 0, 255]),
    ("red", [255, 0, 0, 255]),
    ("purple", [128, 0, 128, 255]),
    ("fuchsia", [255, 0, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
    ("green", [0, 128, 0, 255]),
    ("lime", [0, 255, 0, 255]),
    ("olive", [128, 128, 0, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("navy", [0, 0, 128, 255]),
    ("blue", [0, 0, 255, 255]),
    ("teal", [0, 128, 128, 255]),
    ("aqua", [0, 255, 255, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("orange", [255, 165, 0, 255]),
    ("pink", [255, 192, 203, 255]),
    ("brown", [165, 42, 42, 255]),
    ("gold", [255, 215, 0, 255]),
    ("transparent", [0, 0, 0, 0]),
];

/// Parse a CSS color string into straight-alpha RGBA.
pub fn parse_color(input: &str) -> Result<Rgba<u8>, ImagingError> {
    let s = input.trim().to_ascii_lowercase();
    let invalid = || ImagingError::InvalidColor(input.to_string());

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(invalid);
    }

    if let Some(args) = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_args(args).ok_or_else(invalid);
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, rgba)| Rgba(*rgba))
        .ok_or_else(invalid)
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |s: &str| -> Option<u8> {
        let v: f32 = s.parse().ok()?;
        v.is_finite().then(|| v.round().clamp(0.0, 255.0) as u8)
    };

    let alpha = match parts.get(3) {
        Some(a) => {
            let v: f32 = a.parse().ok()?;
            if !v.is_finite() {
                return None;
            }
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };

    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_colors() {
        assert_eq!(parse_color("red").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_color("green").unwrap(), Rgba([0, 128, 0, 255]));
        assert_eq!(parse_color(" White ").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("transparent").unwrap(), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn hex_forms() {
        assert_eq!(parse_color("#f00").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_color("#00ff0080").unwrap(), Rgba([0, 255, 0, 128]));
        assert_eq!(parse_color("#1a2B3c").unwrap(), Rgba([0x1a, 0x2b, 0x3c, 255]));
    }

    #[test]
    fn rgb_functions() {
        assert_eq!(parse_color("rgb(1, 2, 3)").unwrap(), Rgba([1, 2, 3, 255]));
        assert_eq!(
            parse_color("rgba(10,20,30,0.5)").unwrap(),
            Rgba([10, 20, 30, 128])
        );
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "#12", "#ggg", "rgb(1,2)", "rgba(1,2,3,x)", "chartreuse-ish"] {
            assert!(
                matches!(parse_color(bad), Err(ImagingError::InvalidColor(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }
}
