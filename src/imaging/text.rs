//! Text rendering through `usvg` layout and `resvg` rasterization.
//!
//! The text is wrapped in a one-element SVG document sized to the surface,
//! with the anchor at the left end of the baseline. Rotation is applied as a
//! render transform about the anchor, so the optional background box turns
//! with the glyphs.

use super::draw::{DrawDefaults, paint_on, sk_paint};
use super::{FontSize, ImagingError, Surface, TextStyle, parse_color};
use resvg::tiny_skia::{FillRule, PathBuilder, Rect, Transform};
use std::sync::{Arc, LazyLock};

/// System fonts, loaded once per process.
static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "loaded system fonts");
    Arc::new(db)
});

/// A parsed CSS `font` shorthand.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub style: String,
    pub weight: String,
    pub size: FontSize,
    pub family: String,
}

impl FontSpec {
    /// Parse `[style] [variant] [weight] size[/line-height] family`.
    ///
    /// Sizes may be `px`, `pt`, `em` (16px base), `%` of the surface height,
    /// or a bare number of pixels.
    pub fn parse(shorthand: &str) -> Result<Self, ImagingError> {
        let invalid = || ImagingError::InvalidFont(shorthand.to_string());
        let mut style = "normal".to_string();
        let mut weight = "normal".to_string();
        let mut tokens = shorthand.split_whitespace();

        let size = loop {
            let token = tokens.next().ok_or_else(invalid)?;
            match token.to_ascii_lowercase().as_str() {
                "italic" | "oblique" => style = token.to_ascii_lowercase(),
                "bold" | "bolder" | "lighter" => weight = token.to_ascii_lowercase(),
                "normal" | "small-caps" => {}
                t if t.len() == 3 && t.ends_with("00") && t.parse::<u16>().is_ok() => {
                    weight = t.to_string();
                }
                _ => break parse_size(token).ok_or_else(invalid)?,
            }
        };

        let family = tokens.collect::<Vec<_>>().join(" ");
        if family.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            style,
            weight,
            size,
            family,
        })
    }
}

fn parse_size(token: &str) -> Option<FontSize> {
    let token = token.split('/').next()?;
    if let Some(pt) = token.strip_suffix("pt") {
        let v: f32 = pt.parse().ok()?;
        return (v.is_finite() && v > 0.0).then(|| FontSize::Px(v * 4.0 / 3.0));
    }
    if let Some(em) = token.strip_suffix("em") {
        let v: f32 = em.parse().ok()?;
        return (v.is_finite() && v > 0.0).then(|| FontSize::Px(v * 16.0));
    }
    FontSize::parse(token)
}

/// Render `text` with its baseline starting at `xy`.
///
/// Empty text leaves the surface untouched. If no installed font can shape
/// the text, nothing is drawn.
pub fn draw_text(
    surface: Surface,
    xy: [f64; 2],
    text: &str,
    style: &TextStyle,
    defaults: &DrawDefaults,
) -> Result<Surface, ImagingError> {
    let font = FontSpec::parse(style.font.as_deref().unwrap_or(&defaults.font))?;
    let size = style.font_size.unwrap_or(font.size).to_px(surface.height());
    if !size.is_finite() || size <= 0.0 {
        return Err(ImagingError::InvalidFont(format!("font size {size}")));
    }
    let color = parse_color(style.fill.as_deref().unwrap_or(&defaults.text_fill))?;
    let [x, y] = xy;
    if !x.is_finite() || !y.is_finite() {
        return Err(ImagingError::InvalidPoints(format!("text anchor ({x},{y})")));
    }
    let angle = style.angle.unwrap_or(0.0);
    if !angle.is_finite() {
        return Err(ImagingError::InvalidDimensions(format!("text angle {angle}")));
    }
    let background = match style.fill_padding {
        Some(padding) if !padding.is_finite() || padding < 0.0 => {
            return Err(ImagingError::InvalidDimensions(format!(
                "fill padding must be non-negative, got {padding}"
            )));
        }
        Some(padding) => Some((
            padding,
            sk_paint(style.background.as_deref().unwrap_or("white"))?,
        )),
        None => None,
    };

    if text.is_empty() {
        return Ok(surface);
    }

    let (w, h) = surface.dimensions();
    let svg = format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" "#,
            r#"viewBox="0 0 {w} {h}"><text x="0" y="0" xml:space="preserve" "#,
            r#"font-family="{family}" font-size="{size}" font-style="{fstyle}" "#,
            r#"font-weight="{weight}" fill="rgb({r},{g},{b})" fill-opacity="{opacity}">"#,
            r#"{content}</text></svg>"#,
        ),
        w = w,
        h = h,
        size = size,
        family = escape_xml(&font.family),
        fstyle = font.style,
        weight = font.weight,
        r = color[0],
        g = color[1],
        b = color[2],
        opacity = color[3] as f32 / 255.0,
        content = escape_xml(text),
    );

    let options = usvg::Options {
        fontdb: FONTS.clone(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &options)
        .map_err(|e| ImagingError::InvalidFont(format!("{}: {e}", font.family)))?;

    if !tree.root().has_children() {
        tracing::warn!(family = %font.family, "no installed font shaped the text, nothing drawn");
    }

    let transform = Transform::from_translate(x as f32, y as f32).pre_rotate(angle);

    let backdrop = background.and_then(|(padding, paint)| {
        if !tree.root().has_children() {
            return None;
        }
        let bounds = tree.root().abs_bounding_box();
        let rect = Rect::from_ltrb(
            bounds.left() - padding,
            bounds.top() - padding,
            bounds.right() + padding,
            bounds.bottom() + padding,
        )?;
        Some((PathBuilder::from_rect(rect), paint))
    });

    paint_on(surface, |pixmap| {
        if let Some((path, paint)) = &backdrop {
            pixmap.fill_path(path, paint, FillRule::Winding, transform, None);
        }
        resvg::render(&tree, transform, &mut pixmap.as_mut());
    })
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::solid_surface;

    #[test]
    fn parse_plain_shorthand() {
        let f = FontSpec::parse("16px sans-serif").unwrap();
        assert_eq!(f.size, FontSize::Px(16.0));
        assert_eq!(f.family, "sans-serif");
        assert_eq!(f.style, "normal");
        assert_eq!(f.weight, "normal");
    }

    #[test]
    fn parse_full_shorthand() {
        let f = FontSpec::parse("italic bold 24px/1.5 Open Sans, serif").unwrap();
        assert_eq!(f.style, "italic");
        assert_eq!(f.weight, "bold");
        assert_eq!(f.size, FontSize::Px(24.0));
        assert_eq!(f.family, "Open Sans, serif");
    }

    #[test]
    fn parse_numeric_weight_and_units() {
        let f = FontSpec::parse("700 12pt monospace").unwrap();
        assert_eq!(f.weight, "700");
        assert_eq!(f.size, FontSize::Px(16.0));
        assert_eq!(FontSpec::parse("2em serif").unwrap().size, FontSize::Px(32.0));
        assert_eq!(FontSpec::parse("10% serif").unwrap().size, FontSize::Percent(10.0));
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!(matches!(FontSpec::parse("sans-serif"), Err(ImagingError::InvalidFont(_))));
        assert!(matches!(FontSpec::parse("16px"), Err(ImagingError::InvalidFont(_))));
        assert!(matches!(FontSpec::parse(""), Err(ImagingError::InvalidFont(_))));
    }

    #[test]
    fn empty_text_is_noop() {
        let src = solid_surface(20, 20, [5, 5, 5, 255]);
        let defaults = DrawDefaults::default();
        let style = TextStyle::default();
        let out = draw_text(src.clone(), [2.0, 10.0], "", &style, &defaults).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn text_paints_pixels_under_anchor() {
        // Hosts without any installed font cannot shape glyphs
        let families: Vec<String> = FONTS
            .faces()
            .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
            .collect();
        let Some(family) = families
            .iter()
            .find(|name| name.contains("Sans"))
            .or(families.first())
        else {
            return;
        };
        let src = Surface::blank(100, 40).unwrap();
        let style = TextStyle {
            font: Some(format!("24px '{family}'")),
            fill: Some("black".into()),
            ..TextStyle::default()
        };
        let out = draw_text(src, [4.0, 30.0], "Hello", &style, &DrawDefaults::default()).unwrap();
        let inked = (4..60)
            .flat_map(|x| (8..30).map(move |y| (x, y)))
            .filter(|&(x, y)| out.pixel(x, y)[3] > 0)
            .count();
        assert!(inked > 0, "no glyph pixels near the anchor");
    }

    #[test]
    fn text_keeps_dimensions() {
        let style = TextStyle {
            font_size: Some(FontSize::Percent(20.0)),
            fill_padding: Some(2.0),
            angle: Some(15.0),
            ..TextStyle::default()
        };
        let out = draw_text(
            solid_surface(64, 48, [0, 0, 0, 255]),
            [4.0, 30.0],
            "Hi <&>",
            &style,
            &DrawDefaults::default(),
        )
        .unwrap();
        assert_eq!(out.dimensions(), (64, 48));
    }

    #[test]
    fn bad_text_color_rejected() {
        let style = TextStyle {
            fill: Some("nope".into()),
            ..TextStyle::default()
        };
        let err = draw_text(
            solid_surface(8, 8, [0, 0, 0, 255]),
            [0.0, 4.0],
            "x",
            &style,
            &DrawDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImagingError::InvalidColor(_)));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
