//! Parameter types for pipeline operations.
//!
//! These structs describe *what* to do, not *how* to do it. Builder calls
//! capture them into queued tasks; nothing here is validated until the task
//! runs, so constructing any of them never fails.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality in `[0, 1]`, parsed from a string.
//! - [`ResizeMode`] / [`ResizeOptions`]: `Square` cover-crop or `To` fit, plus letterbox fill.
//! - [`RotateOptions`], [`CenterOptions`], [`CircleOptions`]: geometry extras.
//! - [`GrayscaleOptions`]: luma weighting.
//! - [`Points`]: flat or paired coordinates, normalized to pairs.
//! - [`Paint`], [`LineStyle`], [`ShapeStyle`], [`TextStyle`], [`FontSize`]: draw styling.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Quality setting for lossy encoding, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Self {
        Self(if value.is_finite() { value.clamp(0.0, 1.0) } else { 1.0 })
    }

    /// Parse the string form used by exporters (`"0.8"`, `"1.0"`).
    ///
    /// Values outside `[0, 1]` are rejected rather than clamped.
    pub fn parse(value: &str) -> Option<Self> {
        let v: f32 = value.trim().parse().ok()?;
        (v.is_finite() && (0.0..=1.0).contains(&v)).then_some(Self(v))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the 1–100 scale JPEG encoders expect.
    pub fn percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(1.0)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// How [`resize`](super::transform::resize) interprets its target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Cover a `max_width x max_width` square and center-crop the overflow.
    Square,
    /// Fit by the longer edge, preserving aspect ratio.
    #[default]
    To,
}

/// Resampling filter used when scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resample {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl Resample {
    pub fn filter_type(self) -> FilterType {
        match self {
            Resample::Nearest => FilterType::Nearest,
            Resample::Triangle => FilterType::Triangle,
            Resample::CatmullRom => FilterType::CatmullRom,
            Resample::Gaussian => FilterType::Gaussian,
            Resample::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeOptions {
    /// Allow `To` mode to enlarge sources smaller than the box.
    pub upscale: bool,
    /// Letterbox color: when set, `To` mode pads the result to exactly
    /// `max_width x max_height`.
    pub fill: Option<String>,
    pub filter: Resample,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotateOptions {
    /// Fixed output size; the rotated image stays centered in it.
    pub size: Option<[u32; 2]>,
    /// Color for uncovered corners (default transparent).
    pub background: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CenterOptions {
    /// Padding color (default transparent).
    pub background: Option<String>,
    pub upscale: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircleOptions {
    /// Paint outside the circle with this color instead of clearing it.
    pub background: Option<String>,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrayscaleMethod {
    /// ITU-R BT.601 luma: 0.299 R + 0.587 G + 0.114 B.
    #[default]
    Rec601,
    /// ITU-R BT.709 luma: 0.2126 R + 0.7152 G + 0.0722 B.
    Rec709,
    /// Unweighted channel mean.
    Average,
}

impl GrayscaleMethod {
    pub fn weights(self) -> [f32; 3] {
        match self {
            GrayscaleMethod::Rec601 => [0.299, 0.587, 0.114],
            GrayscaleMethod::Rec709 => [0.2126, 0.7152, 0.0722],
            GrayscaleMethod::Average => [1.0 / 3.0; 3],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrayscaleOptions {
    pub method: GrayscaleMethod,
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

/// Coordinates for draw and warp operations.
///
/// Both `[x0, y0, x1, y1, ...]` and `[[x0, y0], [x1, y1], ...]` are accepted
/// and normalize to the same pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Points {
    Pairs(Vec<[f64; 2]>),
    Flat(Vec<f64>),
}

impl Points {
    /// Normalize to coordinate pairs. `None` for an odd-length flat list.
    pub fn to_pairs(&self) -> Option<Vec<[f64; 2]>> {
        match self {
            Points::Pairs(pairs) => Some(pairs.clone()),
            Points::Flat(flat) if flat.len() % 2 == 0 => {
                Some(flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
            }
            Points::Flat(_) => None,
        }
    }
}

impl From<Vec<f64>> for Points {
    fn from(flat: Vec<f64>) -> Self {
        Points::Flat(flat)
    }
}

impl From<Vec<[f64; 2]>> for Points {
    fn from(pairs: Vec<[f64; 2]>) -> Self {
        Points::Pairs(pairs)
    }
}

impl From<&[f64]> for Points {
    fn from(flat: &[f64]) -> Self {
        Points::Flat(flat.to_vec())
    }
}

impl From<&[[f64; 2]]> for Points {
    fn from(pairs: &[[f64; 2]]) -> Self {
        Points::Pairs(pairs.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Points {
    fn from(flat: [f64; N]) -> Self {
        Points::Flat(flat.to_vec())
    }
}

impl<const N: usize> From<[[f64; 2]; N]> for Points {
    fn from(pairs: [[f64; 2]; N]) -> Self {
        Points::Pairs(pairs.to_vec())
    }
}

/// A fill or stroke paint with three states.
///
/// `Default` defers to the configured default color, `None` skips the paint
/// entirely, and `Color` holds a CSS color string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Paint {
    #[default]
    Default,
    None,
    Color(String),
}

impl Paint {
    /// Resolve against a default color; `None` means "do not paint".
    pub fn resolve<'a>(&'a self, default: &'a str) -> Option<&'a str> {
        match self {
            Paint::Default => Some(default),
            Paint::None => None,
            Paint::Color(c) => Some(c),
        }
    }
}

impl From<String> for Paint {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("none") {
            Paint::None
        } else {
            Paint::Color(s)
        }
    }
}

impl From<&str> for Paint {
    fn from(s: &str) -> Self {
        Paint::from(s.to_string())
    }
}

impl<T: Into<Paint>> From<Option<T>> for Paint {
    fn from(value: Option<T>) -> Self {
        value.map_or(Paint::None, Into::into)
    }
}

/// Style for [`draw_line`](super::draw::draw_line).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LineStyle {
    pub color: Paint,
    pub width: Option<f32>,
}

/// Style for polygons and rectangles.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShapeStyle {
    pub fill: Paint,
    pub outline: Paint,
    pub outline_width: Option<f32>,
}

impl ShapeStyle {
    pub fn new(fill: impl Into<Paint>, outline: impl Into<Paint>, outline_width: f32) -> Self {
        Self {
            fill: fill.into(),
            outline: outline.into(),
            outline_width: Some(outline_width),
        }
    }

    /// Outline only, no fill.
    pub fn outlined(outline: impl Into<Paint>, outline_width: f32) -> Self {
        Self::new(Paint::None, outline, outline_width)
    }
}

/// Text size: absolute pixels or a percentage of the surface height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FontSizeRepr")]
pub enum FontSize {
    Px(f32),
    Percent(f32),
}

impl FontSize {
    /// Parse `"24px"`, `"24"`, or `"5%"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (num, percent) = match s.strip_suffix('%') {
            Some(n) => (n, true),
            None => (s.strip_suffix("px").unwrap_or(s), false),
        };
        let v: f32 = num.trim().parse().ok()?;
        if !v.is_finite() || v <= 0.0 {
            return None;
        }
        Some(if percent { FontSize::Percent(v) } else { FontSize::Px(v) })
    }

    /// Absolute pixel size on a surface of the given height.
    pub fn to_px(self, surface_height: u32) -> f32 {
        match self {
            FontSize::Px(px) => px,
            FontSize::Percent(p) => surface_height as f32 * p / 100.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FontSizeRepr {
    Number(f32),
    Text(String),
}

impl TryFrom<FontSizeRepr> for FontSize {
    type Error = String;

    fn try_from(repr: FontSizeRepr) -> Result<Self, Self::Error> {
        match repr {
            FontSizeRepr::Number(v) if v.is_finite() && v > 0.0 => Ok(FontSize::Px(v)),
            FontSizeRepr::Number(v) => Err(format!("invalid font size {v}")),
            FontSizeRepr::Text(s) => {
                FontSize::parse(&s).ok_or_else(|| format!("invalid font size {s:?}"))
            }
        }
    }
}

/// Style for [`draw_text`](super::text::draw_text). Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextStyle {
    /// CSS font shorthand, e.g. `"bold 24px serif"`.
    pub font: Option<String>,
    /// Overrides the size in `font`.
    pub font_size: Option<FontSize>,
    /// Text color.
    pub fill: Option<String>,
    /// Padding of a background box drawn behind the text.
    pub fill_padding: Option<f32>,
    /// Background box color (used only with `fill_padding`, default white).
    pub background: Option<String>,
    /// Rotation in degrees about the anchor point.
    pub angle: Option<f32>,
}
