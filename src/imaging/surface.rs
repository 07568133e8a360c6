//! The pixel surface every stage consumes and produces.
//!
//! A [`Surface`] is a straight-alpha RGBA8 raster with strictly positive
//! dimensions. Stages take it by value and hand back a new one, so a
//! surface is never aliased between two stages.

use super::ImagingError;
use image::{DynamicImage, Rgba, RgbaImage};

/// Straight-alpha RGBA8 raster with positive width and height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    /// A fully transparent surface.
    pub fn blank(width: u32, height: u32) -> Result<Self, ImagingError> {
        Self::filled(width, height, Rgba([0, 0, 0, 0]))
    }

    /// A surface filled with a single color.
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self, ImagingError> {
        check_dimensions(width, height)?;
        Ok(Self {
            image: RgbaImage::from_pixel(width, height, color),
        })
    }

    /// Adopt an existing RGBA buffer.
    pub fn from_rgba(image: RgbaImage) -> Result<Self, ImagingError> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    /// Adopt any decoded image, converting it to RGBA8.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, ImagingError> {
        Self::from_rgba(image.into_rgba8())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }

    pub fn as_rgba_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.image
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.image.clone())
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::InvalidDimensions(format!(
            "surface must have positive dimensions, got {width}x{height}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Premultiplied helpers shared by the resampling and convolution stages
// ---------------------------------------------------------------------------

/// Straight RGBA8 → premultiplied RGBA in `[0, 255]` floats.
#[inline]
pub(crate) fn premultiply(px: Rgba<u8>) -> [f32; 4] {
    let a = px[3] as f32 / 255.0;
    [px[0] as f32 * a, px[1] as f32 * a, px[2] as f32 * a, px[3] as f32]
}

/// Premultiplied floats → straight RGBA8, rounding and clamping.
#[inline]
pub(crate) fn unpremultiply(px: [f32; 4]) -> Rgba<u8> {
    let alpha = px[3].clamp(0.0, 255.0);
    if alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let scale = 255.0 / alpha;
    let channel = |v: f32| (v * scale).round().clamp(0.0, 255.0) as u8;
    Rgba([
        channel(px[0]),
        channel(px[1]),
        channel(px[2]),
        alpha.round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_transparent() {
        let s = Surface::blank(3, 2).unwrap();
        assert_eq!(s.dimensions(), (3, 2));
        assert!(s.as_rgba().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(matches!(
            Surface::blank(0, 10),
            Err(ImagingError::InvalidDimensions(_))
        ));
        assert!(matches!(
            Surface::from_rgba(RgbaImage::new(5, 0)),
            Err(ImagingError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn premultiply_roundtrip_opaque() {
        let px = Rgba([12, 200, 99, 255]);
        assert_eq!(unpremultiply(premultiply(px)), px);
    }

    #[test]
    fn unpremultiply_zero_alpha_is_clear() {
        assert_eq!(unpremultiply([10.0, 10.0, 10.0, 0.0]), Rgba([0, 0, 0, 0]));
    }
}
