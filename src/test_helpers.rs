//! Shared test utilities for the pixchain test suite.
//!
//! Provides synthetic surfaces, encoded fixtures, and pixel-level assertions
//! so unit tests never depend on image files on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let src = gradient_surface(400, 300);
//! let out = grayscale(src, &GrayscaleOptions::default()).unwrap();
//! assert_achromatic(&out);
//! ```

use std::collections::HashSet;
use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::imaging::Surface;

// =========================================================================
// Synthetic surfaces
// =========================================================================

/// Opaque gradient: red follows x, green follows y, blue is constant.
///
/// Every row and column differs, so crops and rotations are traceable.
pub fn gradient_surface(width: u32, height: u32) -> Surface {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.saturating_sub(1).max(1)) as u8;
        let g = (y * 255 / height.saturating_sub(1).max(1)) as u8;
        Rgba([r, g, 128, 255])
    });
    Surface::from_rgba(image).unwrap()
}

/// Single-color surface.
pub fn solid_surface(width: u32, height: u32, color: [u8; 4]) -> Surface {
    Surface::filled(width, height, Rgba(color)).unwrap()
}

/// Black and white checkerboard with square cells of `cell` pixels.
pub fn checkerboard_surface(width: u32, height: u32, cell: u32) -> Surface {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    Surface::from_rgba(image).unwrap()
}

/// Encode a surface in the given format, for loader tests.
pub fn encode_surface(surface: &Surface, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    let image = if format == ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(surface.to_dynamic().into_rgb8())
    } else {
        surface.to_dynamic()
    };
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Little-endian TIFF block: IFD0 {Make, Orientation, XResolution = 300,
/// Exif IFD} and an Exif IFD {ISO = 400}.
pub fn exif_block(orientation: u16, make: &str) -> Vec<u8> {
    let entry = |d: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: [u8; 4]| {
        d.extend_from_slice(&tag.to_le_bytes());
        d.extend_from_slice(&typ.to_le_bytes());
        d.extend_from_slice(&count.to_le_bytes());
        d.extend_from_slice(&value);
    };
    let mut make_bytes = make.as_bytes().to_vec();
    make_bytes.push(0);
    let make_len = make_bytes.len() as u32;
    if make_bytes.len() % 2 == 1 {
        make_bytes.push(0);
    }

    // Header 8 + IFD0 (2 + 4 * 12 + 4) = 62
    let make_at = 62u32;
    let rational_at = make_at + make_bytes.len() as u32;
    let exif_ifd_at = rational_at + 8;

    let mut d = Vec::new();
    d.extend_from_slice(b"II");
    d.extend_from_slice(&42u16.to_le_bytes());
    d.extend_from_slice(&8u32.to_le_bytes());

    d.extend_from_slice(&4u16.to_le_bytes());
    let make_value = if make_len <= 4 {
        let mut inline = [0u8; 4];
        inline[..make_len as usize].copy_from_slice(&make_bytes[..make_len as usize]);
        inline
    } else {
        make_at.to_le_bytes()
    };
    entry(&mut d, 0x010F, 2, make_len, make_value);
    let mut short = [0u8; 4];
    short[..2].copy_from_slice(&orientation.to_le_bytes());
    entry(&mut d, 0x0112, 3, 1, short);
    entry(&mut d, 0x011A, 5, 1, rational_at.to_le_bytes());
    entry(&mut d, 0x8769, 4, 1, exif_ifd_at.to_le_bytes());
    d.extend_from_slice(&0u32.to_le_bytes());

    if make_len > 4 {
        d.extend_from_slice(&make_bytes);
    } else {
        d.resize(rational_at as usize, 0);
    }
    d.extend_from_slice(&300u32.to_le_bytes());
    d.extend_from_slice(&1u32.to_le_bytes());

    d.extend_from_slice(&1u16.to_le_bytes());
    let mut iso = [0u8; 4];
    iso[..2].copy_from_slice(&400u16.to_le_bytes());
    entry(&mut d, 0x8827, 3, 1, iso);
    d.extend_from_slice(&0u32.to_le_bytes());
    d
}

/// JPEG encoding of `surface` with `tiff` spliced in as an APP1 EXIF segment.
pub fn jpeg_with_exif(surface: &Surface, tiff: &[u8]) -> Vec<u8> {
    let jpeg = encode_surface(surface, ImageFormat::Jpeg);
    let len = (2 + 6 + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + len as usize + 2);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert every pixel has `r == g == b`.
pub fn assert_achromatic(surface: &Surface) {
    for (x, y, px) in surface.as_rgba().enumerate_pixels() {
        assert!(
            px[0] == px[1] && px[1] == px[2],
            "pixel ({x},{y}) is chromatic: {:?}",
            px
        );
    }
}

/// Number of distinct RGBA values in the surface.
pub fn count_distinct_colors(surface: &Surface) -> usize {
    surface
        .as_rgba()
        .pixels()
        .map(|p| p.0)
        .collect::<HashSet<_>>()
        .len()
}
