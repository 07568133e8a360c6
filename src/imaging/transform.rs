//! Geometric transforms: resize, crop, pad, rotate, circular mask.
//!
//! Every function takes the surface by value and returns the new one.
//! Parameter validation happens here, at execution time.

use super::calculations::{
    calculate_contain_dimensions, calculate_fill_dimensions, calculate_fit_dimensions,
    calculate_rotated_bounds, center_offset,
};
use super::{
    CircleOptions, ImagingError, ResizeMode, ResizeOptions, RotateOptions, Surface, parse_color,
    premultiply, unpremultiply,
};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Resize according to `mode`.
///
/// - `Square`: cover a `max_width x max_width` square, then center-crop.
///   `max_height` is ignored.
/// - `To`: fit by the longer edge (see
///   [`calculate_fit_dimensions`](super::calculate_fit_dimensions)), then
///   letterbox onto `max_width x max_height` when `options.fill` is set.
pub fn resize(
    surface: Surface,
    max_width: u32,
    max_height: u32,
    mode: ResizeMode,
    options: &ResizeOptions,
) -> Result<Surface, ImagingError> {
    let filter = options.filter.filter_type();

    match mode {
        ResizeMode::Square => {
            if max_width == 0 {
                return Err(ImagingError::InvalidDimensions(
                    "square resize needs a positive size".into(),
                ));
            }
            let (fill_w, fill_h) =
                calculate_fill_dimensions(surface.dimensions(), (max_width, max_width));
            let filled = scale(surface, fill_w, fill_h, filter)?;
            crop(filled, max_width, max_width, None, None)
        }
        ResizeMode::To => {
            if max_width == 0 || max_height == 0 {
                return Err(ImagingError::InvalidDimensions(format!(
                    "resize target must be positive, got {max_width}x{max_height}"
                )));
            }
            let (w, h) = calculate_fit_dimensions(
                surface.dimensions(),
                (max_width, max_height),
                options.upscale,
            );
            let scaled = scale(surface, w, h, filter)?;
            match options.fill.as_deref() {
                Some(color) => pad(scaled, max_width, max_height, Some(color)),
                None => Ok(scaled),
            }
        }
    }
}

fn scale(
    surface: Surface,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<Surface, ImagingError> {
    if surface.dimensions() == (width, height) {
        return Ok(surface);
    }
    Surface::from_rgba(imageops::resize(surface.as_rgba(), width, height, filter))
}

/// Extract a `width x height` rectangle.
///
/// Omitted offsets center the crop: `(source - size) / 2`, floored.
pub fn crop(
    surface: Surface,
    width: u32,
    height: u32,
    offset_x: Option<u32>,
    offset_y: Option<u32>,
) -> Result<Surface, ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::InvalidDimensions(format!(
            "crop size must be positive, got {width}x{height}"
        )));
    }

    let (src_w, src_h) = surface.dimensions();
    let x = offset_x.unwrap_or(src_w.saturating_sub(width) / 2);
    let y = offset_y.unwrap_or(src_h.saturating_sub(height) / 2);

    if x as u64 + width as u64 > src_w as u64 || y as u64 + height as u64 > src_h as u64 {
        return Err(ImagingError::CropOutOfBounds {
            x,
            y,
            width,
            height,
            source_width: src_w,
            source_height: src_h,
        });
    }

    if (x, y, width, height) == (0, 0, src_w, src_h) {
        return Ok(surface);
    }

    Surface::from_rgba(imageops::crop_imm(surface.as_rgba(), x, y, width, height).to_image())
}

/// Scale down (or up, with `options.upscale`) until the surface fits inside
/// `max_width x max_height` on both edges.
pub fn contain(
    surface: Surface,
    max_width: u32,
    max_height: u32,
    options: &ResizeOptions,
) -> Result<Surface, ImagingError> {
    if max_width == 0 || max_height == 0 {
        return Err(ImagingError::InvalidDimensions(format!(
            "fit target must be positive, got {max_width}x{max_height}"
        )));
    }
    let max = (max_width, max_height);
    let (w, h) = calculate_contain_dimensions(surface.dimensions(), max, options.upscale);
    scale(surface, w, h, options.filter.filter_type())
}

/// Center the surface on a `width x height` canvas.
///
/// The padding is `background` (default transparent). A surface larger than
/// the canvas is clipped symmetrically.
pub fn pad(
    surface: Surface,
    width: u32,
    height: u32,
    background: Option<&str>,
) -> Result<Surface, ImagingError> {
    let background = background.map(parse_color).transpose()?.unwrap_or(TRANSPARENT);
    let mut canvas = Surface::filled(width, height, background)?;

    let x = center_offset(width, surface.width());
    let y = center_offset(height, surface.height());
    imageops::overlay(canvas.as_rgba_mut(), surface.as_rgba(), x, y);
    Ok(canvas)
}

/// Rotate clockwise by `degrees` about the center.
///
/// The output grows to the rotated bounding box unless `options.size` fixes
/// it. Full turns with no fixed size return the input untouched.
pub fn rotate(
    surface: Surface,
    degrees: f64,
    options: &RotateOptions,
) -> Result<Surface, ImagingError> {
    if !degrees.is_finite() {
        return Err(ImagingError::InvalidDimensions(format!(
            "rotation angle must be finite, got {degrees}"
        )));
    }
    let background = options
        .background
        .as_deref()
        .map(parse_color)
        .transpose()?
        .unwrap_or(TRANSPARENT);

    let (src_w, src_h) = surface.dimensions();
    let (out_w, out_h) = match options.size {
        Some([0, _]) | Some([_, 0]) => {
            return Err(ImagingError::InvalidDimensions(
                "fixed rotation size must be positive".into(),
            ));
        }
        Some([w, h]) => (w, h),
        None => calculate_rotated_bounds(src_w, src_h, degrees),
    };

    let turn = degrees.rem_euclid(360.0);
    if (turn < 1e-9 || 360.0 - turn < 1e-9) && (out_w, out_h) == (src_w, src_h) {
        return Ok(surface);
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let (src_cx, src_cy) = (src_w as f64 / 2.0, src_h as f64 / 2.0);
    let (dst_cx, dst_cy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    warp(surface.as_rgba(), out_w, out_h, background, |x, y| {
        let dx = x + 0.5 - dst_cx;
        let dy = y + 0.5 - dst_cy;
        (
            dx * cos + dy * sin + src_cx - 0.5,
            -dx * sin + dy * cos + src_cy - 0.5,
        )
    })
}

/// Clear (or paint with `options.background`) everything outside a centered
/// circle of the given diameter.
///
/// Coverage is measured from pixel centers: a pixel farther than the radius
/// is fully outside, one within a pixel of the rim is partially covered.
pub fn circle_mask(
    surface: Surface,
    diameter: u32,
    options: &CircleOptions,
) -> Result<Surface, ImagingError> {
    if diameter == 0 {
        return Err(ImagingError::InvalidDimensions(
            "circle diameter must be positive".into(),
        ));
    }
    let background = options
        .background
        .as_deref()
        .map(parse_color)
        .transpose()?
        .map(premultiply);

    let (w, h) = surface.dimensions();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = diameter as f64 / 2.0;

    let mut image = surface.into_rgba();
    image
        .par_chunks_mut(w as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let dy = y as f64 + 0.5 - cy;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let dx = x as f64 + 0.5 - cx;
                let coverage = (radius - dx.hypot(dy)).clamp(0.0, 1.0) as f32;
                if coverage >= 1.0 {
                    continue;
                }
                let inside = premultiply(Rgba([px[0], px[1], px[2], px[3]]));
                let outside = background.unwrap_or([0.0; 4]);
                let mixed: [f32; 4] =
                    std::array::from_fn(|c| inside[c] * coverage + outside[c] * (1.0 - coverage));
                px.copy_from_slice(&unpremultiply(mixed).0);
            }
        });

    Surface::from_rgba(image)
}

// ---------------------------------------------------------------------------
// Inverse-mapped resampling shared with the perspective warp
// ---------------------------------------------------------------------------

/// Build a `width x height` surface by sampling `src` at `map(x, y)` for
/// every destination pixel. Rows run in parallel.
pub(crate) fn warp<F>(
    src: &RgbaImage,
    width: u32,
    height: u32,
    background: Rgba<u8>,
    map: F,
) -> Result<Surface, ImagingError>
where
    F: Fn(f64, f64) -> (f64, f64) + Sync,
{
    let mut out = RgbaImage::new(width, height);
    let bg = premultiply(background);

    out.par_chunks_mut(width as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let (sx, sy) = map(x as f64, y as f64);
                px.copy_from_slice(&unpremultiply(sample_bilinear(src, sx, sy, bg)).0);
            }
        });

    Surface::from_rgba(out)
}

/// Bilinear sample in premultiplied space. Taps outside the source read `bg`.
///
/// Coordinates within `1e-6` of an integer are snapped so that exact
/// mappings reproduce source pixels bit for bit.
pub(crate) fn sample_bilinear(src: &RgbaImage, x: f64, y: f64, bg: [f32; 4]) -> [f32; 4] {
    let snap = |v: f64| {
        let r = v.round();
        if (v - r).abs() < 1e-6 { r } else { v }
    };
    let (x, y) = (snap(x), snap(y));
    if !x.is_finite() || !y.is_finite() {
        return bg;
    }

    let (w, h) = (src.width() as i64, src.height() as i64);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = ((x - x0) as f32, (y - y0) as f32);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let tap = |ix: i64, iy: i64| -> [f32; 4] {
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            bg
        } else {
            premultiply(*src.get_pixel(ix as u32, iy as u32))
        }
    };

    let weights = [
        ((1.0 - fx) * (1.0 - fy), 0, 0),
        (fx * (1.0 - fy), 1, 0),
        ((1.0 - fx) * fy, 0, 1),
        (fx * fy, 1, 1),
    ];

    let mut acc = [0.0f32; 4];
    for (weight, ox, oy) in weights {
        if weight == 0.0 {
            continue;
        }
        let px = tap(x0 + ox, y0 + oy);
        for c in 0..4 {
            acc[c] += px[c] * weight;
        }
    }
    acc
}
