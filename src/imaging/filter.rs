//! Per-pixel and neighborhood recoloring: grayscale, pixelize, gaussian blur.
//!
//! None of these change dimensions. Rows are processed in parallel.

use super::calculations::calculate_block_size;
use super::{GrayscaleOptions, ImagingError, Surface};
use rayon::prelude::*;

/// Replace every pixel with its luma. Alpha is untouched.
pub fn grayscale(surface: Surface, options: &GrayscaleOptions) -> Result<Surface, ImagingError> {
    let [wr, wg, wb] = options.method.weights();
    let width = surface.width() as usize;
    let mut image = surface.into_rgba();

    image.par_chunks_mut(width * 4).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let luma = (px[0] as f32 * wr + px[1] as f32 * wg + px[2] as f32 * wb)
                .round()
                .clamp(0.0, 255.0) as u8;
            px[0] = luma;
            px[1] = luma;
            px[2] = luma;
        }
    });

    Surface::from_rgba(image)
}

/// Mosaic the surface into flat blocks.
///
/// Blocks are `threshold` of each dimension (see
/// [`calculate_block_size`](super::calculate_block_size)), tiled from the
/// top-left; edge blocks may be smaller. Each block becomes the average of
/// its pixels, weighted by alpha. A threshold `<= 0` returns the input.
pub fn pixelize(surface: Surface, threshold: f32) -> Result<Surface, ImagingError> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Ok(surface);
    }

    let (w, h) = surface.dimensions();
    let block_w = calculate_block_size(w, threshold) as usize;
    let block_h = calculate_block_size(h, threshold) as usize;
    let stride = w as usize * 4;
    let mut image = surface.into_rgba();

    image.par_chunks_mut(block_h * stride).for_each(|band| {
        let rows = band.len() / stride;
        for bx in (0..w as usize).step_by(block_w) {
            let cols = block_w.min(w as usize - bx);

            let mut sum = [0u64; 4];
            for row in band.chunks_exact(stride) {
                for px in row[bx * 4..(bx + cols) * 4].chunks_exact(4) {
                    let a = px[3] as u64;
                    sum[0] += px[0] as u64 * a;
                    sum[1] += px[1] as u64 * a;
                    sum[2] += px[2] as u64 * a;
                    sum[3] += a;
                }
            }

            let count = (rows * cols) as u64;
            let average = if sum[3] == 0 {
                [0u8; 4]
            } else {
                [
                    ((sum[0] + sum[3] / 2) / sum[3]) as u8,
                    ((sum[1] + sum[3] / 2) / sum[3]) as u8,
                    ((sum[2] + sum[3] / 2) / sum[3]) as u8,
                    ((sum[3] + count / 2) / count) as u8,
                ]
            };

            for row in band.chunks_exact_mut(stride) {
                for px in row[bx * 4..(bx + cols) * 4].chunks_exact_mut(4) {
                    px.copy_from_slice(&average);
                }
            }
        }
    });

    Surface::from_rgba(image)
}

/// Separable gaussian blur with standard deviation `radius`.
///
/// The kernel extends `ceil(3 * radius)` pixels each side and edges are
/// clamped. Convolution runs on premultiplied samples so transparent
/// neighbors do not bleed color. `radius == 0` returns the input.
pub fn gaussian_blur(surface: Surface, radius: f32) -> Result<Surface, ImagingError> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(ImagingError::InvalidDimensions(format!(
            "blur radius must be a non-negative number, got {radius}"
        )));
    }
    if radius == 0.0 {
        return Ok(surface);
    }

    let (w, h) = surface.dimensions();
    let kernel = gaussian_kernel_q16((3.0 * radius).ceil() as u32, radius);

    let mut premul = surface.into_rgba().into_raw();
    premul.par_chunks_mut(4 * 1024).for_each(|chunk| {
        for px in chunk.chunks_exact_mut(4) {
            let a = px[3] as u32;
            for c in 0..3 {
                px[c] = ((px[c] as u32 * a + 127) / 255) as u8;
            }
        }
    });

    let mut tmp = vec![0u8; premul.len()];
    let mut out = vec![0u8; premul.len()];
    horizontal_pass(&premul, &mut tmp, w, &kernel);
    vertical_pass(&tmp, &mut out, w, h, &kernel);

    out.par_chunks_mut(4 * 1024).for_each(|chunk| {
        for px in chunk.chunks_exact_mut(4) {
            let a = px[3] as u32;
            if a == 0 {
                px.fill(0);
                continue;
            }
            for c in 0..3 {
                px[c] = ((px[c] as u32 * 255 + a / 2) / a).min(255) as u8;
            }
        }
    });

    let image = image::RgbaImage::from_raw(w, h, out).ok_or_else(|| {
        ImagingError::InvalidDimensions(format!("blur buffer does not match {w}x{h}"))
    })?;
    Surface::from_rgba(image)
}

/// Normalized kernel in Q16 fixed point; the weights sum to exactly `1 << 16`.
fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let r = radius as i64;
    let denom = 2.0 * (sigma as f64).powi(2);
    let weights: Vec<f64> = (-r..=r).map(|i| (-(i * i) as f64 / denom).exp()).collect();
    let sum: f64 = weights.iter().sum();

    let mut q: Vec<u32> = weights
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let total: i64 = q.iter().map(|&v| v as i64).sum();
    let mid = q.len() / 2;
    q[mid] = (q[mid] as i64 + 65536 - total).clamp(0, 65536) as u32;
    q
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i64;
    let w = width as i64;
    let stride = width as usize * 4;

    dst.par_chunks_mut(stride)
        .zip(src.par_chunks(stride))
        .for_each(|(out_row, in_row)| {
            for x in 0..w {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sx = (x + ki as i64 - radius).clamp(0, w - 1) as usize;
                    for c in 0..4 {
                        acc[c] += kw as u64 * in_row[sx * 4 + c] as u64;
                    }
                }
                for c in 0..4 {
                    out_row[x as usize * 4 + c] = q16_to_u8(acc[c]);
                }
            }
        });
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i64;
    let h = height as i64;
    let stride = width as usize * 4;

    dst.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, out_row)| {
            for x in 0..width as usize {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sy = (y as i64 + ki as i64 - radius).clamp(0, h - 1) as usize;
                    let idx = sy * stride + x * 4;
                    for c in 0..4 {
                        acc[c] += kw as u64 * src[idx + c] as u64;
                    }
                }
                for c in 0..4 {
                    out_row[x * 4 + c] = q16_to_u8(acc[c]);
                }
            }
        });
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}
