//! Pure calculation functions for surface geometry.
//!
//! All functions here are pure and testable without any pixels.

/// Calculate dimensions needed to cover a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original surface dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Calculate "resize to" dimensions using the longer-edge rule.
///
/// A landscape source (width > height) is constrained by `max_width`, anything
/// else by `max_height`; the other edge follows the source aspect ratio.
/// Sources already within the bound keep their size unless `upscale` is set.
///
/// ```text
/// 400x300 → max 200x100 → 200x150   (landscape: width drives)
/// 300x400 → max 200x100 → 75x100    (portrait: height drives)
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), max: (u32, u32), upscale: bool) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = max;

    if src_w > src_h {
        if src_w <= max_w && !upscale {
            return source;
        }
        let ratio = max_w as f64 / src_w as f64;
        (max_w, ((src_h as f64 * ratio).round() as u32).max(1))
    } else {
        if src_h <= max_h && !upscale {
            return source;
        }
        let ratio = max_h as f64 / src_h as f64;
        (((src_w as f64 * ratio).round() as u32).max(1), max_h)
    }
}

/// Largest size with the source aspect ratio that fits inside `max`.
///
/// Both edges stay within the box. Sources already inside it keep their
/// size unless `upscale` is set.
///
/// ```text
/// 400x300 → box 200x100 → 133x100
/// ```
pub fn calculate_contain_dimensions(
    source: (u32, u32),
    max: (u32, u32),
    upscale: bool,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = max;
    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    if scale >= 1.0 && !upscale {
        return source;
    }
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}

/// Offset that centers `inner` inside `outer` along one axis (floored).
///
/// Negative when `inner` is larger than `outer`.
pub fn center_offset(outer: u32, inner: u32) -> i64 {
    (outer as i64 - inner as i64).div_euclid(2)
}

/// Bounding box of a `width x height` rectangle rotated by `degrees`.
///
/// Values within `1e-6` of an integer are snapped before rounding up, so
/// quarter turns and full turns reproduce exact integer sizes.
pub fn calculate_rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let w = width as f64 * cos + height as f64 * sin;
    let h = width as f64 * sin + height as f64 * cos;
    (ceil_snapped(w).max(1), ceil_snapped(h).max(1))
}

fn ceil_snapped(v: f64) -> u32 {
    let rounded = v.round();
    if (v - rounded).abs() < 1e-6 {
        rounded as u32
    } else {
        v.ceil() as u32
    }
}

/// Mosaic block size along one axis for a pixelize threshold in `(0, 1]`.
pub fn calculate_block_size(dimension: u32, threshold: f32) -> u32 {
    let t = threshold.clamp(0.0, 1.0) as f64;
    ceil_snapped(dimension as f64 * t).clamp(1, dimension.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_fill_dimensions tests
    // =========================================================================

    #[test]
    fn fill_wider_source_to_square_target() {
        // 400x300 (4:3) → 150x150: height matches, width = 200
        assert_eq!(calculate_fill_dimensions((400, 300), (150, 150)), (200, 150));
    }

    #[test]
    fn fill_taller_source_to_landscape_target() {
        // 600x800 (3:4) → 500x400 target
        // Source is taller, so width matches: 500, height = 500 * (4/3) = 667
        assert_eq!(calculate_fill_dimensions((600, 800), (500, 400)), (500, 667));
    }

    #[test]
    fn fill_same_aspect_ratio() {
        assert_eq!(calculate_fill_dimensions((800, 600), (400, 300)), (400, 300));
    }

    #[test]
    fn fill_never_undershoots_target() {
        // Extreme aspect ratios must still cover the target after rounding
        let (w, h) = calculate_fill_dimensions((3, 1000), (7, 7));
        assert!(w >= 7 && h >= 7);
    }

    // =========================================================================
    // calculate_fit_dimensions tests
    // =========================================================================

    #[test]
    fn fit_landscape_uses_width() {
        assert_eq!(calculate_fit_dimensions((400, 300), (200, 100), false), (200, 150));
    }

    #[test]
    fn fit_portrait_uses_height() {
        assert_eq!(calculate_fit_dimensions((300, 400), (200, 100), false), (75, 100));
    }

    #[test]
    fn fit_square_uses_height() {
        assert_eq!(calculate_fit_dimensions((500, 500), (200, 100), false), (100, 100));
    }

    #[test]
    fn fit_small_source_kept_without_upscale() {
        assert_eq!(calculate_fit_dimensions((120, 80), (200, 200), false), (120, 80));
    }

    #[test]
    fn fit_small_source_grows_with_upscale() {
        assert_eq!(calculate_fit_dimensions((120, 80), (240, 240), true), (240, 160));
    }

    // =========================================================================
    // calculate_contain_dimensions tests
    // =========================================================================

    #[test]
    fn contain_never_exceeds_box() {
        assert_eq!(calculate_contain_dimensions((400, 300), (200, 100), false), (133, 100));
        assert_eq!(calculate_contain_dimensions((300, 400), (200, 100), false), (75, 100));
        assert_eq!(calculate_contain_dimensions((1000, 10), (50, 50), false), (50, 1));
    }

    #[test]
    fn contain_keeps_small_source_without_upscale() {
        assert_eq!(calculate_contain_dimensions((120, 80), (200, 200), false), (120, 80));
        assert_eq!(calculate_contain_dimensions((120, 80), (240, 240), true), (240, 160));
    }

    // =========================================================================
    // center_offset / rotated bounds / block size
    // =========================================================================

    #[test]
    fn center_offset_floors() {
        assert_eq!(center_offset(100, 50), 25);
        assert_eq!(center_offset(101, 50), 25);
        assert_eq!(center_offset(50, 100), -25);
        assert_eq!(center_offset(50, 101), -26);
    }

    #[test]
    fn rotated_bounds_identity_and_quarter_turns() {
        assert_eq!(calculate_rotated_bounds(400, 300, 0.0), (400, 300));
        assert_eq!(calculate_rotated_bounds(400, 300, 360.0), (400, 300));
        assert_eq!(calculate_rotated_bounds(400, 300, 90.0), (300, 400));
        assert_eq!(calculate_rotated_bounds(400, 300, -270.0), (300, 400));
        assert_eq!(calculate_rotated_bounds(400, 300, 180.0), (400, 300));
    }

    #[test]
    fn rotated_bounds_45_degrees() {
        // 100x100 at 45° → diagonal ≈ 141.42 → 142
        assert_eq!(calculate_rotated_bounds(100, 100, 45.0), (142, 142));
    }

    #[test]
    fn block_size_scales_with_threshold() {
        assert_eq!(calculate_block_size(100, 0.2), 20);
        assert_eq!(calculate_block_size(100, 0.05), 5);
        assert_eq!(calculate_block_size(100, 1.0), 100);
        assert_eq!(calculate_block_size(100, 3.0), 100);
        assert_eq!(calculate_block_size(10, 0.01), 1);
    }
}
