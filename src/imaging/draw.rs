//! Vector shapes composited onto a surface with `tiny-skia`.
//!
//! The surface is converted to a premultiplied pixmap and painted; only the
//! pixels the paint touched are written back. Dimensions never change.

use super::{ImagingError, LineStyle, Points, ShapeStyle, Surface, parse_color};
use resvg::tiny_skia::{
    self, FillRule, IntSize, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

/// Colors and widths used when a style leaves a field at [`Paint::Default`]
/// or `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawDefaults {
    pub fill: String,
    pub outline: String,
    pub line_width: f32,
    pub outline_width: f32,
    pub font: String,
    pub text_fill: String,
}

impl Default for DrawDefaults {
    fn default() -> Self {
        Self {
            fill: "green".into(),
            outline: "red".into(),
            line_width: 6.0,
            outline_width: 6.0,
            font: "16px sans-serif".into(),
            text_fill: "green".into(),
        }
    }
}

/// Stroke a polyline through `points` in order.
pub fn draw_line(
    surface: Surface,
    points: &Points,
    style: &LineStyle,
    defaults: &DrawDefaults,
) -> Result<Surface, ImagingError> {
    let pairs = pairs_at_least(points, 2, "line")?;
    let width = stroke_width(style.width, defaults.line_width)?;
    let Some(color) = style.color.resolve(&defaults.fill) else {
        return Ok(surface);
    };
    let paint = sk_paint(color)?;

    let mut pb = PathBuilder::new();
    pb.move_to(pairs[0][0] as f32, pairs[0][1] as f32);
    for p in &pairs[1..] {
        pb.line_to(p[0] as f32, p[1] as f32);
    }
    let Some(path) = pb.finish() else {
        return Ok(surface);
    };

    paint_on(surface, |pixmap| {
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    })
}

/// Fill the closed polygon through `points`, then stroke its outline.
pub fn draw_polygon(
    surface: Surface,
    points: &Points,
    style: &ShapeStyle,
    defaults: &DrawDefaults,
) -> Result<Surface, ImagingError> {
    let pairs = pairs_at_least(points, 3, "polygon")?;

    let mut pb = PathBuilder::new();
    pb.move_to(pairs[0][0] as f32, pairs[0][1] as f32);
    for p in &pairs[1..] {
        pb.line_to(p[0] as f32, p[1] as f32);
    }
    pb.close();
    let Some(path) = pb.finish() else {
        return Ok(surface);
    };

    fill_and_outline(surface, &path, style, defaults)
}

/// Fill and outline the axis-aligned rectangle spanned by two opposite
/// corners, given as `[left, bottom, right, top]` in either order.
pub fn draw_rectangle(
    surface: Surface,
    points: &Points,
    style: &ShapeStyle,
    defaults: &DrawDefaults,
) -> Result<Surface, ImagingError> {
    let pairs = pairs_at_least(points, 2, "rectangle")?;
    if pairs.len() != 2 {
        return Err(ImagingError::InvalidPoints(format!(
            "rectangle takes two corners, got {}",
            pairs.len()
        )));
    }
    let [[x0, y0], [x1, y1]] = [pairs[0], pairs[1]];
    let rect = Rect::from_ltrb(
        x0.min(x1) as f32,
        y0.min(y1) as f32,
        x0.max(x1) as f32,
        y0.max(y1) as f32,
    )
    .filter(|r| r.width() > 0.0 && r.height() > 0.0)
    .ok_or_else(|| {
        ImagingError::InvalidPoints(format!("degenerate rectangle ({x0},{y0})-({x1},{y1})"))
    })?;

    fill_and_outline(surface, &PathBuilder::from_rect(rect), style, defaults)
}

fn fill_and_outline(
    surface: Surface,
    path: &tiny_skia::Path,
    style: &ShapeStyle,
    defaults: &DrawDefaults,
) -> Result<Surface, ImagingError> {
    let width = stroke_width(style.outline_width, defaults.outline_width)?;
    let fill = style.fill.resolve(&defaults.fill).map(sk_paint).transpose()?;
    let outline = style
        .outline
        .resolve(&defaults.outline)
        .map(sk_paint)
        .transpose()?;

    if fill.is_none() && outline.is_none() {
        return Ok(surface);
    }

    paint_on(surface, |pixmap| {
        if let Some(paint) = &fill {
            pixmap.fill_path(path, paint, FillRule::Winding, Transform::identity(), None);
        }
        if let Some(paint) = &outline {
            let stroke = Stroke {
                width,
                ..Stroke::default()
            };
            pixmap.stroke_path(path, paint, &stroke, Transform::identity(), None);
        }
    })
}

fn pairs_at_least(points: &Points, min: usize, shape: &str) -> Result<Vec<[f64; 2]>, ImagingError> {
    let pairs = points.to_pairs().ok_or_else(|| {
        ImagingError::InvalidPoints(format!("{shape}: odd number of coordinates"))
    })?;
    if pairs.len() < min {
        return Err(ImagingError::InvalidPoints(format!(
            "{shape} needs at least {min} points, got {}",
            pairs.len()
        )));
    }
    if pairs.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ImagingError::InvalidPoints(format!(
            "{shape}: coordinates must be finite"
        )));
    }
    Ok(pairs)
}

fn stroke_width(width: Option<f32>, default: f32) -> Result<f32, ImagingError> {
    let width = width.unwrap_or(default);
    if !width.is_finite() || width <= 0.0 {
        return Err(ImagingError::InvalidDimensions(format!(
            "stroke width must be positive, got {width}"
        )));
    }
    Ok(width)
}

pub(crate) fn sk_paint(color: &str) -> Result<tiny_skia::Paint<'static>, ImagingError> {
    let c = parse_color(color)?;
    let mut paint = tiny_skia::Paint::default();
    paint.set_color_rgba8(c[0], c[1], c[2], c[3]);
    paint.anti_alias = true;
    Ok(paint)
}

// ---------------------------------------------------------------------------
// Surface <-> pixmap
// ---------------------------------------------------------------------------

/// Run `draw` against a premultiplied copy of the surface and merge back.
///
/// Only pixels the closure changed are demultiplied; the rest keep their
/// original straight-alpha value.
pub(crate) fn paint_on(
    surface: Surface,
    draw: impl FnOnce(&mut Pixmap),
) -> Result<Surface, ImagingError> {
    let mut original = surface.into_rgba();
    let mut pixmap = to_pixmap(&original)?;
    let before = pixmap.data().to_vec();
    draw(&mut pixmap);

    let painted = pixmap.data();
    for ((px, old), new) in original
        .chunks_exact_mut(4)
        .zip(before.chunks_exact(4))
        .zip(painted.chunks_exact(4))
    {
        if old != new {
            px.copy_from_slice(&demultiply([new[0], new[1], new[2], new[3]]));
        }
    }
    Surface::from_rgba(original)
}

fn to_pixmap(image: &image::RgbaImage) -> Result<Pixmap, ImagingError> {
    let (w, h) = image.dimensions();
    let mut data = image.as_raw().clone();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        for c in &mut px[..3] {
            *c = ((*c as u32 * a + 127) / 255) as u8;
        }
    }
    IntSize::from_wh(w, h)
        .and_then(|size| Pixmap::from_vec(data, size))
        .ok_or_else(|| ImagingError::InvalidDimensions(format!("cannot paint on {w}x{h}")))
}

fn demultiply(px: [u8; 4]) -> [u8; 4] {
    let a = px[3] as u32;
    if a == 0 {
        return [0; 4];
    }
    let c = |v: u8| ((v as u32 * 255 + a / 2) / a).min(255) as u8;
    [c(px[0]), c(px[1]), c(px[2]), px[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Paint;
    use crate::test_helpers::solid_surface;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn blank(w: u32, h: u32) -> Surface {
        Surface::blank(w, h).unwrap()
    }

    // =========================================================================
    // Rectangle
    // =========================================================================

    #[test]
    fn rectangle_outline_only_paints_border() {
        let style = ShapeStyle::outlined("red", 2.0);
        let out = draw_rectangle(
            blank(100, 100),
            &Points::from([10.0, 10.0, 50.0, 50.0]),
            &style,
            &DrawDefaults::default(),
        )
        .unwrap();

        assert_eq!(out.dimensions(), (100, 100));
        // Border: 1px either side of each edge
        for i in 9..=50 {
            assert_eq!(out.pixel(i, 9), RED, "top edge at x={i}");
            assert_eq!(out.pixel(i, 50), RED, "bottom edge at x={i}");
            assert_eq!(out.pixel(9, i), RED, "left edge at y={i}");
            assert_eq!(out.pixel(50, i), RED, "right edge at y={i}");
        }
        // Interior and exterior untouched
        for i in 11..=48 {
            for j in 11..=48 {
                assert_eq!(out.pixel(i, j), CLEAR);
            }
        }
        assert_eq!(out.pixel(8, 30), CLEAR);
        assert_eq!(out.pixel(51, 30), CLEAR);
    }

    #[test]
    fn rectangle_corner_order_does_not_matter() {
        let style = ShapeStyle::new("blue", Paint::None, 1.0);
        let defaults = DrawDefaults::default();
        let forward = Points::from([2.0, 15.0, 12.0, 5.0]);
        let backward = Points::from([12.0, 5.0, 2.0, 15.0]);
        let a = draw_rectangle(blank(20, 20), &forward, &style, &defaults).unwrap();
        let b = draw_rectangle(blank(20, 20), &backward, &style, &defaults).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.pixel(7, 10), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn rectangle_uses_default_colors() {
        let out = draw_rectangle(
            blank(40, 40),
            &Points::from([[10.0, 10.0], [30.0, 30.0]]),
            &ShapeStyle::default(),
            &DrawDefaults::default(),
        )
        .unwrap();
        // Default fill green, default outline red with width 6
        assert_eq!(out.pixel(20, 20), Rgba([0, 128, 0, 255]));
        assert_eq!(out.pixel(10, 20), RED);
    }

    #[test]
    fn rectangle_needs_exactly_two_corners() {
        let err = draw_rectangle(
            blank(10, 10),
            &Points::from([0.0, 0.0, 1.0, 1.0, 2.0, 2.0]),
            &ShapeStyle::default(),
            &DrawDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImagingError::InvalidPoints(_)));
    }

    // =========================================================================
    // Polygon / line
    // =========================================================================

    #[test]
    fn polygon_fill_without_outline() {
        let style = ShapeStyle::new("white", Paint::None, 1.0);
        let out = draw_polygon(
            solid_surface(30, 30, [0, 0, 0, 255]),
            &Points::from([[0.0, 0.0], [30.0, 0.0], [0.0, 30.0]]),
            &style,
            &DrawDefaults::default(),
        )
        .unwrap();
        assert_eq!(out.pixel(3, 3), Rgba([255, 255, 255, 255]));
        assert_eq!(out.pixel(27, 27), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn polygon_needs_three_points() {
        let err = draw_polygon(
            blank(10, 10),
            &Points::from([0.0, 0.0, 5.0, 5.0]),
            &ShapeStyle::default(),
            &DrawDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImagingError::InvalidPoints(_)));
    }

    #[test]
    fn line_strokes_between_points() {
        let style = LineStyle {
            color: Paint::from("red"),
            width: Some(2.0),
        };
        let out = draw_line(
            blank(20, 20),
            &Points::from([0.0, 10.0, 20.0, 10.0]),
            &style,
            &DrawDefaults::default(),
        )
        .unwrap();
        assert_eq!(out.pixel(5, 9), RED);
        assert_eq!(out.pixel(5, 10), RED);
        assert_eq!(out.pixel(5, 5), CLEAR);
    }

    #[test]
    fn line_with_no_paint_is_noop() {
        let src = solid_surface(10, 10, [1, 2, 3, 255]);
        let style = LineStyle {
            color: Paint::None,
            width: None,
        };
        let points = Points::from([0.0, 0.0, 9.0, 9.0]);
        let out = draw_line(src.clone(), &points, &style, &DrawDefaults::default()).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn odd_points_and_bad_colors_rejected() {
        let defaults = DrawDefaults::default();
        let odd = Points::from(vec![1.0, 2.0, 3.0]);
        let err = draw_line(blank(5, 5), &odd, &LineStyle::default(), &defaults).unwrap_err();
        assert!(matches!(err, ImagingError::InvalidPoints(_)));

        let style = LineStyle {
            color: Paint::from("not-a-color"),
            width: None,
        };
        let err = draw_line(blank(5, 5), &Points::from([0.0, 0.0, 4.0, 4.0]), &style, &defaults)
            .unwrap_err();
        assert!(matches!(err, ImagingError::InvalidColor(_)));
    }

    #[test]
    fn pixmap_roundtrip_preserves_opaque_pixels() {
        let src = solid_surface(4, 4, [12, 34, 56, 255]);
        let out = paint_on(src.clone(), |_| {}).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn unpainted_translucent_pixels_are_untouched() {
        let src = solid_surface(100, 100, [100, 50, 25, 3]);
        let out = draw_rectangle(
            src.clone(),
            &Points::from([10.0, 10.0, 50.0, 50.0]),
            &ShapeStyle::outlined("red", 2.0),
            &DrawDefaults::default(),
        )
        .unwrap();

        assert_eq!(out.pixel(30, 30), Rgba([100, 50, 25, 3]));
        assert_eq!(out.pixel(80, 80), Rgba([100, 50, 25, 3]));
        assert_eq!(out.pixel(30, 9), RED);
    }

    #[test]
    fn transparent_pixels_keep_their_color_channels() {
        let src = solid_surface(8, 8, [9, 8, 7, 0]);
        let out = paint_on(src.clone(), |_| {}).unwrap();
        assert_eq!(out, src);
    }
}
