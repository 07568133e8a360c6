//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Info
//!
//! ```text
//! photo.jpg
//!     Size: 4000x3000
//!     EXIF
//!         DateTimeOriginal: 2024:05:01 10:22:13
//!         Make: Canon
//! ```
//!
//! ## Apply
//!
//! ```text
//! photo.jpg → out/photo.png
//!     001 resize 200x100 (to)
//!     002 grayscale (rec601)
//!     003 draw_text "draft"
//! Wrote 12034 bytes (image/png, 200x150)
//! ```

use serde_json::Value;

use crate::imaging::{Exif, ResizeMode};
use crate::recipe::Step;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn exif_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One-line summary of a recipe step.
pub fn step_summary(step: &Step) -> String {
    match step {
        Step::Resize {
            width,
            height,
            mode,
            ..
        } => match mode {
            ResizeMode::Square => format!("resize {width}x{width} (square)"),
            ResizeMode::To => format!("resize {width}x{} (to)", height.unwrap_or(*width)),
        },
        Step::Crop { width, height, .. } => format!("crop {width}x{height}"),
        Step::Rotate { degrees, .. } => format!("rotate {degrees}°"),
        Step::CenterInRectangle { width, height, .. } => {
            format!("center_in_rectangle {width}x{height}")
        }
        Step::ToCircle { diameter, .. } => format!("to_circle {diameter}"),
        Step::Perspective { .. } => "perspective".to_string(),
        Step::Grayscale { method } => format!("grayscale ({method:?})").to_lowercase(),
        Step::Pixelize { threshold } => match threshold {
            Some(t) => format!("pixelize {t}"),
            None => "pixelize".to_string(),
        },
        Step::GaussianBlur { radius } => format!("gaussian_blur {radius}"),
        Step::DrawLine { .. } => "draw_line".to_string(),
        Step::DrawPolygon { .. } => "draw_polygon".to_string(),
        Step::DrawRectangle { .. } => "draw_rectangle".to_string(),
        Step::DrawText { text, .. } => format!("draw_text {text:?}"),
    }
}

/// Format the `info` command output.
pub fn format_info(file_name: &str, dimensions: (u32, u32), exif: &Exif) -> Vec<String> {
    let mut lines = vec![
        file_name.to_string(),
        format!("{}Size: {}x{}", indent(1), dimensions.0, dimensions.1),
    ];
    if exif.is_empty() {
        lines.push(format!("{}EXIF: none", indent(1)));
    } else {
        lines.push(format!("{}EXIF", indent(1)));
        for (tag, value) in exif {
            lines.push(format!("{}{}: {}", indent(2), tag, exif_value(value)));
        }
    }
    lines
}

pub fn print_info(file_name: &str, dimensions: (u32, u32), exif: &Exif) {
    for line in format_info(file_name, dimensions, exif) {
        println!("{}", line);
    }
}

/// What the `apply` command produced.
#[derive(Debug, Clone)]
pub struct ApplySummary<'a> {
    pub input: &'a str,
    pub output: &'a str,
    pub steps: &'a [Step],
    pub bytes: usize,
    pub mime: &'a str,
    pub dimensions: (u32, u32),
}

/// Format the `apply` command output.
pub fn format_apply(summary: &ApplySummary<'_>) -> Vec<String> {
    let mut lines = vec![format!("{} → {}", summary.input, summary.output)];
    for (i, step) in summary.steps.iter().enumerate() {
        lines.push(format!(
            "{}{} {}",
            indent(1),
            format_index(i + 1),
            step_summary(step)
        ));
    }
    lines.push(format!(
        "Wrote {} bytes ({}, {}x{})",
        summary.bytes, summary.mime, summary.dimensions.0, summary.dimensions.1
    ));
    lines
}

pub fn print_apply(summary: &ApplySummary<'_>) {
    for line in format_apply(summary) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Recipe;

    #[test]
    fn info_lists_exif_sorted() {
        let mut exif = Exif::new();
        exif.insert("Model".into(), Value::from("EOS"));
        exif.insert("Make".into(), Value::from("Canon"));
        exif.insert("ISOSpeedRatings".into(), Value::from(400));

        let lines = format_info("photo.jpg", (4000, 3000), &exif);
        assert_eq!(
            lines,
            vec![
                "photo.jpg",
                "    Size: 4000x3000",
                "    EXIF",
                "        ISOSpeedRatings: 400",
                "        Make: Canon",
                "        Model: EOS",
            ]
        );
    }

    #[test]
    fn info_without_exif() {
        let lines = format_info("image", (10, 10), &Exif::new());
        assert_eq!(lines.last().unwrap(), "    EXIF: none");
    }

    #[test]
    fn apply_lists_numbered_steps() {
        let recipe = Recipe::parse(concat!(
            "[[step]]\nop = \"resize\"\nwidth = 200\nheight = 100\n\n",
            "[[step]]\nop = \"grayscale\"\n\n",
            "[[step]]\nop = \"draw_text\"\nat = [1, 2]\ntext = \"draft\"\n",
        ))
        .unwrap();
        let summary = ApplySummary {
            input: "photo.jpg",
            output: "out/photo.png",
            steps: &recipe.steps,
            bytes: 12034,
            mime: "image/png",
            dimensions: (200, 150),
        };
        assert_eq!(
            format_apply(&summary),
            vec![
                "photo.jpg → out/photo.png",
                "    001 resize 200x100 (to)",
                "    002 grayscale (rec601)",
                "    003 draw_text \"draft\"",
                "Wrote 12034 bytes (image/png, 200x150)",
            ]
        );
    }
}
