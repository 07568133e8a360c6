//! TOML recipes: a saved sequence of pipeline operations.
//!
//! ```toml
//! [[step]]
//! op = "resize"
//! width = 200
//! height = 100
//!
//! [[step]]
//! op = "grayscale"
//!
//! [[step]]
//! op = "draw_text"
//! at = [10, 40]
//! text = "draft"
//! font = "bold 24px sans-serif"
//! ```
//!
//! Parsing checks structure only. Pixel parameters (sizes, colors, points)
//! are validated when the pipeline flushes, like every other builder call.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::imaging::{
    CenterOptions, CircleOptions, FontSize, GrayscaleMethod, GrayscaleOptions, LineStyle, Paint,
    Points, Resample, ResizeMode, ResizeOptions, RotateOptions, ShapeStyle, TextStyle,
};
use crate::pipeline::Pipeline;

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// An ordered list of steps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// One pipeline operation, tagged by `op`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Resize {
        width: u32,
        /// Defaults to `width`.
        height: Option<u32>,
        #[serde(default)]
        mode: ResizeMode,
        #[serde(default)]
        upscale: bool,
        fill: Option<String>,
        #[serde(default)]
        filter: Resample,
    },
    Crop {
        width: u32,
        height: u32,
        x: Option<u32>,
        y: Option<u32>,
    },
    Rotate {
        degrees: f64,
        size: Option<[u32; 2]>,
        background: Option<String>,
    },
    CenterInRectangle {
        width: u32,
        height: u32,
        background: Option<String>,
        #[serde(default)]
        upscale: bool,
    },
    ToCircle {
        diameter: u32,
        background: Option<String>,
    },
    Perspective {
        points: Points,
    },
    Grayscale {
        #[serde(default)]
        method: GrayscaleMethod,
    },
    Pixelize {
        threshold: Option<f32>,
    },
    GaussianBlur {
        radius: f32,
    },
    DrawLine {
        points: Points,
        #[serde(default)]
        color: Paint,
        width: Option<f32>,
    },
    DrawPolygon {
        points: Points,
        #[serde(default)]
        fill: Paint,
        #[serde(default)]
        outline: Paint,
        outline_width: Option<f32>,
    },
    DrawRectangle {
        points: Points,
        #[serde(default)]
        fill: Paint,
        #[serde(default)]
        outline: Paint,
        outline_width: Option<f32>,
    },
    DrawText {
        at: [f64; 2],
        text: String,
        font: Option<String>,
        font_size: Option<FontSize>,
        fill: Option<String>,
        fill_padding: Option<f32>,
        background: Option<String>,
        angle: Option<f32>,
    },
}

impl Step {
    /// Enqueue this step on `pipeline`.
    pub fn apply(&self, pipeline: &mut Pipeline) {
        match self.clone() {
            Step::Resize {
                width,
                height,
                mode,
                upscale,
                fill,
                filter,
            } => {
                let options = ResizeOptions {
                    upscale,
                    fill,
                    filter,
                };
                pipeline.resize_with(width, height.unwrap_or(width), mode, options);
            }
            Step::Crop {
                width,
                height,
                x,
                y,
            } => {
                pipeline.crop(width, height, x, y);
            }
            Step::Rotate {
                degrees,
                size,
                background,
            } => {
                pipeline.rotate_with(degrees, RotateOptions { size, background });
            }
            Step::CenterInRectangle {
                width,
                height,
                background,
                upscale,
            } => {
                pipeline.center_in_rectangle(width, height, CenterOptions { background, upscale });
            }
            Step::ToCircle {
                diameter,
                background,
            } => {
                pipeline.to_circle(diameter, CircleOptions { background });
            }
            Step::Perspective { points } => {
                pipeline.perspective(points);
            }
            Step::Grayscale { method } => {
                pipeline.grayscale(GrayscaleOptions { method });
            }
            Step::Pixelize { threshold } => {
                pipeline.pixelize(threshold);
            }
            Step::GaussianBlur { radius } => {
                pipeline.gaussian_blur(radius);
            }
            Step::DrawLine {
                points,
                color,
                width,
            } => {
                pipeline.draw_line(points, LineStyle { color, width });
            }
            Step::DrawPolygon {
                points,
                fill,
                outline,
                outline_width,
            } => {
                pipeline.draw_polygon(
                    points,
                    ShapeStyle {
                        fill,
                        outline,
                        outline_width,
                    },
                );
            }
            Step::DrawRectangle {
                points,
                fill,
                outline,
                outline_width,
            } => {
                pipeline.draw_rectangle(
                    points,
                    ShapeStyle {
                        fill,
                        outline,
                        outline_width,
                    },
                );
            }
            Step::DrawText {
                at,
                text,
                font,
                font_size,
                fill,
                fill_padding,
                background,
                angle,
            } => {
                let style = TextStyle {
                    font,
                    font_size,
                    fill,
                    fill_padding,
                    background,
                    angle,
                };
                pipeline.draw_text(at, text, style);
            }
        }
    }
}

impl Recipe {
    pub fn parse(content: &str) -> Result<Self, RecipeError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, RecipeError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Enqueue every step, in order.
    pub fn apply<'p>(&self, pipeline: &'p mut Pipeline) -> &'p mut Pipeline {
        for step in &self.steps {
            step.apply(pipeline);
        }
        pipeline
    }
}
