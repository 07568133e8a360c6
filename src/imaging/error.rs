use thiserror::Error;

/// Failures raised by transform, filter, and draw stages at execution time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImagingError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
    #[error(
        "Crop {width}x{height} at ({x},{y}) exceeds source {source_width}x{source_height}"
    )]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        source_width: u32,
        source_height: u32,
    },
    #[error("Invalid perspective points: {0}")]
    InvalidPerspectivePoints(String),
    #[error("Invalid points: {0}")]
    InvalidPoints(String),
    #[error("Invalid color: {0:?}")]
    InvalidColor(String),
    #[error("Invalid font: {0}")]
    InvalidFont(String),
}
