//! Pixel work: pure functions from surface to surface.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Resize** | `image::imageops::resize` (Lanczos3 by default) |
//! | **Crop / pad** | `image::imageops::crop_imm` / `overlay` |
//! | **Rotate / perspective** | inverse-mapped bilinear sampling, rows in parallel via `rayon` |
//! | **Grayscale / pixelize / blur** | hand-written loops, rows in parallel via `rayon` |
//! | **Shapes** | `tiny-skia` (re-exported by `resvg`) |
//! | **Text** | `usvg` layout + `resvg` rendering |
//! | **EXIF** | `kamadak-exif`, flattened to a JSON bag |
//!
//! The module is split into:
//! - **Surface / color**: the raster type and CSS color parsing
//! - **Calculations**: pure dimension math (unit testable)
//! - **Parameters**: option types describing operations
//! - **Transform / perspective / filter / draw / text**: the stage bodies

mod calculations;
pub mod color;
pub mod draw;
mod error;
pub mod filter;
pub(crate) mod metadata;
mod params;
pub mod perspective;
mod surface;
pub mod text;
pub mod transform;

pub use calculations::{
    calculate_block_size, calculate_contain_dimensions, calculate_fill_dimensions,
    calculate_fit_dimensions, calculate_rotated_bounds, center_offset,
};
pub use color::parse_color;
pub use draw::DrawDefaults;
pub use error::ImagingError;
pub use metadata::Exif;
pub use params::{
    CenterOptions, CircleOptions, FontSize, GrayscaleMethod, GrayscaleOptions, LineStyle, Paint,
    Points, Quality, Resample, ResizeMode, ResizeOptions, RotateOptions, ShapeStyle, TextStyle,
};
pub use surface::Surface;
pub use text::FontSpec;
pub(crate) use surface::{premultiply, unpremultiply};
