//! Exporters: turn the final surface into an output representation.
//!
//! | Exporter | Output |
//! |---|---|
//! | [`BlobExporter`] | encoded bytes plus mime type and a matching file name |
//! | [`CanvasExporter`] | a copy of the raw surface |
//! | [`DataUriExporter`] | `data:<mime>;base64,<payload>` |
//!
//! Mime type and quality travel in [`ExportOptions`]; both are validated at
//! export time, never when the options are built.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use crate::imaging::{Quality, Surface};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("Nothing to export: no surface has been produced")]
    EmptySurface,
    #[error("Unsupported mime type: {0}")]
    UnsupportedMime(String),
    #[error("Invalid quality {0:?}: expected a number in [0, 1]")]
    InvalidQuality(String),
    #[error("Encode error: {0}")]
    Encode(String),
}

impl From<image::ImageError> for ExportError {
    fn from(e: image::ImageError) -> Self {
        ExportError::Encode(e.to_string())
    }
}

/// Export formats the encoders support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeType {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Tiff,
}

impl MimeType {
    pub fn parse(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(MimeType::Jpeg),
            "image/png" => Some(MimeType::Png),
            "image/webp" => Some(MimeType::WebP),
            "image/bmp" => Some(MimeType::Bmp),
            "image/tiff" => Some(MimeType::Tiff),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
            MimeType::WebP => "image/webp",
            MimeType::Bmp => "image/bmp",
            MimeType::Tiff => "image/tiff",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MimeType::Jpeg => "jpg",
            MimeType::Png => "png",
            MimeType::WebP => "webp",
            MimeType::Bmp => "bmp",
            MimeType::Tiff => "tiff",
        }
    }
}

/// Mime type and quality for one export, both string-typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub mime: String,
    /// Number in `[0, 1]`; only JPEG uses it.
    pub quality: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            mime: "image/jpeg".to_string(),
            quality: "1.0".to_string(),
        }
    }
}

impl ExportOptions {
    fn resolve(&self) -> Result<(MimeType, Quality), ExportError> {
        let mime = MimeType::parse(&self.mime)
            .ok_or_else(|| ExportError::UnsupportedMime(self.mime.clone()))?;
        let quality = Quality::parse(&self.quality)
            .ok_or_else(|| ExportError::InvalidQuality(self.quality.clone()))?;
        Ok((mime, quality))
    }
}

/// Converts the export surface into some output.
pub trait Exporter {
    type Output;

    fn export(
        &self,
        surface: &Surface,
        file_name: &str,
        options: &ExportOptions,
    ) -> Result<Self::Output, ExportError>;
}

/// An encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
    /// The pipeline filename with its extension replaced to match `mime`.
    pub file_name: String,
}

pub struct BlobExporter;

impl Exporter for BlobExporter {
    type Output = Blob;

    fn export(
        &self,
        surface: &Surface,
        file_name: &str,
        options: &ExportOptions,
    ) -> Result<Blob, ExportError> {
        let (mime, quality) = options.resolve()?;
        let bytes = encode(surface, mime, quality)?;
        Ok(Blob {
            bytes,
            mime: mime.as_str().to_string(),
            file_name: with_extension(file_name, mime.extension()),
        })
    }
}

/// Returns a copy of the raw surface; mime and quality are ignored.
pub struct CanvasExporter;

impl Exporter for CanvasExporter {
    type Output = Surface;

    fn export(
        &self,
        surface: &Surface,
        _: &str,
        _: &ExportOptions,
    ) -> Result<Surface, ExportError> {
        Ok(surface.clone())
    }
}

pub struct DataUriExporter;

impl Exporter for DataUriExporter {
    type Output = String;

    fn export(
        &self,
        surface: &Surface,
        _file_name: &str,
        options: &ExportOptions,
    ) -> Result<String, ExportError> {
        let (mime, quality) = options.resolve()?;
        let bytes = encode(surface, mime, quality)?;
        Ok(format!("data:{};base64,{}", mime.as_str(), STANDARD.encode(bytes)))
    }
}

/// Encode a surface. JPEG drops alpha and maps quality to 1–100.
pub fn encode(surface: &Surface, mime: MimeType, quality: Quality) -> Result<Vec<u8>, ExportError> {
    let mut buf = Cursor::new(Vec::new());
    match mime {
        MimeType::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(surface.as_rgba().clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.percent()).encode_image(&rgb)?;
        }
        MimeType::Png => surface.to_dynamic().write_to(&mut buf, ImageFormat::Png)?,
        MimeType::WebP => surface.to_dynamic().write_to(&mut buf, ImageFormat::WebP)?,
        MimeType::Bmp => surface.to_dynamic().write_to(&mut buf, ImageFormat::Bmp)?,
        MimeType::Tiff => surface.to_dynamic().write_to(&mut buf, ImageFormat::Tiff)?,
    }
    let bytes = buf.into_inner();
    tracing::debug!(mime = mime.as_str(), bytes = bytes.len(), "encoded surface");
    Ok(bytes)
}

/// Replace (or add) the extension of a bare file name.
fn with_extension(file_name: &str, extension: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    format!("{stem}.{extension}")
}
