//! Built-in loaders: turn an external source into a surface plus metadata.
//!
//! A loader produces a [`Loaded`] triple: the decoded surface, an optional
//! filename, and an optional EXIF bag. The pipeline stores the surface as its
//! loaded surface and overwrites filename/EXIF only when they are present.
//!
//! Decoding goes through the `image` crate's decoder interface so the EXIF
//! orientation and raw EXIF block can be read before the pixels are
//! materialized:
//!
//! ```text
//! bytes → ImageReader (format sniffed) → decoder
//!       → orientation() + exif_metadata()
//!       → DynamicImage::from_decoder → apply_orientation → Surface
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageDecoder, ImageReader};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imaging::metadata::{parse_exif, read_container};
use crate::imaging::{Exif, Surface};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid surface: {0}")]
    InvalidSurface(String),
}

impl From<image::ImageError> for LoaderError {
    fn from(e: image::ImageError) -> Self {
        LoaderError::Decode(e.to_string())
    }
}

/// Flags recognized by the decoding loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Apply the EXIF orientation tag so the surface is upright.
    pub fix_orientation: bool,
    /// Collect EXIF tags into the metadata bag.
    pub read_exif: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fix_orientation: true,
            read_exif: true,
        }
    }
}

/// What a loader hands back to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub surface: Surface,
    pub file_name: Option<String>,
    pub exif: Option<Exif>,
}

impl Loaded {
    /// A bare surface with no metadata.
    pub fn surface(surface: Surface) -> Self {
        Self {
            surface,
            file_name: None,
            exif: None,
        }
    }
}

/// An external image source.
#[derive(Debug, Clone)]
pub enum Source {
    /// Encoded bytes, with an optional name to report.
    Blob {
        bytes: Vec<u8>,
        file_name: Option<String>,
    },
    /// A file on disk; its file name becomes the pipeline filename.
    File(PathBuf),
    /// An already-decoded raster.
    Surface(Surface),
    Image(DynamicImage),
}

impl Source {
    /// Load the source. Decoding sources honor `options`.
    pub fn load(self, options: LoadOptions) -> Result<Loaded, LoaderError> {
        match self {
            Source::Blob { bytes, file_name } => {
                let mut loaded = decode_blob(&bytes, options)?;
                loaded.file_name = file_name;
                Ok(loaded)
            }
            Source::File(path) => load_file(&path, options),
            Source::Surface(surface) => Ok(Loaded::surface(surface)),
            Source::Image(image) => Surface::from_dynamic(image)
                .map(Loaded::surface)
                .map_err(|e| LoaderError::InvalidSurface(e.to_string())),
        }
    }
}

/// Decode encoded bytes in any enabled format.
///
/// The result carries EXIF when `options.read_exif` is set (an empty map if
/// the image has none) and never a filename.
pub fn decode_blob(bytes: &[u8], options: LoadOptions) -> Result<Loaded, LoaderError> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;

    let orientation = decoder.orientation()?;
    let exif = if options.read_exif {
        let raw = decoder.exif_metadata()?;
        Some(match raw {
            Some(raw) => parse_exif(&raw),
            // TIFF files are their own EXIF container
            None if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") => {
                read_container(bytes)
            }
            None => Exif::new(),
        })
    } else {
        None
    };

    let mut image = DynamicImage::from_decoder(decoder)?;
    if options.fix_orientation {
        image.apply_orientation(orientation);
    }

    let surface =
        Surface::from_dynamic(image).map_err(|e| LoaderError::InvalidSurface(e.to_string()))?;
    tracing::debug!(
        width = surface.width(),
        height = surface.height(),
        exif_tags = exif.as_ref().map_or(0, |e| e.len()),
        "decoded image"
    );

    Ok(Loaded {
        surface,
        file_name: None,
        exif,
    })
}

/// Read and decode a file; the file name becomes the pipeline filename.
pub fn load_file(path: &Path, options: LoadOptions) -> Result<Loaded, LoaderError> {
    let bytes = std::fs::read(path)?;
    let mut loaded = decode_blob(&bytes, options)?;
    loaded.file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok(loaded)
}
