//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `pixchain.toml` files. A config
//! supplies the defaults a [`Pipeline`](crate::pipeline::Pipeline) falls back
//! on whenever a call leaves a parameter unset: the placeholder filename,
//! export mime/quality, loader flags, the pixelize threshold, and draw styling.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! file_name = "image"       # Placeholder until a loader supplies a name
//!
//! [export]
//! mime = "image/jpeg"       # image/jpeg, image/png, image/webp, image/bmp, image/tiff
//! quality = "1.0"           # Lossy quality in [0, 1], as a string
//!
//! [loader]
//! fix_orientation = true    # Apply the EXIF orientation tag on decode
//! read_exif = true          # Collect EXIF tags into the metadata bag
//!
//! [filters]
//! pixelize_threshold = 0.2  # Block size as a fraction of each dimension
//!
//! [draw]
//! fill = "green"
//! outline = "red"
//! line_width = 6.0
//! outline_width = 6.0
//! font = "16px sans-serif"
//! text_fill = "green"
//!
//! [processing]
//! max_threads = 4           # Omit for auto (= CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [draw]
//! fill = "#ff8800"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::exporter::MimeType;
use crate::imaging::{DrawDefaults, FontSpec, Quality, parse_color};
use crate::loader::LoadOptions;

/// File looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "pixchain.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `pixchain.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Filename reported before any loader supplies one.
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Export defaults (mime type, quality).
    pub export: ExportConfig,
    /// Loader flags.
    pub loader: LoadOptions,
    /// Filter defaults.
    pub filters: FiltersConfig,
    /// Draw styling defaults.
    pub draw: DrawConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

fn default_file_name() -> String {
    "image".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            export: ExportConfig::default(),
            loader: LoadOptions::default(),
            filters: FiltersConfig::default(),
            draw: DrawConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_name.trim().is_empty() {
            return Err(ConfigError::Validation("file_name must not be empty".into()));
        }
        if Quality::parse(&self.export.quality).is_none() {
            return Err(ConfigError::Validation(format!(
                "export.quality must be a number in [0, 1], got {:?}",
                self.export.quality
            )));
        }
        if MimeType::parse(&self.export.mime).is_none() {
            return Err(ConfigError::Validation(format!(
                "export.mime {:?} is not a supported export type",
                self.export.mime
            )));
        }
        if !self.filters.pixelize_threshold.is_finite() {
            return Err(ConfigError::Validation(
                "filters.pixelize_threshold must be finite".into(),
            ));
        }
        self.draw.validate()
    }
}

/// Export defaults used by `save_as_*` calls that omit mime or quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub mime: String,
    /// Lossy quality in `[0, 1]`, string-typed like the export calls.
    pub quality: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mime: "image/jpeg".to_string(),
            quality: "1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiltersConfig {
    /// Pixelize block size as a fraction of each dimension.
    pub pixelize_threshold: f32,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            pixelize_threshold: 0.2,
        }
    }
}

/// Draw styling defaults, used where a style leaves a field unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawConfig {
    pub fill: String,
    pub outline: String,
    pub line_width: f32,
    pub outline_width: f32,
    /// CSS font shorthand.
    pub font: String,
    pub text_fill: String,
}

impl Default for DrawConfig {
    fn default() -> Self {
        let defaults = DrawDefaults::default();
        Self {
            fill: defaults.fill,
            outline: defaults.outline,
            line_width: defaults.line_width,
            outline_width: defaults.outline_width,
            font: defaults.font,
            text_fill: defaults.text_fill,
        }
    }
}

impl DrawConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, color) in [
            ("fill", &self.fill),
            ("outline", &self.outline),
            ("text_fill", &self.text_fill),
        ] {
            parse_color(color)
                .map_err(|e| ConfigError::Validation(format!("draw.{key}: {e}")))?;
        }
        for (key, width) in [
            ("line_width", self.line_width),
            ("outline_width", self.outline_width),
        ] {
            if !width.is_finite() || width <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "draw.{key} must be positive, got {width}"
                )));
            }
        }
        FontSpec::parse(&self.font)
            .map_err(|e| ConfigError::Validation(format!("draw.font: {e}")))?;
        Ok(())
    }

    pub fn to_defaults(&self) -> DrawDefaults {
        DrawDefaults {
            fill: self.fill.clone(),
            outline: self.outline.clone(),
            line_width: self.line_width,
            outline_width: self.outline_width,
            font: self.font.clone(),
            text_fill: self.text_fill.clone(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of threads for row-parallel pixel loops.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_threads
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load an explicit config file.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Load `pixchain.toml` from the given directory.
///
/// Returns the stock defaults when no file exists. Merges user values on
/// top of stock defaults, rejects unknown keys, and validates the result.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return resolve_config(None);
    }
    load_config_file(&path)
}

/// Returns a fully-commented stock `pixchain.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixchain Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as pixchain.toml in the working directory, or pass
# --config <FILE>. Unknown keys will cause an error.

# Filename reported before a loader supplies one.
file_name = "image"

# ---------------------------------------------------------------------------
# Export defaults (used when a save call omits mime or quality)
# ---------------------------------------------------------------------------
[export]
# One of: image/jpeg, image/png, image/webp, image/bmp, image/tiff
mime = "image/jpeg"
# Lossy quality in [0, 1]. Only JPEG is lossy; other formats ignore it.
quality = "1.0"

# ---------------------------------------------------------------------------
# Loader flags
# ---------------------------------------------------------------------------
[loader]
# Rotate/flip decoded images according to their EXIF orientation tag.
fix_orientation = true
# Collect EXIF tags (Make, Model, DateTime, ...) into the metadata bag.
read_exif = true

# ---------------------------------------------------------------------------
# Filter defaults
# ---------------------------------------------------------------------------
[filters]
# Pixelize block size as a fraction of each dimension.
# 0.2 on a 400px-wide image gives 80px blocks. <= 0 disables pixelize.
pixelize_threshold = 0.2

# ---------------------------------------------------------------------------
# Draw defaults (used when a style leaves a field unset)
# ---------------------------------------------------------------------------
[draw]
# Any CSS color: names, #rgb, #rrggbb, #rrggbbaa, rgb(), rgba().
fill = "green"
outline = "red"
line_width = 6.0
outline_width = 6.0
# CSS font shorthand: [style] [weight] size family
font = "16px sans-serif"
text_fill = "green"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum threads for pixel loops. Omit to use all CPU cores.
# Values larger than the core count are clamped down.
# max_threads = 4
"##
}
