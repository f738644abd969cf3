//! Configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. User values are
//! merged over the stock defaults, so a config file only needs the keys it
//! changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_format = "avif"          # avif | jpeg | png | webp
//! quality = 1.0                   # 0.1-1.0, applied to every edit
//! removal_level = 0               # HTML mode: ancestors removed with an image
//! order_field_prefix = "image_order_"
//!
//! [compression]
//! max_file_size = "2MB"           # default budget of the compress tool
//! max_width = 1920
//! max_height = 1080
//! initial_quality = 0.8
//! quality_step = 0.1
//! min_quality = 0.1
//! resize_step = 0.9
//! max_attempts = 10
//! bytes_per_pixel = 1.2
//!
//! [[inputs]]
//! name = "gallery"
//! max_count = 5                   # 0 = unlimited
//! max_size = "2MB"                # "0" = unlimited
//! duplicates = "ask"              # ask | keep | skip
//!
//! [messages]
//! maxImagesExceeded = "Maximum {max} images allowed. You already uploaded {current}."
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{CompressionSettings, OutputFormat, Quality};
use crate::units::parse_size_to_bytes;
use crate::validation::{DuplicatePolicy, InputLimits};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

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

/// Configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CraftConfig {
    /// Encoding of every edited raster.
    pub output_format: OutputFormat,
    /// Quality of crop/rotate/flip encodes.
    pub quality: f32,
    /// HTML edit mode: how many ancestors of a removed image go with it.
    pub removal_level: usize,
    /// Prefix of the hidden order field names.
    pub order_field_prefix: String,
    pub compression: CompressionConfig,
    /// Declared inputs, one per group.
    pub inputs: Vec<InputConfig>,
    /// Localized overrides for user-facing messages.
    pub messages: HashMap<String, String>,
}

impl Default for CraftConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            quality: 1.0,
            removal_level: 0,
            order_field_prefix: "image_order_".to_string(),
            compression: CompressionConfig::default(),
            inputs: Vec::new(),
            messages: HashMap::new(),
        }
    }
}

impl CraftConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_quality("quality", self.quality)?;
        self.compression.validate()?;

        let mut seen = HashSet::new();
        for input in &self.inputs {
            if input.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "inputs.name must not be empty".into(),
                ));
            }
            if !seen.insert(input.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "input '{}' is declared twice",
                    input.name
                )));
            }
            check_size(&format!("inputs.{}.max_size", input.name), &input.max_size)?;
        }

        let mut unknown: Vec<&str> = self
            .messages
            .keys()
            .map(String::as_str)
            .filter(|k| !crate::messages::is_known_key(k))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(ConfigError::Validation(format!(
                "unknown message keys: {}",
                unknown.join(", ")
            )));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    /// The declared input named `name`.
    pub fn input(&self, name: &str) -> Option<&InputConfig> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

fn check_quality(key: &str, value: f32) -> Result<(), ConfigError> {
    if !(Quality::MIN..=Quality::MAX).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{key} must be between {} and {}",
            Quality::MIN,
            Quality::MAX
        )));
    }
    Ok(())
}

/// Sizes must parse, except for an explicit `"0"`.
fn check_size(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim() != "0" && parse_size_to_bytes(value) == 0 {
        return Err(ConfigError::Validation(format!(
            "{key} '{value}' is not a size (use e.g. \"500KB\", \"2MB\" or \"0\")"
        )));
    }
    Ok(())
}

/// Compress tool defaults and planner tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Default byte budget offered by the compress tool.
    pub max_file_size: String,
    pub max_width: u32,
    pub max_height: u32,
    pub initial_quality: f32,
    pub quality_step: f32,
    pub min_quality: f32,
    pub resize_step: f32,
    pub max_attempts: u32,
    pub bytes_per_pixel: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        let settings = CompressionSettings::default();
        Self {
            max_file_size: "2MB".to_string(),
            max_width: 1920,
            max_height: 1080,
            initial_quality: 0.8,
            quality_step: settings.quality_step,
            min_quality: settings.min_quality,
            resize_step: settings.resize_step,
            max_attempts: settings.max_attempts,
            bytes_per_pixel: settings.bytes_per_pixel,
        }
    }
}

impl CompressionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_size("compression.max_file_size", &self.max_file_size)?;
        check_quality("compression.initial_quality", self.initial_quality)?;
        check_quality("compression.min_quality", self.min_quality)?;
        if self.min_quality > self.initial_quality {
            return Err(ConfigError::Validation(
                "compression.min_quality must not exceed compression.initial_quality".into(),
            ));
        }
        if !(self.quality_step > 0.0 && self.quality_step <= 1.0) {
            return Err(ConfigError::Validation(
                "compression.quality_step must be in (0, 1]".into(),
            ));
        }
        if !(self.resize_step > 0.0 && self.resize_step < 1.0) {
            return Err(ConfigError::Validation(
                "compression.resize_step must be in (0, 1)".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "compression.max_attempts must be at least 1".into(),
            ));
        }
        if self.bytes_per_pixel <= 0.0 {
            return Err(ConfigError::Validation(
                "compression.bytes_per_pixel must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn settings(&self) -> CompressionSettings {
        CompressionSettings {
            quality_step: self.quality_step,
            min_quality: self.min_quality,
            resize_step: self.resize_step,
            max_attempts: self.max_attempts,
            bytes_per_pixel: self.bytes_per_pixel,
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        parse_size_to_bytes(&self.max_file_size)
    }

    pub fn initial_quality(&self) -> Quality {
        Quality::new(self.initial_quality)
    }
}

/// Where an input's images come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Files chosen through a file input.
    #[default]
    Upload,
    /// Images adopted from a collaborator-owned HTML fragment.
    Html,
}

/// One `[[inputs]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub name: String,
    pub mode: InputMode,
    pub max_count: usize,
    pub max_size: String,
    pub duplicates: DuplicatePolicy,
    /// HTML mode: classes an image (or an ancestor) must carry to be adopted.
    pub required_classes: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            mode: InputMode::default(),
            max_count: 0,
            max_size: "0".to_string(),
            duplicates: DuplicatePolicy::default(),
            required_classes: Vec::new(),
        }
    }
}

impl InputConfig {
    pub fn limits(&self) -> InputLimits {
        InputLimits {
            max_count: self.max_count,
            max_size: parse_size_to_bytes(&self.max_size),
            duplicates: self.duplicates,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(CraftConfig::default())?)
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<CraftConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CraftConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to the defaults when it is absent.
pub fn load_config(path: &Path) -> Result<CraftConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_none() {
        log::debug!("no config at {}, using defaults", path.display());
    }
    resolve_config(overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Craft Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Encoding of edited images: "avif", "jpeg", "png" or "webp".
output_format = "avif"

# Quality of crop/rotate/flip results (0.1 = smallest, 1.0 = best).
# Only affects lossy formats (avif, jpeg).
quality = 1.0

# HTML edit mode: number of ancestor levels removed together with an image.
# 0 removes the <img> itself, 1 its parent (e.g. a <figure>), and so on.
removal_level = 0

# Prefix of the hidden order fields ("<prefix><input name>[]").
order_field_prefix = "image_order_"

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Default target of "compress by file size" (e.g. "500KB", "2MB").
max_file_size = "2MB"

# Default bounds of "compress by dimensions" (0 = unbounded).
max_width = 1920
max_height = 1080

# Starting quality of the file-size search.
initial_quality = 0.8

# The search lowers quality by quality_step until min_quality, then shrinks
# both dimensions by resize_step and starts over at initial_quality.
quality_step = 0.1
min_quality = 0.1
resize_step = 0.9

# Encode attempts before giving up and keeping the smallest result.
max_attempts = 10

# Bytes per pixel assumed by the live size estimate (advisory only).
bytes_per_pixel = 1.2

# ---------------------------------------------------------------------------
# Inputs
# ---------------------------------------------------------------------------
# One entry per image field. Repeat [[inputs]] for more fields.
#
# [[inputs]]
# name = "gallery"
# mode = "upload"           # "upload" or "html"
# max_count = 5             # 0 = unlimited
# max_size = "2MB"          # "0" = unlimited
# duplicates = "ask"        # "ask", "keep" or "skip"
# required_classes = []     # html mode: only adopt images carrying these classes

# ---------------------------------------------------------------------------
# Messages
# ---------------------------------------------------------------------------
# Override any user-facing text. Placeholders use {name}.
[messages]
# duplicate = "File \"{filename}\" already exists. Do you want to add it anyway?"
# maxImagesExceeded = "Maximum {max} images allowed. You already uploaded {current}."
# fileTooLarge = "Some files are too large. Maximum file size is {max_size}."
# resetWarning = "Are you sure you want to reset this image to its original state?"
# discardEdits = "You have unsaved edits. Do you want to discard them?"
"##
}
