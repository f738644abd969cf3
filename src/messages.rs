//! Localizable user-facing messages.
//!
//! Every text shown to an end user comes from a [`MessageTable`]. Templates
//! use named `{placeholders}`; a config's `[messages]` table overrides any
//! key. Errors are mapped to templates by [`MessageTable::user_message`] so
//! record ids and URLs stay in the logs.

use crate::controller::CraftError;
use crate::imaging::{CompressionResult, EditError};
use crate::units::format_file_size;
use crate::validation::ValidationError;
use std::collections::HashMap;

pub const DUPLICATE: &str = "duplicate";
pub const MAX_IMAGES_EXCEEDED: &str = "maxImagesExceeded";
pub const FILE_TOO_LARGE: &str = "fileTooLarge";
pub const RESET_WARNING: &str = "resetWarning";
pub const DISCARD_EDITS: &str = "discardEdits";
pub const NO_IMAGE_TO_DOWNLOAD: &str = "noImageToDownload";
pub const COMPRESSION_COMPLETE: &str = "compressionComplete";
pub const COMPRESSION_FAILED: &str = "compressionFailed";
pub const FILE_SIZE_REDUCED: &str = "fileSizeReduced";
pub const DIMENSIONS_CHANGED: &str = "dimensionsChanged";
pub const NO_COMPRESSION_NEEDED: &str = "noCompressionNeeded";
pub const OVER_BUDGET: &str = "overBudget";
pub const EDIT_FAILED: &str = "editFailed";
pub const CROP_EMPTY: &str = "cropEmpty";
pub const IMAGE_UNAVAILABLE: &str = "imageUnavailable";
pub const LOAD_FAILED: &str = "loadFailed";
pub const GENERIC_ERROR: &str = "genericError";

const DEFAULTS: &[(&str, &str)] = &[
    (
        DUPLICATE,
        "File \"{filename}\" already exists. Do you want to add it anyway?",
    ),
    (
        MAX_IMAGES_EXCEEDED,
        "Maximum {max} images allowed. You already uploaded {current}.",
    ),
    (
        FILE_TOO_LARGE,
        "Some files are too large. Maximum file size is {max_size}.",
    ),
    (
        RESET_WARNING,
        "Are you sure you want to reset this image to its original state?",
    ),
    (
        DISCARD_EDITS,
        "You have unsaved edits. Do you want to discard them?",
    ),
    (NO_IMAGE_TO_DOWNLOAD, "No image to download"),
    (COMPRESSION_COMPLETE, "Compression complete"),
    (COMPRESSION_FAILED, "Compression failed"),
    (
        FILE_SIZE_REDUCED,
        "File size reduced from {original} to {compressed} ({reduction}% reduction)",
    ),
    (
        DIMENSIONS_CHANGED,
        "Dimensions changed from {old_width}×{old_height} to {new_width}×{new_height}",
    ),
    (
        NO_COMPRESSION_NEEDED,
        "Image is already within the specified limits",
    ),
    (
        OVER_BUDGET,
        "Could not reach {target}. The smallest result is {size}.",
    ),
    (EDIT_FAILED, "The image could not be edited. Please try again."),
    (CROP_EMPTY, "The selected area does not cover the image."),
    (IMAGE_UNAVAILABLE, "This image is not available for editing."),
    (LOAD_FAILED, "Some existing images could not be loaded."),
    (
        GENERIC_ERROR,
        "An error occurred while processing the files. Please try again.",
    ),
];

/// Whether `key` names a known message.
pub fn is_known_key(key: &str) -> bool {
    DEFAULTS.iter().any(|(k, _)| *k == key)
}

pub fn known_keys() -> impl Iterator<Item = &'static str> {
    DEFAULTS.iter().map(|(k, _)| *k)
}

#[derive(Debug, Clone)]
pub struct MessageTable {
    templates: HashMap<String, String>,
}

impl Default for MessageTable {
    fn default() -> Self {
        Self {
            templates: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl MessageTable {
    /// Stock English table with `overrides` applied on top.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut table = Self::default();
        for (key, text) in overrides {
            table.templates.insert(key.clone(), text.clone());
        }
        table
    }

    /// Raw template; unknown keys fall back to the key itself.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.templates.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Template with `{name}` placeholders substituted.
    pub fn render(&self, key: &str, args: &[(&str, String)]) -> String {
        let mut text = self.get(key).to_string();
        for (name, value) in args {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }

    pub fn duplicate(&self, filename: &str) -> String {
        self.render(DUPLICATE, &[("filename", filename.to_string())])
    }

    pub fn max_images_exceeded(&self, max: usize, current: usize) -> String {
        self.render(
            MAX_IMAGES_EXCEEDED,
            &[("max", max.to_string()), ("current", current.to_string())],
        )
    }

    pub fn file_too_large(&self, max_size: u64) -> String {
        self.render(FILE_TOO_LARGE, &[("max_size", format_file_size(max_size))])
    }

    /// Summary lines shown after a compression was applied.
    pub fn compression_report(&self, result: &CompressionResult) -> Vec<String> {
        let mut lines = Vec::new();
        let (old_w, old_h) = result.original_dimensions;
        let (new_w, new_h) = result.final_dimensions();
        if !result.dimensions_changed() && result.final_size() >= result.original_size {
            lines.push(self.get(NO_COMPRESSION_NEEDED).to_string());
            return lines;
        }
        lines.push(self.render(
            FILE_SIZE_REDUCED,
            &[
                ("original", format_file_size(result.original_size)),
                ("compressed", format_file_size(result.final_size())),
                ("reduction", result.reduction_percent().to_string()),
            ],
        ));
        if result.dimensions_changed() {
            lines.push(self.render(
                DIMENSIONS_CHANGED,
                &[
                    ("old_width", old_w.to_string()),
                    ("old_height", old_h.to_string()),
                    ("new_width", new_w.to_string()),
                    ("new_height", new_h.to_string()),
                ],
            ));
        }
        lines
    }

    pub fn over_budget(&self, target: u64, size: u64) -> String {
        self.render(
            OVER_BUDGET,
            &[
                ("target", format_file_size(target)),
                ("size", format_file_size(size)),
            ],
        )
    }

    /// Localized text for an error, free of internal identifiers.
    pub fn user_message(&self, error: &CraftError) -> String {
        match error {
            CraftError::Validation(ValidationError::TooManyFiles { max, current }) => {
                self.max_images_exceeded(*max, *current)
            }
            CraftError::Validation(ValidationError::FileTooLarge { max_size, .. }) => {
                self.file_too_large(*max_size)
            }
            CraftError::Edit(EditError::ZeroAreaCrop { .. }) => self.get(CROP_EMPTY).to_string(),
            CraftError::Edit(EditError::RasterMissing(_)) | CraftError::UnknownRecord { .. } => {
                self.get(IMAGE_UNAVAILABLE).to_string()
            }
            CraftError::Edit(_) => self.get(EDIT_FAILED).to_string(),
            CraftError::Hydration(_) => self.get(LOAD_FAILED).to_string(),
            CraftError::NoImage => self.get(NO_IMAGE_TO_DOWNLOAD).to_string(),
            CraftError::Raster(_) | CraftError::Sync(_) | CraftError::Config(_) => {
                self.get(GENERIC_ERROR).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{EncodedImage, OutputFormat, Quality};

    fn result(original: (u64, (u32, u32)), final_: (usize, (u32, u32))) -> CompressionResult {
        CompressionResult {
            encoded: EncodedImage {
                bytes: vec![0; final_.0],
                format: OutputFormat::Jpeg,
                width: final_.1.0,
                height: final_.1.1,
            },
            attempts: 1,
            final_quality: Quality::default(),
            original_size: original.0,
            original_dimensions: original.1,
            within_budget: true,
        }
    }

    #[test]
    fn defaults_render_placeholders() {
        let t = MessageTable::default();
        assert_eq!(
            t.max_images_exceeded(2, 0),
            "Maximum 2 images allowed. You already uploaded 0."
        );
        assert_eq!(
            t.duplicate("cat.png"),
            "File \"cat.png\" already exists. Do you want to add it anyway?"
        );
        assert_eq!(
            t.file_too_large(2 * 1024 * 1024),
            "Some files are too large. Maximum file size is 2 MB."
        );
    }

    #[test]
    fn overrides_replace_templates() {
        let mut overrides = HashMap::new();
        overrides.insert(
            MAX_IMAGES_EXCEEDED.to_string(),
            "最多 {max} 张，已有 {current} 张".to_string(),
        );
        let t = MessageTable::with_overrides(&overrides);
        assert_eq!(t.max_images_exceeded(3, 1), "最多 3 张，已有 1 张");
        assert_eq!(t.get(RESET_WARNING), MessageTable::default().get(RESET_WARNING));
    }

    #[test]
    fn unknown_key_falls_back_to_key() {
        assert_eq!(MessageTable::default().get("nope"), "nope");
        assert!(!is_known_key("nope"));
        assert!(is_known_key(DISCARD_EDITS));
    }

    #[test]
    fn compression_report_lists_size_and_dimensions() {
        let t = MessageTable::default();
        let lines = t.compression_report(&result((1024 * 1024, (400, 300)), (256 * 1024, (200, 150))));
        assert_eq!(
            lines,
            vec![
                "File size reduced from 1 MB to 256 KB (75% reduction)".to_string(),
                "Dimensions changed from 400×300 to 200×150".to_string(),
            ]
        );
    }

    #[test]
    fn compression_report_when_nothing_changed() {
        let t = MessageTable::default();
        let lines = t.compression_report(&result((100, (10, 10)), (120, (10, 10))));
        assert_eq!(lines, vec!["Image is already within the specified limits"]);
    }

    #[test]
    fn user_messages_hide_identifiers() {
        let t = MessageTable::default();
        let err = CraftError::UnknownRecord {
            group: "gallery".into(),
            id: "0b8f-secret-id".into(),
        };
        let text = t.user_message(&err);
        assert!(!text.contains("0b8f"));
        assert_eq!(text, "This image is not available for editing.");

        let err = CraftError::Validation(ValidationError::TooManyFiles { max: 2, current: 0 });
        assert_eq!(
            t.user_message(&err),
            "Maximum 2 images allowed. You already uploaded 0."
        );
    }
}
