//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Edits (crop, rotate, flip, compress)
//!
//! ```text
//! photo.jpg → photo-edited.avif
//!     Before: 4000×3000, 3.2 MB
//!     After:  2000×1500, 412.5 KB
//! ```
//!
//! Compression adds the report lines and the search summary:
//!
//! ```text
//!     File size reduced from 3.2 MB to 480 KB (85% reduction)
//!     Dimensions changed from 4000×3000 to 1728×1296
//!     4 attempts, final quality 50%
//! ```
//!
//! ## Check
//!
//! ```text
//! gallery: 2 of 3 file(s) admitted
//!     001 cat.png (1000 Bytes)
//!     002 dog.png (1.5 KB)
//!     Not an image: notes.txt
//! ```
//!
//! ## Hydrate
//!
//! ```text
//! Loaded 1 of 2 existing image(s)
//!     001 existing_1.jpg ← https://cdn.example.com/a.jpg
//! ```

use crate::config::InputConfig;
use crate::controller::AddOutcome;
use crate::hydration::HydratedImage;
use crate::imaging::CompressionResult;
use crate::messages::MessageTable;
use crate::store::SourceFile;
use crate::units::format_file_size;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Dimensions and byte size of one side of an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSummary {
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

impl RasterSummary {
    fn describe(&self) -> String {
        format!(
            "{}×{}, {}",
            self.width,
            self.height,
            format_file_size(self.bytes)
        )
    }
}

// ============================================================================
// Edits
// ============================================================================

/// Format the result of a single-file edit.
pub fn format_edit(
    input: &Path,
    output: &Path,
    before: RasterSummary,
    after: RasterSummary,
) -> Vec<String> {
    vec![
        format!("{} → {}", file_name(input), file_name(output)),
        format!("{}Before: {}", indent(1), before.describe()),
        format!("{}After:  {}", indent(1), after.describe()),
    ]
}

/// Format a compression report on top of the edit summary.
pub fn format_compression(
    result: &CompressionResult,
    messages: &MessageTable,
    budget: Option<u64>,
) -> Vec<String> {
    let mut lines: Vec<String> = messages
        .compression_report(result)
        .into_iter()
        .map(|l| format!("{}{l}", indent(1)))
        .collect();
    lines.push(format!(
        "{}{} attempt{}, final quality {}",
        indent(1),
        result.attempts,
        if result.attempts == 1 { "" } else { "s" },
        result.final_quality
    ));
    if let Some(budget) = budget
        && !result.within_budget
    {
        lines.push(format!(
            "{}{}",
            indent(1),
            messages.over_budget(budget, result.final_size())
        ));
    }
    lines
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the admission of a batch against an input's limits.
pub fn format_check(input: &InputConfig, files: &[SourceFile], outcome: &AddOutcome) -> Vec<String> {
    let total = files.len();
    let mut lines = vec![format!(
        "{}: {} of {} file(s) admitted",
        input.name,
        outcome.added.len(),
        total
    )];
    let admitted = files
        .iter()
        .filter(|f| !outcome.not_images.contains(&f.name))
        .filter(|f| !outcome.skipped_duplicates.contains(&f.name));
    for (i, file) in admitted.enumerate() {
        lines.push(format!(
            "{}{} {} ({})",
            indent(1),
            format_index(i + 1),
            file.name,
            format_file_size(file.size())
        ));
    }
    for name in &outcome.not_images {
        lines.push(format!("{}Not an image: {name}", indent(1)));
    }
    for name in &outcome.skipped_duplicates {
        lines.push(format!("{}Skipped duplicate: {name}", indent(1)));
    }
    lines
}

/// Format a rejected batch: the localized message, indented under the input.
pub fn format_rejection(input: &InputConfig, message: &str) -> Vec<String> {
    vec![
        format!("{}: rejected", input.name),
        format!("{}{message}", indent(1)),
    ]
}

// ============================================================================
// Hydrate
// ============================================================================

pub fn format_hydration(requested: usize, images: &[HydratedImage]) -> Vec<String> {
    let mut lines = vec![format!(
        "Loaded {} of {} existing image(s)",
        images.len(),
        requested
    )];
    for (i, image) in images.iter().enumerate() {
        lines.push(format!(
            "{}{} {} ← {} ({}, {})",
            indent(1),
            format_index(i + 1),
            image.file.name,
            image.url,
            image.file.mime,
            format_file_size(image.file.size())
        ));
    }
    lines
}
