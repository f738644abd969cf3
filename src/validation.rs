//! Validation gate for incoming files.
//!
//! Runs before any record is created:
//!
//! 1. drop files whose declared MIME type is not `image/*`
//! 2. reject the whole batch when `existing + candidates > max_count`
//! 3. reject the whole batch when any candidate exceeds `max_size`
//! 4. per file, ask the [`DuplicateDecider`] about name+size duplicates
//!
//! Count and size limits of `0` mean unlimited.

use crate::store::{ImageRecord, SourceFile};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Too many files: at most {max} allowed, {current} already present")]
    TooManyFiles { max: usize, current: usize },
    #[error("Files exceed the {max_size} byte limit: {}", names.join(", "))]
    FileTooLarge { max_size: u64, names: Vec<String> },
}

/// What to do when a candidate duplicates an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Consult the decider for each duplicate.
    #[default]
    Ask,
    Keep,
    Skip,
}

/// A duplicate awaiting a keep/skip decision.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateRequest<'a> {
    pub group: &'a str,
    pub file: &'a SourceFile,
}

/// Port answering duplicate confirmations (a dialog, a CLI flag, a test).
pub trait DuplicateDecider {
    /// `true` keeps the duplicate, `false` skips it.
    fn keep_duplicate(&mut self, request: &DuplicateRequest<'_>) -> bool;
}

impl<F> DuplicateDecider for F
where
    F: FnMut(&DuplicateRequest<'_>) -> bool,
{
    fn keep_duplicate(&mut self, request: &DuplicateRequest<'_>) -> bool {
        self(request)
    }
}

/// Per-input limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputLimits {
    pub max_count: usize,
    pub max_size: u64,
    pub duplicates: DuplicatePolicy,
}

/// Files that passed the gate, plus what was filtered out along the way.
#[derive(Debug, Clone, Default)]
pub struct Admission {
    /// Approved files, in their original order.
    pub admitted: Vec<SourceFile>,
    /// Names of files dropped for not being images.
    pub not_images: Vec<String>,
    /// Names of duplicates the decider (or policy) declined.
    pub skipped_duplicates: Vec<String>,
}

/// Run the gate for one batch against the group's current records.
pub fn validate(
    group: &str,
    candidates: Vec<SourceFile>,
    existing: &[ImageRecord],
    limits: &InputLimits,
    decider: &mut dyn DuplicateDecider,
) -> Result<Admission, ValidationError> {
    let (images, others): (Vec<_>, Vec<_>) = candidates.into_iter().partition(SourceFile::is_image);
    let not_images: Vec<String> = others.into_iter().map(|f| f.name).collect();
    if !not_images.is_empty() {
        log::info!("{group}: ignoring non-image files {not_images:?}");
    }

    let current = existing.len();
    if limits.max_count > 0 && current + images.len() > limits.max_count {
        return Err(ValidationError::TooManyFiles {
            max: limits.max_count,
            current,
        });
    }

    if limits.max_size > 0 {
        let names: Vec<String> = images
            .iter()
            .filter(|f| f.size() > limits.max_size)
            .map(|f| f.name.clone())
            .collect();
        if !names.is_empty() {
            return Err(ValidationError::FileTooLarge {
                max_size: limits.max_size,
                names,
            });
        }
    }

    let mut admission = Admission {
        not_images,
        ..Admission::default()
    };
    for file in images {
        // Earlier files of the same batch count as existing.
        let duplicate = existing.iter().any(|r| r.is_duplicate_of(&file))
            || admission
                .admitted
                .iter()
                .any(|f| f.name == file.name && f.size() == file.size());
        let keep = !duplicate
            || match limits.duplicates {
                DuplicatePolicy::Keep => true,
                DuplicatePolicy::Skip => false,
                DuplicatePolicy::Ask => decider.keep_duplicate(&DuplicateRequest {
                    group,
                    file: &file,
                }),
            };
        if keep {
            admission.admitted.push(file);
        } else {
            log::info!("{group}: skipping duplicate {}", file.name);
            admission.skipped_duplicates.push(file.name);
        }
    }
    Ok(admission)
}
