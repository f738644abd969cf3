//! Resolvable raster references.
//!
//! A [`RasterUrl`] is what preview elements point at. Local references
//! (`blob:image-craft/<uuid>`) are minted by the [`RasterRegistry`] for bytes
//! held in memory and must be revoked exactly once. External references
//! (remote `https://` URLs of hydrated or adopted images) are owned by someone
//! else and are never revoked.

use crate::store::SourceFile;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

const LOCAL_PREFIX: &str = "blob:image-craft/";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RasterError {
    #[error("No raster registered for {0}")]
    NotFound(String),
    #[error("Raster {0} was already revoked")]
    AlreadyRevoked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RasterUrl(String);

impl RasterUrl {
    /// Reference to an externally hosted raster.
    pub fn external(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this reference was minted locally and must be revoked.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }
}

impl fmt::Display for RasterUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live local rasters.
///
/// Entries share their bytes with the owning record's `SourceFile`, so a live
/// URL always decodes to exactly the content that will be submitted.
#[derive(Debug, Default)]
pub struct RasterRegistry {
    live: HashMap<String, SourceFile>,
    revoked: HashSet<String>,
}

impl RasterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new local reference for `file`.
    pub fn create(&mut self, file: &SourceFile) -> RasterUrl {
        let url = format!("{LOCAL_PREFIX}{}", crate::units::generate_id());
        self.live.insert(url.clone(), file.clone());
        log::debug!("created {url} for {} ({} bytes)", file.name, file.size());
        RasterUrl(url)
    }

    /// Bytes behind a local reference. External references resolve to `None`.
    pub fn resolve(&self, url: &RasterUrl) -> Option<&SourceFile> {
        self.live.get(url.as_str())
    }

    pub fn is_live(&self, url: &RasterUrl) -> bool {
        self.live.contains_key(url.as_str())
    }

    /// Release a local reference. External references are a no-op.
    ///
    /// Revoking the same reference twice is an error and is logged.
    pub fn revoke(&mut self, url: &RasterUrl) -> Result<(), RasterError> {
        if !url.is_local() {
            return Ok(());
        }
        if self.live.remove(url.as_str()).is_some() {
            self.revoked.insert(url.0.clone());
            log::debug!("revoked {url}");
            return Ok(());
        }
        if self.revoked.contains(url.as_str()) {
            log::warn!("double revoke of {url}");
            Err(RasterError::AlreadyRevoked(url.0.clone()))
        } else {
            Err(RasterError::NotFound(url.0.clone()))
        }
    }

    /// Number of local references still alive.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }
}
