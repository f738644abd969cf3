//! # Image Craft
//!
//! An image collection manager for form uploads. Users add pictures to a named
//! collection, reorder them, edit them non-destructively (crop, rotate, flip,
//! compress) and submit them with a form. The original file of every record is
//! kept, so any edit can be reset.
//!
//! # Architecture: Store, Controller, Surfaces
//!
//! ```text
//! files / URLs / HTML  →  validation  →  ImageStore  →  preview / HTML sync
//!                                           ↑  ↓
//!                               edit session → imaging pipeline
//! ```
//!
//! The [`store::ImageStore`] is the single source of truth. It maps a group
//! name to an ordered list of [`store::ImageRecord`]s. Everything else either
//! writes to it through the [`controller::CollectionController`] or renders
//! from it:
//!
//! - **Preview** ([`preview`]) re-renders the thumbnail strip after every change
//!   and is the only place drag-and-drop reordering happens. The controller
//!   then rebuilds the store order from the preview's visual order.
//! - **HTML sync** ([`html_sync`]) is the other renderer: in HTML mode the
//!   images live inside a content container and record changes are written
//!   back into its `<img>` elements.
//! - **Submission** ([`submission`]) reads the store in order to produce the
//!   multipart form parts.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Group → ordered records, reorder reconciliation, record patches |
//! | [`raster`] | Local object URLs for displayable rasters, create / revoke |
//! | [`validation`] | Admission gate: image-only filter, duplicates, count and size limits |
//! | [`imaging`] | Pure-Rust crop / rotate / flip / compress on top of the `image` crate |
//! | [`session`] | Modal focus and the pending-edit session of the open tool |
//! | [`controller`] | Wires store, rasters, preview and imaging per collection instance |
//! | [`preview`] | Thumbnail strip model, reordering, rendered with Maud |
//! | [`html_sync`] | Image adoption from and write-back into a content container |
//! | [`hydration`] | Fetching existing images from a URL list |
//! | [`submission`] | Multipart form parts and order fields |
//! | [`messages`] | Localizable user-facing strings with `{placeholder}` substitution |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//! | [`units`] | Size strings, byte formatting, ids, field-name sanitizing |
//!
//! # Design Decisions
//!
//! ## Non-Destructive Edits
//!
//! A record holds both `original_file` and `current_file`. Edits always decode
//! the current file, transform it and encode a new file that replaces the
//! current one. Reset copies the original back. Nothing ever overwrites the
//! original.
//!
//! ## Explicit Raster Lifetime
//!
//! Every displayable raster is a [`raster::RasterUrl`] registered in a
//! [`raster::RasterRegistry`]. A URL is revoked exactly once: when its record
//! is removed, when an edit replaces it, or when the collection is cleaned up.
//! Revoking twice is an error, which keeps leaks and double frees visible in
//! tests.
//!
//! ## Ports For Everything Interactive
//!
//! Duplicate prompts, discard-edit confirmations and network fetches are
//! traits ([`validation::DuplicateDecider`], [`session::ConfirmPrompt`],
//! [`hydration::ImageFetcher`]). The CLI answers them with flags, tests with
//! closures and recording mocks.
//!
//! ## AVIF By Default
//!
//! Edited images are encoded as AVIF unless configured otherwise. JPEG, PNG
//! and WebP are available for forms whose backend cannot decode AVIF.

pub mod config;
pub mod controller;
pub mod html_sync;
pub mod hydration;
pub mod imaging;
pub mod messages;
pub mod output;
pub mod preview;
pub mod raster;
pub mod session;
pub mod store;
pub mod submission;
pub mod units;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;
