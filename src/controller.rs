//! Collection controller: one managed input group.
//!
//! The controller ties the pieces together for a single group:
//!
//! | Step | Module |
//! |------|--------|
//! | admit files | [`validation`](crate::validation) |
//! | hold records | [`store`](crate::store) |
//! | mint/revoke raster references | [`raster`](crate::raster) |
//! | edit pixels | [`imaging`](crate::imaging) |
//! | show thumbnails, focus, order inputs | [`preview`](crate::preview) |
//! | mirror a collaborator fragment | [`html_sync`](crate::html_sync) |
//!
//! Shared state lives in a [`Workspace`] owned by the caller and passed by
//! reference, so several controllers can work against the same store.
//!
//! ## Edit commit
//!
//! Every edit runs to completion on the side (decode, transform, encode)
//! before anything is touched. Only a successful encode is committed: a new
//! raster reference is minted, the record is patched, the superseded
//! reference is revoked, and the preview (plus fragment in HTML mode) is
//! re-rendered from the store. A failure at any earlier step leaves the
//! record exactly as it was.

use crate::config::{ConfigError, CraftConfig, InputConfig, InputMode};
use crate::html_sync::{Document, SyncError};
use crate::hydration::{self, HydrationError, ImageFetcher};
use crate::imaging::{
    CompressTarget, CompressionResult, CompressionSettings, CropRect, DisplayedSize, EditError,
    EditOp, EncodedImage, FlipAxis, OutputFormat, Quality, RasterCodec, RotateParams, apply_edit,
    compress,
};
use crate::messages::{self, MessageTable};
use crate::preview::{OrderInput, PreviewSurface};
use crate::raster::{RasterError, RasterRegistry, RasterUrl};
use crate::session::{ConfirmPrompt, EditSession, Modal, PendingEdit, Tool};
use crate::store::{ImageRecord, ImageStore, RecordPatch, SourceFile};
use crate::submission::{self, Submission};
use crate::validation::{self, DuplicateDecider, InputLimits, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

const FALLBACK_DOWNLOAD_NAME: &str = "image-craft.png";

#[derive(Error, Debug)]
pub enum CraftError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Hydration(#[from] HydrationError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("No record {id} in group {group}")]
    UnknownRecord { group: String, id: String },
    #[error("No image to download")]
    NoImage,
}

/// How a group gets its images.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Upload,
    /// Images come from, and are mirrored back into, a collaborator fragment.
    Html {
        removal_level: usize,
        required_classes: Vec<String>,
    },
}

/// Per-group settings of a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub group: String,
    pub mode: Mode,
    pub limits: InputLimits,
    pub output_format: OutputFormat,
    pub quality: Quality,
    pub order_field_prefix: String,
    pub compression: CompressionSettings,
}

impl ControllerConfig {
    /// Upload-mode defaults for `group`.
    pub fn new(group: &str) -> Self {
        let defaults = CraftConfig::default();
        Self {
            group: group.to_string(),
            mode: Mode::Upload,
            limits: InputLimits::default(),
            output_format: defaults.output_format,
            quality: defaults.quality(),
            order_field_prefix: defaults.order_field_prefix,
            compression: defaults.compression.settings(),
        }
    }

    /// Settings for the declared `input` under `config`.
    pub fn from_config(config: &CraftConfig, input: &InputConfig) -> Self {
        let mode = match input.mode {
            InputMode::Upload => Mode::Upload,
            InputMode::Html => Mode::Html {
                removal_level: config.removal_level,
                required_classes: input.required_classes.clone(),
            },
        };
        Self {
            group: input.name.clone(),
            mode,
            limits: input.limits(),
            output_format: config.output_format,
            quality: config.quality(),
            order_field_prefix: config.order_field_prefix.clone(),
            compression: config.compression.settings(),
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self.mode, Mode::Html { .. })
    }
}

/// State shared by every controller on a page.
#[derive(Debug, Default)]
pub struct Workspace {
    pub store: ImageStore,
    pub rasters: RasterRegistry,
    /// Collaborator fragment for HTML edit mode, when one is present.
    pub document: Option<Document>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: Document) -> Self {
        Self {
            document: Some(document),
            ..Self::default()
        }
    }
}

/// Result of adding a batch of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Ids of the new records, in order.
    pub added: Vec<String>,
    pub not_images: Vec<String>,
    pub skipped_duplicates: Vec<String>,
}

/// What a confirmed session applied.
#[derive(Debug, Clone)]
pub enum Applied {
    Edit,
    Compressed(CompressionResult),
}

/// Current content of a record, ready to save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

/// Controller of one group.
pub struct CollectionController<C: RasterCodec> {
    config: ControllerConfig,
    codec: C,
    preview: PreviewSurface,
    modal: Modal,
    messages: MessageTable,
}

impl<C: RasterCodec> CollectionController<C> {
    pub fn new(config: ControllerConfig, codec: C, messages: MessageTable) -> Self {
        let preview = PreviewSurface::new(&config.group);
        Self {
            config,
            codec,
            preview,
            modal: Modal::new(),
            messages,
        }
    }

    pub fn group(&self) -> &str {
        &self.config.group
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn preview(&self) -> &PreviewSurface {
        &self.preview
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    pub fn messages(&self) -> &MessageTable {
        &self.messages
    }

    fn unknown(&self, id: &str) -> CraftError {
        log::warn!("{}: unknown record {id}", self.config.group);
        CraftError::UnknownRecord {
            group: self.config.group.clone(),
            id: id.to_string(),
        }
    }

    fn record<'w>(&self, ws: &'w Workspace, id: &str) -> Result<&'w ImageRecord, CraftError> {
        ws.store
            .find(&self.config.group, id)
            .ok_or_else(|| self.unknown(id))
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Bring the preview (and fragment, in HTML mode) in line with the store.
    pub fn render(&mut self, ws: &mut Workspace) {
        let group = &self.config.group;
        let records = ws.store.get(group);
        self.preview.render(records);

        match &self.config.mode {
            Mode::Upload => {
                let name = submission::order_field_name(&self.config.order_field_prefix, group);
                let inputs = submission::order_tokens(records.len())
                    .into_iter()
                    .map(|value| OrderInput {
                        name: name.clone(),
                        value,
                    })
                    .collect();
                self.preview.set_order_inputs(inputs);
            }
            Mode::Html { .. } => {
                let result = match ws.document.as_mut() {
                    Some(doc) => doc.rebind(group, records),
                    None => Err(SyncError::TargetMissing {
                        container: crate::html_sync::container_id(group),
                    }),
                };
                if let Err(e) = result {
                    log::warn!("{group}: {e}");
                }
            }
        }
        debug_assert_eq!(self.preview.len(), ws.store.len(group));
    }

    // =========================================================================
    // Populating
    // =========================================================================

    /// Validate and append user-selected files.
    pub fn add_files(
        &mut self,
        ws: &mut Workspace,
        files: Vec<SourceFile>,
        decider: &mut dyn DuplicateDecider,
    ) -> Result<AddOutcome, CraftError> {
        let group = self.config.group.clone();
        let admission = validation::validate(
            &group,
            files,
            ws.store.get(&group),
            &self.config.limits,
            decider,
        )?;

        let mut added = Vec::with_capacity(admission.admitted.len());
        for file in admission.admitted {
            let url = ws.rasters.create(&file);
            let record = ImageRecord::new(file, url);
            added.push(record.id.clone());
            ws.store.append(&group, record);
        }
        log::info!("{group}: added {} image(s)", added.len());
        self.render(ws);
        Ok(AddOutcome {
            added,
            not_images: admission.not_images,
            skipped_duplicates: admission.skipped_duplicates,
        })
    }

    /// Seed records from a declared list of existing remote images.
    ///
    /// Fetches run one at a time in list order; failures are skipped. Returns
    /// the number of records created.
    pub async fn hydrate(
        &mut self,
        ws: &mut Workspace,
        fetcher: &impl ImageFetcher,
        raw_list: &str,
    ) -> Result<usize, CraftError> {
        let urls = hydration::parse_url_list(raw_list)?;
        let images = hydration::fetch_all(fetcher, &urls).await;
        let count = images.len();
        if count < urls.len() {
            log::warn!(
                "{}: {} of {} existing image(s) could not be loaded",
                self.config.group,
                urls.len() - count,
                urls.len()
            );
        }
        for image in images {
            let record = ImageRecord::new(image.file, RasterUrl::external(image.url));
            ws.store.append(&self.config.group, record);
        }
        self.render(ws);
        Ok(count)
    }

    /// Seed records from the images of the group's fragment (HTML edit mode).
    ///
    /// A missing fragment adopts nothing. Images whose bytes cannot be fetched
    /// are still adopted, with empty content.
    pub async fn adopt_html(
        &mut self,
        ws: &mut Workspace,
        fetcher: &impl ImageFetcher,
    ) -> Result<usize, CraftError> {
        let group = self.config.group.clone();
        let required: &[String] = match &self.config.mode {
            Mode::Html {
                required_classes, ..
            } => required_classes.as_slice(),
            Mode::Upload => &[],
        };
        let found = match ws.document.as_ref() {
            Some(doc) => doc.collect_images(&group, required),
            None => Err(SyncError::TargetMissing {
                container: crate::html_sync::container_id(&group),
            }),
        };
        let images = match found {
            Ok(images) => images,
            Err(e) => {
                log::warn!("{group}: {e}");
                return Ok(0);
            }
        };

        let count = images.len();
        for image in images {
            let file = match fetcher.fetch(&image.url).await {
                Ok(fetched) => hydration::to_source_file(image.name, fetched),
                Err(e) => {
                    log::warn!("{group}: adopting {} without content: {e}", image.name);
                    SourceFile::empty(image.name)
                }
            };
            let record = ImageRecord::new(file, RasterUrl::external(image.url));
            ws.store.append(&group, record);
        }
        log::info!("{group}: adopted {count} image(s)");
        self.render(ws);
        Ok(count)
    }

    // =========================================================================
    // Removal and ordering
    // =========================================================================

    /// Remove the record at `index`. Out-of-range indexes are a no-op.
    ///
    /// Returns the removed record's id.
    pub fn remove(&mut self, ws: &mut Workspace, index: usize) -> Option<String> {
        let group = self.config.group.clone();
        let removed = ws.store.remove_at(&group, index)?;
        release(&mut ws.rasters, &removed);
        self.modal.forget(&removed.id);

        if let Mode::Html { removal_level, .. } = self.config.mode {
            let result = match ws.document.as_mut() {
                Some(doc) => doc.remove_image(&group, index, removal_level),
                None => Err(SyncError::TargetMissing {
                    container: crate::html_sync::container_id(&group),
                }),
            };
            match result {
                Ok(true) => {}
                Ok(false) => log::warn!("{group}: fragment has no image at {index}"),
                Err(e) => log::warn!("{group}: {e}"),
            }
        }
        log::debug!("{group}: removed record at {index}");
        self.render(ws);
        Some(removed.id)
    }

    /// Rebuild the store from the preview's visual order.
    fn follow_visual_order(&mut self, ws: &mut Workspace) {
        ws.store
            .reorder(&self.config.group, &self.preview.visual_ids());
        self.render(ws);
    }

    /// Drop the item at `from` onto position `to`.
    pub fn drag_move(&mut self, ws: &mut Workspace, from: usize, to: usize) -> bool {
        let moved = self.preview.drag_move(from, to);
        if moved {
            self.follow_visual_order(ws);
        }
        moved
    }

    pub fn move_up(&mut self, ws: &mut Workspace, index: usize) -> bool {
        let moved = self.preview.move_up(index);
        if moved {
            self.follow_visual_order(ws);
        }
        moved
    }

    pub fn move_down(&mut self, ws: &mut Workspace, index: usize) -> bool {
        let moved = self.preview.move_down(index);
        if moved {
            self.follow_visual_order(ws);
        }
        moved
    }

    // =========================================================================
    // Modal and edit sessions
    // =========================================================================

    /// Focus record `id` in the modal.
    ///
    /// Returns `false` if the user kept unsaved edits on the current image.
    pub fn select(
        &mut self,
        ws: &Workspace,
        id: &str,
        prompt: &mut dyn ConfirmPrompt,
    ) -> Result<bool, CraftError> {
        let src = self.record(ws, id)?.edited_url.to_string();
        let discard = self.messages.get(messages::DISCARD_EDITS).to_string();
        if !self.modal.select(id, prompt, &discard) {
            return Ok(false);
        }
        self.preview.focus(id, &src);
        Ok(true)
    }

    pub fn open_tool(&mut self, tool: Tool) -> Option<&EditSession> {
        self.modal.open(tool)
    }

    pub fn update_session(&mut self, edit: PendingEdit) -> bool {
        self.modal.update(edit)
    }

    pub fn cancel_session(&mut self) {
        self.modal.cancel();
    }

    /// Apply the active session's pending edit. `None` when nothing was pending.
    pub fn confirm(&mut self, ws: &mut Workspace) -> Result<Option<Applied>, CraftError> {
        let Some((id, edit)) = self.modal.take_confirmed() else {
            return Ok(None);
        };
        let applied = match edit {
            PendingEdit::Crop { rect, displayed } => {
                self.crop(ws, &id, rect, displayed)?;
                Applied::Edit
            }
            PendingEdit::Rotate(params) => {
                self.rotate(ws, &id, params)?;
                Applied::Edit
            }
            PendingEdit::Compress { target, quality } => {
                Applied::Compressed(self.compress(ws, &id, target, quality)?)
            }
        };
        Ok(Some(applied))
    }

    // =========================================================================
    // Edits
    // =========================================================================

    pub fn crop(
        &mut self,
        ws: &mut Workspace,
        id: &str,
        rect: CropRect,
        displayed: DisplayedSize,
    ) -> Result<(), CraftError> {
        self.apply(ws, id, &EditOp::Crop { rect, displayed })
    }

    pub fn rotate(
        &mut self,
        ws: &mut Workspace,
        id: &str,
        params: RotateParams,
    ) -> Result<(), CraftError> {
        self.apply(ws, id, &EditOp::Rotate(params))
    }

    /// Flip immediately; there is no confirm step.
    pub fn flip(&mut self, ws: &mut Workspace, id: &str, axis: FlipAxis) -> Result<(), CraftError> {
        self.apply(ws, id, &EditOp::Flip(axis))
    }

    fn source_bytes(&self, ws: &Workspace, id: &str) -> Result<Arc<[u8]>, CraftError> {
        let record = self.record(ws, id)?;
        if record.current_file.is_empty() {
            return Err(EditError::RasterMissing(record.current_file.name.clone()).into());
        }
        Ok(Arc::clone(&record.current_file.data))
    }

    fn apply(&mut self, ws: &mut Workspace, id: &str, op: &EditOp) -> Result<(), CraftError> {
        let source = self.source_bytes(ws, id)?;
        let encoded = apply_edit(
            &self.codec,
            &source,
            op,
            self.config.output_format,
            self.config.quality,
        )
        .inspect_err(|e| log::warn!("{}: {} on {id} failed: {e}", self.config.group, op.name()))?;
        self.commit(ws, id, encoded)
    }

    /// Compress record `id` toward `target`.
    ///
    /// Over-budget results are still applied; the caller can tell from
    /// [`CompressionResult::within_budget`].
    pub fn compress(
        &mut self,
        ws: &mut Workspace,
        id: &str,
        target: CompressTarget,
        quality: Quality,
    ) -> Result<CompressionResult, CraftError> {
        let source = self.source_bytes(ws, id)?;
        let image = self.codec.decode(&source)?;
        let result = compress(
            &self.codec,
            &image,
            source.len() as u64,
            target,
            quality,
            self.config.output_format,
            &self.config.compression,
        )?;
        if !result.within_budget {
            log::warn!(
                "{}: {id} still {} bytes after {} attempts",
                self.config.group,
                result.final_size(),
                result.attempts
            );
        }
        self.commit(ws, id, result.encoded.clone())?;
        Ok(result)
    }

    /// Make `encoded` the record's current content.
    fn commit(
        &mut self,
        ws: &mut Workspace,
        id: &str,
        encoded: EncodedImage,
    ) -> Result<(), CraftError> {
        let group = self.config.group.clone();
        let preview_url = self.record(ws, id)?.preview_url.clone();

        let format = encoded.format;
        let file = SourceFile::new(
            format!("{id}.{}", format.extension()),
            format.mime(),
            encoded.bytes,
        );
        let url = ws.rasters.create(&file);
        let patch = RecordPatch {
            current_file: file,
            edited_url: url.clone(),
        };
        let Some(previous) = ws.store.replace_at(&group, id, patch) else {
            ws.rasters.revoke(&url)?;
            return Err(self.unknown(id));
        };
        if previous != preview_url {
            revoke_superseded(&mut ws.rasters, &group, &previous);
        }
        log::debug!(
            "{group}: {id} now {}x{} {format}",
            encoded.width,
            encoded.height
        );
        self.render(ws);
        Ok(())
    }

    /// Restore record `id` to its original content after confirmation.
    ///
    /// Returns `false` when the prompt declined. Resetting an unedited record
    /// changes nothing.
    pub fn reset(
        &mut self,
        ws: &mut Workspace,
        id: &str,
        prompt: &mut dyn ConfirmPrompt,
    ) -> Result<bool, CraftError> {
        let record = self.record(ws, id)?;
        if !prompt.confirm(self.messages.get(messages::RESET_WARNING)) {
            return Ok(false);
        }
        if !record.is_edited() {
            return Ok(true);
        }
        let patch = RecordPatch::reset(record);
        let preview_url = record.preview_url.clone();
        let group = self.config.group.clone();
        if let Some(previous) = ws.store.replace_at(&group, id, patch)
            && previous != preview_url
        {
            revoke_superseded(&mut ws.rasters, &group, &previous);
        }
        self.modal.cancel();
        self.render(ws);
        Ok(true)
    }

    /// Current content of record `id`.
    pub fn download(&self, ws: &Workspace, id: &str) -> Result<Download, CraftError> {
        let file = &self.record(ws, id)?.current_file;
        if file.is_empty() {
            return Err(CraftError::NoImage);
        }
        let file_name = if file.name.is_empty() {
            FALLBACK_DOWNLOAD_NAME.to_string()
        } else {
            file.name.clone()
        };
        Ok(Download {
            file_name,
            mime: file.mime.clone(),
            bytes: Arc::clone(&file.data),
        })
    }

    // =========================================================================
    // Submission and teardown
    // =========================================================================

    /// Fields this group contributes to the form.
    pub fn submission(&self, ws: &Workspace) -> Submission {
        let prefix = match self.config.mode {
            Mode::Upload => Some(self.config.order_field_prefix.as_str()),
            Mode::Html { .. } => None,
        };
        submission::build_submission(&self.config.group, ws.store.get(&self.config.group), prefix)
    }

    /// Tear the group down, releasing every local raster reference once.
    ///
    /// Returns the number of records dropped.
    pub fn cleanup(&mut self, ws: &mut Workspace) -> usize {
        let records = ws.store.take_group(&self.config.group);
        for record in &records {
            release(&mut ws.rasters, record);
        }
        self.preview.clear();
        self.modal = Modal::new();
        log::debug!(
            "{}: cleaned up {} record(s)",
            self.config.group,
            records.len()
        );
        records.len()
    }
}

/// Revoke a removed record's references: the preview, and the edit if distinct.
fn release(rasters: &mut RasterRegistry, record: &ImageRecord) {
    let mut urls = vec![&record.preview_url];
    if record.edited_url != record.preview_url {
        urls.push(&record.edited_url);
    }
    for url in urls {
        if let Err(e) = rasters.revoke(url) {
            log::warn!("releasing {}: {e}", record.id);
        }
    }
}

/// Revoke a reference the store no longer holds. The store is already
/// patched, so a failure is logged rather than returned.
fn revoke_superseded(rasters: &mut RasterRegistry, group: &str, url: &RasterUrl) {
    if let Err(e) = rasters.revoke(url) {
        log::warn!("{group}: superseded {url}: {e}");
    }
}

/// Lookup of controller settings by group name.
///
/// Group-name collisions are the integrator's business: registering a name
/// twice replaces the earlier entry.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    configs: HashMap<String, ControllerConfig>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of every input declared in `config`.
    pub fn from_config(config: &CraftConfig) -> Self {
        let mut registry = Self::new();
        for input in &config.inputs {
            registry.register(ControllerConfig::from_config(config, input));
        }
        registry
    }

    pub fn register(&mut self, config: ControllerConfig) -> Option<ControllerConfig> {
        self.configs.insert(config.group.clone(), config)
    }

    pub fn get(&self, group: &str) -> Option<&ControllerConfig> {
        self.configs.get(group)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }
}
