//! Image record store.
//!
//! Maps a group name (one logical upload field) to its ordered records. The
//! store is the single source of truth for what each group currently holds;
//! it never touches rendered output.
//!
//! ## Identity
//!
//! Records are addressed by `id`, never by position. Positions move on every
//! reorder and removal; ids are minted once in [`ImageRecord::new`] and stay
//! stable for the record's lifetime.
//!
//! ## Original vs. current
//!
//! `original_file`/`preview_url` never change after creation. `current_file`
//! and `edited_url` always move together through a [`RecordPatch`], so the
//! content that gets submitted is always the content the edited URL shows.

use crate::raster::RasterUrl;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Binary content with its declared name and MIME type.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime: String,
    pub data: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    /// Placeholder for a record whose bytes are not available.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, "", Vec::<u8>::new())
    }

    /// Read a file from disk, inferring the MIME type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(crate::imaging::rust_codec::mime_for_extension)
            .unwrap_or("application/octet-stream");
        Ok(Self::new(name, mime, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Declared MIME type is `image/*`.
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// One image within a group.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    pub original_file: SourceFile,
    pub current_file: SourceFile,
    pub preview_url: RasterUrl,
    pub edited_url: RasterUrl,
    /// Visual position, recomputed after every render.
    pub order: usize,
}

impl ImageRecord {
    pub fn new(file: SourceFile, preview_url: RasterUrl) -> Self {
        Self {
            id: crate::units::generate_id(),
            original_file: file.clone(),
            current_file: file,
            edited_url: preview_url.clone(),
            preview_url,
            order: 0,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.edited_url != self.preview_url
    }

    /// Same name and byte length as `file`.
    pub fn is_duplicate_of(&self, file: &SourceFile) -> bool {
        self.current_file.name == file.name && self.current_file.size() == file.size()
    }
}

/// Edited-state update applied atomically by [`ImageStore::replace_at`].
#[derive(Debug, Clone)]
pub struct RecordPatch {
    pub current_file: SourceFile,
    pub edited_url: RasterUrl,
}

impl RecordPatch {
    /// Patch that restores a record to its original state.
    pub fn reset(record: &ImageRecord) -> Self {
        Self {
            current_file: record.original_file.clone(),
            edited_url: record.preview_url.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ImageStore {
    groups: HashMap<String, Vec<ImageRecord>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of `group` in order. Unknown groups are empty.
    pub fn get(&self, group: &str) -> &[ImageRecord] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, group: &str) -> usize {
        self.get(group).len()
    }

    pub fn find(&self, group: &str, id: &str) -> Option<&ImageRecord> {
        self.get(group).iter().find(|r| r.id == id)
    }

    pub fn position(&self, group: &str, id: &str) -> Option<usize> {
        self.get(group).iter().position(|r| r.id == id)
    }

    /// Group names that currently exist.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Append a record, creating the group on first insertion.
    pub fn append(&mut self, group: &str, record: ImageRecord) {
        let list = self.groups.entry(group.to_string()).or_default();
        let mut record = record;
        record.order = list.len();
        list.push(record);
    }

    /// Remove and return the record at `index`; `None` when out of bounds.
    pub fn remove_at(&mut self, group: &str, index: usize) -> Option<ImageRecord> {
        let list = self.groups.get_mut(group)?;
        if index >= list.len() {
            return None;
        }
        let removed = list.remove(index);
        renumber(list);
        Some(removed)
    }

    /// Rebuild `group` in the order of `visual_ids`. See [`reconcile_order`].
    pub fn reorder<S: AsRef<str>>(&mut self, group: &str, visual_ids: &[S]) {
        if let Some(list) = self.groups.get_mut(group) {
            let records = std::mem::take(list);
            *list = reconcile_order(records, visual_ids);
        }
    }

    /// Apply `patch` to the record `id` in place, keeping identity and position.
    ///
    /// Returns the edited URL the patch superseded, or `None` when no such
    /// record exists.
    pub fn replace_at(&mut self, group: &str, id: &str, patch: RecordPatch) -> Option<RasterUrl> {
        let record = self.groups.get_mut(group)?.iter_mut().find(|r| r.id == id)?;
        record.current_file = patch.current_file;
        Some(std::mem::replace(&mut record.edited_url, patch.edited_url))
    }

    /// Remove `group` entirely, returning its records in order.
    pub fn take_group(&mut self, group: &str) -> Vec<ImageRecord> {
        self.groups.remove(group).unwrap_or_default()
    }
}

fn renumber(list: &mut [ImageRecord]) {
    for (idx, record) in list.iter_mut().enumerate() {
        record.order = idx;
    }
}

/// Reorder `records` to follow an externally observed key sequence.
///
/// The visual order is authoritative. Unknown and repeated ids in
/// `visual_ids` are ignored. Records the visual order does not mention keep
/// their relative order and go last, so no record is ever lost.
pub fn reconcile_order<S: AsRef<str>>(
    records: Vec<ImageRecord>,
    visual_ids: &[S],
) -> Vec<ImageRecord> {
    let mut pending: Vec<Option<ImageRecord>> = records.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(pending.len());

    for id in visual_ids {
        let id = id.as_ref();
        match pending
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|r| r.id == id))
        {
            Some(slot) => ordered.extend(slot.take()),
            None => log::warn!("visual order names unknown record {id}"),
        }
    }

    let missing: Vec<ImageRecord> = pending.into_iter().flatten().collect();
    if !missing.is_empty() {
        log::warn!(
            "{} record(s) absent from visual order, appended at the end",
            missing.len()
        );
    }
    ordered.extend(missing);
    renumber(&mut ordered);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ImageRecord {
        let url = RasterUrl::external(format!("https://example.com/{name}"));
        ImageRecord::new(SourceFile::new(name, "image/png", name.as_bytes().to_vec()), url)
    }

    fn names(store: &ImageStore, group: &str) -> Vec<String> {
        store
            .get(group)
            .iter()
            .map(|r| r.current_file.name.clone())
            .collect()
    }

    // =========================================================================
    // SourceFile / ImageRecord
    // =========================================================================

    #[test]
    fn source_file_image_detection() {
        assert!(SourceFile::new("a.png", "image/png", Vec::<u8>::new()).is_image());
        assert!(!SourceFile::new("a.txt", "text/plain", Vec::<u8>::new()).is_image());
        assert!(!SourceFile::empty("a").is_image());
    }

    #[test]
    fn source_file_from_path_infers_mime() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.JPG");
        std::fs::write(&path, [1, 2, 3, 4]).unwrap();
        let file = SourceFile::from_path(&path).unwrap();
        assert_eq!(file.name, "photo.JPG");
        assert_eq!(file.mime, "image/jpeg");
        assert_eq!(file.size(), 4);
    }

    #[test]
    fn new_record_is_unedited() {
        let r = record("a.png");
        assert!(!r.is_edited());
        assert_eq!(r.current_file, r.original_file);
        assert_eq!(r.edited_url, r.preview_url);
    }

    #[test]
    fn duplicate_is_name_plus_size() {
        let r = record("cat.png");
        assert!(r.is_duplicate_of(&SourceFile::new("cat.png", "image/png", b"cat.png".to_vec())));
        assert!(!r.is_duplicate_of(&SourceFile::new("cat.png", "image/png", vec![0u8; 3])));
        assert!(!r.is_duplicate_of(&SourceFile::new("dog.png", "image/png", b"cat.png".to_vec())));
    }

    // =========================================================================
    // ImageStore
    // =========================================================================

    #[test]
    fn groups_are_created_lazily() {
        let mut store = ImageStore::new();
        assert!(store.get("gallery").is_empty());
        assert_eq!(store.groups().count(), 0);
        store.append("gallery", record("a"));
        assert_eq!(store.len("gallery"), 1);
        assert_eq!(store.groups().collect::<Vec<_>>(), vec!["gallery"]);
    }

    #[test]
    fn append_sets_order() {
        let mut store = ImageStore::new();
        store.append("g", record("a"));
        store.append("g", record("b"));
        let orders: Vec<_> = store.get("g").iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn remove_at_out_of_bounds_is_noop() {
        let mut store = ImageStore::new();
        store.append("g", record("a"));
        assert!(store.remove_at("g", 5).is_none());
        assert!(store.remove_at("missing", 0).is_none());
        assert_eq!(store.len("g"), 1);
    }

    #[test]
    fn remove_at_compacts_order() {
        let mut store = ImageStore::new();
        for n in ["a", "b", "c"] {
            store.append("g", record(n));
        }
        let removed = store.remove_at("g", 0).unwrap();
        assert_eq!(removed.current_file.name, "a");
        assert_eq!(names(&store, "g"), vec!["b", "c"]);
        assert_eq!(store.get("g")[1].order, 1);
    }

    #[test]
    fn replace_at_keeps_identity_and_position() {
        let mut store = ImageStore::new();
        store.append("g", record("a"));
        store.append("g", record("b"));
        let id = store.get("g")[1].id.clone();

        let patch = RecordPatch {
            current_file: SourceFile::new("b.avif", "image/avif", vec![9u8]),
            edited_url: RasterUrl::external("https://example.com/edited"),
        };
        let previous = store.replace_at("g", &id, patch).unwrap();

        assert_eq!(previous.as_str(), "https://example.com/b");
        let rec = &store.get("g")[1];
        assert_eq!(rec.id, id);
        assert!(rec.is_edited());
        assert_eq!(rec.current_file.name, "b.avif");
        assert_eq!(rec.original_file.name, "b");
    }

    #[test]
    fn take_group_leaves_other_groups() {
        let mut store = ImageStore::new();
        store.append("a", record("1"));
        store.append("a", record("2"));
        store.append("b", record("3"));
        let taken = store.take_group("a");
        assert_eq!(taken.len(), 2);
        assert_eq!(store.len("a"), 0);
        assert_eq!(store.len("b"), 1);
        assert!(store.take_group("a").is_empty());
    }

    #[test]
    fn replace_at_unknown_id_is_none() {
        let mut store = ImageStore::new();
        store.append("g", record("a"));
        let patch = RecordPatch::reset(&store.get("g")[0].clone());
        assert!(store.replace_at("g", "nope", patch).is_none());
    }

    // =========================================================================
    // reconcile_order
    // =========================================================================

    #[test]
    fn reorder_follows_visual_order() {
        let mut store = ImageStore::new();
        for n in ["a", "b", "c", "d"] {
            store.append("g", record(n));
        }
        let ids: Vec<String> = store.get("g").iter().map(|r| r.id.clone()).collect();
        let visual = vec![ids[1].clone(), ids[2].clone(), ids[0].clone(), ids[3].clone()];

        store.reorder("g", &visual);

        assert_eq!(names(&store, "g"), vec!["b", "c", "a", "d"]);
        let after: Vec<_> = store.get("g").iter().map(|r| r.id.clone()).collect();
        assert_eq!(after, visual);
        assert_eq!(store.get("g")[2].order, 2);
    }

    #[test]
    fn reconcile_ignores_unknown_and_repeated_ids() {
        let records = vec![record("a"), record("b")];
        let (a, b) = (records[0].id.clone(), records[1].id.clone());
        let out = reconcile_order(records, &[b.as_str(), "ghost", b.as_str(), a.as_str()]);
        let got: Vec<_> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec![b.as_str(), a.as_str()]);
    }

    #[test]
    fn reconcile_appends_records_missing_from_visual_order() {
        let records = vec![record("a"), record("b"), record("c")];
        let c = records[2].id.clone();
        let out = reconcile_order(records, &[c.as_str()]);
        let got: Vec<_> = out.iter().map(|r| r.current_file.name.as_str()).collect();
        assert_eq!(got, vec!["c", "a", "b"]);
    }
}
