//! Rendered preview surface of one group.
//!
//! Holds what the user sees: the thumbnail list (whose order is the visual
//! order reorders are read back from), the focused full-size preview, and the
//! hidden order inputs. [`PreviewSurface::to_html`] renders it with maud.

use crate::store::ImageRecord;
use crate::units::sanitize_field_name;
use maud::{Markup, html};

/// One thumbnail in the preview list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewItem {
    pub id: String,
    pub src: String,
    pub original_src: String,
    pub alt: String,
}

impl PreviewItem {
    fn from_record(record: &ImageRecord) -> Self {
        Self {
            id: record.id.clone(),
            src: record.edited_url.to_string(),
            original_src: record.preview_url.to_string(),
            alt: record.current_file.name.clone(),
        }
    }
}

/// Full-size image shown in the edit modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusedImage {
    pub id: String,
    pub src: String,
}

/// Hidden form input carrying one order token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderInput {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct PreviewSurface {
    group: String,
    items: Vec<PreviewItem>,
    focused: Option<FocusedImage>,
    order_inputs: Vec<OrderInput>,
}

impl PreviewSurface {
    pub fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            ..Self::default()
        }
    }

    pub fn items(&self) -> &[PreviewItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn focused(&self) -> Option<&FocusedImage> {
        self.focused.as_ref()
    }

    pub fn order_inputs(&self) -> &[OrderInput] {
        &self.order_inputs
    }

    /// Record ids in visual order.
    pub fn visual_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }

    /// Rebuild the list from the store's records.
    ///
    /// The focused image follows its record; a focus whose record is gone is
    /// dropped.
    pub fn render(&mut self, records: &[ImageRecord]) {
        self.items = records.iter().map(PreviewItem::from_record).collect();
        if let Some(focus) = &mut self.focused {
            match records.iter().find(|r| r.id == focus.id) {
                Some(record) => focus.src = record.edited_url.to_string(),
                None => self.focused = None,
            }
        }
    }

    pub fn set_order_inputs(&mut self, inputs: Vec<OrderInput>) {
        self.order_inputs = inputs;
    }

    /// Drop the item at `from` onto the item at `to`.
    ///
    /// Dragging forward lands after the target, dragging backward lands
    /// before it. Returns `false` for out-of-range or same-slot drops.
    pub fn drag_move(&mut self, from: usize, to: usize) -> bool {
        if from == to || from >= self.items.len() || to >= self.items.len() {
            return false;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        true
    }

    /// Swap the item at `index` with its left neighbour.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.items.len() {
            return false;
        }
        self.items.swap(index, index - 1);
        true
    }

    /// Swap the item at `index` with its right neighbour.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.items.len() {
            return false;
        }
        self.items.swap(index, index + 1);
        true
    }

    pub fn focus(&mut self, id: &str, src: &str) {
        self.focused = Some(FocusedImage {
            id: id.to_string(),
            src: src.to_string(),
        });
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.focused = None;
        self.order_inputs.clear();
    }

    pub fn to_html(&self) -> Markup {
        let group = &self.group;
        let last = self.items.len().saturating_sub(1);
        html! {
            div.image-craft-preview-container id=(format!("image-craft-preview-{}", sanitize_field_name(group))) {
                @for (idx, item) in self.items.iter().enumerate() {
                    div.image-craft-preview-item draggable="true" data-id=(item.id) data-order=(idx) {
                        img.image-craft-image
                            id=(format!("img-preview-{group}-{}", item.id))
                            src=(item.src)
                            alt=(item.alt)
                            data-originalsrc=(item.original_src);
                        button.image-craft-delete-btn type="button" aria-label="Remove image" { "×" }
                        div.image-craft-controls {
                            @if idx > 0 {
                                button.image-craft-move-up type="button" { "⬅" }
                            }
                            @if idx < last {
                                button.image-craft-move-down type="button" { "➡" }
                            }
                        }
                    }
                }
                @if let Some(focus) = &self.focused {
                    div.image-craft-modal {
                        img #image-craft-preview-image src=(focus.src) data-uuid=(focus.id) data-name=(group);
                    }
                }
                @for input in &self.order_inputs {
                    input type="hidden" name=(input.name) value=(input.value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterUrl;
    use crate::store::SourceFile;

    fn records(names: &[&str]) -> Vec<ImageRecord> {
        names
            .iter()
            .map(|n| {
                ImageRecord::new(
                    SourceFile::new(*n, "image/png", n.as_bytes().to_vec()),
                    RasterUrl::external(format!("https://example.com/{n}")),
                )
            })
            .collect()
    }

    fn alts(surface: &PreviewSurface) -> Vec<&str> {
        surface.items().iter().map(|i| i.alt.as_str()).collect()
    }

    #[test]
    fn render_mirrors_records() {
        let mut surface = PreviewSurface::new("gallery");
        let recs = records(&["a", "b"]);
        surface.render(&recs);
        assert_eq!(surface.len(), 2);
        assert_eq!(surface.visual_ids(), vec![recs[0].id.clone(), recs[1].id.clone()]);
        assert_eq!(surface.items()[0].src, "https://example.com/a");
    }

    #[test]
    fn drag_forward_lands_after_target() {
        let mut surface = PreviewSurface::new("g");
        surface.render(&records(&["a", "b", "c", "d"]));
        assert!(surface.drag_move(0, 2));
        assert_eq!(alts(&surface), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn drag_backward_lands_before_target() {
        let mut surface = PreviewSurface::new("g");
        surface.render(&records(&["a", "b", "c", "d"]));
        assert!(surface.drag_move(3, 1));
        assert_eq!(alts(&surface), vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn drag_out_of_range_is_noop() {
        let mut surface = PreviewSurface::new("g");
        surface.render(&records(&["a", "b"]));
        assert!(!surface.drag_move(0, 5));
        assert!(!surface.drag_move(1, 1));
        assert_eq!(alts(&surface), vec!["a", "b"]);
    }

    #[test]
    fn move_up_and_down_stop_at_ends() {
        let mut surface = PreviewSurface::new("g");
        surface.render(&records(&["a", "b", "c"]));
        assert!(!surface.move_up(0));
        assert!(!surface.move_down(2));
        assert!(surface.move_up(2));
        assert_eq!(alts(&surface), vec!["a", "c", "b"]);
        assert!(surface.move_down(0));
        assert_eq!(alts(&surface), vec!["c", "a", "b"]);
    }

    #[test]
    fn render_drops_focus_of_removed_record() {
        let mut surface = PreviewSurface::new("g");
        let recs = records(&["a", "b"]);
        surface.render(&recs);
        surface.focus(&recs[0].id, "x");
        surface.render(&recs[1..]);
        assert!(surface.focused().is_none());
    }

    #[test]
    fn html_contains_items_controls_and_order_inputs() {
        let mut surface = PreviewSurface::new("post images");
        let recs = records(&["a.png", "b.png"]);
        surface.render(&recs);
        surface.set_order_inputs(vec![OrderInput {
            name: "image_order_post_images[]".into(),
            value: "new:0".into(),
        }]);
        let html = surface.to_html().into_string();

        assert!(html.contains("id=\"image-craft-preview-post_images\""));
        assert!(html.contains(&format!("data-id=\"{}\"", recs[1].id)));
        assert!(html.contains("src=\"https://example.com/a.png\""));
        assert_eq!(html.matches("image-craft-move-up").count(), 1);
        assert_eq!(html.matches("image-craft-move-down").count(), 1);
        assert!(html.contains("name=\"image_order_post_images[]\" value=\"new:0\""));
    }
}
