//! HTML edit mode: keeping a collaborator-owned fragment in step with the store.
//!
//! In HTML edit mode the images do not come from a file input but from a
//! document fragment someone else rendered. The fragment's container is found
//! by id (`image-craft-content-<group>`); its `<img>` descendants, in document
//! order, correspond one-to-one to the group's records.
//!
//! | Operation | Effect on the fragment |
//! |-----------|------------------------|
//! | [`Document::collect_images`] | read `src`/`name` of each image to seed records |
//! | [`Document::remove_image`] | remove the image, or an ancestor `removal_level` levels up |
//! | [`Document::rebind`] | overwrite `src`, `alt`, `data-uuid`, `data-order` from the store |
//!
//! A missing container is a [`SyncError::TargetMissing`]; callers log it and
//! carry on, since the collaborator may simply not be on the page.

use crate::store::ImageRecord;
use maud::{Escaper, Markup, Render, html};
use std::fmt::Write;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Sync target #{container} not found")]
    TargetMissing { container: String },
}

/// Id of the fragment container owned by `group`.
pub fn container_id(group: &str) -> String {
    format!("image-craft-content-{group}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    fn child_elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children.iter().enumerate().filter_map(|(i, n)| match n {
            Node::Element(e) => Some((i, e)),
            Node::Text(_) => None,
        })
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut Element> {
        match self.children.get_mut(index)? {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    fn find_path(&self, id: &str, path: &mut Vec<usize>) -> bool {
        if self.attr("id") == Some(id) {
            return true;
        }
        for (i, child) in self.child_elements() {
            path.push(i);
            if child.find_path(id, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Paths (relative to `self`) of every `<img>` descendant, in document order.
    fn image_paths(&self, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        for (i, child) in self.child_elements() {
            prefix.push(i);
            if child.tag == "img" {
                out.push(prefix.clone());
            } else {
                child.image_paths(prefix, out);
            }
            prefix.pop();
        }
    }

    fn at(&self, path: &[usize]) -> Option<&Element> {
        let mut node = self;
        for &i in path {
            node = match node.children.get(i)? {
                Node::Element(e) => e,
                Node::Text(_) => return None,
            };
        }
        Some(node)
    }

    fn at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut node = self;
        for &i in path {
            node = node.child_mut(i)?;
        }
        Some(node)
    }
}

impl Render for Element {
    fn render_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape(value, out);
            out.push('"');
        }
        out.push('>');
        if is_void(&self.tag) {
            return;
        }
        for child in &self.children {
            match child {
                Node::Element(e) => e.render_to(out),
                Node::Text(t) => escape(t, out),
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "img" | "input" | "br" | "hr" | "meta" | "link" | "source")
}

fn escape(text: &str, out: &mut String) {
    // Writing into a String cannot fail.
    let _ = Escaper::new(out).write_str(text);
}

/// An image found in a fragment, ready to become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdoptedImage {
    pub name: String,
    pub url: String,
}

/// Last path segment of `url`, without query or fragment.
fn name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(path)
        .to_string()
}

/// A collaborator-owned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    fn container_path(&self, group: &str) -> Result<Vec<usize>, SyncError> {
        let id = container_id(group);
        let mut path = Vec::new();
        if self.root.find_path(&id, &mut path) {
            Ok(path)
        } else {
            Err(SyncError::TargetMissing { container: id })
        }
    }

    /// The group's container element.
    pub fn container(&self, group: &str) -> Result<&Element, SyncError> {
        let path = self.container_path(group)?;
        self.root.at(&path).ok_or(SyncError::TargetMissing {
            container: container_id(group),
        })
    }

    fn container_mut(&mut self, group: &str) -> Result<&mut Element, SyncError> {
        let path = self.container_path(group)?;
        self.root.at_mut(&path).ok_or(SyncError::TargetMissing {
            container: container_id(group),
        })
    }

    /// Number of images currently in the group's fragment.
    pub fn image_count(&self, group: &str) -> Result<usize, SyncError> {
        let mut paths = Vec::new();
        self.container(group)?.image_paths(&mut Vec::new(), &mut paths);
        Ok(paths.len())
    }

    /// Images to adopt as records.
    ///
    /// With `required_classes`, an image qualifies when it or one of its
    /// ancestors inside the container carries every listed class.
    pub fn collect_images(
        &self,
        group: &str,
        required_classes: &[String],
    ) -> Result<Vec<AdoptedImage>, SyncError> {
        let container = self.container(group)?;
        let mut paths = Vec::new();
        container.image_paths(&mut Vec::new(), &mut paths);

        let mut images = Vec::new();
        for path in paths {
            let Some(img) = container.at(&path) else {
                continue;
            };
            let qualifies = required_classes.iter().all(|class| {
                (0..=path.len()).any(|depth| {
                    container
                        .at(&path[..depth])
                        .is_some_and(|e| depth > 0 && e.has_class(class))
                })
            });
            if !qualifies {
                continue;
            }
            let Some(url) = img.attr("src").filter(|s| !s.is_empty()) else {
                log::debug!("{group}: skipping image without src");
                continue;
            };
            let name = img
                .attr("name")
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| name_from_url(url));
            images.push(AdoptedImage {
                name,
                url: url.to_string(),
            });
        }
        Ok(images)
    }

    /// Remove the `index`-th image of the group.
    ///
    /// `removal_level` climbs that many ancestors first (0 removes the image
    /// itself). The climb stops below the container, which is never removed.
    /// Returns `false` when there is no such image.
    pub fn remove_image(
        &mut self,
        group: &str,
        index: usize,
        removal_level: usize,
    ) -> Result<bool, SyncError> {
        let container = self.container_mut(group)?;
        let mut paths = Vec::new();
        container.image_paths(&mut Vec::new(), &mut paths);
        let Some(path) = paths.get(index) else {
            return Ok(false);
        };
        let keep = path.len().saturating_sub(removal_level).max(1);
        let (parent_path, target) = path[..keep].split_at(keep - 1);
        let Some(parent) = container.at_mut(parent_path) else {
            return Ok(false);
        };
        parent.children.remove(target[0]);
        Ok(true)
    }

    /// Point the group's images at the store's records, by position.
    ///
    /// Images beyond the record count are left untouched.
    pub fn rebind(&mut self, group: &str, records: &[ImageRecord]) -> Result<(), SyncError> {
        let container = self.container_mut(group)?;
        let mut paths = Vec::new();
        container.image_paths(&mut Vec::new(), &mut paths);
        if paths.len() != records.len() {
            log::debug!(
                "{group}: fragment has {} image(s) for {} record(s)",
                paths.len(),
                records.len()
            );
        }
        for (order, (path, record)) in paths.iter().zip(records).enumerate() {
            if let Some(img) = container.at_mut(path) {
                img.set_attr("src", record.edited_url.as_str());
                img.set_attr("alt", &record.current_file.name);
                img.set_attr("data-uuid", &format!("{group}-{}", record.id));
                img.set_attr("data-order", &order.to_string());
            }
        }
        Ok(())
    }

    pub fn to_html(&self) -> Markup {
        html! { (self.root) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterUrl;
    use crate::store::SourceFile;

    fn figure(src: &str) -> Element {
        Element::new("figure")
            .with_attr("class", "wp-block-image")
            .with_child(Element::new("img").with_attr("src", src))
    }

    fn doc(group: &str, srcs: &[&str]) -> Document {
        let mut container = Element::new("div").with_attr("id", &container_id(group));
        for src in srcs {
            container = container.with_child(figure(src));
        }
        Document::new(
            Element::new("body")
                .with_child(Element::new("h1").with_text("Post"))
                .with_child(container),
        )
    }

    fn srcs(doc: &Document, group: &str) -> Vec<String> {
        doc.collect_images(group, &[])
            .unwrap()
            .into_iter()
            .map(|i| i.url)
            .collect()
    }

    // =========================================================================
    // Lookup and adoption
    // =========================================================================

    #[test]
    fn missing_container_is_target_missing() {
        let d = doc("other", &["a.png"]);
        assert_eq!(
            d.collect_images("post", &[]),
            Err(SyncError::TargetMissing {
                container: "image-craft-content-post".into()
            })
        );
    }

    #[test]
    fn collect_names_from_attribute_or_url() {
        let mut d = doc("post", &["https://cdn.example.com/up/cat.jpg?v=2"]);
        let container = d.container_mut("post").unwrap();
        container.children.push(Node::Element(
            Element::new("img")
                .with_attr("src", "https://cdn.example.com/dog.png")
                .with_attr("name", "Dog"),
        ));

        let images = d.collect_images("post", &[]).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "cat.jpg");
        assert_eq!(images[1].name, "Dog");
        assert_eq!(images[1].url, "https://cdn.example.com/dog.png");
    }

    #[test]
    fn collect_filters_by_class_on_ancestor() {
        let mut d = doc("post", &["a.png"]);
        d.container_mut("post")
            .unwrap()
            .children
            .push(Node::Element(Element::new("img").with_attr("src", "b.png")));

        let images = d.collect_images("post", &["wp-block-image".to_string()]).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].url, "a.png");
    }

    // =========================================================================
    // Removal
    // =========================================================================

    #[test]
    fn remove_at_level_zero_keeps_wrapper() {
        let mut d = doc("post", &["a.png", "b.png"]);
        assert!(d.remove_image("post", 0, 0).unwrap());
        assert_eq!(srcs(&d, "post"), vec!["b.png"]);
        assert_eq!(d.container("post").unwrap().children.len(), 2);
    }

    #[test]
    fn remove_at_level_one_removes_wrapper() {
        let mut d = doc("post", &["a.png", "b.png"]);
        assert!(d.remove_image("post", 1, 1).unwrap());
        assert_eq!(srcs(&d, "post"), vec!["a.png"]);
        assert_eq!(d.container("post").unwrap().children.len(), 1);
    }

    #[test]
    fn removal_never_climbs_past_container() {
        let mut d = doc("post", &["a.png", "b.png"]);
        assert!(d.remove_image("post", 0, 10).unwrap());
        assert!(d.container("post").is_ok());
        assert_eq!(srcs(&d, "post"), vec!["b.png"]);
    }

    #[test]
    fn remove_out_of_range_is_false() {
        let mut d = doc("post", &["a.png"]);
        assert!(!d.remove_image("post", 3, 0).unwrap());
        assert_eq!(d.image_count("post").unwrap(), 1);
    }

    // =========================================================================
    // Rebind and rendering
    // =========================================================================

    #[test]
    fn rebind_overwrites_attributes_by_position() {
        let mut d = doc("post", &["a.png", "b.png"]);
        let record = ImageRecord::new(
            SourceFile::new("x.avif", "image/avif", vec![1u8]),
            RasterUrl::external("blob:image-craft/1"),
        );
        d.rebind("post", std::slice::from_ref(&record)).unwrap();

        let container = d.container("post").unwrap();
        let img = container.at(&[0, 0]).unwrap();
        assert_eq!(img.attr("src"), Some("blob:image-craft/1"));
        assert_eq!(img.attr("alt"), Some("x.avif"));
        assert_eq!(img.attr("data-uuid"), Some(format!("post-{}", record.id).as_str()));
        assert_eq!(img.attr("data-order"), Some("0"));
        assert_eq!(container.at(&[1, 0]).unwrap().attr("src"), Some("b.png"));
    }

    #[test]
    fn html_escapes_attributes_and_text() {
        let d = Document::new(
            Element::new("p")
                .with_attr("title", "a \"b\"")
                .with_text("1 < 2")
                .with_child(Element::new("img").with_attr("src", "x.png?a=1&b=2")),
        );
        assert_eq!(
            d.to_html().into_string(),
            "<p title=\"a &quot;b&quot;\">1 &lt; 2<img src=\"x.png?a=1&amp;b=2\"></p>"
        );
    }

    #[test]
    fn element_renders_inside_markup() {
        let el = Element::new("span").with_text("<b>");
        let markup = html! { div { (el) } };
        assert_eq!(markup.into_string(), "<div><span>&lt;b&gt;</span></div>");
    }
}
