//! Form submission adapter.
//!
//! On submit each group contributes one file field per record, carrying the
//! record's current (possibly edited) content, plus a parallel list of order
//! tokens `new:<index>`. The server-side endpoint is a collaborator: we build a
//! compliant multipart request and report the status, nothing more.

use crate::store::{ImageRecord, SourceFile};
use crate::units::sanitize_field_name;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid part for {name}: {source}")]
    Part {
        name: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Array-style file field for `group` (`gallery` → `gallery[]`).
pub fn file_field_name(group: &str) -> String {
    if group.ends_with("[]") {
        group.to_string()
    } else {
        format!("{group}[]")
    }
}

/// Order field for `group` under `prefix`, with the group name sanitized.
pub fn order_field_name(prefix: &str, group: &str) -> String {
    format!("{prefix}{}[]", sanitize_field_name(group))
}

/// Order tokens for `count` records.
pub fn order_tokens(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("new:{i}")).collect()
}

/// Everything one group contributes to a form submission.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub files: Vec<(String, SourceFile)>,
    pub order: Vec<(String, String)>,
}

impl Submission {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.order.is_empty()
    }

    /// Append another group's fields.
    pub fn extend(&mut self, other: Submission) {
        self.files.extend(other.files);
        self.order.extend(other.order);
    }

    pub fn to_multipart(&self) -> Result<Form, SubmitError> {
        let mut form = Form::new();
        for (field, file) in &self.files {
            let part = Part::bytes(file.data.to_vec())
                .file_name(file.name.clone())
                .mime_str(&file.mime)
                .map_err(|source| SubmitError::Part {
                    name: file.name.clone(),
                    source,
                })?;
            form = form.part(field.clone(), part);
        }
        for (field, value) in &self.order {
            form = form.text(field.clone(), value.clone());
        }
        Ok(form)
    }
}

/// Collect `records` for submission.
///
/// Records without content (an adopted image whose bytes never arrived) are
/// skipped, for both the file parts and the order tokens. `order_prefix` is
/// `None` in HTML edit mode, which sends no order tokens.
pub fn build_submission(
    group: &str,
    records: &[ImageRecord],
    order_prefix: Option<&str>,
) -> Submission {
    let present: Vec<&ImageRecord> = records
        .iter()
        .filter(|r| {
            let has_content = !r.current_file.is_empty();
            if !has_content {
                log::debug!("{group}: record {} has no content, not submitted", r.id);
            }
            has_content
        })
        .collect();
    let field = file_field_name(group);
    let files = present
        .iter()
        .map(|r| (field.clone(), r.current_file.clone()))
        .collect();
    let order = match order_prefix {
        Some(prefix) => {
            let name = order_field_name(prefix, group);
            order_tokens(present.len())
                .into_iter()
                .map(|t| (name.clone(), t))
                .collect()
        }
        None => Vec::new(),
    };
    Submission { files, order }
}

/// POST `submission` to `endpoint` and return the HTTP status.
pub async fn submit(
    client: &reqwest::Client,
    endpoint: &str,
    submission: &Submission,
) -> Result<u16, SubmitError> {
    let form = submission.to_multipart()?;
    let response = client.post(endpoint).multipart(form).send().await?;
    let status = response.status().as_u16();
    log::info!(
        "submitted {} file(s) to {endpoint}: HTTP {status}",
        submission.files.len()
    );
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterUrl;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(name: &str, bytes: &[u8]) -> ImageRecord {
        ImageRecord::new(
            SourceFile::new(name, "image/png", bytes.to_vec()),
            RasterUrl::external("https://example.com/x"),
        )
    }

    #[test]
    fn field_names() {
        assert_eq!(file_field_name("gallery"), "gallery[]");
        assert_eq!(file_field_name("gallery[]"), "gallery[]");
        assert_eq!(order_field_name("image_order_", "post images"), "image_order_post_images[]");
    }

    #[test]
    fn files_and_order_follow_records() {
        let records = vec![record("b.png", b"bb"), record("a.png", b"a")];
        let sub = build_submission("gallery", &records, Some("image_order_"));

        let names: Vec<_> = sub.files.iter().map(|(f, s)| (f.as_str(), s.name.as_str())).collect();
        assert_eq!(names, vec![("gallery[]", "b.png"), ("gallery[]", "a.png")]);
        assert_eq!(
            sub.order,
            vec![
                ("image_order_gallery[]".to_string(), "new:0".to_string()),
                ("image_order_gallery[]".to_string(), "new:1".to_string()),
            ]
        );
    }

    #[test]
    fn empty_records_are_skipped() {
        let mut empty = record("gone.png", b"");
        empty.current_file = SourceFile::empty("gone.png");
        let sub = build_submission("g", &[empty, record("a.png", b"a")], None);
        assert_eq!(sub.files.len(), 1);
        assert!(sub.order.is_empty());
    }

    #[test]
    fn order_tokens_match_submitted_files() {
        let mut empty = record("gone.png", b"");
        empty.current_file = SourceFile::empty("gone.png");
        let records = vec![record("a.png", b"a"), empty, record("b.png", b"b")];
        let sub = build_submission("g", &records, Some("o_"));

        assert_eq!(sub.files.len(), 2);
        let tokens: Vec<_> = sub.order.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(tokens, vec!["new:0", "new:1"]);
    }

    #[test]
    fn multipart_builds_for_valid_mime() {
        let sub = build_submission("g", &[record("a.png", b"a")], Some("o_"));
        assert!(sub.to_multipart().is_ok());
    }

    #[test]
    fn multipart_rejects_bad_mime() {
        let mut r = record("a.png", b"a");
        r.current_file.mime = "not a mime".into();
        let sub = build_submission("g", &[r], None);
        assert!(matches!(sub.to_multipart(), Err(SubmitError::Part { .. })));
    }

    // =========================================================================
    // Posting
    // =========================================================================

    #[tokio::test]
    async fn submit_posts_parts_in_store_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let records = vec![record("b.png", b"bb"), record("a.png", b"a")];
        let sub = build_submission("post-images", &records, Some("image_order_"));
        let endpoint = format!("{}/upload", server.uri());
        let status = submit(&reqwest::Client::new(), &endpoint, &sub).await.unwrap();
        assert_eq!(status, 201);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let content_type = requests[0].headers.get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&requests[0].body);
        let at = |needle: &str| {
            body.find(needle)
                .unwrap_or_else(|| panic!("{needle} missing from body"))
        };
        assert_eq!(body.matches("name=\"post-images[]\"").count(), 2);
        assert_eq!(body.matches("name=\"image_order_post_images[]\"").count(), 2);
        assert!(at("filename=\"b.png\"") < at("filename=\"a.png\""));
        assert!(at("new:0") < at("new:1"));
    }
}
