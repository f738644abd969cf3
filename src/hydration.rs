//! Hydrating records from existing remote images.
//!
//! An input can declare images that already live on the server as a JSON list
//! of URLs. Each URL is fetched in list order, one at a time; a failed fetch
//! is logged and skipped, so one dead link never blocks the rest.
//!
//! Fetching goes through the [`ImageFetcher`] port. [`HttpFetcher`] is the
//! `reqwest` implementation; tests substitute an in-memory fetcher.

use crate::store::SourceFile;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HydrationError {
    #[error("GET {url} returned HTTP {status}")]
    Http { url: String, status: u16 },
    #[error("GET {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("Invalid image list: {0}")]
    InvalidList(String),
}

/// Parse the declared URL list.
///
/// Strict JSON first; a list written with single quotes (`['a.png']`) is
/// accepted as a fallback. Blank input is an empty list.
pub fn parse_url_list(raw: &str) -> Result<Vec<String>, HydrationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(urls) => Ok(urls),
        Err(strict) if raw.starts_with('[') => {
            serde_json::from_str::<Vec<String>>(&raw.replace('\'', "\""))
                .map_err(|_| HydrationError::InvalidList(strict.to_string()))
        }
        Err(e) => Err(HydrationError::InvalidList(e.to_string())),
    }
}

/// File name given to the `index`-th hydrated image: `existing_<n>.<ext>`.
///
/// The extension is taken from the URL path (query and fragment ignored),
/// defaulting to `png`.
pub fn existing_file_name(url: &str, index: usize) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    let ext = last
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("png");
    format!("existing_{}.{}", index + 1, ext.to_ascii_lowercase())
}

/// Body and content type of a fetched image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

/// Port for retrieving remote image bytes.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedImage, HydrationError>>;
}

/// [`ImageFetcher`] over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, HydrationError> {
        let network = |e: reqwest::Error| HydrationError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(HydrationError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = response.bytes().await.map_err(network)?;
        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            mime,
        })
    }
}

/// One successfully fetched image.
#[derive(Debug, Clone)]
pub struct HydratedImage {
    pub url: String,
    pub file: SourceFile,
}

/// Build a `SourceFile` for `fetched`, falling back to the URL's extension
/// when the response carried no usable content type.
pub fn to_source_file(name: String, fetched: FetchedImage) -> SourceFile {
    let mime = fetched
        .mime
        .filter(|m| !m.is_empty())
        .or_else(|| {
            name.rsplit_once('.')
                .and_then(|(_, ext)| crate::imaging::rust_codec::mime_for_extension(ext))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "image/png".to_string());
    SourceFile::new(name, mime, fetched.bytes)
}

/// Fetch every URL in order, skipping failures.
pub async fn fetch_all(fetcher: &impl ImageFetcher, urls: &[String]) -> Vec<HydratedImage> {
    let mut images = Vec::with_capacity(urls.len());
    for (index, url) in urls.iter().enumerate() {
        match fetcher.fetch(url).await {
            Ok(fetched) => {
                let file = to_source_file(existing_file_name(url, index), fetched);
                log::debug!("hydrated {url} as {} ({} bytes)", file.name, file.size());
                images.push(HydratedImage {
                    url: url.clone(),
                    file,
                });
            }
            Err(e) => log::warn!("skipping existing image: {e}"),
        }
    }
    images
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory fetcher recording every requested URL.
    #[derive(Default)]
    pub struct MockFetcher {
        responses: HashMap<String, Result<FetchedImage, HydrationError>>,
        pub requested: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_image(mut self, url: &str, bytes: Vec<u8>, mime: &str) -> Self {
            self.responses.insert(
                url.to_string(),
                Ok(FetchedImage {
                    bytes,
                    mime: Some(mime.to_string()),
                }),
            );
            self
        }

        pub fn with_status(mut self, url: &str, status: u16) -> Self {
            self.responses.insert(
                url.to_string(),
                Err(HydrationError::Http {
                    url: url.to_string(),
                    status,
                }),
            );
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl ImageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedImage, HydrationError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .unwrap_or_else(|| {
                    Err(HydrationError::Network {
                        url: url.to_string(),
                        message: "connection refused".into(),
                    })
                })
        }
    }

    // =========================================================================
    // parse_url_list
    // =========================================================================

    #[test]
    fn parses_strict_json() {
        let urls = parse_url_list(r#"["https://a/1.jpg", "https://a/2.png"]"#).unwrap();
        assert_eq!(urls, vec!["https://a/1.jpg", "https://a/2.png"]);
    }

    #[test]
    fn accepts_single_quoted_fallback() {
        let urls = parse_url_list("['https://a/1.jpg']").unwrap();
        assert_eq!(urls, vec!["https://a/1.jpg"]);
    }

    #[test]
    fn blank_is_empty_list() {
        assert!(parse_url_list("  ").unwrap().is_empty());
    }

    #[test]
    fn garbage_is_invalid_list() {
        assert!(matches!(
            parse_url_list("not json"),
            Err(HydrationError::InvalidList(_))
        ));
        assert!(matches!(
            parse_url_list("[1, 2]"),
            Err(HydrationError::InvalidList(_))
        ));
    }

    // =========================================================================
    // existing_file_name
    // =========================================================================

    #[test]
    fn file_name_uses_url_extension() {
        assert_eq!(existing_file_name("https://a/x/photo.JPG", 0), "existing_1.jpg");
        assert_eq!(existing_file_name("https://a/p.webp?w=300#top", 2), "existing_3.webp");
    }

    #[test]
    fn file_name_defaults_to_png() {
        assert_eq!(existing_file_name("https://a/image", 1), "existing_2.png");
        assert_eq!(existing_file_name("https://a.example.com/", 0), "existing_1.png");
    }

    // =========================================================================
    // fetch_all
    // =========================================================================

    #[tokio::test]
    async fn failures_are_skipped_in_order() {
        let fetcher = MockFetcher::new()
            .with_image("https://a/1.jpg", vec![1, 2, 3], "image/jpeg")
            .with_status("https://a/2.jpg", 404)
            .with_image("https://a/3.png", vec![4], "image/png");
        let urls: Vec<String> = ["https://a/1.jpg", "https://a/2.jpg", "https://a/gone.png", "https://a/3.png"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let images = fetch_all(&fetcher, &urls).await;

        assert_eq!(fetcher.requested(), urls);
        let names: Vec<_> = images.iter().map(|i| i.file.name.as_str()).collect();
        assert_eq!(names, vec!["existing_1.jpg", "existing_4.png"]);
        assert_eq!(images[0].file.mime, "image/jpeg");
        assert_eq!(images[1].url, "https://a/3.png");
    }

    #[test]
    fn missing_content_type_falls_back_to_extension() {
        let file = to_source_file(
            "existing_1.webp".into(),
            FetchedImage {
                bytes: vec![0],
                mime: None,
            },
        );
        assert_eq!(file.mime, "image/webp");
    }
}
