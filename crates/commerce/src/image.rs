//! Image materialization: remote URLs become embedded `data:` URIs.
//!
//! Fetches are time-bounded and size-capped. Any failure degrades to the
//! placeholder image; nothing here ever returns an error to the caller.
//! Successful results are cached in memory so repeated references to the same
//! URL are fetched once.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kaline_core::{ImageKind, ImageRef};
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ImageConfig;

/// Total bytes of encoded images kept in the cache.
const CACHE_CAPACITY_BYTES: u64 = 64 * 1024 * 1024;
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF";
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";

/// Why a fetch fell back to the placeholder.
#[derive(Debug, Error)]
enum FetchError {
    #[error("invalid image URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(u16),
    #[error("empty body")]
    Empty,
    #[error("body exceeds {0} bytes")]
    TooLarge(usize),
    #[error("body is not a readable image")]
    NotAnImage,
}

/// Resolves image references into self-contained embedded content.
#[derive(Clone)]
pub struct ImageMaterializer {
    client: reqwest::Client,
    max_bytes: usize,
    cache: Cache<String, ImageRef>,
}

impl std::fmt::Debug for ImageMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageMaterializer")
            .field("max_bytes", &self.max_bytes)
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl ImageMaterializer {
    /// Create a materializer with the given limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ImageConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;

        let cache = Cache::builder()
            .weigher(|key: &String, value: &ImageRef| {
                u32::try_from(key.len() + value.as_str().len()).unwrap_or(u32::MAX)
            })
            .max_capacity(CACHE_CAPACITY_BYTES)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
            cache,
        })
    }

    /// Resolve a reference.
    ///
    /// Embedded content is returned unchanged, so this is idempotent. Remote
    /// references are fetched and encoded. Everything else, and every failed
    /// fetch, yields the placeholder.
    pub async fn materialize(&self, reference: &ImageRef) -> ImageRef {
        match reference.kind() {
            ImageKind::Embedded => reference.clone(),
            ImageKind::Unrecognized => {
                if !reference.as_str().trim().is_empty() {
                    debug!(reference = %truncate(reference.as_str()), "unrecognized image reference");
                }
                ImageRef::placeholder()
            }
            ImageKind::Remote => {
                let url = reference.as_str().trim().to_string();
                if let Some(cached) = self.cache.get(&url).await {
                    debug!(url = %url, "image cache hit");
                    return cached;
                }
                match self.fetch(&url).await {
                    Ok(embedded) => {
                        self.cache.insert(url, embedded.clone()).await;
                        embedded
                    }
                    Err(e) => {
                        debug!(url = %url, error = %e, "image fetch failed, using placeholder");
                        ImageRef::placeholder()
                    }
                }
            }
        }
    }

    /// Resolve a raw string reference.
    pub async fn materialize_str(&self, reference: &str) -> ImageRef {
        self.materialize(&ImageRef::new(reference)).await
    }

    #[instrument(skip(self), fields(bytes = tracing::field::Empty))]
    async fn fetch(&self, url: &str) -> Result<ImageRef, FetchError> {
        let url = Url::parse(url)?;
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(length) = response.content_length()
            && u64::try_from(self.max_bytes).is_ok_and(|max| length > max)
        {
            return Err(FetchError::TooLarge(self.max_bytes));
        }

        let declared = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(image_mime);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge(self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        if body.is_empty() {
            return Err(FetchError::Empty);
        }
        tracing::Span::current().record("bytes", body.len());

        let mime = declared
            .or_else(|| sniff_mime(&body).map(str::to_string))
            .ok_or(FetchError::NotAnImage)?;

        Ok(ImageRef::new(format!(
            "data:{mime};base64,{}",
            STANDARD.encode(&body)
        )))
    }
}

/// The `image/*` essence of a `Content-Type` header, if it is one.
fn image_mime(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    (essence.len() > "image/".len() && essence.starts_with("image/")).then_some(essence)
}

/// Identify an image format from its leading bytes.
fn sniff_mime(body: &[u8]) -> Option<&'static str> {
    if body.starts_with(PNG_MAGIC) {
        return Some("image/png");
    }
    if body.starts_with(JPEG_MAGIC) {
        return Some("image/jpeg");
    }
    if body.starts_with(GIF87_MAGIC) || body.starts_with(GIF89_MAGIC) {
        return Some("image/gif");
    }
    if body.starts_with(b"RIFF") && body.get(8..12) == Some(b"WEBP".as_slice()) {
        return Some("image/webp");
    }

    let head = body.get(..body.len().min(512)).unwrap_or(body);
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg")) {
        return Some("image/svg+xml");
    }
    None
}

fn truncate(s: &str) -> String {
    s.chars().take(80).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn materializer() -> ImageMaterializer {
        ImageMaterializer::new(&ImageConfig {
            timeout: Duration::from_millis(500),
            max_bytes: 1024,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_embedded_passes_through() {
        let images = materializer();
        let embedded = ImageRef::new("data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(images.materialize(&embedded).await, embedded);

        let placeholder = ImageRef::placeholder();
        assert_eq!(images.materialize(&placeholder).await, placeholder);
    }

    #[tokio::test]
    async fn test_empty_and_unrecognized_yield_placeholder() {
        let images = materializer();
        assert!(images.materialize_str("").await.is_placeholder());
        assert!(images.materialize_str("   ").await.is_placeholder());
        assert!(images.materialize_str("/placeholder.jpg").await.is_placeholder());
        assert!(images.materialize_str("ftp://host/a.png").await.is_placeholder());
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_placeholder() {
        let images = materializer();
        let result = images.materialize_str("http://127.0.0.1:1/a.png").await;
        assert!(result.is_placeholder());
    }

    #[tokio::test]
    async fn test_materialize_is_idempotent() {
        let images = materializer();
        for reference in [
            "",
            "nonsense",
            "data:image/gif;base64,R0lGODlhAQABAAAAACw=",
            "http://127.0.0.1:1/a.png",
        ] {
            let once = images.materialize_str(reference).await;
            let twice = images.materialize(&once).await;
            assert_eq!(once, twice, "reference {reference:?}");
        }
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\nrest"), Some("image/png"));
        assert_eq!(sniff_mime(b"\xFF\xD8\xFF\xE0rest"), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(
            sniff_mime(br#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"/>"#),
            Some("image/svg+xml")
        );
        assert_eq!(sniff_mime(b"<html><body>nope</body></html>"), None);
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WAVE"), None);
    }

    #[test]
    fn test_image_mime_from_header() {
        assert_eq!(image_mime("image/png").as_deref(), Some("image/png"));
        assert_eq!(image_mime("Image/JPEG; charset=binary").as_deref(), Some("image/jpeg"));
        assert_eq!(image_mime("text/html"), None);
        assert_eq!(image_mime("image/"), None);
    }
}
