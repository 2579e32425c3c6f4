//! Input resolution: normalise a user-supplied path or URL to a local image.
//!
//! The inference steps read the image from a stable local path, so URL
//! inputs are downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`]. Local inputs are never copied or deleted; the caller
//! owns them. Both kinds are checked for image magic bytes before returning
//! so a text file or PDF fails fast, before any model is called.

use crate::error::IdScanError;
use image::ImageFormat;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Formats accepted by the pipeline.
const ACCEPTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

/// The resolved input, either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; image downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the image regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local image path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, IdScanError> {
    if input.trim().is_empty() {
        return Err(IdScanError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Detect an accepted image format from leading bytes.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes)
        .ok()
        .filter(|f| ACCEPTED_FORMATS.contains(f))
}

/// Resolve a local file path, validating existence and image magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, IdScanError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(IdScanError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut head = Vec::with_capacity(16);
            if f.take(16).read_to_end(&mut head).is_err() || sniff_format(&head).is_none() {
                return Err(IdScanError::NotAnImage { path });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IdScanError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(IdScanError::FileNotFound { path });
        }
    }

    debug!("Resolved local image: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, IdScanError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IdScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            IdScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            IdScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(IdScanError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| IdScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let temp_dir = TempDir::new().map_err(|e| IdScanError::Processing(format!("temp dir: {e}")))?;
    let format = sniff_format(&bytes);
    let file_path = temp_dir.path().join(download_filename(url, format));

    let Some(_) = format else {
        return Err(IdScanError::NotAnImage { path: file_path });
    };

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| IdScanError::Processing(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Pick a file name for a downloaded image: the URL's last path segment when
/// it has an extension, otherwise a name derived from the sniffed format.
fn download_filename(url: &str, format: Option<ImageFormat>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    let ext = format
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("jpg");
    format!("downloaded.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/id.png"));
        assert!(is_url("http://example.com/id.jpg"));
        assert!(!is_url("/tmp/id.png"));
        assert!(!is_url("id.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn sniff_accepts_png_and_jpeg_only() {
        assert_eq!(sniff_format(PNG_MAGIC), Some(ImageFormat::Png));
        assert_eq!(sniff_format(JPEG_MAGIC), Some(ImageFormat::Jpeg));
        assert_eq!(sniff_format(b"%PDF-1.7"), None);
        assert_eq!(sniff_format(b"hello world"), None);
    }

    #[test]
    fn download_filename_prefers_url_segment() {
        assert_eq!(
            download_filename("https://example.com/scans/passport.png", None),
            "passport.png"
        );
        assert_eq!(
            download_filename("https://example.com/scan", Some(ImageFormat::Png)),
            "downloaded.png"
        );
        assert_eq!(download_filename("https://example.com/", None), "downloaded.jpg");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(err, IdScanError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn blank_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, IdScanError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn non_image_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not an image").unwrap();

        let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, IdScanError::NotAnImage { .. }));
    }

    #[tokio::test]
    async fn local_png_resolves_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let resolved = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), path.as_path());
        assert!(matches!(resolved, ResolvedInput::Local(_)));
    }
}
