//! Image encoding: local image file → base64 payload wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. The original bytes are sent untouched (no resizing, no re-encoding);
//! only the MIME type is sniffed so the data-URI header matches the payload.
//! `detail: "high"` asks GPT-4-class models for the full tile budget, which
//! matters for machine-readable zones and small print on ID cards.

use crate::error::IdScanError;
use crate::pipeline::input::sniff_format;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::path::Path;
use tracing::debug;

/// MIME type used when the bytes do not match a known signature.
const FALLBACK_MIME: &str = "image/jpeg";

/// Encode raw image bytes as a base64 payload ready for the VLM API.
pub fn encode_bytes(bytes: &[u8]) -> ImageData {
    let mime = sniff_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or(FALLBACK_MIME);

    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64 ({})", b64.len(), mime);

    ImageData::new(b64, mime).with_detail("high")
}

/// Read and encode the image at `path`.
///
/// Read failures are surfaced as [`IdScanError::ImageReadFailed`]; for any
/// readable file the encoding itself cannot fail.
pub async fn encode_image(path: &Path) -> Result<ImageData, IdScanError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| IdScanError::ImageReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(encode_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_png_keeps_bytes_and_mime() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let data = encode_bytes(&buf);
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, buf);
    }

    #[test]
    fn unknown_signature_falls_back_to_jpeg() {
        let data = encode_bytes(b"not really an image");
        assert_eq!(data.mime_type, "image/jpeg");
    }

    #[test]
    fn unreadable_path_is_an_error() {
        let err = tokio_test::block_on(encode_image(Path::new("/no/such/image.png"))).unwrap_err();
        assert!(matches!(err, IdScanError::ImageReadFailed { .. }));
    }
}
