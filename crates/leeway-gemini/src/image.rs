//! Inline image encoding.
//!
//! Images travel as raw file bytes, base64 encoded with the standard padded
//! alphabet. The MIME type comes from the file extension and falls back to
//! JPEG, which is what phone cameras produce.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::Path;
use tracing::{debug, warn};

use crate::protocol::InlineData;

pub const FALLBACK_MIME: &str = "image/jpeg";

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// Read and encode an image. Returns `None` when it cannot be attached.
pub async fn encode_image(path: &Path, max_bytes: u64) -> Option<InlineData> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > max_bytes => {
            warn!(
                path = %path.display(),
                size = meta.len(),
                limit = max_bytes,
                "Image too large to attach, continuing without it"
            );
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Image unreadable, continuing without it");
            return None;
        }
    }

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            warn!(path = %path.display(), "Image is empty, continuing without it");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Image unreadable, continuing without it");
            return None;
        }
    };

    let mime_type = mime_for_path(path).unwrap_or(FALLBACK_MIME).to_string();
    debug!(path = %path.display(), bytes = bytes.len(), mime = %mime_type, "Encoded image");

    Some(InlineData {
        mime_type,
        data: BASE64.encode(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for_path(Path::new("a/room.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("room.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("room.heic")), Some("image/heic"));
        assert_eq!(mime_for_path(Path::new("room")), None);
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
    }

    #[tokio::test]
    async fn encodes_file_bytes_as_padded_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.webp");
        std::fs::write(&path, b"abcd").unwrap();

        let inline = encode_image(&path, 1024).await.unwrap();
        assert_eq!(inline.mime_type, "image/webp");
        assert_eq!(inline.data, "YWJjZA==");
    }

    #[tokio::test]
    async fn unknown_extension_defaults_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture");
        std::fs::write(&path, b"\xff\xd8\xff").unwrap();

        let inline = encode_image(&path, 1024).await.unwrap();
        assert_eq!(inline.mime_type, FALLBACK_MIME);
    }

    #[tokio::test]
    async fn missing_empty_or_oversized_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(encode_image(&dir.path().join("nope.jpg"), 1024).await.is_none());

        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();
        assert!(encode_image(&empty, 1024).await.is_none());

        let big = dir.path().join("big.jpg");
        std::fs::write(&big, vec![0u8; 64]).unwrap();
        assert!(encode_image(&big, 63).await.is_none());
        assert!(encode_image(&big, 64).await.is_some());
    }
}
