use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("Invalid image type")]
    InvalidType,

    #[error("Image too large")]
    TooLarge,

    #[error("Invalid file extension")]
    InvalidExtension,

    #[error("Invalid image content")]
    InvalidContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".jpg" | ".jpeg" => Some(ImageKind::Jpeg),
            ".png" => Some(ImageKind::Png),
            ".webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&[0x89, 0x50, 0x4e, 0x47]) {
            Some(ImageKind::Png)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }
}

/// An `attachment` field as received from the multipart form.
#[derive(Debug)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// Checks type, size, extension and signature, in that order, and
    /// requires all three descriptions to agree. Returns the normalized
    /// extension for the stored file.
    pub fn validate(&self, max_bytes: usize) -> Result<String, UploadRejection> {
        let declared = self
            .content_type
            .as_deref()
            .and_then(ImageKind::from_mime)
            .ok_or(UploadRejection::InvalidType)?;

        if self.bytes.len() > max_bytes {
            return Err(UploadRejection::TooLarge);
        }

        let ext = sanitize_extension(&self.file_name);
        let by_name = ImageKind::from_extension(&ext).ok_or(UploadRejection::InvalidExtension)?;

        let sniffed = ImageKind::sniff(&self.bytes).ok_or(UploadRejection::InvalidContent)?;
        if sniffed != declared || sniffed != by_name {
            return Err(UploadRejection::InvalidContent);
        }

        Ok(ext)
    }
}

/// Lower-cased extension including the dot, restricted to `[a-z.]`.
pub fn sanitize_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e: String = e
                .to_lowercase()
                .chars()
                .filter(|c| c.is_ascii_lowercase())
                .collect();
            format!(".{e}")
        })
        .unwrap_or_default()
}

pub fn sanitize_email_for_path(email: &str) -> String {
    email
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes the image under `dir` as `{millis}-{email}-{uuid}{ext}`.
pub async fn store_image(
    dir: &Path,
    email: &str,
    ext: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let file_name = format!(
        "{millis}-{}-{}{ext}",
        sanitize_email_for_path(email),
        Uuid::new_v4()
    );

    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
