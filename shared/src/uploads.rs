//! Local image upload storage.
//!
//! Files are stored under a generated name and served back verbatim. The URL
//! returned by `save` is what clients put into a page's `image_url`.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::{Error, Result};

/// URL prefix under which stored files are served.
pub const UPLOAD_URL_PREFIX: &str = "/uploads/";

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Name as sent by the client; only its extension is kept
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A stored file read back for serving.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Directory-backed upload store.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Open the upload directory, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Store an image and return its retrieval URL.
    pub async fn save(&self, file: &IncomingFile) -> Result<String> {
        self.save_at(file, Utc::now()).await
    }

    async fn save_at(&self, file: &IncomingFile, now: DateTime<Utc>) -> Result<String> {
        ensure_image(file.content_type.as_deref())?;

        let name = generated_filename(&file.filename, now);
        fs::write(self.dir.join(&name), &file.bytes).await?;

        info!("Stored upload {} ({} bytes)", name, file.bytes.len());
        Ok(format!("{}{}", UPLOAD_URL_PREFIX, name))
    }

    /// Read a previously stored file.
    pub async fn read(&self, filename: &str) -> Result<StoredFile> {
        if !is_plain_filename(filename) {
            return Err(file_not_found());
        }

        match fs::read(self.dir.join(filename)).await {
            Ok(bytes) => Ok(StoredFile {
                content_type: content_type_for(filename),
                bytes,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(file_not_found()),
            Err(e) => Err(e.into()),
        }
    }
}

fn file_not_found() -> Error {
    Error::NotFound("File not found".to_string())
}

/// Reject anything that is not an `image/*` MIME type.
pub fn ensure_image(content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(content_type) if content_type.trim().to_ascii_lowercase().starts_with("image/") => Ok(()),
        _ => Err(Error::InvalidMediaType("Only image files are allowed".to_string())),
    }
}

/// UTC timestamp with microseconds followed by the original extension.
///
/// Extensions that are not plain ASCII alphanumerics are dropped.
pub fn generated_filename(original: &str, now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d%H%M%S%6f");
    match Path::new(original).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!("{}.{}", stamp, ext)
        }
        _ => stamp.to_string(),
    }
}

/// A single path component with no traversal.
fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\'])
        && !filename.contains("..")
}

/// Content type served for a stored file, by extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("heic") => "image/heic",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}
