//! `multipart/form-data` extraction for image uploads.

use bytes::Bytes;
use futures::stream;
use shared::{Error, IncomingFile, Result};
use std::convert::Infallible;

/// Form field carrying the uploaded image.
pub const FILE_FIELD: &str = "file";

/// Pull the `file` field out of a buffered multipart body.
pub async fn extract_file(content_type: Option<&str>, body: Vec<u8>) -> Result<IncomingFile> {
    let content_type =
        content_type.ok_or_else(|| Error::InvalidField("Missing content-type header".to_string()))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| Error::InvalidField(format!("Expected multipart form data: {}", e)))?;

    let body = stream::once(async move { Ok::<Bytes, Infallible>(Bytes::from(body)) });
    let mut multipart = multer::Multipart::new(body, boundary);

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(|mime| mime.to_string());
        let bytes = field.bytes().await.map_err(malformed)?;

        return Ok(IncomingFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(Error::InvalidField(format!("Missing form field `{}`", FILE_FIELD)))
}

fn malformed(err: multer::Error) -> Error {
    Error::InvalidField(format!("Malformed multipart body: {}", err))
}
