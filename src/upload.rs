use std::convert::Infallible;

use bytes::Bytes;
use futures::stream;

use crate::error::{StoreError, StoreResult};

/// A file field taken out of a `multipart/form-data` body.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub data: Bytes,
}

pub async fn read_file_field(content_type: Option<&str>, body: Bytes, field_name: &str) -> StoreResult<UploadedFile> {
    let content_type = content_type
        .ok_or_else(|| StoreError::validation("Expected a multipart/form-data request"))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| StoreError::validation(format!("Expected a multipart/form-data request: {}", e)))?;

    let body = stream::iter([Ok::<Bytes, Infallible>(body)]);
    let mut multipart = multer::Multipart::new(body, boundary);

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(malformed)?;
        return Ok(UploadedFile { file_name, data });
    }

    Err(StoreError::validation(format!("Multipart field '{}' is required", field_name)))
}

fn malformed(e: multer::Error) -> StoreError {
    StoreError::validation(format!("Malformed multipart body: {}", e))
}
