use crate::api_error::ApiError;
use crate::images;

pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/heif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    pub strict: bool,
}

impl UploadPolicy {
    pub fn new(max_bytes: usize, strict: bool) -> Self {
        Self { max_bytes, strict }
    }

    pub fn check_type(&self, mime_type: &str) -> Result<(), ApiError> {
        if !self.strict {
            return Ok(())
        }
        let essence = images::essence(mime_type);
        if ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
            Ok(())
        } else {
            Err(ApiError::UnsupportedFileType { file_type: mime_type.into() })
        }
    }

    // size ceiling applies regardless of strictness
    pub fn check_size(&self, len: usize) -> Result<(), ApiError> {
        if len > self.max_bytes {
            Err(ApiError::FileTooLarge { max_bytes: self.max_bytes })
        } else {
            Ok(())
        }
    }
}
