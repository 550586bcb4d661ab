use std::sync::Arc;

use axum::Json;
use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::http::StatusCode;
use cores::payload::{UploadResponse, UPLOAD_SUCCESS_MESSAGE};
use tracing::info;

use crate::api_error::ApiError;
use crate::images::DEFAULT_MIME_TYPE;
use crate::runtime_context::RuntimeContext;
use crate::upload_storage::StoredUpload;

pub const UPLOAD_FIELD_NAME: &str = "file";

struct ReceivedFile {
    original_name: Option<String>,
    mime_type: String,
    data: Vec<u8>,
}

pub struct UploadRequestHandler {
    runtime_context: Arc<RuntimeContext>,
}

impl UploadRequestHandler {
    pub fn new(runtime_context: &Arc<RuntimeContext>) -> Arc<Self> {
        let runtime_context = Arc::clone(runtime_context);
        let handler = Self {
            runtime_context,
        };
        Arc::new(handler)
    }

    pub async fn handle_upload(&self, multipart: Result<Multipart, MultipartRejection>) -> Result<Json<UploadResponse>, ApiError> {
        // not multipart at all counts as "no file"
        let Ok(mut multipart) = multipart else {
            return Err(ApiError::NoFileUploaded)
        };
        let received = self.receive_file(&mut multipart).await?
            .ok_or(ApiError::NoFileUploaded)?;
        info!("upload received {:?} {} ({} bytes)", received.original_name, received.mime_type, received.data.len());
        let storage = self.runtime_context.upload_storage();
        let stored = storage.store(&received.data, &received.mime_type, received.original_name.as_deref())
            .await
            .map_err(ApiError::Upload)?;
        let (file_buffer, file_id) = match stored {
            StoredUpload::Inline(encoded) => (Some(encoded), None),
            StoredUpload::File(file_id) => (None, Some(file_id)),
        };
        let response = UploadResponse {
            message: UPLOAD_SUCCESS_MESSAGE.into(),
            file_buffer,
            file_id,
            file_type: received.mime_type,
        };
        Ok(Json(response))
    }

    // first field named `file` wins, everything else is skipped
    async fn receive_file(&self, multipart: &mut Multipart) -> Result<Option<ReceivedFile>, ApiError> {
        let max_bytes = self.runtime_context.upload_policy().max_bytes;
        while let Some(field) = multipart.next_field().await.map_err(multipart_error(max_bytes))? {
            if field.name() != Some(UPLOAD_FIELD_NAME) {
                continue
            }
            let original_name = field.file_name().map(String::from);
            let mime_type = field.content_type()
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string();
            // type is checked before reading so rejected uploads are not buffered
            self.runtime_context.upload_policy().check_type(&mime_type)?;
            let data = self.read_field(field).await?;
            return Ok(Some(ReceivedFile { original_name, mime_type, data }))
        }
        Ok(None)
    }

    async fn read_field(&self, mut field: Field<'_>) -> Result<Vec<u8>, ApiError> {
        let policy = self.runtime_context.upload_policy();
        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error(policy.max_bytes))? {
            policy.check_size(data.len() + chunk.len())?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }
}

// hitting the body limit is reported like any other oversize file
fn multipart_error(max_bytes: usize) -> impl Fn(MultipartError) -> ApiError {
    move |error| {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::FileTooLarge { max_bytes }
        } else {
            info!("multipart error {}", error.body_text());
            ApiError::InvalidMultipart
        }
    }
}
