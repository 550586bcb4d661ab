use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cores::payload::ErrorBody;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file uploaded")]
    NoFileUploaded,
    #[error("Invalid multipart payload")]
    InvalidMultipart,
    #[error("Invalid file type. Only JPEG, PNG, and HEIF images are allowed.")]
    UnsupportedFileType { file_type: String },
    #[error("File too large. Maximum size is {max_bytes} bytes")]
    FileTooLarge { max_bytes: usize },
    #[error("Missing prompt, fileBuffer/fileId, or fileType")]
    MissingAnalyseFields,
    #[error("Invalid request body")]
    InvalidRequestBody,
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Invalid fileBuffer encoding")]
    InvalidFileBuffer,
    #[error("File not found")]
    FileNotFound { file_id: String },
    #[error("Failed to upload file.")]
    Upload(anyhow::Error),
    #[error("Failed to analyse image/question.")]
    Analyse(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upload(_) | Self::Analyse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Upload(error) | Self::Analyse(error) => {
                tracing::error!("{}: {:?}", self, error);
            },
            Self::UnsupportedFileType { file_type } => {
                tracing::info!("rejected upload of type {}", file_type);
            },
            Self::FileNotFound { file_id } => {
                tracing::info!("file not found {:?}", file_id);
            },
            _ => {
                tracing::info!("rejected request: {}", self);
            },
        }
        let body = ErrorBody { error: self.to_string() };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(ApiError::NoFileUploaded.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingAnalyseFields.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::FileNotFound { file_id: "x".into() }.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::FileTooLarge { max_bytes: 1 }.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_hide_their_cause() {
        let error = ApiError::Analyse(anyhow::anyhow!("quota exceeded for key abc"));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "Failed to analyse image/question.");
    }
}
