use std::sync::Arc;

use axum::{Form, Json, async_trait};
use axum::extract::{FromRequest, Request};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use cores::payload::{AnalyseReply, AnalyseRequestBody};
use tracing::info;

use crate::api_error::ApiError;
use crate::gemini_client::InlineData;
use crate::images;
use crate::runtime_context::RuntimeContext;
use crate::upload_storage::LoadError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum UploadRef {
    Inline(String),
    Stored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AnalysisRequest {
    prompt: String,
    upload: UploadRef,
    file_type: String,
}

impl TryFrom<AnalyseRequestBody> for AnalysisRequest {
    type Error = ApiError;

    fn try_from(body: AnalyseRequestBody) -> Result<Self, Self::Error> {
        let prompt = non_empty(body.prompt);
        let file_type = non_empty(body.file_type);
        // fileBuffer wins when both are sent
        let upload = non_empty(body.file_buffer)
            .map(UploadRef::Inline)
            .or_else(|| non_empty(body.file_id).map(UploadRef::Stored));
        let (Some(prompt), Some(upload), Some(file_type)) = (prompt, upload, file_type) else {
            return Err(ApiError::MissingAnalyseFields)
        };
        Ok(Self { prompt, upload, file_type })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// JSON or urlencoded form, chosen by content-type
pub struct AnalyseBody(pub AnalyseRequestBody);

#[async_trait]
impl<S> FromRequest<S> for AnalyseBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| images::essence(v) == "application/x-www-form-urlencoded")
            .unwrap_or(false);
        let body = if is_form {
            Form::<AnalyseRequestBody>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .map_err(body_rejection)?
        } else {
            Json::<AnalyseRequestBody>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .map_err(body_rejection)?
        };
        Ok(Self(body))
    }
}

fn body_rejection<R: IntoResponse>(rejection: R) -> ApiError {
    let response = rejection.into_response();
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::InvalidRequestBody
    }
}

pub struct AnalyseRequestHandler {
    runtime_context: Arc<RuntimeContext>,
}

impl AnalyseRequestHandler {
    pub fn new(runtime_context: &Arc<RuntimeContext>) -> Arc<Self> {
        let runtime_context = Arc::clone(runtime_context);
        let handler = Self {
            runtime_context,
        };
        Arc::new(handler)
    }

    pub async fn handle_analyse(&self, body: AnalyseRequestBody) -> Result<Json<AnalyseReply>, ApiError> {
        let request = AnalysisRequest::try_from(body)?;
        let inline_data = self.inline_data(&request).await?;
        info!("analyse request prompt size {} data size {}", request.prompt.len(), inline_data.data.len());
        let reply = self.runtime_context.gemini_client()
            .generate_content(&request.prompt, inline_data)
            .await
            .map_err(ApiError::Analyse)?;
        Ok(Json(AnalyseReply { reply }))
    }

    async fn inline_data(&self, request: &AnalysisRequest) -> Result<InlineData, ApiError> {
        let data = match &request.upload {
            UploadRef::Inline(encoded) => {
                let encoded = encoded.trim();
                images::validate_base64(encoded).map_err(|_| ApiError::InvalidFileBuffer)?;
                encoded.to_string()
            },
            UploadRef::Stored(file_id) => {
                let storage = self.runtime_context.upload_storage();
                let bytes = storage.load(file_id).await.map_err(|e| match e {
                    LoadError::NotFound => ApiError::FileNotFound { file_id: file_id.clone() },
                    LoadError::Io(e) => ApiError::Analyse(e),
                })?;
                images::base64(&bytes)
            },
        };
        let inline_data = InlineData {
            mime_type: request.file_type.clone(),
            data,
        };
        Ok(inline_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(prompt: Option<&str>, file_buffer: Option<&str>, file_id: Option<&str>, file_type: Option<&str>) -> AnalyseRequestBody {
        AnalyseRequestBody {
            prompt: prompt.map(String::from),
            file_buffer: file_buffer.map(String::from),
            file_id: file_id.map(String::from),
            file_type: file_type.map(String::from),
        }
    }

    #[test]
    fn any_missing_field_is_rejected() {
        let cases = [
            body(None, Some("YWI="), None, Some("image/png")),
            body(Some("hi"), None, None, Some("image/png")),
            body(Some("hi"), Some("YWI="), None, None),
            body(Some("  "), Some("YWI="), None, Some("image/png")),
            body(Some("hi"), Some(""), Some(""), Some("image/png")),
        ];
        for case in cases {
            let result = AnalysisRequest::try_from(case);
            assert!(matches!(result, Err(ApiError::MissingAnalyseFields)));
        }
    }

    #[test]
    fn inline_buffer_takes_precedence_over_file_id() {
        let request = AnalysisRequest::try_from(body(Some("hi"), Some("YWI="), Some("1.png"), Some("image/png"))).unwrap();
        assert_eq!(request.upload, UploadRef::Inline("YWI=".into()));
        let request = AnalysisRequest::try_from(body(Some("hi"), None, Some("1.png"), Some("image/png"))).unwrap();
        assert_eq!(request.upload, UploadRef::Stored("1.png".into()));
    }
}
