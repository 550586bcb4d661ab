
use serde::{Serialize, Deserialize};

pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully";

// response of POST /upload
// exactly one of file_buffer (memory storage) or file_id (disk storage) is set
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_buffer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    pub file_type: String,
}

// body of POST /gemini-analyse, accepted as JSON or urlencoded form
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyseRequestBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub file_buffer: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalyseReply {
    pub reply: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}
