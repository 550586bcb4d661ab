use std::sync::Arc;
use anyhow::{Context, Result, bail};
use reqwest::{self, Client};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GeminiConfig;

// https://ai.google.dev/api/generate-content#request-body
#[derive(Serialize)]
struct GenerateContentRequestBody {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

// https://ai.google.dev/api/caching#Blob
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

// https://ai.google.dev/api/generate-content#generatecontentresponse
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponseBody {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let this = Self {
            client,
            config: config.clone(),
        };
        let this = Arc::new(this);
        Ok(this)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    // https://ai.google.dev/api/generate-content#method:-models.generatecontent
    pub async fn generate_content(&self, prompt: &str, inline_data: InlineData) -> Result<String> {
        let request_body = GenerateContentRequestBody {
            contents: vec![
                Content {
                    role: Some("user".into()),
                    parts: vec![
                        Part {
                            text: Some(prompt.into()),
                            ..Default::default()
                        },
                        Part {
                            inline_data: Some(inline_data),
                            ..Default::default()
                        },
                    ],
                }
            ],
        };
        let url = format!("{}/v1beta/models/{}:generateContent", self.config.api_base, self.config.model);
        info!("generateContent in progress model {}", self.config.model);
        let response = self.client.post(&url)
            .header("Content-type", "application/json; charset=utf-8")
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            bail!("generateContent failed with status {}: {}", status, text);
        }
        let response: GenerateContentResponseBody = serde_json::from_str(&text)
            .context("malformed generateContent response")?;
        let reply = Self::response_text(response)?;
        info!("generateContent complete: reply size {}", reply.len());
        Ok(reply)
    }

    // the first candidate's text parts, joined
    fn response_text(response: GenerateContentResponseBody) -> Result<String> {
        if let Some(reason) = response.prompt_feedback.and_then(|v| v.block_reason) {
            bail!("prompt blocked: {}", reason);
        }
        let candidate = response.candidates.into_iter()
            .next()
            .context("no candidates in response")?;
        let finish_reason = candidate.finish_reason;
        let text: String = candidate.content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.is_empty() {
            bail!("candidate has no text, finish reason {:?}", finish_reason);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponseBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let response = parse(r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "A cat "}, {"text": "on a mat."}]}, "finishReason": "STOP"},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]
        }"#);
        assert_eq!(GeminiClient::response_text(response).unwrap(), "A cat on a mat.");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response = parse(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#);
        let error = GeminiClient::response_text(response).unwrap_err();
        assert!(error.to_string().contains("SAFETY"));
    }

    #[test]
    fn empty_candidate_is_an_error() {
        let response = parse(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#);
        assert!(GeminiClient::response_text(response).is_err());
        assert!(GeminiClient::response_text(parse("{}")).is_err());
    }

    #[test]
    fn request_body_uses_camel_case_inline_data() {
        let part = Part {
            inline_data: Some(InlineData { mime_type: "image/png".into(), data: "YWI=".into() }),
            ..Default::default()
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["inlineData"]["data"], "YWI=");
        assert!(json.get("text").is_none());
    }
}
