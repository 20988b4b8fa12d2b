use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use image::ImageFormat;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn, error};

use crate::payload::{ContentPart, ModelPayload};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("request timed out: {0}")] Timeout(String),
    #[error("connection error: {0}")] Connection(String),
    #[error("HTTP error: status={status} body={body}")] Status { status: u16, body: String },
    #[error("HTTP error: {0}")] Http(String),
    #[error("parse error: {0}")] Parse(String),
    #[error("encode error: {0}")] Encode(String),
}

impl From<reqwest::Error> for GeminiError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            GeminiError::Timeout(e.to_string())
        } else if e.is_connect() {
            GeminiError::Connection(e.to_string())
        } else {
            GeminiError::Http(e.to_string())
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGenerationConfig {
    pub aspect_ratio: String,
    pub resolution_tier: String,
}

/// Everything a single model invocation needs.
#[derive(Debug, Clone, Copy)]
pub struct ModelCall<'a> {
    pub api_key: &'a str,
    pub model_id: &'a str,
    pub payload: &'a ModelPayload<'a>,
    pub config: &'a ImageGenerationConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePart {
    pub text: Option<String>,
    pub inline_data: Option<InlineImage>,
}

#[cfg(test)]
impl ResponsePart {
    pub fn text(t: impl Into<String>) -> Self {
        Self { text: Some(t.into()), inline_data: None }
    }

    pub fn image(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { text: None, inline_data: Some(InlineImage { mime_type: mime_type.into(), data: data.into() }) }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub parts: Vec<ResponsePart>,
}

/// One round trip to the image model. Never retries.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, call: ModelCall<'_>) -> Result<ModelResponse, GeminiError>;
}

#[async_trait]
impl<T: ModelInvoker + ?Sized> ModelInvoker for Arc<T> {
    async fn invoke(&self, call: ModelCall<'_>) -> Result<ModelResponse, GeminiError> {
        (**self).invoke(call).await
    }
}

// Helper function to truncate base64 data in JSON for cleaner logging
pub fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.is_ascii() {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

/// Short preview of a long base64 string for log lines.
pub fn preview(data: &str) -> String {
    if data.len() > 50 && data.is_ascii() {
        format!("{}...[{} chars total]", &data[..50], data.len())
    } else {
        data.to_string()
    }
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeminiError::Http(e.to_string()))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model_id)
    }
}

#[async_trait]
impl ModelInvoker for GeminiClient {
    async fn invoke(&self, call: ModelCall<'_>) -> Result<ModelResponse, GeminiError> {
        let url = self.endpoint(call.model_id);
        info!("🔗 Making request to: {}", url);

        let request_body = build_request_body(call.payload, call.config)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let mut logged = request_body.clone();
            truncate_base64_in_json(&mut logged);
            debug!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());
        }

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", call.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await?;
        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Status { status: status.as_u16(), body: response_text });
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(e.to_string()))?;
        Ok(parsed.into_model_response())
    }
}

/// Encodes the payload as a `generateContent` body, images as inline PNG.
pub fn build_request_body(payload: &ModelPayload<'_>, config: &ImageGenerationConfig) -> Result<Value, GeminiError> {
    let mut parts = Vec::new();
    for part in payload.parts() {
        match part {
            ContentPart::Text(text) => parts.push(json!({ "text": text })),
            ContentPart::Image(img) => {
                let mut buf = Vec::new();
                img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                    .map_err(|e| GeminiError::Encode(e.to_string()))?;
                parts.push(json!({
                    "inlineData": {
                        "mimeType": "image/png",
                        "data": base64::engine::general_purpose::STANDARD.encode(&buf),
                    }
                }));
            }
        }
    }

    Ok(json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": {
                "aspectRatio": config.aspect_ratio,
                "imageSize": config.resolution_tier,
            }
        }
    }))
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<WirePart> }

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<WireInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    data: String,
    #[serde(default)]
    mime_type: String,
}

impl GeminiResponse {
    fn into_model_response(self) -> ModelResponse {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            warn!("🚫 Prompt blocked by model: {}", reason);
        }

        let mut parts = Vec::new();
        for candidate in self.candidates {
            if let Some(reason) = candidate.finish_reason.as_deref().filter(|r| *r != "STOP") {
                warn!("⚠️ Candidate finished with reason: {}", reason);
            }
            for p in candidate.content.parts {
                let inline_data = p.inline_data.and_then(|d| {
                    match base64::engine::general_purpose::STANDARD.decode(d.data.as_bytes()) {
                        Ok(bytes) => Some(InlineImage { mime_type: d.mime_type, data: Bytes::from(bytes) }),
                        Err(e) => {
                            warn!("⚠️ Dropping inline data with invalid base64 ({}): {}", d.mime_type, e);
                            None
                        }
                    }
                });
                parts.push(ResponsePart { text: p.text, inline_data });
            }
        }
        ModelResponse { parts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use pretty_assertions::assert_eq;

    fn config() -> ImageGenerationConfig {
        ImageGenerationConfig { aspect_ratio: "9:16".into(), resolution_tier: "2K".into() }
    }

    #[test]
    fn text_payload_body() {
        let body = build_request_body(&ModelPayload::Text("a poster"), &config()).unwrap();
        assert_eq!(body["contents"][0]["parts"], json!([{ "text": "a poster" }]));
        assert_eq!(body["generationConfig"]["imageConfig"], json!({ "aspectRatio": "9:16", "imageSize": "2K" }));
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["TEXT", "IMAGE"]));
    }

    #[test]
    fn images_become_inline_png_parts_in_order() {
        let logo = DynamicImage::new_rgb8(3, 3);
        let payload = ModelPayload::Sequence(vec![ContentPart::Text("p"), ContentPart::Image(&logo)]);
        let body = build_request_body(&payload, &config()).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "p");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        let data = parts[1]["inlineData"]["data"].as_str().unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(data).unwrap();
        assert_eq!(image::load_from_memory(&bytes).unwrap().width(), 3);
    }

    #[test]
    fn parses_parts_across_candidates() {
        let raw = json!({
            "candidates": [
                { "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
                ] }, "finishReason": "STOP" },
                { "content": { "parts": [ { "inlineData": { "mimeType": "image/png", "data": "%%%" } } ] } }
            ]
        });
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let response = parsed.into_model_response();
        assert_eq!(response.parts.len(), 3);
        assert_eq!(response.parts[0], ResponsePart::text("here you go"));
        assert_eq!(response.parts[1], ResponsePart::image("image/png", vec![1u8, 2, 3]));
        // invalid base64 keeps the part but drops its payload
        assert_eq!(response.parts[2], ResponsePart::default());
    }

    #[test]
    fn blocked_prompt_yields_no_parts() {
        let raw = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        assert!(parsed.into_model_response().parts.is_empty());
    }

    #[test]
    fn truncates_long_base64_for_logs() {
        let long = "A".repeat(200);
        let mut v = json!({ "parts": [{ "inlineData": { "data": long } }] });
        truncate_base64_in_json(&mut v);
        let s = v["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert!(s.ends_with("...[truncated 150 chars]"));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn status_error_message_is_classifiable() {
        let e = GeminiError::Status { status: 503, body: "unavailable".into() };
        assert_eq!(e.to_string(), "HTTP error: status=503 body=unavailable");
    }

    #[tokio::test]
    async fn transport_errors_never_carry_the_key() {
        let client = GeminiClient::new("http://127.0.0.1:1/v1beta", Duration::from_secs(5)).unwrap();
        let payload = ModelPayload::Text("a poster");
        let config = config();
        let call = ModelCall { api_key: "SECRETKEY500", model_id: "m", payload: &payload, config: &config };

        let err = client.invoke(call).await.unwrap_err();
        let text = err.to_string();
        assert!(!text.contains("SECRETKEY500"), "key leaked: {text}");
        assert!(!text.contains("127.0.0.1"), "url leaked: {text}");
        assert_eq!(
            crate::classify::classify(crate::classify::FailureSignal::Message(&text)),
            crate::classify::FailureCategory::Network
        );
    }

    #[test]
    fn endpoint_has_no_query_string() {
        let client = GeminiClient::new("https://example.test/v1beta/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("img-model"), "https://example.test/v1beta/models/img-model:generateContent");
    }
}
