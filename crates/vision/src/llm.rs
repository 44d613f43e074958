use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// A vision-and-language model that answers a text instruction about one image.
///
/// Implementations must be safe to share across concurrent resolutions.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, used for logging and cache keys
    fn model_id(&self) -> &str;

    /// Send the instruction and image, return the raw text answer
    async fn describe(&self, prompt: &str, image: &[u8]) -> Result<String>;
}

#[derive(Clone)]
pub struct GeminiVision {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Outcome of a single HTTP attempt; only transient failures are retried
#[derive(Debug)]
enum CallError {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

impl CallError {
    fn is_transient(&self) -> bool {
        matches!(self, CallError::Transient(_))
    }

    fn into_inner(self) -> anyhow::Error {
        match self {
            CallError::Transient(e) | CallError::Fatal(e) => e,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Transient(e) => write!(f, "transient: {:#}", e),
            CallError::Fatal(e) => write!(f, "fatal: {:#}", e),
        }
    }
}

impl GeminiVision {
    pub fn new(
        base_url: String,
        model: String,
        api_key: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build vision HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client,
            retry,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate_once(&self, request: &GenerateRequest<'_>) -> Result<String, CallError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send request to vision model")
            .map_err(CallError::Transient)?;

        let status = response.status();
        if !status.is_success() {
            let err = anyhow::anyhow!("Vision request failed: {}", status);
            return Err(if is_retryable(status) {
                CallError::Transient(err)
            } else {
                CallError::Fatal(err)
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse vision model response")
            .map_err(CallError::Fatal)?;

        response_text(body).map_err(CallError::Fatal)
    }
}

#[async_trait]
impl VisionModel for GeminiVision {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn describe(&self, prompt: &str, image: &[u8]) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: sniff_mime(image).to_string(),
                            data: STANDARD.encode(image),
                        },
                    },
                ],
            }],
        };

        self.retry
            .retry_when(
                "vision_generate",
                || self.generate_once(&request),
                CallError::is_transient,
            )
            .await
            .map_err(CallError::into_inner)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn response_text(body: GenerateResponse) -> Result<String> {
    let text: String = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        anyhow::bail!("Vision model returned no text");
    }
    Ok(text)
}

/// MIME type of the image, defaulting to JPEG when the bytes are not recognized
pub fn sniff_mime(image: &[u8]) -> &'static str {
    match infer::get(image) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => kind.mime_type(),
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "where?" },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: STANDARD.encode([1u8, 2, 3]),
                        },
                    },
                ],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "where?");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "AQID");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"error\":"},{"text":"\"unknown\"}"}]}}]}"#,
        )
        .unwrap();

        assert_eq!(response_text(body).unwrap(), r#"{"error":"unknown"}"#);
    }

    #[test]
    fn test_empty_response_is_error() {
        let body: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(response_text(body).is_err());
    }

    #[test]
    fn test_sniff_mime() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_mime(&png), "image/png");
        assert_eq!(sniff_mime(b"plain text"), "image/jpeg");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }
}
