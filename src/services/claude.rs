use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::models::{ExtractedReceipt, ExtractorConfig, ImagePayload};
use crate::utils::parse_receipt_date;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const USER_PROMPT: &str = "Extract this receipt data into JSON format.";

/// Extraction failures, classified so the caller can tell transient
/// transport trouble from a response that needs manual correction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Network-level failure (unreachable service, timeout, broken IO).
    #[error("request failed: {0}")]
    Transport(String),

    /// HTTP 429 from the model service.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Non-success HTTP status with the response body.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body is not the expected structured data.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Well-formed JSON with missing or out-of-range receipt fields.
    #[error("invalid receipt data: {0}")]
    InvalidData(String),
}

impl ExtractError {
    /// Transient failures worth another attempt. Client-side mistakes and
    /// bad model output are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractError::Transport(_) => true,
            ExtractError::RateLimited { .. } => true,
            ExtractError::Api { status, .. } => *status >= 500,
            ExtractError::MalformedResponse(_) => false,
            ExtractError::InvalidData(_) => false,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Image { source: MediaSource },
    Document { source: MediaSource },
    Text { text: String },
}

#[derive(Serialize)]
struct MediaSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct RawReceiptPayload {
    date: String,
    total: f64,
    #[serde(rename = "categoryCode")]
    category_code: String,
}

/// Client for the Anthropic Messages API that turns one receipt payload into
/// a validated [`ExtractedReceipt`].
///
/// Calls are independent and stateless; dropping the returned future abandons
/// the in-flight request.
pub struct ClaudeExtractor {
    client: reqwest::Client,
    schema: JSONSchema,
    config: ExtractorConfig,
}

impl ClaudeExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        ClaudeExtractor {
            client,
            schema: receipt_schema(),
            config,
        }
    }

    /// One extraction call with bounded retries. Transient failures
    /// (transport, 429, 5xx) re-enter the loop with backoff; everything else
    /// is surfaced on the first occurrence.
    pub async fn extract(&self, image: &ImagePayload) -> Result<ExtractedReceipt, ExtractError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.attempt_extract(image).await {
                Ok(receipt) => {
                    tracing::debug!(attempt, code = %receipt.category_code, "receipt extracted");
                    return Ok(receipt);
                }
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.config.retry.max_attempts {
                        return Err(err);
                    }
                    let delay = match &err {
                        ExtractError::RateLimited { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs)
                        }
                        _ => self.config.retry.delay_for_attempt(attempt),
                    };
                    let delay_ms = delay.as_millis() as u64;
                    tracing::warn!(attempt, error = %err, delay_ms, "extraction attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Probe the configured credential against the models endpoint.
    pub async fn verify_credentials(&self) -> Result<bool, ExtractError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(response.status().is_success())
    }

    async fn attempt_extract(&self, image: &ImagePayload) -> Result<ExtractedReceipt, ExtractError> {
        let request = build_request(&self.config, image);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ExtractError::RateLimited {
                retry_after_secs: parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::MalformedResponse(format!("invalid response body: {e}")))?;

        let raw = first_text(&body)?;
        parse_receipt(&raw, &self.schema)
    }
}

fn build_request(config: &ExtractorConfig, image: &ImagePayload) -> MessagesRequest {
    let source = MediaSource {
        source_type: "base64".to_string(),
        media_type: image.media_type.clone(),
        data: image.data.clone(),
    };
    // PDFs go through the document block; everything else is an image.
    let attachment = if image.media_type == "application/pdf" {
        ContentBlock::Document { source }
    } else {
        ContentBlock::Image { source }
    };

    MessagesRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system: system_prompt(),
        messages: vec![Message {
            role: "user".to_string(),
            content: vec![
                attachment,
                ContentBlock::Text {
                    text: USER_PROMPT.to_string(),
                },
            ],
        }],
    }
}

fn classify_transport(err: reqwest::Error) -> ExtractError {
    if err.is_timeout() {
        ExtractError::Transport(format!("request timed out: {err}"))
    } else if err.is_connect() {
        ExtractError::Transport(format!("connection failed: {err}"))
    } else {
        ExtractError::Transport(err.to_string())
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60)
}

fn first_text(response: &MessagesResponse) -> Result<String, ExtractError> {
    response
        .content
        .iter()
        .find(|block| block.block_type == "text" && !block.text.trim().is_empty())
        .map(|block| block.text.trim().to_string())
        .ok_or_else(|| ExtractError::MalformedResponse("no text content in response".to_string()))
}

fn parse_receipt(raw: &str, schema: &JSONSchema) -> Result<ExtractedReceipt, ExtractError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ExtractError::MalformedResponse(format!("response is not JSON: {e}")))?;

    if let Err(errors) = schema.validate(&value) {
        let details = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        return Err(ExtractError::InvalidData(details));
    }

    let payload: RawReceiptPayload =
        serde_json::from_value(value).map_err(|e| ExtractError::InvalidData(e.to_string()))?;

    let date = parse_receipt_date(&payload.date).ok_or_else(|| {
        ExtractError::InvalidData(format!("unrecognized date format: {}", payload.date))
    })?;
    if !payload.total.is_finite() || payload.total < 0.0 {
        return Err(ExtractError::InvalidData(format!(
            "total out of range: {}",
            payload.total
        )));
    }
    let category_code = payload.category_code.trim().to_string();
    if category_code.is_empty() {
        return Err(ExtractError::InvalidData("categoryCode is empty".to_string()));
    }

    Ok(ExtractedReceipt {
        date,
        total: payload.total,
        category_code,
    })
}

fn receipt_schema() -> JSONSchema {
    let schema = json!({
        "type": "object",
        "required": ["date", "total", "categoryCode"],
        "properties": {
            "date": {"type": "string"},
            "total": {"type": "number"},
            "categoryCode": {"type": "string"}
        }
    });

    JSONSchema::compile(&schema).expect("Invalid JSON schema")
}

fn system_prompt() -> String {
    r#"You are an expert French accountant. Extract the date, the total, and assign a PCG category code.
Return JSON only and match the schema exactly.
Fields:
- date (YYYY-MM-DD)
- total (number)
- categoryCode (string, PCG account code)
"#
    .to_string()
}
