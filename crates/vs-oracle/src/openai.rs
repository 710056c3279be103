//! OpenAI-compatible provider.
//!
//! Works with any endpoint speaking the `chat/completions` protocol with
//! multimodal content parts (OpenAI, Azure OpenAI, vLLM, Ollama).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vs_types::Blob;

use crate::error::OracleError;
use crate::prompt;
use crate::traits::{Analyzer, IdentityVerifier};

/// Shared HTTP client for one model on one endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClient {
    /// Create a client. `base_url` includes the API version prefix,
    /// e.g. `https://api.openai.com/v1`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, OracleError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| OracleError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Client for the public OpenAI API.
    pub fn openai(model: &str, api_key: impl Into<String>) -> Result<Self, OracleError> {
        Self::new("https://api.openai.com/v1", model, Some(api_key.into()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send `instructions` plus `blob` as one user message and return the
    /// text of the first choice.
    pub async fn complete(&self, instructions: &str, blob: &Blob) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: instructions.to_string(),
                    },
                    attachment(blob),
                ],
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        debug!(
            model = %self.model,
            hash = %blob.hash().short_hex(),
            size = blob.len(),
            "sending document to provider"
        );

        let mut http_request = self.client.post(self.chat_completions_url());
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Schema(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Encode a blob as a content part: images inline as `image_url`,
/// everything else (PDF contracts) as a `file` part.
fn attachment(blob: &Blob) -> ContentPart {
    let data_url = format!(
        "data:{};base64,{}",
        blob.content_type(),
        BASE64.encode(&blob.bytes)
    );
    if blob.content_type().starts_with("image/") {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: data_url },
        }
    } else {
        ContentPart::File {
            file: FileData {
                filename: blob.meta.filename.clone(),
                file_data: data_url,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { file: FileData },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct FileData {
    filename: String,
    file_data: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Contract analyzer backed by an OpenAI-compatible model.
#[derive(Debug, Clone)]
pub struct OpenAiAnalyzer {
    client: OpenAiClient,
}

impl OpenAiAnalyzer {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(&self, blob: &Blob) -> Result<String, OracleError> {
        self.client.complete(prompt::CONTRACT_ANALYSIS, blob).await
    }
}

/// KYC verifier backed by an OpenAI-compatible vision model.
#[derive(Debug, Clone)]
pub struct OpenAiIdentityVerifier {
    client: OpenAiClient,
}

impl OpenAiIdentityVerifier {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityVerifier for OpenAiIdentityVerifier {
    async fn verify_identity(&self, evidence: &Blob) -> Result<String, OracleError> {
        self.client.complete(prompt::IDENTITY_VERIFICATION, evidence).await
    }
}
