use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::TextProvider;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::sigv4::{Credentials, Signer, uri_encode};

pub const DEFAULT_BEDROCK_MODEL: &str = "anthropic.claude-3-haiku-20240307-v1:0";
pub const DEFAULT_BEDROCK_REGION: &str = "ap-northeast-1";
const SERVICE: &str = "bedrock";
const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const MAX_TOKENS: u32 = 1500;
const TEMPERATURE: f32 = 0.7;
const TIMEOUT: Duration = Duration::from_secs(60);

/// Models that only speak the legacy text-completion body.
const LEGACY_MODEL_PREFIXES: &[&str] = &[
    "anthropic.claude-v1",
    "anthropic.claude-v2",
    "anthropic.claude-instant",
];

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    completion: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "Message")]
    message: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: String,
    max_tokens_to_sample: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    stop_sequences: [&'a str; 1],
}

/// Bedrock runtime `InvokeModel` client, signed with SigV4.
pub struct BedrockProvider {
    client: reqwest::Client,
    signer: Signer,
    model_id: String,
    endpoint: String,
}

impl BedrockProvider {
    pub fn new(credentials: Credentials, region: &str, model_id: &str) -> ProviderResult<Self> {
        let client = reqwest::Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            client,
            signer: Signer::new(credentials, region, SERVICE),
            model_id: model_id.to_string(),
            endpoint: format!("https://bedrock-runtime.{region}.amazonaws.com"),
        })
    }

    /// Override the runtime endpoint (VPC endpoints, local fakes).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn uses_messages_api(&self) -> bool {
        !LEGACY_MODEL_PREFIXES
            .iter()
            .any(|prefix| self.model_id.starts_with(prefix))
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        if self.uses_messages_api() {
            json!({
                "anthropic_version": ANTHROPIC_VERSION,
                "max_tokens": MAX_TOKENS,
                "temperature": TEMPERATURE,
                "messages": [{ "role": "user", "content": prompt }],
            })
        } else {
            json!(CompletionRequest {
                prompt: format!("\n\nHuman: {prompt}\n\nAssistant:"),
                max_tokens_to_sample: MAX_TOKENS,
                temperature: TEMPERATURE,
                top_p: 0.9,
                top_k: 250,
                stop_sequences: ["\n\nHuman:"],
            })
        }
    }

    fn parse_body(&self, bytes: &[u8]) -> ProviderResult<String> {
        if self.uses_messages_api() {
            let parsed: MessagesResponse = serde_json::from_slice(bytes)
                .map_err(|e| ProviderError::invalid(self.name(), e.to_string()))?;
            parsed
                .content
                .into_iter()
                .next()
                .map(|block| block.text)
                .ok_or_else(|| ProviderError::invalid(self.name(), "no content in response"))
        } else {
            let parsed: CompletionResponse = serde_json::from_slice(bytes)
                .map_err(|e| ProviderError::invalid(self.name(), e.to_string()))?;
            Ok(parsed.completion)
        }
    }
}

#[async_trait]
impl TextProvider for BedrockProvider {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    #[instrument(skip_all, fields(model = %self.model_id, region = %self.signer.region()))]
    async fn generate(&self, prompt: &str) -> ProviderResult<String> {
        let url = format!(
            "{}/model/{}/invoke",
            self.endpoint,
            uri_encode(&self.model_id)
        );
        let url = Url::parse(&url).map_err(|e| ProviderError::invalid(self.name(), e.to_string()))?;
        let payload = serde_json::to_vec(&self.request_body(prompt))
            .map_err(|e| ProviderError::invalid(self.name(), e.to_string()))?;

        let content_headers = [
            ("content-type", "application/json"),
            ("accept", "application/json"),
        ];
        let signed = self
            .signer
            .sign("POST", &url, &content_headers, &payload, Utc::now())?;

        let mut request = self.client.post(url);
        for (name, value) in content_headers {
            request = request.header(name, value);
        }
        for (name, value) in signed.pairs() {
            request = request.header(name, value);
        }

        let response = request.body(payload).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|e| e.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(ProviderError::api(self.name(), status.as_u16(), message));
        }

        self.parse_body(&bytes)
    }
}
