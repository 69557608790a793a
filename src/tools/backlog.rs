use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::mcp::{ToolContext, ToolError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How requests to Backlog are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum BacklogAuth {
    Bearer(String),
    ApiKey(String),
}

impl std::fmt::Debug for BacklogAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BacklogAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            BacklogAuth::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

/// Backlog REST API v2 client bound to one credential.
#[derive(Debug, Clone)]
pub struct BacklogClient {
    client: reqwest::Client,
    base_url: String,
    auth: BacklogAuth,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    message: String,
}

impl BacklogClient {
    pub fn with_base_url(client: reqwest::Client, base_url: &str, auth: BacklogAuth) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, params))]
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let url = format!("{}{}", self.base_url, path);
        let mut query = Vec::new();
        if let BacklogAuth::ApiKey(key) = &self.auth {
            query.push(("apiKey".to_string(), key.clone()));
        }

        let builder = match method {
            HttpMethod::Get => {
                query.extend(encode_params(params));
                self.client.get(&url)
            }
            HttpMethod::Post => self.client.post(&url).form(&encode_params(params)),
            HttpMethod::Patch => self.client.patch(&url).form(&encode_params(params)),
        };
        let builder = match &self.auth {
            BacklogAuth::Bearer(token) => builder.bearer_auth(token),
            BacklogAuth::ApiKey(_) => builder,
        };

        let response = builder.query(&query).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Backlog replied");

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.errors.into_iter().next())
                .map(|e| e.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "Backlog API error");
            return Err(ToolError::Backlog {
                status: status.as_u16(),
                message,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ToolError::InvalidResponse {
            message: format!("Backlog returned non-JSON body: {e}"),
        })
    }
}

/// Flatten arguments into Backlog's parameter style: arrays become `key[]`.
pub fn encode_params(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                let name = format!("{key}[]");
                pairs.extend(items.iter().map(|item| (name.clone(), scalar(item))));
            }
            other => pairs.push((key.clone(), scalar(other))),
        }
    }
    pairs
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds the client for each call: the caller's token wins over the
/// gateway's own credentials.
#[derive(Debug, Clone)]
pub struct BacklogConnector {
    client: reqwest::Client,
    base_url: Option<String>,
    default_auth: Option<BacklogAuth>,
}

impl BacklogConnector {
    pub fn new(
        domain: Option<&str>,
        access_token: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = domain
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| format!("https://{d}/api/v2"));
        let default_auth = non_empty(access_token)
            .map(BacklogAuth::Bearer)
            .or_else(|| non_empty(api_key).map(BacklogAuth::ApiKey));
        Ok(Self {
            client,
            base_url,
            default_auth,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn has_default_credentials(&self) -> bool {
        self.base_url.is_some() && self.default_auth.is_some()
    }

    pub fn client_for(&self, ctx: &ToolContext) -> Result<BacklogClient, ToolError> {
        let auth = ctx
            .access_token
            .clone()
            .map(BacklogAuth::Bearer)
            .or_else(|| self.default_auth.clone())
            .ok_or(ToolError::NoCredentials)?;
        let base_url = self.base_url.as_deref().ok_or(ToolError::NoCredentials)?;
        Ok(BacklogClient::with_base_url(
            self.client.clone(),
            base_url,
            auth,
        ))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
