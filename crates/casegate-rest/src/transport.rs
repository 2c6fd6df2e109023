//! HTTP seam between the session layer and the repository.
//!
//! Everything above this module builds [`RestRequest`]s relative to the
//! repository root and gets JSON back; [`HttpTransport`] is the reqwest
//! implementation, tests substitute their own.

use crate::config::{ConfigError, RestConfig};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const METHOD_OVERRIDE: &str = "X-Method-Override";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    /// Sent as `POST` with `X-Method-Override: PATCH`.
    Patch,
}

/// One call against `<url>/repositories/<repository><path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub method: Method,
    /// Suffix of the repository URL; empty for the DQL endpoint.
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Complete `Authorization` header value.
    pub authorization: String,
    /// JSON request body, sent with the repository media type.
    pub body: Option<Value>,
}

impl RestRequest {
    pub fn get(path: &str, authorization: &str) -> Self {
        Self {
            method: Method::Get,
            path: path.to_string(),
            query: Vec::new(),
            authorization: authorization.to_string(),
            body: None,
        }
    }

    pub fn post(path: &str, authorization: &str) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(path, authorization)
        }
    }

    pub fn patch(path: &str, authorization: &str, body: Value) -> Self {
        Self {
            method: Method::Patch,
            body: Some(body),
            ..Self::get(path, authorization)
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Executes repository requests, returning the decoded JSON body.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &RestRequest) -> Result<Value, TransportError>;
}

// ============================================================================
// reqwest transport
// ============================================================================

pub struct HttpTransport {
    client: Client,
    base: String,
    media_type: String,
}

impl HttpTransport {
    pub fn new(config: &RestConfig) -> Result<Self, ConfigError> {
        let base = config.repository_url();
        Url::parse(&base).map_err(|e| ConfigError::Invalid(format!("url `{base}`: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base,
            media_type: config.media_type.clone(),
        })
    }

    fn url_for(&self, request: &RestRequest) -> Result<Url, TransportError> {
        let mut url = Url::parse(&format!("{}{}", self.base, request.path))
            .map_err(|e| TransportError::Network(format!("bad request url: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &RestRequest) -> Result<Value, TransportError> {
        let url = self.url_for(request)?;
        tracing::debug!(method = ?request.method, path = %url.path(), "repository request");

        let builder = match request.method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
            Method::Patch => self
                .client
                .post(url.clone())
                .header(METHOD_OVERRIDE, "PATCH"),
        };
        let builder = match &request.body {
            Some(body) => builder
                .header(CONTENT_TYPE, &self.media_type)
                .body(body.to_string()),
            None => builder,
        };

        let response = builder
            .header(AUTHORIZATION, &request.authorization)
            .header(ACCEPT, &self.media_type)
            .send()
            .map_err(|e| TransportError::Network(format!("{} ({e})", url.path())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
