//! JSON-RPC 2.0 client over HTTP POST for MCP servers.

use crate::mcp::types::{
    InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult, ReadResourceResult,
    RpcRequest, RpcResponse, METHOD_NOT_FOUND,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Invalid MCP server URL: {0}")]
    InvalidUrl(String),

    #[error("MCP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("MCP server returned a non-JSON-RPC response: {0}")]
    InvalidResponse(String),

    #[error("MCP server error {code}: {message}")]
    Rpc { code: i64, message: String },
}

pub struct McpClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(
        url: &str,
        bearer_token: Option<&str>,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| McpError::InvalidUrl(format!("{}: {}", url, e)))?;
        if parsed.host_str().is_none() {
            return Err(McpError::InvalidUrl(url.to_string()));
        }

        let mut default_headers = reqwest::header::HeaderMap::new();
        if let Some(token) = bearer_token {
            let value = format!("Bearer {}", token);
            if let Ok(value) = reqwest::header::HeaderValue::from_str(&value) {
                default_headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        for (name, value) in headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes());
            let value = reqwest::header::HeaderValue::from_str(value);
            if let (Ok(name), Ok(value)) = (name, value) {
                default_headers.insert(name, value);
            }
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skillscan/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Hostname the virtual paths are rooted at.
    pub fn host(&self) -> String {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        debug!(url = %self.url, method, "MCP request");

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: RpcResponse = serde_json::from_str(&body).map_err(|_| {
            McpError::InvalidResponse(format!("HTTP {}: {}", status, truncate(&body, 200)))
        })?;

        if let Some(error) = parsed.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    /// A list call; "method not found" degrades to the default (empty)
    /// result so servers without that category still scan.
    async fn rpc_list<T: Default + serde::de::DeserializeOwned>(
        &self,
        method: &str,
    ) -> Result<T, McpError> {
        match self.rpc(method, Value::Null).await {
            Ok(Value::Null) => Ok(T::default()),
            Ok(result) => serde_json::from_value(result)
                .map_err(|e| McpError::InvalidResponse(e.to_string())),
            Err(McpError::Rpc { code, .. }) if code == METHOD_NOT_FOUND => {
                debug!(method, "Method not found; treating as empty");
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "skillscan",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = self.rpc("initialize", params).await?;
        serde_json::from_value(result).map_err(|e| McpError::InvalidResponse(e.to_string()))
    }

    pub async fn list_tools(&self) -> Result<ListToolsResult, McpError> {
        self.rpc_list("tools/list").await
    }

    pub async fn list_prompts(&self) -> Result<ListPromptsResult, McpError> {
        self.rpc_list("prompts/list").await
    }

    pub async fn list_resources(&self) -> Result<ListResourcesResult, McpError> {
        self.rpc_list("resources/list").await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let result = self.rpc("resources/read", json!({ "uri": uri })).await?;
        serde_json::from_value(result).map_err(|e| McpError::InvalidResponse(e.to_string()))
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
