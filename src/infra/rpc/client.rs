//! Minimal JSON-RPC 2.0 client over HTTP.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::domain::{AppError, RpcError};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// Stateless JSON-RPC client; the target URL is chosen per call
#[derive(Debug, Clone)]
pub struct JsonRpcHttpClient {
    http_client: Client,
    next_id: std::sync::Arc<AtomicU64>,
}

impl JsonRpcHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Rpc(RpcError::Connection(e.to_string())))?;

        Ok(Self {
            http_client,
            next_id: std::sync::Arc::new(AtomicU64::new(1)),
        })
    }

    /// Send one request and return its `result`
    pub async fn call(&self, url: &str, method: &str, params: Value) -> Result<Value, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!(url = %url, method = %method, id = id, "JSON-RPC request");

        let response = self
            .http_client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Rpc(RpcError::Timeout(e.to_string()))
                } else {
                    AppError::Rpc(RpcError::Connection(e.to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Rpc(RpcError::HttpStatus(status.as_u16())));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| AppError::Rpc(RpcError::InvalidResponse(e.to_string())))?;

        if let Some(error) = rpc_response.error {
            return Err(AppError::Rpc(RpcError::JsonRpc {
                code: error.code,
                message: error.message,
            }));
        }

        rpc_response
            .result
            .ok_or_else(|| AppError::Rpc(RpcError::InvalidResponse("Empty response".to_string())))
    }
}

/// Parse a `0x`-prefixed quantity
pub fn parse_quantity(value: &Value) -> Result<u64, AppError> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("0x"))
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .ok_or_else(|| {
            AppError::Rpc(RpcError::InvalidResponse(format!(
                "expected hex quantity, got {value}"
            )))
        })
}
