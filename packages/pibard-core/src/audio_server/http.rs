//! JSON-RPC over HTTP POST (`http://{host}:{port}/jsonrpc`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::rpc::{RequestIds, RpcMessage, RpcRequest};
use super::{AdapterError, AdapterResult, RpcTransport};

/// Stateless HTTP transport: one POST per call, no retry.
pub struct HttpRpcTransport {
    client: Client,
    endpoint: String,
    ids: RequestIds,
}

impl HttpRpcTransport {
    /// Creates a transport for `endpoint`.
    ///
    /// `timeout` of `None` leaves outbound requests unbounded.
    pub fn new(endpoint: String, timeout: Option<Duration>) -> AdapterResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint,
            ids: RequestIds::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn call(&self, method: &str, params: Value) -> AdapterResult<Value> {
        let id = self.ids.next();
        let request = RpcRequest::new(id, method, &params);

        log::debug!("[RPC] {} -> {} (id {})", method, self.endpoint, id);

        let start = std::time::Instant::now();
        let res = self.client.post(&self.endpoint).json(&request).send().await;
        log::debug!(
            "[RPC] {} completed in {:?}: {:?}",
            method,
            start.elapsed(),
            res.as_ref().map(|r| r.status())
        );

        let res = res?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AdapterError::HttpStatus(status.as_u16(), body));
        }

        let text = res.text().await?;
        let message: RpcMessage =
            serde_json::from_str(&text).map_err(|e| AdapterError::Parse(e.to_string()))?;
        message.into_result()
    }
}
