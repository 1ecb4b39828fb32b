//! HTTP push transport for the WxPusher message API.

use crate::provider::{interpret_response, PushError, PushMessage, PushTransport};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default WxPusher send endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://wxpusher.zjiecode.com/api/send/message";

/// Posts [`PushMessage`]s as JSON to a WxPusher-compatible endpoint.
pub struct WxPusherTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl WxPusherTransport {
    /// Build with an endpoint override (`None` uses [`DEFAULT_ENDPOINT`]) and request timeout.
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    error = %e,
                    "failed to build push client with timeout, using defaults"
                );
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, message: PushMessage) -> Result<(), PushError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&message)
            .send()
            .await
            .map_err(|e| PushError::RequestFailed(e.to_string()))?;

        // The body decides success; a non-2xx status usually carries an
        // HTML error page that surfaces as MalformedResponse below.
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PushError::RequestFailed(format!("{status}: {e}")))?;
        tracing::debug!(%status, bytes = body.len(), "push endpoint replied");

        interpret_response(&body)
    }
}

impl PushTransport for WxPusherTransport {
    fn name(&self) -> &str {
        "wxpusher"
    }

    fn send(
        &self,
        message: PushMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), PushError>> + Send + '_>> {
        Box::pin(self.post(message))
    }
}
