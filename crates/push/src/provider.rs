use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// `contentType` marker for plain-text messages.
pub const CONTENT_TYPE_TEXT: u8 = 1;

/// One outbound push, serialized as the endpoint's JSON request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub app_token: String,
    /// Short line shown in the recipient's message list.
    pub summary: String,
    /// Full message body.
    pub content: String,
    pub content_type: u8,
    /// Always a single recipient.
    pub uids: Vec<String>,
}

impl PushMessage {
    pub fn text(
        app_token: impl Into<String>,
        uid: impl Into<String>,
        summary: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            app_token: app_token.into(),
            summary: summary.into(),
            content: content.into(),
            content_type: CONTENT_TYPE_TEXT,
            uids: vec![uid.into()],
        }
    }
}

/// Error type for push operations.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Transport-level failure: connection refused, timeout, TLS.
    #[error("push request failed: {0}")]
    RequestFailed(String),
    /// The endpoint answered with something that is not the expected JSON.
    #[error("push response is not valid JSON ({reason}); raw response: {body}")]
    MalformedResponse { body: String, reason: String },
    /// The endpoint answered but `success` was not `true`.
    #[error("push rejected by endpoint; raw response: {body}")]
    PushRejected { body: String, msg: Option<String> },
}

impl PushError {
    /// True for failures that usually point at a bad app token or uid.
    pub fn is_credential_suspect(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. } | Self::PushRejected { .. })
    }
}

#[derive(Deserialize)]
struct PushReply {
    success: Option<bool>,
    msg: Option<String>,
}

/// Interpret a push endpoint response body.
///
/// Anything that does not deserialize as a JSON object is `MalformedResponse`;
/// an object whose `success` field is missing or not `true` is `PushRejected`.
pub fn interpret_response(body: &str) -> Result<(), PushError> {
    let reply: PushReply = serde_json::from_str(body).map_err(|e| PushError::MalformedResponse {
        body: body.to_owned(),
        reason: e.to_string(),
    })?;

    if reply.success == Some(true) {
        Ok(())
    } else {
        Err(PushError::PushRejected {
            body: body.to_owned(),
            msg: reply.msg,
        })
    }
}

/// Trait for push-notification transports.
pub trait PushTransport: Send + Sync {
    fn name(&self) -> &str;

    fn send(
        &self,
        message: PushMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), PushError>> + Send + '_>>;
}

/// Mock transport for testing: records every message and answers with a fixed body.
#[derive(Debug, Clone)]
pub struct MockTransport {
    body: String,
    sent: Arc<Mutex<Vec<PushMessage>>>,
}

impl MockTransport {
    /// Mock that answers every push with `body`, run through [`interpret_response`].
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mock whose endpoint always accepts.
    pub fn accepting() -> Self {
        Self::new(r#"{"code":1000,"msg":"处理成功","success":true}"#)
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl PushTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn send(
        &self,
        message: PushMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), PushError>> + Send + '_>> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
        let body = self.body.clone();
        Box::pin(async move { interpret_response(&body) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_endpoint_field_names() {
        let msg = PushMessage::text("AT_x", "UID_y", "short", "long body");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["appToken"], "AT_x");
        assert_eq!(json["summary"], "short");
        assert_eq!(json["content"], "long body");
        assert_eq!(json["contentType"], 1);
        assert_eq!(json["uids"], serde_json::json!(["UID_y"]));
    }

    #[test]
    fn success_true_is_accepted() {
        assert!(interpret_response(r#"{"success":true,"code":1000}"#).is_ok());
    }

    #[test]
    fn success_false_is_rejected() {
        let err = interpret_response(r#"{"success":false,"msg":"appToken错误"}"#).unwrap_err();
        match err {
            PushError::PushRejected { msg, body } => {
                assert_eq!(msg.as_deref(), Some("appToken错误"));
                assert!(body.contains("appToken"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_success_is_rejected() {
        let err = interpret_response(r#"{"code":1000}"#).unwrap_err();
        assert!(matches!(err, PushError::PushRejected { .. }));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = interpret_response("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, PushError::MalformedResponse { .. }));
        assert!(err.is_credential_suspect());
        assert!(err.to_string().contains("502 Bad Gateway"));
    }

    #[test]
    fn json_array_is_malformed() {
        let err = interpret_response("[1, 2]").unwrap_err();
        assert!(matches!(err, PushError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn mock_transport_records_messages() {
        let mock = MockTransport::accepting();
        mock.send(PushMessage::text("t", "u", "s", "c")).await.unwrap();
        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].uids, vec!["u".to_string()]);
    }

    #[tokio::test]
    async fn mock_transport_surfaces_rejection() {
        let mock = MockTransport::new(r#"{"success":false}"#);
        let err = mock.send(PushMessage::text("t", "u", "s", "c")).await.unwrap_err();
        assert!(matches!(err, PushError::PushRejected { .. }));
        assert_eq!(mock.sent().len(), 1);
    }
}
