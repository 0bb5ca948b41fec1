use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use difychat_core::config::UpstreamConfig;
use difychat_core::domain::conversation::ConversationId;

use crate::{UpstreamClient, UpstreamError, UpstreamReply, UpstreamRequest};

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Blocking-mode client for the Dify chat-messages API.
#[derive(Clone)]
pub struct DifyClient {
    http: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    user: String,
}

#[derive(Debug, Serialize)]
struct ChatMessagesRequest<'a> {
    inputs: Map<String, Value>,
    query: &'a str,
    user: &'a str,
    response_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatMessagesResponse {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

impl DifyClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            endpoint: chat_messages_endpoint(&config.base_url),
            user: config.user.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn chat_messages_endpoint(base_url: &str) -> String {
    format!("{}/chat-messages", base_url.trim().trim_end_matches('/'))
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push('…');
    truncated
}

#[async_trait::async_trait]
impl UpstreamClient for DifyClient {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamReply, UpstreamError> {
        let payload = ChatMessagesRequest {
            inputs: Map::new(),
            query: &request.message,
            user: &self.user,
            response_mode: "blocking",
            conversation_id: request.conversation_id.as_ref().map(ConversationId::as_str),
        };

        debug!(
            event_name = "upstream.dify.request",
            endpoint = %self.endpoint,
            conversation_id =
                request.conversation_id.as_ref().map_or("new", ConversationId::as_str),
            "sending chat message upstream"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "upstream.dify.status",
                status = status.as_u16(),
                "upstream returned a non-success status"
            );
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body: ChatMessagesResponse =
            response.json().await.map_err(|error| UpstreamError::Decode(error.to_string()))?;

        if body.answer.trim().is_empty() {
            return Err(UpstreamError::EmptyAnswer);
        }

        Ok(UpstreamReply {
            answer: body.answer,
            conversation_id: ConversationId::from_optional(body.conversation_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use difychat_core::config::UpstreamConfig;
    use difychat_core::domain::conversation::ConversationId;

    use super::{chat_messages_endpoint, truncate_body, DifyClient};
    use crate::{UpstreamClient, UpstreamError, UpstreamRequest};

    fn config_for(server: &MockServer) -> UpstreamConfig {
        UpstreamConfig {
            api_key: SecretString::from("app-test-key".to_string()),
            base_url: format!("{}/v1", server.uri()),
            user: "default_user".to_string(),
            timeout_secs: 5,
        }
    }

    fn request(message: &str, conversation_id: Option<&str>) -> UpstreamRequest {
        UpstreamRequest {
            message: message.to_string(),
            conversation_id: conversation_id.map(|id| ConversationId(id.to_string())),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            chat_messages_endpoint("https://api.dify.ai/v1/"),
            "https://api.dify.ai/v1/chat-messages"
        );
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(2_000);
        let truncated = truncate_body(&body);

        assert!(truncated.chars().count() <= 513);
        assert!(truncated.ends_with('…'));
    }

    #[tokio::test]
    async fn new_conversation_omits_conversation_id_and_returns_issued_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat-messages"))
            .and(header("authorization", "Bearer app-test-key"))
            .and(body_json(json!({
                "inputs": {},
                "query": "hello",
                "user": "default_user",
                "response_mode": "blocking"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "hi there",
                "conversation_id": "conv-issued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DifyClient::new(&config_for(&server)).expect("client");
        let reply = client.send(request("hello", None)).await.expect("reply");

        assert_eq!(reply.answer, "hi there");
        assert_eq!(reply.conversation_id, Some(ConversationId("conv-issued".to_string())));
    }

    #[tokio::test]
    async fn existing_conversation_id_is_passed_through_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat-messages"))
            .and(body_json(json!({
                "inputs": {},
                "query": "again",
                "user": "default_user",
                "response_mode": "blocking",
                "conversation_id": "conv-42"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "welcome back",
                "conversation_id": "conv-42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DifyClient::new(&config_for(&server)).expect("client");
        let reply = client.send(request("again", Some("conv-42"))).await.expect("reply");

        assert_eq!(reply.conversation_id, Some(ConversationId("conv-42".to_string())));
    }

    #[tokio::test]
    async fn empty_conversation_id_in_reply_maps_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat-messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"answer": "ok", "conversation_id": ""})),
            )
            .mount(&server)
            .await;

        let client = DifyClient::new(&config_for(&server)).expect("client");
        let reply = client.send(request("hello", None)).await.expect("reply");

        assert_eq!(reply.conversation_id, None);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat-messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = DifyClient::new(&config_for(&server)).expect("client");
        let error = client.send(request("hello", None)).await.expect_err("should fail");

        assert!(matches!(
            error,
            UpstreamError::Status { status: 401, ref body } if body == "invalid api key"
        ));
    }

    #[tokio::test]
    async fn blank_answer_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat-messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"answer": "   ", "conversation_id": "c"})),
            )
            .mount(&server)
            .await;

        let client = DifyClient::new(&config_for(&server)).expect("client");
        let error = client.send(request("hello", None)).await.expect_err("should fail");

        assert!(matches!(error, UpstreamError::EmptyAnswer));
    }

    #[tokio::test]
    async fn non_json_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat-messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = DifyClient::new(&config_for(&server)).expect("client");
        let error = client.send(request("hello", None)).await.expect_err("should fail");

        assert!(matches!(error, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat-messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"answer": "late", "conversation_id": "c"}))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.timeout_secs = 1;
        let client = DifyClient::new(&config).expect("client");
        let error = client.send(request("hello", None)).await.expect_err("should time out");

        assert!(error.is_timeout());
    }
}
