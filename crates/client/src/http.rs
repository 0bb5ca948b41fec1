use std::time::Duration;

use async_trait::async_trait;
use difychat_core::api::ErrorBody;
use difychat_core::{
    ChatRequest, ChatResponse, ConversationId, HistoryQuery, InstallLinkResponse, TurnRecord,
};
use serde::de::DeserializeOwned;

use crate::{ChatApi, ClientError};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// `ChatApi` over the backend's JSON endpoints.
#[derive(Clone, Debug)]
pub struct HttpChatApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let detail = serde_json::from_slice::<ErrorBody>(&body)
            .map(|error| error.detail)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        return Err(ClientError::Status { status: status.as_u16(), detail });
    }

    serde_json::from_slice(&body).map_err(|error| ClientError::Decode(error.to_string()))
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&ConversationId>,
    ) -> Result<ChatResponse, ClientError> {
        let request = ChatRequest {
            message: message.to_string(),
            conversation_id: conversation_id.map(|id| id.as_str().to_string()),
        };
        let response = self.http.post(self.url("/api/chat")).json(&request).send().await?;
        decode(response).await
    }

    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<TurnRecord>, ClientError> {
        let response = self.http.get(self.url("/api/chat/history")).query(query).send().await?;
        decode(response).await
    }

    async fn fetch_install_link(&self) -> Result<InstallLinkResponse, ClientError> {
        let response = self.http.get(self.url("/api/slack/install")).send().await?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use difychat_core::{ConversationId, HistoryQuery};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::HttpChatApi;
    use crate::{ChatApi, ClientError};

    #[tokio::test]
    async fn send_message_posts_message_and_conversation_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({"message": "hello", "conversation_id": "c-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversation_id": "c-1",
                "message": "hi",
                "timestamp": "2024-03-01T12:00:00.000000Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpChatApi::new(format!("{}/", server.uri())).expect("client");
        let reply = api
            .send_message("hello", Some(&ConversationId("c-1".to_string())))
            .await
            .expect("reply");

        assert_eq!(reply.message, "hi");
        assert_eq!(reply.conversation_id, "c-1");
    }

    #[tokio::test]
    async fn history_forwards_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chat/history"))
            .and(query_param("limit", "10"))
            .and(query_param("conversation_id", "c-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "t-2",
                    "user_message": "C",
                    "assistant_message": "D",
                    "timestamp": "2024-03-01T12:00:02Z",
                    "conversation_id": "c-9"
                },
                {
                    "id": "t-1",
                    "user_message": "A",
                    "assistant_message": "B",
                    "timestamp": "2024-03-01T12:00:01Z",
                    "conversation_id": "c-9"
                }
            ])))
            .mount(&server)
            .await;

        let api = HttpChatApi::new(server.uri()).expect("client");
        let query = HistoryQuery {
            limit: Some(10),
            before: None,
            conversation_id: Some("c-9".to_string()),
        };
        let turns = api.fetch_history(&query).await.expect("history");

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].id, "t-2");
        assert_eq!(
            turns[1].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).single().expect("time")
        );
    }

    #[tokio::test]
    async fn error_status_surfaces_server_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({
                "detail": "The assistant service did not respond successfully.",
                "correlation_id": "req-1"
            })))
            .mount(&server)
            .await;

        let api = HttpChatApi::new(server.uri()).expect("client");
        let error = api.send_message("hello", None).await.expect_err("should fail");

        assert!(matches!(
            error,
            ClientError::Status { status: 502, ref detail }
                if detail == "The assistant service did not respond successfully."
        ));
    }

    #[tokio::test]
    async fn reply_missing_fields_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "hi"})))
            .mount(&server)
            .await;

        let api = HttpChatApi::new(server.uri()).expect("client");
        let error = api.send_message("hello", None).await.expect_err("should fail");

        assert!(matches!(error, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn install_link_is_returned_verbatim() {
        let link = "https://slack.com/oauth/v2/authorize?client_id=1.2&scope=chat%3Awrite&state=abc";
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/slack/install"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"install_url": link})))
            .mount(&server)
            .await;

        let api = HttpChatApi::new(server.uri()).expect("client");
        let response = api.fetch_install_link().await.expect("install link");

        assert_eq!(response.install_url, link);
    }
}
