//! Slack routes.
//!
//! - `GET  /api/slack/install` : "Add to Slack" authorize URL
//! - `POST /api/slack/events` : signed Events API receiver

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use difychat_core::api::ErrorBody;
use difychat_core::config::SlackConfig;
use difychat_core::{ApplicationError, InstallLinkResponse};
use difychat_slack::{
    EventEnvelope, InstallLinkBuilder, SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use tracing::{info, warn};

use crate::error::{correlation_id, ApiError};

#[derive(Clone)]
pub struct SlackState {
    install: Option<InstallLinkBuilder>,
    verifier: Option<Arc<SignatureVerifier>>,
}

impl SlackState {
    pub fn from_config(config: &SlackConfig) -> Self {
        Self {
            install: InstallLinkBuilder::from_config(config).ok(),
            verifier: config
                .signing_secret
                .clone()
                .map(|secret| Arc::new(SignatureVerifier::new(secret))),
        }
    }
}

pub fn router(state: SlackState) -> Router {
    Router::new()
        .route("/api/slack/install", get(install_link))
        .route("/api/slack/events", post(events))
        .with_state(state)
}

pub async fn install_link(
    State(state): State<SlackState>,
) -> Result<Json<InstallLinkResponse>, ApiError> {
    let correlation_id = correlation_id();
    let Some(builder) = state.install.as_ref() else {
        warn!(
            event_name = "slack.install.unconfigured",
            correlation_id = %correlation_id,
            "install link requested but slack.client_id is not set"
        );
        return Err(ApiError::service_unavailable(
            "slack.client_id is not configured",
            &correlation_id,
        ));
    };

    let install_url = builder.build().map_err(|build_error| {
        ApiError::from_application(
            ApplicationError::Configuration(build_error.to_string()),
            &correlation_id,
        )
    })?;

    info!(
        event_name = "slack.install.issued",
        correlation_id = %correlation_id,
        "install link issued"
    );
    Ok(Json(InstallLinkResponse { install_url }))
}

pub async fn events(State(state): State<SlackState>, headers: HeaderMap, body: Bytes) -> Response {
    let correlation_id = correlation_id();
    let Some(verifier) = state.verifier.as_ref() else {
        return ApiError::service_unavailable(
            "slack.signing_secret is not configured",
            &correlation_id,
        )
        .into_response();
    };

    if let Err(signature_error) = verifier.verify(
        header_value(&headers, TIMESTAMP_HEADER),
        header_value(&headers, SIGNATURE_HEADER),
        &body,
        Utc::now().timestamp(),
    ) {
        warn!(
            event_name = "slack.events.rejected",
            correlation_id = %correlation_id,
            reason = %signature_error,
            "slack request signature rejected"
        );
        let body = ErrorBody {
            detail: "invalid request signature".to_string(),
            correlation_id: Some(correlation_id),
        };
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    match EventEnvelope::parse(&body) {
        Ok(envelope) => {
            info!(
                event_name = "slack.events.received",
                correlation_id = %correlation_id,
                envelope_type = envelope.kind(),
                "slack event acknowledged"
            );
            Json(envelope.response()).into_response()
        }
        Err(parse_error) => {
            ApiError::bad_request(parse_error.to_string(), &correlation_id).into_response()
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use difychat_core::config::{AppConfig, SlackConfig};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, SlackState};
    use difychat_slack::SignatureVerifier;

    const SECRET: &str = "test-signing-secret";

    fn slack_config(client_id: Option<&str>, signing_secret: Option<&str>) -> SlackConfig {
        let mut config = AppConfig::default().slack;
        config.client_id = client_id.map(str::to_string);
        config.signing_secret = signing_secret.map(|secret| SecretString::from(secret.to_string()));
        config
    }

    fn app(config: &SlackConfig) -> Router {
        router(SlackState::from_config(config))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn signed_event(body: &str, timestamp: i64) -> Request<Body> {
        let verifier = SignatureVerifier::new(SecretString::from(SECRET.to_string()));
        let timestamp = timestamp.to_string();
        let signature = verifier.sign(&timestamp, body.as_bytes()).expect("sign");
        Request::post("/api/slack/events")
            .header("content-type", "application/json")
            .header("x-slack-request-timestamp", timestamp)
            .header("x-slack-signature", signature)
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn install_returns_authorize_url_with_client_id() {
        let response = app(&slack_config(Some("123.456"), None))
            .oneshot(Request::get("/api/slack/install").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let install_url = body["install_url"].as_str().expect("install_url");
        assert!(install_url
            .starts_with("https://slack.com/oauth/v2/authorize?client_id=123.456&scope="));
        assert!(install_url.contains("&state="));
    }

    #[tokio::test]
    async fn install_without_client_id_is_unavailable() {
        let response = app(&slack_config(None, None))
            .oneshot(Request::get("/api/slack/install").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert!(body["correlation_id"].is_string());
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let body = r#"{"type":"url_verification","challenge":"ch-123"}"#;
        let response = app(&slack_config(None, Some(SECRET)))
            .oneshot(signed_event(body, Utc::now().timestamp()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"challenge": "ch-123"}));
    }

    #[tokio::test]
    async fn event_callback_is_acknowledged() {
        let body = r#"{"type":"event_callback","event":{"type":"app_mention"}}"#;
        let response = app(&slack_config(None, Some(SECRET)))
            .oneshot(signed_event(body, Utc::now().timestamp()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"ok": true}));
    }

    #[tokio::test]
    async fn unsigned_or_stale_requests_are_rejected() {
        let unsigned = Request::post("/api/slack/events")
            .body(Body::from(r#"{"type":"url_verification","challenge":"x"}"#))
            .expect("request");
        let response =
            app(&slack_config(None, Some(SECRET))).oneshot(unsigned).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["detail"], "invalid request signature");

        let stale = signed_event(
            r#"{"type":"url_verification","challenge":"x"}"#,
            Utc::now().timestamp() - 600,
        );
        let response =
            app(&slack_config(None, Some(SECRET))).oneshot(stale).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_json_after_valid_signature_is_bad_request() {
        let response = app(&slack_config(None, Some(SECRET)))
            .oneshot(signed_event("{not json", Utc::now().timestamp()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn events_without_signing_secret_are_unavailable() {
        let response = app(&slack_config(None, None))
            .oneshot(signed_event("{}", Utc::now().timestamp()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
