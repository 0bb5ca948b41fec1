use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use difychat_core::api::ErrorBody;
use difychat_core::{ApplicationError, InterfaceError};
use uuid::Uuid;

pub fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// JSON error response carrying the request's correlation id.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn service_unavailable(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::ServiceUnavailable {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        // Validation failures describe the caller's own input; everything else stays generic.
        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. } => message.clone(),
            other => other.user_message().to_string(),
        };
        ErrorBody { detail, correlation_id: Some(self.0.correlation_id().to_string()) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
