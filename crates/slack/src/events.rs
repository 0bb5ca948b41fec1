use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("url_verification payload is missing `challenge`")]
    MissingChallenge,
}

/// Events API envelope, reduced to what the receiver acts on.
#[derive(Clone, Debug, PartialEq)]
pub enum EventEnvelope {
    UrlVerification { challenge: String },
    EventCallback { team_id: Option<String>, event_type: Option<String> },
    Other { envelope_type: String },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    event: Option<Value>,
}

impl EventEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, EventParseError> {
        let raw: RawEnvelope = serde_json::from_slice(body)?;

        match raw.envelope_type.as_str() {
            "url_verification" => {
                let challenge = raw.challenge.ok_or(EventParseError::MissingChallenge)?;
                Ok(Self::UrlVerification { challenge })
            }
            "event_callback" => {
                let event_type = raw
                    .event
                    .as_ref()
                    .and_then(|event| event.get("type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Ok(Self::EventCallback { team_id: raw.team_id, event_type })
            }
            other => Ok(Self::Other { envelope_type: other.to_string() }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::UrlVerification { .. } => "url_verification",
            Self::EventCallback { .. } => "event_callback",
            Self::Other { envelope_type } => envelope_type,
        }
    }

    pub fn response(&self) -> EventResponse {
        match self {
            Self::UrlVerification { challenge } => {
                EventResponse::Challenge { challenge: challenge.clone() }
            }
            Self::EventCallback { .. } | Self::Other { .. } => EventResponse::Ack { ok: true },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventResponse {
    Challenge { challenge: String },
    Ack { ok: bool },
}
