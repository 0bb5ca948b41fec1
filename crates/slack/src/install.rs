use difychat_core::config::SlackConfig;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstallLinkError {
    #[error("slack.client_id is not configured")]
    MissingClientId,
    #[error("invalid slack authorize url `{url}`: {reason}")]
    InvalidAuthorizeUrl { url: String, reason: String },
}

/// Builds "Add to Slack" authorize URLs from the configured app identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallLinkBuilder {
    authorize_url: String,
    client_id: String,
    scopes: Vec<String>,
}

impl InstallLinkBuilder {
    pub fn from_config(config: &SlackConfig) -> Result<Self, InstallLinkError> {
        let client_id = config
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(InstallLinkError::MissingClientId)?;

        Ok(Self {
            authorize_url: config.authorize_url.clone(),
            client_id: client_id.to_string(),
            scopes: config.scopes.clone(),
        })
    }

    pub fn scope_param(&self) -> String {
        self.scopes
            .iter()
            .map(|scope| scope.trim())
            .filter(|scope| !scope.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Authorize URL with a fresh opaque `state` token.
    pub fn build(&self) -> Result<String, InstallLinkError> {
        self.build_with_state(&Uuid::new_v4().simple().to_string())
    }

    pub fn build_with_state(&self, state: &str) -> Result<String, InstallLinkError> {
        let scope = self.scope_param();
        let url = Url::parse_with_params(
            &self.authorize_url,
            &[("client_id", self.client_id.as_str()), ("scope", scope.as_str()), ("state", state)],
        )
        .map_err(|error| InstallLinkError::InvalidAuthorizeUrl {
            url: self.authorize_url.clone(),
            reason: error.to_string(),
        })?;

        Ok(url.into())
    }
}
