use difychat_core::Locale;
use tracing::warn;

use crate::ChatApi;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LandingState {
    Loading,
    Ready { install_url: String },
    Error { message: String },
}

/// "Add to Slack" landing view. The install link is fetched once.
#[derive(Clone, Debug)]
pub struct SlackLanding {
    locale: Locale,
    state: LandingState,
    fetched: bool,
}

impl SlackLanding {
    pub fn new(locale: Locale) -> Self {
        Self { locale, state: LandingState::Loading, fetched: false }
    }

    pub fn state(&self) -> &LandingState {
        &self.state
    }

    pub async fn load<A: ChatApi + ?Sized>(&mut self, api: &A) {
        if self.fetched {
            return;
        }
        self.fetched = true;

        self.state = match api.fetch_install_link().await {
            Ok(response) => LandingState::Ready { install_url: response.install_url },
            Err(error) => {
                warn!(
                    event_name = "client.slack.install.failed",
                    error = %error,
                    "install link fetch failed"
                );
                LandingState::Error { message: self.locale.strings().install_error.to_string() }
            }
        };
    }

    /// Link target exactly as the backend returned it.
    pub fn install_href(&self) -> Option<&str> {
        match &self.state {
            LandingState::Ready { install_url } => Some(install_url),
            _ => None,
        }
    }
}
