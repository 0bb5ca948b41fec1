use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    Ja,
    En,
}

/// Fixed strings shown by the chat and landing pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct UiStrings {
    pub lang: &'static str,
    pub chat_title: &'static str,
    pub input_placeholder: &'static str,
    pub send_label: &'static str,
    pub loading_label: &'static str,
    pub fallback_message: &'static str,
    pub install_title: &'static str,
    pub install_label: &'static str,
    pub install_error: &'static str,
}

const JA: UiStrings = UiStrings {
    lang: "ja",
    chat_title: "チャット",
    input_placeholder: "メッセージを入力してください",
    send_label: "送信",
    loading_label: "応答を待っています…",
    fallback_message: "申し訳ありません。エラーが発生しました。もう一度お試しください。",
    install_title: "Slack にインストール",
    install_label: "Slack に追加する",
    install_error: "インストールリンクを取得できませんでした。",
};

const EN: UiStrings = UiStrings {
    lang: "en",
    chat_title: "Chat",
    input_placeholder: "Type a message",
    send_label: "Send",
    loading_label: "Waiting for a reply…",
    fallback_message: "Sorry, something went wrong. Please try again.",
    install_title: "Install to Slack",
    install_label: "Add to Slack",
    install_error: "Could not load the install link.",
};

impl Locale {
    pub fn strings(self) -> &'static UiStrings {
        match self {
            Self::Ja => &JA,
            Self::En => &EN,
        }
    }

    pub fn fallback_message(self) -> &'static str {
        self.strings().fallback_message
    }
}

impl std::str::FromStr for Locale {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ja" => Ok(Self::Ja),
            "en" => Ok(Self::En),
            other => Err(ConfigError::Validation(format!(
                "unsupported locale `{other}` (expected ja|en)"
            ))),
        }
    }
}
