//! Telegram bot alert transport.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;

use crate::domain::error::SmcError;
use crate::ports::alert_port::AlertPort;
use crate::ports::config_port::ConfigPort;

const API_BASE_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramAlertAdapter {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramAlertAdapter {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self, SmcError> {
        Self::with_base_url(API_BASE_URL.to_string(), bot_token, chat_id)
    }

    pub fn with_base_url(
        base_url: String,
        bot_token: String,
        chat_id: String,
    ) -> Result<Self, SmcError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SmcError::Alert {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url,
            bot_token,
            chat_id,
        })
    }

    /// Reads `[alerts] bot_token` and `chat_id`; both are required.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SmcError> {
        let bot_token = config
            .get_string("alerts", "bot_token")
            .ok_or_else(|| SmcError::missing("alerts", "bot_token"))?;
        let chat_id = config
            .get_string("alerts", "chat_id")
            .ok_or_else(|| SmcError::missing("alerts", "chat_id"))?;
        Self::new(bot_token, chat_id)
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

impl AlertPort for TelegramAlertAdapter {
    fn send(&self, message: &str) -> Result<(), SmcError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: message,
        };
        // The token is part of the URL, so reqwest errors are stripped of it.
        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .map_err(|e| SmcError::Alert {
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SmcError::Alert {
                reason: format!("telegram responded with {status}"),
            });
        }
        Ok(())
    }
}
