use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use paylink_core::config::{Config, resolve_value};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::commands::TelegramCommandSpec;

mod types;

pub use types::{Chat, Message, Update, User};

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

pub struct TelegramSettings {
    pub bot_token: String,
    pub bot_username: Option<String>,
    pub base_url: String,
}

impl TelegramSettings {
    /// # Errors
    /// Returns an error if no bot token is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let Some(bot_token) = resolve_value(
            config.telegram.bot_token.as_deref(),
            &["PAYLINK_TELEGRAM_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"],
        ) else {
            bail!("telegram.bot_token or PAYLINK_TELEGRAM_BOT_TOKEN is required");
        };

        let bot_username = config
            .telegram
            .bot_username
            .as_deref()
            .map(|name| name.trim().trim_start_matches('@'))
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let base_url = config
            .telegram
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        Ok(Self {
            bot_token,
            bot_username,
            base_url,
        })
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: String, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// # Errors
    /// Returns an error if the request fails or Telegram reports an error.
    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: Some(vec!["message"]),
        };
        self.post("getUpdates", &request).await
    }

    /// Sends plain text to a chat.
    ///
    /// # Errors
    /// Returns an error if the request fails or Telegram reports an error.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };
        let _: Message = self.post("sendMessage", &request).await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the request fails or Telegram reports an error.
    pub async fn get_me(&self) -> Result<User> {
        self.post("getMe", &serde_json::json!({})).await
    }

    /// Publishes the command menu shown by Telegram clients.
    ///
    /// # Errors
    /// Returns an error if the request fails or Telegram reports an error.
    pub(crate) async fn set_my_commands(&self, specs: &[TelegramCommandSpec]) -> Result<()> {
        let request = SetMyCommandsRequest {
            commands: specs
                .iter()
                .map(|spec| BotCommandEntry {
                    command: spec.command,
                    description: spec.description,
                })
                .collect(),
        };
        let _: bool = self.post("setMyCommands", &request).await?;
        Ok(())
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, method: &str, body: &B) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| anyhow!("Telegram {method} request failed: {}", err.without_url()))?;

        let payload: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|err| anyhow!("Failed to decode Telegram {method} response: {err}"))?;

        if !payload.ok {
            let description = payload
                .description
                .unwrap_or_else(|| "Telegram API error".to_string());
            bail!("{}", description);
        }

        payload
            .result
            .ok_or_else(|| anyhow!("Telegram {method} response had no result"))
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_updates: Option<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SetMyCommandsRequest {
    commands: Vec<BotCommandEntry>,
}

#[derive(Debug, Serialize)]
struct BotCommandEntry {
    command: &'static str,
    description: &'static str,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::commands::telegram_command_specs;

    const TOKEN: &str = "123:abc";

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::with_base_url(TOKEN.to_string(), &server.uri())
    }

    #[tokio::test]
    async fn get_updates_decodes_text_and_non_text_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/getUpdates")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 10,
                        "message": {
                            "message_id": 1,
                            "chat": { "id": 55, "type": "private" },
                            "from": { "id": 55, "is_bot": false, "first_name": "Ana" },
                            "text": "/start"
                        }
                    },
                    {
                        "update_id": 11,
                        "message": {
                            "message_id": 2,
                            "chat": { "id": 55, "type": "private" },
                            "photo": [{ "file_id": "x", "width": 1, "height": 1 }]
                        }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let updates = client(&server)
            .get_updates(None, Duration::from_secs(0))
            .await
            .unwrap();

        assert_eq!(updates.len(), 2);
        let first = updates[0].message.as_ref().unwrap();
        assert_eq!(first.chat.id, 55);
        assert_eq!(first.text.as_deref(), Some("/start"));
        assert!(updates[1].message.as_ref().unwrap().text.is_none());
    }

    #[tokio::test]
    async fn send_message_posts_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .and(body_json(json!({ "chat_id": 55, "text": "Cancelled." })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 3, "chat": { "id": 55, "type": "private" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).send_message(55, "Cancelled.").await.unwrap();
    }

    #[tokio::test]
    async fn api_errors_surface_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let err = client(&server).send_message(55, "hi").await.unwrap_err();
        assert!(err.to_string().contains("bot was blocked"));
    }

    #[tokio::test]
    async fn set_my_commands_sends_command_table() {
        let server = MockServer::start().await;
        let expected: Vec<_> = telegram_command_specs()
            .iter()
            .map(|spec| json!({ "command": spec.command, "description": spec.description }))
            .collect();
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/setMyCommands")))
            .and(body_json(json!({ "commands": expected })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .set_my_commands(&telegram_command_specs())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_me_returns_username() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/getMe")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "id": 99, "is_bot": true, "username": "paylink_bot" }
            })))
            .mount(&server)
            .await;

        let me = client(&server).get_me().await.unwrap();
        assert!(me.is_bot);
        assert_eq!(me.username.as_deref(), Some("paylink_bot"));
    }
}
