//! Chat transport: Telegram Bot API client and the `ChatApi` seam.
//!
//! The workflow layer only sees the `Update`/`Message`/`CallbackQuery` structs
//! and the `ChatApi` trait; everything Bot-API-specific stays in this module.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

const API_BASE: &str = "https://api.telegram.org";
/// Long-poll window for getUpdates, seconds.
const POLL_TIMEOUT_SECS: u32 = 30;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bot API error: {0}")]
    Api(String),
}

// ── Wire types (incoming) ──

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

// ── Wire types (outgoing) ──

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Outbound chat operations consumed by the workflow layer.
/// Production: `TelegramClient`. Tests substitute a recording fake.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;

    /// Sends a message rendered with legacy-Markdown parsing. The caller must
    /// escape everything not meant as formatting (see `escape_markdown`).
    async fn send_markdown(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;

    async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), TelegramError>;

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError>;

    /// Acknowledges a callback press. `alert` pops a modal notice instead of
    /// the silent acknowledgement.
    async fn answer_callback(
        &self,
        callback_id: &str,
        alert: Option<&str>,
    ) -> Result<(), TelegramError>;

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError>;

    async fn download_document(&self, file_id: &str) -> Result<Vec<u8>, TelegramError>;
}

/// Telegram Bot API client over plain HTTPS.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self {
            client: Client::builder()
                // Must exceed the getUpdates long-poll window.
                .timeout(std::time::Duration::from_secs(90))
                .build()
                .expect("Failed to build HTTP client"),
            token,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;

        let api: ApiResponse<T> = response.json().await?;
        if !api.ok {
            return Err(TelegramError::Api(
                api.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        api.result
            .ok_or_else(|| TelegramError::Api("missing result".to_string()))
    }

    /// Long-polls for the next batch of updates. `offset` must be one past the
    /// last update id already handled.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            json!({ "offset": offset, "timeout": POLL_TIMEOUT_SECS }),
        )
        .await
    }

    /// Registers the command menu shown by the chat client.
    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> Result<(), TelegramError> {
        let commands: Vec<_> = commands
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();
        let _: bool = self.call("setMyCommands", json!({ "commands": commands })).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: Message = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    async fn send_markdown(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: Message = self
            .call(
                "sendMessage",
                json!({ "chat_id": chat_id, "text": text, "parse_mode": "Markdown" }),
            )
            .await?;
        Ok(())
    }

    async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), TelegramError> {
        let _: Message = self
            .call(
                "sendMessage",
                json!({ "chat_id": chat_id, "text": text, "reply_markup": keyboard }),
            )
            .await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        if let Some(kb) = keyboard {
            body["reply_markup"] = serde_json::to_value(kb).map_err(|e| {
                TelegramError::Api(format!("could not serialize keyboard: {e}"))
            })?;
        }
        let _: Message = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        alert: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = alert {
            body["text"] = json!(text);
            body["show_alert"] = json!(true);
        }
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError> {
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part(
                "document",
                Part::bytes(bytes).file_name(file_name.to_string()),
            );

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        let api: ApiResponse<Message> = response.json().await?;
        if !api.ok {
            return Err(TelegramError::Api(
                api.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }

    async fn download_document(&self, file_id: &str) -> Result<Vec<u8>, TelegramError> {
        let info: FileInfo = self.call("getFile", json!({ "file_id": file_id })).await?;
        let file_path = info
            .file_path
            .ok_or_else(|| TelegramError::Api("file has no path".to_string()))?;

        debug!("Downloading document {file_path}");
        let bytes = self
            .client
            .get(format!("{API_BASE}/file/bot{}/{file_path}", self.token))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

/// Escapes the Markdown V1 control characters so user/model text cannot break
/// client-side parsing.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
