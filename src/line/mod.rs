pub mod events;
pub mod flex;
pub mod signature;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use flex::OutgoingMessage;

const API_BASE: &str = "https://api.line.me";
const DATA_API_BASE: &str = "https://api-data.line.me";

/// Errors talking to the LINE Messaging API.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("LINE API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("network error talking to LINE: {0}")]
    Network(#[from] reqwest::Error),
}

/// The messaging platform seam: content download and replies.
///
/// Trait object so tests can substitute a fake for the real API.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Download the binary content attached to a message.
    async fn get_message_content(&self, message_id: &str) -> Result<Bytes, MessagingError>;

    /// Send the reply for one event; the reply token is single-use.
    async fn reply_message(
        &self,
        reply_token: &str,
        messages: &[OutgoingMessage],
    ) -> Result<(), MessagingError>;
}

/// Real LINE Messaging API client.
pub struct LineClient {
    http: reqwest::Client,
    access_token: String,
}

impl LineClient {
    pub fn new(access_token: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, access_token })
    }
}

#[async_trait]
impl MessagingClient for LineClient {
    async fn get_message_content(&self, message_id: &str) -> Result<Bytes, MessagingError> {
        let url = format!("{DATA_API_BASE}/v2/bot/message/{message_id}/content");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?)
    }

    async fn reply_message(
        &self,
        reply_token: &str,
        messages: &[OutgoingMessage],
    ) -> Result<(), MessagingError> {
        let url = format!("{API_BASE}/v2/bot/message/reply");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "replyToken": reply_token,
                "messages": messages,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
