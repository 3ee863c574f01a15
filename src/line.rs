//! LINE Messaging API plumbing: webhook signature check, webhook payload
//! parsing, and the reply call.
//!
//! The signature (`X-Line-Signature`) is the base64 HMAC-SHA256 of the raw
//! request body keyed with the channel secret. Replies go to
//! `POST /v2/bot/message/reply` using the reply token of the event.

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

const REPLY_TIMEOUT_SECS: u64 = 30;

/// Checks a webhook signature against the raw body. Compares in constant time.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Top-level webhook request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// A text message that can be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub reply_token: String,
    pub text: String,
}

impl WebhookPayload {
    /// Text message events with a reply token, in delivery order. Every other
    /// event (follows, stickers, images, ...) is ignored.
    pub fn text_messages(&self) -> Vec<TextMessage> {
        self.events
            .iter()
            .filter(|e| e.kind == "message")
            .filter_map(|e| {
                let message = e.message.as_ref()?;
                if message.kind != "text" {
                    return None;
                }
                Some(TextMessage {
                    reply_token: e.reply_token.clone()?,
                    text: message.text.clone()?,
                })
            })
            .collect()
    }
}

/// Sends a reply into the chat thread an event came from.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()>;
}

/// [`ChatTransport`] backed by the LINE Messaging API.
pub struct LineClient {
    client: reqwest::Client,
    reply_url: String,
    access_token: Option<String>,
}

impl LineClient {
    pub fn new(api_base: &str, access_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REPLY_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            reply_url: format!("{}/v2/bot/message/reply", api_base.trim_end_matches('/')),
            access_token,
        })
    }
}

#[async_trait]
impl ChatTransport for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let Some(token) = self.access_token.as_deref() else {
            bail!("LINE_CHANNEL_ACCESS_TOKEN is not set");
        };

        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }],
        });

        let response = self
            .client
            .post(&self.reply_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("LINE reply API error {}: {}", status, body_text);
        }
        Ok(())
    }
}
