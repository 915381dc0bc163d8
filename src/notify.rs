use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::capabilities::Notifier;
use crate::config::NotifyConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramNotifier {
    http_client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        Self {
            http_client: http_client(),
            endpoint: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        self.http_client
            .post(&self.endpoint)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await
            .context("Telegram request failed")?
            .error_for_status()
            .context("Telegram rejected message")?;
        Ok(())
    }
}

/// Generic JSON webhook (Discord compatible `content` field).
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self { http_client: http_client(), url: url.to_string() }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let payload = serde_json::json!({
            "username": "hostwatch",
            "content": text,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("Webhook request failed")?
            .error_for_status()
            .context("Webhook rejected message")?;
        Ok(())
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(SEND_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Builds the configured notifier, if any. Blank credentials mean no sink.
pub fn from_config(config: Option<&NotifyConfig>) -> Option<Arc<dyn Notifier>> {
    match config? {
        NotifyConfig::Telegram { bot_token, chat_id }
            if !bot_token.trim().is_empty() && !chat_id.trim().is_empty() =>
        {
            Some(Arc::new(TelegramNotifier::new(bot_token.trim(), chat_id.trim())))
        }
        NotifyConfig::Webhook { url } if !url.trim().is_empty() => {
            Some(Arc::new(WebhookNotifier::new(url.trim())))
        }
        _ => None,
    }
}
