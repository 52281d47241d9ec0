pub mod discord;
pub mod telegram;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::cli::config::{AlertKind, AlertsConfig};
use crate::pipeline::context::CycleContext;

use discord::DiscordSender;
use telegram::TelegramSender;

/// Capability that delivers one rendered message to one channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `text`; an empty text is a successful no-op
    async fn send_message(&self, ctx: &CycleContext, text: &str) -> Result<()>;
}

/// Build one sender per configured chat id or webhook URL
pub fn build_senders(config: &AlertsConfig) -> Result<Vec<Arc<dyn MessageSender>>> {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(100)
        .build()
        .context("building http client for alerts")?;

    let senders: Vec<Arc<dyn MessageSender>> = match config.kind {
        AlertKind::Telegram => config
            .telegram
            .chat_ids
            .iter()
            .map(|chat_id| {
                Arc::new(TelegramSender::new(
                    client.clone(),
                    &config.telegram.bot_token,
                    chat_id,
                )) as Arc<dyn MessageSender>
            })
            .collect(),
        AlertKind::Discord => config
            .discord
            .webhook_urls
            .iter()
            .map(|url| {
                DiscordSender::new(client.clone(), url)
                    .map(|sender| Arc::new(sender) as Arc<dyn MessageSender>)
                    .with_context(|| format!("creating discord sender for {}", url))
            })
            .collect::<Result<_>>()?,
    };

    Ok(senders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::{DiscordConfig, TelegramConfig};

    #[test]
    fn test_one_sender_per_destination() {
        let config = AlertsConfig {
            kind: AlertKind::Telegram,
            telegram: TelegramConfig {
                bot_token: "token".to_string(),
                chat_ids: vec!["1".to_string(), "2".to_string()],
            },
            discord: DiscordConfig::default(),
        };
        assert_eq!(build_senders(&config).unwrap().len(), 2);

        let config = AlertsConfig {
            kind: AlertKind::Discord,
            telegram: TelegramConfig::default(),
            discord: DiscordConfig {
                webhook_urls: vec!["https://discord.com/api/webhooks/1/abc".to_string()],
            },
        };
        assert_eq!(build_senders(&config).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_webhook_url_fails() {
        let config = AlertsConfig {
            kind: AlertKind::Discord,
            telegram: TelegramConfig::default(),
            discord: DiscordConfig {
                webhook_urls: vec!["not a url".to_string()],
            },
        };
        assert!(build_senders(&config).is_err());
    }
}
