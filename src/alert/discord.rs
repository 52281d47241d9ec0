use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::MessageSender;
use crate::pipeline::context::CycleContext;

/// Webhook limit on the content of one message, in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    content: &'a str,
}

/// Posts messages to one Discord webhook
#[derive(Debug, Clone)]
pub struct DiscordSender {
    client: Client,
    webhook_url: Url,
}

impl DiscordSender {
    pub fn new(client: Client, webhook_url: &str) -> Result<Self> {
        let webhook_url = Url::parse(webhook_url).context("parsing webhook url")?;
        Ok(Self { client, webhook_url })
    }

    async fn send_chunk(&self, content: &str) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&WebhookRequest { content })
            .send()
            .await
            .context("doing http request")?;

        let status = response.status();
        let body = response.text().await.context("reading response body")?;

        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            bail!("unexpected response status code {}; body ({})", status, body);
        }

        Ok(())
    }
}

/// Split `text` into chunks of at most `MAX_MESSAGE_CHARS` characters,
/// cutting after the last newline of a chunk when there is one
pub fn split_message(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    loop {
        let limit = match rest.char_indices().nth(MAX_MESSAGE_CHARS) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest);
                return chunks;
            }
        };

        let split_at = match rest[..limit].rfind('\n') {
            Some(idx) if idx > 0 => idx + 1,
            _ => limit,
        };

        let (chunk, tail) = rest.split_at(split_at);
        chunks.push(chunk);
        rest = tail;

        if rest.is_empty() {
            return chunks;
        }
    }
}

#[async_trait]
impl MessageSender for DiscordSender {
    async fn send_message(&self, ctx: &CycleContext, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let chunks = split_message(text);
        debug!(crawl = ctx.crawl(), chunks = chunks.len(), "Sending discord message");

        for (i, chunk) in chunks.iter().enumerate() {
            self.send_chunk(chunk)
                .await
                .with_context(|| format!("sending chunk {}/{}", i + 1, chunks.len()))?;
        }

        Ok(())
    }
}
