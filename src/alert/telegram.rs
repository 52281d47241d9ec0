use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::MessageSender;
use crate::pipeline::context::CycleContext;

const API_BASE: &str = "https://api.telegram.org";

/// Bot API limit on the text of one message, in characters
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Characters MarkdownV2 requires to be escaped outside of entities
const MARKDOWN_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

/// Sends messages to one Telegram chat through the Bot API
#[derive(Debug, Clone)]
pub struct TelegramSender {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSender {
    pub fn new(client: Client, bot_token: &str, chat_id: &str) -> Self {
        Self::with_api_base(client, API_BASE, bot_token, chat_id)
    }

    pub fn with_api_base(client: Client, api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

/// Prefix every MarkdownV2 special character with a backslash, keeping the
/// escaped text within `max_chars` characters. An escape pair that does not
/// fit is dropped whole.
pub fn escape_markdown(text: &str, max_chars: usize) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut count = 0;

    for c in text.chars() {
        let special = MARKDOWN_SPECIAL.contains(&c);
        let width = if special { 2 } else { 1 };
        if count + width > max_chars {
            break;
        }
        if special {
            escaped.push('\\');
        }
        escaped.push(c);
        count += width;
    }

    escaped
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send_message(&self, ctx: &CycleContext, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: escape_markdown(text, MAX_MESSAGE_CHARS),
            parse_mode: "MarkdownV2",
        };

        debug!(chat_id = %self.chat_id, crawl = ctx.crawl(), "Sending telegram message");

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .context("doing http request")?;

        let status = response.status();
        let body = response.text().await.context("reading response body")?;

        if status != StatusCode::OK {
            bail!("unexpected response status code {}; body ({})", status, body);
        }

        Ok(())
    }
}
