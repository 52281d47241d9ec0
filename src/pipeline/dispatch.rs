use chrono::Utc;
use futures::future::join_all;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, Instrument};

use super::outputs::EvalOutput;
use crate::alert::MessageSender;
use crate::utils::catch_panic;

const PLACEHOLDER_PATTERN: &str = r"\$(?:\{(\w+)\}|(\w+))";

/// Message text with `$NAME` and `${NAME}` placeholders
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    source: String,
    placeholder: Regex,
}

impl MessageTemplate {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            placeholder: Regex::new(PLACEHOLDER_PATTERN)?,
        })
    }

    /// Substitute known variables; unknown placeholders are kept as written
    pub fn render(&self, variables: &BTreeMap<String, String>) -> String {
        self.placeholder
            .replace_all(&self.source, |caps: &Captures| {
                let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                match variables.get(name) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Renders matched cycles and fans the message out to every sender
pub(crate) struct DispatchStage {
    template: MessageTemplate,
    senders: Vec<Arc<dyn MessageSender>>,
    input: mpsc::Receiver<EvalOutput>,
}

impl DispatchStage {
    pub(crate) fn new(
        template: MessageTemplate,
        senders: Vec<Arc<dyn MessageSender>>,
        input: mpsc::Receiver<EvalOutput>,
    ) -> Self {
        Self {
            template,
            senders,
            input,
        }
    }

    async fn handle(&self, item: EvalOutput) {
        let EvalOutput { ctx, response, result } = item;

        let text = self.template.render(&result.variables);
        if text.is_empty() {
            debug!("Rendered message is empty, nothing to send");
            return;
        }

        debug!(
            senders = self.senders.len(),
            body_bytes = response.body.len(),
            cycle_age_ms = (Utc::now() - ctx.triggered_at()).num_milliseconds(),
            "Sending message"
        );

        let results = join_all(self.senders.iter().map(|sender| sender.send_message(&ctx, &text))).await;

        let errors: Vec<String> = results
            .into_iter()
            .filter_map(Result::err)
            .map(|e| format!("{:#}", e))
            .collect();

        if !errors.is_empty() {
            error!(failed = errors.len(), errors = ?errors, "failed to send message");
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("Dispatch stage started");

        while let Some(item) = self.input.recv().await {
            let span = item.ctx.span().clone();

            if let Err(panic) = catch_panic(self.handle(item).instrument(span.clone())).await {
                error!(parent: &span, %panic, "Recovered from panic while dispatching");
            }
        }

        info!("Dispatch stage stopped");
    }
}
