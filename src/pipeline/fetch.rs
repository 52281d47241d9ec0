use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, Instrument};

use super::outputs::{FetchOutput, TriggerOutput};
use crate::crawler::HttpCrawler;
use crate::utils::catch_panic;

/// Performs the HTTP fetch of every triggered cycle
pub(crate) struct FetchStage {
    crawler: Arc<dyn HttpCrawler>,
    input: mpsc::Receiver<TriggerOutput>,
    output: mpsc::Sender<FetchOutput>,
}

impl FetchStage {
    pub(crate) fn new(
        crawler: Arc<dyn HttpCrawler>,
        input: mpsc::Receiver<TriggerOutput>,
        output: mpsc::Sender<FetchOutput>,
    ) -> Self {
        Self { crawler, input, output }
    }

    async fn handle(&self, item: TriggerOutput) -> Option<FetchOutput> {
        let TriggerOutput { ctx, request } = item;

        match self.crawler.crawl(&ctx, &request).await {
            Ok(response) => {
                debug!(
                    bytes = response.body.len(),
                    content_type = ?response.headers.get(CONTENT_TYPE),
                    "Fetched response"
                );
                Some(FetchOutput { ctx, response })
            }
            Err(e) => {
                error!(error = %e, "Failed to crawl");
                None
            }
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("Fetch stage started");

        while let Some(item) = self.input.recv().await {
            let span = item.ctx.span().clone();

            let outcome = match catch_panic(self.handle(item).instrument(span.clone())).await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    error!(parent: &span, %panic, "Recovered from panic while fetching");
                    None
                }
            };

            if let Some(out) = outcome {
                if self.output.send(out).await.is_err() {
                    error!(parent: &span, "Evaluate queue closed, stopping fetch");
                    break;
                }
            }
        }

        info!("Fetch stage stopped");
    }
}
