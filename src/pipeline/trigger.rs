use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::CycleContext;
use super::outputs::TriggerOutput;
use crate::crawler::CrawlRequest;
use crate::utils::catch_panic_sync;

/// Starts a cycle immediately, then once every `interval` until cancelled
pub(crate) struct TriggerStage {
    crawl: String,
    interval: Duration,
    request: Arc<CrawlRequest>,
    output: mpsc::Sender<TriggerOutput>,
    cancel: CancellationToken,
}

impl TriggerStage {
    pub(crate) fn new(
        crawl: &str,
        interval: Duration,
        request: Arc<CrawlRequest>,
        output: mpsc::Sender<TriggerOutput>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            crawl: crawl.to_string(),
            interval,
            request,
            output,
            cancel,
        }
    }

    fn fire(&self, seq: u64) -> TriggerOutput {
        TriggerOutput {
            ctx: CycleContext::new(&self.crawl, &self.cancel).with_annotation("seq", seq.to_string()),
            request: Arc::clone(&self.request),
        }
    }

    pub(crate) async fn run(self) {
        debug!(crawl = %self.crawl, interval = ?self.interval, "Trigger stage started");

        let mut seq: u64 = 0;
        loop {
            seq += 1;
            match catch_panic_sync(|| self.fire(seq)) {
                Ok(item) => {
                    let cycle_id = item.ctx.cycle_id();
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        sent = self.output.send(item) => {
                            if sent.is_err() {
                                warn!(crawl = %self.crawl, "Fetch queue closed, stopping trigger");
                                break;
                            }
                            debug!(crawl = %self.crawl, %cycle_id, "Cycle triggered");
                        }
                    }
                }
                Err(panic) => error!(crawl = %self.crawl, %panic, "Recovered from panic while starting cycle"),
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(crawl = %self.crawl, "Trigger stage stopped");
    }
}
