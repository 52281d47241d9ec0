use futures::future::join_all;
use std::sync::Arc;
use tracing::info;

use super::group::WorkerGroup;
use super::PipelineError;
use crate::alert::MessageSender;
use crate::cli::config::CrawlConfig;
use crate::crawler::HttpCrawler;

/// One worker group per enabled crawl
pub struct Processor {
    groups: Vec<WorkerGroup>,
}

impl Processor {
    pub fn new(
        crawls: &[CrawlConfig],
        crawler: Arc<dyn HttpCrawler>,
        senders: Vec<Arc<dyn MessageSender>>,
    ) -> Result<Self, PipelineError> {
        let groups = crawls
            .iter()
            .filter(|crawl| crawl.enabled)
            .map(|crawl| WorkerGroup::new(crawl, Arc::clone(&crawler), senders.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        if groups.is_empty() {
            return Err(PipelineError::NoEnabledCrawls);
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> impl Iterator<Item = &WorkerGroup> {
        self.groups.iter()
    }

    pub fn run(&mut self) {
        for group in &mut self.groups {
            group.run();
        }
        info!(groups = self.groups.len(), "Processor started");
    }

    pub async fn shutdown(&mut self) {
        join_all(self.groups.iter_mut().map(|group| group.shutdown())).await;
        info!("Processor stopped");
    }
}
