pub mod context;
mod dispatch;
mod evaluate;
mod fetch;
mod group;
mod outputs;
mod processor;
mod trigger;

use thiserror::Error;

use crate::crawler::RequestError;
use crate::query::ApplyError;

pub use processor::Processor;

/// Failure to bring a worker group or the processor into existence
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("crawl '{crawl}': invalid http target: {source}")]
    Request {
        crawl: String,
        #[source]
        source: RequestError,
    },

    #[error("crawl '{crawl}': {source}")]
    Query {
        crawl: String,
        #[source]
        source: ApplyError,
    },

    #[error("crawl '{crawl}': invalid message template: {source}")]
    Template {
        crawl: String,
        #[source]
        source: regex::Error,
    },

    #[error("no enabled crawls")]
    NoEnabledCrawls,
}
