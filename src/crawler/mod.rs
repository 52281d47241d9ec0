pub mod http;
pub mod task;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::pipeline::context::CycleContext;

// Re-export common types
pub use http::ReqwestCrawler;
pub use task::{CrawlRequest, CrawlResponse, RequestError};

/// Failure of a single fetch; the cycle that hit it is dropped
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("doing http request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected http response code '{status}' from {url}")]
    Status { status: StatusCode, url: Url },

    #[error("reading http response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("fetch cancelled by shutdown")]
    Cancelled,
}

/// Capability that performs one HTTP fetch for a cycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpCrawler: Send + Sync {
    /// Fetch `request`, giving up when the cycle is cancelled. Any status
    /// of 400 or above is an error.
    async fn crawl(&self, ctx: &CycleContext, request: &CrawlRequest) -> Result<CrawlResponse, FetchError>;
}
