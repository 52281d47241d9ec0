use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{CrawlRequest, CrawlResponse, FetchError, HttpCrawler};
use crate::pipeline::context::CycleContext;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_IDLE_PER_HOST: usize = 100;

/// [`HttpCrawler`] backed by a shared `reqwest` connection pool
#[derive(Debug, Clone)]
pub struct ReqwestCrawler {
    client: Client,
}

impl ReqwestCrawler {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    async fn fetch(&self, request: &CrawlRequest) -> Result<CrawlResponse, FetchError> {
        debug!("Sending {} request to {}", request.method, request.url);

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                status,
                url: request.url.clone(),
            });
        }

        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(FetchError::Body)?;

        debug!("Received {} bytes from {}", body.len(), request.url);

        Ok(CrawlResponse {
            headers,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl HttpCrawler for ReqwestCrawler {
    async fn crawl(&self, ctx: &CycleContext, request: &CrawlRequest) -> Result<CrawlResponse, FetchError> {
        if ctx.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        tokio::select! {
            _ = ctx.cancellation().cancelled() => Err(FetchError::Cancelled),
            result = self.fetch(request) => result,
        }
    }
}
