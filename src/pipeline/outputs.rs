use std::sync::Arc;

use super::context::CycleContext;
use crate::crawler::{CrawlRequest, CrawlResponse};
use crate::query::QueryResult;

/// Trigger -> fetch
#[derive(Debug)]
pub(crate) struct TriggerOutput {
    pub ctx: CycleContext,
    pub request: Arc<CrawlRequest>,
}

/// Fetch -> evaluate
#[derive(Debug)]
pub(crate) struct FetchOutput {
    pub ctx: CycleContext,
    pub response: CrawlResponse,
}

/// Evaluate -> dispatch
#[derive(Debug)]
pub(crate) struct EvalOutput {
    pub ctx: CycleContext,
    pub response: CrawlResponse,
    pub result: QueryResult,
}
