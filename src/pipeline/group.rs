use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use super::dispatch::{DispatchStage, MessageTemplate};
use super::evaluate::EvaluateStage;
use super::fetch::FetchStage;
use super::trigger::TriggerStage;
use super::PipelineError;
use crate::alert::MessageSender;
use crate::cli::config::CrawlConfig;
use crate::crawler::{CrawlRequest, HttpCrawler};
use crate::query::Applier;

const QUEUE_DEPTH: usize = 1;

struct Stages {
    trigger: TriggerStage,
    fetch: FetchStage,
    evaluate: EvaluateStage,
    dispatch: DispatchStage,
}

struct Handles {
    trigger: JoinHandle<()>,
    fetch: JoinHandle<()>,
    evaluate: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

/// The four stages of one crawl and the queues between them
pub struct WorkerGroup {
    name: String,
    cancel: CancellationToken,
    stages: Option<Stages>,
    handles: Option<Handles>,
}

impl WorkerGroup {
    /// Build the request and compile every query of `crawl`
    pub fn new(
        crawl: &CrawlConfig,
        crawler: Arc<dyn HttpCrawler>,
        senders: Vec<Arc<dyn MessageSender>>,
    ) -> Result<Self, PipelineError> {
        let request = CrawlRequest::from_target(&crawl.target.http).map_err(|source| PipelineError::Request {
            crawl: crawl.name.clone(),
            source,
        })?;

        let applier = Applier::new(&crawl.query.check, &crawl.query.variables).map_err(|source| {
            PipelineError::Query {
                crawl: crawl.name.clone(),
                source,
            }
        })?;

        let template = MessageTemplate::new(&crawl.message).map_err(|source| PipelineError::Template {
            crawl: crawl.name.clone(),
            source,
        })?;

        let cancel = CancellationToken::new();
        let (trigger_tx, trigger_rx) = mpsc::channel(QUEUE_DEPTH);
        let (fetch_tx, fetch_rx) = mpsc::channel(QUEUE_DEPTH);
        let (eval_tx, eval_rx) = mpsc::channel(QUEUE_DEPTH);

        let stages = Stages {
            trigger: TriggerStage::new(&crawl.name, crawl.interval, Arc::new(request), trigger_tx, cancel.clone()),
            fetch: FetchStage::new(crawler, trigger_rx, fetch_tx),
            evaluate: EvaluateStage::new(applier, fetch_rx, eval_tx),
            dispatch: DispatchStage::new(template, senders, eval_rx),
        };

        Ok(Self {
            name: crawl.name.clone(),
            cancel,
            stages: Some(stages),
            handles: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the stage tasks, downstream first. Only the first call has an effect.
    pub fn run(&mut self) {
        let Some(stages) = self.stages.take() else {
            return;
        };

        let span = info_span!("crawl", crawl = %self.name);
        let dispatch = tokio::spawn(stages.dispatch.run().instrument(span.clone()));
        let evaluate = tokio::spawn(stages.evaluate.run().instrument(span.clone()));
        let fetch = tokio::spawn(stages.fetch.run().instrument(span.clone()));
        let trigger = tokio::spawn(stages.trigger.run().instrument(span));

        self.handles = Some(Handles {
            trigger,
            fetch,
            evaluate,
            dispatch,
        });

        info!(crawl = %self.name, "Worker group started");
    }

    /// Stop the trigger, then let every queue drain and close from upstream
    /// to downstream, waiting for each stage in turn
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.stages = None;

        let Some(handles) = self.handles.take() else {
            return;
        };

        let ordered = [
            ("trigger", handles.trigger),
            ("fetch", handles.fetch),
            ("evaluate", handles.evaluate),
            ("dispatch", handles.dispatch),
        ];

        for (stage, handle) in ordered {
            if let Err(e) = handle.await {
                error!(crawl = %self.name, stage, error = %e, "Stage task ended abnormally");
            }
        }

        info!(crawl = %self.name, "Worker group stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MockMessageSender;
    use crate::cli::config::{HttpTargetConfig, QueryConfig, TargetConfig};
    use crate::crawler::{CrawlResponse, FetchError, MockHttpCrawler};
    use crate::pipeline::context::CycleContext;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn crawl_config(check: &str) -> CrawlConfig {
        let mut variables = BTreeMap::new();
        variables.insert("NAME".to_string(), ".[0].name".to_string());

        CrawlConfig {
            name: "fruit".to_string(),
            enabled: true,
            interval: Duration::from_secs(60),
            target: TargetConfig {
                http: HttpTargetConfig {
                    method: "GET".to_string(),
                    url: "http://localhost/fruit".to_string(),
                    header: BTreeMap::new(),
                    body: String::new(),
                },
            },
            query: QueryConfig {
                check: check.to_string(),
                variables,
            },
            message: "found ${NAME}".to_string(),
        }
    }

    fn fruit_crawler() -> MockHttpCrawler {
        let mut crawler = MockHttpCrawler::new();
        crawler.expect_crawl().returning(|_, request| {
            assert_eq!(request.url.path(), "/fruit");
            Ok(CrawlResponse {
                headers: HeaderMap::new(),
                body: br#"[{"name":"apple"},{"name":"banana"}]"#.to_vec(),
            })
        });
        crawler
    }

    fn recording_sender(sent: Arc<Mutex<Vec<String>>>) -> Arc<dyn MessageSender> {
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().returning(move |_, text| {
            sent.lock().unwrap().push(text.to_string());
            Ok(())
        });
        Arc::new(sender)
    }

    #[test]
    fn test_malformed_query_fails_construction() {
        let result = WorkerGroup::new(&crawl_config(".[] | "), Arc::new(MockHttpCrawler::new()), Vec::new());
        assert!(matches!(result, Err(PipelineError::Query { ref crawl, .. }) if crawl == "fruit"));

        let mut config = crawl_config("true");
        config.query.variables.insert("BAD".to_string(), "$nope".to_string());
        let result = WorkerGroup::new(&config, Arc::new(MockHttpCrawler::new()), Vec::new());
        assert!(matches!(result, Err(PipelineError::Query { .. })));
    }

    #[test]
    fn test_bad_target_fails_construction() {
        let mut config = crawl_config("true");
        config.target.http.url = "::not a url".to_string();
        let result = WorkerGroup::new(&config, Arc::new(MockHttpCrawler::new()), Vec::new());
        assert!(matches!(result, Err(PipelineError::Request { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_cycle_reaches_senders() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut group = WorkerGroup::new(
            &crawl_config("[.[] | select(.name == \"apple\")] | length"),
            Arc::new(fruit_crawler()),
            vec![recording_sender(sent.clone()), recording_sender(sent.clone())],
        )
        .unwrap();
        assert_eq!(group.name(), "fruit");

        group.run();
        tokio::time::sleep(Duration::from_millis(10)).await;
        group.shutdown().await;

        assert_eq!(*sent.lock().unwrap(), vec![r#"found "apple""#; 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_matching_cycle_sends_nothing() {
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().never();

        let mut group = WorkerGroup::new(
            &crawl_config("[.[] | select(.name == \"missing\")] | length"),
            Arc::new(fruit_crawler()),
            vec![Arc::new(sender)],
        )
        .unwrap();

        group.run();
        tokio::time::sleep(Duration::from_secs(150)).await;
        group.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_cycle_per_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut crawler = MockHttpCrawler::new();
        crawler.expect_crawl().returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CrawlResponse {
                headers: HeaderMap::new(),
                body: b"[]".to_vec(),
            })
        });

        let mut group = WorkerGroup::new(&crawl_config("length"), Arc::new(crawler), Vec::new()).unwrap();
        group.run();
        // Fires at 0s, 60s and 120s
        tokio::time::sleep(Duration::from_secs(150)).await;
        group.shutdown().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    struct SlowCrawler;

    #[async_trait]
    impl HttpCrawler for SlowCrawler {
        async fn crawl(&self, _ctx: &CycleContext, _request: &CrawlRequest) -> Result<CrawlResponse, FetchError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CrawlResponse {
                headers: HeaderMap::new(),
                body: br#"[{"name":"apple"}]"#.to_vec(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_in_flight_cycle() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut group = WorkerGroup::new(
            &crawl_config("true"),
            Arc::new(SlowCrawler),
            vec![recording_sender(sent.clone())],
        )
        .unwrap();

        group.run();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(sent.lock().unwrap().is_empty());

        // The fetch in progress finishes and its cycle is delivered before shutdown returns
        group.shutdown().await;
        assert_eq!(*sent.lock().unwrap(), vec![r#"found "apple""#]);
        assert!(group.handles.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_without_run() {
        let mut group = WorkerGroup::new(&crawl_config("true"), Arc::new(MockHttpCrawler::new()), Vec::new()).unwrap();
        group.shutdown().await;
        group.run();
        assert!(group.handles.is_none());
    }
}
