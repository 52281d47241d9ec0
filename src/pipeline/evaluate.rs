use tokio::sync::mpsc;
use tracing::{debug, error, info, Instrument};

use super::outputs::{EvalOutput, FetchOutput};
use crate::query::Applier;
use crate::utils::catch_panic;

/// Applies the compiled check and variable queries to fetched bodies
pub(crate) struct EvaluateStage {
    applier: Applier,
    input: mpsc::Receiver<FetchOutput>,
    output: mpsc::Sender<EvalOutput>,
}

impl EvaluateStage {
    pub(crate) fn new(applier: Applier, input: mpsc::Receiver<FetchOutput>, output: mpsc::Sender<EvalOutput>) -> Self {
        Self { applier, input, output }
    }

    fn handle(&self, item: FetchOutput) -> Option<EvalOutput> {
        let FetchOutput { ctx, response } = item;

        match self.applier.apply(&response.body) {
            Err(e) => {
                error!(error = %e, "Failed to apply query");
                None
            }
            Ok(result) if !result.matched => {
                info!("query result does not match");
                None
            }
            Ok(result) => {
                debug!(variables = ?result.variables, "Query matched");
                Some(EvalOutput { ctx, response, result })
            }
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("Evaluate stage started");

        while let Some(item) = self.input.recv().await {
            let span = item.ctx.span().clone();

            let evaluated = async { self.handle(item) }.instrument(span.clone());
            let outcome = match catch_panic(evaluated).await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    error!(parent: &span, %panic, "Recovered from panic while evaluating");
                    None
                }
            };

            if let Some(out) = outcome {
                if self.output.send(out).await.is_err() {
                    error!(parent: &span, "Dispatch queue closed, stopping evaluate");
                    break;
                }
            }
        }

        info!("Evaluate stage stopped");
    }
}
