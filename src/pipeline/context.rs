use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{field, info_span, Span};
use uuid::Uuid;

/// Per-cycle correlation data, created at each trigger firing and passed by
/// reference through every stage of that cycle
#[derive(Debug, Clone)]
pub struct CycleContext {
    crawl: String,
    cycle_id: Uuid,
    triggered_at: DateTime<Utc>,
    annotations: BTreeMap<String, String>,
    cancel: CancellationToken,
    span: Span,
}

impl CycleContext {
    /// Start a cycle of `crawl`, cancelled whenever `group` is
    pub fn new(crawl: &str, group: &CancellationToken) -> Self {
        let cycle_id = Uuid::new_v4();
        let span = info_span!(
            "cycle",
            crawl = %crawl,
            cycle_id = %cycle_id,
            annotations = field::Empty,
        );

        Self {
            crawl: crawl.to_string(),
            cycle_id,
            triggered_at: Utc::now(),
            annotations: BTreeMap::new(),
            cancel: group.child_token(),
            span,
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self.span
            .record("annotations", field::display(Annotations(&self.annotations)));
        self
    }

    pub fn crawl(&self) -> &str {
        &self.crawl
    }

    pub fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    pub fn triggered_at(&self) -> DateTime<Utc> {
        self.triggered_at
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Span every log line of this cycle is emitted under
    pub fn span(&self) -> &Span {
        &self.span
    }
}

struct Annotations<'a>(&'a BTreeMap<String, String>);

impl fmt::Display for Annotations<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_cycle_ids() {
        let group = CancellationToken::new();
        let a = CycleContext::new("pool", &group);
        let b = CycleContext::new("pool", &group);
        assert_ne!(a.cycle_id(), b.cycle_id());
        assert_eq!(a.crawl(), "pool");
    }

    #[test]
    fn test_annotations() {
        let group = CancellationToken::new();
        let ctx = CycleContext::new("pool", &group).with_annotation("attempt", "1");
        assert_eq!(ctx.annotation("attempt"), Some("1"));
        assert_eq!(ctx.annotation("missing"), None);
        assert_eq!(
            Annotations(&ctx.annotations).to_string(),
            "attempt=1".to_string()
        );
    }

    #[test]
    fn test_group_cancellation_reaches_cycles() {
        let group = CancellationToken::new();
        let ctx = CycleContext::new("pool", &group);
        assert!(!ctx.is_cancelled());
        group.cancel();
        assert!(ctx.is_cancelled());
    }
}
