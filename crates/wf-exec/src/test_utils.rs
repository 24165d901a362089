//! Scripted warehouse for coordinator tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use wf_db::{BulkLoad, DbError, DbResult, Row, Value, Warehouse};

/// Which gateway method a call went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Run,
    BulkLoad,
    Query,
}

/// One recorded gateway call
#[derive(Debug, Clone)]
pub struct StubCall {
    pub kind: CallKind,
    /// SQL for run/query, source URI for bulk loads
    pub text: String,
    pub started: Instant,
    pub finished: Instant,
}

type ErrorFactory = Box<dyn Fn() -> DbError + Send + Sync>;

struct FailRule {
    needle: String,
    remaining: Option<u32>,
    error: ErrorFactory,
}

/// In-memory [`Warehouse`] that records calls and fails on demand.
///
/// Every call sleeps for the configured latency so overlap between tasks is
/// observable. Queries return `[[1]]` unless a canned result matches.
pub struct StubWarehouse {
    latency: Duration,
    calls: Mutex<Vec<StubCall>>,
    rules: Mutex<Vec<FailRule>>,
    results: Mutex<Vec<(String, Vec<Row>)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Default for StubWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl StubWarehouse {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(5),
            calls: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every call whose text contains `needle` fails with a transient error
    pub fn fail_transient(self, needle: &str) -> Self {
        self.fail_with(needle, None, || {
            DbError::ConnectionError("connection reset by peer".to_string())
        })
    }

    /// Every call whose text contains `needle` fails with a permanent error
    pub fn fail_permanent(self, needle: &str) -> Self {
        self.fail_with(needle, None, || {
            DbError::ExecutionError("syntax error at or near \"SELEC\"".to_string())
        })
    }

    /// Calls containing `needle` fail, `times` times or forever when `None`
    pub fn fail_with(
        self,
        needle: &str,
        times: Option<u32>,
        error: impl Fn() -> DbError + Send + Sync + 'static,
    ) -> Self {
        self.lock_rules().push(FailRule {
            needle: needle.to_string(),
            remaining: times,
            error: Box::new(error),
        });
        self
    }

    /// Queries containing `needle` return `rows`
    pub fn with_query_result(self, needle: &str, rows: Vec<Row>) -> Self {
        self.results
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((needle.to_string(), rows));
        self
    }

    /// All calls, in completion order
    pub fn calls(&self) -> Vec<StubCall> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Calls whose text contains `needle`
    pub fn calls_matching(&self, needle: &str) -> Vec<StubCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.text.contains(needle))
            .collect()
    }

    /// Highest number of calls observed in flight at once
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn lock_rules(&self) -> std::sync::MutexGuard<'_, Vec<FailRule>> {
        self.rules.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn record(&self, kind: CallKind, text: &str) -> DbResult<()> {
        let started = Instant::now();
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(StubCall {
                kind,
                text: text.to_string(),
                started,
                finished: Instant::now(),
            });

        let mut rules = self.lock_rules();
        let Some(rule) = rules
            .iter_mut()
            .find(|r| text.contains(&r.needle) && r.remaining != Some(0))
        else {
            return Ok(());
        };
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Err((rule.error)())
    }
}

#[async_trait]
impl Warehouse for StubWarehouse {
    async fn run(&self, sql: &str) -> DbResult<()> {
        self.record(CallKind::Run, sql).await
    }

    async fn bulk_load(&self, load: &BulkLoad) -> DbResult<()> {
        self.record(CallKind::BulkLoad, &load.uri).await
    }

    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        self.record(CallKind::Query, sql).await?;
        let results = self.results.lock().unwrap_or_else(|p| p.into_inner());
        Ok(results
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_else(|| vec![vec![Value::Int(1)]]))
    }

    fn db_type(&self) -> &'static str {
        "stub"
    }
}
