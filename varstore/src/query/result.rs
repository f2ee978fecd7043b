//! Merger: drains every runner of a logical query into one lazy sequence.
//!
//! ```text
//! Idle -> Running -> Draining -> Done
//!                 \-> Cancelled -> Done
//! ```
//!
//! Runners execute on a dedicated pool (one thread per runner) and push
//! into a bounded queue. Items are deduplicated by fingerprint and the
//! caller's limit counts distinct fingerprints.

use std::collections::HashMap;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};

use crossbeam::channel::{
    Receiver,
    RecvTimeoutError,
};
use hashbrown::HashSet;
use log::{
    debug,
    info,
    warn,
};
use rayon::{
    ThreadPool,
    ThreadPoolBuilder,
};

use crate::data_structs::{
    FamilyVariant,
    SummaryVariant,
};
use crate::errors::{
    StorageError,
    StorageResult,
};
use crate::query::filters::CompiledFilters;
use crate::query::runner::{
    QueryRunner,
    RunnerOutcome,
    RunnerReport,
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// A decoded query result.
pub trait QueryItem: Send + Sized + 'static {
    /// Content fingerprint used for deduplication.
    fn fingerprint(&self) -> String;

    /// Folds another report of the same variant into `self`.
    fn merge(
        &mut self,
        other: Self,
    );

    /// Re-applies the filters in process; `None` drops the item.
    fn residual(
        self,
        filters: &CompiledFilters,
    ) -> Option<Self>;
}

impl QueryItem for SummaryVariant {
    fn fingerprint(&self) -> String {
        self.svuid()
    }

    fn merge(
        &mut self,
        other: Self,
    ) {
        self.merge_counters(&other);
    }

    fn residual(
        self,
        filters: &CompiledFilters,
    ) -> Option<Self> {
        filters.filter_summary(self)
    }
}

impl QueryItem for FamilyVariant {
    fn fingerprint(&self) -> String {
        self.fvuid()
    }

    fn merge(
        &mut self,
        other: Self,
    ) {
        self.absorb_matched(other.matched_alleles_indexes());
    }

    fn residual(
        self,
        filters: &CompiledFilters,
    ) -> Option<Self> {
        filters.filter_family(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Running,
    Draining,
    Cancelled,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeMode {
    /// Stream items, dropping repeated fingerprints.
    #[default]
    Deduplicate,
    /// Collect everything first and merge items sharing a fingerprint.
    Combine,
}

pub struct QueryResult<T: QueryItem> {
    runners:          Vec<QueryRunner<T>>,
    backends:         Vec<String>,
    state:            QueryState,
    mode:             MergeMode,
    limit:            Option<usize>,
    queue_capacity:   usize,
    shutdown_timeout: Duration,
    closed:           Arc<AtomicBool>,
    receiver:         Option<Receiver<T>>,
    report_receiver:  Option<Receiver<RunnerReport>>,
    pool:             Option<ThreadPool>,
    seen:             HashSet<String>,
    combined:         Option<std::vec::IntoIter<T>>,
    reports:          Vec<RunnerReport>,
    started:          Option<Instant>,
}

impl<T: QueryItem> QueryResult<T> {
    pub fn new(
        runners: Vec<QueryRunner<T>>,
        limit: Option<usize>,
    ) -> Self {
        Self {
            backends: runners
                .iter()
                .map(|r| r.backend_name().to_string())
                .collect(),
            runners,
            state: QueryState::Idle,
            mode: MergeMode::default(),
            limit,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            closed: Arc::new(AtomicBool::new(false)),
            receiver: None,
            report_receiver: None,
            pool: None,
            seen: HashSet::new(),
            combined: None,
            reports: Vec::new(),
            started: None,
        }
    }

    pub fn with_mode(
        mut self,
        mode: MergeMode,
    ) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_queue_capacity(
        mut self,
        capacity: usize,
    ) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_shutdown_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Reports collected so far; complete once the result is closed.
    pub fn reports(&self) -> &[RunnerReport] {
        &self.reports
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Spawns one pooled worker per runner. Called by the first `next()`.
    pub fn start(&mut self) -> StorageResult<()> {
        if self.state != QueryState::Idle {
            return Ok(());
        }
        self.started = Some(Instant::now());
        if self.runners.is_empty() || self.limit == Some(0) {
            self.state = QueryState::Done;
            return Ok(());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.runners.len())
            .thread_name(|i| format!("varstore-runner-{}", i))
            .build()
            .map_err(|e| StorageError::Configuration(format!("runner pool: {}", e)))?;
        let (sender, receiver) = crossbeam::channel::bounded(self.queue_capacity);
        let (report_sender, report_receiver) = crossbeam::channel::unbounded();

        for runner in self.runners.drain(..) {
            let sender = sender.clone();
            let report_sender = report_sender.clone();
            let closed = Arc::clone(&self.closed);
            pool.spawn(move || {
                let report = runner.run(&sender, &closed);
                drop(sender);
                debug!("Runner finished: {}", report);
                let _ = report_sender.send(report);
            });
        }

        self.pool = Some(pool);
        self.receiver = Some(receiver);
        self.report_receiver = Some(report_receiver);
        self.state = QueryState::Running;
        debug!("Started {} runner(s)", self.backends.len());
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|l| self.seen.len() >= l)
    }

    fn cancel(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.receiver = None;
        self.state = QueryState::Cancelled;
    }

    fn next_deduplicated(&mut self) -> Option<T> {
        loop {
            let received = self.receiver.as_ref()?.recv();
            match received {
                Ok(item) => {
                    if !self.seen.insert(item.fingerprint()) {
                        continue;
                    }
                    if self.limit_reached() {
                        self.cancel();
                    }
                    return Some(item);
                },
                Err(_) => {
                    self.receiver = None;
                    self.state = QueryState::Draining;
                    return None;
                },
            }
        }
    }

    fn collect_combined(&mut self) {
        let mut items: Vec<T> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut cancelled = false;
        if let Some(receiver) = self.receiver.take() {
            for item in receiver.iter() {
                let fingerprint = item.fingerprint();
                match index.get(&fingerprint) {
                    Some(at) => items[*at].merge(item),
                    None => {
                        if self.limit.is_some_and(|l| items.len() >= l) {
                            cancelled = true;
                            break;
                        }
                        index.insert(fingerprint.clone(), items.len());
                        self.seen.insert(fingerprint);
                        items.push(item);
                    },
                }
            }
        }
        if cancelled {
            self.closed.store(true, Ordering::Release);
            self.state = QueryState::Cancelled;
        }
        else {
            self.state = QueryState::Draining;
        }
        self.combined = Some(items.into_iter());
    }

    /// Cancels the remaining work and waits up to the shutdown timeout for
    /// every runner to report. Runners missing the deadline are reported as
    /// [`RunnerOutcome::TimedOut`] and left to exit on their own.
    pub fn close(&mut self) -> &[RunnerReport] {
        if self.state == QueryState::Done && self.report_receiver.is_none() {
            return &self.reports;
        }
        self.closed.store(true, Ordering::Release);
        self.receiver = None;
        self.combined = None;

        if let Some(reports) = self.report_receiver.take() {
            let deadline = Instant::now() + self.shutdown_timeout;
            while self.reports.len() < self.backends.len() {
                let left = deadline.saturating_duration_since(Instant::now());
                match reports.recv_timeout(left) {
                    Ok(report) => self.reports.push(report),
                    Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            let mut missing = self.backends.clone();
            for report in &self.reports {
                if let Some(at) = missing.iter().position(|b| *b == report.backend) {
                    missing.remove(at);
                }
            }
            for backend in missing {
                warn!("Runner for {} missed the shutdown deadline", backend);
                self.reports.push(RunnerReport {
                    backend,
                    outcome: RunnerOutcome::TimedOut,
                });
            }
        }
        self.pool = None;
        self.state = QueryState::Done;

        if let Some(started) = self.started.take() {
            info!(
                "Query finished: {} distinct item(s) from {} runner(s) in {:.2?}",
                self.seen.len(),
                self.backends.len(),
                started.elapsed()
            );
        }
        &self.reports
    }
}

impl<T: QueryItem> Iterator for QueryResult<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == QueryState::Idle {
            if let Err(e) = self.start() {
                warn!("Failed to start query: {}", e);
                self.state = QueryState::Done;
                return None;
            }
        }
        let item = match (self.state, self.mode) {
            (QueryState::Running, MergeMode::Deduplicate) => self.next_deduplicated(),
            (QueryState::Running, MergeMode::Combine) => {
                self.collect_combined();
                self.combined.as_mut().and_then(Iterator::next)
            },
            (QueryState::Draining | QueryState::Cancelled, MergeMode::Combine) => {
                self.combined.as_mut().and_then(Iterator::next)
            },
            _ => None,
        };
        if item.is_none() && self.state != QueryState::Done {
            self.close();
        }
        item
    }
}

impl<T: QueryItem> Drop for QueryResult<T> {
    fn drop(&mut self) {
        if self.state != QueryState::Done {
            self.close();
        }
    }
}
