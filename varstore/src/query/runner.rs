//! Runners: one per backend or child study.
//!
//! A runner owns one backend connection, executes every batch of a
//! [`CompiledQuery`], groups consecutive rows of one variant, decodes them,
//! applies the residual filter and pushes the survivors onto the shared
//! result queue.

use std::fmt::Display;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;

use crossbeam::channel::Sender;
use log::{
    debug,
    warn,
};

use crate::data_structs::{
    FamiliesData,
    FamilyVariant,
    SummaryVariant,
};
use crate::errors::{
    StorageError,
    StorageResult,
};
use crate::io::serializer::BlobCodec;
use crate::query::builder::{
    CompiledQuery,
    QueryHeuristics,
};
use crate::query::result::QueryItem;

/// One allele row as returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub bucket_index:  i32,
    pub summary_index: i32,
    pub family_index:  Option<i32>,
    pub allele_index:  i32,
    pub summary_data:  Vec<u8>,
    pub family_data:   Option<Vec<u8>>,
}

impl RawRow {
    /// Rows sharing this key describe one variant.
    pub fn variant_key(&self) -> (i32, i32, Option<i32>) {
        (self.bucket_index, self.summary_index, self.family_index)
    }
}

pub type RowStream = Box<dyn Iterator<Item = StorageResult<RawRow>> + Send>;

/// Exclusive connection of one runner. Never shared across threads.
pub trait BackendConnection: Send {
    /// Rows of one batch in the backend's natural scan order.
    fn execute(
        &mut self,
        query: &CompiledQuery,
        batch: &QueryHeuristics,
    ) -> StorageResult<RowStream>;
}

pub trait VariantsBackend: Send + Sync {
    fn name(&self) -> &str;

    fn connect(&self) -> StorageResult<Box<dyn BackendConnection>>;
}

/// Turns the rows of one variant into an item.
pub type Decoder<T> = Arc<dyn Fn(&[RawRow]) -> StorageResult<T> + Send + Sync>;

fn matched_indexes(rows: &[RawRow]) -> Vec<usize> {
    rows.iter()
        .filter(|r| r.allele_index >= 0)
        .map(|r| r.allele_index as usize)
        .collect()
}

pub fn summary_decoder(codec: BlobCodec) -> Decoder<SummaryVariant> {
    Arc::new(move |rows: &[RawRow]| {
        let first = rows
            .first()
            .ok_or_else(|| StorageError::Deserialization("empty row group".into()))?;
        let mut variant = codec.deserialize_summary(&first.summary_data)?;
        variant.set_matched_alleles(matched_indexes(rows));
        Ok(variant)
    })
}

pub fn family_decoder(
    codec: BlobCodec,
    families: Arc<FamiliesData>,
) -> Decoder<FamilyVariant> {
    Arc::new(move |rows: &[RawRow]| {
        let first = rows
            .first()
            .ok_or_else(|| StorageError::Deserialization("empty row group".into()))?;
        let family_data = first.family_data.as_deref().ok_or_else(|| {
            StorageError::Deserialization(format!(
                "row {}:{} has no family data",
                first.bucket_index, first.summary_index
            ))
        })?;
        let summary = codec.deserialize_summary(&first.summary_data)?;
        let mut variant = codec.deserialize_family(summary, family_data, &families)?;
        variant.set_matched_alleles(matched_indexes(rows));
        Ok(variant)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerOutcome {
    Completed { rows: usize },
    Failed(String),
    Cancelled,
    TimedOut,
}

/// What one runner contributed to a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerReport {
    pub backend: String,
    pub outcome: RunnerOutcome,
}

impl RunnerReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunnerOutcome::Completed { .. })
    }
}

impl Display for RunnerReport {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match &self.outcome {
            RunnerOutcome::Completed { rows } => write!(f, "{}: completed ({} rows)", self.backend, rows),
            RunnerOutcome::Failed(reason) => write!(f, "{}: failed ({})", self.backend, reason),
            RunnerOutcome::Cancelled => write!(f, "{}: cancelled", self.backend),
            RunnerOutcome::TimedOut => write!(f, "{}: timed out", self.backend),
        }
    }
}

enum Emit {
    Sent,
    Skipped,
    Disconnected,
}

pub struct QueryRunner<T: QueryItem> {
    backend: Arc<dyn VariantsBackend>,
    query:   Arc<CompiledQuery>,
    decoder: Decoder<T>,
}

impl<T: QueryItem> QueryRunner<T> {
    pub fn new(
        backend: Arc<dyn VariantsBackend>,
        query: Arc<CompiledQuery>,
        decoder: Decoder<T>,
    ) -> Self {
        Self {
            backend,
            query,
            decoder,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    fn emit(
        &self,
        rows: &[RawRow],
        sender: &Sender<T>,
    ) -> Emit {
        let item = match (self.decoder)(rows) {
            Ok(item) => item,
            Err(e) => {
                warn!("{}: skipping row: {}", self.backend_name(), e);
                return Emit::Skipped;
            },
        };
        match item.residual(self.query.filters()) {
            Some(item) => {
                if sender.send(item).is_ok() {
                    Emit::Sent
                }
                else {
                    Emit::Disconnected
                }
            },
            None => Emit::Skipped,
        }
    }

    fn report(
        &self,
        outcome: RunnerOutcome,
    ) -> RunnerReport {
        RunnerReport {
            backend: self.backend_name().to_string(),
            outcome,
        }
    }

    fn failed(
        &self,
        error: StorageError,
    ) -> RunnerReport {
        warn!("Runner for {} failed: {}", self.backend_name(), error);
        self.report(RunnerOutcome::Failed(error.to_string()))
    }

    /// Executes the query to completion, to the limit, or until `closed`
    /// is raised or the receiving side goes away.
    pub fn run(
        self,
        sender: &Sender<T>,
        closed: &AtomicBool,
    ) -> RunnerReport {
        let mut connection = match self.backend.connect() {
            Ok(connection) => connection,
            Err(e) => return self.failed(e),
        };
        let limit = self.query.limit();
        let total = self.query.batches().len();
        let mut produced = 0usize;

        for (i, batch) in self.query.batches().iter().enumerate() {
            if closed.load(Ordering::Acquire) {
                return self.report(RunnerOutcome::Cancelled);
            }
            debug!(
                "{}: sub-query {}/{} {:?}",
                self.backend_name(),
                i + 1,
                total,
                batch
            );
            let stream = match connection.execute(&self.query, batch) {
                Ok(stream) => stream,
                Err(e) => return self.failed(e),
            };

            let mut group: Vec<RawRow> = Vec::new();
            for row in stream {
                if closed.load(Ordering::Acquire) {
                    return self.report(RunnerOutcome::Cancelled);
                }
                let row = match row {
                    Ok(row) => row,
                    Err(e) if e.is_row_level() => {
                        warn!("{}: skipping row: {}", self.backend_name(), e);
                        continue;
                    },
                    Err(e) => return self.failed(e),
                };
                let new_variant = group
                    .last()
                    .is_some_and(|last| last.variant_key() != row.variant_key());
                if new_variant {
                    let rows = std::mem::take(&mut group);
                    match self.emit(&rows, sender) {
                        Emit::Sent => produced += 1,
                        Emit::Skipped => {},
                        Emit::Disconnected => return self.report(RunnerOutcome::Cancelled),
                    }
                    if limit.is_some_and(|l| produced >= l) {
                        break;
                    }
                }
                group.push(row);
            }
            if !group.is_empty() && !limit.is_some_and(|l| produced >= l) {
                match self.emit(&group, sender) {
                    Emit::Sent => produced += 1,
                    Emit::Skipped => {},
                    Emit::Disconnected => return self.report(RunnerOutcome::Cancelled),
                }
            }
            if limit.is_some_and(|l| produced >= l) {
                debug!("{}: reached limit of {} items", self.backend_name(), produced);
                break;
            }
        }
        self.report(RunnerOutcome::Completed { rows: produced })
    }
}
