//! Parquet backend: scans the partitioned dataset written by
//! [`VariantsParquetWriter`](crate::io::VariantsParquetWriter) with Polars.
//!
//! Files whose partition is excluded by the batch heuristics are never
//! opened. The remaining files are scanned lazily with the compiled
//! predicates and the needed columns pushed down to the reader. Family
//! queries join the surviving family rows with the summary rows on
//! `sj_index`. Rows are capped at the compiled limit.

use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use log::debug;
use polars::prelude::*;

use crate::errors::{
    StorageError,
    StorageResult,
};
use crate::io::partition::{
    Partition,
    PartitionDescriptor,
};
use crate::io::schema::{
    FamilyColumns,
    SummaryColumns,
};
use crate::io::write::{
    FAMILY_DIR,
    SUMMARY_DIR,
};
use crate::query::builder::{
    CompiledQuery,
    QueryHeuristics,
    QueryKind,
};
use crate::query::predicate::Predicate;
use crate::query::runner::{
    BackendConnection,
    RawRow,
    RowStream,
    VariantsBackend,
};

/// Parquet file of a dataset with the partition read back from its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFile {
    pub path:      PathBuf,
    pub partition: Partition,
}

fn collect_parquet(
    dir: &Path,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_parquet(&path, out)?;
        }
        else if path.extension().is_some_and(|e| e == "parquet") {
            out.push(path);
        }
    }
    Ok(())
}

/// Lists the Parquet files under `root/kind`, sorted by path.
pub fn list_partition_files(
    root: &Path,
    kind: &str,
) -> StorageResult<Vec<PartitionFile>> {
    let dir = root.join(kind);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    collect_parquet(&dir, &mut paths)
        .map_err(|e| StorageError::backend("parquet", format!("{}: {}", dir.display(), e)))?;
    paths.sort();
    paths
        .into_iter()
        .map(|path| {
            let relative = path.strip_prefix(&dir).unwrap_or(&path);
            let partition = PartitionDescriptor::path_to_partitions(relative)?;
            Ok(PartitionFile { path, partition })
        })
        .collect()
}

pub struct ParquetBackend {
    name: String,
    root: PathBuf,
}

impl ParquetBackend {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl VariantsBackend for ParquetBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> StorageResult<Box<dyn BackendConnection>> {
        if !self.root.is_dir() {
            return Err(StorageError::backend(
                &self.name,
                format!("{} is not a directory", self.root.display()),
            ));
        }
        Ok(Box::new(ParquetConnection {
            name:          self.name.clone(),
            summary_files: list_partition_files(&self.root, SUMMARY_DIR)?,
            family_files:  list_partition_files(&self.root, FAMILY_DIR)?,
        }))
    }
}

struct ParquetConnection {
    name:          String,
    summary_files: Vec<PartitionFile>,
    family_files:  Vec<PartitionFile>,
}

impl ParquetConnection {
    fn backend_error(
        &self,
        reason: impl ToString,
    ) -> StorageError {
        StorageError::backend(&self.name, reason)
    }

    /// Filtered and projected union of the accepted files, or `None` when
    /// every file was pruned.
    fn scan(
        &self,
        files: &[PartitionFile],
        batch: &QueryHeuristics,
        predicate: &Predicate,
        columns: &[&str],
    ) -> StorageResult<Option<LazyFrame>> {
        let accepted = files
            .iter()
            .filter(|f| batch.accepts(&f.partition))
            .collect::<Vec<_>>();
        debug!(
            "{}: scanning {}/{} files",
            self.name,
            accepted.len(),
            files.len()
        );
        if accepted.is_empty() {
            return Ok(None);
        }
        let filter = predicate.to_expr();
        let selection = columns.iter().map(|c| col(*c)).collect::<Vec<_>>();
        let frames = accepted
            .into_iter()
            .map(|f| {
                let frame = LazyFrame::scan_parquet(&f.path, ScanArgsParquet::default())
                    .map_err(|e| self.backend_error(format!("{}: {}", f.path.display(), e)))?;
                Ok(frame
                    .filter(filter.clone())
                    .select(selection.clone()))
            })
            .collect::<StorageResult<Vec<_>>>()?;
        concat(frames, UnionArgs::default())
            .map(Some)
            .map_err(|e| self.backend_error(e))
    }

    fn summary_frame(
        &self,
        query: &CompiledQuery,
        batch: &QueryHeuristics,
    ) -> StorageResult<Option<DataFrame>> {
        let columns = [
            SummaryColumns::BucketIndex.as_str(),
            SummaryColumns::SummaryIndex.as_str(),
            SummaryColumns::AlleleIndex.as_str(),
            SummaryColumns::SummaryVariantData.as_str(),
        ];
        let Some(frame) = self.scan(
            &self.summary_files,
            batch,
            &query.summary_predicate(batch),
            &columns,
        )?
        else {
            return Ok(None);
        };
        let sorted = frame.sort(
            columns[..3].to_vec(),
            SortMultipleOptions::default().with_maintain_order(true),
        );
        with_limit(sorted, query.limit())
            .collect()
            .map(Some)
            .map_err(|e| self.backend_error(e))
    }

    fn family_frame(
        &self,
        query: &CompiledQuery,
        batch: &QueryHeuristics,
        family: &Predicate,
    ) -> StorageResult<Option<DataFrame>> {
        let summary = self.scan(
            &self.summary_files,
            batch,
            &query.summary_predicate(batch),
            &[
                SummaryColumns::SjIndex.as_str(),
                SummaryColumns::AlleleIndex.as_str(),
                SummaryColumns::SummaryVariantData.as_str(),
            ],
        )?;
        let families = self.scan(
            &self.family_files,
            batch,
            family,
            &[
                FamilyColumns::BucketIndex.as_str(),
                FamilyColumns::SummaryIndex.as_str(),
                FamilyColumns::FamilyIndex.as_str(),
                FamilyColumns::SjIndex.as_str(),
                FamilyColumns::FamilyVariantData.as_str(),
            ],
        )?;
        let (Some(summary), Some(families)) = (summary, families) else {
            return Ok(None);
        };
        let sj_index = SummaryColumns::SjIndex.col();
        let sorted = families
            .join(
                summary,
                [sj_index.clone()],
                [sj_index],
                JoinArgs::new(JoinType::Inner),
            )
            .sort(
                [
                    FamilyColumns::BucketIndex.as_str(),
                    FamilyColumns::SummaryIndex.as_str(),
                    FamilyColumns::FamilyIndex.as_str(),
                    FamilyColumns::AlleleIndex.as_str(),
                ],
                SortMultipleOptions::default().with_maintain_order(true),
            );
        with_limit(sorted, query.limit())
            .collect()
            .map(Some)
            .map_err(|e| self.backend_error(e))
    }
}

/// Caps the rows of a sorted scan at the compiled limit.
fn with_limit(
    frame: LazyFrame,
    limit: Option<usize>,
) -> LazyFrame {
    match limit {
        Some(n) => frame.limit(IdxSize::try_from(n).unwrap_or(IdxSize::MAX)),
        None => frame,
    }
}

fn int_column<'a>(
    frame: &'a DataFrame,
    name: &str,
) -> StorageResult<&'a Int32Chunked> {
    frame
        .column(name)
        .and_then(|c| c.i32())
        .map_err(|e| StorageError::SchemaMismatch(format!("column {}: {}", name, e)))
}

fn binary_column<'a>(
    frame: &'a DataFrame,
    name: &str,
) -> StorageResult<&'a BinaryChunked> {
    frame
        .column(name)
        .and_then(|c| c.binary())
        .map_err(|e| StorageError::SchemaMismatch(format!("column {}: {}", name, e)))
}

/// Materializes the rows of a result frame in frame order.
fn frame_rows(
    frame: &DataFrame,
    kind: QueryKind,
) -> StorageResult<Vec<StorageResult<RawRow>>> {
    let bucket = int_column(frame, SummaryColumns::BucketIndex.as_str())?;
    let summary = int_column(frame, SummaryColumns::SummaryIndex.as_str())?;
    let allele = int_column(frame, SummaryColumns::AlleleIndex.as_str())?;
    let summary_data = binary_column(frame, SummaryColumns::SummaryVariantData.as_str())?;
    let (family_index, family_data) = match kind {
        QueryKind::Summary => (None, None),
        QueryKind::Family => {
            (
                Some(int_column(frame, FamilyColumns::FamilyIndex.as_str())?),
                Some(binary_column(frame, FamilyColumns::FamilyVariantData.as_str())?),
            )
        },
    };

    let rows = (0..frame.height())
        .map(|i| {
            let missing =
                |column: &str| StorageError::Deserialization(format!("row {} has null {}", i, column));
            Ok(RawRow {
                bucket_index:  bucket
                    .get(i)
                    .ok_or_else(|| missing("bucket_index"))?,
                summary_index: summary
                    .get(i)
                    .ok_or_else(|| missing("summary_index"))?,
                family_index:  family_index.and_then(|c| c.get(i)),
                allele_index:  allele
                    .get(i)
                    .ok_or_else(|| missing("allele_index"))?,
                summary_data:  summary_data
                    .get(i)
                    .ok_or_else(|| missing("summary_variant_data"))?
                    .to_vec(),
                family_data:   match family_data {
                    Some(column) => {
                        Some(
                            column
                                .get(i)
                                .ok_or_else(|| missing("family_variant_data"))?
                                .to_vec(),
                        )
                    },
                    None => None,
                },
            })
        })
        .collect();
    Ok(rows)
}

impl BackendConnection for ParquetConnection {
    fn execute(
        &mut self,
        query: &CompiledQuery,
        batch: &QueryHeuristics,
    ) -> StorageResult<RowStream> {
        let frame = match query.family_predicate(batch) {
            None => self.summary_frame(query, batch)?,
            Some(family) => self.family_frame(query, batch, &family)?,
        };
        let rows = match frame {
            Some(frame) => frame_rows(&frame, query.kind())?,
            None => Vec::new(),
        };
        debug!("{}: batch produced {} rows", self.name, rows.len());
        Ok(Box::new(rows.into_iter()))
    }
}
