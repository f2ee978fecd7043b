//! Storage instance facade.
//!
//! [`ParquetGenotypeStorage`] opens one imported dataset: the partition
//! description, the meta table and the pedigree are read once at open, and
//! every query compiles against them. [`StudyGroup`] fans a query out to
//! several storages, one runner per child.

use std::fs;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{
    debug,
    info,
    warn,
};
use polars::prelude::Schema;
use serde::{
    Deserialize,
    Serialize,
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
use crate::io::meta::DatasetMeta;
use crate::io::partition::{
    ChromLengths,
    PartitionDescriptor,
    PARTITION_DESCRIPTION_FILE,
};
use crate::io::pedigree::{
    pedigree_path,
    read_pedigree,
};
use crate::io::schema::{
    summary_schema,
    AnnotationAttribute,
};
use crate::io::serializer::BlobCodec;
use crate::query::backend::ParquetBackend;
use crate::query::builder::{
    CompiledQuery,
    QueryBuilder,
};
use crate::query::filters::VariantQuery;
use crate::query::result::{
    MergeMode,
    QueryResult,
    DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::query::runner::{
    family_decoder,
    summary_decoder,
    QueryRunner,
    VariantsBackend,
};
use crate::{
    getter_fn,
    with_field_fn,
};

/// Options of one storage instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Dataset directory written by a
    /// [`VariantsParquetWriter`](crate::io::VariantsParquetWriter).
    pub root:                PathBuf,
    /// Name used in logs and runner reports. Defaults to the directory name.
    pub id:                  Option<String>,
    pub queue_capacity:      usize,
    pub shutdown_timeout_ms: u64,
    /// Backend rows requested per item of the caller's limit.
    pub over_fetch:          usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root:                PathBuf::new(),
            id:                  None,
            queue_capacity:      DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
            over_fetch:          10,
        }
    }
}

impl StorageConfig {
    with_field_fn!(id, Option<String>);
    with_field_fn!(queue_capacity, usize);
    with_field_fn!(shutdown_timeout_ms, u64);
    with_field_fn!(over_fetch, usize);

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Reads a config from a TOML file. A relative `root` is resolved against
    /// the file's directory.
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read storage config {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse storage config {}", path.display()))?;
        if config.root.is_relative() {
            if let Some(parent) = path.parent() {
                config.root = parent.join(&config.root);
            }
        }
        Ok(config)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn storage_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| {
            self.root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.root.display().to_string())
        })
    }
}

/// Reference genome facts owned by one open storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenomeCache {
    chrom_lengths: ChromLengths,
}

impl GenomeCache {
    getter_fn!(chrom_lengths, ChromLengths);

    pub fn new(chrom_lengths: ChromLengths) -> Self {
        Self { chrom_lengths }
    }

    pub fn chrom_length(
        &self,
        chrom: &str,
    ) -> Option<u64> {
        self.chrom_lengths.get(chrom).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.chrom_lengths.is_empty()
    }
}

pub struct ParquetGenotypeStorage {
    config:         StorageConfig,
    id:             String,
    descriptor:     PartitionDescriptor,
    meta:           DatasetMeta,
    codec:          BlobCodec,
    annotation:     Vec<AnnotationAttribute>,
    families:       Arc<FamiliesData>,
    summary_schema: Schema,
    genome:         Option<GenomeCache>,
    backend:        Arc<ParquetBackend>,
    closed:         bool,
}

impl ParquetGenotypeStorage {
    getter_fn!(config, StorageConfig);
    getter_fn!(descriptor, PartitionDescriptor);
    getter_fn!(meta, DatasetMeta);
    getter_fn!(annotation, Vec<AnnotationAttribute>);
    getter_fn!(families, Arc<FamiliesData>);
    getter_fn!(summary_schema, Schema);

    /// Opens a dataset. Every configuration and schema problem is reported
    /// here, before any query runs.
    pub fn open(config: StorageConfig) -> StorageResult<Self> {
        let root = config.root.clone();
        if !root.is_dir() {
            return Err(StorageError::Configuration(format!(
                "storage root {} is not a directory",
                root.display()
            )));
        }
        let meta = DatasetMeta::read(&root)?;
        let descriptor = if root.join(PARTITION_DESCRIPTION_FILE).exists() {
            PartitionDescriptor::read_sidecar(&root)?
        }
        else if let Some(descriptor) = meta.partition_descriptor()? {
            descriptor
        }
        else {
            return Err(StorageError::Configuration(format!(
                "{} has neither {} nor a recorded partition description",
                root.display(),
                PARTITION_DESCRIPTION_FILE
            )));
        };
        descriptor.validate()?;

        meta.validate_query_columns()?;
        let codec = meta
            .codec()
            .map_err(|e| StorageError::SchemaMismatch(e.to_string()))?;
        let annotation = meta.annotation()?;

        let families = if pedigree_path(&root).exists() {
            read_pedigree(&root)?
        }
        else {
            warn!("{} has no pedigree table", root.display());
            FamiliesData::default()
        };
        let genome = meta.chrom_lengths()?.map(GenomeCache::new);
        let summary_schema = summary_schema(&descriptor, &annotation);
        let id = config.storage_id();

        info!(
            "Opened storage {} at {} ({} families, {} codec)",
            id,
            root.display(),
            families.len(),
            codec
        );
        Ok(Self {
            backend: Arc::new(ParquetBackend::new(id.clone(), root)),
            config,
            id,
            descriptor,
            meta,
            codec,
            annotation,
            families: Arc::new(families),
            summary_schema,
            genome,
            closed: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn codec(&self) -> BlobCodec {
        self.codec
    }

    pub fn genome(&self) -> Option<&GenomeCache> {
        self.genome.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drops the genome cache. The storage must be reopened to query again.
    pub fn close(&mut self) {
        if !self.closed {
            self.genome = None;
            self.closed = true;
            info!("Closed storage {}", self.id);
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            Err(StorageError::Configuration(format!(
                "storage {} is closed",
                self.id
            )))
        }
        else {
            Ok(())
        }
    }

    pub fn query_builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.descriptor, &self.families, &self.summary_schema)
            .with_chrom_lengths(self.genome.as_ref().map(GenomeCache::chrom_lengths))
            .with_over_fetch(self.config.over_fetch)
    }

    pub fn compile_summary_query(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<CompiledQuery> {
        self.ensure_open()?;
        self.query_builder().build_summary_query(query)
    }

    pub fn compile_family_query(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<CompiledQuery> {
        self.ensure_open()?;
        self.query_builder().build_family_query(query)
    }

    pub(crate) fn summary_runner(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<QueryRunner<SummaryVariant>> {
        let compiled = self.compile_summary_query(query)?;
        Ok(QueryRunner::new(
            self.backend.clone() as Arc<dyn VariantsBackend>,
            Arc::new(compiled),
            summary_decoder(self.codec),
        ))
    }

    pub(crate) fn family_runner(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<QueryRunner<FamilyVariant>> {
        let compiled = self.compile_family_query(query)?;
        Ok(QueryRunner::new(
            self.backend.clone() as Arc<dyn VariantsBackend>,
            Arc::new(compiled),
            family_decoder(self.codec, self.families.clone()),
        ))
    }

    pub fn query_summary_variants(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<QueryResult<SummaryVariant>> {
        let runner = self.summary_runner(query)?;
        debug!("{}: summary query {:?}", self.id, query);
        Ok(QueryResult::new(vec![runner], query.limit)
            .with_queue_capacity(self.config.queue_capacity)
            .with_shutdown_timeout(self.config.shutdown_timeout()))
    }

    pub fn query_variants(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<QueryResult<FamilyVariant>> {
        let runner = self.family_runner(query)?;
        debug!("{}: family query {:?}", self.id, query);
        Ok(QueryResult::new(vec![runner], query.limit)
            .with_queue_capacity(self.config.queue_capacity)
            .with_shutdown_timeout(self.config.shutdown_timeout()))
    }
}

/// Several storages queried as one study.
pub struct StudyGroup {
    id:               String,
    studies:          Vec<ParquetGenotypeStorage>,
    queue_capacity:   usize,
    shutdown_timeout: Duration,
}

impl StudyGroup {
    pub fn new(
        id: impl Into<String>,
        studies: Vec<ParquetGenotypeStorage>,
    ) -> Self {
        Self {
            id: id.into(),
            studies,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Opens every child. Fails on the first child that can not be opened.
    pub fn open(
        id: impl Into<String>,
        configs: Vec<StorageConfig>,
    ) -> StorageResult<Self> {
        let studies = configs
            .into_iter()
            .map(ParquetGenotypeStorage::open)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Self::new(id, studies))
    }

    with_field_fn!(queue_capacity, usize);
    with_field_fn!(shutdown_timeout, Duration);

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn studies(&self) -> &[ParquetGenotypeStorage] {
        &self.studies
    }

    /// Summary variants of every child, counters of a variant reported by
    /// several children combined into one record.
    pub fn query_summary_variants(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<QueryResult<SummaryVariant>> {
        let runners = self
            .studies
            .iter()
            .map(|s| s.summary_runner(query))
            .collect::<StorageResult<Vec<_>>>()?;
        debug!("{}: summary query over {} studies", self.id, runners.len());
        Ok(QueryResult::new(runners, query.limit)
            .with_mode(MergeMode::Combine)
            .with_queue_capacity(self.queue_capacity)
            .with_shutdown_timeout(self.shutdown_timeout))
    }

    pub fn query_variants(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<QueryResult<FamilyVariant>> {
        let runners = self
            .studies
            .iter()
            .map(|s| s.family_runner(query))
            .collect::<StorageResult<Vec<_>>>()?;
        debug!("{}: family query over {} studies", self.id, runners.len());
        Ok(QueryResult::new(runners, query.limit)
            .with_queue_capacity(self.queue_capacity)
            .with_shutdown_timeout(self.shutdown_timeout))
    }

    pub fn close(&mut self) {
        self.studies.iter_mut().for_each(ParquetGenotypeStorage::close);
    }
}
