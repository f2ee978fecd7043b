//! Key/value meta table describing a dataset: partition description, table
//! schemas, annotation columns, blob codec and chromosome lengths.

use std::collections::BTreeMap;
use std::fs::{
    self,
    File,
};
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
    ChromLengths,
    PartitionDescriptor,
};
use crate::io::schema::{
    describe_schema,
    AnnotationAttribute,
    FamilyColumns,
    MetaColumns,
    SummaryColumns,
};
use crate::io::serializer::BlobCodec;

pub const META_DIR: &str = "meta";
pub const META_FILE: &str = "meta.parquet";

pub const PARTITION_DESCRIPTION_KEY: &str = "partition_description";
pub const SUMMARY_SCHEMA_KEY: &str = "summary_schema";
pub const FAMILY_SCHEMA_KEY: &str = "family_schema";
pub const ANNOTATION_SCHEMA_KEY: &str = "annotation_schema";
pub const BLOB_CODEC_KEY: &str = "blob_codec";
pub const CHROM_LENGTHS_KEY: &str = "chromosome_lengths";

/// Summary columns the query layer filters on or decodes.
const REQUIRED_SUMMARY: &[SummaryColumns] = &[
    SummaryColumns::AlleleIndex,
    SummaryColumns::SjIndex,
    SummaryColumns::Chromosome,
    SummaryColumns::Position,
    SummaryColumns::EndPosition,
    SummaryColumns::EffectGeneSymbols,
    SummaryColumns::EffectTypes,
    SummaryColumns::VariantType,
    SummaryColumns::AfAlleleCount,
    SummaryColumns::AfAlleleFreq,
    SummaryColumns::SummaryVariantData,
];

/// Family columns the query layer filters on or decodes.
const REQUIRED_FAMILY: &[FamilyColumns] = &[
    FamilyColumns::AlleleIndex,
    FamilyColumns::SjIndex,
    FamilyColumns::FamilyId,
    FamilyColumns::AlleleInSexes,
    FamilyColumns::AlleleInStatuses,
    FamilyColumns::AlleleInRoles,
    FamilyColumns::InheritanceInMembers,
    FamilyColumns::AlleleInMembers,
    FamilyColumns::FamilyVariantData,
];

pub fn meta_path(root: &Path) -> PathBuf {
    root.join(META_DIR).join(META_FILE)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetMeta {
    entries: BTreeMap<String, String>,
}

impl DatasetMeta {
    pub fn build(
        descriptor: &PartitionDescriptor,
        summary_schema: &Schema,
        family_schema: &Schema,
        annotation: &[AnnotationAttribute],
        codec: BlobCodec,
        chrom_lengths: Option<&ChromLengths>,
    ) -> StorageResult<Self> {
        let mut meta = Self::default();
        meta.insert(PARTITION_DESCRIPTION_KEY, descriptor.serialize()?);
        meta.insert(
            SUMMARY_SCHEMA_KEY,
            serde_json::to_string(&describe_schema(summary_schema))?,
        );
        meta.insert(
            FAMILY_SCHEMA_KEY,
            serde_json::to_string(&describe_schema(family_schema))?,
        );
        meta.insert(ANNOTATION_SCHEMA_KEY, serde_json::to_string(annotation)?);
        meta.insert(BLOB_CODEC_KEY, codec.to_string());
        if let Some(lengths) = chrom_lengths {
            meta.insert(CHROM_LENGTHS_KEY, serde_json::to_string(lengths)?);
        }
        Ok(meta)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write(
        &self,
        root: &Path,
    ) -> StorageResult<()> {
        let path = meta_path(root);
        let mut frame = DataFrame::new(vec![
            Column::new(
                MetaColumns::Key.as_str().into(),
                self.entries.keys().map(String::as_str).collect::<Vec<_>>(),
            ),
            Column::new(
                MetaColumns::Value.as_str().into(),
                self.entries.values().map(String::as_str).collect::<Vec<_>>(),
            ),
        ])
        .map_err(|e| StorageError::partial_write(&path, e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::partial_write(parent, e))?;
        }
        let file = File::create(&path).map_err(|e| StorageError::partial_write(&path, e))?;
        ParquetWriter::new(file)
            .finish(&mut frame)
            .map_err(|e| StorageError::partial_write(&path, e))?;
        debug!("Wrote {} meta entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Reads the meta table. A dataset without one yields an empty table.
    pub fn read(root: &Path) -> StorageResult<Self> {
        let path = meta_path(root);
        if !path.exists() {
            debug!("No meta table under {}", root.display());
            return Ok(Self::default());
        }
        let unreadable = |e: PolarsError| {
            StorageError::SchemaMismatch(format!("meta table {}: {}", path.display(), e))
        };
        let file = File::open(&path).map_err(|e| {
            StorageError::backend("parquet", format!("cannot open {}: {}", path.display(), e))
        })?;
        let frame = ParquetReader::new(file).finish().map_err(unreadable)?;
        let keys = frame
            .column(MetaColumns::Key.as_str())
            .and_then(|c| c.str().cloned())
            .map_err(unreadable)?;
        let values = frame
            .column(MetaColumns::Value.as_str())
            .and_then(|c| c.str().cloned())
            .map_err(unreadable)?;

        let entries = keys
            .into_iter()
            .zip(values.into_iter())
            .filter_map(|(k, v)| Some((k?.to_string(), v.unwrap_or_default().to_string())))
            .collect();
        Ok(Self { entries })
    }

    pub fn codec(&self) -> StorageResult<BlobCodec> {
        self.get(BLOB_CODEC_KEY)
            .map_or(Ok(BlobCodec::default()), str::parse)
    }

    pub fn annotation(&self) -> StorageResult<Vec<AnnotationAttribute>> {
        match self.get(ANNOTATION_SCHEMA_KEY) {
            Some(value) => Ok(serde_json::from_str(value)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn partition_descriptor(&self) -> StorageResult<Option<PartitionDescriptor>> {
        self.get(PARTITION_DESCRIPTION_KEY)
            .map(PartitionDescriptor::parse)
            .transpose()
    }

    pub fn chrom_lengths(&self) -> StorageResult<Option<ChromLengths>> {
        self.get(CHROM_LENGTHS_KEY)
            .map(|v| serde_json::from_str(v).map_err(StorageError::from))
            .transpose()
    }

    fn columns(
        &self,
        key: &str,
    ) -> StorageResult<Option<Vec<(String, String)>>> {
        self.get(key)
            .map(|v| serde_json::from_str(v).map_err(StorageError::from))
            .transpose()
    }

    pub fn summary_columns(&self) -> StorageResult<Option<Vec<(String, String)>>> {
        self.columns(SUMMARY_SCHEMA_KEY)
    }

    pub fn family_columns(&self) -> StorageResult<Option<Vec<(String, String)>>> {
        self.columns(FAMILY_SCHEMA_KEY)
    }

    /// Fails with `SchemaMismatch` when a recorded schema lacks a column the
    /// query layer relies on. Datasets without recorded schemas pass.
    pub fn validate_query_columns(&self) -> StorageResult<()> {
        fn check<'a>(
            table: &str,
            recorded: &[(String, String)],
            required: impl Iterator<Item = &'a str>,
        ) -> StorageResult<()> {
            let missing = required
                .filter(|name| !recorded.iter().any(|(n, _)| n == name))
                .collect::<Vec<_>>();
            if missing.is_empty() {
                Ok(())
            }
            else {
                Err(StorageError::SchemaMismatch(format!(
                    "{} table lacks columns: {}",
                    table,
                    missing.join(", ")
                )))
            }
        }

        if let Some(columns) = self.summary_columns()? {
            check(
                "summary",
                &columns,
                REQUIRED_SUMMARY.iter().map(|c| c.as_str()),
            )?;
        }
        if let Some(columns) = self.family_columns()? {
            check(
                "family",
                &columns,
                REQUIRED_FAMILY.iter().map(|c| c.as_str()),
            )?;
        }
        Ok(())
    }
}
