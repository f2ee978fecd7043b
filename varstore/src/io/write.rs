use std::fs::{
    self,
    File,
};
use std::path::{
    Path,
    PathBuf,
};

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use itertools::Itertools;
use log::{
    debug,
    error,
    info,
    warn,
};
use polars::io::parquet::write::BatchedWriter;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::{
    AttrValue,
    BitmaskEnum,
    FamiliesData,
    FamilyAllele,
    FamilyVariant,
    SummaryAllele,
    SummaryVariant,
};
use crate::errors::{
    StorageError,
    StorageResult,
};
use crate::io::meta::DatasetMeta;
use crate::io::partition::{
    ChromLengths,
    Partition,
    PartitionDescriptor,
};
use crate::io::pedigree::write_pedigree;
use crate::io::schema::{
    family_schema,
    summary_schema,
    AnnotationAttribute,
    AnnotationType,
};
use crate::io::serializer::BlobCodec;
use crate::with_field_fn;

/// Upper bound (exclusive) of a bucket index.
pub const MAX_BUCKET_INDEX: u32 = 1_000_000;
/// Upper bound (exclusive) of the allele count of one variant.
pub const MAX_ALLELES: usize = 10_000;

pub const SUMMARY_DIR: &str = "summary";
pub const FAMILY_DIR: &str = "family";

/// `(bucket_index * 1e9 + summary_index) * 1e4`; the allele index is added
/// per row.
pub fn sj_base_index(
    bucket_index: u32,
    summary_index: i32,
) -> i64 {
    (bucket_index as i64 * 1_000_000_000 + summary_index as i64) * MAX_ALLELES as i64
}

/// Options of one import job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Rows buffered per partition file before a row group is flushed.
    pub row_group_size:    usize,
    /// Disjoint bucket per parallel import job.
    pub bucket_index:      u32,
    /// Store reference alleles and all-reference family variants.
    pub include_reference: bool,
    pub codec:             BlobCodec,
    /// Annotation attributes stored as their own summary columns.
    pub annotation:        Vec<AnnotationAttribute>,
    /// Write the sidecar, pedigree and meta tables on close.
    pub write_metadata:    bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            row_group_size:    10_000,
            bucket_index:      1,
            include_reference: false,
            codec:             BlobCodec::Json,
            annotation:        Vec::new(),
            write_metadata:    true,
        }
    }
}

impl WriterConfig {
    with_field_fn!(row_group_size, usize);
    with_field_fn!(bucket_index, u32);
    with_field_fn!(include_reference, bool);
    with_field_fn!(codec, BlobCodec);
    with_field_fn!(annotation, Vec<AnnotationAttribute>);
    with_field_fn!(write_metadata, bool);
}

/// Parquet file that is appended to row by row and flushed one row group at
/// a time.
pub struct ContinuousParquetWriter {
    path:           PathBuf,
    schema:         Schema,
    writer:         BatchedWriter<File>,
    buffer:         Vec<Vec<AnyValue<'static>>>,
    row_group_size: usize,
    rows_written:   usize,
    closed:         bool,
}

impl ContinuousParquetWriter {
    /// Creates the file and its parent directories.
    pub fn try_new(
        path: &Path,
        schema: Schema,
        row_group_size: usize,
    ) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::partial_write(parent, e))?;
        }
        let file = File::create(path).map_err(|e| StorageError::partial_write(path, e))?;
        let writer = ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .with_row_group_size(Some(row_group_size))
            .batched(&schema)
            .map_err(|e| StorageError::partial_write(path, e))?;
        debug!("Created parquet writer {}", path.display());

        let buffer = (0..schema.len()).map(|_| Vec::new()).collect();
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer,
            buffer,
            row_group_size,
            rows_written: 0,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows waiting in the buffer.
    pub fn size(&self) -> usize {
        self.buffer.first().map_or(0, Vec::len)
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Appends one row given in schema order.
    pub fn append_row(
        &mut self,
        row: Vec<AnyValue<'static>>,
    ) -> StorageResult<()> {
        if row.len() != self.buffer.len() {
            return Err(StorageError::partial_write(
                &self.path,
                format!("row has {} values, schema has {}", row.len(), self.buffer.len()),
            ));
        }
        for (column, value) in self.buffer.iter_mut().zip(row) {
            column.push(value);
        }
        if self.size() >= self.row_group_size {
            debug!(
                "Flushing row group of {} rows to {}",
                self.size(),
                self.path.display()
            );
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.size() == 0 {
            return Ok(());
        }
        let columns = self
            .schema
            .iter()
            .zip(self.buffer.iter())
            .map(|((name, dtype), values)| {
                Series::from_any_values_and_dtype(name.clone(), values, dtype, false)
                    .map(Column::from)
            })
            .collect::<PolarsResult<Vec<_>>>()
            .map_err(|e| StorageError::partial_write(&self.path, e))?;
        let frame = DataFrame::new(columns).map_err(|e| StorageError::partial_write(&self.path, e))?;
        self.writer
            .write_batch(&frame)
            .map_err(|e| StorageError::partial_write(&self.path, e))?;

        self.rows_written += frame.height();
        self.buffer.iter_mut().for_each(Vec::clear);
        Ok(())
    }

    /// Flushes the remaining rows and finalizes the file. Further calls are
    /// no-ops.
    pub fn close(&mut self) -> StorageResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(
            "Closing parquet writer {} with {} buffered rows",
            self.path.display(),
            self.size()
        );
        self.flush()?;
        self.writer
            .finish()
            .map(|_| ())
            .map_err(|e| StorageError::partial_write(&self.path, e))
    }
}

impl Drop for ContinuousParquetWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}

fn opt_int32(value: Option<i64>) -> AnyValue<'static> {
    value.map_or(AnyValue::Null, |v| AnyValue::Int32(v as i32))
}

fn opt_float64(value: Option<f64>) -> AnyValue<'static> {
    value.map_or(AnyValue::Null, AnyValue::Float64)
}

fn string_list<'a, I>(values: I) -> AnyValue<'static>
where
    I: IntoIterator<Item = &'a str>, {
    let values = values.into_iter().collect_vec();
    AnyValue::List(Series::new(PlSmallStr::EMPTY, values))
}

fn annotation_value(
    allele: &SummaryAllele,
    attribute: &AnnotationAttribute,
) -> AnyValue<'static> {
    let value = allele.get_attribute(&attribute.name);
    match attribute.kind {
        AnnotationType::Float => opt_float64(value.and_then(AttrValue::as_f64)),
        AnnotationType::Int => value.and_then(AttrValue::as_i64).map_or(AnyValue::Null, AnyValue::Int64),
        AnnotationType::Bool => value.and_then(AttrValue::as_bool).map_or(AnyValue::Null, AnyValue::Boolean),
        AnnotationType::Str => {
            value
                .map(|v| AnyValue::StringOwned(v.to_string().into()))
                .unwrap_or(AnyValue::Null)
        },
    }
}

fn partition_values(
    partition: &Partition,
    columns: &[(&'static str, DataType)],
) -> Vec<AnyValue<'static>> {
    columns
        .iter()
        .map(|(name, dtype)| {
            let value = partition
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str());
            match (value, dtype) {
                (None, _) => AnyValue::Null,
                (Some(v), DataType::Int8) => v.parse::<i8>().map_or(AnyValue::Null, AnyValue::Int8),
                (Some(v), DataType::Int32) => v.parse::<i32>().map_or(AnyValue::Null, AnyValue::Int32),
                (Some(v), _) => AnyValue::StringOwned(v.into()),
            }
        })
        .collect()
}

/// Writes summary and family variants into a partitioned Parquet dataset.
///
/// Every allele row goes to the file of its partition; files are opened on
/// first use and kept open until [`close`](Self::close).
pub struct VariantsParquetWriter {
    root:           PathBuf,
    descriptor:     PartitionDescriptor,
    families:       FamiliesData,
    config:         WriterConfig,
    chrom_lengths:  Option<ChromLengths>,
    summary_schema: Schema,
    family_schema:  Schema,
    writers:        HashMap<PathBuf, ContinuousParquetWriter>,
    summary_index:  i32,
    family_index:   i32,
    closed:         bool,
}

impl VariantsParquetWriter {
    pub fn try_new(
        root: impl Into<PathBuf>,
        descriptor: PartitionDescriptor,
        families: FamiliesData,
        config: WriterConfig,
    ) -> StorageResult<Self> {
        if config.bucket_index >= MAX_BUCKET_INDEX {
            return Err(StorageError::Configuration(format!(
                "bucket index {} is not below {}",
                config.bucket_index, MAX_BUCKET_INDEX
            )));
        }
        if config.row_group_size == 0 {
            return Err(StorageError::Configuration(
                "row group size must be positive".into(),
            ));
        }
        descriptor.validate()?;

        let summary_schema = summary_schema(&descriptor, &config.annotation);
        let family_schema = family_schema(&descriptor);
        let root = root.into();
        info!(
            "Writing variants to {} (bucket {})",
            root.display(),
            config.bucket_index
        );

        Ok(Self {
            root,
            descriptor,
            families,
            config,
            chrom_lengths: None,
            summary_schema,
            family_schema,
            writers: HashMap::new(),
            summary_index: 0,
            family_index: 0,
            closed: false,
        })
    }

    /// Chromosome lengths recorded in the meta table.
    pub fn with_chrom_lengths(
        mut self,
        chrom_lengths: ChromLengths,
    ) -> Self {
        self.chrom_lengths = Some(chrom_lengths);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Number of open partition files.
    pub fn open_files(&self) -> usize {
        self.writers.len()
    }

    /// Writes one summary variant and its family variants.
    ///
    /// Family alleles are written first while the per-allele counters
    /// (`seen_in_status`, `seen_as_denovo`, `family_variants_count`,
    /// `family_alleles_count`) are collected; the summary alleles are then
    /// written with those counters, but only when at least one family allele
    /// was written.
    pub fn write(
        &mut self,
        mut summary: SummaryVariant,
        family_variants: Vec<FamilyVariant>,
    ) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::partial_write(&self.root, "writer is closed"));
        }
        let allele_count = summary.allele_count();
        if allele_count >= MAX_ALLELES {
            return Err(StorageError::partial_write(
                &self.root,
                format!("{} has too many alleles", summary.location()),
            ));
        }

        let summary_index = self.summary_index;
        let sj_base = sj_base_index(self.config.bucket_index, summary_index);
        summary.set_summary_index(summary_index);

        let mut seen_in_status = vec![0u32; allele_count];
        let mut seen_as_denovo = vec![false; allele_count];
        let mut family_variants_count = vec![0i64; allele_count];
        let mut written = 0usize;

        for mut fv in family_variants {
            self.family_index += 1;
            if fv.is_reference() && !self.config.include_reference {
                continue;
            }
            fv.summary_mut().set_summary_index(summary_index);
            fv.set_family_index(self.family_index);
            let blob = self.config.codec.serialize_family(&fv)?;

            let mut allele_indexes = Vec::new();
            if fv.is_unknown() || fv.is_reference() {
                allele_indexes.push(0);
                written += 1;
            }
            else if self.config.include_reference || fv.ref_allele().is_denovo() {
                allele_indexes.push(0);
            }
            allele_indexes.extend(fv.genotype().alt_alleles());

            for allele_index in allele_indexes {
                let Some(allele) = fv.allele(allele_index) else {
                    continue;
                };
                seen_in_status[allele_index] |= allele.allele_in_statuses();
                let is_denovo = allele.is_denovo();
                seen_as_denovo[allele_index] |= is_denovo;

                let partition = self.descriptor.family_partition(&allele, is_denovo);
                let row = self.family_row(&allele, &blob, sj_base, &partition);
                self.append(FAMILY_DIR, partition, row)?;

                family_variants_count[allele_index] += 1;
                written += 1;
            }
        }

        if written > 0 {
            let alt = 1..allele_count;
            summary.update_attributes(
                [
                    (
                        "seen_in_status",
                        seen_in_status[alt.clone()]
                            .iter()
                            .map(|v| AttrValue::Int(*v as i64))
                            .collect_vec(),
                    ),
                    (
                        "seen_as_denovo",
                        seen_as_denovo[alt.clone()]
                            .iter()
                            .map(|v| AttrValue::Bool(*v))
                            .collect_vec(),
                    ),
                    (
                        "family_variants_count",
                        family_variants_count[alt.clone()]
                            .iter()
                            .map(|v| AttrValue::Int(*v))
                            .collect_vec(),
                    ),
                    (
                        "family_alleles_count",
                        family_variants_count[alt]
                            .iter()
                            .map(|v| AttrValue::Int(*v))
                            .collect_vec(),
                    ),
                ]
                .into_iter()
                .filter(|(_, values)| !values.is_empty())
                .map(|(name, values)| (name.to_string(), values))
                .collect(),
            );
            self.write_summary_variant(&summary, sj_base)?;
        }

        self.summary_index += 1;
        Ok(())
    }

    fn write_summary_variant(
        &mut self,
        summary: &SummaryVariant,
        sj_base: i64,
    ) -> StorageResult<()> {
        let blob = self.config.codec.serialize_summary(summary)?;
        let stored = if self.config.include_reference {
            summary.alleles()
        }
        else {
            summary.alt_alleles()
        };
        for allele in stored {
            let seen_as_denovo = allele
                .get_attribute("seen_as_denovo")
                .and_then(AttrValue::as_bool)
                .unwrap_or(false);
            let partition = self.descriptor.summary_partition(allele, seen_as_denovo);
            let row = self.summary_row(allele, &blob, sj_base, &partition);
            self.append(SUMMARY_DIR, partition, row)?;
        }
        Ok(())
    }

    fn summary_row(
        &self,
        allele: &SummaryAllele,
        blob: &[u8],
        sj_base: i64,
        partition: &Partition,
    ) -> Vec<AnyValue<'static>> {
        let count = |name: &str| allele.get_attribute(name).and_then(AttrValue::as_i64);
        let effects = allele.effects();

        let mut row = vec![
            AnyValue::Int32(self.config.bucket_index as i32),
            AnyValue::Int32(allele.summary_index()),
            AnyValue::Int32(allele.allele_index() as i32),
            AnyValue::Int64(sj_base + allele.allele_index() as i64),
            AnyValue::StringOwned(allele.chromosome().as_str().into()),
            AnyValue::UInt32(allele.position()),
            allele
                .end_position()
                .map_or(AnyValue::Null, AnyValue::UInt32),
            effects.map_or(AnyValue::Null, |e| {
                string_list(e.genes.iter().map(|g| g.symbol.as_str()))
            }),
            effects.map_or(AnyValue::Null, |e| {
                string_list(e.genes.iter().map(|g| g.effect.as_str()))
            }),
            match allele.alternative() {
                Some(_) => {
                    allele
                        .variant_type()
                        .map_or(AnyValue::Null, |t| AnyValue::Int8(t.value() as i8))
                },
                None => AnyValue::Null,
            },
            AnyValue::Int8(allele.transmission_type().value()),
            AnyValue::StringOwned(allele.reference().as_str().into()),
            opt_int32(count("af_allele_count")),
            opt_float64(allele.get_real("af_allele_freq")),
            opt_int32(count("af_parents_called_count")),
            opt_float64(allele.get_real("af_parents_called_percent")),
            allele
                .get_attribute("seen_as_denovo")
                .and_then(AttrValue::as_bool)
                .map_or(AnyValue::Null, AnyValue::Boolean),
            count("seen_in_status").map_or(AnyValue::Null, |v| AnyValue::Int8(v as i8)),
            opt_int32(count("family_variants_count")),
            opt_int32(count("family_alleles_count")),
            AnyValue::BinaryOwned(blob.to_vec()),
        ];
        row.extend(
            self.config
                .annotation
                .iter()
                .filter(|a| !crate::io::schema::SummaryColumns::has_name(&a.name))
                .map(|a| annotation_value(allele, a)),
        );
        row.extend(partition_values(
            partition,
            &self.descriptor.dataset_summary_partition(),
        ));
        row
    }

    fn family_row(
        &self,
        allele: &FamilyAllele<'_>,
        blob: &[u8],
        sj_base: i64,
        partition: &Partition,
    ) -> Vec<AnyValue<'static>> {
        let variant = allele.variant();
        let mut row = vec![
            AnyValue::Int32(self.config.bucket_index as i32),
            AnyValue::Int32(variant.summary().summary_index()),
            AnyValue::Int32(allele.allele_index() as i32),
            AnyValue::Int64(sj_base + allele.allele_index() as i64),
            AnyValue::Int32(variant.family_index().unwrap_or(-1)),
            AnyValue::StringOwned(allele.family_id().into()),
            AnyValue::Boolean(allele.is_denovo()),
            AnyValue::Int8(allele.allele_in_sexes() as i8),
            AnyValue::Int8(allele.allele_in_statuses() as i8),
            AnyValue::Int32(allele.allele_in_roles() as i32),
            AnyValue::Int16(allele.inheritance_mask() as i16),
            string_list(allele.allele_in_members()),
            AnyValue::BinaryOwned(blob.to_vec()),
        ];
        row.extend(partition_values(
            partition,
            &self.descriptor.dataset_family_partition(),
        ));
        row
    }

    fn append(
        &mut self,
        kind: &str,
        partition: Partition,
        row: Vec<AnyValue<'static>>,
    ) -> StorageResult<()> {
        let directory = PartitionDescriptor::partition_directory(&self.root.join(kind), &partition);
        let path = directory.join(PartitionDescriptor::partition_filename(
            kind,
            &partition,
            Some(self.config.bucket_index),
        ));

        let writer = match self.writers.entry(path) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let schema = if kind == FAMILY_DIR {
                    self.family_schema.clone()
                }
                else {
                    self.summary_schema.clone()
                };
                let writer =
                    ContinuousParquetWriter::try_new(entry.key(), schema, self.config.row_group_size)?;
                entry.insert(writer)
            },
        };
        writer.append_row(row)
    }

    /// Closes every partition file exactly once, then writes the dataset
    /// metadata. All files are closed even when some of them fail; the
    /// first failure is returned.
    pub fn close(&mut self) -> StorageResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let writers = self.writers.drain().map(|(_, w)| w).collect_vec();
        let file_count = writers.len();
        let results = writers
            .into_par_iter()
            .map(|mut writer| writer.close())
            .collect::<Vec<_>>();
        let mut first_error = results.into_iter().find_map(Result::err);

        if first_error.is_none() && self.config.write_metadata {
            first_error = self.write_metadata().err();
        }
        match first_error {
            Some(e) => {
                error!("Import into {} failed: {}", self.root.display(), e);
                Err(e)
            },
            None => {
                info!(
                    "Closed {} partition files under {} ({} summary variants)",
                    file_count,
                    self.root.display(),
                    self.summary_index
                );
                Ok(())
            },
        }
    }

    fn write_metadata(&self) -> StorageResult<()> {
        self.descriptor.write_sidecar(&self.root)?;
        write_pedigree(&self.root, &self.families)?;
        DatasetMeta::build(
            &self.descriptor,
            &self.summary_schema,
            &self.family_schema,
            &self.config.annotation,
            self.config.codec,
            self.chrom_lengths.as_ref(),
        )?
        .write(&self.root)
    }
}

impl Drop for VariantsParquetWriter {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Variants writer for {} dropped without close", self.root.display());
            if let Err(e) = self.close() {
                error!("Failed to close variants writer: {}", e);
            }
        }
    }
}
