//! Storage layout of a variants dataset.
//!
//! ```text
//! root/
//!   _PARTITION_DESCRIPTION
//!   summary/region_bin=chr1_0/frequency_bin=1/summary_..._bucket_index_000001.parquet
//!   family/region_bin=chr1_0/family_bin=3/.../family_..._bucket_index_000001.parquet
//!   pedigree/pedigree.parquet
//!   meta/meta.parquet
//! ```
//!
//! - [`partition`]: partition descriptor, bin computation and directory naming.
//! - [`schema`]: column sets of the summary, family, pedigree and meta tables.
//! - [`serializer`]: blob codecs for the variant payload columns.
//! - [`write`]: the partitioned Parquet writer.
//! - [`pedigree`] / [`meta`]: the auxiliary tables.

pub mod meta;
pub mod partition;
pub mod pedigree;
pub mod schema;
pub mod serializer;
pub mod write;


pub use meta::DatasetMeta;
pub use partition::{
    ChromLengths,
    CodingBinConfig,
    FamilyBinConfig,
    FrequencyBinConfig,
    Partition,
    PartitionDescriptor,
    RegionBinConfig,
};
pub use pedigree::{
    read_pedigree,
    write_pedigree,
};
pub use schema::{
    AnnotationAttribute,
    AnnotationType,
    FamilyColumns,
    PedigreeColumns,
    SummaryColumns,
};
pub use serializer::BlobCodec;
pub use write::{
    ContinuousParquetWriter,
    VariantsParquetWriter,
    WriterConfig,
};
