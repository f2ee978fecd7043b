//! # varstore
//!
//! `varstore` stores per-family and population-level ("summary") genetic
//! variants in a partitioned Parquet layout and answers filtered queries
//! against it.
//!
//! ## Key Features
//!
//! * **Variant model**: [`SummaryVariant`] and [`FamilyVariant`] with a
//!   Mendelian trio classifier tagging every allele in every family member.
//! * **Partitioned storage**: [`VariantsParquetWriter`] routes every allele
//!   row to a region/family/frequency/coding partition file described by a
//!   [`PartitionDescriptor`].
//! * **Query compiler**: [`VariantQuery`] filters (regions, genes, effect
//!   types, frequencies, roles, inheritance, ...) compile into a
//!   backend-agnostic predicate tree rendered as SQL or as Polars
//!   expressions, with partition pruning.
//! * **Concurrent execution**: one runner per backend or child study, a
//!   bounded result queue, fingerprint deduplication, limits and cooperative
//!   cancellation through [`QueryResult`].
//!
//! Number of threads used by Polars can be configured with the
//! `VARSTORE_NUM_THREADS` environment variable.
//!
//! ## Structure
//!
//! * [`data_structs`]: variant, pedigree and enumeration types, regions and
//!   the inheritance classifier.
//! * [`io`]: partition descriptor, column schemas, blob codecs and writers.
//! * [`query`]: filter grammar, predicate builder, runners and the merger.
//! * [`storage`]: the storage instance facade and multi-study groups.
//!
//! ## Usage
//!
//! ```no_run
//! use varstore::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let storage = ParquetGenotypeStorage::open(StorageConfig::new("path/to/study"))?;
//!     let query = VariantQuery::default()
//!         .with_regions(vec!["chr1:1-1000000".parse()?])
//!         .with_inheritance(vec!["denovo".to_string()])
//!         .with_limit(Some(100));
//!
//!     for variant in storage.query_variants(&query)? {
//!         println!("{}", variant.fvuid());
//!     }
//!     Ok(())
//! }
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[ctor::ctor]
fn init() {
    if let Ok(n) = std::env::var("VARSTORE_NUM_THREADS") {
        std::env::set_var("POLARS_MAX_THREADS", n)
    }
}

pub mod data_structs;
pub mod errors;
pub mod io;
pub mod prelude;
pub mod query;
pub mod storage;
pub mod utils;

pub use crate::data_structs::{
    FamiliesData,
    Family,
    FamilyAllele,
    FamilyVariant,
    Inheritance,
    Person,
    Region,
    Role,
    Sex,
    Status,
    SummaryAllele,
    SummaryVariant,
};
pub use crate::errors::{
    StorageError,
    StorageResult,
};
pub use crate::io::{
    BlobCodec,
    PartitionDescriptor,
    VariantsParquetWriter,
    WriterConfig,
};
pub use crate::query::{
    QueryResult,
    VariantQuery,
};
pub use crate::storage::{
    GenomeCache,
    ParquetGenotypeStorage,
    StorageConfig,
    StudyGroup,
};
