//! Query layer.
//!
//! - [`attributes`]: the boolean grammar of role, sex, status, inheritance
//!   and variant type filters.
//! - [`predicate`]: backend-agnostic predicate tree rendered as SQL or as
//!   Polars expressions.
//! - [`filters`]: the caller's [`VariantQuery`] and the residual in-process
//!   filter.
//! - [`builder`]: predicate compilation, partition heuristics and batches.
//! - [`runner`] / [`backend`]: backend connections and the Parquet backend.
//! - [`result`]: the concurrent merger.

pub mod attributes;
pub mod backend;
pub mod builder;
pub mod filters;
pub mod predicate;
pub mod result;
pub mod runner;


pub use attributes::AttributeQuery;
pub use backend::ParquetBackend;
pub use builder::{
    CompiledQuery,
    QueryBuilder,
    QueryHeuristics,
    QueryKind,
};
pub use filters::{
    CompiledFilters,
    RealAttrFilter,
    VariantQuery,
};
pub use predicate::Predicate;
pub use result::{
    MergeMode,
    QueryItem,
    QueryResult,
    QueryState,
};
pub use runner::{
    BackendConnection,
    QueryRunner,
    RawRow,
    RunnerOutcome,
    RunnerReport,
    VariantsBackend,
};
