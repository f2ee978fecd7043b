pub use crate::data_structs::{
    BitmaskEnum,
    FamiliesData,
    Family,
    FamilyAllele,
    FamilyVariant,
    Genotype,
    Inheritance,
    Person,
    Region,
    Role,
    Sex,
    Status,
    SummaryAllele,
    SummaryVariant,
    VariantType,
};
pub use crate::errors::{
    StorageError,
    StorageResult,
};
pub use crate::io::{
    AnnotationAttribute,
    AnnotationType,
    BlobCodec,
    ChromLengths,
    DatasetMeta,
    PartitionDescriptor,
    VariantsParquetWriter,
    WriterConfig,
};
pub use crate::query::{
    MergeMode,
    QueryResult,
    QueryState,
    RunnerOutcome,
    RunnerReport,
    VariantQuery,
};
pub use crate::storage::{
    GenomeCache,
    ParquetGenotypeStorage,
    StorageConfig,
    StudyGroup,
};
