use std::fmt::Display;
use std::str::FromStr;

use polars::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::StorageError;
use crate::io::partition::PartitionDescriptor;

macro_rules! column_enum {
    (
        $(#[$meta: meta])*
        $name: ident {
            $($variant: ident => $label: literal : $dtype: expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the column name.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn dtype(&self) -> DataType {
                match self {
                    $($name::$variant => $dtype),+
                }
            }

            pub fn colnames() -> Vec<&'static str> {
                Self::ALL.iter().map(|c| c.as_str()).collect()
            }

            pub fn has_name(name: &str) -> bool {
                Self::ALL.iter().any(|c| c.as_str() == name)
            }

            /// Returns the Polars schema of the base columns.
            pub fn schema() -> Schema {
                Schema::from_iter(
                    Self::ALL
                        .iter()
                        .map(|c| (PlSmallStr::from(c.as_str()), c.dtype())),
                )
            }

            #[inline(always)]
            pub fn col(&self) -> Expr {
                col(self.as_str())
            }
        }
    };
}

fn string_list() -> DataType {
    DataType::List(Box::new(DataType::String))
}

column_enum! {
    /// Columns of a summary allele row.
    SummaryColumns {
        BucketIndex => "bucket_index": DataType::Int32,
        SummaryIndex => "summary_index": DataType::Int32,
        AlleleIndex => "allele_index": DataType::Int32,
        SjIndex => "sj_index": DataType::Int64,
        Chromosome => "chromosome": DataType::String,
        Position => "position": DataType::UInt32,
        EndPosition => "end_position": DataType::UInt32,
        EffectGeneSymbols => "effect_gene_symbols": string_list(),
        EffectTypes => "effect_types": string_list(),
        VariantType => "variant_type": DataType::Int8,
        TransmissionType => "transmission_type": DataType::Int8,
        Reference => "reference": DataType::String,
        AfAlleleCount => "af_allele_count": DataType::Int32,
        AfAlleleFreq => "af_allele_freq": DataType::Float64,
        AfParentsCalledCount => "af_parents_called_count": DataType::Int32,
        AfParentsCalledPercent => "af_parents_called_percent": DataType::Float64,
        SeenAsDenovo => "seen_as_denovo": DataType::Boolean,
        SeenInStatus => "seen_in_status": DataType::Int8,
        FamilyVariantsCount => "family_variants_count": DataType::Int32,
        FamilyAllelesCount => "family_alleles_count": DataType::Int32,
        SummaryVariantData => "summary_variant_data": DataType::Binary,
    }
}

column_enum! {
    /// Columns of a family allele row.
    FamilyColumns {
        BucketIndex => "bucket_index": DataType::Int32,
        SummaryIndex => "summary_index": DataType::Int32,
        AlleleIndex => "allele_index": DataType::Int32,
        SjIndex => "sj_index": DataType::Int64,
        FamilyIndex => "family_index": DataType::Int32,
        FamilyId => "family_id": DataType::String,
        IsDenovo => "is_denovo": DataType::Boolean,
        AlleleInSexes => "allele_in_sexes": DataType::Int8,
        AlleleInStatuses => "allele_in_statuses": DataType::Int8,
        AlleleInRoles => "allele_in_roles": DataType::Int32,
        InheritanceInMembers => "inheritance_in_members": DataType::Int16,
        AlleleInMembers => "allele_in_members": string_list(),
        FamilyVariantData => "family_variant_data": DataType::Binary,
    }
}

column_enum! {
    /// Columns of the pedigree table.
    PedigreeColumns {
        FamilyId => "family_id": DataType::String,
        PersonId => "person_id": DataType::String,
        DadId => "dad_id": DataType::String,
        MomId => "mom_id": DataType::String,
        Sex => "sex": DataType::Int8,
        Status => "status": DataType::Int8,
        Role => "role": DataType::Int32,
        SampleId => "sample_id": DataType::String,
        Generated => "generated": DataType::Boolean,
        Layout => "layout": DataType::String,
        NotSequenced => "not_sequenced": DataType::Boolean,
    }
}

column_enum! {
    /// Columns of the key/value meta table.
    MetaColumns {
        Key => "key": DataType::String,
        Value => "value": DataType::String,
    }
}

/// Type of an annotation attribute stored as its own summary column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    Float,
    Int,
    Str,
    Bool,
}

impl AnnotationType {
    pub fn dtype(&self) -> DataType {
        match self {
            AnnotationType::Float => DataType::Float64,
            AnnotationType::Int => DataType::Int64,
            AnnotationType::Str => DataType::String,
            AnnotationType::Bool => DataType::Boolean,
        }
    }

    /// Whether real-value range filters may target the column.
    pub fn is_numeric(&self) -> bool {
        matches!(self, AnnotationType::Float | AnnotationType::Int)
    }
}

impl Display for AnnotationType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let label = match self {
            AnnotationType::Float => "float",
            AnnotationType::Int => "int",
            AnnotationType::Str => "str",
            AnnotationType::Bool => "bool",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for AnnotationType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "float" | "float32" | "float64" | "double" => Ok(AnnotationType::Float),
            "int" | "int32" | "int64" => Ok(AnnotationType::Int),
            "str" | "string" => Ok(AnnotationType::Str),
            "bool" | "boolean" => Ok(AnnotationType::Bool),
            other => {
                Err(StorageError::SchemaMismatch(format!(
                    "unsupported annotation type {}",
                    other
                )))
            },
        }
    }
}

/// One annotation column of the summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AnnotationType,
}

impl AnnotationAttribute {
    pub fn new(
        name: impl Into<String>,
        kind: AnnotationType,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Full summary table schema: base columns, annotation columns (skipping
/// names already taken by base columns), partition columns.
pub fn summary_schema(
    descriptor: &PartitionDescriptor,
    annotation: &[AnnotationAttribute],
) -> Schema {
    let mut schema = SummaryColumns::schema();
    for attribute in annotation {
        if !SummaryColumns::has_name(&attribute.name) {
            schema.with_column(attribute.name.as_str().into(), attribute.kind.dtype());
        }
    }
    for (name, dtype) in descriptor.dataset_summary_partition() {
        schema.with_column(name.into(), dtype);
    }
    schema
}

/// Full family table schema: base columns and partition columns.
pub fn family_schema(descriptor: &PartitionDescriptor) -> Schema {
    let mut schema = FamilyColumns::schema();
    for (name, dtype) in descriptor.dataset_family_partition() {
        schema.with_column(name.into(), dtype);
    }
    schema
}

/// `(name, dtype)` pairs of a schema as recorded in the meta table.
pub fn describe_schema(schema: &Schema) -> Vec<(String, String)> {
    schema
        .iter()
        .map(|(name, dtype)| (name.to_string(), dtype.to_string()))
        .collect()
}
