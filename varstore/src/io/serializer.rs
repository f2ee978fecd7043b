//! Blob codecs for the `summary_variant_data` / `family_variant_data`
//! columns.
//!
//! The codec is picked once per dataset and recorded in the meta table. The
//! summary blob carries the whole [`SummaryVariant`]; the family blob carries
//! only the family-specific part and is rebuilt on top of the decoded
//! summary.

use std::fmt::Display;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::{
    FamiliesData,
    FamilyVariant,
    Genotype,
    Inheritance,
    SummaryVariant,
};
use crate::errors::{
    StorageError,
    StorageResult,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobCodec {
    #[default]
    Json,
    Binary,
}

/// Family-specific part of a family variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FamilyVariantRecord {
    family_id:    String,
    family_index: Option<i32>,
    genotype:     Genotype,
    inheritance:  Vec<Vec<Inheritance>>,
}

impl BlobCodec {
    pub fn serialize_summary(
        &self,
        variant: &SummaryVariant,
    ) -> StorageResult<Vec<u8>> {
        self.encode(variant)
    }

    pub fn serialize_family(
        &self,
        variant: &FamilyVariant,
    ) -> StorageResult<Vec<u8>> {
        let record = FamilyVariantRecord {
            family_id:    variant.family_id().to_string(),
            family_index: variant.family_index(),
            genotype:     variant.genotype().clone(),
            inheritance:  variant.inheritance_table().to_vec(),
        };
        self.encode(&record)
    }

    pub fn deserialize_summary(
        &self,
        data: &[u8],
    ) -> StorageResult<SummaryVariant> {
        let mut variant: SummaryVariant = self.decode(data)?;
        variant.set_matched_alleles(Vec::new());
        Ok(variant)
    }

    /// Rebuilds a family variant from its blob on top of the decoded summary
    /// variant. The family must be known to `families`.
    pub fn deserialize_family(
        &self,
        summary: SummaryVariant,
        data: &[u8],
        families: &FamiliesData,
    ) -> StorageResult<FamilyVariant> {
        let record: FamilyVariantRecord = self.decode(data)?;
        let family = families.get(&record.family_id).ok_or_else(|| {
            StorageError::Deserialization(format!(
                "family {} is not in the pedigree",
                record.family_id
            ))
        })?;
        let mut variant = FamilyVariant::try_new(summary, family.clone(), record.genotype)
            .and_then(|fv| fv.with_inheritance_table(record.inheritance))
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        if let Some(index) = record.family_index {
            variant.set_family_index(index);
        }
        Ok(variant)
    }

    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> StorageResult<Vec<u8>> {
        match self {
            BlobCodec::Json => Ok(serde_json::to_vec(value)?),
            BlobCodec::Binary => Ok(bincode::serialize(value)?),
        }
    }

    fn decode<T: for<'de> Deserialize<'de>>(
        &self,
        data: &[u8],
    ) -> StorageResult<T> {
        match self {
            BlobCodec::Json => Ok(serde_json::from_slice(data)?),
            BlobCodec::Binary => Ok(bincode::deserialize(data)?),
        }
    }
}

impl Display for BlobCodec {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            BlobCodec::Json => write!(f, "json"),
            BlobCodec::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for BlobCodec {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(BlobCodec::Json),
            "binary" | "bincode" => Ok(BlobCodec::Binary),
            other => {
                Err(StorageError::SchemaMismatch(format!(
                    "unknown blob codec {}",
                    other
                )))
            },
        }
    }
}
