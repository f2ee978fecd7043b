//! Variant and pedigree data model.
//!
//! - [`SummaryVariant`] / [`SummaryAllele`]: population-level alleles of one
//!   position with free-form annotation attributes.
//! - [`FamilyVariant`] / [`FamilyAllele`]: a summary variant instantiated
//!   against the genotype calls of one [`Family`].
//! - [`inheritance`]: the parents/child trio classifier.
//! - Bit-encoded enumerations ([`Role`], [`Sex`], [`Status`],
//!   [`Inheritance`], [`VariantType`]) shared with the storage columns and the
//!   query grammar.

mod allele;
mod enums;
mod family;
mod family_variant;
pub mod inheritance;
mod region;
mod variant;

#[cfg(test)]
mod tests;

pub use allele::{
    AlleleEffects,
    AttrValue,
    Attributes,
    EffectGene,
    SummaryAllele,
    VariantDetails,
};
pub use enums::{
    BitmaskEnum,
    Inheritance,
    Role,
    Sex,
    Status,
    TransmissionType,
    VariantType,
};
pub use family::{
    FamiliesData,
    Family,
    Person,
    Trio,
};
pub use family_variant::{
    FamilyAllele,
    FamilyVariant,
    Genotype,
};
pub use region::Region;
pub use variant::SummaryVariant;
