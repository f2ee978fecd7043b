use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::StorageError;

/// Enumerations whose variants occupy one bit of an integer bitmask column.
pub trait BitmaskEnum: Copy + Sized + FromStr<Err = StorageError> + 'static {
    /// All variants, in declaration order.
    const ALL: &'static [Self];

    /// Bit value of the variant as stored on disk.
    fn value(&self) -> u32;

    /// Bitwise union of the given variants.
    fn mask<'a, I>(values: I) -> u32
    where
        I: IntoIterator<Item = &'a Self>, {
        values.into_iter().fold(0, |acc, v| acc | v.value())
    }

    /// Variants whose bits are set in `mask`.
    fn from_mask(mask: u32) -> Vec<Self> {
        Self::ALL
            .iter()
            .filter(|v| mask & v.value() != 0)
            .copied()
            .collect()
    }

    fn from_value(value: u32) -> Option<Self> {
        Self::ALL.iter().find(|v| v.value() == value).copied()
    }
}

macro_rules! string_serde {
    ($name: ident) => {
        impl Serialize for $name {
            fn serialize<S>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer, {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>, {
                let s = String::deserialize(deserializer)?;
                FromStr::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

macro_rules! bitmask_enum {
    (
        $(#[$meta: meta])*
        $name: ident {
            $($variant: ident = $value: expr => $label: literal $(| $alias: literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl BitmaskEnum for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn value(&self) -> u32 {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl $name {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl Display for $name {
            fn fmt(
                &self,
                f: &mut std::fmt::Formatter<'_>,
            ) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = StorageError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lowered = s.trim().to_lowercase();
                match lowered.as_str() {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(StorageError::Query(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }

        string_serde!($name);
    };
}

bitmask_enum! {
    /// Role of a person within a family pedigree.
    Role {
        MaternalGrandmother = 1 => "maternal_grandmother",
        MaternalGrandfather = 1 << 1 => "maternal_grandfather",
        PaternalGrandmother = 1 << 2 => "paternal_grandmother",
        PaternalGrandfather = 1 << 3 => "paternal_grandfather",
        Mom = 1 << 4 => "mom" | "mother",
        Dad = 1 << 5 => "dad" | "father",
        Parent = 1 << 6 => "parent",
        Prb = 1 << 7 => "prb" | "proband",
        Sib = 1 << 8 => "sib" | "sibling",
        Child = 1 << 9 => "child",
        MaternalHalfSibling = 1 << 10 => "maternal_half_sibling",
        PaternalHalfSibling = 1 << 11 => "paternal_half_sibling",
        HalfSibling = 1 << 12 => "half_sibling",
        MaternalAunt = 1 << 16 => "maternal_aunt",
        MaternalUncle = 1 << 17 => "maternal_uncle",
        PaternalAunt = 1 << 18 => "paternal_aunt",
        PaternalUncle = 1 << 19 => "paternal_uncle",
        MaternalCousin = 1 << 20 => "maternal_cousin",
        PaternalCousin = 1 << 21 => "paternal_cousin",
        StepMom = 1 << 22 => "step_mom",
        StepDad = 1 << 23 => "step_dad",
        Spouse = 1 << 24 => "spouse",
        Unknown = 1 << 25 => "unknown",
    }
}

bitmask_enum! {
    /// Sex of a person.
    Sex {
        Male = 1 => "male" | "m" | "1",
        Female = 2 => "female" | "f" | "2",
        Unspecified = 4 => "unspecified" | "u" | "0",
    }
}

bitmask_enum! {
    /// Affected status of a person.
    Status {
        Unaffected = 1 => "unaffected" | "1",
        Affected = 2 => "affected" | "2",
        Unspecified = 4 => "unspecified" | "-" | "0",
    }
}

bitmask_enum! {
    /// Origin of an allele in a child relative to its parents.
    Inheritance {
        Reference = 1 => "reference",
        Mendelian = 1 << 1 => "mendelian",
        Denovo = 1 << 2 => "denovo",
        PossibleDenovo = 1 << 3 => "possible_denovo",
        Omission = 1 << 4 => "omission",
        PossibleOmission = 1 << 5 => "possible_omission",
        Other = 1 << 6 => "other",
        Missing = 1 << 7 => "missing",
        Unknown = 1 << 8 => "unknown",
    }
}

bitmask_enum! {
    /// Kind of a small or large variant.
    VariantType {
        Substitution = 1 => "substitution" | "sub",
        SmallInsertion = 1 << 1 => "small_insertion" | "ins" | "insertion",
        SmallDeletion = 1 << 2 => "small_deletion" | "del" | "deletion",
        Complex = 1 << 3 => "complex" | "comp",
        LargeDuplication = 1 << 4 => "large_duplication" | "cnv+",
        LargeDeletion = 1 << 5 => "large_deletion" | "cnv-",
    }
}

/// How an allele reached the dataset.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord, Default)]
pub enum TransmissionType {
    #[default]
    Unknown,
    Transmitted,
    Denovo,
}

impl TransmissionType {
    pub const fn value(&self) -> i8 {
        match self {
            TransmissionType::Unknown => 0,
            TransmissionType::Transmitted => 1,
            TransmissionType::Denovo => 2,
        }
    }

    pub const fn from_value(value: i8) -> Option<Self> {
        match value {
            0 => Some(TransmissionType::Unknown),
            1 => Some(TransmissionType::Transmitted),
            2 => Some(TransmissionType::Denovo),
            _ => None,
        }
    }
}

impl Display for TransmissionType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            TransmissionType::Unknown => write!(f, "unknown"),
            TransmissionType::Transmitted => write!(f, "transmitted"),
            TransmissionType::Denovo => write!(f, "denovo"),
        }
    }
}

impl FromStr for TransmissionType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unknown" => Ok(TransmissionType::Unknown),
            "transmitted" => Ok(TransmissionType::Transmitted),
            "denovo" => Ok(TransmissionType::Denovo),
            _ => {
                Err(StorageError::Query(format!(
                    "unknown TransmissionType value: {}",
                    s
                )))
            },
        }
    }
}

string_serde!(TransmissionType);

impl Role {
    /// Bits of the proband and sibling roles.
    pub fn children_mask() -> u32 {
        Role::Prb.value() | Role::Sib.value()
    }

    pub fn parents_mask() -> u32 {
        Role::Mom.value() | Role::Dad.value()
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Unknown
    }
}

impl Default for Sex {
    fn default() -> Self {
        Sex::Unspecified
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Unspecified
    }
}
