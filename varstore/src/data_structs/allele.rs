use std::collections::BTreeMap;
use std::fmt::Display;

use itertools::Itertools;
use once_cell::sync::OnceCell;
use serde::{
    Deserialize,
    Serialize,
};

use super::enums::{
    TransmissionType,
    VariantType,
};
use crate::getter_fn;

/// Value of a free-form annotation attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Float(v) => Some(*v as i64),
            AttrValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            AttrValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Name of the annotation type recorded in the meta table.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Str(_) => "str",
            AttrValue::List(_) => "list",
        }
    }
}

impl Display for AttrValue {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Str(v) => write!(f, "{}", v),
            AttrValue::List(v) => write!(f, "{}", v.iter().join(",")),
        }
    }
}

macro_rules! attr_from {
    ($t: ty, $variant: ident) => {
        impl From<$t> for AttrValue {
            fn from(value: $t) -> Self {
                AttrValue::$variant(value.into())
            }
        }
    };
}

attr_from!(bool, Bool);
attr_from!(i32, Int);
attr_from!(i64, Int);
attr_from!(u32, Int);
attr_from!(f32, Float);
attr_from!(f64, Float);
attr_from!(String, Str);
attr_from!(&str, Str);

pub type Attributes = BTreeMap<String, AttrValue>;

/// One gene/consequence pair of an allele.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectGene {
    pub symbol: String,
    pub effect: String,
}

/// Parsed gene consequences of an allele.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlleleEffects {
    pub worst: String,
    pub genes: Vec<EffectGene>,
}

impl AlleleEffects {
    /// Parses `worst!gene:effect|gene:effect!transcripts`. The transcript
    /// section is ignored.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('!');
        let worst = parts.next()?.trim();
        if worst.is_empty() {
            return None;
        }
        let genes = parts
            .next()
            .unwrap_or_default()
            .split('|')
            .filter_map(|pair| {
                let (symbol, effect) = pair.split_once(':')?;
                Some(EffectGene {
                    symbol: symbol.trim().to_string(),
                    effect: effect.trim().to_string(),
                })
            })
            .collect_vec();

        Some(Self {
            worst: worst.to_string(),
            genes,
        })
    }

    pub fn effect_types(&self) -> Vec<&str> {
        self.genes
            .iter()
            .map(|g| g.effect.as_str())
            .unique()
            .collect()
    }

    pub fn gene_symbols(&self) -> Vec<&str> {
        self.genes
            .iter()
            .map(|g| g.symbol.as_str())
            .unique()
            .collect()
    }
}

impl Display for AlleleEffects {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}!{}",
            self.worst,
            self.genes
                .iter()
                .map(|g| format!("{}:{}", g.symbol, g.effect))
                .join("|")
        )
    }
}

/// CSHL-style variant descriptor, e.g. `sub(A->G)`, `ins(TT)`, `del(3)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDetails {
    pub chrom:       String,
    /// Position after the shared prefix of reference and alternative.
    pub position:    u32,
    pub variant:     String,
    pub variant_type: VariantType,
}

impl VariantDetails {
    pub fn from_vcf(
        chrom: &str,
        position: u32,
        reference: &str,
        alternative: &str,
    ) -> Self {
        let (mut r, mut a) = (reference.as_bytes(), alternative.as_bytes());
        let mut position = position;

        while !r.is_empty() && !a.is_empty() && r[0] == a[0] {
            r = &r[1..];
            a = &a[1..];
            position += 1;
        }
        while !r.is_empty() && !a.is_empty() && r[r.len() - 1] == a[a.len() - 1] {
            r = &r[..r.len() - 1];
            a = &a[..a.len() - 1];
        }

        let r = String::from_utf8_lossy(r);
        let a = String::from_utf8_lossy(a);
        let (variant, variant_type) = match (r.len(), a.len()) {
            (1, 1) => (format!("sub({}->{})", r, a), VariantType::Substitution),
            (0, _) => (format!("ins({})", a), VariantType::SmallInsertion),
            (n, 0) => (format!("del({})", n), VariantType::SmallDeletion),
            _ => (format!("comp({}->{})", r, a), VariantType::Complex),
        };

        Self {
            chrom: chrom.to_string(),
            position,
            variant,
            variant_type,
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}", self.chrom, self.position)
    }
}

/// Population-level allele; index 0 is the reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryAllele {
    pub(crate) chromosome:        String,
    pub(crate) position:          u32,
    pub(crate) end_position:      Option<u32>,
    pub(crate) reference:         String,
    pub(crate) alternative:       Option<String>,
    pub(crate) summary_index:     i32,
    pub(crate) allele_index:      usize,
    pub(crate) allele_count:      usize,
    pub(crate) transmission_type: TransmissionType,
    pub(crate) variant_type:      Option<VariantType>,
    pub(crate) attributes:        Attributes,
    #[serde(skip)]
    details: OnceCell<Option<VariantDetails>>,
    #[serde(skip)]
    effects: OnceCell<Option<AlleleEffects>>,
}

impl PartialEq for SummaryAllele {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.chromosome == other.chromosome
            && self.position == other.position
            && self.end_position == other.end_position
            && self.reference == other.reference
            && self.alternative == other.alternative
            && self.summary_index == other.summary_index
            && self.allele_index == other.allele_index
            && self.allele_count == other.allele_count
            && self.transmission_type == other.transmission_type
            && self.variant_type == other.variant_type
            && self.attributes == other.attributes
    }
}

impl SummaryAllele {
    pub fn new(
        chromosome: impl Into<String>,
        position: u32,
        reference: impl Into<String>,
        alternative: Option<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            end_position: None,
            reference: reference.into(),
            alternative,
            summary_index: -1,
            allele_index: 0,
            allele_count: 0,
            transmission_type: TransmissionType::Transmitted,
            variant_type: None,
            attributes: Attributes::new(),
            details: OnceCell::new(),
            effects: OnceCell::new(),
        }
    }

    /// Builds the reference allele matching an alternate allele record.
    pub fn reference_of(other: &SummaryAllele) -> Self {
        let mut allele = Self::new(
            other.chromosome.clone(),
            other.position,
            other.reference.clone(),
            None,
        );
        allele.summary_index = other.summary_index;
        allele.transmission_type = other.transmission_type;
        allele
    }

    pub fn with_end_position(
        mut self,
        value: Option<u32>,
    ) -> Self {
        self.end_position = value;
        self
    }

    pub fn with_allele_index(
        mut self,
        value: usize,
    ) -> Self {
        self.allele_index = value;
        self
    }

    pub fn with_summary_index(
        mut self,
        value: i32,
    ) -> Self {
        self.summary_index = value;
        self
    }

    pub fn with_transmission_type(
        mut self,
        value: TransmissionType,
    ) -> Self {
        self.transmission_type = value;
        self
    }

    pub fn with_variant_type(
        mut self,
        value: VariantType,
    ) -> Self {
        self.variant_type = Some(value);
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Self {
        self.set_attribute(name, value);
        self
    }

    getter_fn!(chromosome, String);
    getter_fn!(reference, String);
    getter_fn!(attributes, Attributes);

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn end_position(&self) -> Option<u32> {
        self.end_position
    }

    pub fn alternative(&self) -> Option<&str> {
        self.alternative.as_deref()
    }

    pub fn summary_index(&self) -> i32 {
        self.summary_index
    }

    pub fn allele_index(&self) -> usize {
        self.allele_index
    }

    pub fn allele_count(&self) -> usize {
        self.allele_count
    }

    pub fn transmission_type(&self) -> TransmissionType {
        self.transmission_type
    }

    pub fn is_reference_allele(&self) -> bool {
        self.allele_index == 0
    }

    pub fn get_attribute(
        &self,
        name: &str,
    ) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) {
        let name = name.into();
        if name == "effects" {
            self.effects = OnceCell::new();
        }
        self.attributes.insert(name, value.into());
    }

    pub fn has_attribute(
        &self,
        name: &str,
    ) -> bool {
        self.attributes.contains_key(name)
    }

    /// Numeric attribute lookup used by real-value filters.
    pub fn get_real(
        &self,
        name: &str,
    ) -> Option<f64> {
        self.attributes.get(name).and_then(AttrValue::as_f64)
    }

    pub fn details(&self) -> Option<&VariantDetails> {
        self.details
            .get_or_init(|| {
                self.alternative.as_ref().map(|alt| {
                    VariantDetails::from_vcf(
                        &self.chromosome,
                        self.position,
                        &self.reference,
                        alt,
                    )
                })
            })
            .as_ref()
    }

    /// Explicit variant type, or the one implied by the CSHL descriptor.
    pub fn variant_type(&self) -> Option<VariantType> {
        self.variant_type
            .or_else(|| self.details().map(|d| d.variant_type))
    }

    pub fn effects(&self) -> Option<&AlleleEffects> {
        self.effects
            .get_or_init(|| {
                self.attributes
                    .get("effects")
                    .and_then(AttrValue::as_str)
                    .and_then(AlleleEffects::parse)
            })
            .as_ref()
    }

    pub fn effect_types(&self) -> Vec<&str> {
        self.effects()
            .map(AlleleEffects::effect_types)
            .unwrap_or_default()
    }

    pub fn location(&self) -> String {
        match self.end_position {
            Some(end) if end != self.position => {
                format!("{}:{}-{}", self.chromosome, self.position, end)
            },
            _ => format!("{}:{}", self.chromosome, self.position),
        }
    }
}
