//! Caller-facing filter vocabulary and the in-process residual filter.
//!
//! [`VariantQuery`] is the uniform filter set accepted by every storage
//! instance. [`CompiledFilters`] is its parsed form: it feeds the predicate
//! builder and re-applies every filter to decoded variants, narrowing their
//! matched alleles.

use hashbrown::HashSet;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::{
    BitmaskEnum,
    FamilyAllele,
    FamilyVariant,
    Inheritance,
    Region,
    Role,
    Sex,
    Status,
    SummaryAllele,
    SummaryVariant,
    VariantType,
};
use crate::errors::StorageResult;
use crate::query::attributes::AttributeQuery;
use crate::with_field_fn;

/// `(attribute, (min, max))`; either bound may be absent.
pub type RealAttrFilter = (String, (Option<f64>, Option<f64>));

pub const AF_ALLELE_COUNT: &str = "af_allele_count";
pub const AF_ALLELE_FREQ: &str = "af_allele_freq";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantQuery {
    pub regions:          Option<Vec<Region>>,
    pub genes:            Option<Vec<String>>,
    pub effect_types:     Option<Vec<String>>,
    pub family_ids:       Option<Vec<String>>,
    pub person_ids:       Option<Vec<String>>,
    /// Expressions AND-ed together.
    pub inheritance:      Option<Vec<String>>,
    pub roles:            Option<String>,
    pub sexes:            Option<String>,
    pub affected_status:  Option<String>,
    pub variant_type:     Option<String>,
    pub real_attr_filter: Option<Vec<RealAttrFilter>>,
    pub frequency_filter: Option<Vec<RealAttrFilter>>,
    pub ultra_rare:       bool,
    pub return_reference: bool,
    pub return_unknown:   bool,
    pub limit:            Option<usize>,
}

impl VariantQuery {
    with_field_fn!(limit, Option<usize>);

    with_field_fn!(ultra_rare, bool);

    with_field_fn!(return_reference, bool);

    with_field_fn!(return_unknown, bool);

    pub fn with_regions(
        mut self,
        regions: Vec<Region>,
    ) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn with_genes(
        mut self,
        genes: Vec<String>,
    ) -> Self {
        self.genes = Some(genes);
        self
    }

    pub fn with_effect_types(
        mut self,
        effect_types: Vec<String>,
    ) -> Self {
        self.effect_types = Some(effect_types);
        self
    }

    pub fn with_family_ids(
        mut self,
        family_ids: Vec<String>,
    ) -> Self {
        self.family_ids = Some(family_ids);
        self
    }

    pub fn with_person_ids(
        mut self,
        person_ids: Vec<String>,
    ) -> Self {
        self.person_ids = Some(person_ids);
        self
    }

    pub fn with_inheritance(
        mut self,
        inheritance: Vec<String>,
    ) -> Self {
        self.inheritance = Some(inheritance);
        self
    }

    pub fn with_roles(
        mut self,
        roles: impl Into<String>,
    ) -> Self {
        self.roles = Some(roles.into());
        self
    }

    pub fn with_sexes(
        mut self,
        sexes: impl Into<String>,
    ) -> Self {
        self.sexes = Some(sexes.into());
        self
    }

    pub fn with_affected_status(
        mut self,
        status: impl Into<String>,
    ) -> Self {
        self.affected_status = Some(status.into());
        self
    }

    pub fn with_variant_type(
        mut self,
        variant_type: impl Into<String>,
    ) -> Self {
        self.variant_type = Some(variant_type.into());
        self
    }

    pub fn with_real_attr_filter(
        mut self,
        filters: Vec<RealAttrFilter>,
    ) -> Self {
        self.real_attr_filter = Some(filters);
        self
    }

    pub fn with_frequency_filter(
        mut self,
        filters: Vec<RealAttrFilter>,
    ) -> Self {
        self.frequency_filter = Some(filters);
        self
    }

    /// Parses every expression of the query. Malformed expressions fail here,
    /// before any backend is touched.
    pub fn compile(&self) -> StorageResult<CompiledFilters> {
        fn parse_opt<E: BitmaskEnum>(
            source: &Option<String>
        ) -> StorageResult<Option<AttributeQuery<E>>> {
            source
                .as_deref()
                .map(AttributeQuery::parse)
                .transpose()
        }

        let inheritance = self
            .inheritance
            .iter()
            .flatten()
            .map(|s| AttributeQuery::<Inheritance>::parse(s))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(CompiledFilters {
            regions: self.regions.clone(),
            genes: self
                .genes
                .as_ref()
                .map(|v| v.iter().cloned().collect()),
            effect_types: self
                .effect_types
                .as_ref()
                .map(|v| v.iter().cloned().collect()),
            family_ids: self
                .family_ids
                .as_ref()
                .map(|v| v.iter().cloned().collect()),
            person_ids: self
                .person_ids
                .as_ref()
                .map(|v| v.iter().cloned().collect()),
            inheritance,
            roles: parse_opt::<Role>(&self.roles)?,
            sexes: parse_opt::<Sex>(&self.sexes)?,
            statuses: parse_opt::<Status>(&self.affected_status)?,
            variant_type: parse_opt::<VariantType>(&self.variant_type)?,
            real_attr: self.real_attr_filter.clone().unwrap_or_default(),
            frequency: self.frequency_filter.clone().unwrap_or_default(),
            ultra_rare: self.ultra_rare,
            return_reference: self.return_reference,
            return_unknown: self.return_unknown,
        })
    }
}

/// Whether `value` lies in the closed range; absent bounds are open.
pub fn in_range(
    value: f64,
    (min, max): (Option<f64>, Option<f64>),
) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

/// Parsed [`VariantQuery`].
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    pub regions:          Option<Vec<Region>>,
    pub genes:            Option<HashSet<String>>,
    pub effect_types:     Option<HashSet<String>>,
    pub family_ids:       Option<HashSet<String>>,
    pub person_ids:       Option<HashSet<String>>,
    pub inheritance:      Vec<AttributeQuery<Inheritance>>,
    pub roles:            Option<AttributeQuery<Role>>,
    pub sexes:            Option<AttributeQuery<Sex>>,
    pub statuses:         Option<AttributeQuery<Status>>,
    pub variant_type:     Option<AttributeQuery<VariantType>>,
    pub real_attr:        Vec<RealAttrFilter>,
    pub frequency:        Vec<RealAttrFilter>,
    pub ultra_rare:       bool,
    pub return_reference: bool,
    pub return_unknown:   bool,
}

impl CompiledFilters {
    /// Checks that only involve the population-level allele.
    pub fn summary_allele_passes(
        &self,
        allele: &SummaryAllele,
    ) -> bool {
        if let Some(regions) = &self.regions {
            let overlaps = regions.iter().any(|r| {
                r.overlaps(
                    allele.chromosome(),
                    allele.position(),
                    allele.end_position(),
                )
            });
            if !overlaps {
                return false;
            }
        }

        if self.genes.is_some() || self.effect_types.is_some() {
            let Some(effects) = allele.effects() else {
                return false;
            };
            let paired = effects.genes.iter().any(|g| {
                self.genes
                    .as_ref()
                    .map_or(true, |genes| genes.contains(&g.symbol))
                    && self
                        .effect_types
                        .as_ref()
                        .map_or(true, |types| types.contains(&g.effect))
            });
            if !paired {
                return false;
            }
        }

        if let Some(query) = &self.variant_type {
            match allele.variant_type() {
                Some(vt) if query.matches(vt.value()) => {},
                _ => return false,
            }
        }

        let exact = self.real_attr.iter().all(|(name, range)| {
            allele
                .get_real(name)
                .map_or(false, |v| in_range(v, *range))
        });
        let frequency = self.frequency.iter().all(|(name, range)| {
            allele
                .get_real(name)
                .map_or(true, |v| in_range(v, *range))
        });
        let ultra_rare = !self.ultra_rare
            || allele
                .get_real(AF_ALLELE_COUNT)
                .map_or(true, |v| v <= 1.0);
        exact && frequency && ultra_rare
    }

    /// Checks that involve the family members carrying the allele.
    pub fn family_allele_passes(
        &self,
        allele: &FamilyAllele<'_>,
    ) -> bool {
        if !self.summary_allele_passes(allele.summary_allele()) {
            return false;
        }
        let inheritance = allele.inheritance_mask();
        if !self.inheritance.iter().all(|q| q.matches(inheritance)) {
            return false;
        }
        if let Some(query) = &self.roles {
            if !query.matches(allele.allele_in_roles()) {
                return false;
            }
        }
        if let Some(query) = &self.sexes {
            if !query.matches(allele.allele_in_sexes()) {
                return false;
            }
        }
        if let Some(query) = &self.statuses {
            if !query.matches(allele.allele_in_statuses()) {
                return false;
            }
        }
        if let Some(person_ids) = &self.person_ids {
            if !allele
                .allele_in_members()
                .iter()
                .any(|p| person_ids.contains(*p))
            {
                return false;
            }
        }
        true
    }

    /// Narrows the matched alleles of a decoded summary variant. Drops the
    /// variant when none is left.
    pub fn filter_summary(
        &self,
        mut variant: SummaryVariant,
    ) -> Option<SummaryVariant> {
        let candidates = if variant.matched_alleles().is_empty() {
            (0..variant.allele_count()).collect()
        }
        else {
            variant.matched_alleles().to_vec()
        };
        let matched = candidates
            .into_iter()
            .filter(|ai| *ai > 0 || self.return_reference)
            .filter(|ai| {
                variant
                    .allele(*ai)
                    .map_or(false, |a| self.summary_allele_passes(a))
            })
            .collect::<Vec<_>>();
        if matched.is_empty() {
            return None;
        }
        variant.set_matched_alleles(matched);
        Some(variant)
    }

    /// Narrows the matched alleles of a decoded family variant. Drops the
    /// variant when none is left.
    pub fn filter_family(
        &self,
        mut variant: FamilyVariant,
    ) -> Option<FamilyVariant> {
        if let Some(family_ids) = &self.family_ids {
            if !family_ids.contains(variant.family_id()) {
                return None;
            }
        }
        let unknown = variant.is_unknown();
        if unknown && !self.return_unknown {
            return None;
        }
        let candidates = if variant.matched_alleles_indexes().is_empty() {
            variant
                .family_alleles()
                .iter()
                .map(FamilyAllele::allele_index)
                .collect()
        }
        else {
            variant.matched_alleles_indexes().to_vec()
        };
        let reference_allowed = self.return_reference || (unknown && self.return_unknown);
        let matched = candidates
            .into_iter()
            .filter(|ai| *ai > 0 || reference_allowed)
            .filter(|ai| {
                variant
                    .allele(*ai)
                    .map_or(false, |a| self.family_allele_passes(&a))
            })
            .collect::<Vec<_>>();
        if matched.is_empty() {
            return None;
        }
        variant.set_matched_alleles(matched);
        Some(variant)
    }
}
