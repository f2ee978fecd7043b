//! Compiles a [`VariantQuery`] into predicates over the summary and family
//! tables, pruned by the partition descriptor.

use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use polars::prelude::Schema;

use crate::data_structs::{
    FamiliesData,
    Region,
};
use crate::errors::{
    StorageError,
    StorageResult,
};
use crate::io::partition::{
    ChromLengths,
    Partition,
    PartitionDescriptor,
    CODING_BIN,
    FAMILY_BIN,
    FREQUENCY_BIN,
    REGION_BIN,
};
use crate::io::schema::{
    FamilyColumns,
    SummaryColumns,
};
use crate::query::attributes::{
    inheritance_denovo_only,
    roles_denovo_only,
};
use crate::query::filters::{
    CompiledFilters,
    VariantQuery,
    AF_ALLELE_COUNT,
    AF_ALLELE_FREQ,
};
use crate::query::predicate::{
    CompareOp,
    Predicate,
};

/// Region bin lists longer than this are not used for pruning.
pub const REGION_BINS_CUTOFF: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Summary,
    Family,
}

/// Partition bins a query may touch. An empty list leaves that bin kind
/// unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryHeuristics {
    pub region_bins:    Vec<String>,
    pub family_bins:    Vec<String>,
    pub frequency_bins: Vec<String>,
    pub coding_bins:    Vec<String>,
}

impl QueryHeuristics {
    pub fn is_empty(&self) -> bool {
        self.region_bins.is_empty()
            && self.family_bins.is_empty()
            && self.frequency_bins.is_empty()
            && self.coding_bins.is_empty()
    }

    fn bins(
        &self,
        name: &str,
    ) -> &[String] {
        match name {
            REGION_BIN => &self.region_bins,
            FAMILY_BIN => &self.family_bins,
            FREQUENCY_BIN => &self.frequency_bins,
            CODING_BIN => &self.coding_bins,
            _ => &[],
        }
    }

    /// Whether a partition file can hold rows matching the query.
    pub fn accepts(
        &self,
        partition: &Partition,
    ) -> bool {
        partition.iter().all(|(name, value)| {
            let bins = self.bins(name);
            bins.is_empty() || bins.contains(value)
        })
    }

    fn bin_predicate(
        &self,
        name: &str,
    ) -> Predicate {
        let bins = self.bins(name);
        if bins.is_empty() {
            Predicate::Const(true)
        }
        else if name == REGION_BIN {
            Predicate::in_list(name, bins.iter().map(String::as_str))
        }
        else {
            Predicate::in_list(
                name,
                bins.iter().filter_map(|b| b.parse::<i64>().ok()),
            )
        }
    }

    /// Restriction of the summary table: region, frequency and coding bins.
    pub fn summary_predicate(&self) -> Predicate {
        Predicate::all(
            [REGION_BIN, FREQUENCY_BIN, CODING_BIN]
                .into_iter()
                .map(|name| self.bin_predicate(name)),
        )
    }

    /// Restriction of the family table: every bin kind.
    pub fn family_predicate(&self) -> Predicate {
        Predicate::all(
            [REGION_BIN, FAMILY_BIN, FREQUENCY_BIN, CODING_BIN]
                .into_iter()
                .map(|name| self.bin_predicate(name)),
        )
    }
}

/// Output of the builder: backend-agnostic predicates, one heuristics
/// batch per sub-query and the residual filter for decoded variants.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    kind:    QueryKind,
    summary: Predicate,
    family:  Option<Predicate>,
    batches: Vec<QueryHeuristics>,
    limit:   Option<usize>,
    filters: Arc<CompiledFilters>,
}

impl CompiledQuery {
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn summary(&self) -> &Predicate {
        &self.summary
    }

    pub fn family(&self) -> Option<&Predicate> {
        self.family.as_ref()
    }

    pub fn batches(&self) -> &[QueryHeuristics] {
        &self.batches
    }

    /// Row limit handed to the backend, already over-fetched.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn filters(&self) -> &Arc<CompiledFilters> {
        &self.filters
    }

    pub fn summary_predicate(
        &self,
        batch: &QueryHeuristics,
    ) -> Predicate {
        self.summary
            .clone()
            .and(batch.summary_predicate())
    }

    pub fn family_predicate(
        &self,
        batch: &QueryHeuristics,
    ) -> Option<Predicate> {
        self.family
            .clone()
            .map(|p| p.and(batch.family_predicate()))
    }

    /// One SQL statement per batch.
    pub fn to_sql(
        &self,
        summary_table: &str,
        family_table: &str,
    ) -> Vec<String> {
        self.batches
            .iter()
            .map(|batch| {
                let limit = self
                    .limit
                    .map(|l| format!(" LIMIT {}", l))
                    .unwrap_or_default();
                let summary_where = self.summary_predicate(batch).to_sql(Some("sa"));
                match self.family_predicate(batch) {
                    None => {
                        format!(
                            "SELECT sa.bucket_index, sa.summary_index, sa.allele_index, \
                             sa.summary_variant_data FROM {} AS sa WHERE {}{}",
                            summary_table, summary_where, limit
                        )
                    },
                    Some(family) => {
                        format!(
                            "SELECT fa.bucket_index, fa.summary_index, fa.family_index, \
                             sa.allele_index, sa.summary_variant_data, fa.family_variant_data \
                             FROM {} AS sa JOIN {} AS fa ON sa.sj_index = fa.sj_index \
                             WHERE ({}) AND ({}){}",
                            summary_table,
                            family_table,
                            summary_where,
                            family.to_sql(Some("fa")),
                            limit
                        )
                    },
                }
            })
            .collect()
    }
}

fn region_predicate(region: &Region) -> Predicate {
    let position = SummaryColumns::Position.as_str();
    let end_position = SummaryColumns::EndPosition.as_str();
    let mut terms = vec![Predicate::equals(
        SummaryColumns::Chromosome.as_str(),
        region.chrom.as_str(),
    )];
    if let Some(start) = region.start {
        terms.push(
            Predicate::compare(end_position, CompareOp::GtEq, start).or(Predicate::all([
                Predicate::is_null(end_position),
                Predicate::compare(position, CompareOp::GtEq, start),
            ])),
        );
    }
    if let Some(stop) = region.stop {
        terms.push(Predicate::compare(position, CompareOp::LtEq, stop));
    }
    Predicate::all(terms)
}

pub struct QueryBuilder<'a> {
    descriptor:     &'a PartitionDescriptor,
    families:       &'a FamiliesData,
    summary_schema: &'a Schema,
    chrom_lengths:  Option<&'a ChromLengths>,
    over_fetch:     usize,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(
        descriptor: &'a PartitionDescriptor,
        families: &'a FamiliesData,
        summary_schema: &'a Schema,
    ) -> Self {
        Self {
            descriptor,
            families,
            summary_schema,
            chrom_lengths: None,
            over_fetch: 10,
        }
    }

    pub fn with_chrom_lengths(
        mut self,
        chrom_lengths: Option<&'a ChromLengths>,
    ) -> Self {
        self.chrom_lengths = chrom_lengths;
        self
    }

    pub fn with_over_fetch(
        mut self,
        over_fetch: usize,
    ) -> Self {
        self.over_fetch = over_fetch.max(1);
        self
    }

    pub fn build_summary_query(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<CompiledQuery> {
        self.build(query, QueryKind::Summary)
    }

    pub fn build_family_query(
        &self,
        query: &VariantQuery,
    ) -> StorageResult<CompiledQuery> {
        self.build(query, QueryKind::Family)
    }

    fn build(
        &self,
        query: &VariantQuery,
        kind: QueryKind,
    ) -> StorageResult<CompiledQuery> {
        let filters = query.compile()?;
        let summary = self.summary_predicate(&filters)?;
        let family = match kind {
            QueryKind::Summary => None,
            QueryKind::Family => Some(self.family_predicate(&filters)),
        };
        let batches = self.calc_batched_heuristics(&filters, kind);
        debug!(
            "Compiled {:?} query into {} batch(es): {}",
            kind,
            batches.len(),
            summary
        );
        Ok(CompiledQuery {
            kind,
            summary,
            family,
            batches,
            limit: query.limit.map(|l| l.saturating_mul(self.over_fetch)),
            filters: Arc::new(filters),
        })
    }

    fn reference_predicate(
        &self,
        filters: &CompiledFilters,
        column: &str,
    ) -> Predicate {
        if filters.return_reference || filters.return_unknown {
            Predicate::Const(true)
        }
        else {
            Predicate::compare(column, CompareOp::Gt, 0i64)
        }
    }

    /// Range predicate over a numeric summary column. Frequency-style
    /// filters let NULL values through.
    pub fn real_attr_predicate(
        &self,
        name: &str,
        (min, max): (Option<f64>, Option<f64>),
        is_frequency: bool,
    ) -> StorageResult<Predicate> {
        match self.summary_schema.get(name) {
            Some(dtype) if dtype.is_numeric() => {},
            Some(dtype) => {
                return Err(StorageError::Query(format!(
                    "attribute {} has non-numeric type {}",
                    name, dtype
                )))
            },
            None => {
                return Err(StorageError::Query(format!(
                    "unknown attribute {}",
                    name
                )))
            },
        }
        let range = Predicate::all(
            [
                min.map(|v| Predicate::compare(name, CompareOp::GtEq, v)),
                max.map(|v| Predicate::compare(name, CompareOp::LtEq, v)),
            ]
            .into_iter()
            .flatten(),
        );
        let predicate = match (is_frequency, min.is_none() && max.is_none()) {
            (true, true) => Predicate::Const(true),
            (true, false) => range.or(Predicate::is_null(name)),
            (false, true) => Predicate::is_not_null(name),
            (false, false) => range,
        };
        Ok(predicate)
    }

    pub fn summary_predicate(
        &self,
        filters: &CompiledFilters,
    ) -> StorageResult<Predicate> {
        let mut terms = Vec::new();
        if let Some(regions) = &filters.regions {
            terms.push(Predicate::any(regions.iter().map(region_predicate)));
        }
        if let Some(genes) = &filters.genes {
            terms.push(Predicate::list_contains(
                SummaryColumns::EffectGeneSymbols.as_str(),
                genes.iter().sorted().map(String::as_str),
            ));
        }
        if let Some(effect_types) = &filters.effect_types {
            terms.push(Predicate::list_contains(
                SummaryColumns::EffectTypes.as_str(),
                effect_types.iter().sorted().map(String::as_str),
            ));
        }
        if let Some(query) = &filters.variant_type {
            terms.push(query.to_predicate(SummaryColumns::VariantType.as_str()));
        }
        for (name, range) in &filters.real_attr {
            terms.push(self.real_attr_predicate(name, *range, false)?);
        }
        for (name, range) in &filters.frequency {
            terms.push(self.real_attr_predicate(name, *range, true)?);
        }
        if filters.ultra_rare {
            terms.push(self.real_attr_predicate(AF_ALLELE_COUNT, (None, Some(1.0)), true)?);
        }
        terms.push(self.reference_predicate(filters, SummaryColumns::AlleleIndex.as_str()));
        Ok(Predicate::all(terms))
    }

    pub fn family_predicate(
        &self,
        filters: &CompiledFilters,
    ) -> Predicate {
        let mut terms = Vec::new();
        if let Some(family_ids) = &filters.family_ids {
            terms.push(Predicate::in_list(
                FamilyColumns::FamilyId.as_str(),
                family_ids.iter().sorted().map(String::as_str),
            ));
        }
        if let Some(person_ids) = &filters.person_ids {
            terms.push(Predicate::list_contains(
                FamilyColumns::AlleleInMembers.as_str(),
                person_ids.iter().sorted().map(String::as_str),
            ));
        }
        terms.extend(
            filters
                .inheritance
                .iter()
                .map(|q| q.to_predicate(FamilyColumns::InheritanceInMembers.as_str())),
        );
        if let Some(query) = &filters.roles {
            terms.push(query.to_predicate(FamilyColumns::AlleleInRoles.as_str()));
        }
        if let Some(query) = &filters.sexes {
            terms.push(query.to_predicate(FamilyColumns::AlleleInSexes.as_str()));
        }
        if let Some(query) = &filters.statuses {
            terms.push(query.to_predicate(FamilyColumns::AlleleInStatuses.as_str()));
        }
        terms.push(self.reference_predicate(filters, FamilyColumns::AlleleIndex.as_str()));
        Predicate::all(terms)
    }

    pub fn calc_region_bins(
        &self,
        regions: Option<&[Region]>,
    ) -> Vec<String> {
        let Some(regions) = regions else {
            return Vec::new();
        };
        if regions.is_empty() || !self.descriptor.has_region_bins() {
            return Vec::new();
        }
        let empty = ChromLengths::new();
        let chrom_lengths = self.chrom_lengths.unwrap_or(&empty);
        let mut bins = Vec::new();
        for region in regions {
            match self.descriptor.region_to_bins(region, chrom_lengths) {
                Some(region_bins) => bins.extend(region_bins),
                None => return Vec::new(),
            }
        }
        let bins = bins.into_iter().unique().collect_vec();
        if bins.len() > REGION_BINS_CUTOFF {
            return Vec::new();
        }
        bins
    }

    pub fn calc_family_bins(
        &self,
        filters: &CompiledFilters,
    ) -> Vec<String> {
        if !self.descriptor.has_family_bins() {
            return Vec::new();
        }
        if filters.family_ids.is_none() && filters.person_ids.is_none() {
            return Vec::new();
        }
        let from_persons = filters
            .person_ids
            .iter()
            .flatten()
            .filter_map(|pid| self.families.family_of_person(pid))
            .map(|family| family.family_id().as_str());
        let bins = filters
            .family_ids
            .iter()
            .flatten()
            .map(String::as_str)
            .chain(from_persons)
            .filter_map(|fid| self.descriptor.make_family_bin(fid))
            .unique()
            .sorted()
            .map(|bin| bin.to_string())
            .collect_vec();
        if bins.len() as u64 >= self.descriptor.family_bin_size() / 2 {
            return Vec::new();
        }
        bins
    }

    /// `0` alone for denovo-only family queries; otherwise `0..=max` where
    /// `max` is the tightest of ultra-rare (`1`) and a rare-bounded
    /// `af_allele_freq` filter (`2`).
    pub fn calc_frequency_bins(
        &self,
        filters: &CompiledFilters,
        kind: QueryKind,
    ) -> Vec<String> {
        if !self.descriptor.has_frequency_bins() {
            return Vec::new();
        }
        if kind == QueryKind::Family {
            let roles_denovo = filters.roles.as_ref().is_some_and(roles_denovo_only);
            if roles_denovo || inheritance_denovo_only(&filters.inheritance) {
                return vec!["0".to_string()];
            }
        }

        let mut max_bin: Option<u8> = None;
        if filters.ultra_rare {
            max_bin = Some(1);
        }
        for (name, (_, max)) in &filters.frequency {
            if name != AF_ALLELE_FREQ {
                continue;
            }
            match max {
                Some(max) if *max <= self.descriptor.rare_boundary() => {
                    max_bin = Some(max_bin.map_or(2, |b| b.min(2)));
                },
                _ => {},
            }
        }
        match max_bin {
            Some(max_bin) => (0..=max_bin).map(|b| b.to_string()).collect(),
            None => Vec::new(),
        }
    }

    pub fn calc_coding_bins(
        &self,
        filters: &CompiledFilters,
    ) -> Vec<String> {
        if !self.descriptor.has_coding_bins() {
            return Vec::new();
        }
        match &filters.effect_types {
            Some(types) if !types.is_empty() && types.iter().all(|t| self.descriptor.is_coding(t)) => {
                vec!["1".to_string()]
            },
            _ => Vec::new(),
        }
    }

    pub fn calc_heuristics(
        &self,
        filters: &CompiledFilters,
        kind: QueryKind,
    ) -> QueryHeuristics {
        QueryHeuristics {
            region_bins:    self.calc_region_bins(filters.regions.as_deref()),
            family_bins:    match kind {
                QueryKind::Family => self.calc_family_bins(filters),
                QueryKind::Summary => Vec::new(),
            },
            frequency_bins: self.calc_frequency_bins(filters, kind),
            coding_bins:    self.calc_coding_bins(filters),
        }
    }

    /// Splits a scan that is not selective enough into one sub-query per
    /// region bin of the genome.
    pub fn calc_batched_heuristics(
        &self,
        filters: &CompiledFilters,
        kind: QueryKind,
    ) -> Vec<QueryHeuristics> {
        let heuristics = self.calc_heuristics(filters, kind);
        if !heuristics.region_bins.is_empty() {
            return vec![heuristics];
        }
        let has_frequency = |bin: &str| heuristics.frequency_bins.iter().any(|b| b == bin);
        if has_frequency("2") || has_frequency("3") {
            return vec![heuristics];
        }
        if !heuristics.coding_bins.is_empty()
            && !heuristics.coding_bins.iter().any(|b| b == "0")
            && !has_frequency("3")
        {
            return vec![heuristics];
        }

        let all_bins = match self.chrom_lengths {
            Some(lengths) if self.descriptor.has_region_bins() => {
                self.descriptor
                    .make_all_region_bins(lengths)
                    .unwrap_or_default()
            },
            _ => Vec::new(),
        };
        if all_bins.is_empty() {
            return vec![heuristics];
        }
        all_bins
            .into_iter()
            .map(|bin| {
                QueryHeuristics {
                    region_bins: vec![bin],
                    ..heuristics.clone()
                }
            })
            .collect()
    }
}
