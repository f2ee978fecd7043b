use std::collections::BTreeMap;

use anyhow::{
    bail,
    Result,
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};

use super::allele::{
    AttrValue,
    SummaryAllele,
};
use super::enums::{
    BitmaskEnum,
    Status,
    TransmissionType,
};

/// Alleles of one position; `alleles[0]` is always the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryVariant {
    alleles:         Vec<SummaryAllele>,
    #[serde(default)]
    matched_alleles: Vec<usize>,
}

impl SummaryVariant {
    /// Builds a variant from allele records sharing one position.
    ///
    /// A reference allele is synthesized from the first record when none of
    /// the records is one. Allele indexes are assigned in input order and
    /// `allele_count` is stamped onto every allele.
    pub fn from_records(records: Vec<SummaryAllele>) -> Result<Self> {
        if records.is_empty() {
            bail!("summary variant needs at least one allele record");
        }
        let first = &records[0];
        if let Some(other) = records.iter().find(|r| {
            r.chromosome != first.chromosome || r.position != first.position
        }) {
            bail!(
                "allele records do not share a position: {} vs {}",
                first.location(),
                other.location()
            );
        }

        let mut alleles = Vec::with_capacity(records.len() + 1);
        if first.alternative.is_some() {
            alleles.push(SummaryAllele::reference_of(first));
        }
        alleles.extend(records);

        if alleles.iter().skip(1).any(|a| a.alternative.is_none())
            && alleles.iter().skip(1).any(|a| a.alternative.is_some())
        {
            bail!(
                "alternate alleles at {} mix null and non-null alternatives",
                alleles[0].location()
            );
        }

        let allele_count = alleles.len();
        let summary_index = alleles[0].summary_index;
        for (index, allele) in alleles.iter_mut().enumerate() {
            allele.allele_index = index;
            allele.allele_count = allele_count;
            if allele.summary_index < 0 {
                allele.summary_index = summary_index;
            }
        }

        Ok(Self {
            alleles,
            matched_alleles: Vec::new(),
        })
    }

    pub fn alleles(&self) -> &[SummaryAllele] {
        &self.alleles
    }

    pub fn ref_allele(&self) -> &SummaryAllele {
        &self.alleles[0]
    }

    pub fn alt_alleles(&self) -> &[SummaryAllele] {
        &self.alleles[1..]
    }

    pub fn allele(
        &self,
        allele_index: usize,
    ) -> Option<&SummaryAllele> {
        self.alleles.get(allele_index)
    }

    pub fn allele_count(&self) -> usize {
        self.alleles.len()
    }

    pub fn chromosome(&self) -> &str {
        &self.alleles[0].chromosome
    }

    pub fn position(&self) -> u32 {
        self.alleles[0].position
    }

    /// End of the first alternate allele, or of the reference when there is
    /// no alternate.
    pub fn end_position(&self) -> Option<u32> {
        self.alleles
            .get(1)
            .unwrap_or(&self.alleles[0])
            .end_position
    }

    pub fn reference(&self) -> &str {
        &self.alleles[0].reference
    }

    /// Alternatives of all alternate alleles joined with `,`; `None` for a
    /// reference-only variant.
    pub fn alternative(&self) -> Option<String> {
        let alts = self
            .alt_alleles()
            .iter()
            .map(|a| a.alternative.as_deref())
            .collect::<Option<Vec<_>>>()?;
        if alts.is_empty() {
            return None;
        }
        Some(alts.join(","))
    }

    pub fn summary_index(&self) -> i32 {
        self.alleles[0].summary_index
    }

    pub fn set_summary_index(
        &mut self,
        summary_index: i32,
    ) {
        self.alleles
            .iter_mut()
            .for_each(|a| a.summary_index = summary_index);
    }

    pub fn transmission_type(&self) -> TransmissionType {
        self.alleles
            .get(1)
            .unwrap_or(&self.alleles[0])
            .transmission_type
    }

    pub fn location(&self) -> String {
        match self.end_position() {
            Some(end) if end != self.position() => {
                format!("{}:{}-{}", self.chromosome(), self.position(), end)
            },
            _ => format!("{}:{}", self.chromosome(), self.position()),
        }
    }

    /// Content fingerprint `location.ref.alt`.
    pub fn svuid(&self) -> String {
        format!(
            "{}.{}.{}",
            self.location(),
            self.reference(),
            self.alternative().unwrap_or_default()
        )
    }

    /// Updates attributes of the alternate alleles.
    ///
    /// Each entry carries either a single value, copied to every alternate
    /// allele, or exactly one value per alternate allele.
    ///
    /// # Panics
    ///
    /// Panics when an entry has any other number of values.
    pub fn update_attributes(
        &mut self,
        attributes: BTreeMap<String, Vec<AttrValue>>,
    ) {
        let alt_count = self.alleles.len() - 1;
        for (name, values) in attributes {
            assert!(
                values.len() == 1 || values.len() == alt_count,
                "attribute '{}' has {} values for {} alternate alleles",
                name,
                values.len(),
                alt_count
            );
            for (allele, value) in self
                .alleles
                .iter_mut()
                .skip(1)
                .zip(values.iter().cycle())
            {
                allele.set_attribute(name.clone(), value.clone());
            }
        }
    }

    pub fn matched_alleles(&self) -> &[usize] {
        &self.matched_alleles
    }

    pub fn set_matched_alleles(
        &mut self,
        mut allele_indexes: Vec<usize>,
    ) {
        allele_indexes.sort_unstable();
        allele_indexes.dedup();
        self.matched_alleles = allele_indexes;
    }

    /// Folds the matched alleles of another decoding of the same variant.
    pub fn absorb_matched(
        &mut self,
        other: &[usize],
    ) {
        let merged = self
            .matched_alleles
            .iter()
            .chain(other.iter())
            .copied()
            .collect_vec();
        self.set_matched_alleles(merged);
    }

    /// Combines the per-allele family counters of the same variant reported
    /// by another study.
    pub fn merge_counters(
        &mut self,
        other: &SummaryVariant,
    ) {
        for (allele, theirs) in self
            .alleles
            .iter_mut()
            .skip(1)
            .zip(other.alleles.iter().skip(1))
        {
            let status = counter(allele, "seen_in_status") | counter(theirs, "seen_in_status");
            let denovo = flag(allele, "seen_as_denovo") || flag(theirs, "seen_as_denovo");
            let families =
                counter(allele, "family_variants_count") + counter(theirs, "family_variants_count");
            let alleles =
                counter(allele, "family_alleles_count") + counter(theirs, "family_alleles_count");

            allele.set_attribute("seen_in_status", status);
            allele.set_attribute("seen_as_denovo", denovo);
            allele.set_attribute("family_variants_count", families);
            allele.set_attribute("family_alleles_count", alleles);
        }
        self.absorb_matched(&other.matched_alleles);
    }

    pub fn seen_in_status(
        &self,
        allele_index: usize,
    ) -> Vec<Status> {
        self.allele(allele_index)
            .map(|a| Status::from_mask(counter(a, "seen_in_status") as u32))
            .unwrap_or_default()
    }
}

fn counter(
    allele: &SummaryAllele,
    name: &str,
) -> i64 {
    allele
        .get_attribute(name)
        .and_then(AttrValue::as_i64)
        .unwrap_or(0)
}

fn flag(
    allele: &SummaryAllele,
    name: &str,
) -> bool {
    allele
        .get_attribute(name)
        .and_then(AttrValue::as_bool)
        .unwrap_or(false)
}
