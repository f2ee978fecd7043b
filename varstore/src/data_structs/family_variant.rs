use std::sync::Arc;

use anyhow::{
    bail,
    ensure,
    Result,
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};

use super::allele::SummaryAllele;
use super::enums::{
    BitmaskEnum,
    Inheritance,
    Role,
    Sex,
    Status,
};
use super::family::{
    Family,
    Person,
};
use super::inheritance::{
    classify,
    GenotypePair,
};
use super::variant::SummaryVariant;

/// Genotype matrix of shape `(2, member_count)`, stored member-major.
///
/// `-1` marks an unknown call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genotype {
    calls: Vec<GenotypePair>,
}

impl Genotype {
    pub fn new(calls: Vec<GenotypePair>) -> Self {
        Self { calls }
    }

    /// Builds the matrix from its two rows.
    pub fn from_rows(
        first: &[i8],
        second: &[i8],
    ) -> Result<Self> {
        ensure!(
            first.len() == second.len(),
            "genotype rows differ in length: {} vs {}",
            first.len(),
            second.len()
        );
        Ok(Self::new(
            first
                .iter()
                .zip(second.iter())
                .map(|(a, b)| [*a, *b])
                .collect(),
        ))
    }

    pub fn member_count(&self) -> usize {
        self.calls.len()
    }

    pub fn member(
        &self,
        index: usize,
    ) -> &GenotypePair {
        &self.calls[index]
    }

    pub fn row(
        &self,
        row: usize,
    ) -> Vec<i8> {
        self.calls.iter().map(|c| c[row]).collect()
    }

    fn values(&self) -> impl Iterator<Item = i8> + '_ {
        self.calls.iter().flat_map(|c| c.iter().copied())
    }

    /// Some reference call and nothing but reference or unknown calls.
    pub fn is_reference(&self) -> bool {
        self.values().any(|v| v == 0) && self.values().all(|v| v == 0 || v == -1)
    }

    pub fn is_unknown(&self) -> bool {
        self.values().all(|v| v == -1)
    }

    pub fn has_unknown(&self) -> bool {
        self.values().any(|v| v == -1)
    }

    /// Distinct alternate allele indexes present in the matrix, sorted.
    pub fn alt_alleles(&self) -> Vec<usize> {
        self.values()
            .filter(|v| *v > 0)
            .map(|v| v as usize)
            .sorted()
            .dedup()
            .collect()
    }

    /// Best-state matrix `(allele_count, member_count)`: how many copies of
    /// each allele every member carries. A member with any unknown call has
    /// the whole column set to `-1`.
    pub fn best_state(
        &self,
        allele_count: usize,
    ) -> Vec<Vec<i8>> {
        let mut best = vec![vec![0i8; self.calls.len()]; allele_count];
        for (member, call) in self.calls.iter().enumerate() {
            if call.contains(&-1) {
                best.iter_mut().for_each(|row| row[member] = -1);
                continue;
            }
            for value in call {
                if let Some(row) = best.get_mut(*value as usize) {
                    row[member] += 1;
                }
            }
        }
        best
    }
}

/// Summary variant instantiated against one family's genotype calls.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyVariant {
    summary:         SummaryVariant,
    family:          Arc<Family>,
    genotype:        Genotype,
    family_index:    Option<i32>,
    inheritance:     Vec<Vec<Inheritance>>,
    matched_alleles: Vec<usize>,
}

impl FamilyVariant {
    /// Validates the genotype against the family and the variant and
    /// classifies every allele in every member.
    pub fn try_new(
        summary: SummaryVariant,
        family: Arc<Family>,
        genotype: Genotype,
    ) -> Result<Self> {
        if genotype.member_count() != family.len() {
            bail!(
                "genotype for family {} has {} columns, family has {} members",
                family.family_id(),
                genotype.member_count(),
                family.len()
            );
        }
        let Ok(allele_count) = i8::try_from(summary.allele_count())
        else {
            bail!(
                "{} has {} alleles, at most {} fit a genotype",
                summary.location(),
                summary.allele_count(),
                i8::MAX
            );
        };
        if let Some(bad) = genotype.values().find(|v| *v < -1 || *v >= allele_count) {
            bail!(
                "genotype value {} at {} outside [-1, {})",
                bad,
                summary.location(),
                allele_count
            );
        }

        let inheritance = (0..summary.allele_count())
            .map(|ai| calc_inheritance_in_members(&family, &genotype, ai as i8))
            .collect();

        Ok(Self {
            summary,
            family,
            genotype,
            family_index: None,
            inheritance,
            matched_alleles: Vec::new(),
        })
    }

    pub fn summary(&self) -> &SummaryVariant {
        &self.summary
    }

    pub fn summary_mut(&mut self) -> &mut SummaryVariant {
        &mut self.summary
    }

    pub fn family(&self) -> &Arc<Family> {
        &self.family
    }

    pub fn family_id(&self) -> &str {
        self.family.family_id()
    }

    pub fn genotype(&self) -> &Genotype {
        &self.genotype
    }

    pub fn family_index(&self) -> Option<i32> {
        self.family_index
    }

    pub fn set_family_index(
        &mut self,
        value: i32,
    ) {
        self.family_index = Some(value);
    }

    pub fn best_state(&self) -> Vec<Vec<i8>> {
        self.genotype.best_state(self.summary.allele_count())
    }

    pub fn is_reference(&self) -> bool {
        self.genotype.is_reference()
    }

    pub fn is_unknown(&self) -> bool {
        self.genotype.is_unknown()
    }

    /// Replaces the computed inheritance of one allele, e.g. with loader
    /// supplied `possible_denovo` calls.
    pub fn set_inheritance_in_members(
        &mut self,
        allele_index: usize,
        inheritance: Vec<Inheritance>,
    ) -> Result<()> {
        ensure!(
            inheritance.len() == self.family.len(),
            "inheritance has {} entries for {} members",
            inheritance.len(),
            self.family.len()
        );
        match self.inheritance.get_mut(allele_index) {
            Some(slot) => *slot = inheritance,
            None => bail!("no allele {} at {}", allele_index, self.summary.location()),
        }
        Ok(())
    }

    pub(crate) fn inheritance_table(&self) -> &[Vec<Inheritance>] {
        &self.inheritance
    }

    pub(crate) fn with_inheritance_table(
        mut self,
        table: Vec<Vec<Inheritance>>,
    ) -> Result<Self> {
        ensure!(
            table.len() == self.inheritance.len(),
            "inheritance table has {} alleles, variant has {}",
            table.len(),
            self.inheritance.len()
        );
        for (allele_index, row) in table.into_iter().enumerate() {
            self.set_inheritance_in_members(allele_index, row)?;
        }
        Ok(self)
    }

    pub fn allele(
        &self,
        allele_index: usize,
    ) -> Option<FamilyAllele<'_>> {
        self.summary
            .allele(allele_index)
            .map(|allele| FamilyAllele {
                variant: self,
                allele,
            })
    }

    pub fn ref_allele(&self) -> FamilyAllele<'_> {
        FamilyAllele {
            variant: self,
            allele:  self.summary.ref_allele(),
        }
    }

    /// Reference allele plus every alternate allele present in the genotype.
    pub fn family_alleles(&self) -> Vec<FamilyAllele<'_>> {
        std::iter::once(0)
            .chain(self.genotype.alt_alleles())
            .filter_map(|ai| self.allele(ai))
            .collect()
    }

    pub fn alt_alleles(&self) -> Vec<FamilyAllele<'_>> {
        self.genotype
            .alt_alleles()
            .into_iter()
            .filter_map(|ai| self.allele(ai))
            .collect()
    }

    pub fn matched_alleles(&self) -> Vec<FamilyAllele<'_>> {
        self.matched_alleles
            .iter()
            .filter_map(|ai| self.allele(*ai))
            .collect()
    }

    pub fn matched_alleles_indexes(&self) -> &[usize] {
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

    pub fn absorb_matched(
        &mut self,
        other: &[usize],
    ) {
        let merged = self
            .matched_alleles
            .iter()
            .chain(other)
            .copied()
            .collect_vec();
        self.set_matched_alleles(merged);
    }

    pub fn location(&self) -> String {
        self.summary.location()
    }

    /// Content fingerprint `family_id.location.ref.alt`.
    pub fn fvuid(&self) -> String {
        format!("{}.{}", self.family_id(), self.summary.svuid())
    }
}

fn calc_inheritance_in_members(
    family: &Family,
    genotype: &Genotype,
    allele: i8,
) -> Vec<Inheritance> {
    (0..family.len())
        .map(|member| {
            let trio = match family.trio(member) {
                Some(trio) => trio,
                None => return Inheritance::Unknown,
            };
            let ch = genotype.member(trio.child);
            let p1 = genotype.member(trio.mom);
            let p2 = genotype.member(trio.dad);
            let trio_calls = [ch, p1, p2];

            if trio_calls.iter().any(|gt| gt.contains(&-1)) {
                return Inheritance::Unknown;
            }
            if trio_calls.iter().all(|gt| !gt.contains(&allele)) {
                return Inheritance::Missing;
            }
            let inheritance = classify(p1, p2, ch, allele);
            if inheritance != Inheritance::Omission && !ch.contains(&allele) {
                Inheritance::Missing
            }
            else {
                inheritance
            }
        })
        .collect()
}

/// View of one allele of a [`FamilyVariant`].
#[derive(Debug, Clone, Copy)]
pub struct FamilyAllele<'a> {
    variant: &'a FamilyVariant,
    allele:  &'a SummaryAllele,
}

impl<'a> FamilyAllele<'a> {
    pub fn summary_allele(&self) -> &'a SummaryAllele {
        self.allele
    }

    pub fn variant(&self) -> &'a FamilyVariant {
        self.variant
    }

    pub fn allele_index(&self) -> usize {
        self.allele.allele_index()
    }

    pub fn family_id(&self) -> &'a str {
        self.variant.family_id()
    }

    pub fn inheritance_in_members(&self) -> &'a [Inheritance] {
        &self.variant.inheritance[self.allele_index()]
    }

    /// Members whose genotype carries the allele.
    pub fn members_with_allele(&self) -> Vec<usize> {
        let allele = self.allele_index() as i8;
        (0..self.variant.genotype.member_count())
            .filter(|m| self.variant.genotype.member(*m).contains(&allele))
            .collect()
    }

    pub fn allele_in_members(&self) -> Vec<&'a str> {
        let family = self.variant.family.as_ref();
        self.members_with_allele()
            .into_iter()
            .filter_map(|m| family.member(m))
            .map(|p| p.person_id.as_str())
            .collect()
    }

    pub fn allele_in_roles(&self) -> u32 {
        Role::mask(self.carriers().map(|p| &p.role))
    }

    pub fn allele_in_sexes(&self) -> u32 {
        Sex::mask(self.carriers().map(|p| &p.sex))
    }

    pub fn allele_in_statuses(&self) -> u32 {
        Status::mask(self.carriers().map(|p| &p.status))
    }

    pub fn inheritance_mask(&self) -> u32 {
        Inheritance::mask(self.inheritance_in_members())
    }

    pub fn is_denovo(&self) -> bool {
        self.inheritance_in_members()
            .iter()
            .any(|i| *i == Inheritance::Denovo)
    }

    fn carriers(&self) -> impl Iterator<Item = &'a Person> + 'a {
        let family = self.variant.family.as_ref();
        self.members_with_allele()
            .into_iter()
            .filter_map(move |m| family.member(m))
    }
}
