use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{
    bail,
    Result,
};
use hashbrown::HashMap;
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};

use super::enums::{
    Role,
    Sex,
    Status,
};
use crate::getter_fn;

/// Member of a family pedigree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub family_id:     String,
    pub person_id:     String,
    pub dad_id:        Option<String>,
    pub mom_id:        Option<String>,
    pub sex:           Sex,
    pub status:        Status,
    pub role:          Role,
    pub sample_id:     Option<String>,
    pub generated:     bool,
    pub layout:        Option<String>,
    pub not_sequenced: bool,
    #[serde(default)]
    pub member_index:  usize,
}

impl Person {
    pub fn new(
        family_id: impl Into<String>,
        person_id: impl Into<String>,
        role: Role,
        sex: Sex,
        status: Status,
    ) -> Self {
        let person_id = person_id.into();
        Self {
            family_id: family_id.into(),
            sample_id: Some(person_id.clone()),
            person_id,
            dad_id: None,
            mom_id: None,
            sex,
            status,
            role,
            generated: false,
            layout: None,
            not_sequenced: false,
            member_index: 0,
        }
    }

    pub fn with_parents(
        mut self,
        mom_id: impl Into<String>,
        dad_id: impl Into<String>,
    ) -> Self {
        self.mom_id = Some(mom_id.into());
        self.dad_id = Some(dad_id.into());
        self
    }

    pub fn has_parents(&self) -> bool {
        self.mom_id.is_some() && self.dad_id.is_some()
    }
}

/// Member indexes of a child and both of its parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trio {
    pub child: usize,
    pub mom:   usize,
    pub dad:   usize,
}

/// Pedigree of one family with members in genotype column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    family_id: String,
    members:   Vec<Person>,
    trios:     BTreeMap<usize, Trio>,
}

impl Family {
    pub fn try_new(
        family_id: impl Into<String>,
        members: Vec<Person>,
    ) -> Result<Self> {
        let family_id = family_id.into();
        if members.is_empty() {
            bail!("family {} has no members", family_id);
        }
        if let Some(stranger) = members.iter().find(|p| p.family_id != family_id) {
            bail!(
                "person {} belongs to family {}, not {}",
                stranger.person_id,
                stranger.family_id,
                family_id
            );
        }
        if let Some(dup) = members.iter().map(|p| &p.person_id).duplicates().next() {
            bail!("person {} is listed twice in family {}", dup, family_id);
        }

        let members = members
            .into_iter()
            .enumerate()
            .map(|(index, mut person)| {
                person.member_index = index;
                person
            })
            .collect_vec();

        let index: HashMap<String, usize> = members
            .iter()
            .map(|p| (p.person_id.clone(), p.member_index))
            .collect();
        let trios = members
            .iter()
            .filter_map(|p| {
                let mom = *index.get(p.mom_id.as_deref()?)?;
                let dad = *index.get(p.dad_id.as_deref()?)?;
                Some((p.member_index, Trio {
                    child: p.member_index,
                    mom,
                    dad,
                }))
            })
            .collect();

        Ok(Self {
            family_id,
            members,
            trios,
        })
    }

    getter_fn!(family_id, String);
    getter_fn!(members, Vec<Person>);

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(
        &self,
        index: usize,
    ) -> Option<&Person> {
        self.members.get(index)
    }

    pub fn member_index(
        &self,
        person_id: &str,
    ) -> Option<usize> {
        self.members
            .iter()
            .position(|p| p.person_id == person_id)
    }

    /// Trio where the member is the child, when both parents are in the
    /// family.
    pub fn trio(
        &self,
        member_index: usize,
    ) -> Option<&Trio> {
        self.trios.get(&member_index)
    }

    pub fn members_ids(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(|p| p.person_id.as_str())
            .collect()
    }
}

/// All families of a study.
#[derive(Debug, Clone, Default)]
pub struct FamiliesData {
    families: BTreeMap<String, Arc<Family>>,
    persons:  HashMap<String, String>,
}

impl FamiliesData {
    /// Groups persons by family id, keeping their input order.
    pub fn from_persons(persons: Vec<Person>) -> Result<Self> {
        let grouped = persons
            .into_iter()
            .into_group_map_by(|p| p.family_id.clone());
        let families = grouped
            .into_iter()
            .map(|(family_id, members)| Family::try_new(family_id, members))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_families(families))
    }

    pub fn from_families(families: Vec<Family>) -> Self {
        let mut result = Self::default();
        for family in families {
            for person in family.members() {
                result
                    .persons
                    .insert(person.person_id.clone(), family.family_id.clone());
            }
            result
                .families
                .insert(family.family_id.clone(), Arc::new(family));
        }
        result
    }

    pub fn get(
        &self,
        family_id: &str,
    ) -> Option<&Arc<Family>> {
        self.families.get(family_id)
    }

    pub fn family_of_person(
        &self,
        person_id: &str,
    ) -> Option<&Arc<Family>> {
        self.persons
            .get(person_id)
            .and_then(|family_id| self.families.get(family_id))
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Family>> {
        self.families.values()
    }

    /// All persons in family order, as stored in the pedigree table.
    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.families.values().flat_map(|f| f.members().iter())
    }
}
