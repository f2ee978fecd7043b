use std::fs::{
    self,
    File,
};
use std::path::{
    Path,
    PathBuf,
};

use log::debug;
use polars::prelude::*;

use crate::data_structs::{
    BitmaskEnum,
    FamiliesData,
    Person,
    Role,
    Sex,
    Status,
};
use crate::errors::{
    StorageError,
    StorageResult,
};
use crate::io::schema::PedigreeColumns;

pub const PEDIGREE_DIR: &str = "pedigree";
pub const PEDIGREE_FILE: &str = "pedigree.parquet";

pub fn pedigree_path(root: &Path) -> PathBuf {
    root.join(PEDIGREE_DIR).join(PEDIGREE_FILE)
}

/// Writes every person of `families` into `pedigree/pedigree.parquet`.
pub fn write_pedigree(
    root: &Path,
    families: &FamiliesData,
) -> StorageResult<()> {
    let path = pedigree_path(root);
    let persons = families.persons().collect::<Vec<_>>();

    let optional = |f: fn(&Person) -> Option<&str>| -> Vec<Option<&str>> {
        persons.iter().map(|p| f(p)).collect()
    };
    let columns = vec![
        Column::new(
            PedigreeColumns::FamilyId.as_str().into(),
            persons.iter().map(|p| p.family_id.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            PedigreeColumns::PersonId.as_str().into(),
            persons.iter().map(|p| p.person_id.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            PedigreeColumns::DadId.as_str().into(),
            optional(|p| p.dad_id.as_deref()),
        ),
        Column::new(
            PedigreeColumns::MomId.as_str().into(),
            optional(|p| p.mom_id.as_deref()),
        ),
        Column::new(
            PedigreeColumns::Sex.as_str().into(),
            persons.iter().map(|p| p.sex.value() as i8).collect::<Vec<_>>(),
        ),
        Column::new(
            PedigreeColumns::Status.as_str().into(),
            persons.iter().map(|p| p.status.value() as i8).collect::<Vec<_>>(),
        ),
        Column::new(
            PedigreeColumns::Role.as_str().into(),
            persons.iter().map(|p| p.role.value() as i32).collect::<Vec<_>>(),
        ),
        Column::new(
            PedigreeColumns::SampleId.as_str().into(),
            optional(|p| p.sample_id.as_deref()),
        ),
        Column::new(
            PedigreeColumns::Generated.as_str().into(),
            persons.iter().map(|p| p.generated).collect::<Vec<_>>(),
        ),
        Column::new(
            PedigreeColumns::Layout.as_str().into(),
            optional(|p| p.layout.as_deref()),
        ),
        Column::new(
            PedigreeColumns::NotSequenced.as_str().into(),
            persons.iter().map(|p| p.not_sequenced).collect::<Vec<_>>(),
        ),
    ];
    let mut frame = DataFrame::new(columns).map_err(|e| StorageError::partial_write(&path, e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::partial_write(parent, e))?;
    }
    let file = File::create(&path).map_err(|e| StorageError::partial_write(&path, e))?;
    ParquetWriter::new(file)
        .finish(&mut frame)
        .map_err(|e| StorageError::partial_write(&path, e))?;
    debug!("Wrote {} persons to {}", frame.height(), path.display());
    Ok(())
}

fn read_error(
    path: &Path,
    reason: impl std::fmt::Display,
) -> StorageError {
    StorageError::SchemaMismatch(format!(
        "pedigree table {}: {}",
        path.display(),
        reason
    ))
}

/// Reads the pedigree table back into families.
///
/// Unknown bit values fall back to the unspecified/unknown variant.
pub fn read_pedigree(root: &Path) -> StorageResult<FamiliesData> {
    let path = pedigree_path(root);
    let file = File::open(&path).map_err(|e| {
        StorageError::backend(
            "parquet",
            format!("cannot open {}: {}", path.display(), e),
        )
    })?;
    let frame = ParquetReader::new(file)
        .finish()
        .map_err(|e| read_error(&path, e))?;

    let strings = |c: PedigreeColumns| {
        frame
            .column(c.as_str())
            .and_then(|col| col.str().cloned())
            .map_err(|e| read_error(&path, e))
    };
    let family_id = strings(PedigreeColumns::FamilyId)?;
    let person_id = strings(PedigreeColumns::PersonId)?;
    let dad_id = strings(PedigreeColumns::DadId)?;
    let mom_id = strings(PedigreeColumns::MomId)?;
    let sample_id = strings(PedigreeColumns::SampleId)?;
    let layout = strings(PedigreeColumns::Layout)?;

    let column = |c: PedigreeColumns| {
        frame
            .column(c.as_str())
            .map_err(|e| read_error(&path, e))
    };
    let sex = column(PedigreeColumns::Sex)?.i8().map_err(|e| read_error(&path, e))?;
    let status = column(PedigreeColumns::Status)?.i8().map_err(|e| read_error(&path, e))?;
    let role = column(PedigreeColumns::Role)?.i32().map_err(|e| read_error(&path, e))?;
    let generated = column(PedigreeColumns::Generated)?.bool().map_err(|e| read_error(&path, e))?;
    let not_sequenced = column(PedigreeColumns::NotSequenced)?
        .bool()
        .map_err(|e| read_error(&path, e))?;

    let mut persons = Vec::with_capacity(frame.height());
    for idx in 0..frame.height() {
        let (Some(fid), Some(pid)) = (family_id.get(idx), person_id.get(idx)) else {
            return Err(read_error(&path, format!("row {} has no family or person id", idx)));
        };
        let mut person = Person::new(
            fid,
            pid,
            role.get(idx)
                .and_then(|v| Role::from_value(v as u32))
                .unwrap_or_default(),
            sex.get(idx)
                .and_then(|v| Sex::from_value(v as u32))
                .unwrap_or_default(),
            status
                .get(idx)
                .and_then(|v| Status::from_value(v as u32))
                .unwrap_or_default(),
        );
        person.dad_id = dad_id.get(idx).map(String::from);
        person.mom_id = mom_id.get(idx).map(String::from);
        person.sample_id = sample_id.get(idx).map(String::from);
        person.layout = layout.get(idx).map(String::from);
        person.generated = generated.get(idx).unwrap_or(false);
        person.not_sequenced = not_sequenced.get(idx).unwrap_or(false);
        persons.push(person);
    }

    debug!("Read {} persons from {}", persons.len(), path.display());
    FamiliesData::from_persons(persons).map_err(|e| read_error(&path, e))
}
