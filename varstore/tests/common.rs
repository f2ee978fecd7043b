#![allow(dead_code)]

use std::path::Path;

use tempfile::TempDir;
use varstore::prelude::*;

pub fn init_logger() {
    let _ = pretty_env_logger::formatted_builder()
        .is_test(true)
        .try_init();
}

pub fn descriptor() -> PartitionDescriptor {
    PartitionDescriptor::new()
        .with_region_bin(vec!["chr1".into(), "chr2".into()], 100_000)
        .with_frequency_bin(5.0)
        .with_coding_bin(vec!["missense".into(), "synonymous".into()])
        .with_family_bin(10)
}

pub fn chrom_lengths() -> ChromLengths {
    ChromLengths::from([
        ("chr1".to_string(), 250_000),
        ("chr2".to_string(), 100_000),
    ])
}

pub fn person_id(
    family_id: &str,
    role: &str,
) -> String {
    format!("{}_{}", family_id, role)
}

/// Mom, dad and an affected proband, in that member order.
pub fn trio(family_id: &str) -> FamiliesData {
    FamiliesData::from_persons(vec![
        Person::new(
            family_id,
            person_id(family_id, "mom"),
            Role::Mom,
            Sex::Female,
            Status::Unaffected,
        ),
        Person::new(
            family_id,
            person_id(family_id, "dad"),
            Role::Dad,
            Sex::Male,
            Status::Unaffected,
        ),
        Person::new(
            family_id,
            person_id(family_id, "prb"),
            Role::Prb,
            Sex::Male,
            Status::Affected,
        )
        .with_parents(person_id(family_id, "mom"), person_id(family_id, "dad")),
    ])
    .unwrap()
}

fn summary(allele: SummaryAllele) -> SummaryVariant {
    SummaryVariant::from_records(vec![allele]).unwrap()
}

/// Four variants of one trio:
///
/// - `chr1:100 A>G` de novo in the proband, missense in SCN1A;
/// - `chr1:200 C>T` reference in everyone;
/// - `chr1:150000 G>T` ultra rare, transmitted from dad, missense in GENE3;
/// - `chr2:5000 C>A` common, transmitted from mom, intronic in GENE2.
pub fn trio_variants() -> Vec<(SummaryVariant, Genotype)> {
    vec![
        (
            summary(
                SummaryAllele::new("chr1", 100, "A", Some("G".into()))
                    .with_attribute("effects", "missense!SCN1A:missense"),
            ),
            Genotype::new(vec![[0, 0], [0, 0], [0, 1]]),
        ),
        (
            summary(SummaryAllele::new("chr1", 200, "C", Some("T".into()))),
            Genotype::new(vec![[0, 0], [0, 0], [0, 0]]),
        ),
        (
            summary(
                SummaryAllele::new("chr1", 150_000, "G", Some("T".into()))
                    .with_attribute("effects", "missense!GENE3:missense")
                    .with_attribute("af_allele_count", 1i64)
                    .with_attribute("af_allele_freq", 0.1)
                    .with_attribute("cadd", 25.0),
            ),
            Genotype::new(vec![[0, 0], [0, 1], [0, 1]]),
        ),
        (
            summary(
                SummaryAllele::new("chr2", 5_000, "C", Some("A".into()))
                    .with_attribute("effects", "intron!GENE2:intron")
                    .with_attribute("af_allele_count", 40i64)
                    .with_attribute("af_allele_freq", 12.0),
            ),
            Genotype::new(vec![[0, 1], [0, 0], [0, 1]]),
        ),
    ]
}

pub fn write_study(
    root: &Path,
    family_id: &str,
    config: WriterConfig,
) {
    let families = trio(family_id);
    let family = families.get(family_id).unwrap().clone();
    let config =
        config.with_annotation(vec![AnnotationAttribute::new("cadd", AnnotationType::Float)]);
    let mut writer = VariantsParquetWriter::try_new(root, descriptor(), families, config)
        .unwrap()
        .with_chrom_lengths(chrom_lengths());
    for (summary, genotype) in trio_variants() {
        let fv = FamilyVariant::try_new(summary.clone(), family.clone(), genotype).unwrap();
        writer.write(summary, vec![fv]).unwrap();
    }
    writer.close().unwrap();
}

pub fn study(
    family_id: &str,
    config: WriterConfig,
) -> TempDir {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    write_study(dir.path(), family_id, config);
    dir
}

pub fn open(dir: &TempDir) -> ParquetGenotypeStorage {
    ParquetGenotypeStorage::open(StorageConfig::new(dir.path())).unwrap()
}

pub fn positions<I>(variants: I) -> Vec<u32>
where
    I: IntoIterator<Item = SummaryVariant>, {
    let mut positions = variants
        .into_iter()
        .map(|v| v.position())
        .collect::<Vec<_>>();
    positions.sort_unstable();
    positions
}
