mod common;

use common::*;
use varstore::io::write::SUMMARY_DIR;
use varstore::prelude::*;
use varstore::query::backend::list_partition_files;
use varstore::query::{
    ParquetBackend,
    VariantsBackend,
};

#[test]
fn unselective_scan_is_split_by_region() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    let compiled = storage
        .compile_summary_query(&VariantQuery::default())
        .unwrap();
    let regions = compiled
        .batches()
        .iter()
        .map(|b| b.region_bins.clone())
        .collect::<Vec<_>>();
    assert_eq!(
        regions,
        vec![
            vec!["chr1_0".to_string()],
            vec!["chr1_1".to_string()],
            vec!["chr1_2".to_string()],
            vec!["chr2_0".to_string()],
        ]
    );

    let backend = ParquetBackend::new("pruning", dir.path());
    let mut connection = backend.connect().unwrap();
    let rows = compiled
        .batches()
        .iter()
        .map(|batch| {
            connection
                .execute(&compiled, batch)
                .unwrap()
                .map(Result::unwrap)
                .count()
        })
        .collect::<Vec<_>>();
    assert_eq!(rows, vec![1, 1, 0, 1]);
}

#[test]
fn only_written_partitions_have_files() {
    let dir = study("f1", WriterConfig::default());
    let files = list_partition_files(dir.path(), SUMMARY_DIR).unwrap();
    assert_eq!(files.len(), 3);
    assert!(files
        .iter()
        .all(|f| f.partition.iter().any(|(name, _)| name == "region_bin")));
}

#[test]
fn denovo_family_query_reads_denovo_partition_only() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    let compiled = storage
        .compile_family_query(&VariantQuery::default().with_inheritance(vec!["denovo".to_string()]))
        .unwrap();
    assert!(!compiled.batches().is_empty());
    assert!(compiled
        .batches()
        .iter()
        .all(|b| b.frequency_bins == vec!["0".to_string()]));

    let sql = compiled.to_sql("summary", "family");
    assert_eq!(sql.len(), compiled.batches().len());
    assert!(sql[0].contains("fa.frequency_bin IN (0)"));
}

#[test]
fn region_query_is_a_single_batch() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    let compiled = storage
        .compile_summary_query(
            &VariantQuery::default().with_regions(vec!["chr1:1-150000".parse().unwrap()]),
        )
        .unwrap();
    assert_eq!(compiled.batches().len(), 1);
    assert_eq!(
        compiled.batches()[0].region_bins,
        vec!["chr1_0".to_string(), "chr1_1".to_string()]
    );
}

#[test]
fn limit_is_over_fetched() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    let compiled = storage
        .compile_summary_query(&VariantQuery::default().with_limit(Some(3)))
        .unwrap();
    assert_eq!(compiled.limit(), Some(30));
}

#[test]
fn scan_stops_at_limit_across_row_groups() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let families = trio("f1");
    let family = families.get("f1").unwrap().clone();
    let mut writer = VariantsParquetWriter::try_new(
        dir.path(),
        descriptor(),
        families,
        WriterConfig::default().with_row_group_size(4),
    )
    .unwrap()
    .with_chrom_lengths(chrom_lengths());
    for position in 1_000..1_025 {
        let summary = SummaryVariant::from_records(vec![SummaryAllele::new(
            "chr1",
            position,
            "A",
            Some("C".into()),
        )])
        .unwrap();
        let genotype = Genotype::new(vec![[0, 0], [0, 0], [0, 1]]);
        let fv = FamilyVariant::try_new(summary.clone(), family.clone(), genotype).unwrap();
        writer.write(summary, vec![fv]).unwrap();
    }
    writer.close().unwrap();
    assert_eq!(
        list_partition_files(dir.path(), SUMMARY_DIR)
            .unwrap()
            .len(),
        1
    );

    let storage = ParquetGenotypeStorage::open(StorageConfig::new(dir.path())).unwrap();
    let backend = ParquetBackend::new("limit", dir.path());
    let mut connection = backend.connect().unwrap();
    let mut count_rows = |query: &VariantQuery| {
        let compiled = storage.compile_summary_query(query).unwrap();
        compiled
            .batches()
            .iter()
            .map(|batch| {
                connection
                    .execute(&compiled, batch)
                    .unwrap()
                    .map(Result::unwrap)
                    .count()
            })
            .sum::<usize>()
    };
    assert_eq!(count_rows(&VariantQuery::default()), 25);
    assert_eq!(count_rows(&VariantQuery::default().with_limit(Some(2))), 20);

    let positions = positions(
        storage
            .query_summary_variants(&VariantQuery::default().with_limit(Some(3)))
            .unwrap(),
    );
    assert_eq!(positions, vec![1_000, 1_001, 1_002]);
}
