mod common;

use std::fs;

use common::*;
use rstest::rstest;
use varstore::prelude::*;

fn summary_positions(
    storage: &ParquetGenotypeStorage,
    query: &VariantQuery,
) -> Vec<u32> {
    positions(storage.query_summary_variants(query).unwrap())
}

fn family_positions(
    storage: &ParquetGenotypeStorage,
    query: &VariantQuery,
) -> Vec<u32> {
    let mut positions = storage
        .query_variants(query)
        .unwrap()
        .map(|v| v.summary().position())
        .collect::<Vec<_>>();
    positions.sort_unstable();
    positions
}

#[test]
fn opens_written_dataset() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    assert!(!storage.is_closed());
    assert_eq!(storage.codec(), BlobCodec::Json);
    assert_eq!(storage.families().get("f1").unwrap().len(), 3);
    assert_eq!(storage.descriptor(), &descriptor());
    assert_eq!(
        storage
            .genome()
            .unwrap()
            .chrom_length("chr1"),
        Some(250_000)
    );
    assert!(storage.summary_schema().get("cadd").is_some());
    assert_eq!(
        storage.id(),
        dir.path().file_name().unwrap().to_str().unwrap()
    );
}

#[test]
fn default_summary_query_skips_reference_only_variants() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);
    assert_eq!(
        summary_positions(&storage, &VariantQuery::default()),
        vec![100, 5_000, 150_000]
    );
}

#[rstest]
#[case::rare_frequency(
    VariantQuery::default().with_frequency_filter(vec![("af_allele_freq".into(), (None, Some(1.0)))]),
    vec![100, 150_000]
)]
#[case::annotation_attr(
    VariantQuery::default().with_real_attr_filter(vec![("cadd".into(), (Some(20.0), None))]),
    vec![150_000]
)]
#[case::ultra_rare(VariantQuery::default().with_ultra_rare(true), vec![100, 150_000])]
#[case::gene(VariantQuery::default().with_genes(vec!["GENE2".into()]), vec![5_000])]
#[case::effect_type(
    VariantQuery::default().with_effect_types(vec!["missense".into()]),
    vec![100, 150_000]
)]
#[case::region(
    VariantQuery::default().with_regions(vec!["chr1:100000-200000".parse().unwrap()]),
    vec![150_000]
)]
#[case::variant_type(VariantQuery::default().with_variant_type("del"), vec![])]
fn summary_filters(
    #[case] query: VariantQuery,
    #[case] expected: Vec<u32>,
) {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);
    assert_eq!(summary_positions(&storage, &query), expected);
}

#[rstest]
#[case::mom("mom", vec![5_000])]
#[case::dad("dad", vec![150_000])]
#[case::prb_not_parents("prb and not mom and not dad", vec![100])]
#[case::prb("prb", vec![100, 5_000, 150_000])]
fn family_role_filters(
    #[case] roles: &str,
    #[case] expected: Vec<u32>,
) {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);
    let query = VariantQuery::default().with_roles(roles);
    assert_eq!(family_positions(&storage, &query), expected);
}

#[test]
fn family_status_and_sex_filters() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    let females = VariantQuery::default().with_sexes("female");
    assert_eq!(family_positions(&storage, &females), vec![5_000]);

    let unaffected = VariantQuery::default().with_affected_status("unaffected");
    assert_eq!(family_positions(&storage, &unaffected), vec![5_000, 150_000]);

    let unknown_family = VariantQuery::default().with_family_ids(vec!["f9".into()]);
    assert!(family_positions(&storage, &unknown_family).is_empty());
}

#[test]
fn binary_codec_dataset() {
    let dir = study("f1", WriterConfig::default().with_codec(BlobCodec::Binary));
    let storage = open(&dir);
    assert_eq!(storage.codec(), BlobCodec::Binary);

    let variants = storage
        .query_variants(&VariantQuery::default())
        .unwrap()
        .collect::<Vec<_>>();
    assert_eq!(variants.len(), 3);
    assert!(variants
        .iter()
        .any(|v| v.fvuid() == "f1.chr1:100.A.G"));
}

#[test]
fn summary_limit() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    let mut result = storage
        .query_summary_variants(&VariantQuery::default().with_limit(Some(2)))
        .unwrap();
    let variants = result.by_ref().collect::<Vec<_>>();
    assert_eq!(variants.len(), 2);
    assert_eq!(result.close().len(), 1);
    assert_eq!(result.state(), QueryState::Done);
}

#[test]
fn malformed_expression_fails_before_running() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);
    let query = VariantQuery::default().with_roles("prb &");
    assert!(matches!(
        storage.query_variants(&query),
        Err(StorageError::Query(_))
    ));
}

#[test]
fn unknown_attribute_fails_before_running() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);
    let query =
        VariantQuery::default().with_real_attr_filter(vec![("no_such_score".into(), (None, Some(1.0)))]);
    assert!(storage.query_summary_variants(&query).is_err());
}

#[test]
fn closed_storage_rejects_queries() {
    let dir = study("f1", WriterConfig::default());
    let mut storage = open(&dir);
    storage.close();
    storage.close();

    assert!(storage.is_closed());
    assert!(storage.genome().is_none());
    assert!(matches!(
        storage.query_summary_variants(&VariantQuery::default()),
        Err(StorageError::Configuration(_))
    ));
}

#[test]
fn open_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing");
    assert!(matches!(
        ParquetGenotypeStorage::open(StorageConfig::new(&missing)),
        Err(StorageError::Configuration(_))
    ));

    let empty = dir.path().join("empty");
    fs::create_dir(&empty).unwrap();
    assert!(matches!(
        ParquetGenotypeStorage::open(StorageConfig::new(&empty)),
        Err(StorageError::Configuration(_))
    ));
}

#[test]
fn missing_pedigree_opens_with_no_families() {
    let dir = study("f1", WriterConfig::default());
    fs::remove_file(varstore::io::pedigree::pedigree_path(dir.path())).unwrap();

    let storage = open(&dir);
    assert!(storage.families().get("f1").is_none());
    assert_eq!(
        summary_positions(&storage, &VariantQuery::default()).len(),
        3
    );
}

#[test]
fn config_from_toml_resolves_relative_root() {
    init_logger();
    let config_dir = tempfile::tempdir().unwrap();
    let data_dir = config_dir.path().join("data");
    fs::create_dir(&data_dir).unwrap();
    write_study(&data_dir, "f1", WriterConfig::default());

    let config_path = config_dir.path().join("storage.toml");
    fs::write(
        &config_path,
        "root = \"data\"\nid = \"trio\"\nqueue_capacity = 4\nover_fetch = 2\n",
    )
    .unwrap();

    let config = StorageConfig::from_toml_file(&config_path).unwrap();
    assert_eq!(config.root, data_dir);
    assert_eq!(config.queue_capacity, 4);
    assert_eq!(config.over_fetch, 2);
    assert_eq!(config.shutdown_timeout_ms, 30_000);

    let storage = ParquetGenotypeStorage::open(config).unwrap();
    assert_eq!(storage.id(), "trio");
    assert_eq!(
        summary_positions(&storage, &VariantQuery::default()),
        vec![100, 5_000, 150_000]
    );
}
