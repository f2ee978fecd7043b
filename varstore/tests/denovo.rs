mod common;

use common::*;
use varstore::prelude::*;

#[test]
fn denovo_variant_end_to_end() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    let query = VariantQuery::default().with_inheritance(vec!["denovo".to_string()]);
    let mut result = storage.query_variants(&query).unwrap();
    let variants = result.by_ref().collect::<Vec<_>>();
    assert!(result.close().iter().all(RunnerReport::is_success));

    assert_eq!(variants.len(), 1);
    let variant = &variants[0];
    assert_eq!(variant.fvuid(), "f1.chr1:100.A.G");
    assert_eq!(variant.matched_alleles_indexes(), &[1]);

    let allele = variant.allele(1).unwrap();
    assert_eq!(allele.allele_in_members(), vec!["f1_prb"]);
    let inheritance = allele.inheritance_in_members();
    assert_eq!(inheritance[2], Inheritance::Denovo);
    assert!(inheritance[..2]
        .iter()
        .all(|i| *i != Inheritance::Denovo));
}

#[test]
fn denovo_roles_query_matches_inheritance_query() {
    let dir = study("f1", WriterConfig::default());
    let storage = open(&dir);

    let by_inheritance = storage
        .query_variants(&VariantQuery::default().with_inheritance(vec!["denovo".to_string()]))
        .unwrap()
        .map(|v| v.fvuid())
        .collect::<Vec<_>>();
    let by_person = storage
        .query_variants(
            &VariantQuery::default()
                .with_inheritance(vec!["denovo".to_string()])
                .with_person_ids(vec!["f1_prb".to_string()]),
        )
        .unwrap()
        .map(|v| v.fvuid())
        .collect::<Vec<_>>();
    assert_eq!(by_inheritance, by_person);
}

#[test]
fn reference_alleles_are_returned_on_request() {
    let dir = study("f1", WriterConfig::default().with_include_reference(true));
    let storage = open(&dir);

    let query = VariantQuery::default()
        .with_regions(vec!["chr1:1-1000".parse().unwrap()])
        .with_return_reference(true);
    let variants = storage
        .query_variants(&query)
        .unwrap()
        .collect::<Vec<_>>();

    let denovo = variants
        .iter()
        .find(|v| v.location() == "chr1:100")
        .expect("chr1:100 is in the region");
    assert_eq!(denovo.matched_alleles_indexes(), &[0, 1]);
    let reference = denovo.allele(0).unwrap();
    let members = reference.allele_in_members();
    assert!(members.contains(&"f1_mom"));
    assert!(members.contains(&"f1_dad"));

    let all_reference = variants
        .iter()
        .find(|v| v.location() == "chr1:200")
        .expect("all-reference variant is stored with include_reference");
    assert_eq!(all_reference.matched_alleles_indexes(), &[0]);
}

#[test]
fn reference_alleles_are_hidden_by_default() {
    let dir = study("f1", WriterConfig::default().with_include_reference(true));
    let storage = open(&dir);

    let query = VariantQuery::default().with_regions(vec!["chr1:1-1000".parse().unwrap()]);
    let variants = storage
        .query_variants(&query)
        .unwrap()
        .collect::<Vec<_>>();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].matched_alleles_indexes(), &[1]);
}
