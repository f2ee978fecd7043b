mod enums_tests {
    use std::str::FromStr;

    use crate::data_structs::enums::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("prb").unwrap(), Role::Prb);
        assert_eq!(Role::from_str("Proband").unwrap(), Role::Prb);
        assert_eq!(Role::from_str("MOM").unwrap(), Role::Mom);
        assert_eq!(Role::from_str("step_dad").unwrap(), Role::StepDad);
        assert!(Role::from_str("uncle_bob").is_err());
    }

    #[test]
    fn test_bit_values() {
        assert_eq!(Role::Mom.value(), 16);
        assert_eq!(Role::Prb.value(), 128);
        assert_eq!(Role::Unknown.value(), 1 << 25);
        assert_eq!(Sex::Female.value(), 2);
        assert_eq!(Status::Affected.value(), 2);
        assert_eq!(Inheritance::Denovo.value(), 4);
        assert_eq!(Inheritance::Unknown.value(), 256);
        assert_eq!(VariantType::Complex.value(), 8);
        assert_eq!(TransmissionType::Denovo.value(), 2);
    }

    #[test]
    fn test_mask_roundtrip() {
        let mask = Role::mask(&[Role::Prb, Role::Sib]);
        assert_eq!(mask, 384);
        assert_eq!(Role::from_mask(mask), vec![Role::Prb, Role::Sib]);
        assert_eq!(Inheritance::from_value(16), Some(Inheritance::Omission));
        assert_eq!(Inheritance::from_value(3), None);
    }

    #[test]
    fn test_sex_aliases() {
        assert_eq!(Sex::from_str("M").unwrap(), Sex::Male);
        assert_eq!(Sex::from_str("2").unwrap(), Sex::Female);
        assert_eq!(Sex::from_str("0").unwrap(), Sex::Unspecified);
    }

    #[test]
    fn test_enum_serde_as_string() {
        let json = serde_json::to_string(&Inheritance::PossibleDenovo).unwrap();
        assert_eq!(json, "\"possible_denovo\"");
        let back: Inheritance = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Inheritance::PossibleDenovo);
    }
}

mod region_tests {
    use rstest::rstest;

    use crate::data_structs::Region;

    #[rstest]
    #[case::closed("chr1:100-200", Region::new("chr1", Some(100), Some(200)))]
    #[case::open_stop("chr1:100-", Region::new("chr1", Some(100), None))]
    #[case::open_start("chr1:-200", Region::new("chr1", None, Some(200)))]
    #[case::point("chr1:150", Region::new("chr1", Some(150), Some(150)))]
    #[case::whole("chrX", Region::whole("chrX"))]
    #[case::commas("1:1,000-2,000", Region::new("1", Some(1000), Some(2000)))]
    fn parse_region(
        #[case] input: &str,
        #[case] expected: Region,
    ) {
        assert_eq!(input.parse::<Region>().unwrap(), expected);
    }

    #[rstest]
    #[case("chr1:200-100")]
    #[case("chr1:abc")]
    #[case("")]
    fn parse_region_fails(#[case] input: &str) {
        assert!(input.parse::<Region>().is_err());
    }

    #[test]
    fn overlap_with_null_end() {
        let region: Region = "chr1:100-200".parse().unwrap();
        assert!(region.overlaps("chr1", 100, None));
        assert!(region.overlaps("chr1", 90, Some(100)));
        assert!(!region.overlaps("chr1", 90, None));
        assert!(!region.overlaps("chr1", 201, Some(300)));
        assert!(!region.overlaps("chr2", 150, None));
    }
}

mod variant_tests {
    use std::collections::BTreeMap;

    use rstest::rstest;

    use crate::data_structs::*;

    fn alt(
        position: u32,
        reference: &str,
        alternative: &str,
    ) -> SummaryAllele {
        SummaryAllele::new("chr1", position, reference, Some(alternative.to_string()))
    }

    #[rstest]
    #[case::single(vec![alt(100, "A", "G")])]
    #[case::multi(vec![alt(100, "A", "G"), alt(100, "A", "T"), alt(100, "A", "AC")])]
    #[case::with_reference(vec![
        SummaryAllele::new("chr1", 100, "A", None),
        alt(100, "A", "G"),
    ])]
    fn from_records_invariants(#[case] records: Vec<SummaryAllele>) {
        let variant = SummaryVariant::from_records(records).unwrap();
        let count = variant.allele_count();

        assert_eq!(variant.alleles()[0].allele_index(), 0);
        assert!(variant.ref_allele().alternative().is_none());
        assert_eq!(variant.alt_alleles().len(), count - 1);
        for (index, allele) in variant.alleles().iter().enumerate() {
            assert_eq!(allele.allele_index(), index);
            assert_eq!(allele.allele_count(), count);
        }
    }

    #[test]
    fn from_records_rejects_mixed_positions() {
        let result = SummaryVariant::from_records(vec![alt(100, "A", "G"), alt(101, "C", "T")]);
        assert!(result.is_err());
        assert!(SummaryVariant::from_records(vec![]).is_err());
    }

    #[test]
    fn from_records_rejects_mixed_null_alternatives() {
        let result = SummaryVariant::from_records(vec![
            alt(100, "A", "G"),
            SummaryAllele::new("chr1", 100, "A", None),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn alternative_joins_alts() {
        let variant =
            SummaryVariant::from_records(vec![alt(100, "A", "G"), alt(100, "A", "T")]).unwrap();
        assert_eq!(variant.alternative().as_deref(), Some("G,T"));
        assert_eq!(variant.svuid(), "chr1:100.A.G,T");
    }

    #[test]
    fn location_uses_end_position() {
        let variant = SummaryVariant::from_records(vec![
            alt(100, "ACG", "A").with_end_position(Some(102)),
        ])
        .unwrap();
        assert_eq!(variant.location(), "chr1:100-102");
    }

    #[test]
    fn update_attributes_broadcasts_single_value() {
        let mut variant =
            SummaryVariant::from_records(vec![alt(100, "A", "G"), alt(100, "A", "T")]).unwrap();
        variant.update_attributes(BTreeMap::from([(
            "af_allele_count".to_string(),
            vec![AttrValue::Int(3)],
        )]));
        for allele in variant.alt_alleles() {
            assert_eq!(allele.get_attribute("af_allele_count"), Some(&AttrValue::Int(3)));
        }
        assert!(variant.ref_allele().get_attribute("af_allele_count").is_none());
    }

    #[test]
    fn update_attributes_zips_per_allele_values() {
        let mut variant =
            SummaryVariant::from_records(vec![alt(100, "A", "G"), alt(100, "A", "T")]).unwrap();
        variant.update_attributes(BTreeMap::from([(
            "score".to_string(),
            vec![AttrValue::Float(0.5), AttrValue::Float(1.5)],
        )]));
        assert_eq!(variant.alleles()[1].get_real("score"), Some(0.5));
        assert_eq!(variant.alleles()[2].get_real("score"), Some(1.5));
    }

    #[test]
    #[should_panic(expected = "has 2 values for 3 alternate alleles")]
    fn update_attributes_contract_violation() {
        let mut variant = SummaryVariant::from_records(vec![
            alt(100, "A", "G"),
            alt(100, "A", "T"),
            alt(100, "A", "C"),
        ])
        .unwrap();
        variant.update_attributes(BTreeMap::from([(
            "score".to_string(),
            vec![AttrValue::Int(1), AttrValue::Int(2)],
        )]));
    }

    #[rstest]
    #[case::substitution("A", "G", 100, "sub(A->G)", VariantType::Substitution)]
    #[case::insertion("A", "ATT", 101, "ins(TT)", VariantType::SmallInsertion)]
    #[case::deletion("ACGT", "A", 101, "del(3)", VariantType::SmallDeletion)]
    #[case::complex("AC", "GT", 100, "comp(AC->GT)", VariantType::Complex)]
    #[case::trimmed_suffix("AGT", "CGT", 100, "sub(A->C)", VariantType::Substitution)]
    fn cshl_details(
        #[case] reference: &str,
        #[case] alternative: &str,
        #[case] position: u32,
        #[case] expected: &str,
        #[case] variant_type: VariantType,
    ) {
        let allele = alt(100, reference, alternative);
        let details = allele.details().unwrap();
        assert_eq!(details.variant, expected);
        assert_eq!(details.position, position);
        assert_eq!(allele.variant_type(), Some(variant_type));
    }

    #[test]
    fn effects_are_parsed_lazily() {
        let allele = alt(100, "A", "G")
            .with_attribute("effects", "missense!SAMD11:missense|NOC2L:intron!NM_1");
        let effects = allele.effects().unwrap();
        assert_eq!(effects.worst, "missense");
        assert_eq!(effects.gene_symbols(), vec!["SAMD11", "NOC2L"]);
        assert_eq!(allele.effect_types(), vec!["missense", "intron"]);
    }

    #[test]
    fn merge_counters_combines_studies() {
        let mut first = SummaryVariant::from_records(vec![alt(100, "A", "G")
            .with_attribute("seen_in_status", 1)
            .with_attribute("seen_as_denovo", false)
            .with_attribute("family_variants_count", 2)])
        .unwrap();
        let second = SummaryVariant::from_records(vec![alt(100, "A", "G")
            .with_attribute("seen_in_status", 2)
            .with_attribute("seen_as_denovo", true)
            .with_attribute("family_variants_count", 3)])
        .unwrap();

        first.merge_counters(&second);
        let allele = &first.alleles()[1];
        assert_eq!(allele.get_attribute("seen_in_status"), Some(&AttrValue::Int(3)));
        assert_eq!(allele.get_attribute("seen_as_denovo"), Some(&AttrValue::Bool(true)));
        assert_eq!(
            allele.get_attribute("family_variants_count"),
            Some(&AttrValue::Int(5))
        );
    }
}

mod inheritance_tests {
    use rstest::rstest;

    use crate::data_structs::inheritance::*;
    use crate::data_structs::Inheritance;

    type Gt = [i8; 2];

    #[rstest]
    // AA, AA -> AC
    #[case([0, 0], [0, 0], [0, 1], 1, true)]
    #[case([0, 0], [0, 0], [0, 1], 0, false)]
    // AA, AA -> CA
    #[case([0, 0], [0, 0], [1, 0], 1, true)]
    #[case([0, 0], [0, 0], [1, 0], 0, false)]
    // CC, CC -> CA
    #[case([1, 1], [1, 1], [1, 0], 0, true)]
    #[case([1, 1], [1, 1], [1, 0], 1, false)]
    // CC, CC -> AA
    #[case([1, 1], [1, 1], [0, 0], 0, true)]
    #[case([1, 1], [1, 1], [0, 0], 1, false)]
    // GG, GG -> AC
    #[case([2, 2], [2, 2], [0, 1], 0, true)]
    #[case([2, 2], [2, 2], [0, 1], 1, true)]
    #[case([2, 2], [2, 2], [0, 1], 2, false)]
    // CC, CC -> GC
    #[case([1, 1], [1, 1], [2, 1], 2, true)]
    #[case([1, 1], [1, 1], [2, 1], 1, false)]
    #[case([1, 1], [1, 1], [2, 1], 0, false)]
    // CC, AA -> AA
    #[case([1, 1], [0, 0], [0, 0], 0, false)]
    #[case([1, 1], [0, 0], [0, 0], 1, false)]
    // AA, AC -> AG and friends
    #[case([0, 0], [0, 1], [0, 2], 2, true)]
    #[case([0, 0], [0, 1], [0, 2], 0, false)]
    #[case([0, 0], [0, 1], [0, 2], 1, false)]
    #[case([0, 1], [0, 0], [0, 2], 2, true)]
    #[case([0, 1], [0, 0], [0, 2], 0, false)]
    #[case([0, 1], [0, 0], [0, 2], 1, false)]
    #[case([0, 0], [0, 1], [2, 0], 2, true)]
    #[case([0, 0], [0, 1], [2, 0], 0, false)]
    #[case([0, 0], [0, 1], [2, 0], 1, false)]
    #[case([0, 1], [0, 0], [2, 0], 2, true)]
    #[case([0, 1], [0, 0], [2, 0], 0, false)]
    #[case([0, 1], [0, 0], [2, 0], 1, false)]
    #[case([0, 1], [0, 1], [0, 2], 2, true)]
    #[case([0, 1], [0, 1], [0, 2], 0, false)]
    #[case([0, 1], [0, 1], [0, 2], 1, false)]
    #[case([0, 1], [0, 1], [1, 2], 2, true)]
    #[case([0, 1], [0, 1], [1, 2], 0, false)]
    #[case([0, 1], [0, 1], [1, 2], 1, false)]
    // AC AA TG
    #[case([0, 1], [0, 0], [2, 3], 0, false)]
    #[case([0, 1], [0, 0], [2, 3], 1, false)]
    #[case([0, 1], [0, 0], [2, 3], 2, true)]
    #[case([0, 1], [0, 0], [2, 3], 3, true)]
    // AA AC TG
    #[case([0, 0], [0, 1], [2, 3], 0, false)]
    #[case([0, 0], [0, 1], [2, 3], 1, false)]
    #[case([0, 0], [0, 1], [2, 3], 2, true)]
    #[case([0, 0], [0, 1], [2, 3], 3, true)]
    // CC, AA -> GG
    #[case([1, 1], [0, 0], [2, 2], 0, false)]
    #[case([1, 1], [0, 0], [2, 2], 1, false)]
    #[case([1, 1], [0, 0], [2, 2], 2, true)]
    // CC, AA -> GC
    #[case([1, 1], [0, 0], [2, 1], 0, false)]
    #[case([1, 1], [0, 0], [2, 1], 1, false)]
    #[case([1, 1], [0, 0], [2, 1], 2, true)]
    // CC, AA -> AG
    #[case([1, 1], [0, 0], [0, 2], 0, false)]
    #[case([1, 1], [0, 0], [0, 2], 1, false)]
    #[case([1, 1], [0, 0], [0, 2], 2, true)]
    // CC, CC -> AC
    #[case([1, 1], [1, 1], [0, 1], 0, true)]
    // AA, CC -> AA
    #[case([0, 0], [1, 1], [0, 0], 1, false)]
    #[case([0, 0], [1, 1], [0, 0], 0, false)]
    fn denovo_truth_table(
        #[case] p1: Gt,
        #[case] p2: Gt,
        #[case] ch: Gt,
        #[case] allele: i8,
        #[case] expected: bool,
    ) {
        assert_eq!(check_denovo(&p1, &p2, &ch, allele), expected);
    }

    #[rstest]
    // CC, AA -> AA
    #[case([1, 1], [0, 0], [0, 0], 1, true)]
    #[case([1, 1], [0, 0], [0, 0], 0, false)]
    // AA, CC -> AA
    #[case([0, 0], [1, 1], [0, 0], 1, true)]
    #[case([0, 0], [1, 1], [0, 0], 0, false)]
    // AA, CC -> CC
    #[case([0, 0], [1, 1], [1, 1], 0, true)]
    #[case([0, 0], [1, 1], [1, 1], 1, false)]
    #[case([1, 1], [0, 0], [1, 1], 0, true)]
    #[case([1, 1], [0, 0], [1, 1], 1, false)]
    // AC AA CC
    #[case([0, 1], [0, 0], [1, 1], 0, true)]
    #[case([0, 1], [0, 0], [1, 1], 1, false)]
    // novel allele in the child absorbs the shortfall
    #[case([0, 0], [0, 1], [0, 2], 0, false)]
    #[case([0, 0], [0, 1], [0, 2], 1, false)]
    #[case([0, 0], [0, 1], [0, 2], 2, false)]
    #[case([0, 1], [0, 0], [0, 2], 0, false)]
    #[case([0, 1], [0, 0], [0, 2], 1, false)]
    #[case([0, 1], [0, 0], [0, 2], 2, false)]
    #[case([0, 0], [0, 1], [2, 0], 0, false)]
    #[case([0, 0], [0, 1], [2, 0], 1, false)]
    #[case([0, 0], [0, 1], [2, 0], 2, false)]
    #[case([0, 1], [0, 0], [2, 0], 0, false)]
    #[case([0, 1], [0, 0], [2, 0], 1, false)]
    #[case([0, 1], [0, 0], [2, 0], 2, false)]
    #[case([0, 1], [0, 1], [0, 2], 0, false)]
    #[case([0, 1], [0, 1], [0, 2], 1, false)]
    #[case([0, 1], [0, 1], [0, 2], 2, false)]
    #[case([0, 1], [0, 1], [1, 2], 0, false)]
    #[case([0, 1], [0, 1], [1, 2], 1, false)]
    #[case([0, 1], [0, 1], [1, 2], 2, false)]
    // AC AA TG
    #[case([0, 1], [0, 0], [2, 3], 0, true)]
    #[case([0, 1], [0, 0], [2, 3], 1, false)]
    #[case([0, 1], [0, 0], [2, 3], 2, false)]
    #[case([0, 1], [0, 0], [2, 3], 3, false)]
    // AA AC TG
    #[case([0, 0], [0, 1], [2, 3], 0, true)]
    #[case([0, 0], [0, 1], [2, 3], 1, false)]
    #[case([0, 0], [0, 1], [2, 3], 2, false)]
    #[case([0, 0], [0, 1], [2, 3], 3, false)]
    // CC, AA -> GG
    #[case([1, 1], [0, 0], [2, 2], 0, true)]
    #[case([1, 1], [0, 0], [2, 2], 1, true)]
    #[case([1, 1], [0, 0], [2, 2], 2, false)]
    // CC, AA -> GC
    #[case([1, 1], [0, 0], [2, 1], 0, true)]
    #[case([1, 1], [0, 0], [2, 1], 1, false)]
    #[case([1, 1], [0, 0], [2, 1], 2, false)]
    // CC, AA -> AG
    #[case([1, 1], [0, 0], [0, 2], 0, false)]
    #[case([1, 1], [0, 0], [0, 2], 1, true)]
    #[case([1, 1], [0, 0], [0, 2], 2, false)]
    // CC, CC -> AC
    #[case([1, 1], [1, 1], [0, 1], 1, false)]
    fn omission_truth_table(
        #[case] p1: Gt,
        #[case] p2: Gt,
        #[case] ch: Gt,
        #[case] allele: i8,
        #[case] expected: bool,
    ) {
        assert_eq!(check_omission(&p1, &p2, &ch, allele), expected);
    }

    #[rstest]
    // AC AA AA
    #[case([0, 1], [0, 0], [0, 0], 0, true)]
    #[case([0, 1], [0, 0], [0, 0], 1, false)]
    // AC AA AC
    #[case([0, 1], [0, 0], [0, 1], 0, true)]
    #[case([0, 1], [0, 0], [0, 1], 1, true)]
    // AC AC AA
    #[case([0, 1], [0, 1], [0, 0], 0, true)]
    #[case([0, 1], [0, 1], [0, 0], 1, false)]
    // AC AC AC
    #[case([0, 1], [0, 1], [0, 1], 0, true)]
    #[case([0, 1], [0, 1], [0, 1], 1, true)]
    // AC AC CC
    #[case([0, 1], [0, 1], [1, 1], 1, true)]
    #[case([0, 1], [0, 1], [1, 1], 0, false)]
    // AC AT AA
    #[case([0, 1], [0, 2], [0, 0], 0, true)]
    #[case([0, 1], [0, 2], [0, 0], 1, false)]
    #[case([0, 1], [0, 2], [0, 0], 2, false)]
    // AC AT AT
    #[case([0, 1], [0, 2], [0, 2], 0, true)]
    #[case([0, 1], [0, 2], [0, 2], 1, false)]
    #[case([0, 1], [0, 2], [0, 2], 2, true)]
    // AC AT AC
    #[case([0, 1], [0, 2], [0, 1], 0, true)]
    #[case([0, 1], [0, 2], [0, 1], 1, true)]
    #[case([0, 1], [0, 2], [0, 1], 2, false)]
    // AC AT CT
    #[case([0, 1], [0, 2], [1, 2], 0, false)]
    #[case([0, 1], [0, 2], [1, 2], 1, true)]
    #[case([0, 1], [0, 2], [1, 2], 2, true)]
    // AA CC AA
    #[case([0, 0], [1, 1], [0, 0], 1, false)]
    #[case([0, 0], [1, 1], [0, 0], 0, true)]
    // CC, AA -> GG / GC / AG
    #[case([1, 1], [0, 0], [2, 2], 0, false)]
    #[case([1, 1], [0, 0], [2, 2], 1, false)]
    #[case([1, 1], [0, 0], [2, 2], 2, false)]
    #[case([1, 1], [0, 0], [2, 1], 0, false)]
    #[case([1, 1], [0, 0], [2, 1], 1, true)]
    #[case([1, 1], [0, 0], [2, 1], 2, false)]
    #[case([1, 1], [0, 0], [0, 2], 0, true)]
    #[case([1, 1], [0, 0], [0, 2], 1, false)]
    #[case([1, 1], [0, 0], [0, 2], 2, false)]
    fn mendelian_truth_table(
        #[case] p1: Gt,
        #[case] p2: Gt,
        #[case] ch: Gt,
        #[case] allele: i8,
        #[case] expected: bool,
    ) {
        assert_eq!(check_mendelian(&p1, &p2, &ch, allele), expected);
    }

    #[rstest]
    #[case::denovo([0, 0], [0, 0], [0, 1], 1, Inheritance::Denovo)]
    #[case::mendelian([0, 1], [0, 0], [0, 1], 1, Inheritance::Mendelian)]
    #[case::omission([0, 0], [1, 1], [0, 0], 1, Inheritance::Omission)]
    #[case::novel_allele([0, 0], [0, 1], [0, 2], 2, Inheritance::Denovo)]
    #[case::absorbed_shortfall([0, 0], [0, 1], [0, 2], 1, Inheritance::Other)]
    fn classify_trio(
        #[case] p1: Gt,
        #[case] p2: Gt,
        #[case] ch: Gt,
        #[case] allele: i8,
        #[case] expected: Inheritance,
    ) {
        assert_eq!(classify(&p1, &p2, &ch, allele), expected);
    }
}

mod family_variant_tests {
    use std::sync::Arc;

    use crate::data_structs::*;

    pub(crate) fn trio_family() -> Arc<Family> {
        Arc::new(
            Family::try_new("f1", vec![
                Person::new("f1", "mom1", Role::Mom, Sex::Female, Status::Unaffected),
                Person::new("f1", "dad1", Role::Dad, Sex::Male, Status::Unaffected),
                Person::new("f1", "ch1", Role::Prb, Sex::Male, Status::Affected)
                    .with_parents("mom1", "dad1"),
            ])
            .unwrap(),
        )
    }

    fn denovo_variant() -> FamilyVariant {
        let summary = SummaryVariant::from_records(vec![SummaryAllele::new(
            "chr1",
            100,
            "A",
            Some("G".into()),
        )])
        .unwrap();
        let genotype = Genotype::new(vec![[0, 0], [0, 0], [0, 1]]);
        FamilyVariant::try_new(summary, trio_family(), genotype).unwrap()
    }

    #[test]
    fn trios_are_detected() {
        let family = trio_family();
        assert!(family.trio(0).is_none());
        let trio = family.trio(2).unwrap();
        assert_eq!((trio.child, trio.mom, trio.dad), (2, 0, 1));
    }

    #[test]
    fn inheritance_in_members_denovo() {
        let fv = denovo_variant();
        let alt = fv.allele(1).unwrap();
        assert_eq!(alt.inheritance_in_members(), &[
            Inheritance::Unknown,
            Inheritance::Unknown,
            Inheritance::Denovo,
        ]);
        assert!(alt.is_denovo());
        assert_eq!(alt.allele_in_members(), vec!["ch1"]);
        assert_eq!(alt.allele_in_roles(), Role::Prb.value());
        assert_eq!(alt.allele_in_statuses(), Status::Affected.value());

        let reference = fv.ref_allele();
        assert_eq!(reference.inheritance_in_members()[2], Inheritance::Mendelian);
        assert_eq!(reference.allele_in_members(), vec!["mom1", "dad1", "ch1"]);
    }

    #[test]
    fn inheritance_unknown_and_missing() {
        let summary = SummaryVariant::from_records(vec![
            SummaryAllele::new("chr1", 100, "A", Some("G".into())),
            SummaryAllele::new("chr1", 100, "A", Some("T".into())),
        ])
        .unwrap();

        let unknown = FamilyVariant::try_new(
            summary.clone(),
            trio_family(),
            Genotype::new(vec![[0, -1], [0, 0], [0, 1]]),
        )
        .unwrap();
        assert_eq!(unknown.allele(1).unwrap().inheritance_in_members()[2], Inheritance::Unknown);

        let missing = FamilyVariant::try_new(
            summary,
            trio_family(),
            Genotype::new(vec![[0, 1], [0, 0], [0, 1]]),
        )
        .unwrap();
        assert_eq!(missing.allele(2).unwrap().inheritance_in_members()[2], Inheritance::Missing);
        assert_eq!(missing.allele(1).unwrap().inheritance_in_members()[2], Inheritance::Mendelian);
    }

    #[test]
    fn family_alleles_follow_genotype() {
        let fv = denovo_variant();
        let indexes = fv
            .family_alleles()
            .iter()
            .map(|a| a.allele_index())
            .collect::<Vec<_>>();
        assert_eq!(indexes, vec![0, 1]);
        assert_eq!(fv.fvuid(), "f1.chr1:100.A.G");
    }

    #[test]
    fn genotype_validation() {
        let summary = SummaryVariant::from_records(vec![SummaryAllele::new(
            "chr1",
            100,
            "A",
            Some("G".into()),
        )])
        .unwrap();
        let out_of_range = Genotype::new(vec![[0, 0], [0, 2], [0, 1]]);
        assert!(FamilyVariant::try_new(summary.clone(), trio_family(), out_of_range).is_err());
        let too_short = Genotype::new(vec![[0, 0], [0, 1]]);
        assert!(FamilyVariant::try_new(summary, trio_family(), too_short).is_err());
    }

    #[test]
    fn too_many_alleles_for_a_genotype() {
        let records = (0..128)
            .map(|i| SummaryAllele::new("chr1", 100, "A", Some(format!("G{}", i))))
            .collect();
        let summary = SummaryVariant::from_records(records).unwrap();
        assert_eq!(summary.allele_count(), 129);
        let genotype = Genotype::new(vec![[0, 0], [0, 0], [0, 1]]);
        let err = FamilyVariant::try_new(summary, trio_family(), genotype).unwrap_err();
        assert!(err.to_string().contains("129 alleles"));

        let records = (0..126)
            .map(|i| SummaryAllele::new("chr1", 100, "A", Some(format!("G{}", i))))
            .collect();
        let summary = SummaryVariant::from_records(records).unwrap();
        let genotype = Genotype::new(vec![[0, 0], [0, 126], [0, 126]]);
        assert!(FamilyVariant::try_new(summary, trio_family(), genotype).is_ok());
    }

    #[test]
    fn best_state_marks_unknown_columns() {
        let genotype = Genotype::new(vec![[0, 0], [0, 1], [1, 1], [-1, 0]]);
        assert_eq!(genotype.best_state(2), vec![vec![2, 1, 0, -1], vec![0, 1, 2, -1]]);
        assert!(!genotype.is_reference());
        assert!(Genotype::new(vec![[0, 0], [-1, -1]]).is_reference());
        assert!(Genotype::new(vec![[-1, -1], [-1, -1]]).is_unknown());
    }
}
