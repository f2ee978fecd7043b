use std::io::{
    BufWriter,
    Write,
};
use std::path::PathBuf;

use anyhow::anyhow;
use clap::Args;
use console::style;
use itertools::Itertools;
use log::{
    info,
    warn,
};
use varstore::prelude::*;

use crate::utils::{
    init_spinner,
    open_group,
    UtilsArgs,
};

/// `name:min:max` with either bound left empty.
fn parse_range(value: &str) -> anyhow::Result<(String, (Option<f64>, Option<f64>))> {
    let parts = value.split(':').collect_vec();
    let [name, min, max] = parts.as_slice() else {
        return Err(anyhow!("expected name:min:max, got '{}'", value));
    };
    let bound = |s: &str| -> anyhow::Result<Option<f64>> {
        if s.is_empty() {
            Ok(None)
        }
        else {
            Ok(Some(s.parse::<f64>()?))
        }
    };
    Ok((name.to_string(), (bound(min)?, bound(max)?)))
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SummaryFilterArgs {
    #[arg(
        short,
        long,
        num_args = 1..,
        help_heading = "FILTER ARGS",
        help = "Regions as chrom, chrom:start-stop, chrom:start- or chrom:pos."
    )]
    regions:          Option<Vec<String>>,
    #[arg(long, num_args = 1.., help_heading = "FILTER ARGS", help = "Gene symbols.")]
    genes:            Option<Vec<String>>,
    #[arg(long, num_args = 1.., help_heading = "FILTER ARGS", help = "Effect types.")]
    effect_types:     Option<Vec<String>>,
    #[arg(
        long,
        help_heading = "FILTER ARGS",
        help = "Variant type expression, e.g. 'sub or del'."
    )]
    variant_type:     Option<String>,
    #[arg(
        long = "real-attr",
        value_parser = parse_range,
        help_heading = "FILTER ARGS",
        help = "Numeric attribute range name:min:max. NULL values are excluded."
    )]
    real_attr:        Vec<(String, (Option<f64>, Option<f64>))>,
    #[arg(
        long = "frequency",
        value_parser = parse_range,
        help_heading = "FILTER ARGS",
        help = "Frequency range name:min:max. NULL values pass."
    )]
    frequency:        Vec<(String, (Option<f64>, Option<f64>))>,
    #[arg(long, default_value_t = false, help_heading = "FILTER ARGS", help = "Ultra rare variants only.")]
    ultra_rare:       bool,
    #[arg(long, default_value_t = false, help_heading = "FILTER ARGS", help = "Return reference alleles.")]
    return_reference: bool,
    #[arg(long, default_value_t = false, help_heading = "FILTER ARGS", help = "Return unknown genotypes.")]
    return_unknown:   bool,
    #[arg(short, long, help = "Maximum number of variants.")]
    limit:            Option<usize>,
}

impl SummaryFilterArgs {
    fn to_query(&self) -> anyhow::Result<VariantQuery> {
        let mut query = VariantQuery::default()
            .with_ultra_rare(self.ultra_rare)
            .with_return_reference(self.return_reference)
            .with_return_unknown(self.return_unknown)
            .with_limit(self.limit);
        if let Some(regions) = &self.regions {
            query = query.with_regions(
                regions
                    .iter()
                    .map(|r| r.parse::<Region>())
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        if let Some(genes) = &self.genes {
            query = query.with_genes(genes.clone());
        }
        if let Some(effect_types) = &self.effect_types {
            query = query.with_effect_types(effect_types.clone());
        }
        if let Some(variant_type) = &self.variant_type {
            query = query.with_variant_type(variant_type.as_str());
        }
        if !self.real_attr.is_empty() {
            query = query.with_real_attr_filter(self.real_attr.clone());
        }
        if !self.frequency.is_empty() {
            query = query.with_frequency_filter(self.frequency.clone());
        }
        Ok(query)
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct FamilyFilterArgs {
    #[arg(long, num_args = 1.., help_heading = "FAMILY FILTER ARGS", help = "Family ids.")]
    family_ids:      Option<Vec<String>>,
    #[arg(long, num_args = 1.., help_heading = "FAMILY FILTER ARGS", help = "Person ids.")]
    person_ids:      Option<Vec<String>>,
    #[arg(
        short,
        long,
        help_heading = "FAMILY FILTER ARGS",
        help = "Inheritance expression; repeat to AND several."
    )]
    inheritance:     Vec<String>,
    #[arg(long, help_heading = "FAMILY FILTER ARGS", help = "Roles expression, e.g. 'prb and not sib'.")]
    roles:           Option<String>,
    #[arg(long, help_heading = "FAMILY FILTER ARGS", help = "Sexes expression.")]
    sexes:           Option<String>,
    #[arg(long, help_heading = "FAMILY FILTER ARGS", help = "Affected status expression.")]
    affected_status: Option<String>,
}

impl FamilyFilterArgs {
    fn apply(
        &self,
        mut query: VariantQuery,
    ) -> VariantQuery {
        if let Some(family_ids) = &self.family_ids {
            query = query.with_family_ids(family_ids.clone());
        }
        if let Some(person_ids) = &self.person_ids {
            query = query.with_person_ids(person_ids.clone());
        }
        if !self.inheritance.is_empty() {
            query = query.with_inheritance(self.inheritance.clone());
        }
        if let Some(roles) = &self.roles {
            query = query.with_roles(roles.as_str());
        }
        if let Some(sexes) = &self.sexes {
            query = query.with_sexes(sexes.as_str());
        }
        if let Some(status) = &self.affected_status {
            query = query.with_affected_status(status.as_str());
        }
        query
    }
}

fn report_runners(reports: &[RunnerReport]) {
    for report in reports {
        if report.is_success() {
            info!("{}", report);
        }
        else {
            warn!("{}", style(report).yellow());
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct QuerySummaryArgs {
    #[arg(required = true, num_args = 1.., help = "Dataset directories.")]
    roots:   Vec<PathBuf>,
    #[clap(flatten)]
    filters: SummaryFilterArgs,
}

impl QuerySummaryArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let group = open_group(&self.roots)?;
        let query = self.filters.to_query()?;
        let mut result = group.query_summary_variants(&query)?;
        let spinner = init_spinner(utils.progress)?;
        let mut out = BufWriter::new(std::io::stdout().lock());

        writeln!(
            out,
            "location\treference\talternative\tmatched_alleles\tfamily_variants_count\tseen_as_denovo"
        )?;
        for variant in result.by_ref() {
            for index in variant.matched_alleles() {
                let Some(allele) = variant.allele(*index) else {
                    continue;
                };
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    variant.location(),
                    variant.reference(),
                    allele.alternative().unwrap_or("."),
                    index,
                    allele
                        .get_attribute("family_variants_count")
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                    allele
                        .get_attribute("seen_as_denovo")
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                )?;
            }
            spinner.inc(1);
        }
        out.flush()?;
        spinner.finish();
        report_runners(result.close());
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct QueryVariantsArgs {
    #[arg(required = true, num_args = 1.., help = "Dataset directories.")]
    roots:    Vec<PathBuf>,
    #[clap(flatten)]
    filters:  SummaryFilterArgs,
    #[clap(flatten)]
    families: FamilyFilterArgs,
}

impl QueryVariantsArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let group = open_group(&self.roots)?;
        let query = self.families.apply(self.filters.to_query()?);
        let mut result = group.query_variants(&query)?;
        let spinner = init_spinner(utils.progress)?;
        let mut out = BufWriter::new(std::io::stdout().lock());

        writeln!(
            out,
            "family_id\tlocation\treference\talternative\tallele_index\tbest_state\tin_members\tinheritance"
        )?;
        for variant in result.by_ref() {
            let best_state = variant
                .best_state()
                .iter()
                .map(|row| row.iter().join(""))
                .join("/");
            for index in variant.matched_alleles_indexes() {
                let Some(allele) = variant.allele(*index) else {
                    continue;
                };
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    variant.family_id(),
                    variant.location(),
                    variant.summary().reference(),
                    allele.summary_allele().alternative().unwrap_or("."),
                    index,
                    best_state,
                    allele.allele_in_members().join(","),
                    allele.inheritance_in_members().iter().join(","),
                )?;
            }
            spinner.inc(1);
        }
        out.flush()?;
        spinner.finish();
        report_runners(result.close());
        Ok(())
    }
}
