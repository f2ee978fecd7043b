use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    Context,
};
use clap::Args;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use log::LevelFilter;
use varstore::prelude::*;

#[derive(Args, Debug, Clone)]
pub(crate) struct UtilsArgs {
    #[arg(
        long,
        default_value_t = varstore::utils::n_threads(),
        help_heading = "UTILS",
        help = "Number of threads to use."
    )]
    pub threads:  usize,
    #[arg(
        short,
        long,
        default_value_t = false,
        help_heading = "UTILS",
        help = "Verbose output."
    )]
    pub verbose:  bool,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "UTILS",
        help = "Display progress bar (disable if you need clean pipeline)."
    )]
    pub progress: bool,
}

impl UtilsArgs {
    pub fn setup(&self) -> anyhow::Result<()> {
        init_logger(self.verbose)?;
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build_global()
            .context("Failed to create global thread pool")?;
        std::env::set_var("POLARS_MAX_THREADS", self.threads.to_string());
        Ok(())
    }
}

pub(crate) fn init_logger(verbose: bool) -> anyhow::Result<()> {
    let mut builder = pretty_env_logger::formatted_builder();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    else if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    else {
        builder.filter_level(LevelFilter::Info);
    }
    builder.try_init()?;
    Ok(())
}

/// Spinner counting streamed items, hidden unless `--progress` is set.
pub(crate) fn init_spinner(enabled: bool) -> anyhow::Result<ProgressBar> {
    if !enabled {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos:>7.green} {msg}")?,
    );
    spinner.set_message("variants");
    Ok(spinner)
}

pub(crate) fn validate_root(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        return Err(anyhow!("Dataset {} does not exist", path.display()));
    }
    if !path.is_dir() {
        return Err(anyhow!("Dataset {} is not a directory", path.display()));
    }
    Ok(())
}

pub(crate) fn open_storage(root: &Path) -> anyhow::Result<ParquetGenotypeStorage> {
    validate_root(root)?;
    ParquetGenotypeStorage::open(StorageConfig::new(root))
        .with_context(|| format!("Failed to open dataset {}", root.display()))
}

/// One storage per root, grouped into a single study.
pub(crate) fn open_group(roots: &[PathBuf]) -> anyhow::Result<StudyGroup> {
    let studies = roots
        .iter()
        .map(|root| open_storage(root))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(StudyGroup::new("cli", studies))
}

/// Reads a two column `chrom<TAB>length` file.
pub(crate) fn read_chrom_lengths(path: &Path) -> anyhow::Result<ChromLengths> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let mut fields = line.split_whitespace();
            let chrom = fields
                .next()
                .ok_or_else(|| anyhow!("Empty line in {}", path.display()))?;
            let length = fields
                .next()
                .ok_or_else(|| anyhow!("Missing length for {} in {}", chrom, path.display()))?
                .parse::<u64>()
                .with_context(|| format!("Bad length for {} in {}", chrom, path.display()))?;
            Ok((chrom.to_string(), length))
        })
        .collect()
}
