use std::path::PathBuf;

use clap::Args;
use varstore::io::write::{
    FAMILY_DIR,
    SUMMARY_DIR,
};
use varstore::prelude::*;

use crate::utils::{
    read_chrom_lengths,
    validate_root,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct PartitionsArgs {
    #[arg(required = true, help = "Dataset directory holding the partition description.")]
    root:          PathBuf,
    #[arg(
        short,
        long,
        required = true,
        help = "Two column chrom<TAB>length file."
    )]
    chrom_lengths: PathBuf,
}

impl PartitionsArgs {
    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        validate_root(&self.root)?;
        let descriptor = PartitionDescriptor::read_sidecar(&self.root)?;
        let chrom_lengths = read_chrom_lengths(&self.chrom_lengths)?;
        let (summary, family) = descriptor.build_summary_partitions(&chrom_lengths)?;

        for (kind, partitions) in [(SUMMARY_DIR, summary), (FAMILY_DIR, family)] {
            let base = self.root.join(kind);
            for partition in partitions {
                println!(
                    "{}\t{}",
                    kind,
                    PartitionDescriptor::partition_directory(&base, &partition).display()
                );
            }
        }
        Ok(())
    }
}
