use std::path::PathBuf;

use clap::Args;
use console::style;
use varstore::prelude::*;

use crate::utils::{
    open_storage,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct DescribeArgs {
    #[arg(required = true, help = "Dataset directory.")]
    root: PathBuf,
}

impl DescribeArgs {
    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let storage = open_storage(&self.root)?;

        println!("{}", style("[partition description]").bold());
        println!("{}", storage.descriptor().serialize()?);

        println!("{}", style("[meta]").bold());
        for key in storage.meta().keys() {
            let value = storage.meta().get(key).unwrap_or_default();
            println!("{}\t{} bytes", key, value.len());
        }
        println!("codec\t{}", storage.codec());
        for attribute in storage.annotation() {
            println!("annotation\t{}\t{:?}", attribute.name, attribute.kind);
        }
        if let Some(genome) = storage.genome() {
            println!("chromosomes\t{}", genome.chrom_lengths().len());
        }

        println!("{}", style("[pedigree]").bold());
        println!("families\t{}", storage.families().len());
        println!("persons\t{}", storage.families().persons().count());
        Ok(())
    }
}
