mod describe;
mod partitions;
mod query;
mod utils;

use clap::{
    Parser,
    Subcommand,
};
use describe::DescribeArgs;
use partitions::PartitionsArgs;
use query::{
    QuerySummaryArgs,
    QueryVariantsArgs,
};
use utils::UtilsArgs;
use wild::ArgsOs;

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Stream summary variants as TSV.
    #[command(name = "query-summary")]
    QuerySummary {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  QuerySummaryArgs,
    },

    /// Stream family variants as TSV.
    #[command(name = "query-variants")]
    QueryVariants {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  QueryVariantsArgs,
    },

    /// Print the partition description, meta keys and pedigree size.
    Describe {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  DescribeArgs,
    },

    /// List every summary and family partition directory.
    Partitions {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  PartitionsArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let args: ArgsOs = wild::args_os();
    let cli = Cli::parse_from(args);

    match cli.command {
        MainMenu::QuerySummary { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::QueryVariants { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Describe { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Partitions { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
    }
    Ok(())
}
