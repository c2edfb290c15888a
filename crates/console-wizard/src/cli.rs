use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cmd::{self, describe::DescribeArgs, list::ListArgs, run::RunArgs};
use crate::config::ConsoleConfig;
use crate::logging;

#[derive(Parser, Debug)]
#[command(
    name = "console-wizard",
    about = "Drive the console's resource wizards against mock catalogs",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long = "config", value_name = "config.toml", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the preset wizards
    List(ListArgs),
    /// Show the steps and fields of a wizard
    Describe(DescribeArgs),
    /// Print the JSON Schema of wizard definition documents
    Schema,
    /// Fill a wizard from an answers file and submit it
    Run(RunArgs),
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConsoleConfig::load(cli.config.as_deref())?;
    logging::init(config.logging.filter.as_deref());

    match cli.command {
        Commands::List(args) => cmd::list::run(args),
        Commands::Describe(args) => cmd::describe::run(args),
        Commands::Schema => cmd::schema::run(),
        Commands::Run(args) => cmd::run::run(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "console-wizard",
            "--config",
            "console.toml",
            "run",
            "create-vpc",
            "--answers",
            "vpc.json",
            "--json",
            "--snapshot-out",
            "out/snapshot.json",
        ])
        .expect("expected CLI to parse");
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("console.toml")));
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.wizard, "create-vpc");
                assert_eq!(args.answers, PathBuf::from("vpc.json"));
                assert!(args.json);
                assert!(!args.fail);
                assert_eq!(args.snapshot_out, Some(PathBuf::from("out/snapshot.json")));
            }
            _ => panic!("expected run args"),
        }
    }

    #[test]
    fn run_requires_answers() {
        assert!(Cli::try_parse_from(["console-wizard", "run", "create-vpc"]).is_err());
    }

    #[test]
    fn parses_describe_and_schema() {
        let cli = Cli::try_parse_from(["console-wizard", "describe", "create-bucket", "--json"])
            .expect("expected CLI to parse");
        match cli.command {
            Commands::Describe(args) => {
                assert_eq!(args.wizard, "create-bucket");
                assert!(args.json);
            }
            _ => panic!("expected describe args"),
        }
        let cli = Cli::try_parse_from(["console-wizard", "schema"]).unwrap();
        assert!(matches!(cli.command, Commands::Schema));
    }
}
