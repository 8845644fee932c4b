pub mod ddl;
pub mod simulate;

use clap::{Args, Parser, Subcommand};
use seqtable::OptimizerKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seqtable")]
#[command(about = "Table-backed sequence generator tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the script creating (or dropping) a counter table
    Ddl(DdlArgs),
    /// Allocate concurrently against a fresh in-memory database
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DdlArgs {
    /// Table name, optionally qualified as schema.table or catalog.schema.table
    #[arg(long)]
    pub table: String,
    #[arg(long, default_value = "next_val")]
    pub column: String,
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub initial: i64,
    #[arg(long, default_value = "generic")]
    pub dialect: String,
    #[arg(long)]
    pub drop: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, default_value_t = 4)]
    pub threads: usize,
    /// Allocations per thread
    #[arg(long, default_value_t = 100)]
    pub allocations: usize,
    #[arg(long, default_value_t = 1)]
    pub increment: i64,
    #[arg(long)]
    pub optimizer: Option<OptimizerKind>,
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub initial: i64,
    #[arg(long, default_value = "id_sequence")]
    pub table: String,
    #[arg(long, default_value = "generic")]
    pub dialect: String,
    /// JSON generator config; replaces the table/increment/optimizer/initial flags
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Ddl(args) => {
            for statement in ddl::script(&args)? {
                println!("{};", statement);
            }
            Ok(())
        }
        Command::Simulate(args) => {
            let report = simulate::run(&args)?;
            println!("{}", report);
            report.ensure_unique()
        }
    }
}
