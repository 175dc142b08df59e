//! cobcfg: control flow graphs for COBOL procedure divisions
//!
//! Reads the JSON statement tree produced by a COBOL front end and writes
//! the resulting graphs as Graphviz DOT, a plain text dump or a CSV call
//! report.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use commands::BuildArgs;

#[derive(Parser)]
#[command(name = "cobcfg")]
#[command(about = "Control flow graphs for COBOL procedure divisions", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to ./cobcfg.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Graph mode, overrides the configuration file
    #[arg(long, global = true, value_enum)]
    mode: Option<ModeArg>,

    /// EVALUATE lowering, overrides the configuration file
    #[arg(long, global = true, value_enum)]
    evaluate: Option<LoweringArg>,

    /// SEARCH lowering, overrides the configuration file
    #[arg(long, global = true, value_enum)]
    search: Option<LoweringArg>,

    /// Colored output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the graph of each program as Graphviz DOT
    Dot {
        /// Statement tree (JSON)
        file: PathBuf,
        /// Label blocks with the full statement text instead of the verb
        #[arg(long)]
        full_instruction: bool,
        /// Only this program
        #[arg(short, long)]
        program: Option<String>,
        /// Write one <PROGRAM>.dot per program into this directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Print block successors in depth-first order
    Dump {
        /// Statement tree (JSON)
        file: PathBuf,
        /// Only this program
        #[arg(short, long)]
        program: Option<String>,
    },

    /// List CALL statements together with the PERFORM ranges reaching them
    Report {
        /// Statement trees (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// CSV output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the graphs and report unresolved references
    Check {
        /// Statement tree (JSON)
        file: PathBuf,
        /// COBOL source the tree was parsed from, used to render spans
        #[arg(long)]
        source: Option<PathBuf>,
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
        /// Exit with an error when any diagnostic is reported
        #[arg(long)]
        deny_warnings: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Normal,
    Extended,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LoweringArg {
    Cascade,
    Direct,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let build = BuildArgs {
        config: cli.config,
        mode: cli.mode,
        evaluate: cli.evaluate,
        search: cli.search,
    };
    let color = output::resolve_color_choice(cli.color.as_deref());

    match cli.command {
        Commands::Dot {
            file,
            full_instruction,
            program,
            out_dir,
        } => commands::dot::execute(&build, &file, full_instruction, program.as_deref(), out_dir.as_deref()),

        Commands::Dump { file, program } => commands::dump::execute(&build, &file, program.as_deref()),

        Commands::Report { files, output } => commands::report::execute(&build, &files, output.as_deref()),

        Commands::Check {
            file,
            source,
            json,
            deny_warnings,
        } => commands::check::execute(&build, &file, source.as_deref(), json, deny_warnings, color),
    }
}
