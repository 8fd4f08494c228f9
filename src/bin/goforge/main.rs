//! goforge CLI - cross-compiles Go modules for a target matrix

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use goforge::builder::BuildError;
use goforge::util::diagnostic::emit;

fn main() {
    let cli = Cli::parse();
    let color = cli.global.shell(false).use_color();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<BuildError>() {
            Some(err) => emit(&err.to_diagnostic(), color),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.global.verbose {
        EnvFilter::new("goforge=debug")
    } else {
        EnvFilter::new("goforge=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = cli.global;
    match cli.command {
        Commands::Build(args) => commands::build::execute(&global, args),
        Commands::Tasks(args) => commands::tasks::execute(&global, args),
        Commands::Toolchain(args) => commands::toolchain::execute(&global, args),
        Commands::Clean(args) => commands::clean::execute(&global, args),
        Commands::Init(args) => commands::init::execute(&global, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
