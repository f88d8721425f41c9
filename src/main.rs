mod cli;
mod config;
mod error;
mod logging;
mod model;
mod remote;
mod sync;

use std::process::ExitCode;

use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init_logging(cli.verbose, cli.quiet) {
        eprintln!("Failed to initialise logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match cli::run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            if let Some(hint) = cli::hint(&e) {
                eprintln!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}
