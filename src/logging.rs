use std::io::IsTerminal;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise the
/// filter follows `-v`/`-q`.
pub fn init_logging(verbosity: u8, quiet: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbosity, quiet)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 0)
        .with_ansi(std::io::stderr().is_terminal());

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(env_filter).with(fmt_layer))?;
    Ok(())
}

fn default_filter(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "gh_migrate=warn";
    }
    match verbosity {
        0 => "gh_migrate=info",
        1 => "gh_migrate=debug",
        _ => "gh_migrate=trace,reqwest=debug",
    }
}
