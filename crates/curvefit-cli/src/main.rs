//! Curvefit CLI - calibrate yield curves from a TOML request file.
//!
//! # Usage
//!
//! ```bash
//! # Calibrate the curves described in a request file
//! curvefit calibrate demos/double_curve.toml
//!
//! # Same, with Broyden updates and the final Jacobian as JSON
//! curvefit --format json calibrate demos/double_curve.toml --root-finder broyden --show-jacobian
//!
//! # Chained calibration with FX-implied curves
//! curvefit calibrate demos/fx_chain.toml --show-jacobian
//!
//! # Inspect and change the default calibration settings
//! curvefit config show
//! curvefit config set root_finder sherman_morrison
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod error;
mod output;
mod request;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let format = cli.format;
    match cli.command {
        Commands::Calibrate(args) => commands::calibrate::execute(args, format, cli.quiet)?,
        Commands::Config(args) => commands::config::execute(args, format)?,
    }

    Ok(())
}

/// Logs go to stderr so that stdout stays machine-readable.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
