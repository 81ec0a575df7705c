//! ctxvars command-line interface.

use anyhow::Result;
use clap::Parser;
use ctxvars::cli::{Cli, commands};
use ctxvars::interaction::ConsoleInteraction;
use ctxvars::logging::{self, LogLevel, LogSink};
use ctxvars::resolver::Resolver;
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = Resolver::builder()
        .interaction(Arc::new(ConsoleInteraction))
        .configure(cli.to_layer())
        .build()?;

    // Initialize logging based on --log option
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        resolver.config().log_level
    };
    logging::init(level, &LogSink::parse(&cli.log))?;

    // Reload so config file warnings reach the subscriber.
    let config = resolver.config();
    if let Some(path) = &config.config_file {
        debug!(path = %path.display(), "using config file");
    }

    let mut stdout = std::io::stdout();
    commands::run(&cli.command, &resolver, &mut stdout).await
}
