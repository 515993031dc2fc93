//! Main entry point for the request-box CLI.

use anyhow::Result;
use clap::Parser;
use request_box::{cli, server, settings::Settings, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::Cli::parse();

    // Load settings
    let mut settings = Settings::load(args.config.as_deref())?;

    match args.command {
        cli::Commands::Serve { addr } => {
            settings.apply_addr_override(addr);
            settings.validate()?;

            telemetry::init(&settings.logging)?;
            server::serve(settings).await
        }
        cli::Commands::Config => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}
