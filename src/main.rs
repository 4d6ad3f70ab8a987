//! Command-line entry point: scans a Rust web project and writes its Swagger 2.0 document.
//!
//! ```bash
//! swagger-from-annotations ./my-service -o docs/swagger.yaml
//! swagger-from-annotations ./my-service -f json --compact --routes routes.yaml
//! swagger-from-annotations ./my-service --print-annotations
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use swagger_from_annotations::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("swagger-from-annotations starting...");
    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;
    info!("Swagger document generation completed");

    Ok(())
}
