mod cli;

use clap::Parser;
use mp_core::MenupiError;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = cli::Cli::parse();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(&log_level)
        .init();

    info!("menupi-agent {} starting", env!("CARGO_PKG_VERSION"));

    match cli::run(&cli_args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e
                .downcast_ref::<MenupiError>()
                .is_some_and(MenupiError::is_transport)
            {
                eprintln!("Check that the backend at MENUPI_API_URL is reachable");
            }
            ExitCode::FAILURE
        }
    }
}
