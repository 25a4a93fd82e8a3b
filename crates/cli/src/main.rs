use clap::Parser;
use commands::Commands;
use shutdown::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod feed;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "cdc-verify",
    version,
    about = "Batch ledger and CDC replication verifier"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match commands::run(cli.command).await {
        Ok(code) => code.into(),
        Err(err) => {
            error!(error = %err, "Command failed");
            ExitCode::GeneralError.into()
        }
    }
}
