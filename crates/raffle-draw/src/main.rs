use anyhow::Result;
use clap::Parser;
use raffle_draw::cli::Cli;
use raffle_draw::run::is_rejected_input;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let result = Cli::parse().run().await;
    if let Err(e) = &result {
        if is_rejected_input(e) {
            error!(error = %format!("{e:#}"), "draw input rejected; no winners were drawn");
        } else {
            error!(error = %format!("{e:#}"), "raffle-draw failed");
        }
    }
    result
}
