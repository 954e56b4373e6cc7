use anyhow::Context;
use asset_claim::config::load_mnemonic;
use asset_claim::{run_workflow, AbiContract, Account, ClaimConfig, HttpClientLoader};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> anyhow::Result<()> {
    let config = ClaimConfig::from_env();
    let mnemonic = load_mnemonic()?;
    let account = Account::from_mnemonic(&mnemonic).context("failed to derive account")?;
    let contract = AbiContract::builtin().context("compiled-in application spec is invalid")?;
    let loader = HttpClientLoader::new(config.clone());

    let report = run_workflow(&config, &loader, &account, &contract).await?;
    tracing::debug!(?report, "run finished");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}
