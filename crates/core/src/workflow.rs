//! The linear run: load clients, read the asset id, opt in, claim.

use crate::abi::MethodResolver;
use crate::account::TransactionSigner;
use crate::claim::claim;
use crate::config::ClaimConfig;
use crate::error::{ClaimError, Result};
use crate::ledger::{ClientLoader, IndexerApi};
use crate::opt_in::opt_in;
use crate::state::read_global_state_value;

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do; the ledger already reflects the step.
    AlreadyDone,
    /// A transaction was submitted and confirmed.
    Confirmed { txid: String, round: u64 },
}

impl StepOutcome {
    pub fn submitted(&self) -> bool {
        matches!(self, StepOutcome::Confirmed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub asset_id: u64,
    pub opt_in: StepOutcome,
    pub claim: StepOutcome,
}

/// Read the asset id from the application's global state.
pub async fn resolve_asset_id<I: IndexerApi + ?Sized>(
    indexer: &I,
    config: &ClaimConfig,
) -> Result<u64> {
    let value = read_global_state_value(indexer, config.app_id, &config.asset_key)
        .await?
        .ok_or_else(|| {
            ClaimError::NotFound(format!(
                "global state key `{}` missing from application {}",
                config.asset_key, config.app_id
            ))
        })?;
    value.as_asset_id().ok_or_else(|| {
        ClaimError::InvalidGlobalState(format!(
            "`{}` holds {value:?}, not an asset id",
            config.asset_key
        ))
    })
}

/// Run every step in order; each step gets a fresh client from `loader`.
pub async fn run_workflow<C: ClientLoader>(
    config: &ClaimConfig,
    loader: &C,
    account: &dyn TransactionSigner,
    contract: &dyn MethodResolver,
) -> Result<RunReport> {
    tracing::info!(
        app_id = config.app_id,
        address = %account.address(),
        "starting asset claim"
    );

    let asset_id = resolve_asset_id(&loader.indexer()?, config).await?;
    tracing::info!(asset_id, "resolved asset from application state");

    let opt_in = opt_in(&loader.ledger()?, account, asset_id, config.wait_rounds).await?;
    let claim = claim(&loader.ledger()?, account, contract, asset_id, config).await?;

    Ok(RunReport {
        asset_id,
        opt_in,
        claim,
    })
}
