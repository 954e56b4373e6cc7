//! Claim executor: call the contract's `claimAsset` method.
//!
//! The contract freezes the caller's holding as its claimed marker, so a
//! frozen holding means there is nothing left to do.

use crate::abi::MethodResolver;
use crate::account::TransactionSigner;
use crate::composer::{AtomicComposer, MethodCall};
use crate::config::ClaimConfig;
use crate::error::Result;
use crate::ledger::LedgerApi;
use crate::workflow::StepOutcome;

pub const CLAIM_METHOD: &str = "claimAsset";

/// Claim `asset_id` through `config.app_id` unless the holding is frozen.
pub async fn claim<L: LedgerApi + ?Sized>(
    ledger: &L,
    account: &dyn TransactionSigner,
    contract: &dyn MethodResolver,
    asset_id: u64,
    config: &ClaimConfig,
) -> Result<StepOutcome> {
    let address = account.address();

    let info = ledger.account_information(address).await?;
    if info.holding(asset_id).is_some_and(|h| h.is_frozen) {
        tracing::info!(%address, asset_id, "Already claimed asset with id: {asset_id}");
        return Ok(StepOutcome::AlreadyDone);
    }

    let method = contract.resolve_method(CLAIM_METHOD)?;
    // Flat fee also covers the inner freeze transaction.
    let params = ledger
        .suggested_params()
        .await?
        .with_flat_fee(config.claim_fee);

    let mut composer = AtomicComposer::new();
    composer.add_method_call(MethodCall {
        app_id: config.app_id,
        method,
        args: Vec::new(),
        sender: address,
        signer: account,
        params,
        foreign_assets: vec![asset_id],
    })?;
    let result = composer.execute(ledger, config.wait_rounds).await?;

    let txid = result.tx_ids[0].clone();
    let round = result.confirmed_round;
    tracing::info!(%txid, round, "{address} has successfully claimed asset {asset_id}");
    Ok(StepOutcome::Confirmed { txid, round })
}
