//! Opt-in executor: register the account as a holder of the asset.

use crate::account::TransactionSigner;
use crate::composer::wait_for_confirmation;
use crate::error::Result;
use crate::ledger::LedgerApi;
use crate::transaction::Transaction;
use crate::workflow::StepOutcome;

/// Opt `account` in to `asset_id` unless it already holds the asset.
///
/// Submits a zero-amount self transfer and waits up to `wait_rounds` for it
/// to confirm, so a following claim never races the opt-in.
pub async fn opt_in<L: LedgerApi + ?Sized>(
    ledger: &L,
    account: &dyn TransactionSigner,
    asset_id: u64,
    wait_rounds: u64,
) -> Result<StepOutcome> {
    let params = ledger.suggested_params().await?;
    let address = account.address();

    let info = ledger.account_information(address).await?;
    if info.holding(asset_id).is_some() {
        tracing::info!(%address, asset_id, "Already opted in to asset with id: {asset_id}");
        return Ok(StepOutcome::AlreadyDone);
    }

    let signed = Transaction::asset_opt_in(address, asset_id, &params)?.sign(account)?;
    let txid = ledger.send_raw_transaction(signed.encode()?).await?;
    let confirmed = wait_for_confirmation(ledger, &txid, wait_rounds).await?;
    let round = confirmed.confirmed_round.unwrap_or_default();

    tracing::info!(%txid, round, "{address} opted into asset {asset_id}");
    Ok(StepOutcome::Confirmed { txid, round })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::error::ClaimError;
    use crate::ledger::mock::MockLedger;
    use crate::transaction::TransactionType;

    #[tokio::test]
    async fn test_already_opted_in_submits_nothing() {
        let account = Account::from_seed(&[5u8; 32]);
        let ledger = MockLedger::new().with_holding(account.address(), 42, false);

        let outcome = opt_in(&ledger, &account, 42, 8).await.unwrap();
        assert_eq!(outcome, StepOutcome::AlreadyDone);
        assert!(ledger.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_account_submits_one_self_transfer() {
        let account = Account::from_seed(&[5u8; 32]);
        let ledger = MockLedger::new().with_holding(account.address(), 7, true);

        let outcome = opt_in(&ledger, &account, 42, 8).await.unwrap();
        let StepOutcome::Confirmed { txid, round } = outcome else {
            panic!("expected a confirmed opt-in");
        };
        assert_eq!(round, ledger.round());

        let submissions = ledger.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].len(), 1);
        let txn = &submissions[0][0].transaction;
        assert_eq!(txn.id().unwrap(), txid);
        assert_eq!(txn.tx_type, TransactionType::AssetTransfer);
        assert_eq!(txn.sender, account.address());
        assert_eq!(txn.asset_receiver, Some(account.address()));
        assert_eq!(txn.asset_amount, 0);
        assert_eq!(txn.asset_id, 42);

        let holding = ledger.holding(account.address(), 42).unwrap();
        assert!(!holding.is_frozen);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let account = Account::from_seed(&[5u8; 32]);
        let ledger = MockLedger::new().rejecting("overspend");

        let err = opt_in(&ledger, &account, 42, 8).await.unwrap_err();
        assert!(matches!(err, ClaimError::TransactionRejected(msg) if msg == "overspend"));
        assert_eq!(ledger.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_opt_in_times_out() {
        let account = Account::from_seed(&[5u8; 32]);
        let ledger = MockLedger::new().never_confirming();

        let err = opt_in(&ledger, &account, 42, 3).await.unwrap_err();
        assert!(matches!(err, ClaimError::ConfirmationTimeout { rounds: 3, .. }));
    }
}
