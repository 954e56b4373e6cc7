//! Atomic transaction groups: build, sign, submit and wait.
//!
//! A composer moves strictly forward through
//! `Building -> Built -> Signed -> Submitted -> Committed`; once built no
//! transaction can be added.

use crate::abi::{AbiMethod, RETURN_LOG_PREFIX};
use crate::account::{Address, TransactionSigner};
use crate::error::{ClaimError, Result};
use crate::ledger::{LedgerApi, PendingTransaction};
use crate::transaction::{
    assign_group_id, SignedTransaction, SuggestedParams, Transaction, MAX_GROUP_SIZE,
};

/// Poll until `txid` is confirmed, for at most `wait_rounds` rounds.
pub async fn wait_for_confirmation<L: LedgerApi + ?Sized>(
    ledger: &L,
    txid: &str,
    wait_rounds: u64,
) -> Result<PendingTransaction> {
    let status = ledger.status().await?;
    let start_round = status.last_round.saturating_add(1);
    let end_round = start_round.saturating_add(wait_rounds);
    let mut current_round = start_round;

    while current_round < end_round {
        match ledger.pending_transaction(txid).await {
            Ok(pending) if pending.is_confirmed() => return Ok(pending),
            Ok(pending) if !pending.pool_error.is_empty() => {
                return Err(ClaimError::TransactionRejected(format!(
                    "{txid}: {}",
                    pending.pool_error
                )));
            }
            Ok(_) => {}
            // Not visible to the node yet
            Err(ClaimError::Http { status: 404, .. }) => {}
            Err(e) => return Err(e),
        }
        ledger.status_after_block(current_round).await?;
        current_round += 1;
    }

    Err(ClaimError::ConfirmationTimeout {
        txid: txid.to_string(),
        rounds: wait_rounds,
    })
}

/// Extract an ABI return value from the last log of a confirmed call.
pub fn decode_return_value(
    method: &AbiMethod,
    pending: &PendingTransaction,
) -> Result<Option<Vec<u8>>> {
    if method.returns_void() {
        return Ok(None);
    }
    let last = pending.logs.last().ok_or_else(|| {
        ClaimError::Decode(format!("{} returned no logs", method.signature()))
    })?;
    let raw = base64::decode(last)?;
    match raw.strip_prefix(&RETURN_LOG_PREFIX[..]) {
        Some(value) => Ok(Some(value.to_vec())),
        None => Err(ClaimError::Decode(format!(
            "{} last log is not a return value",
            method.signature()
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComposerStatus {
    Building,
    Built,
    Signed,
    Submitted,
    Committed,
}

impl ComposerStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ComposerStatus::Building => "building",
            ComposerStatus::Built => "built",
            ComposerStatus::Signed => "signed",
            ComposerStatus::Submitted => "submitted",
            ComposerStatus::Committed => "committed",
        }
    }
}

/// An ABI method call to add to a group. `args` are already ABI-encoded.
pub struct MethodCall<'a> {
    pub app_id: u64,
    pub method: AbiMethod,
    pub args: Vec<Vec<u8>>,
    pub sender: Address,
    pub signer: &'a dyn TransactionSigner,
    pub params: SuggestedParams,
    pub foreign_assets: Vec<u64>,
}

struct ComposerEntry<'a> {
    txn: Transaction,
    signer: &'a dyn TransactionSigner,
    method: Option<AbiMethod>,
}

#[derive(Debug, Clone)]
pub struct MethodResult {
    pub tx_id: String,
    pub method: AbiMethod,
    pub return_value: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub confirmed_round: u64,
    pub tx_ids: Vec<String>,
    pub method_results: Vec<MethodResult>,
}

pub struct AtomicComposer<'a> {
    entries: Vec<ComposerEntry<'a>>,
    signed: Vec<SignedTransaction>,
    status: ComposerStatus,
}

impl Default for AtomicComposer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> AtomicComposer<'a> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            signed: Vec::new(),
            status: ComposerStatus::Building,
        }
    }

    pub fn status(&self) -> ComposerStatus {
        self.status
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: ComposerEntry<'a>) -> Result<()> {
        if self.status != ComposerStatus::Building {
            return Err(ClaimError::ComposerSealed(self.status.as_str()));
        }
        if self.entries.len() == MAX_GROUP_SIZE {
            return Err(ClaimError::GroupTooLarge {
                max: MAX_GROUP_SIZE,
            });
        }
        if entry.txn.group.is_some() {
            return Err(ClaimError::InvalidGroup(
                "transaction already belongs to a group".to_string(),
            ));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn add_transaction(
        &mut self,
        txn: Transaction,
        signer: &'a dyn TransactionSigner,
    ) -> Result<()> {
        self.push(ComposerEntry {
            txn,
            signer,
            method: None,
        })
    }

    pub fn add_method_call(&mut self, call: MethodCall<'a>) -> Result<()> {
        if call.args.len() != call.method.args.len() {
            return Err(ClaimError::ArgumentCount {
                method: call.method.signature(),
                expected: call.method.args.len(),
                actual: call.args.len(),
            });
        }
        let mut app_args = Vec::with_capacity(call.args.len() + 1);
        app_args.push(call.method.selector().to_vec());
        app_args.extend(call.args);

        let txn = Transaction::app_call(
            call.sender,
            call.app_id,
            app_args,
            call.foreign_assets,
            &call.params,
        )?;
        self.push(ComposerEntry {
            txn,
            signer: call.signer,
            method: Some(call.method),
        })
    }

    /// Finalize membership and stamp the group id (only for 2+ entries).
    pub fn build_group(&mut self) -> Result<Vec<Transaction>> {
        if self.status == ComposerStatus::Building {
            if self.entries.is_empty() {
                return Err(ClaimError::InvalidGroup(
                    "cannot build an empty group".to_string(),
                ));
            }
            let mut txns: Vec<Transaction> = self.entries.iter().map(|e| e.txn.clone()).collect();
            assign_group_id(&mut txns)?;
            for (entry, txn) in self.entries.iter_mut().zip(txns) {
                entry.txn = txn;
            }
            self.status = ComposerStatus::Built;
        }
        Ok(self.entries.iter().map(|e| e.txn.clone()).collect())
    }

    pub fn gather_signatures(&mut self) -> Result<Vec<SignedTransaction>> {
        if self.status >= ComposerStatus::Signed {
            return Ok(self.signed.clone());
        }
        self.build_group()?;
        self.signed = self
            .entries
            .iter()
            .map(|e| e.txn.clone().sign(e.signer))
            .collect::<Result<Vec<_>>>()?;
        self.status = ComposerStatus::Signed;
        Ok(self.signed.clone())
    }

    /// Send the whole group as one payload; returns the member ids.
    pub async fn submit<L: LedgerApi + ?Sized>(&mut self, ledger: &L) -> Result<Vec<String>> {
        if self.status > ComposerStatus::Signed {
            return Err(ClaimError::ComposerSealed(self.status.as_str()));
        }
        let signed = self.gather_signatures()?;
        let mut payload = Vec::new();
        for txn in &signed {
            payload.extend(txn.encode()?);
        }
        let tx_ids = signed
            .iter()
            .map(SignedTransaction::id)
            .collect::<Result<Vec<_>>>()?;

        ledger.send_raw_transaction(payload).await?;
        tracing::debug!(count = tx_ids.len(), first = %tx_ids[0], "group submitted");
        self.status = ComposerStatus::Submitted;
        Ok(tx_ids)
    }

    /// Submit and wait up to `wait_rounds` rounds for the group to commit.
    pub async fn execute<L: LedgerApi + ?Sized>(
        &mut self,
        ledger: &L,
        wait_rounds: u64,
    ) -> Result<ExecuteResult> {
        let tx_ids = self.submit(ledger).await?;
        let confirmed = wait_for_confirmation(ledger, &tx_ids[0], wait_rounds).await?;
        let confirmed_round = confirmed.confirmed_round.unwrap_or_default();
        self.status = ComposerStatus::Committed;

        let mut method_results = Vec::new();
        for (entry, tx_id) in self.entries.iter().zip(&tx_ids) {
            let Some(method) = &entry.method else {
                continue;
            };
            let return_value = if method.returns_void() {
                None
            } else {
                let pending = ledger.pending_transaction(tx_id).await?;
                let value = decode_return_value(method, &pending)?;
                if let Some(v) = &value {
                    tracing::debug!(%tx_id, return_value = %hex::encode(v), "method returned");
                }
                value
            };
            method_results.push(MethodResult {
                tx_id: tx_id.clone(),
                method: method.clone(),
                return_value,
            });
        }

        Ok(ExecuteResult {
            confirmed_round,
            tx_ids,
            method_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{AbiContract, MethodResolver};
    use crate::account::Account;
    use crate::ledger::mock::MockLedger;
    use crate::transaction::tests::test_params;

    fn claim_method() -> AbiMethod {
        AbiContract::builtin()
            .unwrap()
            .resolve_method("claimAsset")
            .unwrap()
    }

    fn claim_call(account: &Account, asset_id: u64) -> MethodCall<'_> {
        MethodCall {
            app_id: 99,
            method: claim_method(),
            args: vec![],
            sender: account.address(),
            signer: account,
            params: test_params().with_flat_fee(6_000),
            foreign_assets: vec![asset_id],
        }
    }

    #[tokio::test]
    async fn test_single_call_executes_without_group_id() {
        let account = Account::from_seed(&[3u8; 32]);
        let ledger = MockLedger::new().with_holding(account.address(), 42, false);

        let mut composer = AtomicComposer::new();
        composer.add_method_call(claim_call(&account, 42)).unwrap();
        let result = composer.execute(&ledger, 8).await.unwrap();

        assert_eq!(composer.status(), ComposerStatus::Committed);
        assert_eq!(result.tx_ids.len(), 1);
        assert_eq!(result.method_results.len(), 1);
        assert!(result.method_results[0].return_value.is_none());

        let submissions = ledger.submissions();
        assert_eq!(submissions.len(), 1);
        let txn = &submissions[0][0].transaction;
        assert!(txn.group.is_none());
        assert_eq!(txn.app_id, 99);
        assert_eq!(txn.fee, 6_000);
        assert_eq!(txn.app_args.len(), 1);
        assert_eq!(txn.app_args[0].as_slice(), &claim_method().selector()[..]);
    }

    #[tokio::test]
    async fn test_two_entries_share_group_id() {
        let account = Account::from_seed(&[3u8; 32]);
        let ledger = MockLedger::new();

        let mut composer = AtomicComposer::new();
        let opt_in = Transaction::asset_opt_in(account.address(), 42, &test_params()).unwrap();
        composer.add_transaction(opt_in, &account).unwrap();
        composer.add_method_call(claim_call(&account, 42)).unwrap();
        composer.execute(&ledger, 8).await.unwrap();

        let submissions = ledger.submissions();
        assert_eq!(submissions.len(), 1);
        let group = &submissions[0];
        assert_eq!(group.len(), 2);
        assert!(group[0].transaction.group.is_some());
        assert_eq!(group[0].transaction.group, group[1].transaction.group);
        assert!(ledger.holding(account.address(), 42).unwrap().is_frozen);
    }

    #[test]
    fn test_argument_count_checked() {
        let account = Account::from_seed(&[3u8; 32]);
        let mut call = claim_call(&account, 42);
        call.args = vec![vec![0u8; 8]];
        let mut composer = AtomicComposer::new();
        assert!(matches!(
            composer.add_method_call(call),
            Err(ClaimError::ArgumentCount {
                expected: 0,
                actual: 1,
                ..
            })
        ));
        assert!(composer.is_empty());
    }

    #[test]
    fn test_group_size_limit() {
        let account = Account::from_seed(&[3u8; 32]);
        let mut composer = AtomicComposer::new();
        for i in 0..MAX_GROUP_SIZE as u64 {
            let txn = Transaction::asset_opt_in(account.address(), i + 1, &test_params()).unwrap();
            composer.add_transaction(txn, &account).unwrap();
        }
        let extra = Transaction::asset_opt_in(account.address(), 100, &test_params()).unwrap();
        assert!(matches!(
            composer.add_transaction(extra, &account),
            Err(ClaimError::GroupTooLarge { .. })
        ));
    }

    #[test]
    fn test_no_additions_after_build() {
        let account = Account::from_seed(&[3u8; 32]);
        let mut composer = AtomicComposer::new();
        composer.add_method_call(claim_call(&account, 42)).unwrap();
        composer.build_group().unwrap();
        assert!(matches!(
            composer.add_method_call(claim_call(&account, 43)),
            Err(ClaimError::ComposerSealed("built"))
        ));
    }

    #[test]
    fn test_empty_group_rejected() {
        let mut composer = AtomicComposer::new();
        assert!(matches!(
            composer.build_group(),
            Err(ClaimError::InvalidGroup(_))
        ));
    }

    #[test]
    fn test_pregrouped_transaction_rejected() {
        let account = Account::from_seed(&[3u8; 32]);
        let mut txn = Transaction::asset_opt_in(account.address(), 42, &test_params()).unwrap();
        txn.group = Some([7u8; 32]);

        let mut composer = AtomicComposer::new();
        let err = composer.add_transaction(txn, &account).unwrap_err();
        assert!(matches!(err, ClaimError::InvalidGroup(_)));
        assert!(composer.is_empty());
    }

    #[tokio::test]
    async fn test_huge_wait_window_does_not_overflow() {
        let account = Account::from_seed(&[3u8; 32]);
        let ledger = MockLedger::new().with_holding(account.address(), 42, false);

        let mut composer = AtomicComposer::new();
        composer.add_method_call(claim_call(&account, 42)).unwrap();
        let result = composer.execute(&ledger, u64::MAX).await.unwrap();

        assert_eq!(composer.status(), ComposerStatus::Committed);
        assert_eq!(result.confirmed_round, ledger.round());
    }

    #[tokio::test]
    async fn test_wait_window_saturates_at_last_round() {
        let ledger = MockLedger::new().with_round(u64::MAX - 1);

        let err = wait_for_confirmation(&ledger, "NOPE", u64::MAX)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClaimError::ConfirmationTimeout { rounds: u64::MAX, .. }
        ));
        assert_eq!(ledger.round(), u64::MAX - 1);
    }

    #[tokio::test]
    async fn test_confirmation_timeout() {
        let account = Account::from_seed(&[3u8; 32]);
        let ledger = MockLedger::new()
            .with_holding(account.address(), 42, false)
            .never_confirming();
        let start = ledger.round();

        let mut composer = AtomicComposer::new();
        composer.add_method_call(claim_call(&account, 42)).unwrap();
        let err = composer.execute(&ledger, 8).await.unwrap_err();

        assert!(matches!(err, ClaimError::ConfirmationTimeout { rounds: 8, .. }));
        assert_eq!(composer.status(), ComposerStatus::Submitted);
        assert_eq!(ledger.round(), start + 9);
    }

    #[tokio::test]
    async fn test_rejection_propagates() {
        let account = Account::from_seed(&[3u8; 32]);
        let ledger = MockLedger::new();

        // Not opted in: the mock refuses to freeze a missing holding
        let mut composer = AtomicComposer::new();
        composer.add_method_call(claim_call(&account, 42)).unwrap();
        let err = composer.execute(&ledger, 8).await.unwrap_err();
        assert!(matches!(err, ClaimError::TransactionRejected(_)));
        assert!(ledger.submissions().is_empty());
    }

    #[test]
    fn test_decode_return_value() {
        let method = AbiContract::from_json(
            r#"{"name":"C","methods":[{"name":"get","args":[],"returns":{"type":"uint64"}}]}"#,
        )
        .unwrap()
        .resolve_method("get")
        .unwrap();

        let mut log = RETURN_LOG_PREFIX.to_vec();
        log.extend(7u64.to_be_bytes());
        let pending = PendingTransaction {
            confirmed_round: Some(5),
            pool_error: String::new(),
            logs: vec![base64::encode(b"other"), base64::encode(&log)],
        };
        assert_eq!(
            decode_return_value(&method, &pending).unwrap(),
            Some(7u64.to_be_bytes().to_vec())
        );

        let no_prefix = PendingTransaction {
            logs: vec![base64::encode(b"other")],
            ..pending
        };
        assert!(decode_return_value(&method, &no_prefix).is_err());
    }

    #[test]
    fn test_void_method_has_no_return() {
        let pending = PendingTransaction::default();
        assert_eq!(decode_return_value(&claim_method(), &pending).unwrap(), None);
    }
}
