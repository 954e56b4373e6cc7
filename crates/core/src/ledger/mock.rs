//! In-memory ledger + indexer for tests.
//!
//! Submissions are decoded and signature-checked. A zero-amount self
//! transfer registers a holding; an application call naming a foreign asset
//! freezes the caller's holding of it, which is what the claim contract does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::models::{
    AccountInformation, Application, ApplicationParams, ApplicationResponse, AssetHolding,
    NodeStatus, PendingTransaction, TealKeyValue,
};
use super::{ClientLoader, IndexerApi, LedgerApi, LedgerFuture};
use crate::account::Address;
use crate::error::{ClaimError, Result};
use crate::transaction::{SignedTransaction, SuggestedParams, TransactionType, VALIDITY_WINDOW};

#[derive(Default)]
struct MockState {
    round: u64,
    holdings: HashMap<Address, Vec<AssetHolding>>,
    applications: HashMap<u64, Application>,
    attempts: Vec<Vec<SignedTransaction>>,
    submissions: Vec<Vec<SignedTransaction>>,
    pending: HashMap<String, PendingTransaction>,
    reject_with: Option<String>,
    never_confirm: bool,
    loads: usize,
}

/// Shared handle; clones observe the same ledger.
#[derive(Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.lock().round = 1_000;
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an application with the given global state.
    pub fn with_application(self, app_id: u64, global_state: Vec<TealKeyValue>) -> Self {
        self.lock().applications.insert(
            app_id,
            Application {
                id: app_id,
                params: Some(ApplicationParams {
                    creator: None,
                    global_state,
                }),
            },
        );
        self
    }

    /// Register an application record that carries no params block.
    pub fn with_bare_application(self, app_id: u64) -> Self {
        self.lock().applications.insert(
            app_id,
            Application {
                id: app_id,
                params: None,
            },
        );
        self
    }

    pub fn with_holding(self, address: Address, asset_id: u64, is_frozen: bool) -> Self {
        self.lock()
            .holdings
            .entry(address)
            .or_default()
            .push(AssetHolding {
                amount: 0,
                asset_id,
                is_frozen,
            });
        self
    }

    /// Every submission fails with `TransactionRejected(message)`.
    pub fn rejecting(self, message: &str) -> Self {
        self.lock().reject_with = Some(message.to_string());
        self
    }

    pub fn with_round(self, round: u64) -> Self {
        self.lock().round = round;
        self
    }

    /// Submissions are accepted but never confirmed.
    pub fn never_confirming(self) -> Self {
        self.lock().never_confirm = true;
        self
    }

    /// Accepted payloads, each split into its signed transactions.
    pub fn submissions(&self) -> Vec<Vec<SignedTransaction>> {
        self.lock().submissions.clone()
    }

    /// Every decodable payload sent, accepted or not.
    pub fn attempts(&self) -> Vec<Vec<SignedTransaction>> {
        self.lock().attempts.clone()
    }

    pub fn holding(&self, address: Address, asset_id: u64) -> Option<AssetHolding> {
        self.lock()
            .holdings
            .get(&address)
            .and_then(|h| h.iter().find(|h| h.asset_id == asset_id).cloned())
    }

    pub fn round(&self) -> u64 {
        self.lock().round
    }

    /// Number of handles handed out through `ClientLoader`.
    pub fn loads(&self) -> usize {
        self.lock().loads
    }

    fn apply(state: &mut MockState, signed: &SignedTransaction) -> Result<()> {
        let txn = &signed.transaction;
        let key = VerifyingKey::from_bytes(txn.sender.as_bytes())
            .map_err(|e| ClaimError::TransactionRejected(format!("bad sender key: {e}")))?;
        key.verify(&txn.bytes_to_sign()?, &Signature::from_bytes(&signed.signature))
            .map_err(|_| ClaimError::TransactionRejected("invalid signature".to_string()))?;

        let holdings = state.holdings.entry(txn.sender).or_default();
        match txn.tx_type {
            TransactionType::AssetTransfer => {
                let self_opt_in = txn.asset_amount == 0 && txn.asset_receiver == Some(txn.sender);
                if self_opt_in && !holdings.iter().any(|h| h.asset_id == txn.asset_id) {
                    holdings.push(AssetHolding {
                        amount: 0,
                        asset_id: txn.asset_id,
                        is_frozen: false,
                    });
                }
            }
            TransactionType::ApplicationCall => {
                for asset_id in &txn.foreign_assets {
                    let holding = holdings
                        .iter_mut()
                        .find(|h| h.asset_id == *asset_id)
                        .ok_or_else(|| {
                            ClaimError::TransactionRejected(format!(
                                "{} not opted in to asset {asset_id}",
                                txn.sender
                            ))
                        })?;
                    holding.is_frozen = true;
                }
            }
        }
        Ok(())
    }
}

impl LedgerApi for MockLedger {
    fn suggested_params(&self) -> LedgerFuture<'_, SuggestedParams> {
        let round = self.round();
        Box::pin(async move {
            Ok(SuggestedParams {
                fee: 0,
                min_fee: 1_000,
                flat_fee: false,
                first_valid: round,
                last_valid: round + VALIDITY_WINDOW,
                genesis_id: "mocknet-v1".to_string(),
                genesis_hash: [9u8; 32],
            })
        })
    }

    fn account_information(&self, address: Address) -> LedgerFuture<'_, AccountInformation> {
        let assets = self.lock().holdings.get(&address).cloned().unwrap_or_default();
        Box::pin(async move {
            Ok(AccountInformation {
                address: address.to_string(),
                amount: 1_000_000,
                assets,
            })
        })
    }

    fn send_raw_transaction(&self, payload: Vec<u8>) -> LedgerFuture<'_, String> {
        let result = (|| -> Result<String> {
            let group = SignedTransaction::decode_stream(&payload)?;
            let mut state = self.lock();
            state.attempts.push(group.clone());
            if let Some(message) = &state.reject_with {
                return Err(ClaimError::TransactionRejected(message.clone()));
            }
            let first = group
                .first()
                .ok_or_else(|| ClaimError::TransactionRejected("empty payload".to_string()))?
                .id()?;

            // All or nothing
            let snapshot = state.holdings.clone();
            for signed in &group {
                if let Err(e) = Self::apply(&mut state, signed) {
                    state.holdings = snapshot;
                    return Err(e);
                }
            }

            let confirmed_round = if state.never_confirm {
                None
            } else {
                state.round += 1;
                Some(state.round)
            };
            for signed in &group {
                state.pending.insert(
                    signed.id()?,
                    PendingTransaction {
                        confirmed_round,
                        pool_error: String::new(),
                        logs: Vec::new(),
                    },
                );
            }
            state.submissions.push(group);
            Ok(first)
        })();
        Box::pin(async move { result })
    }

    fn pending_transaction(&self, txid: &str) -> LedgerFuture<'_, PendingTransaction> {
        let pending = self.lock().pending.get(txid).cloned();
        let txid = txid.to_string();
        Box::pin(async move {
            pending.ok_or_else(|| ClaimError::Http {
                status: 404,
                url: format!("/v2/transactions/pending/{txid}"),
                message: "txn not found".to_string(),
            })
        })
    }

    fn status(&self) -> LedgerFuture<'_, NodeStatus> {
        let last_round = self.round();
        Box::pin(async move { Ok(NodeStatus { last_round }) })
    }

    fn status_after_block(&self, round: u64) -> LedgerFuture<'_, NodeStatus> {
        let last_round = {
            let mut state = self.lock();
            state.round = state.round.max(round.saturating_add(1));
            state.round
        };
        Box::pin(async move { Ok(NodeStatus { last_round }) })
    }
}

impl IndexerApi for MockLedger {
    fn lookup_application(&self, app_id: u64) -> LedgerFuture<'_, ApplicationResponse> {
        let state = self.lock();
        let response = ApplicationResponse {
            application: state.applications.get(&app_id).cloned(),
            current_round: Some(state.round),
        };
        drop(state);
        Box::pin(async move { Ok(response) })
    }
}

impl ClientLoader for MockLedger {
    type Ledger = MockLedger;
    type Indexer = MockLedger;

    fn ledger(&self) -> Result<MockLedger> {
        self.lock().loads += 1;
        Ok(self.clone())
    }

    fn indexer(&self) -> Result<MockLedger> {
        self.lock().loads += 1;
        Ok(self.clone())
    }
}
