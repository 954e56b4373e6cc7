//! Ledger and indexer service seams.
//!
//! The workflow only sees `LedgerApi` / `IndexerApi`; the HTTP clients in
//! [`http`] are the production implementations and [`mock`] backs the tests.

use std::future::Future;
use std::pin::Pin;

use crate::account::Address;
use crate::error::Result;
use crate::transaction::SuggestedParams;

pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod models;

pub use http::{AlgodClient, HttpClientLoader, IndexerClient};
pub use models::{
    AccountInformation, Application, ApplicationParams, ApplicationResponse, AssetHolding,
    NodeStatus, PendingTransaction, TealKeyValue, TealValueRaw,
};

pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Live node API: queries, submission and confirmation tracking.
pub trait LedgerApi: Send + Sync {
    fn suggested_params(&self) -> LedgerFuture<'_, SuggestedParams>;

    fn account_information(&self, address: Address) -> LedgerFuture<'_, AccountInformation>;

    /// Submit one or more concatenated signed transactions; returns the
    /// id of the first one.
    fn send_raw_transaction(&self, payload: Vec<u8>) -> LedgerFuture<'_, String>;

    fn pending_transaction(&self, txid: &str) -> LedgerFuture<'_, PendingTransaction>;

    fn status(&self) -> LedgerFuture<'_, NodeStatus>;

    /// Resolves once the ledger has passed `round`.
    fn status_after_block(&self, round: u64) -> LedgerFuture<'_, NodeStatus>;
}

/// Historical / aggregated state queries.
pub trait IndexerApi: Send + Sync {
    /// An unknown application yields a response with no `application`.
    fn lookup_application(&self, app_id: u64) -> LedgerFuture<'_, ApplicationResponse>;
}

/// Hands out fresh service handles; called once per workflow step.
pub trait ClientLoader {
    type Ledger: LedgerApi;
    type Indexer: IndexerApi;

    fn ledger(&self) -> Result<Self::Ledger>;

    fn indexer(&self) -> Result<Self::Indexer>;
}
