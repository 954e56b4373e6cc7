//! Static configuration for the claim workflow.
//!
//! Every component receives a `ClaimConfig` at construction time; nothing
//! reads process-wide state except `from_env` and `load_mnemonic`.

use std::time::Duration;

use zeroize::Zeroizing;

use crate::error::{ClaimError, Result};

/// Public TestNet algod node.
pub const DEFAULT_ALGOD_SERVER: &str = "https://testnet-api.algonode.cloud";
/// Public TestNet indexer.
pub const DEFAULT_INDEXER_SERVER: &str = "https://testnet-idx.algonode.cloud";
/// The deployed claim application.
pub const DEFAULT_APP_ID: u64 = 736_014_374;
/// Global-state key holding the asset id.
pub const DEFAULT_ASSET_KEY: &str = "asset";
/// Minimum network fee in microAlgos.
pub const MIN_TXN_FEE: u64 = 1_000;
/// Outer call pre-pays the inner freeze transaction and its own fee.
pub const DEFAULT_CLAIM_FEE: u64 = 6 * MIN_TXN_FEE;
/// Rounds to wait for a submitted group to be confirmed.
pub const DEFAULT_WAIT_ROUNDS: u64 = 8;

/// Environment variable holding the 25-word account mnemonic.
pub const MNEMONIC_ENV: &str = "MNEMONIC_KEY";

/// Configuration for the ledger clients and the claim executor.
#[derive(Debug, Clone)]
pub struct ClaimConfig {
    /// algod REST endpoint (live queries and submission).
    pub algod_server: String,
    /// Optional `X-Algo-API-Token`.
    pub algod_token: Option<String>,
    /// Indexer REST endpoint (application lookups).
    pub indexer_server: String,
    /// Optional `X-Indexer-API-Token`.
    pub indexer_token: Option<String>,
    /// Application to read the asset id from and call `claimAsset` on.
    pub app_id: u64,
    /// Global-state key naming the asset.
    pub asset_key: String,
    /// Flat fee attached to the claim call.
    pub claim_fee: u64,
    /// Confirmation window for submitted transactions.
    pub wait_rounds: u64,
    /// HTTP request timeout.
    pub http_timeout: Duration,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            algod_server: DEFAULT_ALGOD_SERVER.to_string(),
            algod_token: None,
            indexer_server: DEFAULT_INDEXER_SERVER.to_string(),
            indexer_token: None,
            app_id: DEFAULT_APP_ID,
            asset_key: DEFAULT_ASSET_KEY.to_string(),
            claim_fee: DEFAULT_CLAIM_FEE,
            wait_rounds: DEFAULT_WAIT_ROUNDS,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl ClaimConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = non_blank_var("CLAIM_ALGOD_SERVER") {
            config.algod_server = url;
        }
        if let Some(url) = non_blank_var("CLAIM_INDEXER_SERVER") {
            config.indexer_server = url;
        }
        config.algod_token = non_blank_var("CLAIM_ALGOD_TOKEN");
        config.indexer_token = non_blank_var("CLAIM_INDEXER_TOKEN");
        if let Some(raw) = non_blank_var("CLAIM_APP_ID") {
            match raw.parse::<u64>() {
                Ok(v) => config.app_id = v,
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring invalid CLAIM_APP_ID"),
            }
        }
        if let Some(raw) = non_blank_var("CLAIM_WAIT_ROUNDS") {
            match raw.parse::<u64>() {
                Ok(v) if v > 0 => config.wait_rounds = v,
                _ => tracing::warn!(value = %raw, "ignoring invalid CLAIM_WAIT_ROUNDS"),
            }
        }

        config
    }
}

/// Read the account mnemonic from `MNEMONIC_KEY`.
pub fn load_mnemonic() -> Result<Zeroizing<String>> {
    non_blank_var(MNEMONIC_ENV)
        .map(Zeroizing::new)
        .ok_or_else(|| {
            ClaimError::Configuration(format!(
                "{MNEMONIC_ENV} is not defined in environment variables"
            ))
        })
}

fn non_blank_var(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
