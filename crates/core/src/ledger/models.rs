//! JSON response bodies of the algod and indexer REST APIs.

use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, Result};
use crate::transaction::{SuggestedParams, VALIDITY_WINDOW};

/// `GET /v2/transactions/params`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransactionParams {
    #[serde(default)]
    pub consensus_version: String,
    pub fee: u64,
    /// Base64 genesis hash.
    pub genesis_hash: String,
    pub genesis_id: String,
    pub last_round: u64,
    pub min_fee: u64,
}

impl TransactionParams {
    pub fn into_suggested(self) -> Result<SuggestedParams> {
        let raw = base64::decode(&self.genesis_hash)?;
        let genesis_hash: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
            ClaimError::Decode(format!("genesis hash is {} bytes, expected 32", raw.len()))
        })?;
        Ok(SuggestedParams {
            fee: self.fee,
            min_fee: self.min_fee,
            flat_fee: false,
            first_valid: self.last_round,
            last_valid: self.last_round + VALIDITY_WINDOW,
            genesis_id: self.genesis_id,
            genesis_hash,
        })
    }
}

/// One entry of an account's `assets` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssetHolding {
    #[serde(default)]
    pub amount: u64,
    pub asset_id: u64,
    #[serde(default)]
    pub is_frozen: bool,
}

/// `GET /v2/accounts/{address}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountInformation {
    pub address: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub assets: Vec<AssetHolding>,
}

impl AccountInformation {
    pub fn holding(&self, asset_id: u64) -> Option<&AssetHolding> {
        self.assets.iter().find(|h| h.asset_id == asset_id)
    }
}

/// `POST /v2/transactions`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(rename = "txId")]
    pub tx_id: String,
}

/// `GET /v2/transactions/pending/{txid}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PendingTransaction {
    #[serde(default)]
    pub confirmed_round: Option<u64>,
    #[serde(default)]
    pub pool_error: String,
    /// Base64 log entries emitted by an application call.
    #[serde(default)]
    pub logs: Vec<String>,
}

impl PendingTransaction {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_round.is_some_and(|r| r > 0)
    }
}

/// `GET /v2/status` and `GET /v2/status/wait-for-block-after/{round}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeStatus {
    pub last_round: u64,
}

// =============================================================================
// Indexer
// =============================================================================

/// `GET /v2/applications/{app-id}` on the indexer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApplicationResponse {
    #[serde(default)]
    pub application: Option<Application>,
    #[serde(default)]
    pub current_round: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: u64,
    #[serde(default)]
    pub params: Option<ApplicationParams>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApplicationParams {
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub global_state: Vec<TealKeyValue>,
}

/// Global-state entry; `key` is base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TealKeyValue {
    pub key: String,
    pub value: TealValueRaw,
}

/// Tagged value: `type` 1 is bytes (base64 in `bytes`), 2 is `uint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TealValueRaw {
    #[serde(rename = "type")]
    pub value_type: u8,
    #[serde(default)]
    pub bytes: String,
    #[serde(default)]
    pub uint: u64,
}

pub const TEAL_BYTES_TYPE: u8 = 1;
pub const TEAL_UINT_TYPE: u8 = 2;

impl TealKeyValue {
    pub fn uint(key: &str, value: u64) -> Self {
        Self {
            key: base64::encode(key),
            value: TealValueRaw {
                value_type: TEAL_UINT_TYPE,
                bytes: String::new(),
                uint: value,
            },
        }
    }

    pub fn bytes(key: &str, value: &[u8]) -> Self {
        Self {
            key: base64::encode(key),
            value: TealValueRaw {
                value_type: TEAL_BYTES_TYPE,
                bytes: base64::encode(value),
                uint: 0,
            },
        }
    }
}
