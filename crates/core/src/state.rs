//! Application global-state lookups through the indexer.

use crate::error::{ClaimError, Result};
use crate::ledger::models::{TealValueRaw, TEAL_BYTES_TYPE, TEAL_UINT_TYPE};
use crate::ledger::IndexerApi;

/// A decoded global-state value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TealValue {
    Uint(u64),
    Bytes(Vec<u8>),
}

impl TealValue {
    /// Interpret the value as an asset id: a uint, or an 8-byte big-endian
    /// byte string as written by `itob`.
    pub fn as_asset_id(&self) -> Option<u64> {
        match self {
            TealValue::Uint(id) => Some(*id),
            TealValue::Bytes(raw) => {
                let be: [u8; 8] = raw.as_slice().try_into().ok()?;
                Some(u64::from_be_bytes(be))
            }
        }
    }
}

impl TryFrom<&TealValueRaw> for TealValue {
    type Error = ClaimError;

    fn try_from(raw: &TealValueRaw) -> Result<Self> {
        match raw.value_type {
            TEAL_UINT_TYPE => Ok(TealValue::Uint(raw.uint)),
            TEAL_BYTES_TYPE => Ok(TealValue::Bytes(base64::decode(&raw.bytes)?)),
            other => Err(ClaimError::Decode(format!(
                "unknown global-state value type {other}"
            ))),
        }
    }
}

/// Look up `key_name` in the global state of `app_id`.
///
/// Returns `Ok(None)` when the application exists but has no such key, and
/// `NotFound` when the application (or its params block) is missing.
pub async fn read_global_state_value<I: IndexerApi + ?Sized>(
    indexer: &I,
    app_id: u64,
    key_name: &str,
) -> Result<Option<TealValue>> {
    let response = indexer.lookup_application(app_id).await?;
    let params = response
        .application
        .and_then(|app| app.params)
        .ok_or_else(|| {
            ClaimError::NotFound(format!(
                "application {app_id} not found or has no parameters"
            ))
        })?;

    for entry in &params.global_state {
        let key = base64::decode(&entry.key)?;
        if key == key_name.as_bytes() {
            let value = TealValue::try_from(&entry.value)?;
            tracing::debug!(app_id, key = key_name, ?value, "global state entry found");
            return Ok(Some(value));
        }
    }

    tracing::debug!(app_id, key = key_name, "global state key absent");
    Ok(None)
}
