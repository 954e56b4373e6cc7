//! Error taxonomy for the opt-in / claim workflow.
//!
//! Only the two idempotency checks (already opted in, already claimed) are
//! handled inside the library. Everything below propagates to the caller
//! unmodified.

/// Errors produced while loading configuration, talking to the ledger, or
/// building and submitting transactions.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },
    #[error("transaction rejected: {0}")]
    TransactionRejected(String),
    #[error("transaction {txid} not confirmed after {rounds} rounds")]
    ConfirmationTimeout { txid: String, rounds: u64 },
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("method `{0}` not found in contract descriptor")]
    MethodNotFound(String),
    #[error("method name `{name}` is ambiguous ({count} overloads)")]
    AmbiguousMethod { name: String, count: usize },
    #[error("method `{method}` takes {expected} arguments, got {actual}")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid global state: {0}")]
    InvalidGlobalState(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("failed to encode transaction: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("atomic group holds at most {max} transactions")]
    GroupTooLarge { max: usize },
    #[error("invalid atomic group: {0}")]
    InvalidGroup(String),
    #[error("atomic group is already {0}; no further changes allowed")]
    ComposerSealed(&'static str),
}

pub type Result<T, E = ClaimError> = std::result::Result<T, E>;

impl From<base64::DecodeError> for ClaimError {
    fn from(err: base64::DecodeError) -> Self {
        ClaimError::Decode(err.to_string())
    }
}
