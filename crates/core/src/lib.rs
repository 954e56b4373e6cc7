//! Opt an account in to an application-managed asset and claim it.
//!
//! The run is strictly sequential:
//!
//! ```text
//! ClientLoader -> read_global_state_value -> opt_in -> claim
//! ```
//!
//! Both executors check the account's holding first and skip when the
//! ledger already reflects the step, so re-running is safe.

pub mod abi;
pub mod account;
pub mod claim;
pub mod composer;
pub mod config;
pub mod error;
pub mod ledger;
pub mod opt_in;
pub mod state;
pub mod transaction;
pub mod workflow;

pub use abi::{AbiContract, AbiMethod, MethodResolver};
pub use account::{Account, Address, TransactionSigner};
pub use config::ClaimConfig;
pub use error::{ClaimError, Result};
pub use ledger::{ClientLoader, HttpClientLoader, IndexerApi, LedgerApi};
pub use workflow::{run_workflow, RunReport, StepOutcome};
