//! Access to an RPC-reachable (or simulated) EVM ledger.
//!
//! Everything the upgrade harness needs from a chain goes through the
//! [`Ledger`] trait: read calls, transaction submission, receipt lookup and
//! the handful of fork-only cheat methods used for impersonation.
pub mod confirm;
pub mod error;
pub mod receipt;
pub mod revert;
pub mod rpc;
pub mod signer;

pub use confirm::{ConfirmationPolicy, PendingTransaction};
pub use error::LedgerError;
pub use receipt::{ReceiptStatus, TransactionReceipt};
pub use rpc::{NodeDialect, RpcLedger};
pub use signer::ExternalSigner;

pub use ethers_core::types::{Address, Bytes, TransactionRequest, H256, U256};

/// Operations the harness performs against a ledger.
///
/// All methods take `&self`; implementations serialize access internally.
/// The harness never issues two writes concurrently, so implementations do not
/// need to order overlapping submissions.
pub trait Ledger {
    fn chain_id(&self) -> Result<u64, LedgerError>;

    fn block_number(&self) -> Result<u64, LedgerError>;

    /// Counter bumped every time ledger state is reset (for example when a
    /// fork is re-created). Identities acquired under an older epoch are stale.
    fn epoch(&self) -> u64;

    fn balance(&self, address: Address, block: Option<u64>) -> Result<U256, LedgerError>;

    fn nonce(&self, address: Address) -> Result<U256, LedgerError>;

    fn gas_price(&self) -> Result<U256, LedgerError>;

    fn code(&self, address: Address) -> Result<Bytes, LedgerError>;

    /// Executes a read-only call. Reverts surface as [`LedgerError::Reverted`].
    fn call(&self, tx: &TransactionRequest, block: Option<u64>) -> Result<Bytes, LedgerError>;

    fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, LedgerError>;

    /// Submits a transaction signed by the node itself. Only accounts the node
    /// controls (impersonated or unlocked) can be used as `from`.
    fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256, LedgerError>;

    fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, LedgerError>;

    fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, LedgerError>;

    /// Lets the node sign for `address` without its key. Fork/test ledgers only.
    fn impersonate(&self, address: Address) -> Result<(), LedgerError>;
}

