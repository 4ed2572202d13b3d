use std::{
    thread,
    time::{Duration, Instant},
};

use ethers_core::types::H256;

use crate::{Ledger, LedgerError, TransactionReceipt};

/// How long to wait for a submitted transaction to be included in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// A transaction that has been accepted by the node but whose inclusion has
/// not been observed yet. It cannot be retracted; the only thing left to do
/// with it is [`PendingTransaction::confirm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a submitted transaction must be confirmed before the next step"]
pub struct PendingTransaction {
    pub hash: H256,
}

impl PendingTransaction {
    pub fn new(hash: H256) -> Self {
        Self { hash }
    }

    /// Blocks until the transaction has a receipt or the policy's timeout
    /// elapses. A reverted receipt is returned as-is.
    pub fn confirm(
        self,
        ledger: &dyn Ledger,
        policy: &ConfirmationPolicy,
    ) -> Result<TransactionReceipt, LedgerError> {
        let started = Instant::now();
        loop {
            if let Some(receipt) = ledger.transaction_receipt(self.hash)? {
                tracing::debug!(
                    target: "rpc",
                    hash = %format!("{:#x}", self.hash),
                    block = receipt.block_number,
                    status = ?receipt.status,
                    "transaction confirmed"
                );
                return Ok(receipt);
            }
            let waited = started.elapsed();
            if waited >= policy.timeout {
                return Err(LedgerError::ConfirmationTimeout {
                    hash: self.hash,
                    waited,
                });
            }
            thread::sleep(policy.poll_interval.min(policy.timeout - waited));
        }
    }
}
