//! Transaction submission for one orchestration run.
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, H256, U256,
};
use ledger::{ConfirmationPolicy, Ledger, LedgerError, PendingTransaction, TransactionReceipt};

use crate::{identity::Signer, HarnessError, Identity};

/// Refuses submission while the node quotes more than `max_gas_price`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeGuard {
    pub max_gas_price: Option<U256>,
}

impl FeeGuard {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn capped_gwei(gwei: u64) -> Self {
        Self {
            max_gas_price: Some(U256::from(gwei) * U256::exp10(9)),
        }
    }

    pub fn check(&self, quoted: U256) -> Result<(), HarnessError> {
        match self.max_gas_price {
            Some(cap) if quoted > cap => Err(HarnessError::FeeCapExceeded { quoted, cap }),
            _ => Ok(()),
        }
    }
}

/// A state-changing call to submit. `to == None` creates a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Call {
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    /// Skips gas estimation when set.
    pub gas: Option<U256>,
}

impl Call {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn create(init_code: impl Into<Bytes>) -> Self {
        Self {
            data: init_code.into(),
            ..Default::default()
        }
    }

    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: Some(to),
            value,
            ..Default::default()
        }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas.into());
        self
    }

    fn request(&self, from: Address) -> TransactionRequest {
        let mut tx = TransactionRequest::new()
            .from(from)
            .data(self.data.clone())
            .value(self.value);
        if let Some(to) = self.to {
            tx = tx.to(to);
        }
        tx
    }
}

/// One orchestration run against a ledger. Every write goes through
/// [`Session::submit`], which returns only once the transaction is confirmed.
pub struct Session<'l> {
    ledger: &'l dyn Ledger,
    confirmation: ConfirmationPolicy,
    fees: FeeGuard,
}

impl<'l> Session<'l> {
    pub fn new(ledger: &'l dyn Ledger) -> Self {
        Self {
            ledger,
            confirmation: ConfirmationPolicy::default(),
            fees: FeeGuard::default(),
        }
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_fee_guard(mut self, fees: FeeGuard) -> Self {
        self.fees = fees;
        self
    }

    pub fn ledger(&self) -> &'l dyn Ledger {
        self.ledger
    }

    pub fn block_number(&self) -> Result<u64, HarnessError> {
        Ok(self.ledger.block_number()?)
    }

    /// Read-only call, optionally pinned to `block`.
    pub fn call(
        &self,
        to: Address,
        data: Vec<u8>,
        block: Option<u64>,
        operation: &str,
    ) -> Result<Bytes, HarnessError> {
        let tx = TransactionRequest::new().to(to).data(data);
        self.ledger
            .call(&tx, block)
            .map_err(|err| revert_error(operation, err))
    }

    /// Signs, submits and confirms `call` as `identity`. A reverted receipt is
    /// reported as [`HarnessError::Reverted`] with the recovered reason.
    pub fn submit(
        &self,
        identity: &Identity,
        call: Call,
        operation: &str,
    ) -> Result<TransactionReceipt, HarnessError> {
        identity.ensure_current(self.ledger)?;
        let from = identity.address();
        let mut tx = call.request(from);

        // Pre-flight: a revert found here costs nothing.
        self.ledger
            .call(&tx, None)
            .map_err(|err| revert_error(operation, err))?;
        let gas = match call.gas {
            Some(gas) => gas,
            None => self
                .ledger
                .estimate_gas(&tx)
                .map_err(|err| revert_error(operation, err))?,
        };

        let gas_price = self.ledger.gas_price()?;
        self.fees.check(gas_price)?;

        tx = tx
            .gas(gas)
            .gas_price(gas_price)
            .nonce(self.ledger.nonce(from)?);
        let hash = self
            .send(identity, tx.clone())
            .map_err(|err| revert_error(operation, err))?;
        tracing::info!(
            target: "session",
            operation,
            from = %format!("{from:#x}"),
            hash = %format!("{hash:#x}"),
            "submitted transaction"
        );

        let receipt = PendingTransaction::new(hash).confirm(self.ledger, &self.confirmation)?;
        if receipt.succeeded() {
            return Ok(receipt);
        }

        // Replay against the parent block to recover the revert reason.
        let replay = TransactionRequest {
            nonce: None,
            ..tx
        };
        let reason = match self
            .ledger
            .call(&replay, Some(receipt.block_number.saturating_sub(1)))
        {
            Err(LedgerError::Reverted { reason }) => reason,
            _ => None,
        };
        tracing::warn!(
            target: "session",
            operation,
            hash = %format!("{hash:#x}"),
            reason = reason.as_deref().unwrap_or("<none>"),
            "transaction reverted"
        );
        Err(HarnessError::Reverted {
            operation: operation.to_string(),
            reason,
        })
    }

    fn send(&self, identity: &Identity, mut tx: TransactionRequest) -> Result<H256, LedgerError> {
        match identity.signer() {
            Signer::Impersonated => self.ledger.send_transaction(&tx),
            Signer::Keyed(wallet) => {
                tx.chain_id = Some(self.ledger.chain_id()?.into());
                let typed = TypedTransaction::Legacy(tx);
                let signature = wallet
                    .sign_transaction_sync(&typed)
                    .map_err(|err| LedgerError::Signing(err.to_string()))?;
                self.ledger.send_raw_transaction(typed.rlp_signed(&signature))
            }
            Signer::Hardware(signer) => {
                tx.chain_id = Some(self.ledger.chain_id()?.into());
                let raw = signer.sign_transaction(&tx)?;
                self.ledger.send_raw_transaction(raw)
            }
        }
    }
}

pub(crate) fn revert_error(operation: &str, err: LedgerError) -> HarnessError {
    match err {
        LedgerError::Reverted { reason } => HarnessError::Reverted {
            operation: operation.to_string(),
            reason,
        },
        other => other.into(),
    }
}
