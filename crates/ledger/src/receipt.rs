use ethers_core::types::{self as eth, Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// A transaction once it has been included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    pub block_number: u64,
    pub status: ReceiptStatus,
    pub from: Address,
    pub to: Option<Address>,
    /// Set for contract-creation transactions that succeeded.
    pub contract_address: Option<Address>,
    pub gas_used: U256,
    pub effective_gas_price: U256,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    /// Native currency spent on fees by the sender.
    pub fn fee_paid(&self) -> U256 {
        self.gas_used.saturating_mul(self.effective_gas_price)
    }
}

impl TryFrom<eth::TransactionReceipt> for TransactionReceipt {
    type Error = LedgerError;

    fn try_from(value: eth::TransactionReceipt) -> Result<Self, Self::Error> {
        let block_number = value
            .block_number
            .ok_or_else(|| LedgerError::Decode("receipt without block number".into()))?
            .as_u64();
        // Pre-byzantium receipts carry no status and are rejected.
        let status = match value.status.map(|status| status.as_u64()) {
            Some(1) => ReceiptStatus::Success,
            Some(0) => ReceiptStatus::Reverted,
            other => {
                return Err(LedgerError::Decode(format!(
                    "unexpected receipt status {other:?}"
                )));
            }
        };
        Ok(Self {
            transaction_hash: value.transaction_hash,
            block_number,
            status,
            from: value.from,
            to: value.to,
            contract_address: value.contract_address,
            gas_used: value.gas_used.unwrap_or_default(),
            effective_gas_price: value.effective_gas_price.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::U64;

    #[test]
    fn converts_rpc_receipt() {
        let rpc = eth::TransactionReceipt {
            transaction_hash: H256::repeat_byte(0x11),
            block_number: Some(U64::from(16_969_692u64)),
            status: Some(U64::from(1u64)),
            contract_address: Some(Address::repeat_byte(0x22)),
            gas_used: Some(U256::from(21_000u64)),
            effective_gas_price: Some(U256::from(7u64)),
            ..Default::default()
        };
        let receipt = TransactionReceipt::try_from(rpc).unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, 16_969_692);
        assert_eq!(receipt.fee_paid(), U256::from(147_000u64));
    }

    #[test]
    fn rejects_pending_receipt() {
        let rpc = eth::TransactionReceipt {
            status: Some(U64::from(1u64)),
            ..Default::default()
        };
        assert!(TransactionReceipt::try_from(rpc).is_err());
    }
}
