//! Balance records used for conservation checks.
use std::fmt;

use ethers_core::types::{Address, U256};

use crate::{
    contracts::{ContractHandle, Erc20},
    HarnessError, Identity, Session,
};

/// Something that can be held: the chain's native currency or an ERC-20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Native,
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native currency"),
            Self::Token(token) => write!(f, "token {token:#x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceRecord {
    pub address: Address,
    pub asset: Asset,
    pub amount: U256,
}

impl BalanceRecord {
    /// Reads the current balance of `address` in `asset`, optionally pinned to
    /// `block`. `reader` is only used to issue token reads.
    pub fn capture(
        session: &Session<'_>,
        reader: &Identity,
        address: Address,
        asset: Asset,
        block: Option<u64>,
    ) -> Result<Self, HarnessError> {
        let amount = match asset {
            Asset::Native => session.ledger().balance(address, block)?,
            Asset::Token(token) => ContractHandle::<Erc20>::new(token, reader.clone())
                .balance_of(session, address, block)?,
        };
        tracing::debug!(
            target: "treasury",
            address = %format!("{address:#x}"),
            %asset,
            %amount,
            "balance"
        );
        Ok(Self {
            address,
            asset,
            amount,
        })
    }
}

impl fmt::Display for BalanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} holds {} of {}", self.address, self.amount, self.asset)
    }
}
