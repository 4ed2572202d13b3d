use ethers_core::abi::Token;
use ethers_core::types::{Address, U256};

use super::{ContractHandle, Interface};
use crate::{HarnessError, Session};

/// Plain fungible token, only ever read.
#[derive(Debug, Clone, Copy)]
pub struct Erc20;

impl Interface for Erc20 {
    const NAME: &'static str = "IERC20";
}

impl ContractHandle<Erc20> {
    pub fn balance_of(
        &self,
        session: &Session<'_>,
        holder: Address,
        block: Option<u64>,
    ) -> Result<U256, HarnessError> {
        self.read(
            session,
            "function balanceOf(address) external view returns (uint256)",
            &[Token::Address(holder)],
            block,
        )
    }
}
