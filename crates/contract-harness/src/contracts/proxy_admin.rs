use ethers_core::abi::Token;
use ethers_core::types::Address;
use ledger::TransactionReceipt;

use super::{ContractHandle, Interface};
use crate::{HarnessError, Session};

/// Administration contract that owns the proxies and swaps their
/// implementations.
#[derive(Debug, Clone, Copy)]
pub struct ProxyAdmin;

impl Interface for ProxyAdmin {
    const NAME: &'static str = "ProxyAdmin";
}

impl ContractHandle<ProxyAdmin> {
    pub fn owner(&self, session: &Session<'_>) -> Result<Address, HarnessError> {
        self.read(
            session,
            "function owner() external view returns (address)",
            &[],
            None,
        )
    }

    pub fn proxy_implementation(
        &self,
        session: &Session<'_>,
        proxy: Address,
    ) -> Result<Address, HarnessError> {
        self.read(
            session,
            "function getProxyImplementation(address) external view returns (address)",
            &[Token::Address(proxy)],
            None,
        )
    }

    pub fn upgrade(
        &self,
        session: &Session<'_>,
        proxy: Address,
        implementation: Address,
    ) -> Result<TransactionReceipt, HarnessError> {
        self.send(
            session,
            "function upgrade(address,address) external",
            &[Token::Address(proxy), Token::Address(implementation)],
            None,
        )
    }
}
