//! Typed handles for the contracts the workflow talks to.
use std::{fmt, marker::PhantomData};

use ethers_core::abi::{Detokenize, Token};
use ethers_core::types::Address;
use ledger::TransactionReceipt;

use crate::{
    abi::{decode_output, decode_tokens, encode_function_call},
    session::Call,
    HarnessError, Identity, Session,
};

mod dat;
mod erc20;
mod proxy_admin;

pub use dat::{ConfigUpdate, Dat, InitializeParams, INITIALIZE_SIGNATURE};
pub use erc20::Erc20;
pub use proxy_admin::ProxyAdmin;

/// Marker for the ABI a [`ContractHandle`] speaks.
pub trait Interface {
    const NAME: &'static str;
}

/// A deployed contract seen through interface `C`, called as `caller`.
///
/// Handles are cheap to clone; [`ContractHandle::with_caller`] gives a second
/// view of the same address under another identity.
pub struct ContractHandle<C> {
    address: Address,
    caller: Identity,
    interface: PhantomData<C>,
}

impl<C> Clone for ContractHandle<C> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            caller: self.caller.clone(),
            interface: PhantomData,
        }
    }
}

impl<C: Interface> fmt::Debug for ContractHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("interface", &C::NAME)
            .field("address", &format_args!("{:#x}", self.address))
            .field("caller", &self.caller)
            .finish()
    }
}

impl<C: Interface> ContractHandle<C> {
    pub fn new(address: Address, caller: Identity) -> Self {
        Self {
            address,
            caller,
            interface: PhantomData,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn caller(&self) -> &Identity {
        &self.caller
    }

    pub fn with_caller(&self, caller: Identity) -> Self {
        Self::new(self.address, caller)
    }

    pub(crate) fn read<R: Detokenize>(
        &self,
        session: &Session<'_>,
        signature: &str,
        args: &[Token],
        block: Option<u64>,
    ) -> Result<R, HarnessError> {
        let (function, data) = encode_function_call(signature, args)?;
        let output = session.call(self.address, data, block, &function.name)?;
        decode_output(&function, &output)
    }

    pub(crate) fn read_tokens(
        &self,
        session: &Session<'_>,
        signature: &str,
        block: Option<u64>,
    ) -> Result<Vec<Token>, HarnessError> {
        let (function, data) = encode_function_call(signature, &[])?;
        let output = session.call(self.address, data, block, &function.name)?;
        decode_tokens(&function, &output)
    }

    pub(crate) fn send(
        &self,
        session: &Session<'_>,
        signature: &str,
        args: &[Token],
        gas: Option<u64>,
    ) -> Result<TransactionReceipt, HarnessError> {
        let (function, data) = encode_function_call(signature, args)?;
        let mut call = Call::new(self.address, data);
        if let Some(gas) = gas {
            call = call.with_gas(gas);
        }
        tracing::debug!(
            target: "session",
            contract = C::NAME,
            address = %format!("{:#x}", self.address),
            function = %function.signature(),
            "calling"
        );
        session.submit(&self.caller, call, &function.name)
    }
}
