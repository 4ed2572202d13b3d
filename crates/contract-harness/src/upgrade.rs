//! Swapping a proxy's implementation and confirming the swap took.
use std::fmt;

use ethers_core::types::Address;
use ledger::TransactionReceipt;

use crate::{
    contracts::{ContractHandle, ProxyAdmin},
    HarnessError, Role, Session,
};

/// Progress of one upgrade. Moves strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    /// The new implementation exists; the proxy still points elsewhere.
    Deployed,
    /// The upgrade transaction confirmed but the result is not checked yet.
    Upgraded,
    Verified,
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed => write!(f, "deployed"),
            Self::Upgraded => write!(f, "upgraded"),
            Self::Verified => write!(f, "verified"),
        }
    }
}

/// Drives `proxy` from its current implementation to `new_implementation`
/// through the administration contract, acting as the handle's caller.
#[derive(Debug)]
pub struct UpgradeController {
    admin: ContractHandle<ProxyAdmin>,
    proxy: Address,
    new_implementation: Address,
    previous_implementation: Option<Address>,
    state: UpgradeState,
}

impl UpgradeController {
    pub fn new(
        admin: ContractHandle<ProxyAdmin>,
        proxy: Address,
        new_implementation: Address,
    ) -> Self {
        Self {
            admin,
            proxy,
            new_implementation,
            previous_implementation: None,
            state: UpgradeState::Deployed,
        }
    }

    pub fn state(&self) -> UpgradeState {
        self.state
    }

    pub fn proxy(&self) -> Address {
        self.proxy
    }

    pub fn new_implementation(&self) -> Address {
        self.new_implementation
    }

    /// Implementation the proxy resolved to right before the upgrade.
    pub fn previous_implementation(&self) -> Option<Address> {
        self.previous_implementation
    }

    /// Submits the upgrade and waits for it. Only valid in
    /// [`UpgradeState::Deployed`].
    pub fn upgrade(&mut self, session: &Session<'_>) -> Result<TransactionReceipt, HarnessError> {
        if self.state != UpgradeState::Deployed {
            return Err(HarnessError::InvalidTransition {
                state: self.state,
                action: "upgrade",
            });
        }
        let previous = self.admin.proxy_implementation(session, self.proxy).ok();
        tracing::info!(
            target: "upgrade",
            proxy = %format!("{:#x}", self.proxy),
            from = %previous.map_or_else(|| "<unknown>".to_string(), |a| format!("{a:#x}")),
            to = %format!("{:#x}", self.new_implementation),
            "upgrading proxy"
        );

        let receipt = match self
            .admin
            .upgrade(session, self.proxy, self.new_implementation)
        {
            Ok(receipt) => receipt,
            Err(err @ HarnessError::Reverted { .. }) => {
                let caller = self.admin.caller().address();
                let owner = self.admin.owner(session)?;
                if owner != caller {
                    return Err(HarnessError::Unauthorized {
                        role: Role::ProxyAdminOwner,
                        contract: self.admin.address(),
                        caller,
                        holder: owner,
                    });
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        self.previous_implementation = previous;
        self.state = UpgradeState::Upgraded;
        Ok(receipt)
    }

    /// Confirms the proxy resolves to the new implementation. On mismatch the
    /// controller stays in [`UpgradeState::Upgraded`]; nothing is rolled back.
    pub fn verify(&mut self, session: &Session<'_>) -> Result<(), HarnessError> {
        if self.state != UpgradeState::Upgraded {
            return Err(HarnessError::InvalidTransition {
                state: self.state,
                action: "verify",
            });
        }
        let actual = self.admin.proxy_implementation(session, self.proxy)?;
        if actual != self.new_implementation {
            tracing::error!(
                target: "upgrade",
                proxy = %format!("{:#x}", self.proxy),
                expected = %format!("{:#x}", self.new_implementation),
                actual = %format!("{actual:#x}"),
                "proxy does not resolve to the new implementation"
            );
            return Err(HarnessError::UpgradeVerificationFailed {
                proxy: self.proxy,
                expected: self.new_implementation,
                actual,
            });
        }
        self.state = UpgradeState::Verified;
        tracing::info!(
            target: "upgrade",
            proxy = %format!("{:#x}", self.proxy),
            "upgrade verified"
        );
        Ok(())
    }
}
