//! Upgrade-and-verify workflow for a proxied DAT token.
//!
//! A run acquires [`Identity`]s, deploys a replacement implementation, swaps
//! it into the proxy through the administration contract, proves with
//! [`StateSnapshot`]s that nothing observable changed, then exercises the
//! privileged treasury and supply operations while checking conservation.
//! Every write is confirmed before the next step starts; the first error ends
//! the run.
pub mod abi;
pub mod artifact;
pub mod balance;
pub mod campaign;
pub mod contracts;
pub mod deploy;
mod error;
pub mod governance;
pub mod identity;
pub mod rebalance;
pub mod session;
pub mod snapshot;
pub mod treasury;
pub mod upgrade;

pub use artifact::ContractArtifact;
pub use balance::{Asset, BalanceRecord};
pub use campaign::{Campaign, CampaignAborted, CampaignPlan, CampaignReport};
pub use contracts::{ContractHandle, Dat, Erc20, InitializeParams, ProxyAdmin};
pub use error::{HarnessError, Role};
pub use identity::{Identity, IdentityMode, IdentityProvider};
pub use session::{Call, FeeGuard, Session};
pub use snapshot::{Property, PropertyDiff, StateSnapshot};
pub use upgrade::{UpgradeController, UpgradeState};
