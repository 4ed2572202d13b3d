//! Test support for the DAT upgrade harness.
//!
//! [`SimLedger`] is an in-memory stand-in for a forked node. It executes
//! models of the DAT, its transparent proxy, the proxy admin and plain ERC-20
//! tokens, so that whole upgrade campaigns can run without a network.
pub mod fixtures;
mod sim;
mod world;

pub use fixtures::{mainnet_fork, MainnetFork};
pub use sim::SimLedger;
pub use world::{dat_signatures, DatStorage, DatVariant};
