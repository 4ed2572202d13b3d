#![allow(dead_code)]

use dat_contract_harness::{ContractArtifact, Identity, IdentityMode, IdentityProvider};
use ethers_core::{abi::AbiParser, types::U256};
use test_utils::{dat_signatures, DatVariant, MainnetFork};

pub fn dat_artifact(variant: DatVariant) -> ContractArtifact {
    let signatures = dat_signatures();
    let signatures: Vec<&str> = signatures.iter().map(String::as_str).collect();
    let abi = AbiParser::default().parse(&signatures).unwrap();
    ContractArtifact::new("DecentralizedAutonomousTrust", abi, variant.bytecode())
}

/// The DAO avatar, impersonated and given enough native currency for fees.
pub fn avatar(fork: &MainnetFork, identities: &IdentityProvider<'_>) -> Identity {
    fork.ledger.fund(fork.avatar, U256::exp10(18));
    identities
        .acquire(fork.avatar, IdentityMode::Impersonate)
        .unwrap()
}

pub fn deployer(identities: &IdentityProvider<'_>) -> Identity {
    identities.default_identity(IdentityMode::Keyed).unwrap()
}

pub fn provider(fork: &MainnetFork) -> IdentityProvider<'_> {
    IdentityProvider::new(&fork.ledger)
        .with_private_key(test_utils::fixtures::DEPLOYER_KEY)
        .unwrap()
}
