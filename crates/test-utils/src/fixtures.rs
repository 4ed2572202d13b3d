//! A fork of mainnet at the block the DXD upgrade was rehearsed against.
use ethers_core::types::{Address, U256};

use crate::{DatStorage, DatVariant, SimLedger};

pub const FORK_BLOCK: u64 = 16_969_691;

pub const AVATAR: &str = "0x519b70055af55A007110B4Ff99b0eA33071c720a";
pub const PROXY_ADMIN: &str = "0x07eD323e96b5b37f49432CE86277A56015e7FB5e";
pub const DAT_PROXY: &str = "0xa1d65E8fB6e87b60FECCBc582F7f97804B725521";
pub const DAT_IMPLEMENTATION: &str = "0x354f4e6DcE4A6B2C2E0ABb3bA4cC1a45e2C68D3b";
pub const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const CLOSURE_SAFE: &str = "0x4942fbdc53B295563d59Af51e6DDEdceba5E332f";
pub const VESTING: &str = "0x293b2efbbf97a1ceea2b479a4d026cbc1e918769";
pub const VESTING_BENEFICIARY: &str = "0x8E900Cf9BD655e34bb610f0Ef365D8d476fD7337";

/// Well-known development key, funded on the fork.
pub const DEPLOYER_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEPLOYER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Native currency held by the DAT proxy at the fork block.
pub fn proxy_native_balance() -> U256 {
    U256::exp10(17) * 125
}

/// USDC (6 decimals) held by the DAT proxy at the fork block.
pub fn proxy_usdc_balance() -> U256 {
    U256::from(500_000_000u64)
}

pub fn vesting_balance() -> U256 {
    U256::exp10(18) * 2_500
}

pub fn address(hex: &str) -> Address {
    hex.parse()
        .unwrap_or_else(|err| panic!("invalid fixture address {hex}: {err}"))
}

pub struct MainnetFork {
    pub ledger: SimLedger,
    pub avatar: Address,
    pub proxy_admin: Address,
    pub dat_proxy: Address,
    pub dat_implementation: Address,
    pub usdc: Address,
    pub closure_safe: Address,
    pub vesting: Address,
    pub vesting_beneficiary: Address,
    pub deployer: Address,
}

/// The DXD token behind its transparent proxy, owned and governed by the DAO
/// avatar, with a treasury in native currency and USDC.
pub fn mainnet_fork() -> MainnetFork {
    let fork = MainnetFork {
        ledger: SimLedger::new().starting_at_block(FORK_BLOCK),
        avatar: address(AVATAR),
        proxy_admin: address(PROXY_ADMIN),
        dat_proxy: address(DAT_PROXY),
        dat_implementation: address(DAT_IMPLEMENTATION),
        usdc: address(USDC),
        closure_safe: address(CLOSURE_SAFE),
        vesting: address(VESTING),
        vesting_beneficiary: address(VESTING_BENEFICIARY),
        deployer: address(DEPLOYER),
    };

    let mut storage = DatStorage {
        initialized: true,
        name: "DXdao".to_string(),
        symbol: "DXD".to_string(),
        decimals: 18,
        beneficiary: fork.avatar,
        control: fork.avatar,
        fee_collector: fork.closure_safe,
        init_goal: U256::zero(),
        buy_slope_num: U256::one(),
        buy_slope_den: U256::from(22_000_000u64) * U256::exp10(18),
        investment_reserve_basis_points: U256::from(1_000u64),
        fee_basis_points: U256::from(50u64),
        auto_burn: true,
        revenue_commitment_basis_points: U256::from(1_000u64),
        min_investment: U256::exp10(17),
        open_until_at_least: U256::from(1_609_459_200u64),
        ..Default::default()
    };
    storage.credit(fork.vesting, vesting_balance());
    storage.credit(fork.avatar, U256::exp10(18) * 40_000);
    storage.credit(fork.closure_safe, U256::exp10(18) * 7_500);

    let ledger = &fork.ledger;
    ledger.install_dat(fork.dat_implementation, DatVariant::Standard, DatStorage::default());
    ledger.install_proxy_admin(fork.proxy_admin, fork.avatar);
    ledger.install_proxy(
        fork.dat_proxy,
        fork.dat_implementation,
        fork.proxy_admin,
        storage,
    );
    ledger.install_erc20(fork.usdc);
    ledger.set_token_balance(fork.usdc, fork.dat_proxy, proxy_usdc_balance());
    ledger.set_token_balance(fork.usdc, fork.closure_safe, U256::from(1_250_000_000u64));
    ledger.fund(fork.dat_proxy, proxy_native_balance());
    ledger.fund(fork.deployer, U256::exp10(18) * 10_000);
    fork
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::Ledger;
    use pretty_assertions::assert_eq;

    #[test]
    fn fork_starts_at_pinned_block() {
        let fork = mainnet_fork();
        assert_eq!(fork.ledger.block_number().unwrap(), FORK_BLOCK);
        assert_eq!(fork.ledger.balance(fork.avatar, None).unwrap(), U256::zero());
        assert_eq!(
            fork.ledger.token_balance(fork.usdc, fork.dat_proxy),
            proxy_usdc_balance()
        );
    }

    #[test]
    fn proxy_storage_is_governed_by_avatar() {
        let fork = mainnet_fork();
        let storage = fork.ledger.dat_storage(fork.dat_proxy).unwrap();
        assert_eq!(storage.control, fork.avatar);
        assert_eq!(storage.beneficiary, fork.avatar);
        assert_eq!(
            storage.total_supply,
            storage.balances.values().fold(U256::zero(), |a, b| a + *b)
        );
    }
}
