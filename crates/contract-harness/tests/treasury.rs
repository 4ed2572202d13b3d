mod common;

use dat_contract_harness::{
    deploy,
    governance::{self, RoleAssignment},
    rebalance, treasury, Asset, ContractHandle, Dat, HarnessError, IdentityMode, ProxyAdmin, Role,
    Session, UpgradeController,
};
use ethers_core::types::{Address, U256};
use ledger::Ledger;
use pretty_assertions::assert_eq;
use test_utils::{fixtures, mainnet_fork, DatVariant};

#[test]
fn treasury_is_withdrawn_to_beneficiary() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);

    let withdrawals = treasury::withdraw_all(&session, &dat, fork.usdc).unwrap();
    let [native, token] = &withdrawals[..] else {
        panic!("expected two withdrawals");
    };

    assert_eq!(native.asset, Asset::Native);
    assert_eq!(native.amount(), fixtures::proxy_native_balance());
    assert_eq!(native.fee, native.receipt.fee_paid());
    assert!(!native.fee.is_zero());
    assert_eq!(fork.ledger.balance(fork.dat_proxy, None).unwrap(), U256::zero());
    assert_eq!(
        fork.ledger.balance(fork.avatar, None).unwrap(),
        U256::exp10(18) + fixtures::proxy_native_balance() - native.fee
    );

    assert_eq!(token.asset, Asset::Token(fork.usdc));
    assert_eq!(token.amount(), fixtures::proxy_usdc_balance());
    assert_eq!(token.fee, U256::zero());
    assert_eq!(token.destination_after.amount, fixtures::proxy_usdc_balance());
    assert_eq!(fork.ledger.token_balance(fork.usdc, fork.dat_proxy), U256::zero());
}

#[test]
fn partial_withdrawal_is_reported() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);

    let leaky = deploy::deploy::<Dat>(
        &session,
        &common::dat_artifact(DatVariant::LeakyWithdraw),
        &deployer,
    )
    .unwrap();
    let admin = ContractHandle::<ProxyAdmin>::new(fork.proxy_admin, avatar.clone());
    let mut controller = UpgradeController::new(admin, fork.dat_proxy, leaky.address());
    controller.upgrade(&session).unwrap();
    controller.verify(&session).unwrap();

    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);
    let err = treasury::withdraw(&session, &dat, Asset::Native).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::IncompleteWithdrawal {
            asset: Asset::Native,
            contract,
            remaining,
        } if contract == fork.dat_proxy && remaining == fixtures::proxy_native_balance() / 2
    ));
}

#[test]
fn withdrawal_requires_beneficiary() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, deployer);

    let err = treasury::withdraw(&session, &dat, Asset::Token(fork.usdc)).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Unauthorized {
            role: Role::Beneficiary,
            holder,
            ..
        } if holder == fork.avatar
    ));
    assert_eq!(
        fork.ledger.token_balance(fork.usdc, fork.dat_proxy),
        fixtures::proxy_usdc_balance()
    );
}

#[test]
fn vesting_holder_is_drained_into_beneficiary() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);
    let supply = dat.total_supply(&session, None).unwrap();

    let rebalance =
        rebalance::drain(&session, &dat, fork.vesting, fork.vesting_beneficiary).unwrap();
    assert_eq!(rebalance.amount, fixtures::vesting_balance());
    assert_eq!(rebalance.total_supply, supply);
    assert_eq!(rebalance.balances.get(&fork.vesting), Some(&U256::zero()));
    assert_eq!(
        rebalance.balances.get(&fork.vesting_beneficiary),
        Some(&fixtures::vesting_balance())
    );
    assert!(rebalance.mint.block_number > rebalance.burn.block_number);

    let err = rebalance::drain(&session, &dat, fork.vesting, fork.vesting).unwrap_err();
    assert_eq!(err.kind(), "InvalidParameters");
}

#[test]
fn burning_more_than_held_is_rejected_up_front() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);
    let submitted = fork.ledger.submitted_transactions();

    let err = rebalance::burn_and_mint(
        &session,
        &dat,
        fork.vesting,
        fork.vesting_beneficiary,
        fixtures::vesting_balance() + 1,
    )
    .unwrap_err();
    assert_eq!(err.kind(), "InvalidParameters");
    assert_eq!(fork.ledger.submitted_transactions(), submitted);
}

#[test]
fn failed_mint_after_burn_is_a_partial_rebalance() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);
    let amount = U256::exp10(18);

    let err = rebalance::burn_and_mint(&session, &dat, fork.vesting, Address::zero(), amount)
        .unwrap_err();
    match err {
        HarnessError::PartialRebalance {
            from,
            amount: burned,
            cause,
            ..
        } => {
            assert_eq!(from, fork.vesting);
            assert_eq!(burned, amount);
            assert_eq!(
                cause.to_string(),
                "mint reverted: ERC20: mint to the zero address"
            );
        }
        other => panic!("expected a partial rebalance, got {other}"),
    }
    assert_eq!(
        dat.balance_of(&session, fork.vesting, None).unwrap(),
        fixtures::vesting_balance() - amount
    );
}

#[test]
fn rebalance_requires_controller() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, deployer);

    let err = rebalance::drain(&session, &dat, fork.vesting, fork.vesting_beneficiary)
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Unauthorized {
            role: Role::Controller,
            holder,
            ..
        } if holder == fork.avatar
    ));
}

#[test]
fn control_transfer_keeps_economics() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);
    let successor = Address::repeat_byte(0xc0);

    let transfer =
        governance::transfer_control(&session, &dat, RoleAssignment::single(successor)).unwrap();
    assert_eq!(transfer.previous_control, fork.avatar);
    assert_eq!(transfer.economics.get("feeBasisPoints"), Some("50"));
    assert_eq!(transfer.economics.get("autoBurn"), Some("true"));
    assert_eq!(dat.control(&session).unwrap(), successor);
    assert_eq!(dat.beneficiary(&session).unwrap(), successor);
    assert_eq!(dat.fee_collector(&session).unwrap(), successor);

    let err = treasury::withdraw(&session, &dat, Asset::Native).unwrap_err();
    assert_eq!(err.kind(), "Unauthorized");

    fork.ledger.fund(successor, U256::exp10(18));
    let successor = identities
        .acquire(successor, IdentityMode::Impersonate)
        .unwrap();
    let withdrawal =
        treasury::withdraw(&session, &dat.with_caller(successor), Asset::Native).unwrap();
    assert_eq!(withdrawal.amount(), fixtures::proxy_native_balance());
}

#[test]
fn token_withdrawal_adds_to_existing_beneficiary_balance() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);
    let held = U256::from(1_234_567u64);
    fork.ledger.set_token_balance(fork.usdc, fork.avatar, held);

    let withdrawal = treasury::withdraw(&session, &dat, Asset::Token(fork.usdc)).unwrap();
    assert_eq!(withdrawal.destination_before.amount, held);
    assert_eq!(withdrawal.amount(), fixtures::proxy_usdc_balance());
    assert_eq!(
        withdrawal.destination_after.amount,
        held + fixtures::proxy_usdc_balance()
    );
    assert_eq!(
        fork.ledger.token_balance(fork.usdc, fork.avatar),
        held + fixtures::proxy_usdc_balance()
    );
}

#[test]
fn drain_adds_to_existing_beneficiary_holdings() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);
    let held = U256::exp10(18) * 40;
    fork.ledger.credit_dat(fork.dat_proxy, fork.vesting_beneficiary, held);
    let supply = dat.total_supply(&session, None).unwrap();

    let rebalance =
        rebalance::drain(&session, &dat, fork.vesting, fork.vesting_beneficiary).unwrap();
    assert_eq!(rebalance.amount, fixtures::vesting_balance());
    assert_eq!(rebalance.total_supply, supply);
    assert_eq!(rebalance.balances.get(&fork.vesting), Some(&U256::zero()));
    assert_eq!(
        rebalance.balances.get(&fork.vesting_beneficiary),
        Some(&(held + fixtures::vesting_balance()))
    );
}

#[test]
fn partial_move_keeps_both_holders_consistent() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar);
    let held = U256::exp10(18) * 7;
    fork.ledger.credit_dat(fork.dat_proxy, fork.vesting_beneficiary, held);
    let supply = dat.total_supply(&session, None).unwrap();
    let amount = U256::exp10(18) * 100;

    let rebalance = rebalance::burn_and_mint(
        &session,
        &dat,
        fork.vesting,
        fork.vesting_beneficiary,
        amount,
    )
    .unwrap();
    assert_eq!(rebalance.total_supply, supply);
    assert_eq!(
        rebalance.balances.get(&fork.vesting),
        Some(&(fixtures::vesting_balance() - amount))
    );
    assert_eq!(
        rebalance.balances.get(&fork.vesting_beneficiary),
        Some(&(held + amount))
    );
}
