mod common;

use dat_contract_harness::{
    deploy, snapshot, ContractArtifact, ContractHandle, Dat, HarnessError, IdentityMode,
    InitializeParams, Property, ProxyAdmin, Role, Session, StateSnapshot, UpgradeController,
    UpgradeState,
};
use ethers_core::types::{Address, U256};
use pretty_assertions::assert_eq;
use test_utils::{mainnet_fork, DatVariant};

#[test]
fn master_copy_is_deployed_and_initialized_once() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let artifact = common::dat_artifact(DatVariant::Standard);
    let params = InitializeParams::bootstrap("DAT", "DAT");

    let (dat, receipt) =
        deploy::deploy_and_initialize(&session, &artifact, &deployer, &params).unwrap();
    assert!(receipt.succeeded());
    assert_eq!(receipt.from, fork.deployer);
    assert_eq!(dat.name(&session).unwrap(), "DAT");
    assert_eq!(dat.control(&session).unwrap(), fork.deployer);

    let err = deploy::initialize(&session, &dat, &params, Some(&artifact)).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::AlreadyInitialized { address } if address == dat.address()
    ));
}

#[test]
fn creation_that_reverts_is_a_failed_deployment() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let artifact = ContractArtifact::new(
        "DecentralizedAutonomousTrust",
        common::dat_artifact(DatVariant::Standard).abi,
        b"\xfe".to_vec(),
    );

    let err = deploy::deploy::<Dat>(&session, &artifact, &deployer).unwrap_err();
    assert_eq!(
        err.to_string(),
        "deployment of DecentralizedAutonomousTrust failed: creation reverted"
    );
}

#[test]
fn creation_without_runtime_code_is_a_failed_deployment() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let artifact = ContractArtifact::new(
        "DecentralizedAutonomousTrust",
        common::dat_artifact(DatVariant::Standard).abi,
        vec![0x00],
    );

    let err = deploy::deploy::<Dat>(&session, &artifact, &deployer).unwrap_err();
    assert_eq!(err.kind(), "DeploymentReverted");
    assert!(err.to_string().contains("no code at 0x"), "{err}");
}

#[test]
fn upgrade_keeps_observable_state() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);

    let implementation = deploy::deploy::<Dat>(
        &session,
        &common::dat_artifact(DatVariant::Standard),
        &deployer,
    )
    .unwrap();
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar.clone());
    let before = StateSnapshot::capture(&session, &dat, &Property::ALL).unwrap();
    assert_eq!(before.get("name"), Some("DXdao"));
    assert_eq!(before.get("decimals"), Some("18"));

    let admin = ContractHandle::<ProxyAdmin>::new(fork.proxy_admin, avatar);
    let mut controller = UpgradeController::new(admin, fork.dat_proxy, implementation.address());
    controller.upgrade(&session).unwrap();
    assert_eq!(controller.state(), UpgradeState::Upgraded);
    assert_eq!(controller.previous_implementation(), Some(fork.dat_implementation));
    controller.verify(&session).unwrap();
    assert_eq!(controller.state(), UpgradeState::Verified);

    let after = StateSnapshot::capture(&session, &dat, &Property::ALL).unwrap();
    assert!(after.block > before.block);
    snapshot::assert_equivalent(&before, &after, "state changed across upgrade").unwrap();

    let err = controller.upgrade(&session).unwrap_err();
    assert_eq!(err.kind(), "InvalidTransition");
}

#[test]
fn verification_fails_when_proxy_ignores_upgrade() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    fork.ledger.freeze_proxy(fork.dat_proxy);

    let implementation = deploy::deploy::<Dat>(
        &session,
        &common::dat_artifact(DatVariant::Standard),
        &deployer,
    )
    .unwrap();
    let admin = ContractHandle::<ProxyAdmin>::new(fork.proxy_admin, avatar);
    let mut controller = UpgradeController::new(admin, fork.dat_proxy, implementation.address());
    let err = controller.verify(&session).unwrap_err();
    assert_eq!(err.kind(), "InvalidTransition");

    controller.upgrade(&session).unwrap();
    let err = controller.verify(&session).unwrap_err();
    match err {
        HarnessError::UpgradeVerificationFailed {
            proxy,
            expected,
            actual,
        } => {
            assert_eq!(proxy, fork.dat_proxy);
            assert_eq!(expected, implementation.address());
            assert_eq!(actual, fork.dat_implementation);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(controller.state(), UpgradeState::Upgraded);
}

#[test]
fn storage_layout_clash_is_an_invariant_violation() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);

    let implementation = deploy::deploy::<Dat>(
        &session,
        &common::dat_artifact(DatVariant::ShiftedStorage),
        &deployer,
    )
    .unwrap();
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar.clone());
    let before = StateSnapshot::capture(&session, &dat, &Property::ALL).unwrap();
    let admin = ContractHandle::<ProxyAdmin>::new(fork.proxy_admin, avatar);
    let mut controller = UpgradeController::new(admin, fork.dat_proxy, implementation.address());
    controller.upgrade(&session).unwrap();
    controller.verify(&session).unwrap();
    let after = StateSnapshot::capture(&session, &dat, &Property::ALL).unwrap();

    let err = snapshot::assert_equivalent(&before, &after, "state changed across upgrade")
        .unwrap_err();
    let diff = match err {
        HarnessError::InvariantViolation { diff, .. } => diff,
        other => panic!("expected an invariant violation, got {other}"),
    };
    let keys: Vec<&str> = diff.iter().map(|entry| entry.key.as_str()).collect();
    assert_eq!(keys, ["name", "symbol"]);
    assert_eq!(diff[0].before.as_deref(), Some("DXdao"));
    assert_eq!(diff[0].after.as_deref(), Some("DXD"));
}

#[test]
fn only_the_admin_owner_can_upgrade() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let stranger = Address::repeat_byte(0x5a);
    fork.ledger.fund(stranger, U256::exp10(18));
    let stranger = identities
        .acquire(stranger, IdentityMode::Impersonate)
        .unwrap();

    let implementation = deploy::deploy::<Dat>(
        &session,
        &common::dat_artifact(DatVariant::Standard),
        &deployer,
    )
    .unwrap();
    let admin = ContractHandle::<ProxyAdmin>::new(fork.proxy_admin, stranger.clone());
    let mut controller = UpgradeController::new(admin, fork.dat_proxy, implementation.address());
    let err = controller.upgrade(&session).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Unauthorized {
            role: Role::ProxyAdminOwner,
            caller,
            holder,
            ..
        } if caller == stranger.address() && holder == fork.avatar
    ));
    assert_eq!(controller.state(), UpgradeState::Deployed);
}

#[test]
fn stored_baseline_catches_changes_made_later() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let avatar = common::avatar(&fork, &identities);
    let session = Session::new(&fork.ledger);
    let dat = ContractHandle::<Dat>::new(fork.dat_proxy, avatar.clone());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("baseline.json");
    let taken = StateSnapshot::capture(&session, &dat, &Property::ALL).unwrap();
    std::fs::write(&path, taken.to_json().unwrap()).unwrap();
    let baseline = StateSnapshot::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let current = snapshot::compare_with_baseline(&session, &dat, &baseline).unwrap();
    assert_eq!(current.properties, baseline.properties);

    let implementation = deploy::deploy::<Dat>(
        &session,
        &common::dat_artifact(DatVariant::ShiftedStorage),
        &deployer,
    )
    .unwrap();
    let admin = ContractHandle::<ProxyAdmin>::new(fork.proxy_admin, avatar.clone());
    let mut controller = UpgradeController::new(admin, fork.dat_proxy, implementation.address());
    controller.upgrade(&session).unwrap();

    match snapshot::compare_with_baseline(&session, &dat, &baseline).unwrap_err() {
        HarnessError::InvariantViolation { context, diff } => {
            assert_eq!(context, format!("state changed since block {}", baseline.block));
            let keys: Vec<&str> = diff.iter().map(|entry| entry.key.as_str()).collect();
            assert_eq!(keys, ["name", "symbol"]);
        }
        other => panic!("expected an invariant violation, got {other}"),
    }

    let elsewhere = ContractHandle::<Dat>::new(implementation.address(), avatar);
    let err = snapshot::compare_with_baseline(&session, &elsewhere, &baseline).unwrap_err();
    assert_eq!(err.kind(), "InvalidParameters");
}
