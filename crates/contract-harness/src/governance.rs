//! Handing the token's privileged roles to new holders.
use ethers_core::types::Address;
use ledger::TransactionReceipt;

use crate::{
    contracts::{ConfigUpdate, ContractHandle, Dat},
    rebalance::require_control,
    snapshot::{self, Property, PropertyDiff, StateSnapshot},
    HarnessError, Session,
};

/// Who should hold each role after [`transfer_control`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAssignment {
    pub beneficiary: Address,
    pub control: Address,
    pub fee_collector: Address,
}

impl RoleAssignment {
    /// One address takes every role.
    pub fn single(holder: Address) -> Self {
        Self {
            beneficiary: holder,
            control: holder,
            fee_collector: holder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTransfer {
    pub receipt: TransactionReceipt,
    pub previous_control: Address,
    pub economics: StateSnapshot,
}

/// Reassigns beneficiary, control and fee collector through `updateConfig`,
/// passing every economic parameter through unchanged. `dat` must be called
/// as the current controller.
///
/// Never part of the default campaign; callers opt in explicitly.
pub fn transfer_control(
    session: &Session<'_>,
    dat: &ContractHandle<Dat>,
    roles: RoleAssignment,
) -> Result<ControlTransfer, HarnessError> {
    let caller = dat.caller().address();
    require_control(session, dat, caller)?;
    let before = StateSnapshot::capture(session, dat, &Property::ECONOMIC)?;

    let update = ConfigUpdate {
        whitelist: Address::zero(),
        beneficiary: roles.beneficiary,
        control: roles.control,
        fee_collector: roles.fee_collector,
        fee_basis_points: dat.fee_basis_points(session)?,
        auto_burn: dat.auto_burn(session)?,
        revenue_commitment_basis_points: dat.revenue_commitment_basis_points(session)?,
        min_investment: dat.min_investment(session)?,
        open_until_at_least: dat.open_until_at_least(session)?,
    };
    tracing::info!(
        target: "governance",
        contract = %format!("{:#x}", dat.address()),
        control = %format!("{:#x}", roles.control),
        beneficiary = %format!("{:#x}", roles.beneficiary),
        "transferring control"
    );
    let receipt = dat.update_config(session, &update)?;

    let mut changes = Vec::new();
    let control = dat.control(session)?;
    if control != roles.control {
        changes.push(role_diff("control", roles.control, control));
    }
    let beneficiary = dat.beneficiary(session)?;
    if beneficiary != roles.beneficiary {
        changes.push(role_diff("beneficiary", roles.beneficiary, beneficiary));
    }
    if !changes.is_empty() {
        return Err(HarnessError::InvariantViolation {
            context: "roles were not reassigned (expected -> actual)".to_string(),
            diff: changes,
        });
    }

    let after = StateSnapshot::capture(session, dat, &Property::ECONOMIC)?;
    snapshot::assert_equivalent(&before, &after, "economic configuration changed with control")?;
    Ok(ControlTransfer {
        receipt,
        previous_control: caller,
        economics: after,
    })
}

fn role_diff(key: &str, expected: Address, actual: Address) -> PropertyDiff {
    PropertyDiff::new(
        key,
        Some(format!("{expected:#x}")),
        Some(format!("{actual:#x}")),
    )
}
