//! Moving governed tokens between holders by burning and re-minting.
use ethers_core::types::{Address, U256};
use ledger::TransactionReceipt;
use ordermap::OrderMap;

use crate::{
    contracts::{ContractHandle, Dat},
    snapshot::PropertyDiff,
    HarnessError, Role, Session,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebalance {
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    pub burn: TransactionReceipt,
    pub mint: TransactionReceipt,
    pub total_supply: U256,
    /// Holder balances after the mint.
    pub balances: OrderMap<Address, U256>,
}

/// Burns `amount` from `from` and mints it to `to`, as the token's controller.
///
/// If the burn confirms but the mint does not, the error is
/// [`HarnessError::PartialRebalance`]: the burned amount must be minted back
/// by hand, not by re-running this.
pub fn burn_and_mint(
    session: &Session<'_>,
    dat: &ContractHandle<Dat>,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<Rebalance, HarnessError> {
    let caller = dat.caller().address();
    require_control(session, dat, caller)?;

    let block = session.block_number()?;
    let supply_before = dat.total_supply(session, Some(block))?;
    let mut expected: OrderMap<Address, U256> = OrderMap::new();
    for holder in [from, to] {
        let balance = dat.balance_of(session, holder, Some(block))?;
        expected.insert(holder, balance);
    }
    let from_before = expected.get(&from).copied().unwrap_or_default();
    if amount > from_before {
        return Err(HarnessError::InvalidParameters(format!(
            "cannot burn {amount} from {from:#x}, which holds {from_before}"
        )));
    }
    tracing::info!(
        target: "rebalance",
        from = %format!("{from:#x}"),
        to = %format!("{to:#x}"),
        %amount,
        "burning"
    );

    let burn = match dat.burn_from(session, from, amount) {
        Ok(receipt) => receipt,
        Err(err @ HarnessError::Reverted { .. }) => {
            require_control(session, dat, caller)?;
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    tracing::info!(target: "rebalance", to = %format!("{to:#x}"), %amount, "minting");
    let mint = dat
        .mint(session, to, amount)
        .map_err(|cause| {
            tracing::error!(
                target: "rebalance",
                burn_tx = %format!("{:#x}", burn.transaction_hash),
                %cause,
                "mint failed after burn"
            );
            HarnessError::PartialRebalance {
                from,
                to,
                amount,
                burn_tx: burn.transaction_hash,
                cause: Box::new(cause),
            }
        })?;

    if let Some(balance) = expected.get_mut(&from) {
        *balance -= amount;
    }
    if let Some(balance) = expected.get_mut(&to) {
        *balance += amount;
    }

    let mut changes = Vec::new();
    let supply_after = dat.total_supply(session, None)?;
    if supply_after != supply_before {
        changes.push(PropertyDiff::new(
            "totalSupply",
            Some(supply_before.to_string()),
            Some(supply_after.to_string()),
        ));
    }
    let mut balances = OrderMap::new();
    for (holder, want) in &expected {
        let actual = dat.balance_of(session, *holder, None)?;
        if actual != *want {
            changes.push(PropertyDiff::new(
                format!("balanceOf({holder:#x})"),
                Some(want.to_string()),
                Some(actual.to_string()),
            ));
        }
        balances.insert(*holder, actual);
    }
    if !changes.is_empty() {
        return Err(HarnessError::InvariantViolation {
            context: "rebalance did not conserve supply (expected -> actual)".to_string(),
            diff: changes,
        });
    }

    tracing::info!(target: "rebalance", total_supply = %supply_after, "rebalance conserved");
    Ok(Rebalance {
        from,
        to,
        amount,
        burn,
        mint,
        total_supply: supply_after,
        balances,
    })
}

/// Rebalances the whole balance of `from` to `to`, leaving `from` empty.
pub fn drain(
    session: &Session<'_>,
    dat: &ContractHandle<Dat>,
    from: Address,
    to: Address,
) -> Result<Rebalance, HarnessError> {
    if from == to {
        return Err(HarnessError::InvalidParameters(format!(
            "cannot drain {from:#x} into itself"
        )));
    }
    let amount = dat.balance_of(session, from, None)?;
    let rebalance = burn_and_mint(session, dat, from, to, amount)?;
    match rebalance.balances.get(&from) {
        Some(residual) if residual.is_zero() => Ok(rebalance),
        residual => Err(HarnessError::InvariantViolation {
            context: format!("{from:#x} still holds tokens after draining"),
            diff: vec![PropertyDiff::new(
                format!("balanceOf({from:#x})"),
                Some("0".to_string()),
                residual.map(U256::to_string),
            )],
        }),
    }
}

pub(crate) fn require_control(
    session: &Session<'_>,
    dat: &ContractHandle<Dat>,
    caller: Address,
) -> Result<(), HarnessError> {
    let control = dat.control(session)?;
    if control != caller {
        return Err(HarnessError::Unauthorized {
            role: Role::Controller,
            contract: dat.address(),
            caller,
            holder: control,
        });
    }
    Ok(())
}
