//! Withdrawing the governed contract's holdings to its beneficiary.
use ethers_core::types::{Address, U256};
use ledger::TransactionReceipt;

use crate::{
    balance::{Asset, BalanceRecord},
    contracts::{ContractHandle, Dat},
    snapshot::PropertyDiff,
    HarnessError, Role, Session,
};

/// Gas limit for `withdrawETH`; the beneficiary's receive hook is not
/// estimated.
pub const WITHDRAW_ETH_GAS_LIMIT: u64 = 1_000_000;

/// Outcome of one conserved withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub asset: Asset,
    pub receipt: TransactionReceipt,
    pub source_before: BalanceRecord,
    pub source_after: BalanceRecord,
    pub destination_before: BalanceRecord,
    pub destination_after: BalanceRecord,
    /// Native currency the destination spent on the withdrawal transaction.
    pub fee: U256,
}

impl Withdrawal {
    pub fn amount(&self) -> U256 {
        self.source_before.amount
    }
}

/// Moves the contract's entire balance of `asset` to its beneficiary and
/// checks that nothing was created, lost or left behind.
///
/// `dat` must be called as the current beneficiary.
pub fn withdraw(
    session: &Session<'_>,
    dat: &ContractHandle<Dat>,
    asset: Asset,
) -> Result<Withdrawal, HarnessError> {
    let caller = dat.caller().address();
    let beneficiary = require_beneficiary(session, dat, caller)?;

    let block = session.block_number()?;
    let source_before =
        BalanceRecord::capture(session, dat.caller(), dat.address(), asset, Some(block))?;
    let destination_before =
        BalanceRecord::capture(session, dat.caller(), beneficiary, asset, Some(block))?;
    tracing::info!(
        target: "treasury",
        contract = %format!("{:#x}", dat.address()),
        beneficiary = %format!("{beneficiary:#x}"),
        %asset,
        amount = %source_before.amount,
        "withdrawing"
    );

    let result = match asset {
        Asset::Native => dat.withdraw_eth(session, WITHDRAW_ETH_GAS_LIMIT),
        Asset::Token(token) => dat.withdraw_token(session, token),
    };
    let receipt = match result {
        Ok(receipt) => receipt,
        Err(err @ HarnessError::Reverted { .. }) => {
            require_beneficiary(session, dat, caller)?;
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let source_after = BalanceRecord::capture(session, dat.caller(), dat.address(), asset, None)?;
    let destination_after =
        BalanceRecord::capture(session, dat.caller(), beneficiary, asset, None)?;

    if !source_after.amount.is_zero() {
        return Err(HarnessError::IncompleteWithdrawal {
            asset,
            contract: dat.address(),
            remaining: source_after.amount,
        });
    }

    let fee = match asset {
        Asset::Native if receipt.from == beneficiary => receipt.fee_paid(),
        _ => U256::zero(),
    };
    let expected = (destination_before.amount + source_before.amount).saturating_sub(fee);
    if destination_after.amount != expected {
        return Err(HarnessError::InvariantViolation {
            context: format!("withdrawal of {asset} did not conserve value (expected -> actual)"),
            diff: vec![PropertyDiff::new(
                format!("balance of {beneficiary:#x}"),
                Some(expected.to_string()),
                Some(destination_after.amount.to_string()),
            )],
        });
    }

    tracing::info!(
        target: "treasury",
        %asset,
        amount = %source_before.amount,
        hash = %format!("{:#x}", receipt.transaction_hash),
        "withdrawal conserved"
    );
    Ok(Withdrawal {
        asset,
        receipt,
        source_before,
        source_after,
        destination_before,
        destination_after,
        fee,
    })
}

/// Withdraws native currency, then `token`.
pub fn withdraw_all(
    session: &Session<'_>,
    dat: &ContractHandle<Dat>,
    token: Address,
) -> Result<Vec<Withdrawal>, HarnessError> {
    let native = withdraw(session, dat, Asset::Native)?;
    let token = withdraw(session, dat, Asset::Token(token))?;
    Ok(vec![native, token])
}

fn require_beneficiary(
    session: &Session<'_>,
    dat: &ContractHandle<Dat>,
    caller: Address,
) -> Result<Address, HarnessError> {
    let beneficiary = dat.beneficiary(session)?;
    if beneficiary != caller {
        return Err(HarnessError::Unauthorized {
            role: Role::Beneficiary,
            contract: dat.address(),
            caller,
            holder: beneficiary,
        });
    }
    Ok(beneficiary)
}
