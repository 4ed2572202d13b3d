//! The full upgrade-and-verify sequence, step by step.
use std::fmt;

use ethers_core::types::{Address, U256};
use thiserror::Error;

use crate::{
    balance::Asset,
    contracts::{ContractHandle, Dat, ProxyAdmin},
    deploy,
    governance::{self, RoleAssignment},
    rebalance,
    snapshot::{self, Property, StateSnapshot},
    treasury, ContractArtifact, HarnessError, Identity, IdentityMode, IdentityProvider, Session,
    UpgradeController,
};

/// Addresses and amounts for one campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignPlan {
    pub proxy: Address,
    pub proxy_admin: Address,
    /// Owns the proxy admin and holds the token's beneficiary and control
    /// roles. Impersonated.
    pub administrator: Address,
    pub admin_funding: U256,
    pub treasury_token: Address,
    pub vesting_holder: Address,
    pub vesting_beneficiary: Address,
    /// Hands every role to this address at the end when set.
    pub control_successor: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignReport {
    pub steps: Vec<StepOutcome>,
    pub implementation: Option<Address>,
    pub snapshot: Option<StateSnapshot>,
}

impl fmt::Display for CampaignReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, outcome) in self.steps.iter().enumerate() {
            writeln!(f, "{:>2}. {}: {}", index + 1, outcome.step, outcome.detail)?;
        }
        Ok(())
    }
}

/// A campaign stopped at `step`. Steps in `completed` have taken effect.
#[derive(Error)]
#[error("campaign aborted at step `{step}`: {error}")]
pub struct CampaignAborted {
    pub completed: CampaignReport,
    pub step: &'static str,
    pub error: HarnessError,
}

impl fmt::Debug for CampaignAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Runs a [`CampaignPlan`] to completion or to its first error.
pub struct Campaign<'a, 'l> {
    session: &'a Session<'l>,
    identities: &'a IdentityProvider<'l>,
    deployer: &'a Identity,
    artifact: &'a ContractArtifact,
    plan: CampaignPlan,
}

impl<'a, 'l> Campaign<'a, 'l> {
    pub fn new(
        session: &'a Session<'l>,
        identities: &'a IdentityProvider<'l>,
        deployer: &'a Identity,
        artifact: &'a ContractArtifact,
        plan: CampaignPlan,
    ) -> Self {
        Self {
            session,
            identities,
            deployer,
            artifact,
            plan,
        }
    }

    pub fn run(self) -> Result<CampaignReport, CampaignAborted> {
        let session = self.session;
        let plan = &self.plan;
        let mut steps = Steps::default();

        let admin = steps.record(
            "acquire administrator",
            self.identities
                .acquire(plan.administrator, IdentityMode::Impersonate),
            |admin| format!("{:#x} ({})", admin.address(), admin.mode()),
        )?;
        if !plan.admin_funding.is_zero() {
            steps.record(
                "fund administrator",
                self.identities
                    .fund(session, self.deployer, &admin, plan.admin_funding),
                |receipt| format!("{} wei in {:#x}", plan.admin_funding, receipt.transaction_hash),
            )?;
        }

        let implementation = steps.record(
            "deploy implementation",
            deploy::deploy::<Dat>(session, self.artifact, self.deployer),
            |handle| format!("{:#x}", handle.address()),
        )?;
        steps.report.implementation = Some(implementation.address());

        let dat = ContractHandle::<Dat>::new(plan.proxy, admin.clone());
        let before = steps.record(
            "snapshot before upgrade",
            StateSnapshot::capture(session, &dat, &Property::ALL),
            describe_snapshot,
        )?;

        let admin_contract = ContractHandle::<ProxyAdmin>::new(plan.proxy_admin, admin.clone());
        let mut controller =
            UpgradeController::new(admin_contract, plan.proxy, implementation.address());
        steps.record("upgrade proxy", controller.upgrade(session), |receipt| {
            format!("tx {:#x}", receipt.transaction_hash)
        })?;
        steps.record("verify implementation", controller.verify(session), |_| {
            format!("{:#x}", implementation.address())
        })?;

        let after = steps.record(
            "snapshot after upgrade",
            StateSnapshot::capture(session, &dat, &Property::ALL),
            describe_snapshot,
        )?;
        steps.record(
            "compare snapshots",
            snapshot::assert_equivalent(&before, &after, "state changed across upgrade"),
            |_| "equivalent".to_string(),
        )?;
        steps.report.snapshot = Some(after);

        for (step, asset) in [
            ("withdraw native currency", Asset::Native),
            ("withdraw treasury token", Asset::Token(plan.treasury_token)),
        ] {
            steps.record(step, treasury::withdraw(session, &dat, asset), |withdrawal| {
                format!("{} of {}", withdrawal.amount(), withdrawal.asset)
            })?;
        }

        steps.record(
            "rebalance vesting holder",
            rebalance::drain(session, &dat, plan.vesting_holder, plan.vesting_beneficiary),
            |rebalance| {
                format!(
                    "{} moved to {:#x}, supply {}",
                    rebalance.amount, rebalance.to, rebalance.total_supply
                )
            },
        )?;

        if let Some(successor) = plan.control_successor {
            steps.record(
                "transfer control",
                governance::transfer_control(session, &dat, RoleAssignment::single(successor)),
                |transfer| format!("{successor:#x} in {:#x}", transfer.receipt.transaction_hash),
            )?;
        }

        Ok(steps.report)
    }
}

#[derive(Default)]
struct Steps {
    report: CampaignReport,
}

impl Steps {
    fn record<T>(
        &mut self,
        step: &'static str,
        result: Result<T, HarnessError>,
        describe: impl FnOnce(&T) -> String,
    ) -> Result<T, CampaignAborted> {
        match result {
            Ok(value) => {
                let detail = describe(&value);
                tracing::info!(target: "campaign", step, %detail, "step complete");
                self.report.steps.push(StepOutcome { step, detail });
                Ok(value)
            }
            Err(error) => {
                tracing::error!(target: "campaign", step, %error, "step failed");
                Err(CampaignAborted {
                    completed: std::mem::take(&mut self.report),
                    step,
                    error,
                })
            }
        }
    }
}

fn describe_snapshot(snapshot: &StateSnapshot) -> String {
    format!(
        "{} properties at block {}",
        snapshot.properties.len(),
        snapshot.block
    )
}
