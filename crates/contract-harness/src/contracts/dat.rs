use ethers_core::abi::{Abi, ParamType, Token};
use ethers_core::types::{Address, U256};
use ledger::TransactionReceipt;

use super::{ContractHandle, Interface};
use crate::{HarnessError, Session};

/// The governed token (Decentralized Autonomous Trust), usually reached
/// through its proxy.
#[derive(Debug, Clone, Copy)]
pub struct Dat;

impl Interface for Dat {
    const NAME: &'static str = "DecentralizedAutonomousTrust";
}

/// Canonical signature of the initializer overload the workflow drives.
pub const INITIALIZE_SIGNATURE: &str =
    "initialize(uint256,address,uint256,uint256,uint256,uint256,string,string)";

/// Arguments of the one-time initializer, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeParams {
    pub init_reserve: U256,
    pub currency: Address,
    pub init_goal: U256,
    pub buy_slope_num: U256,
    pub buy_slope_den: U256,
    pub investment_reserve_basis_points: U256,
    pub name: String,
    pub symbol: String,
}

impl InitializeParams {
    /// The parameter set used for implementation master copies: no reserve,
    /// native currency, unit curve.
    pub fn bootstrap(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            init_reserve: U256::zero(),
            currency: Address::zero(),
            init_goal: U256::one(),
            buy_slope_num: U256::one(),
            buy_slope_den: U256::one(),
            investment_reserve_basis_points: U256::one(),
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    fn param_types() -> [ParamType; 8] {
        [
            ParamType::Uint(256),
            ParamType::Address,
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::String,
            ParamType::String,
        ]
    }

    /// Structural checks only; economic values are the contract's business.
    /// When `abi` is given it must declare a matching `initialize` overload.
    pub fn validate(&self, abi: Option<&Abi>) -> Result<(), HarnessError> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::InvalidParameters("name must not be empty".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(HarnessError::InvalidParameters(
                "symbol must not be empty".into(),
            ));
        }
        if let Some(abi) = abi {
            let expected = Self::param_types();
            let declared = abi
                .functions_by_name("initialize")
                .map(|overloads| {
                    overloads.iter().any(|function| {
                        function
                            .inputs
                            .iter()
                            .map(|param| &param.kind)
                            .eq(expected.iter())
                    })
                })
                .unwrap_or(false);
            if !declared {
                return Err(HarnessError::InvalidParameters(format!(
                    "contract ABI has no `{INITIALIZE_SIGNATURE}`"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn tokens(&self) -> Vec<Token> {
        vec![
            Token::Uint(self.init_reserve),
            Token::Address(self.currency),
            Token::Uint(self.init_goal),
            Token::Uint(self.buy_slope_num),
            Token::Uint(self.buy_slope_den),
            Token::Uint(self.investment_reserve_basis_points),
            Token::String(self.name.clone()),
            Token::String(self.symbol.clone()),
        ]
    }
}

/// Arguments of `updateConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub whitelist: Address,
    pub beneficiary: Address,
    pub control: Address,
    pub fee_collector: Address,
    pub fee_basis_points: U256,
    pub auto_burn: bool,
    pub revenue_commitment_basis_points: U256,
    pub min_investment: U256,
    pub open_until_at_least: U256,
}

impl ConfigUpdate {
    fn tokens(&self) -> Vec<Token> {
        vec![
            Token::Address(self.whitelist),
            Token::Address(self.beneficiary),
            Token::Address(self.control),
            Token::Address(self.fee_collector),
            Token::Uint(self.fee_basis_points),
            Token::Bool(self.auto_burn),
            Token::Uint(self.revenue_commitment_basis_points),
            Token::Uint(self.min_investment),
            Token::Uint(self.open_until_at_least),
        ]
    }
}

impl ContractHandle<Dat> {
    pub fn initialize(
        &self,
        session: &Session<'_>,
        params: &InitializeParams,
    ) -> Result<TransactionReceipt, HarnessError> {
        self.send(
            session,
            &format!("function {INITIALIZE_SIGNATURE}"),
            &params.tokens(),
            None,
        )
    }

    pub fn total_supply(
        &self,
        session: &Session<'_>,
        block: Option<u64>,
    ) -> Result<U256, HarnessError> {
        self.read(
            session,
            "function totalSupply() external view returns (uint256)",
            &[],
            block,
        )
    }

    pub fn balance_of(
        &self,
        session: &Session<'_>,
        holder: Address,
        block: Option<u64>,
    ) -> Result<U256, HarnessError> {
        self.read(
            session,
            "function balanceOf(address) external view returns (uint256)",
            &[Token::Address(holder)],
            block,
        )
    }

    pub fn name(&self, session: &Session<'_>) -> Result<String, HarnessError> {
        self.read(
            session,
            "function name() external view returns (string)",
            &[],
            None,
        )
    }

    pub fn beneficiary(&self, session: &Session<'_>) -> Result<Address, HarnessError> {
        self.read(
            session,
            "function beneficiary() external view returns (address)",
            &[],
            None,
        )
    }

    pub fn control(&self, session: &Session<'_>) -> Result<Address, HarnessError> {
        self.read(
            session,
            "function control() external view returns (address)",
            &[],
            None,
        )
    }

    pub fn fee_collector(&self, session: &Session<'_>) -> Result<Address, HarnessError> {
        self.read(
            session,
            "function feeCollector() external view returns (address)",
            &[],
            None,
        )
    }

    pub fn fee_basis_points(&self, session: &Session<'_>) -> Result<U256, HarnessError> {
        self.read(
            session,
            "function feeBasisPoints() external view returns (uint256)",
            &[],
            None,
        )
    }

    pub fn auto_burn(&self, session: &Session<'_>) -> Result<bool, HarnessError> {
        self.read(
            session,
            "function autoBurn() external view returns (bool)",
            &[],
            None,
        )
    }

    pub fn revenue_commitment_basis_points(
        &self,
        session: &Session<'_>,
    ) -> Result<U256, HarnessError> {
        self.read(
            session,
            "function revenueCommitmentBasisPoints() external view returns (uint256)",
            &[],
            None,
        )
    }

    pub fn min_investment(&self, session: &Session<'_>) -> Result<U256, HarnessError> {
        self.read(
            session,
            "function minInvestment() external view returns (uint256)",
            &[],
            None,
        )
    }

    pub fn open_until_at_least(&self, session: &Session<'_>) -> Result<U256, HarnessError> {
        self.read(
            session,
            "function openUntilAtLeast() external view returns (uint256)",
            &[],
            None,
        )
    }

    /// Sends the contract's whole native balance to its beneficiary, with a
    /// fixed gas limit instead of an estimate.
    pub fn withdraw_eth(
        &self,
        session: &Session<'_>,
        gas: u64,
    ) -> Result<TransactionReceipt, HarnessError> {
        self.send(session, "function withdrawETH() external", &[], Some(gas))
    }

    pub fn withdraw_token(
        &self,
        session: &Session<'_>,
        token: Address,
    ) -> Result<TransactionReceipt, HarnessError> {
        self.send(
            session,
            "function withdrawToken(address) external",
            &[Token::Address(token)],
            None,
        )
    }

    pub fn burn_from(
        &self,
        session: &Session<'_>,
        from: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, HarnessError> {
        self.send(
            session,
            "function burnFrom(address,uint256) external",
            &[Token::Address(from), Token::Uint(amount)],
            None,
        )
    }

    pub fn mint(
        &self,
        session: &Session<'_>,
        to: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, HarnessError> {
        self.send(
            session,
            "function mint(address,uint256) external",
            &[Token::Address(to), Token::Uint(amount)],
            None,
        )
    }

    pub fn update_config(
        &self,
        session: &Session<'_>,
        update: &ConfigUpdate,
    ) -> Result<TransactionReceipt, HarnessError> {
        self.send(
            session,
            "function updateConfig(address,address,address,address,uint256,bool,uint256,uint256,uint256) external",
            &update.tokens(),
            None,
        )
    }
}
