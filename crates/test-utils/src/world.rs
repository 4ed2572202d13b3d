//! Account state and the contract models the simulated ledger executes.
use std::collections::HashMap;

use ethers_core::{
    abi::{self, ParamType, Token},
    types::{Address, U256},
    utils::{get_contract_address, id},
};

const STOP: u8 = 0x00;

/// Flavours of DAT implementation the simulator knows how to run. Each one is
/// identified by its creation bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatVariant {
    Standard,
    /// Storage layout clash: `name()` and `symbol()` read each other's slot.
    ShiftedStorage,
    /// Withdrawals only move half of the contract's balance.
    LeakyWithdraw,
}

impl DatVariant {
    pub const ALL: [DatVariant; 3] = [
        DatVariant::Standard,
        DatVariant::ShiftedStorage,
        DatVariant::LeakyWithdraw,
    ];

    pub fn bytecode(self) -> Vec<u8> {
        let tag: &[u8] = match self {
            Self::Standard => b"dat:standard",
            Self::ShiftedStorage => b"dat:shifted-storage",
            Self::LeakyWithdraw => b"dat:leaky-withdraw",
        };
        let mut code = vec![0x60, 0x80, 0x60, 0x40, 0x52];
        code.extend_from_slice(tag);
        code
    }

    pub fn from_bytecode(code: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.bytecode() == code)
    }

    fn withdrawn(self, held: U256) -> U256 {
        match self {
            Self::LeakyWithdraw => held / 2,
            _ => held,
        }
    }
}

/// Storage of a DAT instance, living at the proxy (or at the implementation
/// when it is called directly).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatStorage {
    pub initialized: bool,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub balances: HashMap<Address, U256>,
    pub beneficiary: Address,
    pub control: Address,
    pub fee_collector: Address,
    pub whitelist: Address,
    pub currency: Address,
    pub init_goal: U256,
    pub buy_slope_num: U256,
    pub buy_slope_den: U256,
    pub investment_reserve_basis_points: U256,
    pub fee_basis_points: U256,
    pub auto_burn: bool,
    pub revenue_commitment_basis_points: U256,
    pub min_investment: U256,
    pub open_until_at_least: U256,
}

impl DatStorage {
    pub fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    /// Mints `amount` to `holder`.
    pub fn credit(&mut self, holder: Address, amount: U256) {
        *self.balances.entry(holder).or_default() += amount;
        self.total_supply += amount;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Code {
    Dat(DatVariant),
    Proxy {
        implementation: Address,
        admin: Address,
        /// Accepts upgrades without applying them.
        frozen: bool,
    },
    ProxyAdmin {
        owner: Address,
    },
    Erc20,
}

impl Code {
    pub(crate) fn bytes(&self) -> Vec<u8> {
        match self {
            Self::Dat(variant) => variant.bytecode(),
            Self::Proxy { .. } => b"\x60\x80proxy".to_vec(),
            Self::ProxyAdmin { .. } => b"\x60\x80proxy-admin".to_vec(),
            Self::Erc20 => b"\x60\x80erc20".to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Contract {
    pub code: Code,
    pub dat: DatStorage,
    pub tokens: HashMap<Address, U256>,
}

impl Contract {
    pub(crate) fn new(code: Code) -> Self {
        Self {
            code,
            dat: DatStorage::default(),
            tokens: HashMap::new(),
        }
    }
}

/// Why execution stopped. `None` is a revert without a reason string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Revert(pub Option<String>);

fn revert(reason: &str) -> Revert {
    Revert(Some(reason.to_string()))
}

type Outcome = Result<Vec<u8>, Revert>;

const DAT_FUNCTIONS: &[&str] = &[
    "initialize(uint256,address,uint256,uint256,uint256,uint256,string,string)",
    "name()",
    "symbol()",
    "decimals()",
    "totalSupply()",
    "balanceOf(address)",
    "beneficiary()",
    "control()",
    "feeCollector()",
    "whitelist()",
    "feeBasisPoints()",
    "autoBurn()",
    "revenueCommitmentBasisPoints()",
    "minInvestment()",
    "openUntilAtLeast()",
    "withdrawETH()",
    "withdrawToken(address)",
    "burnFrom(address,uint256)",
    "mint(address,uint256)",
    "updateConfig(address,address,address,address,uint256,bool,uint256,uint256,uint256)",
];

const PROXY_ADMIN_FUNCTIONS: &[&str] = &[
    "owner()",
    "getProxyImplementation(address)",
    "getProxyAdmin(address)",
    "upgrade(address,address)",
];

const ERC20_FUNCTIONS: &[&str] = &[
    "totalSupply()",
    "balanceOf(address)",
    "transfer(address,uint256)",
];

/// Human-readable ABI of the DAT functions the simulator implements.
pub fn dat_signatures() -> Vec<String> {
    let outputs = |name: &str| match name {
        "name()" | "symbol()" => " view returns (string)",
        "decimals()" => " view returns (uint8)",
        "beneficiary()" | "control()" | "feeCollector()" | "whitelist()" => {
            " view returns (address)"
        }
        "autoBurn()" => " view returns (bool)",
        "totalSupply()"
        | "balanceOf(address)"
        | "feeBasisPoints()"
        | "revenueCommitmentBasisPoints()"
        | "minInvestment()"
        | "openUntilAtLeast()" => " view returns (uint256)",
        _ => "",
    };
    DAT_FUNCTIONS
        .iter()
        .map(|signature| format!("function {signature} external{}", outputs(signature)))
        .collect()
}

fn dispatch<'a, 'd>(
    functions: &[&'a str],
    data: &'d [u8],
) -> Result<(&'a str, &'d [u8]), Revert> {
    if data.len() < 4 {
        return Err(Revert(None));
    }
    functions
        .iter()
        .find(|signature| id(signature) == data[..4])
        .map(|signature| (*signature, &data[4..]))
        .ok_or(Revert(None))
}

fn decode(types: &[ParamType], input: &[u8]) -> Result<Vec<Token>, Revert> {
    abi::decode(types, input).map_err(|_| Revert(None))
}

fn address_arg(tokens: &[Token], index: usize) -> Result<Address, Revert> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_address)
        .ok_or(Revert(None))
}

fn uint_arg(tokens: &[Token], index: usize) -> Result<U256, Revert> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_uint)
        .ok_or(Revert(None))
}

fn bool_arg(tokens: &[Token], index: usize) -> Result<bool, Revert> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_bool)
        .ok_or(Revert(None))
}

fn string_arg(tokens: &[Token], index: usize) -> Result<String, Revert> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_string)
        .ok_or(Revert(None))
}

fn output(token: Token) -> Outcome {
    Ok(abi::encode(&[token]))
}

#[derive(Debug, Clone, Default)]
pub(crate) struct World {
    pub balances: HashMap<Address, U256>,
    pub nonces: HashMap<Address, u64>,
    pub contracts: HashMap<Address, Contract>,
}

impl World {
    pub(crate) fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    pub(crate) fn nonce(&self, address: Address) -> u64 {
        self.nonces.get(&address).copied().unwrap_or_default()
    }

    pub(crate) fn bump_nonce(&mut self, address: Address) {
        *self.nonces.entry(address).or_default() += 1;
    }

    pub(crate) fn charge(&mut self, address: Address, fee: U256) {
        let balance = self.balances.entry(address).or_default();
        *balance = balance.saturating_sub(fee);
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), Revert> {
        if value.is_zero() {
            return Ok(());
        }
        let available = self.balance(from);
        if available < value {
            return Err(revert("insufficient balance for transfer"));
        }
        self.balances.insert(from, available - value);
        *self.balances.entry(to).or_default() += value;
        Ok(())
    }

    /// Deploys the contract whose creation code is `init_code`, at the
    /// address derived from `from` and its current nonce.
    pub(crate) fn create(
        &mut self,
        from: Address,
        value: U256,
        init_code: &[u8],
    ) -> Result<Address, Revert> {
        let address = get_contract_address(from, self.nonce(from));
        // A lone STOP succeeds without returning runtime code.
        if init_code == [STOP] {
            self.transfer(from, address, value)?;
            return Ok(address);
        }
        let variant = DatVariant::from_bytecode(init_code).ok_or(Revert(None))?;
        self.transfer(from, address, value)?;
        self.contracts
            .insert(address, Contract::new(Code::Dat(variant)));
        Ok(address)
    }

    pub(crate) fn call(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
        data: &[u8],
    ) -> Outcome {
        self.transfer(from, to, value)?;
        let Some(contract) = self.contracts.get(&to) else {
            return Ok(Vec::new());
        };
        match contract.code.clone() {
            Code::Dat(variant) => self.dat_call(to, variant, from, data),
            Code::Proxy {
                implementation,
                admin,
                ..
            } => {
                if from == admin {
                    return Err(revert(
                        "TransparentUpgradeableProxy: admin cannot fallback to proxy target",
                    ));
                }
                match self.contracts.get(&implementation).map(|c| &c.code) {
                    Some(Code::Dat(variant)) => {
                        let variant = *variant;
                        self.dat_call(to, variant, from, data)
                    }
                    _ => Err(Revert(None)),
                }
            }
            Code::ProxyAdmin { owner } => self.proxy_admin_call(to, owner, from, data),
            Code::Erc20 => self.erc20_call(to, from, data),
        }
    }

    fn contract_mut(&mut self, address: Address) -> Result<&mut Contract, Revert> {
        self.contracts.get_mut(&address).ok_or(Revert(None))
    }

    fn dat(&self, address: Address) -> Result<&DatStorage, Revert> {
        self.contracts
            .get(&address)
            .map(|contract| &contract.dat)
            .ok_or(Revert(None))
    }

    fn dat_mut(&mut self, address: Address) -> Result<&mut DatStorage, Revert> {
        Ok(&mut self.contract_mut(address)?.dat)
    }

    fn dat_call(
        &mut self,
        this: Address,
        variant: DatVariant,
        from: Address,
        data: &[u8],
    ) -> Outcome {
        let (signature, input) = dispatch(DAT_FUNCTIONS, data)?;
        let storage = self.dat(this)?;
        match signature {
            "initialize(uint256,address,uint256,uint256,uint256,uint256,string,string)" => {
                let args = decode(
                    &[
                        ParamType::Uint(256),
                        ParamType::Address,
                        ParamType::Uint(256),
                        ParamType::Uint(256),
                        ParamType::Uint(256),
                        ParamType::Uint(256),
                        ParamType::String,
                        ParamType::String,
                    ],
                    input,
                )?;
                if storage.initialized {
                    return Err(revert("Contract instance has already been initialized"));
                }
                let storage = self.dat_mut(this)?;
                storage.initialized = true;
                storage.currency = address_arg(&args, 1)?;
                storage.init_goal = uint_arg(&args, 2)?;
                storage.buy_slope_num = uint_arg(&args, 3)?;
                storage.buy_slope_den = uint_arg(&args, 4)?;
                storage.investment_reserve_basis_points = uint_arg(&args, 5)?;
                storage.name = string_arg(&args, 6)?;
                storage.symbol = string_arg(&args, 7)?;
                storage.decimals = 18;
                storage.control = from;
                storage.beneficiary = from;
                storage.fee_collector = from;
                storage.min_investment = U256::exp10(20);
                storage.credit(from, uint_arg(&args, 0)?);
                Ok(Vec::new())
            }
            "name()" => output(Token::String(match variant {
                DatVariant::ShiftedStorage => storage.symbol.clone(),
                _ => storage.name.clone(),
            })),
            "symbol()" => output(Token::String(match variant {
                DatVariant::ShiftedStorage => storage.name.clone(),
                _ => storage.symbol.clone(),
            })),
            "decimals()" => output(Token::Uint(storage.decimals.into())),
            "totalSupply()" => output(Token::Uint(storage.total_supply)),
            "balanceOf(address)" => {
                let args = decode(&[ParamType::Address], input)?;
                output(Token::Uint(storage.balance_of(address_arg(&args, 0)?)))
            }
            "beneficiary()" => output(Token::Address(storage.beneficiary)),
            "control()" => output(Token::Address(storage.control)),
            "feeCollector()" => output(Token::Address(storage.fee_collector)),
            "whitelist()" => output(Token::Address(storage.whitelist)),
            "feeBasisPoints()" => output(Token::Uint(storage.fee_basis_points)),
            "autoBurn()" => output(Token::Bool(storage.auto_burn)),
            "revenueCommitmentBasisPoints()" => {
                output(Token::Uint(storage.revenue_commitment_basis_points))
            }
            "minInvestment()" => output(Token::Uint(storage.min_investment)),
            "openUntilAtLeast()" => output(Token::Uint(storage.open_until_at_least)),
            "withdrawETH()" => {
                if from != storage.beneficiary {
                    return Err(revert("BENEFICIARY_ONLY"));
                }
                let beneficiary = storage.beneficiary;
                let amount = variant.withdrawn(self.balance(this));
                self.transfer(this, beneficiary, amount)?;
                Ok(Vec::new())
            }
            "withdrawToken(address)" => {
                let args = decode(&[ParamType::Address], input)?;
                if from != storage.beneficiary {
                    return Err(revert("BENEFICIARY_ONLY"));
                }
                let beneficiary = storage.beneficiary;
                let token = address_arg(&args, 0)?;
                let held = self.token_balance(token, this)?;
                self.token_transfer(token, this, beneficiary, variant.withdrawn(held))?;
                Ok(Vec::new())
            }
            "burnFrom(address,uint256)" => {
                let args = decode(&[ParamType::Address, ParamType::Uint(256)], input)?;
                if from != storage.control {
                    return Err(revert("CONTROL_ONLY"));
                }
                let (holder, amount) = (address_arg(&args, 0)?, uint_arg(&args, 1)?);
                let held = storage.balance_of(holder);
                if held < amount {
                    return Err(revert("ERC20: burn amount exceeds balance"));
                }
                let storage = self.dat_mut(this)?;
                storage.balances.insert(holder, held - amount);
                storage.total_supply -= amount;
                Ok(Vec::new())
            }
            "mint(address,uint256)" => {
                let args = decode(&[ParamType::Address, ParamType::Uint(256)], input)?;
                if from != storage.control {
                    return Err(revert("CONTROL_ONLY"));
                }
                let (holder, amount) = (address_arg(&args, 0)?, uint_arg(&args, 1)?);
                if holder.is_zero() {
                    return Err(revert("ERC20: mint to the zero address"));
                }
                self.dat_mut(this)?.credit(holder, amount);
                Ok(Vec::new())
            }
            "updateConfig(address,address,address,address,uint256,bool,uint256,uint256,uint256)" => {
                let args = decode(
                    &[
                        ParamType::Address,
                        ParamType::Address,
                        ParamType::Address,
                        ParamType::Address,
                        ParamType::Uint(256),
                        ParamType::Bool,
                        ParamType::Uint(256),
                        ParamType::Uint(256),
                        ParamType::Uint(256),
                    ],
                    input,
                )?;
                if from != storage.control {
                    return Err(revert("CONTROL_ONLY"));
                }
                let open_until = uint_arg(&args, 8)?;
                if open_until < storage.open_until_at_least {
                    return Err(revert("ONLY_INCREASE"));
                }
                let (beneficiary, control) = (address_arg(&args, 1)?, address_arg(&args, 2)?);
                if beneficiary.is_zero() || control.is_zero() {
                    return Err(revert("INVALID_ADDRESS"));
                }
                let storage = self.dat_mut(this)?;
                storage.whitelist = address_arg(&args, 0)?;
                storage.beneficiary = beneficiary;
                storage.control = control;
                storage.fee_collector = address_arg(&args, 3)?;
                storage.fee_basis_points = uint_arg(&args, 4)?;
                storage.auto_burn = bool_arg(&args, 5)?;
                storage.revenue_commitment_basis_points = uint_arg(&args, 6)?;
                storage.min_investment = uint_arg(&args, 7)?;
                storage.open_until_at_least = open_until;
                Ok(Vec::new())
            }
            _ => Err(Revert(None)),
        }
    }

    fn proxy_admin_call(
        &mut self,
        this: Address,
        owner: Address,
        from: Address,
        data: &[u8],
    ) -> Outcome {
        let (signature, input) = dispatch(PROXY_ADMIN_FUNCTIONS, data)?;
        match signature {
            "owner()" => output(Token::Address(owner)),
            "getProxyImplementation(address)" | "getProxyAdmin(address)" => {
                let args = decode(&[ParamType::Address], input)?;
                match self.contracts.get(&address_arg(&args, 0)?).map(|c| &c.code) {
                    Some(Code::Proxy {
                        implementation,
                        admin,
                        ..
                    }) if *admin == this => output(Token::Address(
                        if signature.starts_with("getProxyImplementation") {
                            *implementation
                        } else {
                            *admin
                        },
                    )),
                    _ => Err(Revert(None)),
                }
            }
            "upgrade(address,address)" => {
                let args = decode(&[ParamType::Address, ParamType::Address], input)?;
                if from != owner {
                    return Err(revert("Ownable: caller is not the owner"));
                }
                let (proxy, next) = (address_arg(&args, 0)?, address_arg(&args, 1)?);
                if !self.contracts.contains_key(&next) {
                    return Err(revert("ERC1967: new implementation is not a contract"));
                }
                match &mut self.contract_mut(proxy)?.code {
                    Code::Proxy {
                        implementation,
                        admin,
                        frozen,
                    } if *admin == this => {
                        if !*frozen {
                            *implementation = next;
                        }
                        Ok(Vec::new())
                    }
                    _ => Err(Revert(None)),
                }
            }
            _ => Err(Revert(None)),
        }
    }

    pub(crate) fn token_balance(&self, token: Address, holder: Address) -> Result<U256, Revert> {
        match self.contracts.get(&token) {
            Some(contract) if contract.code == Code::Erc20 => {
                Ok(contract.tokens.get(&holder).copied().unwrap_or_default())
            }
            _ => Err(Revert(None)),
        }
    }

    fn token_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), Revert> {
        let held = self.token_balance(token, from)?;
        if held < amount {
            return Err(revert("ERC20: transfer amount exceeds balance"));
        }
        let tokens = &mut self.contract_mut(token)?.tokens;
        tokens.insert(from, held - amount);
        *tokens.entry(to).or_default() += amount;
        Ok(())
    }

    fn erc20_call(&mut self, this: Address, from: Address, data: &[u8]) -> Outcome {
        let (signature, input) = dispatch(ERC20_FUNCTIONS, data)?;
        match signature {
            "totalSupply()" => {
                let contract = self.contracts.get(&this).ok_or(Revert(None))?;
                let supply = contract.tokens.values().fold(U256::zero(), |a, b| a + *b);
                output(Token::Uint(supply))
            }
            "balanceOf(address)" => {
                let args = decode(&[ParamType::Address], input)?;
                output(Token::Uint(self.token_balance(this, address_arg(&args, 0)?)?))
            }
            "transfer(address,uint256)" => {
                let args = decode(&[ParamType::Address, ParamType::Uint(256)], input)?;
                self.token_transfer(this, from, address_arg(&args, 0)?, uint_arg(&args, 1)?)?;
                output(Token::Bool(true))
            }
            _ => Err(Revert(None)),
        }
    }
}

/// Gas charged for a transaction, independent of what it executes.
pub(crate) fn gas_for(to: Option<Address>, data: &[u8]) -> U256 {
    match (to, data.is_empty()) {
        (None, _) => U256::from(1_500_000u64),
        (Some(_), true) => U256::from(21_000u64),
        (Some(_), false) => U256::from(60_000u64),
    }
}
