use camino::Utf8PathBuf;
use ethers_core::types::Address;
use ledger::NodeDialect;
use toml::Value;
use url::Url;

use super::{
    expect_str, expect_u64, parse_address, parse_dialect, parse_url, ConfigDiagnostic,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkConfig {
    pub rpc_url: Option<Url>,
    pub dialect: NodeDialect,
    /// Expected chain id; the CLI refuses to act on any other chain.
    pub chain_id: Option<u64>,
    /// Upstream endpoint a fork is created from when it is reset.
    pub fork_url: Option<Url>,
    pub fork_block: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationConfig {
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeConfig {
    /// Submissions are refused while the node quotes a higher gas price.
    pub max_gas_price_gwei: Option<u64>,
    /// Native currency sent to an impersonated administrator before it acts.
    pub admin_funding_eth: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            max_gas_price_gwei: None,
            admin_funding_eth: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractsConfig {
    pub proxy: Option<Address>,
    pub proxy_admin: Option<Address>,
    /// Owner of the proxy admin; controller and beneficiary of the token.
    pub administrator: Option<Address>,
    pub treasury_token: Option<Address>,
    pub vesting_holder: Option<Address>,
    pub vesting_beneficiary: Option<Address>,
    pub control_successor: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactsConfig {
    pub root: Utf8PathBuf,
    pub dat: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("build/artifacts"),
            dat: "DecentralizedAutonomousTrust".to_string(),
        }
    }
}

impl ArtifactsConfig {
    /// Hardhat places `Foo` compiled from `contracts/Foo.sol` at
    /// `<root>/contracts/Foo.sol/Foo.json`.
    pub fn artifact_path(&self, contract: &str) -> Utf8PathBuf {
        self.root
            .join("contracts")
            .join(format!("{contract}.sol"))
            .join(format!("{contract}.json"))
    }

    pub fn dat_path(&self) -> Utf8PathBuf {
        self.artifact_path(&self.dat)
    }
}

fn section_table<'a>(
    section: &'static str,
    value: &'a Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Option<&'a toml::value::Table> {
    match value.as_table() {
        Some(table) => Some(table),
        None => {
            diagnostics.push(ConfigDiagnostic::UnexpectedType {
                field: section.to_string(),
                expected: "a table",
            });
            None
        }
    }
}

pub(crate) fn parse_network(
    value: &Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> NetworkConfig {
    let mut network = NetworkConfig::default();
    let Some(table) = section_table("network", value, diagnostics) else {
        return network;
    };
    for (key, value) in table {
        match key.as_str() {
            "rpc_url" => network.rpc_url = parse_url("network.rpc_url", value, diagnostics),
            "dialect" => {
                if let Some(dialect) = parse_dialect(value, diagnostics) {
                    network.dialect = dialect;
                }
            }
            "chain_id" => network.chain_id = expect_u64("network.chain_id", value, diagnostics),
            "fork_url" => network.fork_url = parse_url("network.fork_url", value, diagnostics),
            "fork_block" => {
                network.fork_block = expect_u64("network.fork_block", value, diagnostics)
            }
            other => diagnostics.push(ConfigDiagnostic::UnknownField {
                section: "network",
                field: other.to_string(),
            }),
        }
    }
    network
}

pub(crate) fn parse_confirmation(
    value: &Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> ConfirmationConfig {
    let mut confirmation = ConfirmationConfig::default();
    let Some(table) = section_table("confirmation", value, diagnostics) else {
        return confirmation;
    };
    for (key, value) in table {
        let field = format!("confirmation.{key}");
        let slot = match key.as_str() {
            "timeout_secs" => &mut confirmation.timeout_secs,
            "poll_interval_ms" => &mut confirmation.poll_interval_ms,
            other => {
                diagnostics.push(ConfigDiagnostic::UnknownField {
                    section: "confirmation",
                    field: other.to_string(),
                });
                continue;
            }
        };
        match expect_u64(&field, value, diagnostics) {
            Some(0) => diagnostics.push(ConfigDiagnostic::ZeroDuration(field)),
            Some(parsed) => *slot = parsed,
            None => {}
        }
    }
    confirmation
}

pub(crate) fn parse_fees(value: &Value, diagnostics: &mut Vec<ConfigDiagnostic>) -> FeeConfig {
    let mut fees = FeeConfig::default();
    let Some(table) = section_table("fees", value, diagnostics) else {
        return fees;
    };
    for (key, value) in table {
        match key.as_str() {
            "max_gas_price_gwei" => {
                fees.max_gas_price_gwei = expect_u64("fees.max_gas_price_gwei", value, diagnostics)
            }
            "admin_funding_eth" => {
                if let Some(amount) = expect_u64("fees.admin_funding_eth", value, diagnostics) {
                    fees.admin_funding_eth = amount;
                }
            }
            other => diagnostics.push(ConfigDiagnostic::UnknownField {
                section: "fees",
                field: other.to_string(),
            }),
        }
    }
    fees
}

pub(crate) fn parse_contracts(
    value: &Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> ContractsConfig {
    let mut contracts = ContractsConfig::default();
    let Some(table) = section_table("contracts", value, diagnostics) else {
        return contracts;
    };
    for (key, value) in table {
        let slot = match key.as_str() {
            "proxy" => &mut contracts.proxy,
            "proxy_admin" => &mut contracts.proxy_admin,
            "administrator" => &mut contracts.administrator,
            "treasury_token" => &mut contracts.treasury_token,
            "vesting_holder" => &mut contracts.vesting_holder,
            "vesting_beneficiary" => &mut contracts.vesting_beneficiary,
            "control_successor" => &mut contracts.control_successor,
            other => {
                diagnostics.push(ConfigDiagnostic::UnknownField {
                    section: "contracts",
                    field: other.to_string(),
                });
                continue;
            }
        };
        *slot = parse_address(&format!("contracts.{key}"), value, diagnostics);
    }
    contracts
}

pub(crate) fn parse_artifacts(
    value: &Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> ArtifactsConfig {
    let mut artifacts = ArtifactsConfig::default();
    let Some(table) = section_table("artifacts", value, diagnostics) else {
        return artifacts;
    };
    for (key, value) in table {
        match key.as_str() {
            "root" => {
                if let Some(root) = expect_str("artifacts.root", value, diagnostics) {
                    artifacts.root = Utf8PathBuf::from(root);
                }
            }
            "dat" => {
                if let Some(name) = expect_str("artifacts.dat", value, diagnostics) {
                    artifacts.dat = name.to_string();
                }
            }
            other => diagnostics.push(ConfigDiagnostic::UnknownField {
                section: "artifacts",
                field: other.to_string(),
            }),
        }
    }
    artifacts
}
