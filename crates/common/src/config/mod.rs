//! `dat.toml` parsing.
//!
//! Every section is optional. Malformed values are collected as
//! [`ConfigDiagnostic`]s rather than failing on the first one; callers decide
//! whether diagnostics are fatal (the CLI treats them as such).
use std::{fmt::Display, fs, str::FromStr};

use camino::{Utf8Path, Utf8PathBuf};
use ethers_core::types::Address;
use ledger::NodeDialect;
use thiserror::Error;
use toml::Value;
use url::Url;

mod sections;

pub use sections::{
    ArtifactsConfig, ConfirmationConfig, ContractsConfig, FeeConfig, NetworkConfig,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarnessConfig {
    pub network: NetworkConfig,
    pub confirmation: ConfirmationConfig,
    pub fees: FeeConfig,
    pub contracts: ContractsConfig,
    pub artifacts: ArtifactsConfig,
    pub diagnostics: Vec<ConfigDiagnostic>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(String),
    #[error("invalid configuration:\n{0}")]
    Invalid(String),
    #[error("missing configuration value `{0}`")]
    Missing(&'static str),
    #[error("no RPC endpoint configured (set network.rpc_url, DAT_RPC_URL or ALCHEMY_API_KEY)")]
    NoEndpoint,
}

impl HarnessConfig {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let parsed: Value = content
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Toml(e.to_string()))?;
        let Some(table) = parsed.as_table() else {
            return Err(ConfigError::Toml("expected a table at the top level".into()));
        };

        let mut config = HarnessConfig::default();
        let mut diagnostics = Vec::new();
        for (key, value) in table {
            match key.as_str() {
                "network" => config.network = sections::parse_network(value, &mut diagnostics),
                "confirmation" => {
                    config.confirmation = sections::parse_confirmation(value, &mut diagnostics)
                }
                "fees" => config.fees = sections::parse_fees(value, &mut diagnostics),
                "contracts" => {
                    config.contracts = sections::parse_contracts(value, &mut diagnostics)
                }
                "artifacts" => {
                    config.artifacts = sections::parse_artifacts(value, &mut diagnostics)
                }
                other => diagnostics.push(ConfigDiagnostic::UnknownSection(other.to_string())),
            }
        }
        config.diagnostics = diagnostics;
        Ok(config)
    }

    /// Reads and parses `path`. A missing file yields the default configuration.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(target: "config", %path, "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Fails with every collected diagnostic if there are any.
    pub fn validated(self) -> Result<Self, ConfigError> {
        match self.formatted_diagnostics() {
            Some(report) => Err(ConfigError::Invalid(report)),
            None => Ok(self),
        }
    }

    pub fn formatted_diagnostics(&self) -> Option<String> {
        if self.diagnostics.is_empty() {
            None
        } else {
            Some(
                self.diagnostics
                    .iter()
                    .map(|diag| format!("  {diag}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigDiagnostic {
    UnknownSection(String),
    UnknownField {
        section: &'static str,
        field: String,
    },
    UnexpectedType {
        field: String,
        expected: &'static str,
    },
    InvalidAddress {
        field: String,
        value: String,
    },
    InvalidUrl {
        field: String,
        value: String,
    },
    InvalidDialect(String),
    ZeroDuration(String),
}

impl Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSection(section) => write!(f, "Unknown section [{section}]"),
            Self::UnknownField { section, field } => {
                write!(f, "Unknown field \"{field}\" in [{section}]")
            }
            Self::UnexpectedType { field, expected } => {
                write!(f, "Field \"{field}\" must be {expected}")
            }
            Self::InvalidAddress { field, value } => {
                write!(f, "Invalid address \"{value}\" for \"{field}\"")
            }
            Self::InvalidUrl { field, value } => {
                write!(f, "Invalid URL \"{value}\" for \"{field}\"")
            }
            Self::InvalidDialect(value) => write!(
                f,
                "Invalid node dialect \"{value}\" (expected hardhat, anvil or standard)"
            ),
            Self::ZeroDuration(field) => write!(f, "Field \"{field}\" must be greater than zero"),
        }
    }
}

pub(crate) fn parse_address(
    field: &str,
    value: &Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Option<Address> {
    let raw = expect_str(field, value, diagnostics)?;
    match Address::from_str(raw) {
        Ok(address) if raw.trim_start_matches("0x").len() == 40 => Some(address),
        _ => {
            diagnostics.push(ConfigDiagnostic::InvalidAddress {
                field: field.to_string(),
                value: raw.to_string(),
            });
            None
        }
    }
}

pub(crate) fn parse_url(
    field: &str,
    value: &Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Option<Url> {
    let raw = expect_str(field, value, diagnostics)?;
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(_) => {
            diagnostics.push(ConfigDiagnostic::InvalidUrl {
                field: field.to_string(),
                value: raw.to_string(),
            });
            None
        }
    }
}

pub(crate) fn parse_dialect(
    value: &Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Option<NodeDialect> {
    let raw = expect_str("network.dialect", value, diagnostics)?;
    match raw.parse() {
        Ok(dialect) => Some(dialect),
        Err(_) => {
            diagnostics.push(ConfigDiagnostic::InvalidDialect(raw.to_string()));
            None
        }
    }
}

pub(crate) fn expect_str<'a>(
    field: &str,
    value: &'a Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Option<&'a str> {
    match value.as_str() {
        Some(value) => Some(value),
        None => {
            diagnostics.push(ConfigDiagnostic::UnexpectedType {
                field: field.to_string(),
                expected: "a string",
            });
            None
        }
    }
}

pub(crate) fn expect_u64(
    field: &str,
    value: &Value,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Option<u64> {
    match value.as_integer().and_then(|value| u64::try_from(value).ok()) {
        Some(value) => Some(value),
        None => {
            diagnostics.push(ConfigDiagnostic::UnexpectedType {
                field: field.to_string(),
                expected: "a non-negative integer",
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_uses_defaults() {
        let config = HarnessConfig::parse("").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.confirmation.timeout_secs, 120);
    }

    #[test]
    fn collects_every_diagnostic() {
        let config = HarnessConfig::parse(
            r#"
            [network]
            dialect = "ganache"
            rpc_url = "not a url"

            [contracts]
            proxy = "0x1234"
            extra = 1

            [confirmation]
            timeout_secs = 0

            [wallets]
            "#,
        )
        .unwrap();
        assert_eq!(config.diagnostics.len(), 6, "{:#?}", config.diagnostics);
        let report = config.validated().unwrap_err().to_string();
        assert!(report.contains("Invalid node dialect \"ganache\""));
        assert!(report.contains("Invalid address \"0x1234\" for \"contracts.proxy\""));
        assert!(report.contains("Unknown section [wallets]"));
    }

    #[test]
    fn rejects_non_table_document() {
        assert!(matches!(
            HarnessConfig::parse("= 1"),
            Err(ConfigError::Toml(_))
        ));
    }
}
