use camino::Utf8PathBuf;
use common::ConfigError;
use contract_harness::{CampaignAborted, HarnessError};
use ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load .env: {0}")]
    Env(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Harness(#[from] HarnessError),
    #[error(transparent)]
    Campaign(#[from] CampaignAborted),
    #[error("No deployer ({0})")]
    NoDeployer(HarnessError),
    #[error("node reports chain {actual}, configuration expects {expected}")]
    WrongChain { expected: u64, actual: u64 },
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
}
