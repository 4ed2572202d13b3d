//! Secrets and endpoints sourced from the environment.
use std::{fmt, path::Path};

use url::Url;

use crate::{config::NetworkConfig, ConfigError};

pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
pub const MNEMONIC: &str = "MNEMONIC";
pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
pub const ETHERSCAN_API_KEY: &str = "ETHERSCAN_API_KEY";
/// Older spelling, still honoured when `ETHERSCAN_API_KEY` is unset.
pub const ETHER_SCAN_API_KEY: &str = "ETHER_SCAN_API_KEY";
pub const HARDWARE_SIGNER_URL: &str = "HARDWARE_SIGNER_URL";
pub const RPC_URL: &str = "DAT_RPC_URL";

/// Development mnemonic used when neither `PRIVATE_KEY` nor `MNEMONIC` is set.
pub const DEFAULT_MNEMONIC: &str =
    "candy maple cake sugar pudding cream honey rich smooth crumble sweet treat";

/// Where the keyed deployer comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployerSecret<'a> {
    PrivateKey(&'a str),
    /// A BIP-39 phrase; the deployer is its first account.
    Mnemonic(&'a str),
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub private_key: Option<String>,
    pub mnemonic: Option<String>,
    pub alchemy_api_key: Option<String>,
    pub explorer_api_key: Option<String>,
    pub hardware_signer_url: Option<Url>,
    pub rpc_url: Option<Url>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds credentials from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let url = |key: &str| {
            get(key).and_then(|raw| match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(err) => {
                    tracing::warn!(target: "config", key, %err, "ignoring malformed URL");
                    None
                }
            })
        };
        Self {
            private_key: get(PRIVATE_KEY),
            mnemonic: get(MNEMONIC),
            alchemy_api_key: get(ALCHEMY_API_KEY),
            explorer_api_key: get(ETHERSCAN_API_KEY).or_else(|| get(ETHER_SCAN_API_KEY)),
            hardware_signer_url: url(HARDWARE_SIGNER_URL),
            rpc_url: url(RPC_URL),
        }
    }

    /// Endpoint precedence: `DAT_RPC_URL`, then `network.rpc_url`, then the
    /// Alchemy mainnet endpoint derived from `ALCHEMY_API_KEY`.
    pub fn resolve_rpc_url(&self, network: &NetworkConfig) -> Result<Url, ConfigError> {
        if let Some(url) = self.rpc_url.clone().or_else(|| network.rpc_url.clone()) {
            return Ok(url);
        }
        match &self.alchemy_api_key {
            Some(key) => alchemy_mainnet_url(key),
            None => Err(ConfigError::NoEndpoint),
        }
    }

    /// `PRIVATE_KEY`, else `MNEMONIC`, else [`DEFAULT_MNEMONIC`].
    pub fn deployer_secret(&self) -> DeployerSecret<'_> {
        match (&self.private_key, &self.mnemonic) {
            (Some(key), _) => DeployerSecret::PrivateKey(key),
            (None, Some(phrase)) => DeployerSecret::Mnemonic(phrase),
            (None, None) => DeployerSecret::Mnemonic(DEFAULT_MNEMONIC),
        }
    }

    /// Upstream to fork from when resetting a fork.
    pub fn resolve_fork_url(&self, network: &NetworkConfig) -> Option<Url> {
        network.fork_url.clone().or_else(|| {
            self.alchemy_api_key
                .as_deref()
                .and_then(|key| alchemy_mainnet_url(key).ok())
        })
    }
}

fn alchemy_mainnet_url(key: &str) -> Result<Url, ConfigError> {
    Url::parse(&format!("https://eth-mainnet.g.alchemy.com/v2/{key}"))
        .map_err(|_| ConfigError::NoEndpoint)
}

fn redacted(value: &Option<impl AsRef<str>>) -> &'static str {
    match value {
        Some(value) if !value.as_ref().is_empty() => "<set>",
        _ => "<unset>",
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("private_key", &redacted(&self.private_key))
            .field("mnemonic", &redacted(&self.mnemonic))
            .field("alchemy_api_key", &redacted(&self.alchemy_api_key))
            .field("explorer_api_key", &redacted(&self.explorer_api_key))
            .field(
                "hardware_signer_url",
                &self.hardware_signer_url.as_ref().map(Url::as_str),
            )
            .field("rpc_url", &self.rpc_url.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "private key:       {}", redacted(&self.private_key))?;
        writeln!(
            f,
            "mnemonic:          {}",
            match &self.mnemonic {
                Some(_) => "<set>",
                None => "<development default>",
            }
        )?;
        writeln!(f, "alchemy api key:   {}", redacted(&self.alchemy_api_key))?;
        writeln!(f, "explorer api key:  {}", redacted(&self.explorer_api_key))?;
        write!(
            f,
            "hardware signer:   {}",
            self.hardware_signer_url
                .as_ref()
                .map_or("<unset>", Url::as_str)
        )
    }
}

/// Loads `.env` from `dir` without overriding variables that are already set.
pub fn load_dotenv(dir: &Path) -> Result<(), dotenvy::Error> {
    let env_path = dir.join(".env");
    if !env_path.exists() {
        return Ok(());
    }
    for item in dotenvy::from_path_iter(&env_path)? {
        let (key, val) = item?;
        if std::env::var_os(&key).is_none() {
            // Single-threaded at this point: called before any worker starts.
            std::env::set_var(&key, &val);
        }
    }
    Ok(())
}
