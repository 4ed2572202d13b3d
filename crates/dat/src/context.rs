//! Configuration, credentials and the ledger connection shared by every
//! command.
use std::{fmt::Write as _, time::Duration};

use camino::{Utf8Path, Utf8PathBuf};
use common::{credentials, ConfigError, Credentials, DeployerSecret, HarnessConfig};
use contract_harness::{
    CampaignPlan, ContractArtifact, FeeGuard, HarnessError, Identity, IdentityMode,
    IdentityProvider, Session,
};
use ethers_core::types::{Address, U256};
use ledger::{ConfirmationPolicy, ExternalSigner, Ledger, RpcLedger};

use crate::error::CliError;

pub struct Settings {
    pub config: HarnessConfig,
    pub credentials: Credentials,
}

impl Settings {
    /// Loads `.env` next to the configuration file, then the file itself.
    pub fn load(path: &Utf8Path) -> Result<Self, CliError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_str().is_empty() => dir,
            _ => Utf8Path::new("."),
        };
        credentials::load_dotenv(dir.as_std_path())
            .map_err(|err| CliError::Env(err.to_string()))?;
        let config = HarnessConfig::load(path)?.validated()?;
        Ok(Self {
            config,
            credentials: Credentials::from_env(),
        })
    }

    /// Human-readable summary with secrets redacted.
    pub fn describe(&self) -> String {
        let config = &self.config;
        let network = &config.network;
        let endpoint = match (&self.credentials.rpc_url, &network.rpc_url) {
            (Some(_), _) => "<set by DAT_RPC_URL>".to_string(),
            (None, Some(url)) => url.to_string(),
            (None, None) if self.credentials.alchemy_api_key.is_some() => {
                "alchemy mainnet (from ALCHEMY_API_KEY)".to_string()
            }
            (None, None) => "<none>".to_string(),
        };
        let address = |value: Option<Address>| {
            value.map_or_else(|| "<unset>".to_string(), |address| format!("{address:#x}"))
        };

        let mut out = String::new();
        let _ = writeln!(out, "endpoint:          {endpoint}");
        let _ = writeln!(out, "dialect:           {}", network.dialect);
        let _ = writeln!(
            out,
            "chain id:          {}",
            network
                .chain_id
                .map_or_else(|| "<any>".to_string(), |id| id.to_string())
        );
        if let Some(block) = network.fork_block {
            let _ = writeln!(out, "fork block:        {block}");
        }
        let _ = writeln!(
            out,
            "confirmation:      {}s, polling every {}ms",
            config.confirmation.timeout_secs, config.confirmation.poll_interval_ms
        );
        let _ = writeln!(
            out,
            "gas price cap:     {}",
            config
                .fees
                .max_gas_price_gwei
                .map_or_else(|| "none".to_string(), |gwei| format!("{gwei} gwei"))
        );
        let _ = writeln!(out, "admin funding:     {} ETH", config.fees.admin_funding_eth);
        let contracts = &config.contracts;
        for (name, value) in [
            ("proxy", contracts.proxy),
            ("proxy admin", contracts.proxy_admin),
            ("administrator", contracts.administrator),
            ("treasury token", contracts.treasury_token),
            ("vesting holder", contracts.vesting_holder),
            ("vesting benef.", contracts.vesting_beneficiary),
            ("control succ.", contracts.control_successor),
        ] {
            let _ = writeln!(out, "{:<19}{}", format!("{name}:"), address(value));
        }
        let _ = writeln!(out, "artifact:          {}", config.artifacts.dat_path());
        let _ = writeln!(out, "{}", self.credentials);
        out
    }
}

pub struct Context {
    pub settings: Settings,
    pub ledger: RpcLedger,
}

impl Context {
    pub fn connect(settings: Settings) -> Result<Self, CliError> {
        let network = &settings.config.network;
        let url = settings.credentials.resolve_rpc_url(network)?;
        let ledger = RpcLedger::connect(url, network.dialect)?;
        if let Some(expected) = network.chain_id {
            let actual = ledger.chain_id()?;
            if actual != expected {
                return Err(CliError::WrongChain { expected, actual });
            }
        }
        tracing::debug!(target: "config", dialect = %network.dialect, "connected to ledger");
        Ok(Self { settings, ledger })
    }

    pub fn session(&self) -> Session<'_> {
        let config = &self.settings.config;
        let fees = match config.fees.max_gas_price_gwei {
            Some(gwei) => FeeGuard::capped_gwei(gwei),
            None => FeeGuard::unlimited(),
        };
        Session::new(&self.ledger)
            .with_confirmation(ConfirmationPolicy {
                timeout: Duration::from_secs(config.confirmation.timeout_secs),
                poll_interval: Duration::from_millis(config.confirmation.poll_interval_ms),
            })
            .with_fee_guard(fees)
    }

    pub fn identities(&self, hardware: bool) -> Result<IdentityProvider<'_>, CliError> {
        let credentials = &self.settings.credentials;
        let provider = IdentityProvider::new(&self.ledger);
        let mut provider = match credentials.deployer_secret() {
            DeployerSecret::PrivateKey(key) => provider.with_private_key(key),
            DeployerSecret::Mnemonic(phrase) => provider.with_mnemonic(phrase),
        }
        .map_err(CliError::NoDeployer)?;
        if hardware {
            if let Some(url) = &credentials.hardware_signer_url {
                provider = provider.with_hardware_signer(ExternalSigner::connect(url.clone())?);
            }
        }
        Ok(provider)
    }

    /// The account that pays for deployments and funds impersonated
    /// administrators.
    pub fn deployer(
        &self,
        identities: &IdentityProvider<'_>,
        hardware: bool,
    ) -> Result<Identity, CliError> {
        let mode = if hardware {
            IdentityMode::Hardware
        } else {
            IdentityMode::Keyed
        };
        identities.default_identity(mode).map_err(|err| match err {
            HarnessError::NoCredential { .. } => CliError::NoDeployer(err),
            other => other.into(),
        })
    }

    /// Impersonates `contracts.administrator`, funding it from the keyed
    /// deployer first when it holds no native currency.
    pub fn administrator(
        &self,
        session: &Session<'_>,
        identities: &IdentityProvider<'_>,
    ) -> Result<Identity, CliError> {
        let address = self.require(
            self.settings.config.contracts.administrator,
            "contracts.administrator",
        )?;
        let admin = identities.acquire(address, IdentityMode::Impersonate)?;
        let funding = self.admin_funding();
        if !funding.is_zero() {
            let deployer = self.deployer(identities, false)?;
            identities.ensure_funded(session, &deployer, &admin, funding)?;
        }
        Ok(admin)
    }

    pub fn artifact(&self) -> Result<ContractArtifact, CliError> {
        let path: Utf8PathBuf = self.settings.config.artifacts.dat_path();
        Ok(ContractArtifact::load(&path)?)
    }

    pub fn require(
        &self,
        value: Option<Address>,
        field: &'static str,
    ) -> Result<Address, CliError> {
        value.ok_or_else(|| ConfigError::Missing(field).into())
    }

    pub fn plan(&self, transfer_control: bool) -> Result<CampaignPlan, CliError> {
        let contracts = &self.settings.config.contracts;
        let control_successor = if transfer_control {
            Some(self.require(contracts.control_successor, "contracts.control_successor")?)
        } else {
            None
        };
        Ok(CampaignPlan {
            proxy: self.require(contracts.proxy, "contracts.proxy")?,
            proxy_admin: self.require(contracts.proxy_admin, "contracts.proxy_admin")?,
            administrator: self.require(contracts.administrator, "contracts.administrator")?,
            admin_funding: self.admin_funding(),
            treasury_token: self.require(contracts.treasury_token, "contracts.treasury_token")?,
            vesting_holder: self.require(contracts.vesting_holder, "contracts.vesting_holder")?,
            vesting_beneficiary: self
                .require(contracts.vesting_beneficiary, "contracts.vesting_beneficiary")?,
            control_successor,
        })
    }

    pub fn reset_fork(&self) -> Result<(), CliError> {
        let network = &self.settings.config.network;
        let fork_url = self
            .settings
            .credentials
            .resolve_fork_url(network)
            .ok_or(ConfigError::Missing("network.fork_url"))?;
        self.ledger.reset_fork(&fork_url, network.fork_block)?;
        match network.fork_block {
            Some(block) => println!("Fork reset to block {block}"),
            None => println!("Fork reset to the latest block"),
        }
        Ok(())
    }

    fn admin_funding(&self) -> U256 {
        U256::from(self.settings.config.fees.admin_funding_eth) * U256::exp10(18)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn describe_redacts_secrets() {
        let config = HarnessConfig::parse(
            r#"
            [network]
            dialect = "anvil"
            chain_id = 1

            [contracts]
            proxy = "0xa1d65E8fB6e87b60FECCBc582F7f97804B725521"
            "#,
        )
        .unwrap();
        let settings = Settings {
            config,
            credentials: Credentials::from_lookup(|key| match key {
                "ALCHEMY_API_KEY" => Some("secret-key".to_string()),
                "PRIVATE_KEY" => Some("0x01".to_string()),
                _ => None,
            }),
        };
        let shown = settings.describe();
        assert!(!shown.contains("secret-key"));
        assert!(shown.contains("endpoint:          alchemy mainnet (from ALCHEMY_API_KEY)"));
        assert!(shown.contains("dialect:           anvil"));
        assert!(shown.contains("chain id:          1"));
        assert!(shown.contains("proxy:             0xa1d65e8fb6e87b60feccbc582f7f97804b725521"));
        assert!(shown.contains("administrator:     <unset>"));
        assert!(shown.contains("private key:       <set>"));
    }

    #[test]
    fn invalid_config_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("dat.toml")).unwrap();
        fs::write(&path, "[contracts]\nproxy = \"nope\"\n").unwrap();
        let err = Settings::load(&path).err().unwrap();
        assert!(err
            .to_string()
            .contains("Invalid address \"nope\" for \"contracts.proxy\""));
    }
}
