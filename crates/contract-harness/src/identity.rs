//! Signing identities and the provider that hands them out.
use std::{fmt, str::FromStr, sync::Arc};

use ethers_core::types::{Address, U256};
use ethers_signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer as _};
use ledger::{ExternalSigner, Ledger, LedgerError, TransactionReceipt};

use crate::{session::Call, HarnessError, Session};

/// How an [`Identity`] produces signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityMode {
    /// The ledger signs on behalf of the address. Fork and test ledgers only.
    Impersonate,
    /// A private key held in process memory.
    Keyed,
    /// A hardware wallet behind a signing bridge.
    Hardware,
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Impersonate => write!(f, "impersonated"),
            Self::Keyed => write!(f, "keyed"),
            Self::Hardware => write!(f, "hardware"),
        }
    }
}

#[derive(Clone)]
pub(crate) enum Signer {
    Impersonated,
    Keyed(LocalWallet),
    Hardware(Arc<ExternalSigner>),
}

/// An address plus the means to sign for it, valid for the ledger epoch it was
/// acquired in.
#[derive(Clone)]
pub struct Identity {
    address: Address,
    signer: Signer,
    epoch: u64,
}

impl Identity {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn mode(&self) -> IdentityMode {
        match self.signer {
            Signer::Impersonated => IdentityMode::Impersonate,
            Signer::Keyed(_) => IdentityMode::Keyed,
            Signer::Hardware(_) => IdentityMode::Hardware,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Fails if the ledger has been reset since this identity was acquired.
    pub fn ensure_current(&self, ledger: &dyn Ledger) -> Result<(), HarnessError> {
        let current = ledger.epoch();
        if current != self.epoch {
            return Err(HarnessError::StaleIdentity {
                address: self.address,
                acquired: self.epoch,
                current,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &format_args!("{:#x}", self.address))
            .field("mode", &self.mode())
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Resolves identities against one ledger from whatever credentials are
/// configured.
pub struct IdentityProvider<'l> {
    ledger: &'l dyn Ledger,
    wallet: Option<LocalWallet>,
    hardware: Option<Arc<ExternalSigner>>,
}

impl<'l> IdentityProvider<'l> {
    pub fn new(ledger: &'l dyn Ledger) -> Self {
        Self {
            ledger,
            wallet: None,
            hardware: None,
        }
    }

    /// Registers a hex-encoded secp256k1 private key for `keyed` identities.
    pub fn with_private_key(mut self, key: &str) -> Result<Self, HarnessError> {
        let wallet = LocalWallet::from_str(key.trim().trim_start_matches("0x")).map_err(|_| {
            HarnessError::NoCredential {
                mode: IdentityMode::Keyed,
                address: None,
            }
        })?;
        self.wallet = Some(wallet);
        Ok(self)
    }

    /// Registers the first account (`m/44'/60'/0'/0/0`) of a BIP-39 phrase for
    /// `keyed` identities.
    pub fn with_mnemonic(mut self, phrase: &str) -> Result<Self, HarnessError> {
        fn no_credential<E>(_: E) -> HarnessError {
            HarnessError::NoCredential {
                mode: IdentityMode::Keyed,
                address: None,
            }
        }
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase.trim())
            .index(0u32)
            .map_err(no_credential)?
            .build()
            .map_err(no_credential)?;
        self.wallet = Some(wallet);
        Ok(self)
    }

    pub fn with_hardware_signer(mut self, signer: ExternalSigner) -> Self {
        self.hardware = Some(Arc::new(signer));
        self
    }

    /// Obtains an identity that signs for `address` in the given mode.
    pub fn acquire(&self, address: Address, mode: IdentityMode) -> Result<Identity, HarnessError> {
        let signer = match mode {
            IdentityMode::Impersonate => {
                self.ledger.impersonate(address).map_err(|err| match err {
                    LedgerError::Unsupported(reason) => {
                        HarnessError::UnsupportedMode { mode, reason }
                    }
                    other => other.into(),
                })?;
                Signer::Impersonated
            }
            IdentityMode::Keyed => match &self.wallet {
                Some(wallet) if wallet.address() == address => Signer::Keyed(wallet.clone()),
                _ => {
                    return Err(HarnessError::NoCredential {
                        mode,
                        address: Some(address),
                    })
                }
            },
            IdentityMode::Hardware => {
                let hardware = self.hardware.as_ref().ok_or(HarnessError::NoCredential {
                    mode,
                    address: Some(address),
                })?;
                if !hardware.accounts()?.contains(&address) {
                    return Err(HarnessError::NoCredential {
                        mode,
                        address: Some(address),
                    });
                }
                Signer::Hardware(Arc::clone(hardware))
            }
        };
        let identity = Identity {
            address,
            signer,
            epoch: self.ledger.epoch(),
        };
        tracing::info!(
            target: "identity",
            address = %format!("{address:#x}"),
            %mode,
            epoch = identity.epoch,
            "acquired identity"
        );
        Ok(identity)
    }

    /// The identity a credential resolves to without naming an address: the
    /// configured key, or the first account the hardware bridge exposes.
    pub fn default_identity(&self, mode: IdentityMode) -> Result<Identity, HarnessError> {
        let address = match mode {
            IdentityMode::Keyed => self.wallet.as_ref().map(|wallet| wallet.address()),
            IdentityMode::Hardware => match &self.hardware {
                Some(hardware) => hardware.accounts()?.first().copied(),
                None => None,
            },
            IdentityMode::Impersonate => None,
        };
        match address {
            Some(address) => self.acquire(address, mode),
            None => Err(HarnessError::NoCredential {
                mode,
                address: None,
            }),
        }
    }

    /// Sends `amount` of native currency from `funder` to `identity` and waits
    /// for it to confirm.
    pub fn fund(
        &self,
        session: &Session<'_>,
        funder: &Identity,
        identity: &Identity,
        amount: U256,
    ) -> Result<TransactionReceipt, HarnessError> {
        tracing::info!(
            target: "identity",
            from = %format!("{:#x}", funder.address()),
            to = %format!("{:#x}", identity.address()),
            %amount,
            "funding identity"
        );
        session.submit(
            funder,
            Call::transfer(identity.address(), amount),
            "fund identity",
        )
    }

    /// Funds `identity` only when it cannot pay for anything yet.
    pub fn ensure_funded(
        &self,
        session: &Session<'_>,
        funder: &Identity,
        identity: &Identity,
        amount: U256,
    ) -> Result<Option<TransactionReceipt>, HarnessError> {
        if !self.ledger.balance(identity.address(), None)?.is_zero() {
            return Ok(None);
        }
        self.fund(session, funder, identity, amount).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::SimLedger;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TRUFFLE_MNEMONIC: &str =
        "candy maple cake sugar pudding cream honey rich smooth crumble sweet treat";

    #[test]
    fn keyed_identity_requires_matching_key() {
        let ledger = SimLedger::new();
        let provider = IdentityProvider::new(&ledger).with_private_key(KEY).unwrap();
        let identity = provider.default_identity(IdentityMode::Keyed).unwrap();
        assert_eq!(
            format!("{:#x}", identity.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        let other = Address::repeat_byte(0x11);
        let err = provider.acquire(other, IdentityMode::Keyed).unwrap_err();
        assert_eq!(err.kind(), "NoCredential");
    }

    #[test]
    fn mnemonic_yields_its_first_account() {
        let ledger = SimLedger::new();
        let provider = IdentityProvider::new(&ledger)
            .with_mnemonic("test test test test test test test test test test test junk")
            .unwrap();
        let identity = provider.default_identity(IdentityMode::Keyed).unwrap();
        assert_eq!(
            format!("{:#x}", identity.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );

        let provider = IdentityProvider::new(&ledger)
            .with_mnemonic(TRUFFLE_MNEMONIC)
            .unwrap();
        let identity = provider.default_identity(IdentityMode::Keyed).unwrap();
        assert_eq!(
            format!("{:#x}", identity.address()),
            "0x627306090abab3a6e1400e9345bc60c78a8bef57"
        );

        let err = IdentityProvider::new(&ledger)
            .with_mnemonic("not a phrase")
            .err()
            .unwrap();
        assert_eq!(err.kind(), "NoCredential");
    }

    #[test]
    fn missing_credentials_are_reported() {
        let ledger = SimLedger::new();
        let provider = IdentityProvider::new(&ledger);
        for mode in [IdentityMode::Keyed, IdentityMode::Hardware] {
            let err = provider.default_identity(mode).unwrap_err();
            assert!(matches!(err, HarnessError::NoCredential { address: None, .. }));
        }
    }

    #[test]
    fn impersonation_needs_a_fork() {
        let ledger = SimLedger::new().without_cheats();
        let provider = IdentityProvider::new(&ledger);
        let err = provider
            .acquire(Address::repeat_byte(0x22), IdentityMode::Impersonate)
            .unwrap_err();
        assert_eq!(err.kind(), "UnsupportedMode");
    }

    #[test]
    fn identities_go_stale_after_reset() {
        let ledger = SimLedger::new();
        let provider = IdentityProvider::new(&ledger);
        let identity = provider
            .acquire(Address::repeat_byte(0x33), IdentityMode::Impersonate)
            .unwrap();
        identity.ensure_current(&ledger).unwrap();
        ledger.reset();
        let err = identity.ensure_current(&ledger).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::StaleIdentity {
                acquired: 0,
                current: 1,
                ..
            }
        ));
    }
}
