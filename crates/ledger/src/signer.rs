use std::time::Duration;

use ethers_core::types::{Address, Bytes, TransactionRequest};
use serde_json::Value;
use url::Url;

use crate::{rpc::RpcClient, LedgerError};

/// Hardware wallet reached through a signing bridge (Frame, Clef and similar)
/// that speaks `eth_accounts` / `eth_signTransaction`. Keys never leave the
/// device; the bridge returns the RLP-encoded signed transaction.
#[derive(Debug)]
pub struct ExternalSigner {
    client: RpcClient,
}

impl ExternalSigner {
    pub fn connect(url: Url) -> Result<Self, LedgerError> {
        // Device confirmation is manual, so allow generous time per request.
        let client = RpcClient::new(url, Duration::from_secs(300))?;
        Ok(Self { client })
    }

    pub fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        self.client.request("eth_accounts", [(); 0])
    }

    /// Asks the device to sign a fully populated transaction.
    pub fn sign_transaction(&self, tx: &TransactionRequest) -> Result<Bytes, LedgerError> {
        let signed: Value = self
            .client
            .request("eth_signTransaction", [tx])
            .map_err(|err| LedgerError::Signing(err.to_string()))?;
        let raw = match &signed {
            Value::String(raw) => raw.as_str(),
            Value::Object(object) => object
                .get("raw")
                .and_then(Value::as_str)
                .ok_or_else(|| LedgerError::Signing("signer response without `raw`".into()))?,
            other => {
                return Err(LedgerError::Signing(format!(
                    "unexpected signer response {other}"
                )));
            }
        };
        let bytes = hex::decode(raw.trim_start_matches("0x"))
            .map_err(|err| LedgerError::Decode(err.to_string()))?;
        Ok(Bytes::from(bytes))
    }
}
