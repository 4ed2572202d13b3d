//! Blocking JSON-RPC ledger.
use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use ethers_core::types::{
    self as eth, Address, BlockId, BlockNumber, Bytes, TransactionRequest, H256, U256, U64,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::{revert::classify_rpc_error, Ledger, LedgerError, TransactionReceipt};

/// Which family of development node sits behind the endpoint. Decides the
/// names of the cheat methods, or whether they exist at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeDialect {
    Hardhat,
    Anvil,
    #[default]
    Standard,
}

impl NodeDialect {
    fn cheat_prefix(self) -> Option<&'static str> {
        match self {
            Self::Hardhat => Some("hardhat"),
            Self::Anvil => Some("anvil"),
            Self::Standard => None,
        }
    }
}

impl FromStr for NodeDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hardhat" => Ok(Self::Hardhat),
            "anvil" => Ok(Self::Anvil),
            "standard" => Ok(Self::Standard),
            other => Err(format!("unknown node dialect \"{other}\"")),
        }
    }
}

impl fmt::Display for NodeDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardhat => write!(f, "hardhat"),
            Self::Anvil => write!(f, "anvil"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Minimal JSON-RPC 2.0 client over HTTP.
#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::blocking::Client,
    url: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, LedgerError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn request<P, R>(&self, method: &str, params: P) -> Result<R, LedgerError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target: "rpc", id, method, "request");
        let response: RpcResponse = self
            .http
            .post(self.url.clone())
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()?
            .error_for_status()?
            .json()?;

        if let Some(error) = response.error {
            let data = error.data.map(|data| match data {
                Value::String(data) => data,
                // hardhat nests the payload as `{ "data": "0x..", "message": .. }`
                Value::Object(ref object) => object
                    .get("data")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| data.to_string()),
                other => other.to_string(),
            });
            return Err(classify_rpc_error(error.code, error.message, data));
        }
        let result = response.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

/// Ledger reached over JSON-RPC.
#[derive(Debug)]
pub struct RpcLedger {
    client: RpcClient,
    dialect: NodeDialect,
    epoch: AtomicU64,
}

impl RpcLedger {
    pub fn new(client: RpcClient, dialect: NodeDialect) -> Self {
        Self {
            client,
            dialect,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn connect(url: Url, dialect: NodeDialect) -> Result<Self, LedgerError> {
        Ok(Self::new(
            RpcClient::new(url, Duration::from_secs(30))?,
            dialect,
        ))
    }

    /// Re-creates the fork from `fork_url` at `block`. Every identity acquired
    /// before the reset becomes stale.
    pub fn reset_fork(&self, fork_url: &Url, block: Option<u64>) -> Result<(), LedgerError> {
        let mut forking = json!({ "jsonRpcUrl": fork_url.as_str() });
        if let Some(block) = block {
            forking["blockNumber"] = json!(block);
        }
        let _: Value = self.request(&self.cheat("reset")?, [json!({ "forking": forking })])?;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(target: "rpc", epoch, block, "fork reset");
        Ok(())
    }

    fn cheat(&self, method: &str) -> Result<String, LedgerError> {
        match self.dialect.cheat_prefix() {
            Some(prefix) => Ok(format!("{prefix}_{method}")),
            None => Err(LedgerError::Unsupported(format!(
                "{method} on a {} node",
                self.dialect
            ))),
        }
    }

    fn request<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, LedgerError> {
        self.client.request(method, params)
    }
}

const NO_PARAMS: [(); 0] = [];

fn block_param(block: Option<u64>) -> BlockId {
    match block {
        Some(number) => BlockId::Number(BlockNumber::Number(U64::from(number))),
        None => BlockId::Number(BlockNumber::Latest),
    }
}

impl Ledger for RpcLedger {
    fn chain_id(&self) -> Result<u64, LedgerError> {
        let id: U64 = self.request("eth_chainId", NO_PARAMS)?;
        Ok(id.as_u64())
    }

    fn block_number(&self) -> Result<u64, LedgerError> {
        let number: U64 = self.request("eth_blockNumber", NO_PARAMS)?;
        Ok(number.as_u64())
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn balance(&self, address: Address, block: Option<u64>) -> Result<U256, LedgerError> {
        self.request("eth_getBalance", (address, block_param(block)))
    }

    fn nonce(&self, address: Address) -> Result<U256, LedgerError> {
        self.request(
            "eth_getTransactionCount",
            (address, BlockId::Number(BlockNumber::Pending)),
        )
    }

    fn gas_price(&self) -> Result<U256, LedgerError> {
        self.request("eth_gasPrice", NO_PARAMS)
    }

    fn code(&self, address: Address) -> Result<Bytes, LedgerError> {
        self.request("eth_getCode", (address, block_param(None)))
    }

    fn call(&self, tx: &TransactionRequest, block: Option<u64>) -> Result<Bytes, LedgerError> {
        self.request("eth_call", (tx, block_param(block)))
    }

    fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, LedgerError> {
        self.request("eth_estimateGas", [tx])
    }

    fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256, LedgerError> {
        self.request("eth_sendTransaction", [tx])
    }

    fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, LedgerError> {
        self.request("eth_sendRawTransaction", [raw])
    }

    fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, LedgerError> {
        let receipt: Option<eth::TransactionReceipt> =
            self.request("eth_getTransactionReceipt", [hash])?;
        receipt.map(TransactionReceipt::try_from).transpose()
    }

    fn impersonate(&self, address: Address) -> Result<(), LedgerError> {
        let _: Value = self.request(&self.cheat("impersonateAccount")?, [address])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_round_trips_through_str() {
        for dialect in [NodeDialect::Hardhat, NodeDialect::Anvil, NodeDialect::Standard] {
            assert_eq!(dialect.to_string().parse::<NodeDialect>(), Ok(dialect));
        }
        assert!("ganache".parse::<NodeDialect>().is_err());
    }

    #[test]
    fn standard_node_has_no_cheats() {
        let ledger = RpcLedger::connect(
            Url::parse("http://127.0.0.1:8545").unwrap(),
            NodeDialect::Standard,
        )
        .unwrap();
        let err = ledger.impersonate(Address::zero()).unwrap_err();
        assert!(matches!(err, LedgerError::Unsupported(_)));
        assert_eq!(ledger.epoch(), 0);
    }

    #[test]
    fn transport_errors_do_not_echo_the_endpoint() {
        let ledger = RpcLedger::connect(
            Url::parse("http://127.0.0.1:1/v2/SUPERSECRETKEY").unwrap(),
            NodeDialect::Standard,
        )
        .unwrap();
        let err = ledger.chain_id().unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
        assert!(!err.to_string().contains("SUPERSECRETKEY"), "{err}");
        assert!(!format!("{err:?}").contains("SUPERSECRETKEY"));
    }

    #[test]
    fn block_param_serializes_as_hex_quantity() {
        assert_eq!(
            serde_json::to_value(block_param(Some(16_969_691))).unwrap(),
            json!("0x102efdb")
        );
        assert_eq!(
            serde_json::to_value(block_param(None)).unwrap(),
            json!("latest")
        );
    }
}
