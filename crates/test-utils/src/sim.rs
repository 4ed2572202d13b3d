use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
};

use ethers_core::{
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, NameOrAddress, TransactionRequest,
        H256, U256,
    },
    utils::keccak256,
};
use ledger::{Ledger, LedgerError, ReceiptStatus, TransactionReceipt};

use crate::world::{gas_for, Code, Contract, DatStorage, DatVariant, Revert, World};

const DEFAULT_CHAIN_ID: u64 = 31_337;

struct PendingTx {
    hash: H256,
    from: Address,
    to: Option<Address>,
    value: U256,
    data: Vec<u8>,
    gas_limit: U256,
    gas_price: U256,
}

struct Chain {
    first_block: u64,
    /// State after each block; the last entry is the head.
    blocks: Vec<World>,
    receipts: HashMap<H256, TransactionReceipt>,
    pending: Vec<PendingTx>,
    impersonated: HashSet<Address>,
    automine: bool,
    gas_price: U256,
    submitted: u64,
}

impl Chain {
    fn head(&self) -> &World {
        &self.blocks[self.blocks.len() - 1]
    }

    fn head_mut(&mut self) -> &mut World {
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }

    fn head_number(&self) -> u64 {
        self.first_block + self.blocks.len() as u64 - 1
    }

    fn world_at(&self, block: Option<u64>) -> Result<&World, LedgerError> {
        let Some(block) = block else {
            return Ok(self.head());
        };
        block
            .checked_sub(self.first_block)
            .and_then(|index| self.blocks.get(index as usize))
            .ok_or_else(|| LedgerError::Rpc {
                code: -32000,
                message: format!("state for block {block} is not available"),
                data: None,
            })
    }

    fn pending_nonce(&self, address: Address) -> u64 {
        let queued = self.pending.iter().filter(|tx| tx.from == address).count() as u64;
        self.head().nonce(address) + queued
    }

    /// Mines every queued transaction, one block each.
    fn mine(&mut self) {
        for tx in std::mem::take(&mut self.pending) {
            let mut next = self.head().clone();
            let mut scratch = next.clone();
            let outcome = match tx.to {
                Some(to) => scratch.call(tx.from, to, tx.value, &tx.data).map(|_| None),
                None => scratch.create(tx.from, tx.value, &tx.data).map(Some),
            };
            let (status, contract_address) = match outcome {
                Ok(created) => {
                    next = scratch;
                    (ReceiptStatus::Success, created)
                }
                Err(Revert(reason)) => {
                    tracing::debug!(
                        target: "sim",
                        hash = %format!("{:#x}", tx.hash),
                        reason = reason.as_deref().unwrap_or("<none>"),
                        "transaction reverted"
                    );
                    (ReceiptStatus::Reverted, None)
                }
            };
            let gas_used = gas_for(tx.to, &tx.data).min(tx.gas_limit);
            next.bump_nonce(tx.from);
            next.charge(tx.from, gas_used * tx.gas_price);
            self.blocks.push(next);
            let receipt = TransactionReceipt {
                transaction_hash: tx.hash,
                block_number: self.head_number(),
                status,
                from: tx.from,
                to: tx.to,
                contract_address,
                gas_used,
                effective_gas_price: tx.gas_price,
            };
            self.receipts.insert(tx.hash, receipt);
        }
    }
}

/// An in-memory fork ledger.
///
/// Every transaction is mined into its own block, so a block number pins the
/// state right after one transaction. Cheat methods (impersonation, balance
/// overrides) are available unless the ledger is built
/// [`without_cheats`](SimLedger::without_cheats).
pub struct SimLedger {
    chain: RefCell<Chain>,
    epoch: Cell<u64>,
    chain_id: u64,
    cheats: bool,
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimLedger {
    pub fn new() -> Self {
        Self {
            chain: RefCell::new(Chain {
                first_block: 0,
                blocks: vec![World::default()],
                receipts: HashMap::new(),
                pending: Vec::new(),
                impersonated: HashSet::new(),
                automine: true,
                gas_price: U256::exp10(9),
                submitted: 0,
            }),
            epoch: Cell::new(0),
            chain_id: DEFAULT_CHAIN_ID,
            cheats: true,
        }
    }

    /// Behaves like a production node: no impersonation, no balance edits.
    pub fn without_cheats(mut self) -> Self {
        self.cheats = false;
        self
    }

    /// Numbers the initial state as block `number`, like a fork pinned there.
    pub fn starting_at_block(self, number: u64) -> Self {
        self.chain.borrow_mut().first_block = number;
        self
    }

    /// Drops everything mined since the initial state and invalidates
    /// identities, as re-forking does.
    pub fn reset(&self) {
        let mut chain = self.chain.borrow_mut();
        chain.blocks.truncate(1);
        chain.pending.clear();
        chain.receipts.clear();
        chain.impersonated.clear();
        self.epoch.set(self.epoch.get() + 1);
    }

    pub fn set_automine(&self, automine: bool) {
        self.chain.borrow_mut().automine = automine;
    }

    pub fn mine(&self) {
        self.chain.borrow_mut().mine();
    }

    pub fn set_gas_price(&self, price: U256) {
        self.chain.borrow_mut().gas_price = price;
    }

    /// Transactions accepted so far, mined or not.
    pub fn submitted_transactions(&self) -> u64 {
        self.chain.borrow().submitted
    }

    pub fn fund(&self, address: Address, amount: U256) {
        self.chain.borrow_mut().head_mut().balances.insert(address, amount);
    }

    pub fn install_dat(&self, address: Address, variant: DatVariant, storage: DatStorage) {
        let mut contract = Contract::new(Code::Dat(variant));
        contract.dat = storage;
        self.install(address, contract);
    }

    /// Places a transparent proxy in front of `implementation`. The proxy
    /// keeps its own DAT storage.
    pub fn install_proxy(
        &self,
        address: Address,
        implementation: Address,
        admin: Address,
        storage: DatStorage,
    ) {
        let mut contract = Contract::new(Code::Proxy {
            implementation,
            admin,
            frozen: false,
        });
        contract.dat = storage;
        self.install(address, contract);
    }

    pub fn install_proxy_admin(&self, address: Address, owner: Address) {
        self.install(address, Contract::new(Code::ProxyAdmin { owner }));
    }

    pub fn install_erc20(&self, address: Address) {
        self.install(address, Contract::new(Code::Erc20));
    }

    pub fn set_token_balance(&self, token: Address, holder: Address, amount: U256) {
        let mut chain = self.chain.borrow_mut();
        if let Some(contract) = chain.head_mut().contracts.get_mut(&token) {
            contract.tokens.insert(holder, amount);
        }
    }

    /// Mints `amount` of the DAT held in `contract`'s storage to `holder`.
    pub fn credit_dat(&self, contract: Address, holder: Address, amount: U256) {
        let mut chain = self.chain.borrow_mut();
        if let Some(contract) = chain.head_mut().contracts.get_mut(&contract) {
            contract.dat.credit(holder, amount);
        }
    }

    pub fn token_balance(&self, token: Address, holder: Address) -> U256 {
        self.chain
            .borrow()
            .head()
            .token_balance(token, holder)
            .unwrap_or_default()
    }

    /// Makes `proxy` accept upgrades without switching implementation.
    pub fn freeze_proxy(&self, proxy: Address) {
        let mut chain = self.chain.borrow_mut();
        if let Some(Contract {
            code: Code::Proxy { frozen, .. },
            ..
        }) = chain.head_mut().contracts.get_mut(&proxy)
        {
            *frozen = true;
        }
    }

    pub fn dat_storage(&self, address: Address) -> Option<DatStorage> {
        self.chain
            .borrow()
            .head()
            .contracts
            .get(&address)
            .map(|contract| contract.dat.clone())
    }

    fn install(&self, address: Address, contract: Contract) {
        self.chain
            .borrow_mut()
            .head_mut()
            .contracts
            .insert(address, contract);
    }

    fn cheat(&self, name: &str) -> Result<(), LedgerError> {
        if self.cheats {
            Ok(())
        } else {
            Err(LedgerError::Unsupported(format!("{name} on a production node")))
        }
    }

    fn simulate(
        &self,
        tx: &TransactionRequest,
        block: Option<u64>,
    ) -> Result<Vec<u8>, LedgerError> {
        let chain = self.chain.borrow();
        let mut world = chain.world_at(block)?.clone();
        let from = tx.from.unwrap_or_default();
        let value = tx.value.unwrap_or_default();
        let data = tx.data.as_ref().map(|data| data.to_vec()).unwrap_or_default();
        let outcome = match recipient(tx) {
            Some(to) => world.call(from, to, value, &data),
            None => world.create(from, value, &data).map(|_| Vec::new()),
        };
        outcome.map_err(|Revert(reason)| LedgerError::Reverted { reason })
    }

    fn enqueue(
        &self,
        from: Address,
        nonce: Option<U256>,
        tx: &TransactionRequest,
        hash: H256,
    ) -> Result<H256, LedgerError> {
        let mut chain = self.chain.borrow_mut();
        let expected = chain.pending_nonce(from);
        if let Some(nonce) = nonce {
            if nonce != U256::from(expected) {
                return Err(rpc_error(format!(
                    "nonce mismatch for {from:#x}: expected {expected}, got {nonce}"
                )));
            }
        }
        let to = recipient(tx);
        let data = tx.data.as_ref().map(|data| data.to_vec()).unwrap_or_default();
        let value = tx.value.unwrap_or_default();
        let gas_limit = tx.gas.unwrap_or_else(|| gas_for(to, &data));
        let gas_price = tx.gas_price.unwrap_or(chain.gas_price);
        let cost = value + gas_limit * gas_price;
        if chain.head().balance(from) < cost {
            return Err(rpc_error(format!(
                "sender doesn't have enough funds to send tx. The max upfront cost is: {cost} \
                 and the sender's account only has: {}",
                chain.head().balance(from)
            )));
        }
        chain.pending.push(PendingTx {
            hash,
            from,
            to,
            value,
            data,
            gas_limit,
            gas_price,
        });
        chain.submitted += 1;
        if chain.automine {
            chain.mine();
        }
        Ok(hash)
    }
}

fn recipient(tx: &TransactionRequest) -> Option<Address> {
    match tx.to {
        Some(NameOrAddress::Address(address)) => Some(address),
        _ => None,
    }
}

fn rpc_error(message: String) -> LedgerError {
    LedgerError::Rpc {
        code: -32000,
        message,
        data: None,
    }
}

impl Ledger for SimLedger {
    fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.chain_id)
    }

    fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.chain.borrow().head_number())
    }

    fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    fn balance(&self, address: Address, block: Option<u64>) -> Result<U256, LedgerError> {
        Ok(self.chain.borrow().world_at(block)?.balance(address))
    }

    fn nonce(&self, address: Address) -> Result<U256, LedgerError> {
        Ok(self.chain.borrow().pending_nonce(address).into())
    }

    fn gas_price(&self) -> Result<U256, LedgerError> {
        Ok(self.chain.borrow().gas_price)
    }

    fn code(&self, address: Address) -> Result<Bytes, LedgerError> {
        let chain = self.chain.borrow();
        Ok(chain
            .head()
            .contracts
            .get(&address)
            .map(|contract| Bytes::from(contract.code.bytes()))
            .unwrap_or_default())
    }

    fn call(&self, tx: &TransactionRequest, block: Option<u64>) -> Result<Bytes, LedgerError> {
        self.simulate(tx, block).map(Bytes::from)
    }

    fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, LedgerError> {
        self.simulate(tx, None)?;
        let data = tx.data.as_ref().map(|data| data.to_vec()).unwrap_or_default();
        Ok(gas_for(recipient(tx), &data))
    }

    fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256, LedgerError> {
        let from = tx
            .from
            .ok_or_else(|| rpc_error("transaction without sender".to_string()))?;
        if !self.chain.borrow().impersonated.contains(&from) {
            return Err(rpc_error(format!("unknown account {from:#x}")));
        }
        let mut preimage = from.as_bytes().to_vec();
        preimage.extend_from_slice(&self.submitted_transactions().to_be_bytes());
        preimage.extend_from_slice(&self.epoch.get().to_be_bytes());
        let hash = H256::from(keccak256(preimage));
        self.enqueue(from, tx.nonce, tx, hash)
    }

    fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, LedgerError> {
        let (typed, signature) = TypedTransaction::decode_signed(&rlp::Rlp::new(&raw))
            .map_err(|err| LedgerError::Decode(err.to_string()))?;
        let from = signature
            .recover(typed.sighash())
            .map_err(|err| LedgerError::Signing(err.to_string()))?;
        let request = TransactionRequest {
            from: Some(from),
            to: typed.to().cloned(),
            value: typed.value().copied(),
            data: typed.data().cloned(),
            gas: typed.gas().copied(),
            gas_price: typed.gas_price(),
            nonce: typed.nonce().copied(),
            chain_id: typed.chain_id(),
            ..Default::default()
        };
        let hash = H256::from(keccak256(&raw));
        self.enqueue(from, request.nonce, &request, hash)
    }

    fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, LedgerError> {
        Ok(self.chain.borrow().receipts.get(&hash).cloned())
    }

    fn impersonate(&self, address: Address) -> Result<(), LedgerError> {
        self.cheat("impersonation")?;
        self.chain.borrow_mut().impersonated.insert(address);
        Ok(())
    }
}
