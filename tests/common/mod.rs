//! In-memory chain serving storage reads and real Merkle Patricia proofs.
#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use eth_trie::{EthTrie, MemoryDB, Trie};
use ethers::{
    types::{Address, Bytes, EIP1186ProofResponse, StorageProof, H256, U256, U64},
    utils::keccak256,
};
use tokenproof::{
    slot::{array_element_slot, map_slot},
    utils::u256_to_h256,
    BlockRef, ChainDataPort, ChainError, RequestContext,
};
use tokenproof_verify::eip1186::Account;

pub const LATEST_BLOCK: u64 = 17_190_873;

pub fn token() -> Address {
    Address::repeat_byte(0x7a)
}

pub fn holder() -> Address {
    Address::repeat_byte(0x42)
}

/// One token contract on a chain that never advances.
pub struct MockChain {
    pub decimals: u8,
    pub balances: HashMap<Address, U256>,
    /// Storage of the token at the latest block.
    pub storage: BTreeMap<H256, U256>,
    /// Storage of the token for reads pinned to a block. Falls back to `storage`.
    pub historical: Option<BTreeMap<H256, U256>>,
    /// Proofs claim a value one higher than the trie holds.
    pub tamper_proof_value: bool,
    storage_reads: AtomicUsize,
    proof_requests: AtomicUsize,
}

impl MockChain {
    pub fn new(decimals: u8) -> Self {
        MockChain {
            decimals,
            balances: HashMap::new(),
            storage: BTreeMap::new(),
            historical: None,
            tamper_proof_value: false,
            storage_reads: AtomicUsize::new(0),
            proof_requests: AtomicUsize::new(0),
        }
    }

    /// Sets balanceOf for a holder.
    pub fn with_balance(mut self, holder: Address, raw: u64) -> Self {
        self.balances.insert(holder, U256::from(raw));
        self
    }

    /// Stores `value` for `holder` in a balance mapping declared at `position`.
    pub fn with_map_entry(mut self, holder: Address, position: usize, value: u64) -> Self {
        let slot = map_slot(holder.as_bytes(), position).unwrap();
        self.storage.insert(slot, U256::from(value));
        self
    }

    /// Stores a MiniMe checkpoint list `(from_block, value)` for `holder` at `position`.
    pub fn with_checkpoints(
        mut self,
        holder: Address,
        position: usize,
        checkpoints: &[(u128, u128)],
    ) -> Self {
        write_checkpoints(&mut self.storage, holder, position, checkpoints);
        self
    }

    pub fn storage_reads(&self) -> usize {
        self.storage_reads.load(Ordering::SeqCst)
    }

    pub fn proof_requests(&self) -> usize {
        self.proof_requests.load(Ordering::SeqCst)
    }

    fn pinned_storage(&self) -> &BTreeMap<H256, U256> {
        self.historical.as_ref().unwrap_or(&self.storage)
    }

    fn account(&self) -> Account {
        Account {
            nonce: U64::from(1),
            balance: U256::zero(),
            storage_hash: trie_root(&mut storage_trie(self.pinned_storage())),
            code_hash: H256(keccak256([0x60u8, 0x80, 0x60, 0x40])),
        }
    }

    /// Token account plus a few unrelated accounts so the state trie branches.
    fn state_trie(&self) -> EthTrie<MemoryDB> {
        let mut trie = empty_trie();
        let mut accounts = vec![(token(), self.account())];
        for byte in [0x01u8, 0x02, 0x03] {
            let other = Account {
                nonce: U64::from(byte),
                balance: U256::from(byte) * U256::exp10(18),
                storage_hash: trie_root(&mut empty_trie()),
                code_hash: H256(keccak256(b"")),
            };
            accounts.push((Address::repeat_byte(byte), other));
        }
        for (address, account) in accounts {
            trie.insert(&keccak256(address), &rlp::encode(&account)).unwrap();
        }
        trie
    }

    pub fn state_root(&self) -> H256 {
        trie_root(&mut self.state_trie())
    }
}

pub fn write_checkpoints(
    storage: &mut BTreeMap<H256, U256>,
    holder: Address,
    position: usize,
    checkpoints: &[(u128, u128)],
) {
    let length_slot = map_slot(holder.as_bytes(), position).unwrap();
    storage.insert(length_slot, U256::from(checkpoints.len()));
    for (index, (from_block, value)) in checkpoints.iter().enumerate() {
        let word = (U256::from(*value) << 128) + U256::from(*from_block);
        storage.insert(array_element_slot(length_slot, U256::from(index)), word);
    }
}

#[async_trait]
impl ChainDataPort for MockChain {
    async fn decimals(
        &self,
        _: &RequestContext,
        requested: Address,
    ) -> Result<u8, ChainError> {
        assert_eq!(requested, token());
        Ok(self.decimals)
    }

    async fn balance_of(
        &self,
        _: &RequestContext,
        _: Address,
        holder: Address,
    ) -> Result<U256, ChainError> {
        Ok(self.balances.get(&holder).copied().unwrap_or_default())
    }

    async fn storage_at(
        &self,
        _: &RequestContext,
        _: Address,
        key: H256,
        block: Option<u64>,
    ) -> Result<H256, ChainError> {
        self.storage_reads.fetch_add(1, Ordering::SeqCst);
        let storage = match block {
            Some(_) => self.pinned_storage(),
            None => &self.storage,
        };
        Ok(u256_to_h256(storage.get(&key).copied().unwrap_or_default()))
    }

    async fn block(
        &self,
        _: &RequestContext,
        number: Option<u64>,
    ) -> Result<BlockRef, ChainError> {
        let number = number.unwrap_or(LATEST_BLOCK);
        Ok(BlockRef {
            number,
            hash: Some(H256(keccak256(number.to_be_bytes()))),
            state_root: self.state_root(),
        })
    }

    async fn proof(
        &self,
        _: &RequestContext,
        token: Address,
        keys: &[H256],
        _: u64,
    ) -> Result<EIP1186ProofResponse, ChainError> {
        self.proof_requests.fetch_add(1, Ordering::SeqCst);
        let storage = self.pinned_storage();
        let mut trie = storage_trie(storage);
        trie_root(&mut trie);
        let storage_proof = keys
            .iter()
            .map(|key| {
                let mut value = storage.get(key).copied().unwrap_or_default();
                if self.tamper_proof_value {
                    value += U256::one();
                }
                StorageProof {
                    key: U256::from_big_endian(key.as_bytes()),
                    proof: trie_proof(&mut trie, &keccak256(key)),
                    value,
                }
            })
            .collect();
        let account = self.account();
        let mut state = self.state_trie();
        trie_root(&mut state);
        Ok(EIP1186ProofResponse {
            address: token,
            balance: account.balance,
            code_hash: account.code_hash,
            nonce: account.nonce,
            storage_hash: account.storage_hash,
            account_proof: trie_proof(&mut state, &keccak256(token)),
            storage_proof,
        })
    }
}

fn empty_trie() -> EthTrie<MemoryDB> {
    EthTrie::new(Arc::new(MemoryDB::new(true)))
}

/// Zero values are absent from a storage trie.
fn storage_trie(storage: &BTreeMap<H256, U256>) -> EthTrie<MemoryDB> {
    let mut trie = empty_trie();
    for (slot, value) in storage.iter().filter(|(_, value)| !value.is_zero()) {
        trie.insert(&keccak256(slot), &rlp::encode(value)).unwrap();
    }
    trie
}

/// Commits pending inserts.
fn trie_root(trie: &mut EthTrie<MemoryDB>) -> H256 {
    H256::from_slice(trie.root_hash().unwrap().as_bytes())
}

/// Nodes from the root down to `path`.
fn trie_proof(trie: &mut EthTrie<MemoryDB>, path: &[u8; 32]) -> Vec<Bytes> {
    trie.get_proof(path)
        .unwrap()
        .into_iter()
        .map(Bytes::from)
        .collect()
}
