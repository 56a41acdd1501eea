//! Core type definitions for Pergamon

// Not every type is used in the pergamon_common crate itself
#![allow(dead_code)]

use crate::crypto::blake2b_256;
use crate::hash::Hash32;

/// Block hash digest
pub type BlockHash = Hash32;

/// Transaction hash digest
pub type TxHash = Hash32;

/// Base58 account address
pub type Address = String;

/// Network peer identifier
pub type PeerId = String;

/// Serialized overhead of a transaction envelope on top of its payload
const TX_BASE_SIZE: u64 = 72;

/// Transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TxKind {
    /// Ordinary value transfer
    Transfer,
    /// Consensus deposit (locks funds while an agent is registered)
    Deposit,
    /// Block reward, always first in a block
    Coinbase,
    /// Penalty for missed packing slots
    YellowPunish,
    /// Penalty for provable misbehaviour
    RedPunish,
}

impl TxKind {
    /// System transactions are produced by the packer itself, never relayed
    /// from the pending pool.
    pub fn is_system(&self) -> bool {
        matches!(self, TxKind::Coinbase | TxKind::YellowPunish | TxKind::RedPunish)
    }
}

/// A transaction as the consensus engine sees it.
///
/// The payload is opaque here; UTXO semantics live in the ledger
/// collaborator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub hash: TxHash,
    pub kind: TxKind,
    /// Declared creation time, milliseconds since the epoch
    pub time: u64,
    /// Serialized size in bytes
    pub size: u64,
    pub payload: Vec<u8>,
    /// Producer signature for system transactions; relayed transactions
    /// carry their witness data inside the payload
    pub signature: Vec<u8>,
}

impl Transaction {
    pub fn new(kind: TxKind, time: u64, payload: Vec<u8>) -> Self {
        let size = TX_BASE_SIZE + payload.len() as u64;
        let hash = Self::compute_hash(kind, time, &payload);
        Self {
            hash,
            kind,
            time,
            size,
            payload,
            signature: Vec::new(),
        }
    }

    /// Integrity check: the declared hash matches the content digest
    pub fn hash_matches(&self) -> bool {
        self.hash == Self::compute_hash(self.kind, self.time, &self.payload)
    }

    fn compute_hash(kind: TxKind, time: u64, payload: &[u8]) -> TxHash {
        let mut data = Vec::with_capacity(payload.len() + 9);
        data.push(match kind {
            TxKind::Transfer => 1u8,
            TxKind::Deposit => 2,
            TxKind::Coinbase => 3,
            TxKind::YellowPunish => 4,
            TxKind::RedPunish => 5,
        });
        data.extend_from_slice(&time.to_be_bytes());
        data.extend_from_slice(payload);
        blake2b_256(&data)
    }
}

/// Round placement recorded in every block header
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoundMetadata {
    pub round_index: u64,
    /// Round start, milliseconds since the epoch
    pub round_start_time: u64,
    pub member_count: u16,
    /// Packing slot of the producer within the round
    pub member_index: u16,
}

/// Full block header
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub height: u64,
    /// Production time, milliseconds since the epoch
    pub time: u64,
    pub merkle_root: Hash32,
    pub packer_address: Address,
    pub round: RoundMetadata,
    /// Producer signature over the header hash; verified by the account
    /// collaborator, carried opaquely here
    pub signature: Vec<u8>,
}

impl BlockHeader {
    /// Digest over the identifying fields (everything except `hash` and
    /// `signature`).
    pub fn compute_hash(&self) -> BlockHash {
        let mut data = Vec::new();
        data.extend_from_slice(self.parent_hash.as_ref());
        data.extend_from_slice(&self.height.to_be_bytes());
        data.extend_from_slice(&self.time.to_be_bytes());
        data.extend_from_slice(self.merkle_root.as_ref());
        data.extend_from_slice(self.packer_address.as_bytes());
        data.extend_from_slice(&self.round.round_index.to_be_bytes());
        data.extend_from_slice(&self.round.round_start_time.to_be_bytes());
        data.extend_from_slice(&self.round.member_count.to_be_bytes());
        data.extend_from_slice(&self.round.member_index.to_be_bytes());
        blake2b_256(&data)
    }
}

/// Minimal immutable record identifying a header within a candidate chain.
///
/// Equality is (height, hash); the timestamp only breaks selection ties.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HeaderDigest {
    pub hash: BlockHash,
    pub height: u64,
    /// Production time, milliseconds since the epoch
    pub time: u64,
}

impl HeaderDigest {
    pub fn new(hash: BlockHash, height: u64, time: u64) -> Self {
        Self { hash, height, time }
    }
}

impl From<&BlockHeader> for HeaderDigest {
    fn from(header: &BlockHeader) -> Self {
        Self::new(header.hash, header.height, header.time)
    }
}

impl PartialEq for HeaderDigest {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height && self.hash == other.hash
    }
}

impl Eq for HeaderDigest {}

impl std::hash::Hash for HeaderDigest {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.height.hash(state);
        self.hash.hash(state);
    }
}

/// Full block
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// Broadcast form of a freshly produced block: full system transactions,
/// hashes only for the rest (peers already hold them in their pools).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompactBlock {
    pub header: BlockHeader,
    pub system_txs: Vec<Transaction>,
    pub tx_hashes: Vec<TxHash>,
}

impl From<&Block> for CompactBlock {
    fn from(block: &Block) -> Self {
        Self {
            header: block.header.clone(),
            system_txs: block
                .transactions
                .iter()
                .filter(|tx| tx.kind.is_system())
                .cloned()
                .collect(),
            tx_hashes: block.transactions.iter().map(|tx| tx.hash).collect(),
        }
    }
}

/// Live validator-set entry supplied by the agent registry collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentInfo {
    pub agent_address: Address,
    pub packing_address: Address,
    /// Locked deposit, in the smallest currency unit
    pub deposit: u64,
    /// Credit rating in [0, 1]
    pub credit_weight: f64,
}

/// Evidence for a red punishment, keyed by the height it targets
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RedPunishData {
    pub agent_address: Address,
    pub height: u64,
    pub reason_code: u8,
}

/// Payload of a yellow-punish transaction: every agent whose slot was
/// missed before this block
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct YellowPunishData {
    pub agent_addresses: Vec<Address>,
    pub height: u64,
}

/// Payload of a coinbase transaction; reward distribution happens in the
/// ledger collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoinbaseData {
    pub agent_address: Address,
    pub packing_address: Address,
    pub height: u64,
}

/// Synchronization state reported by the sync collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SyncStatus {
    InProgress,
    Complete,
}

/// Local signing credential supplied by the account collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SigningAccount {
    pub address: Address,
    pub packing_address: Address,
}

/// One packing slot assignment within a round
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoundMember {
    pub agent_address: Address,
    pub packing_address: Address,
    pub slot_index: u16,
    /// Slot open time, milliseconds since the epoch
    pub pack_start_time: u64,
    /// Slot close time, milliseconds since the epoch
    pub pack_end_time: u64,
    pub credit_weight: f64,
}

/// A fixed-duration packing round.
///
/// Built wholly and replaced atomically at each boundary or reset; never
/// mutated in place.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Round {
    pub index: u64,
    /// Milliseconds since the epoch
    pub start_time: u64,
    pub end_time: u64,
    pub members: Vec<RoundMember>,
    /// Slot of the local packer, cached at construction
    pub local_member_index: Option<u16>,
}

impl Round {
    pub fn member_count(&self) -> u16 {
        self.members.len() as u16
    }

    pub fn member(&self, slot_index: u16) -> Option<&RoundMember> {
        self.members.get(slot_index as usize)
    }

    pub fn member_by_packing_address(&self, address: &str) -> Option<&RoundMember> {
        self.members.iter().find(|m| m.packing_address == address)
    }

    /// The cached local packer, if this node holds a slot this round
    pub fn local_member(&self) -> Option<&RoundMember> {
        self.local_member_index.and_then(|i| self.member(i))
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.end_time
    }
}

/// Summary answered on the chain query topic
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChainStatus {
    pub chain_count: usize,
    pub approving_tip: Option<HeaderDigest>,
    pub max_height: u64,
}
