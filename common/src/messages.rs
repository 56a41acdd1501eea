//! Definition of Pergamon messages

// We don't use these messages in the pergamon_common crate itself
#![allow(dead_code)]

use crate::types::*;

// Caryatid core messages
use caryatid_module_clock::messages::ClockTickMessage;

/// Header observed message — from the network interface or from the local
/// block producer (self-observed)
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct HeaderAvailableMessage {
    pub header: BlockHeader,
}

/// Header rescinded message — the block behind this header was invalidated
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct HeaderRescindedMessage {
    pub hash: BlockHash,
}

/// Advice that the block at this height trails the approving tip by the
/// confirmation depth and may be committed to durable storage
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct CommitAdvisedMessage {
    pub height: u64,
    pub hash: BlockHash,
}

/// Local notice that this node produced a block
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockProducedMessage {
    pub header: BlockHeader,
}

/// Transactions relayed into the pending pool
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct TxReceivedMessage {
    pub txs: Vec<Transaction>,
}

/// Chain lifecycle messages
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ChainMessage {
    HeaderAvailable(HeaderAvailableMessage),
    HeaderRescinded(HeaderRescindedMessage),
    CommitAdvised(CommitAdvisedMessage),
    BlockProduced(BlockProducedMessage),
}

/// Consensus input messages
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ConsensusMessage {
    TxReceived(TxReceivedMessage),
    RedPunishEvidence(RedPunishData),
}

/// Operational commands, fanned out to every module that owns a cache
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum CommandMessage {
    ClearCache,
}

// === Queries ===

/// Queries answered by the chain selection module
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ChainQuery {
    GetApprovingChain,
    GetBlockHash { height: u64 },
    GetChainStatus,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ChainQueryResponse {
    ApprovingChain(Vec<HeaderDigest>),
    BlockHash(Option<BlockHash>),
    ChainStatus(ChainStatus),
    /// No approving chain yet — callers treat as unknown, not error
    NotReady,
    Error(String),
}

/// Queries answered by the block producer module
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum RoundQuery {
    GetCurrentRound,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum RoundQueryResponse {
    CurrentRound(Round),
    /// No round computed yet
    NotReady,
    Error(String),
}

/// Requests to the ledger collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum LedgerQuery {
    GetTransaction { hash: TxHash },
    /// Speculative application against pending state; fails on invalid
    Apply { tx: Transaction, height: u64 },
    Rollback { tx: Transaction, block_hash: BlockHash },
    /// Lock the deposit funds behind a deposit transaction
    LockFunds { tx: Transaction },
    UnlockFunds { tx: Transaction },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum LedgerQueryResponse {
    Transaction(Option<Transaction>),
    Applied,
    RolledBack,
    Locked,
    Unlocked,
    Error(String),
}

/// Requests to the block store collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum BlockQuery {
    GetBestBlock,
    /// Undo a stored block during a reorganization; fails on storage error
    Rollback { hash: BlockHash },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum BlockQueryResponse {
    BestBlock(Block),
    RolledBack,
    Error(String),
}

/// Requests to the network collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum NetworkQuery {
    GetAvailablePeers,
    Broadcast(CompactBlock),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum NetworkQueryResponse {
    Peers(Vec<PeerId>),
    /// Peers the broadcast reached
    Broadcasted(Vec<PeerId>),
    Error(String),
}

/// Requests to the sync collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum SyncQuery {
    GetStatus,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum SyncQueryResponse {
    Status(SyncStatus),
    Error(String),
}

/// Requests to the account collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum AccountQuery {
    GetPackingAccount,
    SignDigest { digest: Vec<u8> },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum AccountQueryResponse {
    PackingAccount(Option<SigningAccount>),
    Signature(Vec<u8>),
    Error(String),
}

/// Requests to the agent registry collaborator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum AgentQuery {
    GetAgents,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum AgentQueryResponse {
    /// Credit-ranked live validator set
    Agents(Vec<AgentInfo>),
    Error(String),
}

/// Query requests, by answering domain
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum StateQuery {
    Chain(ChainQuery),
    Round(RoundQuery),
    Ledger(LedgerQuery),
    Blocks(BlockQuery),
    Network(NetworkQuery),
    Sync(SyncQuery),
    Accounts(AccountQuery),
    Agents(AgentQuery),
}

/// Query responses, by answering domain
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum StateQueryResponse {
    Chain(ChainQueryResponse),
    Round(RoundQueryResponse),
    Ledger(LedgerQueryResponse),
    Blocks(BlockQueryResponse),
    Network(NetworkQueryResponse),
    Sync(SyncQueryResponse),
    Accounts(AccountQueryResponse),
    Agents(AgentQueryResponse),
}

// === Global message enum ===
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Message {
    None(()),                                  // Just so we have a simple default

    // Generic messages, get of jail free cards
    String(String),                            // Simple string
    JSON(serde_json::Value),                   // JSON object

    // Caryatid standard messages
    Clock(ClockTickMessage),                   // Clock tick

    // Pergamon messages
    Chain(ChainMessage),                       // Header/chain lifecycle
    Consensus(ConsensusMessage),               // Punishment evidence
    Command(CommandMessage),                   // Operational commands
    StateQuery(StateQuery),                    // Queries
    StateQueryResponse(StateQueryResponse),    // Query responses
}

impl Default for Message {
    fn default() -> Self {
        Self::None(())
    }
}

// Casts from specific messages
impl From<ClockTickMessage> for Message {
    fn from(msg: ClockTickMessage) -> Self {
        Message::Clock(msg)
    }
}

impl From<ChainMessage> for Message {
    fn from(msg: ChainMessage) -> Self {
        Message::Chain(msg)
    }
}

impl From<ConsensusMessage> for Message {
    fn from(msg: ConsensusMessage) -> Self {
        Message::Consensus(msg)
    }
}

impl From<CommandMessage> for Message {
    fn from(msg: CommandMessage) -> Self {
        Message::Command(msg)
    }
}

impl From<StateQuery> for Message {
    fn from(msg: StateQuery) -> Self {
        Message::StateQuery(msg)
    }
}

impl From<StateQueryResponse> for Message {
    fn from(msg: StateQueryResponse) -> Self {
        Message::StateQueryResponse(msg)
    }
}
