//! Block assembly: transaction selection, speculative application, system
//! transaction injection, and full verification with rollback on failure.

use anyhow::Result;
use caryatid_sdk::async_trait;
use pergamon_common::{
    crypto::merkle_root,
    params::ConsensusParams,
    Address, Block, BlockHash, BlockHeader, CoinbaseData, RedPunishData, Round, RoundMember,
    RoundMetadata, SigningAccount, Transaction, TxHash, TxKind, YellowPunishData,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Stop selecting pending transactions this close to the slot end
const SELECT_TIME_FLOOR_MS: u64 = 500;
/// Stop admitting orphans this close to the slot end
const ORPHAN_TIME_FLOOR_MS: u64 = 100;

/// Ledger collaborator seam: speculative application and rollback of
/// transactions, plus deposit fund locking.
#[async_trait]
pub trait LedgerAccess: Send + Sync {
    async fn apply(&self, tx: &Transaction, height: u64) -> Result<()>;
    async fn rollback(&self, tx: &Transaction, block_hash: &BlockHash) -> Result<()>;
    async fn lock_funds(&self, tx: &Transaction) -> Result<()>;
    async fn unlock_funds(&self, tx: &Transaction) -> Result<()>;
}

/// Account collaborator seam: signing with the local packing credential
#[async_trait]
pub trait SignerAccess: Send + Sync {
    async fn sign(&self, digest: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("merkle root does not match transaction set")]
    MerkleMismatch,

    #[error("header hash does not match header content")]
    HashMismatch,

    #[error("coinbase missing, duplicated or misplaced")]
    CoinbaseMisplaced,

    #[error("cumulative transaction size {got} exceeds limit {limit}")]
    Oversize { got: u64, limit: u64 },

    #[error("transaction {0} failed integrity check")]
    TxIntegrity(TxHash),

    #[error("header is unsigned")]
    UnsignedHeader,

    #[error("header does not extend the best block")]
    BadParent,
}

/// Everything the packer needs for one assembly attempt
pub struct PackRequest<'a> {
    pub best_header: &'a BlockHeader,
    pub round: &'a Round,
    pub member: &'a RoundMember,
    pub account: &'a SigningAccount,
    /// Pending pool snapshot, any order
    pub pending: Vec<Transaction>,
    /// Orphan pool snapshot, any order
    pub orphans: Vec<Transaction>,
    /// All pending red-punish evidence; stale entries are discarded
    pub red_punish: Vec<RedPunishData>,
    /// Agents whose slots were missed since the last observed block
    pub missed_agents: Vec<Address>,
}

/// Result of one assembly attempt.
///
/// `block` is None when verification failed and the slot was abandoned;
/// pool bookkeeping still applies.
pub struct PackOutcome {
    pub block: Option<Block>,
    /// Every pending transaction examined — drop from the pending pool
    /// whether admitted or not
    pub examined_pending: Vec<TxHash>,
    /// Orphans admitted into the block — drop from the orphan pool
    pub admitted_orphans: Vec<TxHash>,
    /// Red-punish heights consumed (included or stale)
    pub consumed_punish_heights: Vec<u64>,
}

/// The assembly pipeline, generic over the collaborator seams
pub struct Assembler<'a> {
    pub ledger: &'a dyn LedgerAccess,
    pub signer: &'a dyn SignerAccess,
    pub params: &'a ConsensusParams,
    /// Wall clock in milliseconds; injected for testability
    pub clock: &'a (dyn Fn() -> u64 + Send + Sync),
}

impl<'a> Assembler<'a> {
    /// Run the full packing protocol for one slot.
    pub async fn pack(&self, request: PackRequest<'_>) -> Result<PackOutcome> {
        let height = request.best_header.height + 1;
        let member = request.member;

        let mut applied: Vec<Transaction> = Vec::new();
        let mut total_size = 0u64;
        let mut examined_pending = Vec::new();
        let mut admitted_orphans = Vec::new();

        // Select pending transactions, earliest declared time first
        let mut pending = request.pending;
        pending.sort_by_key(|tx| tx.time);
        for tx in pending {
            if member.pack_end_time.saturating_sub((self.clock)()) <= SELECT_TIME_FLOOR_MS {
                break;
            }
            if total_size + tx.size >= self.params.max_block_size {
                break;
            }
            examined_pending.push(tx.hash);
            if self.admit(&tx, height).await {
                total_size += tx.size;
                applied.push(tx);
            }
        }

        // Opportunistically admit orphans while budget remains
        if total_size < self.params.max_block_size {
            let mut orphans = request.orphans;
            orphans.sort_by_key(|tx| tx.time);
            for tx in orphans {
                if member.pack_end_time.saturating_sub((self.clock)()) <= ORPHAN_TIME_FLOOR_MS {
                    break;
                }
                if total_size + tx.size >= self.params.max_block_size {
                    break;
                }
                if self.admit(&tx, height).await {
                    total_size += tx.size;
                    admitted_orphans.push(tx.hash);
                    applied.push(tx);
                }
            }
        }

        // System transactions: red punishments, then yellow, coinbase first
        let now = (self.clock)();
        let mut consumed_punish_heights = Vec::new();
        let mut system: Vec<Transaction> = Vec::new();
        for data in &request.red_punish {
            consumed_punish_heights.push(data.height);
            if data.height < height {
                debug!(target_height = data.height, "dropping stale red punish evidence");
                continue;
            }
            match self.build_system_tx(TxKind::RedPunish, now, serde_json::to_vec(data)?).await {
                Ok(tx) => system.push(tx),
                Err(e) => {
                    warn!("Failed to build red punish transaction: {e}");
                    self.rollback_applied(&applied, &BlockHash::ZERO).await;
                    return Ok(abandoned(examined_pending, admitted_orphans));
                }
            }
        }
        if !request.missed_agents.is_empty() {
            let data = YellowPunishData {
                agent_addresses: request.missed_agents.clone(),
                height,
            };
            match self.build_system_tx(TxKind::YellowPunish, now, serde_json::to_vec(&data)?).await
            {
                Ok(tx) => system.push(tx),
                Err(e) => {
                    warn!("Failed to build yellow punish transaction: {e}");
                    self.rollback_applied(&applied, &BlockHash::ZERO).await;
                    return Ok(abandoned(examined_pending, admitted_orphans));
                }
            }
        }
        let coinbase_data = CoinbaseData {
            agent_address: request.member.agent_address.clone(),
            packing_address: request.account.packing_address.clone(),
            height,
        };
        let coinbase = match self
            .build_system_tx(TxKind::Coinbase, now, serde_json::to_vec(&coinbase_data)?)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Failed to build coinbase transaction: {e}");
                self.rollback_applied(&applied, &BlockHash::ZERO).await;
                return Ok(abandoned(examined_pending, admitted_orphans));
            }
        };

        // Coinbase at position zero, then user transactions, then punishments
        let mut transactions = Vec::with_capacity(applied.len() + system.len() + 1);
        transactions.push(coinbase);
        transactions.extend(applied.iter().cloned());
        transactions.extend(system);

        // Build and sign the header
        let tx_hashes: Vec<TxHash> = transactions.iter().map(|tx| tx.hash).collect();
        let mut header = BlockHeader {
            hash: BlockHash::ZERO,
            parent_hash: request.best_header.hash,
            height,
            time: (self.clock)(),
            merkle_root: merkle_root(&tx_hashes),
            packer_address: member.packing_address.clone(),
            round: RoundMetadata {
                round_index: request.round.index,
                round_start_time: request.round.start_time,
                member_count: request.round.member_count(),
                member_index: member.slot_index,
            },
            signature: Vec::new(),
        };
        header.hash = header.compute_hash();
        match self.signer.sign(header.hash.as_ref()).await {
            Ok(signature) => header.signature = signature,
            Err(e) => warn!("Header signing failed: {e}"),
        }

        let block = Block {
            header,
            transactions,
        };

        // Full verification; failure rolls back every applied transaction
        // and abandons the slot
        if let Err(e) = verify_block(&block, request.best_header, self.params) {
            warn!(height, "packed block failed verification: {e}");
            self.rollback_applied(&applied, &block.header.hash).await;
            return Ok(abandoned(examined_pending, admitted_orphans));
        }

        Ok(PackOutcome {
            block: Some(block),
            examined_pending,
            admitted_orphans,
            consumed_punish_heights,
        })
    }

    /// Re-validate and speculatively apply one transaction; deposits also
    /// lock their funds. Failures drop the transaction.
    async fn admit(&self, tx: &Transaction, height: u64) -> bool {
        if tx.kind.is_system() || !tx.hash_matches() {
            debug!(hash = %tx.hash, "dropping invalid transaction");
            return false;
        }
        if let Err(e) = self.ledger.apply(tx, height).await {
            debug!(hash = %tx.hash, "dropping transaction refused by ledger: {e}");
            return false;
        }
        if tx.kind == TxKind::Deposit {
            if let Err(e) = self.ledger.lock_funds(tx).await {
                debug!(hash = %tx.hash, "deposit lock failed, dropping: {e}");
                if let Err(e) = self.ledger.rollback(tx, &BlockHash::ZERO).await {
                    warn!(hash = %tx.hash, "rollback after failed lock also failed: {e}");
                }
                return false;
            }
        }
        true
    }

    /// Undo every speculatively applied transaction, newest first.
    /// Rollback failures are logged; bookkeeping proceeds.
    pub async fn rollback_applied(&self, applied: &[Transaction], block_hash: &BlockHash) {
        for tx in applied.iter().rev() {
            if tx.kind == TxKind::Deposit {
                if let Err(e) = self.ledger.unlock_funds(tx).await {
                    warn!(hash = %tx.hash, "deposit unlock failed: {e}");
                }
            }
            if let Err(e) = self.ledger.rollback(tx, block_hash).await {
                warn!(hash = %tx.hash, "transaction rollback failed: {e}");
            }
        }
    }

    async fn build_system_tx(
        &self,
        kind: TxKind,
        time: u64,
        payload: Vec<u8>,
    ) -> Result<Transaction> {
        let mut tx = Transaction::new(kind, time, payload);
        tx.signature = self.signer.sign(tx.hash.as_ref()).await?;
        Ok(tx)
    }
}

fn abandoned(examined_pending: Vec<TxHash>, admitted_orphans: Vec<TxHash>) -> PackOutcome {
    PackOutcome {
        block: None,
        examined_pending,
        admitted_orphans,
        consumed_punish_heights: Vec::new(),
    }
}

/// Full block verification run on every self-assembled block before it is
/// broadcast.
pub fn verify_block(
    block: &Block,
    best_header: &BlockHeader,
    params: &ConsensusParams,
) -> Result<(), PackError> {
    let header = &block.header;
    if header.parent_hash != best_header.hash || header.height != best_header.height + 1 {
        return Err(PackError::BadParent);
    }

    let coinbase_count =
        block.transactions.iter().filter(|tx| tx.kind == TxKind::Coinbase).count();
    if coinbase_count != 1 || block.transactions.first().map(|tx| tx.kind) != Some(TxKind::Coinbase)
    {
        return Err(PackError::CoinbaseMisplaced);
    }

    let mut user_size = 0u64;
    for tx in &block.transactions {
        if !tx.hash_matches() {
            return Err(PackError::TxIntegrity(tx.hash));
        }
        if !tx.kind.is_system() {
            user_size += tx.size;
        }
    }
    // System transactions ride above the size budget
    if user_size > params.max_block_size {
        return Err(PackError::Oversize {
            got: user_size,
            limit: params.max_block_size,
        });
    }

    let tx_hashes: Vec<TxHash> = block.transactions.iter().map(|tx| tx.hash).collect();
    if merkle_root(&tx_hashes) != header.merkle_root {
        return Err(PackError::MerkleMismatch);
    }
    if header.compute_hash() != header.hash {
        return Err(PackError::HashMismatch);
    }
    if header.signature.is_empty() {
        return Err(PackError::UnsignedHeader);
    }
    Ok(())
}

/// Agents whose packing slots were missed between the last observed block
/// and this member's slot, in slot order.
///
/// If the best block belongs to the current round the scan starts after
/// its slot; otherwise every earlier slot of this round was missed.
pub fn missed_agents(round: &Round, my_slot: u16, best_header: &BlockHeader) -> Vec<Address> {
    let start = if best_header.round.round_index == round.index {
        best_header.round.member_index + 1
    } else {
        0
    };
    (start..my_slot)
        .filter_map(|slot| round.member(slot))
        .map(|m| m.agent_address.clone())
        .collect()
}
