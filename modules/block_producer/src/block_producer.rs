//! Pergamon block producer module for Caryatid
//! Schedules packing rounds and assembles blocks in this node's slot

pub mod mempool;
pub mod packer;
pub mod round;

use anyhow::{bail, Result};
use caryatid_sdk::{async_trait, module, Context};
use chrono::Utc;
use config::Config;
use pergamon_common::{
    messages::{
        AccountQuery, AccountQueryResponse, AgentQuery, AgentQueryResponse, BlockProducedMessage,
        BlockQuery, BlockQueryResponse, ChainMessage, CommandMessage, ConsensusMessage,
        HeaderAvailableMessage, LedgerQuery, LedgerQueryResponse, Message, NetworkQuery,
        NetworkQueryResponse, RoundQuery, RoundQueryResponse, StateQuery, StateQueryResponse,
        SyncQuery, SyncQueryResponse,
    },
    params::ConsensusParams,
    AgentInfo, Block, BlockHash, CompactBlock, Hash32, RedPunishData, Round, RoundMember,
    SigningAccount, SyncStatus, Transaction,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use mempool::TxPool;
use packer::{missed_agents, Assembler, LedgerAccess, PackRequest, SignerAccess};
use round::RoundScheduler;

const DEFAULT_CLOCK_TICK_TOPIC: (&str, &str) = ("clock-tick-subscribe-topic", "clock.tick");
const DEFAULT_SUBSCRIBE_TXS_TOPIC: (&str, &str) = ("subscribe-txs-topic", "pergamon.tx.received");
const DEFAULT_SUBSCRIBE_CONSENSUS_TOPIC: (&str, &str) =
    ("subscribe-consensus-topic", "pergamon.consensus");
const DEFAULT_SUBSCRIBE_COMMAND_TOPIC: (&str, &str) = ("subscribe-command-topic", "pergamon.command");
const DEFAULT_PUBLISH_HEADERS_TOPIC: (&str, &str) =
    ("publish-headers-topic", "pergamon.header.available");
const DEFAULT_PUBLISH_PRODUCED_TOPIC: (&str, &str) =
    ("publish-produced-topic", "pergamon.block.produced");
const DEFAULT_ROUND_QUERY_TOPIC: (&str, &str) = ("round-query-topic", "pergamon.query.round");
const DEFAULT_LEDGER_QUERY_TOPIC: (&str, &str) = ("ledger-query-topic", "pergamon.query.ledger");
const DEFAULT_BLOCKS_QUERY_TOPIC: (&str, &str) = ("blocks-query-topic", "pergamon.query.blocks");
const DEFAULT_NETWORK_QUERY_TOPIC: (&str, &str) = ("network-query-topic", "pergamon.query.network");
const DEFAULT_SYNC_QUERY_TOPIC: (&str, &str) = ("sync-query-topic", "pergamon.query.sync");
const DEFAULT_ACCOUNTS_QUERY_TOPIC: (&str, &str) =
    ("accounts-query-topic", "pergamon.query.accounts");
const DEFAULT_AGENTS_QUERY_TOPIC: (&str, &str) = ("agents-query-topic", "pergamon.query.agents");

/// Poll interval while waiting for the previous slot's block
const PREDECESSOR_POLL_MS: u64 = 500;

fn topic(config: &Config, key: (&str, &str)) -> String {
    config.get_string(key.0).unwrap_or(key.1.to_string())
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Mutable producer state, shared with the round query handler
struct ProducerState {
    synced: bool,
    scheduler: RoundScheduler,
    packed_this_round: bool,
    pending: TxPool,
    orphans: TxPool,
    red_punish: HashMap<u64, RedPunishData>,
    account: Option<SigningAccount>,
}

impl ProducerState {
    fn new() -> Self {
        Self {
            synced: false,
            scheduler: RoundScheduler::new(),
            packed_this_round: false,
            pending: TxPool::new(),
            orphans: TxPool::new(),
            red_punish: HashMap::new(),
            account: None,
        }
    }

    fn clear_caches(&mut self) {
        self.pending.clear();
        self.orphans.clear();
        self.red_punish.clear();
        self.scheduler.reset();
        self.packed_this_round = false;
    }
}

/// Ledger collaborator reached over the bus
struct BusLedger {
    context: Arc<Context<Message>>,
    topic: String,
}

impl BusLedger {
    async fn call(&self, query: LedgerQuery) -> Result<()> {
        let request = Arc::new(Message::StateQuery(StateQuery::Ledger(query)));
        let response = self.context.message_bus.request(&self.topic, request).await?;
        match response.as_ref() {
            Message::StateQueryResponse(StateQueryResponse::Ledger(response)) => match response {
                LedgerQueryResponse::Applied
                | LedgerQueryResponse::RolledBack
                | LedgerQueryResponse::Locked
                | LedgerQueryResponse::Unlocked => Ok(()),
                LedgerQueryResponse::Error(e) => bail!("ledger refused: {e}"),
                LedgerQueryResponse::Transaction(_) => bail!("unexpected ledger response"),
            },
            _ => bail!("unexpected message type from ledger"),
        }
    }
}

#[async_trait]
impl LedgerAccess for BusLedger {
    async fn apply(&self, tx: &Transaction, height: u64) -> Result<()> {
        self.call(LedgerQuery::Apply {
            tx: tx.clone(),
            height,
        })
        .await
    }

    async fn rollback(&self, tx: &Transaction, block_hash: &BlockHash) -> Result<()> {
        self.call(LedgerQuery::Rollback {
            tx: tx.clone(),
            block_hash: *block_hash,
        })
        .await
    }

    async fn lock_funds(&self, tx: &Transaction) -> Result<()> {
        self.call(LedgerQuery::LockFunds { tx: tx.clone() }).await
    }

    async fn unlock_funds(&self, tx: &Transaction) -> Result<()> {
        self.call(LedgerQuery::UnlockFunds { tx: tx.clone() }).await
    }
}

/// Account collaborator reached over the bus
struct BusSigner {
    context: Arc<Context<Message>>,
    topic: String,
}

#[async_trait]
impl SignerAccess for BusSigner {
    async fn sign(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let request = Arc::new(Message::StateQuery(StateQuery::Accounts(
            AccountQuery::SignDigest {
                digest: digest.to_vec(),
            },
        )));
        let response = self.context.message_bus.request(&self.topic, request).await?;
        match response.as_ref() {
            Message::StateQueryResponse(StateQueryResponse::Accounts(
                AccountQueryResponse::Signature(signature),
            )) => Ok(signature.clone()),
            Message::StateQueryResponse(StateQueryResponse::Accounts(
                AccountQueryResponse::Error(e),
            )) => bail!("signing failed: {e}"),
            _ => bail!("unexpected message type from accounts"),
        }
    }
}

/// Everything fixed at init time for the packing loop
struct Producer {
    context: Arc<Context<Message>>,
    params: ConsensusParams,
    partake: bool,
    seed_agents: Vec<AgentInfo>,
    ledger: BusLedger,
    signer: BusSigner,
    publish_headers_topic: String,
    publish_produced_topic: String,
    blocks_query_topic: String,
    network_query_topic: String,
    sync_query_topic: String,
    accounts_query_topic: String,
    agents_query_topic: String,
}

/// Block producer module
#[module(
    message_type(Message),
    name = "block-producer",
    description = "Round scheduling and block packing"
)]
pub struct BlockProducer;

impl BlockProducer {
    /// Main init function
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let tick_topic = topic(&config, DEFAULT_CLOCK_TICK_TOPIC);
        let txs_topic = topic(&config, DEFAULT_SUBSCRIBE_TXS_TOPIC);
        info!("Creating transactions subscriber on '{txs_topic}'");
        let consensus_topic = topic(&config, DEFAULT_SUBSCRIBE_CONSENSUS_TOPIC);
        let command_topic = topic(&config, DEFAULT_SUBSCRIBE_COMMAND_TOPIC);
        let round_query_topic = topic(&config, DEFAULT_ROUND_QUERY_TOPIC);
        info!("Creating round query handler on '{round_query_topic}'");

        let params = ConsensusParams::from_config(&config);
        let partake = config.get_bool("partake-packing").unwrap_or(false);
        let seed_addresses: Vec<String> = config.get::<Vec<String>>("seed-agents").unwrap_or_default();
        if partake {
            info!("Consensus participation enabled");
        } else {
            // Missing participation settings degrade to an observing node
            info!("Consensus participation disabled; observing only");
        }
        let seed_agents: Vec<AgentInfo> = seed_addresses
            .iter()
            .map(|address| AgentInfo {
                agent_address: address.clone(),
                packing_address: address.clone(),
                deposit: 0,
                credit_weight: 0.0,
            })
            .collect();

        let producer = Producer {
            context: context.clone(),
            params,
            partake,
            seed_agents,
            ledger: BusLedger {
                context: context.clone(),
                topic: topic(&config, DEFAULT_LEDGER_QUERY_TOPIC),
            },
            signer: BusSigner {
                context: context.clone(),
                topic: topic(&config, DEFAULT_ACCOUNTS_QUERY_TOPIC),
            },
            publish_headers_topic: topic(&config, DEFAULT_PUBLISH_HEADERS_TOPIC),
            publish_produced_topic: topic(&config, DEFAULT_PUBLISH_PRODUCED_TOPIC),
            blocks_query_topic: topic(&config, DEFAULT_BLOCKS_QUERY_TOPIC),
            network_query_topic: topic(&config, DEFAULT_NETWORK_QUERY_TOPIC),
            sync_query_topic: topic(&config, DEFAULT_SYNC_QUERY_TOPIC),
            accounts_query_topic: topic(&config, DEFAULT_ACCOUNTS_QUERY_TOPIC),
            agents_query_topic: topic(&config, DEFAULT_AGENTS_QUERY_TOPIC),
        };

        let state = Arc::new(Mutex::new(ProducerState::new()));

        let mut tick_subscription = context.subscribe(&tick_topic).await?;
        let mut txs_subscription = context.subscribe(&txs_topic).await?;
        let mut consensus_subscription = context.subscribe(&consensus_topic).await?;
        let mut command_subscription = context.subscribe(&command_topic).await?;

        // Round query handler
        let query_state = state.clone();
        context.handle(&round_query_topic, move |message| {
            let state = query_state.clone();
            async move {
                let Message::StateQuery(StateQuery::Round(RoundQuery::GetCurrentRound)) =
                    message.as_ref()
                else {
                    return Arc::new(Message::StateQueryResponse(StateQueryResponse::Round(
                        RoundQueryResponse::Error("Invalid message for block-producer".into()),
                    )));
                };
                let response = match state.lock().await.scheduler.current() {
                    Ok(round) => RoundQueryResponse::CurrentRound((*round).clone()),
                    Err(_) => RoundQueryResponse::NotReady,
                };
                Arc::new(Message::StateQueryResponse(StateQueryResponse::Round(response)))
            }
        });

        context.clone().run(async move {
            loop {
                tokio::select! {
                    result = tick_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Tick subscription read failed");
                            return;
                        };
                        if let Message::Clock(_) = message.as_ref() {
                            // Every per-tick failure is caught here; the
                            // loop always re-arms
                            if let Err(e) = producer.tick(&state).await {
                                error!("Production tick failed: {e}");
                            }
                        }
                    }

                    result = txs_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Transactions subscription read failed");
                            return;
                        };
                        if let Message::Consensus(ConsensusMessage::TxReceived(msg)) =
                            message.as_ref()
                        {
                            let mut st = state.lock().await;
                            for tx in &msg.txs {
                                st.pending.add(tx.clone());
                            }
                        }
                    }

                    result = consensus_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Consensus subscription read failed");
                            return;
                        };
                        if let Message::Consensus(ConsensusMessage::RedPunishEvidence(data)) =
                            message.as_ref()
                        {
                            info!(
                                agent = %data.agent_address,
                                height = data.height,
                                "red punish evidence received"
                            );
                            state.lock().await.red_punish.insert(data.height, data.clone());
                        }
                    }

                    result = command_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Command subscription read failed");
                            return;
                        };
                        if let Message::Command(CommandMessage::ClearCache) = message.as_ref() {
                            info!("Clearing producer caches and resetting round");
                            state.lock().await.clear_caches();
                        }
                    }
                }
            }
        });

        Ok(())
    }
}

impl Producer {
    /// One scheduling tick: sync gate, round upkeep, eligibility, packing
    async fn tick(&self, state: &Arc<Mutex<ProducerState>>) -> Result<()> {
        let now = now_ms();

        // Sync gate: park while the chain is downloading, and re-park if
        // synchronization is lost later
        let synced = self.sync_complete().await;
        {
            let mut st = state.lock().await;
            if synced && !st.synced {
                info!("Synchronization complete; starting round scheduling");
            } else if !synced && st.synced {
                warn!("Synchronization lost; parking block production");
            }
            st.synced = synced;
            if !st.synced {
                return Ok(());
            }
        }

        // Round upkeep: missing or expired rounds force a full rebuild and
        // skip packing this tick
        let needs_rebuild = state.lock().await.scheduler.needs_rebuild(now);
        if needs_rebuild {
            self.rebuild_round(state, now).await;
            return Ok(());
        }

        if !self.partake {
            return Ok(());
        }

        // Local credential, fetched once
        let account = match self.local_account(state).await {
            Some(account) => account,
            None => {
                debug!("No local packing account; not participating");
                return Ok(());
            }
        };

        let peers = self.available_peers().await;
        if peers.len() < self.params.min_available_peers {
            debug!(
                available = peers.len(),
                required = self.params.min_available_peers,
                "too few peers to pack"
            );
            return Ok(());
        }

        let (round, packed) = {
            let st = state.lock().await;
            (st.scheduler.current().ok(), st.packed_this_round)
        };
        let Some(round) = round else {
            return Ok(());
        };
        let Some(member) = round.local_member().cloned() else {
            return Ok(());
        };

        if packed || member.pack_start_time > now {
            return Ok(());
        }

        // Our slot is open: one packing attempt per round, produced or not
        let result = self.pack_slot(state, &round, &member, &account).await;
        state.lock().await.packed_this_round = true;
        result
    }

    /// Recompute the round from the live validator set, seeded by the best
    /// block hash
    async fn rebuild_round(&self, state: &Arc<Mutex<ProducerState>>, now: u64) {
        let agents = self.fetch_agents().await;
        if agents.is_empty() {
            debug!("Validator set empty; no round computed");
            return;
        }
        let seed = match self.best_block().await {
            Some(block) => block.header.hash,
            None => Hash32::ZERO,
        };
        if self.partake {
            // Cache the credential before computing the local slot
            self.local_account(state).await;
        }

        let mut st = state.lock().await;
        let local = st.account.as_ref().map(|a| a.packing_address.clone());
        match st.scheduler.next(&agents, seed, local.as_deref(), self.params.block_interval_ms, now)
        {
            Ok(round) => {
                info!(
                    index = round.index,
                    members = round.members.len(),
                    start = round.start_time,
                    end = round.end_time,
                    local_slot = ?round.local_member_index,
                    "round computed"
                );
                st.scheduler.install(round);
                st.packed_this_round = false;
            }
            Err(e) => debug!("Round not computed: {e}"),
        }
    }

    /// The packing protocol for one open slot
    async fn pack_slot(
        &self,
        state: &Arc<Mutex<ProducerState>>,
        round: &Arc<Round>,
        member: &RoundMember,
        account: &SigningAccount,
    ) -> Result<()> {
        // Step 1: unless we hold the first slot, wait (bounded by half the
        // block interval) until the previous slot's block is observed
        let observed = if member.slot_index == 0 {
            true
        } else {
            self.wait_for_predecessor(round, member).await
        };
        let needs_recheck = !observed;

        let Some(best) = self.best_block().await else {
            warn!("Best block unavailable; abandoning slot");
            return Ok(());
        };

        let clock: &(dyn Fn() -> u64 + Send + Sync) = &now_ms;
        let assembler = Assembler {
            ledger: &self.ledger,
            signer: &self.signer,
            params: &self.params,
            clock,
        };

        let (pending, orphans, red_punish) = Self::snapshot_inputs(state).await;
        let missed = missed_agents(round, member.slot_index, &best.header);
        let mut outcome = assembler
            .pack(PackRequest {
                best_header: &best.header,
                round,
                member,
                account,
                pending,
                orphans,
                red_punish,
                missed_agents: missed,
            })
            .await?;

        // Step 6: the wait timed out but the predecessor's block arrived
        // while we were assembling — discard, requeue, restart once
        if needs_recheck && outcome.block.is_some() && self.predecessor_observed(round, member).await
        {
            info!("Newer best block arrived mid-assembly; restarting packing");
            let stale = outcome.block.take().unwrap();
            let user_txs: Vec<Transaction> =
                stale.transactions.iter().filter(|tx| !tx.kind.is_system()).cloned().collect();
            assembler.rollback_applied(&user_txs, &stale.header.hash).await;
            {
                let mut st = state.lock().await;
                st.pending.remove_all(&outcome.examined_pending);
                st.orphans.remove_all(&outcome.admitted_orphans);
                for tx in user_txs {
                    st.orphans.add(tx);
                }
            }

            let Some(best) = self.best_block().await else {
                warn!("Best block unavailable; abandoning slot");
                return Ok(());
            };
            let (pending, orphans, red_punish) = Self::snapshot_inputs(state).await;
            let missed = missed_agents(round, member.slot_index, &best.header);
            outcome = assembler
                .pack(PackRequest {
                    best_header: &best.header,
                    round,
                    member,
                    account,
                    pending,
                    orphans,
                    red_punish,
                    missed_agents: missed,
                })
                .await?;
        }

        {
            let mut st = state.lock().await;
            st.pending.remove_all(&outcome.examined_pending);
            st.orphans.remove_all(&outcome.admitted_orphans);
            for height in &outcome.consumed_punish_heights {
                st.red_punish.remove(height);
            }
        }

        let Some(block) = outcome.block else {
            info!(round = round.index, "slot abandoned; no block produced this round");
            return Ok(());
        };

        info!(
            height = block.header.height,
            hash = %block.header.hash,
            round = round.index,
            slot = member.slot_index,
            txs = block.transactions.len(),
            "produced block"
        );

        self.publish_and_broadcast(&block).await;
        Ok(())
    }

    async fn snapshot_inputs(
        state: &Arc<Mutex<ProducerState>>,
    ) -> (Vec<Transaction>, Vec<Transaction>, Vec<RedPunishData>) {
        let st = state.lock().await;
        (
            st.pending.sorted_snapshot(),
            st.orphans.sorted_snapshot(),
            st.red_punish.values().cloned().collect(),
        )
    }

    /// Feed the header back as self-observed, broadcast the compact block,
    /// and emit the local production notice
    async fn publish_and_broadcast(&self, block: &Block) {
        let header_msg = Arc::new(Message::Chain(ChainMessage::HeaderAvailable(
            HeaderAvailableMessage {
                header: block.header.clone(),
            },
        )));
        self.context
            .message_bus
            .publish(&self.publish_headers_topic, header_msg)
            .await
            .unwrap_or_else(|e| error!("Failed to publish self-observed header: {e}"));

        let compact = CompactBlock::from(block);
        let request = Arc::new(Message::StateQuery(StateQuery::Network(NetworkQuery::Broadcast(
            compact,
        ))));
        match self.context.message_bus.request(&self.network_query_topic, request).await {
            Ok(response) => match response.as_ref() {
                Message::StateQueryResponse(StateQueryResponse::Network(
                    NetworkQueryResponse::Broadcasted(peers),
                )) => {
                    for peer in peers {
                        debug!(height = block.header.height, peer = %peer, "sent block");
                    }
                }
                _ => warn!("Unexpected broadcast response"),
            },
            Err(e) => warn!("Block broadcast failed: {e}"),
        }

        let notice = Arc::new(Message::Chain(ChainMessage::BlockProduced(BlockProducedMessage {
            header: block.header.clone(),
        })));
        self.context
            .message_bus
            .publish(&self.publish_produced_topic, notice)
            .await
            .unwrap_or_else(|e| error!("Failed to publish produced notice: {e}"));
    }

    /// Poll until the previous slot's block is the best block, bounded by
    /// half the block interval. Returns whether it was observed.
    async fn wait_for_predecessor(&self, round: &Round, member: &RoundMember) -> bool {
        let deadline = now_ms() + self.params.block_interval_ms / 2;
        loop {
            if self.predecessor_observed(round, member).await {
                return true;
            }
            if now_ms() >= deadline {
                debug!(slot = member.slot_index, "predecessor block not observed in time");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(PREDECESSOR_POLL_MS)).await;
        }
    }

    async fn predecessor_observed(&self, round: &Round, member: &RoundMember) -> bool {
        let Some(best) = self.best_block().await else {
            return false;
        };
        match round.member(member.slot_index.saturating_sub(1)) {
            Some(expected) => best.header.packer_address == expected.packing_address,
            None => true,
        }
    }

    // ── Collaborator queries ──────────────────────────────────────────

    async fn sync_complete(&self) -> bool {
        let request = Arc::new(Message::StateQuery(StateQuery::Sync(SyncQuery::GetStatus)));
        match self.context.message_bus.request(&self.sync_query_topic, request).await {
            Ok(response) => matches!(
                response.as_ref(),
                Message::StateQueryResponse(StateQueryResponse::Sync(SyncQueryResponse::Status(
                    SyncStatus::Complete
                )))
            ),
            Err(e) => {
                debug!("Sync status unavailable: {e}");
                false
            }
        }
    }

    async fn best_block(&self) -> Option<Block> {
        let request = Arc::new(Message::StateQuery(StateQuery::Blocks(BlockQuery::GetBestBlock)));
        match self.context.message_bus.request(&self.blocks_query_topic, request).await {
            Ok(response) => match response.as_ref() {
                Message::StateQueryResponse(StateQueryResponse::Blocks(
                    BlockQueryResponse::BestBlock(block),
                )) => Some(block.clone()),
                _ => None,
            },
            Err(e) => {
                debug!("Best block unavailable: {e}");
                None
            }
        }
    }

    async fn available_peers(&self) -> Vec<String> {
        let request =
            Arc::new(Message::StateQuery(StateQuery::Network(NetworkQuery::GetAvailablePeers)));
        match self.context.message_bus.request(&self.network_query_topic, request).await {
            Ok(response) => match response.as_ref() {
                Message::StateQueryResponse(StateQueryResponse::Network(
                    NetworkQueryResponse::Peers(peers),
                )) => peers.clone(),
                _ => Vec::new(),
            },
            Err(e) => {
                debug!("Peer list unavailable: {e}");
                Vec::new()
            }
        }
    }

    /// Registered agents merged with the configured seed agents
    async fn fetch_agents(&self) -> Vec<AgentInfo> {
        let request = Arc::new(Message::StateQuery(StateQuery::Agents(AgentQuery::GetAgents)));
        let mut agents =
            match self.context.message_bus.request(&self.agents_query_topic, request).await {
                Ok(response) => match response.as_ref() {
                    Message::StateQueryResponse(StateQueryResponse::Agents(
                        AgentQueryResponse::Agents(agents),
                    )) => agents.clone(),
                    _ => Vec::new(),
                },
                Err(e) => {
                    debug!("Agent registry unavailable: {e}");
                    Vec::new()
                }
            };
        for seed in &self.seed_agents {
            if !agents.iter().any(|a| a.packing_address == seed.packing_address) {
                agents.push(seed.clone());
            }
        }
        agents
    }

    /// Local signing credential, cached after the first successful fetch
    async fn local_account(&self, state: &Arc<Mutex<ProducerState>>) -> Option<SigningAccount> {
        if let Some(account) = state.lock().await.account.clone() {
            return Some(account);
        }
        let request =
            Arc::new(Message::StateQuery(StateQuery::Accounts(AccountQuery::GetPackingAccount)));
        match self.context.message_bus.request(&self.accounts_query_topic, request).await {
            Ok(response) => match response.as_ref() {
                Message::StateQueryResponse(StateQueryResponse::Accounts(
                    AccountQueryResponse::PackingAccount(Some(account)),
                )) => {
                    info!(packing_address = %account.packing_address, "packing account loaded");
                    state.lock().await.account = Some(account.clone());
                    Some(account.clone())
                }
                _ => None,
            },
            Err(e) => {
                debug!("Packing account unavailable: {e}");
                None
            }
        }
    }
}
