//! Pergamon chain selection module for Caryatid
//! Maintains the approving header chain across candidate forks

pub mod fork_choice;
pub mod header_chain;

use anyhow::Result;
use caryatid_sdk::{module, Context};
use config::Config;
use pergamon_common::{
    messages::{
        BlockQuery, BlockQueryResponse, ChainMessage, ChainQuery, ChainQueryResponse,
        CommandMessage, CommitAdvisedMessage, Message, StateQuery, StateQueryResponse,
    },
    params::ConsensusParams,
    HeaderDigest,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use fork_choice::{ForkChoice, ForkChoiceObserver};

const DEFAULT_SUBSCRIBE_HEADERS_TOPIC: (&str, &str) =
    ("subscribe-headers-topic", "pergamon.header.available");
const DEFAULT_SUBSCRIBE_RESCIND_TOPIC: (&str, &str) =
    ("subscribe-rescind-topic", "pergamon.header.rescinded");
const DEFAULT_SUBSCRIBE_COMMAND_TOPIC: (&str, &str) = ("subscribe-command-topic", "pergamon.command");
const DEFAULT_CLOCK_TICK_TOPIC: (&str, &str) = ("clock-tick-subscribe-topic", "clock.tick");
const DEFAULT_CHAIN_QUERY_TOPIC: (&str, &str) = ("chain-query-topic", "pergamon.query.chain");
const DEFAULT_BLOCKS_QUERY_TOPIC: (&str, &str) = ("blocks-query-topic", "pergamon.query.blocks");
const DEFAULT_PUBLISH_COMMIT_TOPIC: (&str, &str) = ("publish-commit-topic", "pergamon.block.commit");

fn topic(config: &Config, key: (&str, &str)) -> String {
    config.get_string(key.0).unwrap_or(key.1.to_string())
}

/// Rollback digests queued by the fork choice for async execution
type RollbackQueue = Arc<std::sync::Mutex<Vec<HeaderDigest>>>;

/// Observer that queues rollbacks for publishing outside the lock
struct QueueObserver {
    queue: RollbackQueue,
}

impl ForkChoiceObserver for QueueObserver {
    fn rollback(&self, digest: &HeaderDigest) {
        self.queue.lock().unwrap().push(digest.clone());
    }
}

/// Chain selection module
#[module(
    message_type(Message),
    name = "chain-selection",
    description = "Approving chain selection across candidate forks"
)]
pub struct ChainSelection;

impl ChainSelection {
    /// Main init function
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let headers_topic = topic(&config, DEFAULT_SUBSCRIBE_HEADERS_TOPIC);
        info!("Creating headers subscriber on '{headers_topic}'");
        let rescind_topic = topic(&config, DEFAULT_SUBSCRIBE_RESCIND_TOPIC);
        let command_topic = topic(&config, DEFAULT_SUBSCRIBE_COMMAND_TOPIC);
        let tick_topic = topic(&config, DEFAULT_CLOCK_TICK_TOPIC);
        let chain_query_topic = topic(&config, DEFAULT_CHAIN_QUERY_TOPIC);
        info!("Creating chain query handler on '{chain_query_topic}'");
        let blocks_query_topic = topic(&config, DEFAULT_BLOCKS_QUERY_TOPIC);
        let publish_commit_topic = topic(&config, DEFAULT_PUBLISH_COMMIT_TOPIC);

        let params = ConsensusParams::from_config(&config);
        info!(
            confirmation_depth = params.confirmation_depth,
            prune_margin = params.prune_margin,
            "Chain selection parameters"
        );

        let rollback_queue: RollbackQueue = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observer = Box::new(QueueObserver {
            queue: rollback_queue.clone(),
        });
        let fork_choice = Arc::new(Mutex::new(ForkChoice::new(
            params.prune_margin,
            params.confirmation_depth,
            observer,
        )));

        let mut headers_subscription = context.subscribe(&headers_topic).await?;
        let mut rescind_subscription = context.subscribe(&rescind_topic).await?;
        let mut command_subscription = context.subscribe(&command_topic).await?;
        let mut tick_subscription = context.subscribe(&tick_topic).await?;

        // Query handler
        let query_fork_choice = fork_choice.clone();
        context.handle(&chain_query_topic, move |message| {
            let fork_choice = query_fork_choice.clone();
            async move {
                let Message::StateQuery(StateQuery::Chain(query)) = message.as_ref() else {
                    return Arc::new(Message::StateQueryResponse(StateQueryResponse::Chain(
                        ChainQueryResponse::Error("Invalid message for chain-selection".into()),
                    )));
                };

                let fork = fork_choice.lock().await;
                let response = match query {
                    ChainQuery::GetApprovingChain => match fork.approving_chain() {
                        Some(chain) => ChainQueryResponse::ApprovingChain(chain.digests().to_vec()),
                        None => ChainQueryResponse::NotReady,
                    },
                    ChainQuery::GetBlockHash { height } => {
                        if fork.approving_chain().is_none() {
                            ChainQueryResponse::NotReady
                        } else {
                            ChainQueryResponse::BlockHash(fork.get_block_hash(*height))
                        }
                    }
                    ChainQuery::GetChainStatus => ChainQueryResponse::ChainStatus(fork.status()),
                };
                Arc::new(Message::StateQueryResponse(StateQueryResponse::Chain(response)))
            }
        });

        // Persisted-height cursor for the periodic depth-processing job;
        // initialized lazily from the block store's best block
        let mut persisted_height: Option<u64> = None;

        context.clone().run(async move {
            loop {
                tokio::select! {
                    result = headers_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Headers subscription read failed");
                            return;
                        };
                        match message.as_ref() {
                            Message::Chain(ChainMessage::HeaderAvailable(msg)) => {
                                let header = &msg.header;
                                let advanced = {
                                    let mut fork = fork_choice.lock().await;
                                    fork.add_header(header)
                                };
                                debug!(
                                    height = header.height,
                                    hash = %header.hash,
                                    advanced,
                                    "header observed"
                                );
                                Self::run_rollbacks(&context, &blocks_query_topic, &rollback_queue)
                                    .await;
                            }
                            _ => debug!("Ignoring unexpected message on headers topic"),
                        }
                    }

                    result = rescind_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Rescind subscription read failed");
                            return;
                        };
                        if let Message::Chain(ChainMessage::HeaderRescinded(msg)) = message.as_ref() {
                            info!(hash = %msg.hash, "header rescinded");
                            fork_choice.lock().await.remove_hash(&msg.hash);
                            Self::run_rollbacks(&context, &blocks_query_topic, &rollback_queue)
                                .await;
                        }
                    }

                    result = command_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Command subscription read failed");
                            return;
                        };
                        if let Message::Command(CommandMessage::ClearCache) = message.as_ref() {
                            info!("Clearing candidate chains");
                            fork_choice.lock().await.clear();
                            persisted_height = None;
                        }
                    }

                    result = tick_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Tick subscription read failed");
                            return;
                        };
                        if let Message::Clock(_) = message.as_ref() {
                            if persisted_height.is_none() {
                                persisted_height = Self::fetch_persisted_height(
                                    &context, &blocks_query_topic).await;
                            }
                            let Some(height) = persisted_height else { continue };
                            let committed = Self::flush_committable(
                                &context,
                                &fork_choice,
                                &publish_commit_topic,
                                height,
                            ).await;
                            persisted_height = Some(committed);
                            Self::run_rollbacks(&context, &blocks_query_topic, &rollback_queue)
                                .await;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Drain queued rollbacks and execute them through the block store.
    /// Failures are logged; chain bookkeeping has already moved on.
    async fn run_rollbacks(
        context: &Arc<Context<Message>>,
        blocks_query_topic: &str,
        queue: &RollbackQueue,
    ) {
        let digests: Vec<HeaderDigest> = queue.lock().unwrap().drain(..).collect();
        for digest in digests {
            info!(height = digest.height, hash = %digest.hash, "rolling back block");
            let request = Arc::new(Message::StateQuery(StateQuery::Blocks(BlockQuery::Rollback {
                hash: digest.hash,
            })));
            match context.message_bus.request(blocks_query_topic, request).await {
                Ok(response) => match response.as_ref() {
                    Message::StateQueryResponse(StateQueryResponse::Blocks(
                        BlockQueryResponse::RolledBack,
                    )) => {}
                    Message::StateQueryResponse(StateQueryResponse::Blocks(
                        BlockQueryResponse::Error(e),
                    )) => {
                        warn!(height = digest.height, "block rollback failed: {e}");
                    }
                    _ => warn!("Unexpected rollback response"),
                },
                Err(e) => warn!(height = digest.height, "block rollback request failed: {e}"),
            }
        }
    }

    /// Ask the block store for its best (durably stored) block height
    async fn fetch_persisted_height(
        context: &Arc<Context<Message>>,
        blocks_query_topic: &str,
    ) -> Option<u64> {
        let request = Arc::new(Message::StateQuery(StateQuery::Blocks(BlockQuery::GetBestBlock)));
        match context.message_bus.request(blocks_query_topic, request).await {
            Ok(response) => match response.as_ref() {
                Message::StateQueryResponse(StateQueryResponse::Blocks(
                    BlockQueryResponse::BestBlock(block),
                )) => {
                    info!(height = block.header.height, "persisted height initialized");
                    Some(block.header.height)
                }
                _ => None,
            },
            Err(e) => {
                debug!("Best block not available yet: {e}");
                None
            }
        }
    }

    /// Run depth processing and publish commit advice for every block now
    /// trailing the approving tip by the confirmation depth. Returns the
    /// advanced persisted-height cursor.
    async fn flush_committable(
        context: &Arc<Context<Message>>,
        fork_choice: &Arc<Mutex<ForkChoice>>,
        publish_commit_topic: &str,
        mut persisted_height: u64,
    ) -> u64 {
        loop {
            let advice = {
                let mut fork = fork_choice.lock().await;
                if !fork.processing(persisted_height) {
                    break;
                }
                let height = persisted_height + 1;
                match fork.get_block_hash(height) {
                    Some(hash) => CommitAdvisedMessage { height, hash },
                    None => break,
                }
            };
            let height = advice.height;
            let message = Arc::new(Message::Chain(ChainMessage::CommitAdvised(advice)));
            if let Err(e) = context.message_bus.publish(publish_commit_topic, message).await {
                error!("Failed to publish commit advice: {e}");
                break;
            }
            persisted_height = height;
        }
        persisted_height
    }
}
