//! Pergamon stats module for Caryatid
//! Logs consensus status on a slow clock divisor

use anyhow::Result;
use caryatid_sdk::{module, Context};
use config::Config;
use pergamon_common::messages::{
    ChainQuery, ChainQueryResponse, Message, RoundQuery, RoundQueryResponse, StateQuery,
    StateQueryResponse,
};
use std::sync::Arc;
use tracing::{debug, error, info};

const DEFAULT_CLOCK_TICK_SUBSCRIBE_TOPIC: (&str, &str) =
    ("clock-tick-subscribe-topic", "clock.tick");
const DEFAULT_CHAIN_QUERY_TOPIC: (&str, &str) = ("chain-query-topic", "pergamon.query.chain");
const DEFAULT_ROUND_QUERY_TOPIC: (&str, &str) = ("round-query-topic", "pergamon.query.round");
const DEFAULT_LOG_INTERVAL_TICKS: i64 = 30;

#[module(message_type(Message), name = "stats", description = "Logs consensus statistics")]
pub struct Stats;

impl Stats {
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let clock_tick_subscribe_topic = config
            .get_string(DEFAULT_CLOCK_TICK_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_CLOCK_TICK_SUBSCRIBE_TOPIC.1.to_string());
        info!("Creating subscriber on '{clock_tick_subscribe_topic}'");
        let chain_query_topic = config
            .get_string(DEFAULT_CHAIN_QUERY_TOPIC.0)
            .unwrap_or(DEFAULT_CHAIN_QUERY_TOPIC.1.to_string());
        let round_query_topic = config
            .get_string(DEFAULT_ROUND_QUERY_TOPIC.0)
            .unwrap_or(DEFAULT_ROUND_QUERY_TOPIC.1.to_string());
        let interval =
            config.get_int("log-interval-ticks").unwrap_or(DEFAULT_LOG_INTERVAL_TICKS).max(1) as u64;

        let mut clock_tick_subscription = context.subscribe(&clock_tick_subscribe_topic).await?;
        context.clone().run(async move {
            loop {
                let Ok((_, tick_message)) = clock_tick_subscription.read().await else {
                    error!("Failed to read Stats clock tick subscription");
                    return;
                };
                if let Message::Clock(tick_message) = tick_message.as_ref() {
                    if tick_message.number % interval == 0 {
                        Self::log_stats(&context, &chain_query_topic, &round_query_topic).await;
                    }
                }
            }
        });
        Ok(())
    }

    async fn log_stats(
        context: &Arc<Context<Message>>,
        chain_query_topic: &str,
        round_query_topic: &str,
    ) {
        let request = Arc::new(Message::StateQuery(StateQuery::Chain(ChainQuery::GetChainStatus)));
        match context.message_bus.request(chain_query_topic, request).await {
            Ok(response) => match response.as_ref() {
                Message::StateQueryResponse(StateQueryResponse::Chain(
                    ChainQueryResponse::ChainStatus(status),
                )) => {
                    info!(
                        chains = status.chain_count,
                        max_height = status.max_height,
                        tip = status.approving_tip.as_ref().map(|t| t.height),
                        "chain status"
                    );
                }
                _ => debug!("chain status not available"),
            },
            Err(e) => debug!("chain status query failed: {e}"),
        }

        let request =
            Arc::new(Message::StateQuery(StateQuery::Round(RoundQuery::GetCurrentRound)));
        match context.message_bus.request(round_query_topic, request).await {
            Ok(response) => match response.as_ref() {
                Message::StateQueryResponse(StateQueryResponse::Round(
                    RoundQueryResponse::CurrentRound(round),
                )) => {
                    info!(
                        index = round.index,
                        members = round.members.len(),
                        local_slot = ?round.local_member_index,
                        "round status"
                    );
                }
                Message::StateQueryResponse(StateQueryResponse::Round(
                    RoundQueryResponse::NotReady,
                )) => debug!("no round computed yet"),
                _ => debug!("round status not available"),
            },
            Err(e) => debug!("round status query failed: {e}"),
        }
    }
}
