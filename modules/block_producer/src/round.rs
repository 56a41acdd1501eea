//! Round computation: deterministic packing-slot assignment over the live
//! validator set.
//!
//! Every node derives the same member rotation from the same inputs: the
//! ordering key is Blake2b-256(packing_address ‖ seed ‖ round_index), with
//! the seed taken from the previous round's final observed header hash.
//! Rounds are built wholly and replaced atomically; recomputation is
//! idempotent.

use pergamon_common::{crypto::blake2b_256, AgentInfo, Hash32, Round, RoundMember};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RoundError {
    /// Queried before any round has been computed
    #[error("no current round computed yet")]
    NotReady,

    /// Neither registered agents nor configured seed agents available
    #[error("validator set is empty")]
    EmptyValidatorSet,
}

/// Owns the current round. Pending → Active → Expired is driven by the
/// caller's clock; expiry forces a full rebuild via `compute`/`next`.
pub struct RoundScheduler {
    current: Option<Arc<Round>>,
}

impl RoundScheduler {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Result<Arc<Round>, RoundError> {
        self.current.clone().ok_or(RoundError::NotReady)
    }

    pub fn needs_rebuild(&self, now: u64) -> bool {
        match &self.current {
            Some(round) => round.is_expired(now),
            None => true,
        }
    }

    /// Replace the current round wholly
    pub fn install(&mut self, round: Round) -> Arc<Round> {
        let round = Arc::new(round);
        self.current = Some(round.clone());
        round
    }

    /// Idempotent reset back to the not-ready state
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Build the round that follows the current one, catching up over
    /// whole round durations if the clock has moved past several
    /// boundaries during a stall.
    pub fn next(
        &self,
        agents: &[AgentInfo],
        seed: Hash32,
        local_packing_address: Option<&str>,
        interval_ms: u64,
        now: u64,
    ) -> Result<Round, RoundError> {
        match &self.current {
            None => compute_round(1, now, agents, seed, local_packing_address, interval_ms),
            Some(previous) => {
                let member_count = agents.len().max(1) as u64;
                let duration = member_count * interval_ms;
                let mut index = previous.index + 1;
                let mut start = previous.end_time;
                if now >= start + duration {
                    let skipped = (now - start) / duration;
                    index += skipped;
                    start += skipped * duration;
                }
                compute_round(index, start, agents, seed, local_packing_address, interval_ms)
            }
        }
    }
}

impl Default for RoundScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic rotation key for one member
fn rotation_key(packing_address: &str, seed: &Hash32, index: u64) -> Hash32 {
    let mut data = Vec::with_capacity(packing_address.len() + 40);
    data.extend_from_slice(packing_address.as_bytes());
    data.extend_from_slice(seed.as_ref());
    data.extend_from_slice(&index.to_be_bytes());
    blake2b_256(&data)
}

/// Build a complete round: deterministic member order, disjoint
/// fixed-length slots from `start_time`, cached local slot.
pub fn compute_round(
    index: u64,
    start_time: u64,
    agents: &[AgentInfo],
    seed: Hash32,
    local_packing_address: Option<&str>,
    interval_ms: u64,
) -> Result<Round, RoundError> {
    if agents.is_empty() {
        return Err(RoundError::EmptyValidatorSet);
    }

    let mut ordered: Vec<&AgentInfo> = agents.iter().collect();
    ordered.sort_by_key(|agent| rotation_key(&agent.packing_address, &seed, index));

    let members: Vec<RoundMember> = ordered
        .iter()
        .enumerate()
        .map(|(i, agent)| {
            let slot_index = i as u16;
            RoundMember {
                agent_address: agent.agent_address.clone(),
                packing_address: agent.packing_address.clone(),
                slot_index,
                pack_start_time: start_time + (i as u64) * interval_ms,
                pack_end_time: start_time + (i as u64 + 1) * interval_ms,
                credit_weight: agent.credit_weight,
            }
        })
        .collect();

    let local_member_index = local_packing_address
        .and_then(|addr| members.iter().find(|m| m.packing_address == addr))
        .map(|m| m.slot_index);

    let end_time = start_time + members.len() as u64 * interval_ms;
    Ok(Round {
        index,
        start_time,
        end_time,
        members,
        local_member_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(n: u8) -> AgentInfo {
        AgentInfo {
            agent_address: format!("agent-{n}"),
            packing_address: format!("packer-{n}"),
            deposit: 20_000,
            credit_weight: 1.0,
        }
    }

    fn agents(count: u8) -> Vec<AgentInfo> {
        (1..=count).map(agent).collect()
    }

    #[test]
    fn identical_inputs_give_identical_rounds() {
        let set = agents(5);
        let seed = blake2b_256(b"previous-final-header");
        let a = compute_round(7, 100_000, &set, seed, Some("packer-3"), 10_000).unwrap();
        let b = compute_round(7, 100_000, &set, seed, Some("packer-3"), 10_000).unwrap();

        assert_eq!(a.members.len(), b.members.len());
        for (ma, mb) in a.members.iter().zip(b.members.iter()) {
            assert_eq!(ma.packing_address, mb.packing_address);
            assert_eq!(ma.pack_start_time, mb.pack_start_time);
            assert_eq!(ma.pack_end_time, mb.pack_end_time);
        }
        assert_eq!(a.local_member_index, b.local_member_index);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut set = agents(5);
        let seed = blake2b_256(b"seed");
        let a = compute_round(1, 0, &set, seed, None, 10_000).unwrap();
        set.reverse();
        let b = compute_round(1, 0, &set, seed, None, 10_000).unwrap();

        let order_a: Vec<_> = a.members.iter().map(|m| m.packing_address.clone()).collect();
        let order_b: Vec<_> = b.members.iter().map(|m| m.packing_address.clone()).collect();
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn slots_are_disjoint_and_contiguous() {
        let round =
            compute_round(3, 50_000, &agents(4), Hash32::ZERO, None, 10_000).unwrap();
        assert_eq!(round.start_time, 50_000);
        assert_eq!(round.end_time, 90_000);
        for (i, member) in round.members.iter().enumerate() {
            assert_eq!(member.slot_index as usize, i);
            assert_eq!(member.pack_start_time, 50_000 + i as u64 * 10_000);
            assert_eq!(member.pack_end_time, member.pack_start_time + 10_000);
        }
    }

    #[test]
    fn local_slot_is_cached() {
        let round =
            compute_round(1, 0, &agents(3), Hash32::ZERO, Some("packer-2"), 10_000).unwrap();
        let member = round.local_member().unwrap();
        assert_eq!(member.packing_address, "packer-2");

        let round =
            compute_round(1, 0, &agents(3), Hash32::ZERO, Some("unknown"), 10_000).unwrap();
        assert!(round.local_member().is_none());
    }

    #[test]
    fn empty_validator_set_is_an_error() {
        assert!(matches!(
            compute_round(1, 0, &[], Hash32::ZERO, None, 10_000),
            Err(RoundError::EmptyValidatorSet)
        ));
    }

    #[test]
    fn scheduler_not_ready_before_first_round() {
        let scheduler = RoundScheduler::new();
        assert!(matches!(scheduler.current(), Err(RoundError::NotReady)));
        assert!(scheduler.needs_rebuild(0));
    }

    #[test]
    fn scheduler_detects_expiry() {
        let mut scheduler = RoundScheduler::new();
        let round = compute_round(1, 0, &agents(3), Hash32::ZERO, None, 10_000).unwrap();
        scheduler.install(round);
        assert!(!scheduler.needs_rebuild(29_999));
        assert!(scheduler.needs_rebuild(30_000));
    }

    #[test]
    fn next_round_continues_from_previous_end() {
        let mut scheduler = RoundScheduler::new();
        let set = agents(3);
        let round = compute_round(1, 0, &set, Hash32::ZERO, None, 10_000).unwrap();
        scheduler.install(round);

        // Just after expiry: the next round starts at the previous end
        let next = scheduler.next(&set, Hash32::ZERO, None, 10_000, 31_000).unwrap();
        assert_eq!(next.index, 2);
        assert_eq!(next.start_time, 30_000);
    }

    #[test]
    fn next_round_catches_up_after_stall() {
        let mut scheduler = RoundScheduler::new();
        let set = agents(3);
        let round = compute_round(1, 0, &set, Hash32::ZERO, None, 10_000).unwrap();
        scheduler.install(round);

        // Two whole rounds were missed (duration 30s each)
        let next = scheduler.next(&set, Hash32::ZERO, None, 10_000, 95_000).unwrap();
        assert_eq!(next.index, 4);
        assert_eq!(next.start_time, 90_000);
        assert!(!next.is_expired(95_000));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut scheduler = RoundScheduler::new();
        let round = compute_round(1, 0, &agents(2), Hash32::ZERO, None, 10_000).unwrap();
        scheduler.install(round);
        scheduler.reset();
        scheduler.reset();
        assert!(matches!(scheduler.current(), Err(RoundError::NotReady)));
    }
}
