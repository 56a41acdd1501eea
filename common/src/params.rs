//! Consensus parameters, shared by every Pergamon module

use config::Config;

const DEFAULT_BLOCK_INTERVAL_SECS: i64 = 10;
const DEFAULT_CONFIRMATION_DEPTH: i64 = 6;
const DEFAULT_PRUNE_MARGIN: i64 = 6;
const DEFAULT_MAX_BLOCK_SIZE: i64 = 2 * 1024 * 1024;
const DEFAULT_MIN_AVAILABLE_PEERS: i64 = 2;

/// Chain-wide consensus parameters.
///
/// Every node must agree on these; they are read once from the module
/// config section at init.
#[derive(Debug, Clone)]
pub struct ConsensusParams {
    /// Packing slot length, milliseconds
    pub block_interval_ms: u64,

    /// Blocks a header must trail the approving tip by before it may be
    /// committed to durable storage
    pub confirmation_depth: u64,

    /// Candidate chains shorter than (approving length - margin) are pruned
    pub prune_margin: u64,

    /// Maximum cumulative transaction size per block, bytes
    pub max_block_size: u64,

    /// Minimum available peers before this node will pack
    pub min_available_peers: usize,
}

impl ConsensusParams {
    pub fn from_config(config: &Config) -> Self {
        let secs =
            config.get_int("block-interval-secs").unwrap_or(DEFAULT_BLOCK_INTERVAL_SECS).max(1);
        Self {
            block_interval_ms: (secs as u64) * 1000,
            confirmation_depth: config
                .get_int("confirmation-depth")
                .unwrap_or(DEFAULT_CONFIRMATION_DEPTH)
                .max(0) as u64,
            prune_margin: config.get_int("prune-margin").unwrap_or(DEFAULT_PRUNE_MARGIN).max(0)
                as u64,
            max_block_size: config.get_int("max-block-size").unwrap_or(DEFAULT_MAX_BLOCK_SIZE).max(1)
                as u64,
            min_available_peers: config
                .get_int("min-available-peers")
                .unwrap_or(DEFAULT_MIN_AVAILABLE_PEERS)
                .max(0) as usize,
        }
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            block_interval_ms: (DEFAULT_BLOCK_INTERVAL_SECS as u64) * 1000,
            confirmation_depth: DEFAULT_CONFIRMATION_DEPTH as u64,
            prune_margin: DEFAULT_PRUNE_MARGIN as u64,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE as u64,
            min_available_peers: DEFAULT_MIN_AVAILABLE_PEERS as usize,
        }
    }
}
