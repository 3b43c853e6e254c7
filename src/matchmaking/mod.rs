//! Matchmaking: FIFO queue with AI fallback

pub mod queue;
pub mod service;

pub use queue::{MatchmakingQueue, QueuedPlayer, TimeoutScan};
pub use service::MatchmakingService;
