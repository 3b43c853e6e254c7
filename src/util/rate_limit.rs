//! Per-connection inbound message limiting

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max inbound messages per second on one connection
pub const MESSAGE_RATE_LIMIT: u32 = 30;

/// Max queue joins / AI match requests per second on one connection
pub const MATCHMAKING_RATE_LIMIT: u32 = 5;

/// Limits for one WebSocket connection
#[derive(Clone)]
pub struct PlayerRateLimiter {
    messages: Arc<Limiter>,
    matchmaking: Arc<Limiter>,
}

impl PlayerRateLimiter {
    pub fn new() -> Self {
        Self {
            messages: create_limiter(MESSAGE_RATE_LIMIT),
            matchmaking: create_limiter(MATCHMAKING_RATE_LIMIT),
        }
    }

    /// Check if an inbound message is allowed (returns true if allowed)
    pub fn check_message(&self) -> bool {
        self.messages.check().is_ok()
    }

    /// Check if a matchmaking request is allowed
    pub fn check_matchmaking(&self) -> bool {
        self.matchmaking.check().is_ok()
    }
}

impl Default for PlayerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
