//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::game::rules::RuleSet;

/// Player waiting for an opponent
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub player_id: Uuid,
    pub name: String,
    /// Rules requested by this player, if any
    pub rules: Option<RuleSet>,
    pub queued_at: Instant,
    /// Set once the "no opponent yet" notice has gone out
    pub notified: bool,
}

impl QueuedPlayer {
    pub fn new(player_id: Uuid, name: impl Into<String>, rules: Option<RuleSet>, now: Instant) -> Self {
        Self {
            player_id,
            name: name.into(),
            rules,
            queued_at: now,
            notified: false,
        }
    }

    /// How long this player has been waiting at `now`
    pub fn wait_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.queued_at)
    }
}

/// Result of a timeout scan
#[derive(Debug, Default)]
pub struct TimeoutScan {
    /// Players who just crossed the initial threshold
    pub notify: Vec<QueuedPlayer>,
    /// Players removed after the extended threshold, to be matched against AI
    pub expired: Vec<QueuedPlayer>,
}

/// FIFO queue of players waiting for a match
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
    initial_timeout: Duration,
    extended_timeout: Duration,
}

impl MatchmakingQueue {
    pub fn new(initial_timeout: Duration, extended_timeout: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            initial_timeout,
            extended_timeout,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.initial_timeout, config.extended_timeout)
    }

    /// Add a player to the back of the queue; re-queueing moves them to the back
    pub fn enqueue(&mut self, player: QueuedPlayer) -> usize {
        self.queue.retain(|p| p.player_id != player.player_id);
        self.queue.push_back(player);
        self.queue.len()
    }

    /// Remove a player from the queue
    pub fn dequeue(&mut self, player_id: Uuid) -> Option<QueuedPlayer> {
        let pos = self.queue.iter().position(|p| p.player_id == player_id)?;
        self.queue.remove(pos)
    }

    /// 1-based queue position
    pub fn position(&self, player_id: Uuid) -> Option<usize> {
        self.queue
            .iter()
            .position(|p| p.player_id == player_id)
            .map(|i| i + 1)
    }

    pub fn contains(&self, player_id: Uuid) -> bool {
        self.position(player_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pop the two longest-waiting players, if there are two
    pub fn try_match(&mut self) -> Option<(QueuedPlayer, QueuedPlayer)> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some((first, second))
    }

    /// Flag players past the initial wait and remove those past the extended wait
    pub fn scan_timeouts(&mut self, now: Instant) -> TimeoutScan {
        let mut scan = TimeoutScan::default();
        let fallback_after = self.initial_timeout + self.extended_timeout;

        let mut kept = VecDeque::with_capacity(self.queue.len());
        for mut player in self.queue.drain(..) {
            let waited = player.wait_time(now);
            if waited >= fallback_after {
                scan.expired.push(player);
                continue;
            }
            if waited >= self.initial_timeout && !player.notified {
                player.notified = true;
                scan.notify.push(player.clone());
            }
            kept.push_back(player);
        }
        self.queue = kept;

        scan
    }
}

impl Default for MatchmakingQueue {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}
