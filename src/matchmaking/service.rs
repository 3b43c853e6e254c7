//! Matchmaking service - manages the queue and session creation

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::game::ai::AiDifficulty;
use crate::game::registry::SessionHandle;
use crate::game::rules::RuleSet;
use crate::game::runner::SessionSpawner;
use crate::game::session::Participant;
use crate::ws::protocol::{QueueStatus, ServerMsg};

use super::queue::{MatchmakingQueue, QueuedPlayer};

const TIMEOUT_NOTICE: &str = "No opponent found yet, still searching";

/// Matchmaking service
#[derive(Clone)]
pub struct MatchmakingService {
    queue: Arc<Mutex<MatchmakingQueue>>,
    spawner: SessionSpawner,
    config: QueueConfig,
}

impl MatchmakingService {
    pub fn new(spawner: SessionSpawner, config: QueueConfig) -> Self {
        Self {
            queue: Arc::new(Mutex::new(MatchmakingQueue::from_config(&config))),
            spawner,
            config,
        }
    }

    /// Join the queue; returns the 1-based position
    pub async fn join_queue(&self, player_id: Uuid, name: String, rules: Option<RuleSet>) -> usize {
        let player = QueuedPlayer::new(player_id, name, rules, Instant::now().into_std());
        let position = self.queue.lock().await.enqueue(player);

        info!(player_id = %player_id, queue_position = position, "Player joined matchmaking queue");
        self.spawner.channels.send(
            player_id,
            ServerMsg::MatchmakingStatus {
                status: QueueStatus::Searching,
                queue_position: Some(position),
                message: None,
            },
        );

        position
    }

    /// Leave the queue; returns false if the player was not queued
    pub async fn leave_queue(&self, player_id: Uuid) -> bool {
        let removed = self.queue.lock().await.dequeue(player_id).is_some();
        if removed {
            info!(player_id = %player_id, "Player left matchmaking queue");
            self.spawner.channels.send(
                player_id,
                ServerMsg::MatchmakingStatus {
                    status: QueueStatus::Cancelled,
                    queue_position: None,
                    message: None,
                },
            );
        }
        removed
    }

    /// Drop a disconnected player without notifying them
    pub async fn forget(&self, player_id: Uuid) {
        if self.queue.lock().await.dequeue(player_id).is_some() {
            info!(player_id = %player_id, "Disconnected player removed from queue");
        }
    }

    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn position(&self, player_id: Uuid) -> Option<usize> {
        self.queue.lock().await.position(player_id)
    }

    /// Start an AI match right away
    pub fn start_ai_match(
        &self,
        player_id: Uuid,
        name: String,
        difficulty: AiDifficulty,
        rules: RuleSet,
    ) -> SessionHandle {
        let handle = self.spawner.spawn(
            vec![Participant::human(player_id, name), Participant::ai(difficulty)],
            rules,
        );
        info!(
            game_id = %handle.id,
            player_id = %player_id,
            difficulty = %difficulty,
            "Created AI match"
        );
        handle
    }

    /// One pass over the queue: pair players, then handle timeouts
    pub async fn process_queue(&self) {
        let (pairs, scan) = {
            let mut queue = self.queue.lock().await;
            let mut pairs = Vec::new();
            while let Some(pair) = queue.try_match() {
                pairs.push(pair);
            }
            let scan = queue.scan_timeouts(Instant::now().into_std());
            (pairs, scan)
        };

        for (first, second) in pairs {
            let rules = first.rules.clone().or_else(|| second.rules.clone()).unwrap_or_default();
            let handle = self.spawner.spawn(
                vec![
                    Participant::human(first.player_id, first.name),
                    Participant::human(second.player_id, second.name),
                ],
                rules,
            );
            info!(
                game_id = %handle.id,
                first = %first.player_id,
                second = %second.player_id,
                "Paired players into match"
            );
        }

        for player in scan.notify {
            info!(player_id = %player.player_id, "No opponent found within initial timeout");
            self.spawner.channels.send(
                player.player_id,
                ServerMsg::MatchmakingStatus {
                    status: QueueStatus::Timeout,
                    queue_position: None,
                    message: Some(TIMEOUT_NOTICE.to_string()),
                },
            );
        }

        for player in scan.expired {
            info!(player_id = %player.player_id, "Queue wait expired, falling back to AI");
            self.start_ai_match(
                player.player_id,
                player.name,
                self.config.ai_difficulty,
                player.rules.unwrap_or_default(),
            );
        }
    }

    /// Run the matchmaking service (periodic queue processing)
    pub async fn run(&self) {
        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.process_queue().await;
        }
    }
}
