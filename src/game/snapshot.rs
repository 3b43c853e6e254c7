//! End-of-match statistics and the summary handed to storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::ws::protocol::{GameStatistics, PlayerStatistics};

use super::ai::AiDifficulty;
use super::player::{Player, PlayerKind, PlayerStats};

/// Per-player statistics for the `game_over` message
pub fn build_statistics(players: &[Player], total_turns: u32) -> GameStatistics {
    GameStatistics {
        total_turns,
        players: players
            .iter()
            .map(|p| PlayerStatistics {
                id: p.id,
                name: p.name.clone(),
                damage_dealt: p.stats.damage_dealt,
                shots_fired: p.stats.shots_fired,
                shots_hit: p.stats.shots_hit,
                accuracy: p.stats.accuracy(),
                final_hp: p.hp,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

/// One player's view of a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: Uuid,
    pub name: String,
    pub kind: PlayerKind,
    pub result: MatchOutcome,
    pub final_hp: u32,
    pub stats: PlayerStats,
    pub accuracy: f32,
    pub opponents: Vec<String>,
    /// Set when any opponent was computer controlled
    pub ai_difficulty: Option<AiDifficulty>,
}

/// Finalized record of a completed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub game_id: Uuid,
    pub finished_at: DateTime<Utc>,
    pub total_turns: u32,
    pub winner: Option<Uuid>,
    pub players: Vec<PlayerSummary>,
}

impl MatchSummary {
    pub fn build(game_id: Uuid, players: &[Player], winner: Option<Uuid>, total_turns: u32) -> Self {
        let players = players
            .iter()
            .map(|p| {
                let opponents: Vec<&Player> = players.iter().filter(|o| o.id != p.id).collect();
                let ai_difficulty = opponents.iter().find_map(|o| match o.kind {
                    PlayerKind::Ai { difficulty } => Some(difficulty),
                    PlayerKind::Human => None,
                });
                let result = match winner {
                    None => MatchOutcome::Draw,
                    Some(id) if id == p.id => MatchOutcome::Win,
                    Some(_) => MatchOutcome::Loss,
                };

                PlayerSummary {
                    player_id: p.id,
                    name: p.name.clone(),
                    kind: p.kind,
                    result,
                    final_hp: p.hp,
                    stats: p.stats,
                    accuracy: p.stats.accuracy(),
                    opponents: opponents.iter().map(|o| o.name.clone()).collect(),
                    ai_difficulty,
                }
            })
            .collect();

        Self {
            game_id,
            finished_at: Utc::now(),
            total_turns,
            winner,
            players,
        }
    }
}

/// Receives finished match summaries
pub trait MatchSummarySink: Send + Sync {
    fn record(&self, summary: &MatchSummary);
}

/// Sink that writes summaries to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSummarySink;

impl MatchSummarySink for TracingSummarySink {
    fn record(&self, summary: &MatchSummary) {
        info!(
            game_id = %summary.game_id,
            winner = ?summary.winner,
            total_turns = summary.total_turns,
            finished_at = %summary.finished_at.to_rfc3339(),
            "Match summary recorded"
        );
        for player in &summary.players {
            info!(
                game_id = %summary.game_id,
                player_id = %player.player_id,
                name = %player.name,
                result = ?player.result,
                final_hp = player.final_hp,
                damage_dealt = player.stats.damage_dealt,
                accuracy = player.accuracy,
                "Player result"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::Vec2;
    use crate::game::weapons::WeaponInventory;

    fn players() -> Vec<Player> {
        let mut alice = Player::new(
            Uuid::new_v4(),
            "Alice",
            PlayerKind::Human,
            Vec2::new(100.0, 300.0),
            WeaponInventory::default(),
        );
        alice.stats.shots_fired = 4;
        alice.stats.shots_hit = 2;
        alice.stats.damage_dealt = 55;
        let cpu = Player::new(
            Uuid::new_v4(),
            "CPU-Elite",
            PlayerKind::Ai {
                difficulty: AiDifficulty::Hard,
            },
            Vec2::new(800.0, 300.0),
            WeaponInventory::default(),
        );
        vec![alice, cpu]
    }

    #[test]
    fn test_statistics() {
        let players = players();
        let stats = build_statistics(&players, 9);
        assert_eq!(stats.total_turns, 9);
        assert_eq!(stats.players[0].accuracy, 0.5);
        assert_eq!(stats.players[1].accuracy, 0.0);
        assert_eq!(stats.players[0].final_hp, 100);
    }

    #[test]
    fn test_summary_outcomes() {
        let players = players();
        let summary = MatchSummary::build(Uuid::new_v4(), &players, Some(players[0].id), 9);
        assert_eq!(summary.players[0].result, MatchOutcome::Win);
        assert_eq!(summary.players[1].result, MatchOutcome::Loss);
        assert_eq!(summary.players[0].opponents, vec!["CPU-Elite".to_string()]);
        assert_eq!(summary.players[0].ai_difficulty, Some(AiDifficulty::Hard));
        assert_eq!(summary.players[1].ai_difficulty, None);

        let draw = MatchSummary::build(Uuid::new_v4(), &players, None, 50);
        assert!(draw.players.iter().all(|p| p.result == MatchOutcome::Draw));
    }
}
