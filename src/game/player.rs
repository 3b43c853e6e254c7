//! Combatant state owned by a session

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ai::AiDifficulty;
use super::physics::Vec2;
use super::weapons::WeaponInventory;

/// Hit points every tank starts with
pub const MAX_HP: u32 = 100;

/// Who controls a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerKind {
    Human,
    Ai { difficulty: AiDifficulty },
}

impl PlayerKind {
    pub fn is_ai(&self) -> bool {
        matches!(self, PlayerKind::Ai { .. })
    }
}

/// Cumulative per-match statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub damage_dealt: u32,
}

impl PlayerStats {
    /// Hits per shot, 0 before the first shot
    pub fn accuracy(&self) -> f32 {
        if self.shots_fired == 0 {
            0.0
        } else {
            self.shots_hit as f32 / self.shots_fired as f32
        }
    }
}

/// Player state in a session (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub kind: PlayerKind,
    pub position: Vec2,
    pub hp: u32,
    pub inventory: WeaponInventory,
    pub stats: PlayerStats,
}

impl Player {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        kind: PlayerKind,
        position: Vec2,
        inventory: WeaponInventory,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            position,
            hp: MAX_HP,
            inventory,
            stats: PlayerStats::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Subtract damage, never going below zero; returns the hp actually lost
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let lost = amount.min(self.hp);
        self.hp -= lost;
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(
            Uuid::new_v4(),
            "Alice",
            PlayerKind::Human,
            Vec2::new(10.0, 10.0),
            WeaponInventory::default(),
        )
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut p = player();
        assert_eq!(p.apply_damage(30), 30);
        assert_eq!(p.hp, 70);
        assert_eq!(p.apply_damage(500), 70);
        assert_eq!(p.hp, 0);
        assert!(!p.is_alive());
        assert_eq!(p.apply_damage(5), 0);
    }

    #[test]
    fn test_accuracy() {
        let mut stats = PlayerStats::default();
        assert_eq!(stats.accuracy(), 0.0);
        stats.shots_fired = 4;
        stats.shots_hit = 1;
        assert_eq!(stats.accuracy(), 0.25);
    }
}
