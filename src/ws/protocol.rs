//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::ai::AiDifficulty;
use crate::game::hazard::LavaPool;
use crate::game::physics::Vec2;
use crate::game::player::{Player, PlayerKind};
use crate::game::rules::RuleSet;
use crate::game::weapons::{DamageReport, WeaponInventory, WeaponKind};
use crate::util::time::unix_millis;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join the public queue
    MatchmakingRequest {
        player_name: String,
        #[serde(default)]
        custom_settings: Option<RuleSet>,
    },

    /// Leave the queue
    CancelMatchmaking,

    /// Start a match against a computer opponent right away
    PlayVsAi {
        player_name: String,
        difficulty: AiDifficulty,
        #[serde(default)]
        custom_settings: Option<RuleSet>,
    },

    /// Re-attach to a running game after reconnecting
    Rejoin { player_id: Uuid, game_id: Uuid },

    /// Fire on the current turn
    PlayerAction {
        /// Degrees, 0 = right, 90 = up
        angle: f32,
        /// 0-100
        power: f32,
        weapon: WeaponKind,
    },

    Chat { message: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Queue state reported to a waiting player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Searching,
    Timeout,
    Cancelled,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMsg {
    MatchmakingStatus {
        status: QueueStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        queue_position: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Sent to each participant when a session begins (or on rejoin)
    GameStart {
        game_id: Uuid,
        /// The receiving player's id
        player_id: Uuid,
        players: Vec<PlayerView>,
        terrain: Vec<f32>,
        width: usize,
        height: f32,
        wind: f32,
        current_turn: Uuid,
        turn_number: u32,
    },

    /// Full state sync after each turn
    GameState {
        game_id: Uuid,
        players: Vec<PlayerView>,
        terrain: Vec<f32>,
        wind: f32,
        current_turn: Uuid,
        turn_number: u32,
        /// Advisory only, in seconds
        turn_time_remaining: u64,
        hazards: Vec<LavaPool>,
    },

    /// One simulated sample of the projectile in flight
    ProjectileUpdate { x: f32, y: f32, vx: f32, vy: f32 },

    ExplosionEvent {
        x: f32,
        y: f32,
        radius: f32,
        weapon: WeaponKind,
        /// Empty for secondary impacts
        damage: Vec<DamageReport>,
        secondary: bool,
    },

    HazardUpdate { pools: Vec<LavaPool> },

    HazardDamage { damage: Vec<DamageReport> },

    TurnEnd {
        next_turn: Uuid,
        turn_number: u32,
        wind: f32,
    },

    GameOver {
        /// None on mutual destruction
        winner: Option<Uuid>,
        statistics: GameStatistics,
    },

    ChatMessage {
        player_id: Uuid,
        player_name: String,
        message: String,
    },

    PlayerDisconnect { player_id: Uuid },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },

    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Outbound envelope: the message plus a server timestamp
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame<'a> {
    #[serde(flatten)]
    pub msg: &'a ServerMsg,
    pub timestamp: u64,
}

impl<'a> ServerFrame<'a> {
    pub fn now(msg: &'a ServerMsg) -> Self {
        Self {
            msg,
            timestamp: unix_millis(),
        }
    }
}

/// Public view of a tank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    pub kind: PlayerKind,
    pub position: Vec2,
    pub hp: u32,
    pub ammo: WeaponInventory,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            kind: p.kind,
            position: p.position,
            hp: p.hp,
            ammo: p.inventory.clone(),
        }
    }
}

/// End-of-match numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatistics {
    pub total_turns: u32,
    pub players: Vec<PlayerStatistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatistics {
    pub id: Uuid,
    pub name: String,
    pub damage_dealt: u32,
    pub shots_fired: u32,
    pub shots_hit: u32,
    /// Hits per shot, 0 when no shots were fired
    pub accuracy: f32,
    pub final_hp: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_parse() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"player_action","payload":{"angle":45,"power":70,"weapon":"digger"}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMsg::PlayerAction {
                weapon: WeaponKind::Digger,
                ..
            }
        ));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"cancel_matchmaking"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::CancelMatchmaking));

        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"matchmaking_request","payload":{"player_name":"Alice"}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMsg::MatchmakingRequest {
                custom_settings: None,
                ..
            }
        ));

        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"play_vs_ai","payload":{"player_name":"Alice","difficulty":"hard","custom_settings":{"gravity":400}}}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::PlayVsAi {
                difficulty,
                custom_settings: Some(rules),
                ..
            } => {
                assert_eq!(difficulty, AiDifficulty::Hard);
                assert_eq!(rules.gravity, 400.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_weapon_rejected() {
        let parsed = serde_json::from_str::<ClientMsg>(
            r#"{"type":"player_action","payload":{"angle":45,"power":70,"weapon":"nuke"}}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_frame_carries_timestamp() {
        let msg = ServerMsg::Pong { t: 7 };
        let value = serde_json::to_value(ServerFrame::now(&msg)).unwrap();
        assert_eq!(value["type"], "pong");
        assert_eq!(value["payload"]["t"], 7);
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_status_omits_missing_fields() {
        let msg = ServerMsg::MatchmakingStatus {
            status: QueueStatus::Searching,
            queue_position: Some(1),
            message: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["payload"]["status"], "searching");
        assert_eq!(value["payload"]["queue_position"], 1);
        assert!(value["payload"].get("message").is_none());
    }
}
