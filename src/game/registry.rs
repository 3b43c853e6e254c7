//! Registry of running sessions

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::runner::SessionCommand;

/// Rejoin lookup failures
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    #[error("game not found")]
    GameNotFound,

    #[error("player is not part of this game")]
    PlayerNotFound,
}

impl LookupError {
    pub fn code(&self) -> &'static str {
        match self {
            LookupError::GameNotFound => "GAME_NOT_FOUND",
            LookupError::PlayerNotFound => "PLAYER_NOT_FOUND",
        }
    }
}

/// Handle to a running session task
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub id: Uuid,
    pub player_ids: Vec<Uuid>,
    pub command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn has_player(&self, player_id: Uuid) -> bool {
        self.player_ids.contains(&player_id)
    }
}

/// All running sessions, indexed by game id and by participant
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
    players: DashMap<Uuid, Uuid>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: SessionHandle) {
        for player_id in &handle.player_ids {
            self.players.insert(*player_id, handle.id);
        }
        self.sessions.insert(handle.id, handle);
    }

    pub fn get(&self, game_id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(game_id).map(|h| h.value().clone())
    }

    /// The session a player currently belongs to
    pub fn lookup_by_player(&self, player_id: &Uuid) -> Option<SessionHandle> {
        let game_id = *self.players.get(player_id)?;
        self.get(&game_id)
    }

    /// Check a rejoin request against the registry
    pub fn resolve_rejoin(&self, game_id: Uuid, player_id: Uuid) -> Result<SessionHandle, LookupError> {
        let handle = self.get(&game_id).ok_or(LookupError::GameNotFound)?;
        if !handle.has_player(player_id) {
            return Err(LookupError::PlayerNotFound);
        }
        Ok(handle)
    }

    pub fn remove(&self, game_id: &Uuid) -> Option<SessionHandle> {
        let (_, handle) = self.sessions.remove(game_id)?;
        for player_id in &handle.player_ids {
            self.players.remove_if(player_id, |_, g| g == game_id);
        }
        Some(handle)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}
