//! Outbound message routing by player id

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Capacity of each connection's outbound queue
pub const OUTBOUND_CAPACITY: usize = 256;

/// Connected players' outbound senders
///
/// Sessions address players by id only. A reconnecting client registers a
/// fresh sender under the same id and starts receiving again.
#[derive(Default)]
pub struct PlayerChannels {
    senders: DashMap<Uuid, mpsc::Sender<ServerMsg>>,
}

impl PlayerChannels {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Register (or replace) the sender for a player
    pub fn register(&self, player_id: Uuid, tx: mpsc::Sender<ServerMsg>) {
        if self.senders.insert(player_id, tx).is_some() {
            debug!(player_id = %player_id, "Replaced outbound channel");
        }
    }

    /// Drop a player's sender, but only if it is still `tx`
    pub fn unregister(&self, player_id: Uuid, tx: &mpsc::Sender<ServerMsg>) {
        self.senders
            .remove_if(&player_id, |_, current| current.same_channel(tx));
    }

    pub fn is_connected(&self, player_id: Uuid) -> bool {
        self.senders
            .get(&player_id)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Queue a message for one player; returns false if it could not be queued
    pub fn send(&self, player_id: Uuid, msg: ServerMsg) -> bool {
        let Some(tx) = self.senders.get(&player_id).map(|tx| tx.clone()) else {
            return false;
        };
        match tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(player_id = %player_id, "Outbound queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Queue a message for each listed player
    pub fn send_many(&self, player_ids: &[Uuid], msg: &ServerMsg) {
        for id in player_ids {
            self.send(*id, msg.clone());
        }
    }
}
