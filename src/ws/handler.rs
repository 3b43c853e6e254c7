//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::rules::RuleSet;
use crate::game::runner::SessionCommand;
use crate::game::session::ActionError;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::channels::OUTBOUND_CAPACITY;
use crate::ws::protocol::{ClientMsg, ServerFrame, ServerMsg};
use crate::ws::validate::{self, ValidationError};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

    let mut conn = Connection::new(state, outbound_tx);
    info!(player_id = %conn.player_id(), "New WebSocket connection");

    let writer_handle = tokio::spawn(write_loop(ws_sink, outbound_rx));

    // Reader loop: WebSocket -> connection
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => conn.handle_text(&text).await,
            Ok(Message::Binary(_)) => {
                warn!(player_id = %conn.player_id(), "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %conn.player_id(), "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %conn.player_id(), error = %e, "WebSocket error");
                break;
            }
        }
    }

    let player_id = conn.player_id();
    conn.disconnect().await;
    writer_handle.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Outbound queue -> WebSocket
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<ServerMsg>) {
    while let Some(msg) = rx.recv().await {
        let json = match serde_json::to_string(&ServerFrame::now(&msg)) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json)).await {
            debug!(error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// State of one client connection, independent of the socket
pub struct Connection {
    state: AppState,
    player_id: Uuid,
    outbound: mpsc::Sender<ServerMsg>,
    limiter: PlayerRateLimiter,
}

impl Connection {
    /// Register a fresh player id for a new connection
    pub fn new(state: AppState, outbound: mpsc::Sender<ServerMsg>) -> Self {
        let player_id = Uuid::new_v4();
        state.channels.register(player_id, outbound.clone());
        Self {
            state,
            player_id,
            outbound,
            limiter: PlayerRateLimiter::new(),
        }
    }

    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    /// Parse and dispatch one inbound text frame
    pub async fn handle_text(&mut self, text: &str) {
        if !self.limiter.check_message() {
            warn!(player_id = %self.player_id, "Rate limited inbound message");
            self.reply(ServerMsg::error("RATE_LIMITED", "Too many messages"));
            return;
        }

        match serde_json::from_str::<ClientMsg>(text) {
            Ok(msg) => self.handle_msg(msg).await,
            Err(e) => {
                warn!(player_id = %self.player_id, error = %e, "Failed to parse client message");
                self.reject(ValidationError::Malformed(e.to_string()));
            }
        }
    }

    async fn handle_msg(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::MatchmakingRequest {
                player_name,
                custom_settings,
            } => {
                if !self.limiter.check_matchmaking() {
                    self.reply(ServerMsg::error("RATE_LIMITED", "Too many matchmaking requests"));
                    return;
                }
                let Some(name) = self.checked(validate::player_name(&player_name)) else {
                    return;
                };
                let Some(rules) = self.checked_rules(custom_settings) else {
                    return;
                };
                self.state
                    .matchmaking
                    .join_queue(self.player_id, name, rules)
                    .await;
            }

            ClientMsg::CancelMatchmaking => {
                self.state.matchmaking.leave_queue(self.player_id).await;
            }

            ClientMsg::PlayVsAi {
                player_name,
                difficulty,
                custom_settings,
            } => {
                if !self.limiter.check_matchmaking() {
                    self.reply(ServerMsg::error("RATE_LIMITED", "Too many matchmaking requests"));
                    return;
                }
                let Some(name) = self.checked(validate::player_name(&player_name)) else {
                    return;
                };
                let Some(rules) = self.checked_rules(custom_settings) else {
                    return;
                };
                self.state.matchmaking.forget(self.player_id).await;
                self.state.matchmaking.start_ai_match(
                    self.player_id,
                    name,
                    difficulty,
                    rules.unwrap_or_default(),
                );
            }

            ClientMsg::Rejoin { player_id, game_id } => self.rejoin(player_id, game_id).await,

            ClientMsg::PlayerAction {
                angle,
                power,
                weapon,
            } => {
                if self.checked(validate::shot(angle, power)).is_none() {
                    return;
                }
                self.forward(SessionCommand::Action {
                    player_id: self.player_id,
                    angle,
                    power,
                    weapon,
                })
                .await;
            }

            ClientMsg::Chat { message } => {
                let Some(message) = self.checked(validate::chat(&message)) else {
                    return;
                };
                self.forward(SessionCommand::Chat {
                    player_id: self.player_id,
                    message,
                })
                .await;
            }

            ClientMsg::Ping { t } => self.reply(ServerMsg::Pong { t }),
        }
    }

    /// Adopt an earlier player id and resync with its game
    async fn rejoin(&mut self, player_id: Uuid, game_id: Uuid) {
        let handle = match self.state.registry.resolve_rejoin(game_id, player_id) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(player_id = %player_id, game_id = %game_id, error = %e, "Rejoin rejected");
                self.reply(ServerMsg::error(e.code(), e.to_string()));
                return;
            }
        };

        if player_id != self.player_id {
            self.state.matchmaking.forget(self.player_id).await;
            self.state.channels.unregister(self.player_id, &self.outbound);
            self.player_id = player_id;
            self.state.channels.register(player_id, self.outbound.clone());
        }

        info!(player_id = %player_id, game_id = %game_id, "Player rejoining");
        if handle
            .command_tx
            .send(SessionCommand::Rejoin { player_id })
            .await
            .is_err()
        {
            self.reply(ServerMsg::error("GAME_NOT_FOUND", "game has ended"));
        }
    }

    /// Send a command to this player's session
    async fn forward(&self, cmd: SessionCommand) {
        let Some(handle) = self.state.registry.lookup_by_player(&self.player_id) else {
            let e = ActionError::NotInGame;
            self.reply(ServerMsg::error(e.code(), e.to_string()));
            return;
        };
        if handle.command_tx.send(cmd).await.is_err() {
            debug!(player_id = %self.player_id, game_id = %handle.id, "Session command channel closed");
        }
    }

    /// Leave the queue and tell the session, if any
    pub async fn disconnect(self) {
        self.state.matchmaking.forget(self.player_id).await;
        if let Some(handle) = self.state.registry.lookup_by_player(&self.player_id) {
            let _ = handle
                .command_tx
                .send(SessionCommand::Disconnect {
                    player_id: self.player_id,
                })
                .await;
        }
        self.state.channels.unregister(self.player_id, &self.outbound);
    }

    fn checked<T>(&self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.reject(e);
                None
            }
        }
    }

    /// `Some(None)` when no rules were sent, `None` after rejecting them
    fn checked_rules(&self, rules: Option<RuleSet>) -> Option<Option<RuleSet>> {
        match rules {
            None => Some(None),
            Some(rules) => match rules.validate() {
                Ok(()) => Some(Some(rules)),
                Err(e) => {
                    warn!(player_id = %self.player_id, error = %e, "Invalid custom settings");
                    self.reply(ServerMsg::error(e.code(), e.to_string()));
                    None
                }
            },
        }
    }

    fn reject(&self, e: ValidationError) {
        debug!(player_id = %self.player_id, error = %e, "Invalid client message");
        self.reply(ServerMsg::error(e.code(), e.to_string()));
    }

    fn reply(&self, msg: ServerMsg) {
        if self.outbound.try_send(msg).is_err() {
            debug!(player_id = %self.player_id, "Outbound queue unavailable");
        }
    }
}
