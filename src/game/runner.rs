//! Session task: drives a [`GameSession`] in real time

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::channels::PlayerChannels;
use crate::ws::protocol::ServerMsg;

use super::registry::{SessionHandle, SessionRegistry};
use super::rules::RuleSet;
use super::session::{Dispatch, GameSession, Participant, SessionStatus, FRAME_MS};
use super::snapshot::MatchSummarySink;
use super::weapons::WeaponKind;

/// Input forwarded from a connection to its session task
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Action {
        player_id: Uuid,
        angle: f32,
        power: f32,
        weapon: WeaponKind,
    },
    Chat {
        player_id: Uuid,
        message: String,
    },
    Rejoin {
        player_id: Uuid,
    },
    Disconnect {
        player_id: Uuid,
    },
}

/// Everything needed to start session tasks
#[derive(Clone)]
pub struct SessionSpawner {
    pub registry: Arc<SessionRegistry>,
    pub channels: Arc<PlayerChannels>,
    pub sink: Arc<dyn MatchSummarySink>,
    pub game: GameConfig,
    /// How long a finished session stays registered
    pub grace: Duration,
}

impl SessionSpawner {
    /// Create a session, register it and spawn its task
    pub fn spawn(&self, participants: Vec<Participant>, rules: RuleSet) -> SessionHandle {
        let game_id = Uuid::new_v4();
        let seed = rand::random::<u64>();
        let player_ids: Vec<Uuid> = participants.iter().map(|p| p.id).collect();

        let session = GameSession::new(game_id, participants, rules, self.game, seed);
        let (command_tx, command_rx) = mpsc::channel(256);

        let handle = SessionHandle {
            id: game_id,
            player_ids,
            command_tx,
        };
        self.registry.insert(handle.clone());

        let runner = SessionRunner::new(session, command_rx, self.channels.clone());
        let registry = self.registry.clone();
        let sink = self.sink.clone();
        let grace = self.grace;

        tokio::spawn(async move {
            runner.run(sink.as_ref(), grace).await;
            registry.remove(&game_id);
            info!(game_id = %game_id, "Session removed from registry");
        });

        handle
    }
}

/// Owns one session for its whole life
pub struct SessionRunner {
    session: GameSession,
    commands: mpsc::Receiver<SessionCommand>,
    channels: Arc<PlayerChannels>,
    player_ids: Vec<Uuid>,
    human_ids: Vec<Uuid>,
}

impl SessionRunner {
    pub fn new(
        session: GameSession,
        commands: mpsc::Receiver<SessionCommand>,
        channels: Arc<PlayerChannels>,
    ) -> Self {
        let player_ids = session.players().iter().map(|p| p.id).collect();
        let human_ids = session
            .players()
            .iter()
            .filter(|p| !p.kind.is_ai())
            .map(|p| p.id)
            .collect();
        Self {
            session,
            commands,
            channels,
            player_ids,
            human_ids,
        }
    }

    /// Run until the match completes and the grace period expires
    pub async fn run(mut self, sink: &dyn MatchSummarySink, grace: Duration) {
        let game_id = self.session.id();
        info!(game_id = %game_id, "Session started");

        let started = Instant::now();
        let mut ticker = interval(Duration::from_millis(FRAME_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let idle_timeout = self.session.config().idle_timeout;
        let mut unattended_since: Option<Instant> = None;

        self.session.start();
        self.flush();

        while self.session.status() == SessionStatus::Active {
            tokio::select! {
                _ = ticker.tick() => {
                    self.session.advance_to(elapsed_ms(started));

                    if self.is_unattended() {
                        let since = *unattended_since.get_or_insert_with(Instant::now);
                        if since.elapsed() >= idle_timeout {
                            warn!(
                                game_id = %game_id,
                                idle_secs = idle_timeout.as_secs(),
                                "No players connected, abandoning session"
                            );
                            return;
                        }
                    } else {
                        unattended_since = None;
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        self.session.advance_to(elapsed_ms(started));
                        self.handle_command(cmd);
                    }
                    None => {
                        warn!(game_id = %game_id, "Command channel closed, abandoning session");
                        return;
                    }
                }
            }
            self.flush();
        }

        if let Some(summary) = self.session.take_summary() {
            sink.record(&summary);
        }

        // Keep answering rejoins and stray commands until the grace period ends.
        // Timers still pending, such as the secondaries of a final cluster
        // shot, keep firing in the meantime.
        let deadline = Instant::now() + grace;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                _ = ticker.tick(), if self.session.next_event_ms().is_some() => {
                    self.session.advance_to(elapsed_ms(started));
                }
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                }
            }
            self.flush();
        }

        info!(game_id = %game_id, "Session finished");
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Action {
                player_id,
                angle,
                power,
                weapon,
            } => {
                if let Err(e) = self.session.submit_action(player_id, angle, power, weapon) {
                    self.channels
                        .send(player_id, ServerMsg::error(e.code(), e.to_string()));
                }
            }
            SessionCommand::Chat { player_id, message } => {
                if let Err(e) = self.session.chat(player_id, message) {
                    self.channels
                        .send(player_id, ServerMsg::error(e.code(), e.to_string()));
                }
            }
            SessionCommand::Rejoin { player_id } => {
                if let Err(e) = self.session.rejoin(player_id) {
                    self.channels
                        .send(player_id, ServerMsg::error(e.code(), e.to_string()));
                }
            }
            SessionCommand::Disconnect { player_id } => {
                self.session.player_disconnected(player_id);
            }
        }
    }

    /// Humans were seated but none of them is connected now
    fn is_unattended(&self) -> bool {
        !self.human_ids.is_empty()
            && self
                .human_ids
                .iter()
                .all(|id| !self.channels.is_connected(*id))
    }

    fn flush(&mut self) {
        for dispatch in self.session.drain_outbox() {
            match dispatch {
                Dispatch::All(msg) => self.channels.send_many(&self.player_ids, &msg),
                Dispatch::To(player_id, msg) => {
                    self.channels.send(player_id, msg);
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
