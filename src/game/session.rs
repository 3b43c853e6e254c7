//! One match: turn ownership, shot resolution, hazards and termination
//!
//! A session is a plain state machine. It never sleeps or spawns; every
//! delayed effect goes through its [`Scheduler`], and everything it wants to
//! tell clients lands in an outbox the runner drains.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::protocol::{PlayerView, ServerMsg};

use super::ai::{self, AiDecision, Battlefield};
use super::hazard::{HazardField, DAMAGE_INTERVAL_MS, FLOW_INTERVAL_MS};
use super::physics::{FlightBounds, LaunchParams, PhysicsEngine, TrajectoryPoint, Vec2, MAX_WIND};
use super::player::{Player, PlayerKind};
use super::rules::RuleSet;
use super::scheduler::Scheduler;
use super::snapshot::{build_statistics, MatchSummary};
use super::terrain::{Terrain, TerrainParams, TANK_REST_OFFSET};
use super::weapons::{DamageReport, WeaponEffectResolver, WeaponInventory, WeaponKind};

/// Projectile-to-tank contact distance
pub const TANK_HIT_RADIUS: f32 = 15.0;
/// Samples after launch that are never checked for collisions
pub const GRACE_SAMPLES: usize = 5;
/// Animation pacing of projectile frames
pub const FRAME_MS: u64 = 16;

const SECONDARY_DELAY_MS: u64 = 100;
const SECONDARY_STAGGER_MS: u64 = 50;
const SETTLE_TOLERANCE: f32 = 2.0;
const FALL_DAMAGE_THRESHOLD: f32 = 50.0;
const FALL_DAMAGE_DIVISOR: f32 = 10.0;
const SPAWN_MARGIN: usize = 100;
const SPAWN_SEPARATION: f32 = 300.0;

/// Rejected actions; none of these mutate the session
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    #[error("game is not active")]
    NotActive,

    #[error("a shot is already in flight")]
    ShotInFlight,

    #[error("player is not in this game")]
    NotInGame,

    #[error("it is not this player's turn")]
    NotYourTurn,

    #[error("no ammo left for {0}")]
    OutOfAmmo(WeaponKind),
}

impl ActionError {
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::NotActive => "GAME_NOT_ACTIVE",
            ActionError::ShotInFlight => "SHOT_IN_FLIGHT",
            ActionError::NotInGame => "NOT_IN_GAME",
            ActionError::NotYourTurn => "NOT_YOUR_TURN",
            ActionError::OutOfAmmo(_) => "OUT_OF_AMMO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Who gets an outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    All(ServerMsg),
    To(Uuid, ServerMsg),
}

/// A player entering a session
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    pub kind: PlayerKind,
}

impl Participant {
    pub fn human(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: PlayerKind::Human,
        }
    }

    pub fn ai(difficulty: ai::AiDifficulty) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: difficulty.player_name().to_string(),
            kind: PlayerKind::Ai { difficulty },
        }
    }
}

/// What ended a projectile's flight
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpactKind {
    Tank(Uuid),
    Terrain,
    OutOfBounds,
    /// Trajectory ended without touching anything
    Expired,
}

/// Result of scanning a trajectory for its first collision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotReport {
    pub impact: Vec2,
    pub kind: ImpactKind,
    /// Trajectory sample where the shot detonates
    pub impact_index: usize,
    /// First terrain sample touched, even if it was burrowed through
    pub first_terrain_contact: Option<Vec2>,
    pub terrain_contacts: u32,
}

/// Find where a shot detonates
///
/// Samples inside the grace window are skipped. After that each sample is
/// checked against other living tanks, then the playfield bounds, then the
/// terrain. The first `penetration` terrain contacts are passed through.
pub fn scan_trajectory(
    points: &[TrajectoryPoint],
    players: &[Player],
    shooter: usize,
    terrain: &Terrain,
    penetration: u32,
) -> ShotReport {
    let width = terrain.width() as f32;
    let height = terrain.playfield_height();
    let mut contacts = 0;
    let mut first_contact = None;

    for (i, point) in points.iter().enumerate().skip(GRACE_SAMPLES) {
        let pos = point.position();

        let tank_hit = players.iter().enumerate().find(|(idx, p)| {
            *idx != shooter && p.is_alive() && p.position.distance(pos) <= TANK_HIT_RADIUS
        });
        if let Some((_, target)) = tank_hit {
            return ShotReport {
                impact: pos,
                kind: ImpactKind::Tank(target.id),
                impact_index: i,
                first_terrain_contact: first_contact,
                terrain_contacts: contacts,
            };
        }

        if pos.x < 0.0 || pos.x > width || pos.y > height {
            return ShotReport {
                impact: pos,
                kind: ImpactKind::OutOfBounds,
                impact_index: i,
                first_terrain_contact: first_contact,
                terrain_contacts: contacts,
            };
        }

        if terrain.check_collision(pos.x, pos.y) {
            contacts += 1;
            first_contact.get_or_insert(pos);
            if contacts > penetration {
                return ShotReport {
                    impact: pos,
                    kind: ImpactKind::Terrain,
                    impact_index: i,
                    first_terrain_contact: first_contact,
                    terrain_contacts: contacts,
                };
            }
        }
    }

    let impact_index = points.len().saturating_sub(1);
    ShotReport {
        impact: points.last().map(TrajectoryPoint::position).unwrap_or_default(),
        kind: ImpactKind::Expired,
        impact_index,
        first_terrain_contact: first_contact,
        terrain_contacts: contacts,
    }
}

#[derive(Debug, Clone, Copy)]
struct ShotInFlight {
    shooter: usize,
    weapon: WeaponKind,
    impact: Vec2,
}

#[derive(Debug, Clone)]
enum SessionEvent {
    ProjectileFrame(TrajectoryPoint),
    ResolveImpact,
    SecondaryExplosion {
        at: Vec2,
        radius: f32,
        weapon: WeaponKind,
    },
    AiFire {
        player_id: Uuid,
        decision: AiDecision,
    },
    HazardFlow,
    HazardDamage,
}

/// Authoritative state of one match
pub struct GameSession {
    id: Uuid,
    config: GameConfig,
    rules: RuleSet,
    players: Vec<Player>,
    terrain: Terrain,
    hazards: HazardField,
    wind: f32,
    turn_index: usize,
    turn_number: u32,
    turn_started_ms: u64,
    status: SessionStatus,
    winner: Option<Uuid>,
    rng: ChaCha8Rng,
    scheduler: Scheduler<SessionEvent>,
    outbox: Vec<Dispatch>,
    in_flight: Option<ShotInFlight>,
    flow_scheduled: bool,
    damage_scheduled: bool,
    summary: Option<MatchSummary>,
}

impl GameSession {
    /// Create a session on freshly generated terrain
    pub fn new(
        id: Uuid,
        participants: Vec<Participant>,
        rules: RuleSet,
        config: GameConfig,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let terrain = Terrain::generate(&TerrainParams::new(config.width, config.height, rng.gen()));
        Self::with_terrain(id, participants, rules, config, terrain, rng)
    }

    /// Create a session on a prepared heightmap
    pub fn with_terrain(
        id: Uuid,
        participants: Vec<Participant>,
        rules: RuleSet,
        config: GameConfig,
        terrain: Terrain,
        mut rng: ChaCha8Rng,
    ) -> Self {
        let spawns = terrain.find_spawn_positions(participants.len(), SPAWN_MARGIN, SPAWN_SEPARATION);
        let players: Vec<Player> = participants
            .into_iter()
            .zip(spawns)
            .map(|(p, position)| {
                Player::new(p.id, p.name, p.kind, position, WeaponInventory::from_rules(&rules))
            })
            .collect();

        let wind = PhysicsEngine::initial_wind(&mut rng);

        info!(
            game_id = %id,
            players = players.len(),
            wind,
            gravity = rules.gravity,
            "Game session created"
        );

        Self {
            id,
            config,
            rules,
            players,
            terrain,
            hazards: HazardField::new(),
            wind,
            turn_index: 0,
            turn_number: 1,
            turn_started_ms: 0,
            status: SessionStatus::Active,
            winner: None,
            rng,
            scheduler: Scheduler::new(),
            outbox: Vec::new(),
            in_flight: None,
            flow_scheduled: false,
            damage_scheduled: false,
            summary: None,
        }
    }

    /// Announce the game to every human and kick off an AI opening turn
    pub fn start(&mut self) {
        let humans: Vec<Uuid> = self
            .players
            .iter()
            .filter(|p| !p.kind.is_ai())
            .map(|p| p.id)
            .collect();
        for id in humans {
            let msg = self.game_start_for(id);
            self.outbox.push(Dispatch::To(id, msg));
        }
        self.schedule_ai_turn();
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn has_player(&self, id: Uuid) -> bool {
        self.player(id).is_some()
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn hazards(&self) -> &HazardField {
        &self.hazards
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn wind(&self) -> f32 {
        self.wind
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn current_player(&self) -> &Player {
        &self.players[self.turn_index]
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn winner(&self) -> Option<Uuid> {
        self.winner
    }

    pub fn shot_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Current logical time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.scheduler.now()
    }

    /// Earliest pending timer, if any
    pub fn next_event_ms(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    /// Messages produced since the last drain
    pub fn drain_outbox(&mut self) -> Vec<Dispatch> {
        std::mem::take(&mut self.outbox)
    }

    /// Summary of a completed match, handed out once
    pub fn take_summary(&mut self) -> Option<MatchSummary> {
        self.summary.take()
    }

    /// Override the wind (clamped), e.g. to stage a scenario
    pub fn set_wind(&mut self, wind: f32) {
        self.wind = wind.clamp(-MAX_WIND, MAX_WIND);
    }

    /// Move a tank to rest on the surface at `x`
    pub fn place_player(&mut self, id: Uuid, x: f32) -> bool {
        let y = self.terrain.surface_y(x) - TANK_REST_OFFSET;
        match self.players.iter_mut().find(|p| p.id == id) {
            Some(player) => {
                player.position = Vec2::new(x, y);
                true
            }
            None => false,
        }
    }

    /// Fire a shot for the current player
    ///
    /// Rejected actions leave every part of the session untouched.
    pub fn submit_action(
        &mut self,
        player_id: Uuid,
        angle: f32,
        power: f32,
        weapon: WeaponKind,
    ) -> Result<ShotReport, ActionError> {
        let result = self.fire(player_id, angle, power, weapon);
        if let Err(e) = &result {
            warn!(
                game_id = %self.id,
                player_id = %player_id,
                weapon = %weapon,
                error = %e,
                "Action rejected"
            );
        }
        result
    }

    fn fire(
        &mut self,
        player_id: Uuid,
        angle: f32,
        power: f32,
        weapon: WeaponKind,
    ) -> Result<ShotReport, ActionError> {
        if self.status != SessionStatus::Active {
            return Err(ActionError::NotActive);
        }
        if self.in_flight.is_some() {
            return Err(ActionError::ShotInFlight);
        }
        let shooter = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(ActionError::NotInGame)?;
        if shooter != self.turn_index {
            return Err(ActionError::NotYourTurn);
        }
        if !self.players[shooter].inventory.consume(weapon) {
            return Err(ActionError::OutOfAmmo(weapon));
        }
        self.players[shooter].stats.shots_fired += 1;

        let profile = weapon.stats();
        let params = LaunchParams::new(
            self.players[shooter].position,
            angle,
            power * profile.velocity_modifier,
            self.wind,
        )
        .with_gravity(self.rules.gravity);
        let bounds =
            FlightBounds::around(self.terrain.width() as f32, self.terrain.playfield_height());
        let trajectory = PhysicsEngine::trajectory(&params, &bounds);

        let report = scan_trajectory(
            &trajectory,
            &self.players,
            shooter,
            &self.terrain,
            profile.penetration,
        );

        for (i, point) in trajectory.iter().take(report.impact_index + 1).enumerate() {
            self.scheduler
                .schedule_in(i as u64 * FRAME_MS, SessionEvent::ProjectileFrame(*point));
        }
        self.scheduler
            .schedule_in((report.impact_index as u64 + 1) * FRAME_MS, SessionEvent::ResolveImpact);

        self.in_flight = Some(ShotInFlight {
            shooter,
            weapon,
            impact: report.impact,
        });

        info!(
            game_id = %self.id,
            player_id = %player_id,
            angle,
            power,
            weapon = %weapon,
            impact_x = report.impact.x,
            impact_y = report.impact.y,
            impact = ?report.kind,
            terrain_contacts = report.terrain_contacts,
            "Shot fired"
        );

        Ok(report)
    }

    /// Relay a chat line from a participant
    pub fn chat(&mut self, player_id: Uuid, message: String) -> Result<(), ActionError> {
        let name = self
            .player(player_id)
            .map(|p| p.name.clone())
            .ok_or(ActionError::NotInGame)?;
        self.outbox.push(Dispatch::All(ServerMsg::ChatMessage {
            player_id,
            player_name: name,
            message,
        }));
        Ok(())
    }

    /// Tell the others a participant's connection dropped
    pub fn player_disconnected(&mut self, player_id: Uuid) {
        if self.has_player(player_id) {
            info!(game_id = %self.id, player_id = %player_id, "Player disconnected from game");
            self.outbox
                .push(Dispatch::All(ServerMsg::PlayerDisconnect { player_id }));
        }
    }

    /// Re-send the opening state to a reconnecting participant
    pub fn rejoin(&mut self, player_id: Uuid) -> Result<(), ActionError> {
        if !self.has_player(player_id) {
            return Err(ActionError::NotInGame);
        }
        let start = self.game_start_for(player_id);
        let state = self.game_state();
        self.outbox.push(Dispatch::To(player_id, start));
        self.outbox.push(Dispatch::To(player_id, state));
        info!(game_id = %self.id, player_id = %player_id, "Player rejoined game");
        Ok(())
    }

    /// Run every timer due at or before `now_ms`
    pub fn advance_to(&mut self, now_ms: u64) {
        while let Some(event) = self.scheduler.pop_due(now_ms) {
            self.handle_event(event);
        }
        self.scheduler.advance_to(now_ms);
    }

    /// Run timers until nothing is pending or `limit_ms` is reached
    pub fn run_until_idle(&mut self, limit_ms: u64) {
        while let Some(due) = self.scheduler.next_due() {
            if due > limit_ms {
                break;
            }
            self.advance_to(due);
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ProjectileFrame(p) => {
                self.outbox.push(Dispatch::All(ServerMsg::ProjectileUpdate {
                    x: p.x,
                    y: p.y,
                    vx: p.vx,
                    vy: p.vy,
                }));
            }
            SessionEvent::ResolveImpact => self.resolve_impact(),
            SessionEvent::SecondaryExplosion { at, radius, weapon } => {
                self.outbox.push(Dispatch::All(ServerMsg::ExplosionEvent {
                    x: at.x,
                    y: at.y,
                    radius,
                    weapon,
                    damage: Vec::new(),
                    secondary: true,
                }));
            }
            SessionEvent::AiFire { player_id, decision } => {
                if self.status != SessionStatus::Active {
                    return;
                }
                if let Err(e) =
                    self.submit_action(player_id, decision.angle, decision.power, decision.weapon)
                {
                    error!(game_id = %self.id, player_id = %player_id, error = %e, "AI action failed");
                }
            }
            SessionEvent::HazardFlow => {
                self.flow_scheduled = false;
                if self.status != SessionStatus::Active {
                    return;
                }
                self.hazards.flow(&self.terrain);
                self.outbox.push(Dispatch::All(ServerMsg::HazardUpdate {
                    pools: self.hazards.pools().to_vec(),
                }));
                self.ensure_hazard_ticks();
            }
            SessionEvent::HazardDamage => {
                self.damage_scheduled = false;
                if self.status != SessionStatus::Active {
                    return;
                }
                let hits = self.hazards.damage_tick(&mut self.players);
                if !hits.is_empty() {
                    for hit in &hits {
                        debug!(
                            game_id = %self.id,
                            player_id = %hit.player_id,
                            damage = hit.damage,
                            new_hp = hit.new_hp,
                            "Lava damage"
                        );
                    }
                    self.outbox.push(Dispatch::All(ServerMsg::HazardDamage {
                        damage: hits
                            .iter()
                            .map(|h| DamageReport {
                                player_id: h.player_id,
                                damage: h.damage,
                                new_hp: h.new_hp,
                            })
                            .collect(),
                    }));
                    if let Some(winner) = self.termination() {
                        self.finish(winner);
                        return;
                    }
                }
                self.ensure_hazard_ticks();
            }
        }
    }

    fn resolve_impact(&mut self) {
        let Some(shot) = self.in_flight.take() else {
            return;
        };
        if self.status != SessionStatus::Active {
            return;
        }

        let profile = shot.weapon.stats();
        let damage = self.rules.weapon(shot.weapon).damage;

        let effects = WeaponEffectResolver::resolve(
            shot.weapon,
            shot.impact,
            &mut self.terrain,
            &mut self.hazards,
            &mut self.rng,
        );
        let reports = WeaponEffectResolver::apply_splash(
            shot.impact,
            damage,
            profile.splash_radius,
            shot.shooter,
            &mut self.players,
        );

        for report in &reports {
            info!(
                game_id = %self.id,
                player_id = %report.player_id,
                damage = report.damage,
                new_hp = report.new_hp,
                "Splash damage"
            );
        }

        self.outbox.push(Dispatch::All(ServerMsg::ExplosionEvent {
            x: shot.impact.x,
            y: shot.impact.y,
            radius: profile.explosion_radius,
            weapon: shot.weapon,
            damage: reports,
            secondary: false,
        }));

        for (i, at) in effects.secondary_impacts.iter().enumerate() {
            self.scheduler.schedule_in(
                SECONDARY_DELAY_MS + i as u64 * SECONDARY_STAGGER_MS,
                SessionEvent::SecondaryExplosion {
                    at: *at,
                    radius: effects.secondary_radius,
                    weapon: shot.weapon,
                },
            );
        }

        self.settle_tanks();
        self.ensure_hazard_ticks();
        self.wind = PhysicsEngine::evolve_wind(self.wind, &mut self.rng);

        match self.termination() {
            Some(winner) => self.finish(winner),
            None => self.advance_turn(),
        }
    }

    /// Snap tanks onto the (possibly lowered) surface, with fall damage
    fn settle_tanks(&mut self) {
        for player in self.players.iter_mut().filter(|p| p.is_alive()) {
            let rest_y = self.terrain.surface_y(player.position.x) - TANK_REST_OFFSET;
            let old_y = player.position.y;
            if (old_y - rest_y).abs() <= SETTLE_TOLERANCE {
                continue;
            }

            player.position.y = rest_y;

            let fall = rest_y - old_y;
            if fall > FALL_DAMAGE_THRESHOLD {
                let lost = player.apply_damage((fall / FALL_DAMAGE_DIVISOR).floor() as u32);
                info!(
                    game_id = %self.id,
                    player_id = %player.id,
                    fall_distance = fall,
                    damage = lost,
                    new_hp = player.hp,
                    "Tank took fall damage"
                );
            } else {
                debug!(game_id = %self.id, player_id = %player.id, old_y, new_y = rest_y, "Tank settled");
            }
        }
    }

    fn ensure_hazard_ticks(&mut self) {
        if self.hazards.is_empty() || self.status != SessionStatus::Active {
            return;
        }
        if !self.flow_scheduled {
            self.scheduler.schedule_in(FLOW_INTERVAL_MS, SessionEvent::HazardFlow);
            self.flow_scheduled = true;
        }
        if !self.damage_scheduled {
            self.scheduler.schedule_in(DAMAGE_INTERVAL_MS, SessionEvent::HazardDamage);
            self.damage_scheduled = true;
        }
    }

    /// `Some(winner)` once the match is over
    fn termination(&self) -> Option<Option<Uuid>> {
        let mut alive = self.players.iter().filter(|p| p.is_alive());
        let first_alive = alive.next();
        if alive.next().is_none() {
            return Some(first_alive.map(|p| p.id));
        }

        if self.turn_number >= self.config.max_turns {
            let leader = self
                .players
                .iter()
                .fold(None::<&Player>, |best, p| match best {
                    Some(b) if b.hp >= p.hp => Some(b),
                    _ => Some(p),
                });
            return Some(leader.map(|p| p.id));
        }

        None
    }

    /// Hand the turn to the next living tank
    ///
    /// A destroyed tank still uses up its turn number, so the holder is
    /// always `(turn_number - 1) % players`.
    fn advance_turn(&mut self) {
        let count = self.players.len();
        loop {
            self.turn_number += 1;
            self.turn_index = (self.turn_number as usize - 1) % count;
            if self.players[self.turn_index].is_alive() {
                break;
            }
        }
        self.turn_started_ms = self.scheduler.now();

        let next = self.players[self.turn_index].id;
        info!(
            game_id = %self.id,
            next_player = %next,
            turn_number = self.turn_number,
            wind = self.wind,
            "Turn advanced"
        );

        self.outbox.push(Dispatch::All(ServerMsg::TurnEnd {
            next_turn: next,
            turn_number: self.turn_number,
            wind: self.wind,
        }));
        let state = self.game_state();
        self.outbox.push(Dispatch::All(state));

        self.schedule_ai_turn();
    }

    fn schedule_ai_turn(&mut self) {
        if self.status != SessionStatus::Active {
            return;
        }
        let me = &self.players[self.turn_index];
        let PlayerKind::Ai { difficulty } = me.kind else {
            return;
        };

        let opponents: Vec<&Player> = self
            .players
            .iter()
            .filter(|p| p.id != me.id && p.is_alive())
            .collect();
        let field = Battlefield {
            terrain: &self.terrain,
            wind: self.wind,
            gravity: self.rules.gravity,
        };

        match ai::decide(difficulty, &field, me, &opponents, &mut self.rng) {
            Ok(decision) => {
                info!(
                    game_id = %self.id,
                    player_id = %me.id,
                    difficulty = %difficulty,
                    angle = decision.angle,
                    power = decision.power,
                    weapon = %decision.weapon,
                    thinking_ms = decision.thinking_delay_ms,
                    "AI decided"
                );
                let player_id = me.id;
                self.scheduler.schedule_in(
                    decision.thinking_delay_ms,
                    SessionEvent::AiFire { player_id, decision },
                );
            }
            Err(e) => {
                // Turn stays with the AI until the session is torn down
                error!(game_id = %self.id, player_id = %me.id, error = %e, "AI decision failed");
            }
        }
    }

    fn finish(&mut self, winner: Option<Uuid>) {
        self.status = SessionStatus::Completed;
        self.winner = winner;
        self.in_flight = None;

        info!(
            game_id = %self.id,
            winner = ?winner,
            turns = self.turn_number,
            "Game over"
        );

        self.outbox.push(Dispatch::All(ServerMsg::GameOver {
            winner,
            statistics: build_statistics(&self.players, self.turn_number),
        }));
        self.summary = Some(MatchSummary::build(self.id, &self.players, winner, self.turn_number));
    }

    fn game_start_for(&self, player_id: Uuid) -> ServerMsg {
        ServerMsg::GameStart {
            game_id: self.id,
            player_id,
            players: self.player_views(),
            terrain: self.terrain.heights().to_vec(),
            width: self.terrain.width(),
            height: self.terrain.playfield_height(),
            wind: self.wind,
            current_turn: self.current_player().id,
            turn_number: self.turn_number,
        }
    }

    /// Full state sync message
    pub fn game_state(&self) -> ServerMsg {
        let elapsed_secs = self.scheduler.now().saturating_sub(self.turn_started_ms) / 1000;
        ServerMsg::GameState {
            game_id: self.id,
            players: self.player_views(),
            terrain: self.terrain.heights().to_vec(),
            wind: self.wind,
            current_turn: self.current_player().id,
            turn_number: self.turn_number,
            turn_time_remaining: self.config.turn_duration.as_secs().saturating_sub(elapsed_secs),
            hazards: self.hazards.pools().to_vec(),
        }
    }

    fn player_views(&self) -> Vec<PlayerView> {
        self.players.iter().map(PlayerView::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ai::AiDifficulty;
    use crate::game::hazard::{BASE_TICK_DAMAGE, NAPALM_POOL_COUNT};
    use crate::game::weapons::Ammo;

    fn flat_session(participants: Vec<Participant>) -> GameSession {
        let config = GameConfig::default();
        let terrain = Terrain::flat(config.width, config.height, 200.0);
        let mut session = GameSession::with_terrain(
            Uuid::new_v4(),
            participants,
            RuleSet::default(),
            config,
            terrain,
            ChaCha8Rng::seed_from_u64(7),
        );
        session.set_wind(0.0);
        session
    }

    fn two_humans() -> (GameSession, Uuid, Uuid) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let session = flat_session(vec![Participant::human(a, "Alice"), Participant::human(b, "Bob")]);
        (session, a, b)
    }

    #[test]
    fn test_spawns_rest_on_surface() {
        let (session, _, _) = two_humans();
        for p in session.players() {
            assert_eq!(p.position.y, 400.0 - TANK_REST_OFFSET);
            assert_eq!(p.hp, 100);
        }
        assert!(session.players()[1].position.x - session.players()[0].position.x >= SPAWN_SEPARATION);
    }

    #[test]
    fn test_out_of_turn_rejected_without_mutation() {
        let (mut session, _, b) = two_humans();
        let before = session.player(b).unwrap().inventory.clone();

        let err = session.submit_action(b, 45.0, 50.0, WeaponKind::Heavy).unwrap_err();
        assert_eq!(err, ActionError::NotYourTurn);
        assert_eq!(err.code(), "NOT_YOUR_TURN");
        assert_eq!(session.player(b).unwrap().inventory, before);
        assert_eq!(session.player(b).unwrap().stats.shots_fired, 0);
        assert!(!session.shot_in_flight());
    }

    #[test]
    fn test_unknown_player_rejected() {
        let (mut session, _, _) = two_humans();
        assert_eq!(
            session.submit_action(Uuid::new_v4(), 45.0, 50.0, WeaponKind::Standard),
            Err(ActionError::NotInGame)
        );
    }

    #[test]
    fn test_second_action_during_flight_rejected() {
        let (mut session, a, _) = two_humans();
        session.submit_action(a, 60.0, 60.0, WeaponKind::Standard).unwrap();
        assert_eq!(
            session.submit_action(a, 60.0, 60.0, WeaponKind::Standard),
            Err(ActionError::ShotInFlight)
        );
        assert_eq!(session.turn_index(), 0);
    }

    #[test]
    fn test_resolution_waits_for_flight_time() {
        let (mut session, a, _) = two_humans();
        let report = session.submit_action(a, 60.0, 60.0, WeaponKind::Standard).unwrap();
        let resolve_at = (report.impact_index as u64 + 1) * FRAME_MS;

        session.advance_to(resolve_at - 1);
        assert!(session.shot_in_flight());
        assert_eq!(session.turn_index(), 0);

        let frames = session
            .drain_outbox()
            .into_iter()
            .filter(|d| matches!(d, Dispatch::All(ServerMsg::ProjectileUpdate { .. })))
            .count();
        assert_eq!(frames, report.impact_index + 1);

        session.advance_to(resolve_at);
        assert!(!session.shot_in_flight());
        assert_eq!(session.turn_index(), 1);
        assert_eq!(session.turn_number(), 2);
    }

    #[test]
    fn test_direct_hit_damages_target() {
        let (mut session, a, b) = two_humans();
        // Straight-line shot into a tank standing right next to the shooter
        let shooter_x = session.player(a).unwrap().position.x;
        session.place_player(b, shooter_x + 60.0);

        let report = session.submit_action(a, 0.0, 100.0, WeaponKind::Standard).unwrap();
        assert_eq!(report.kind, ImpactKind::Tank(b));
        session.run_until_idle(60_000);

        let target = session.player(b).unwrap();
        assert!(target.hp < 100);
        assert_eq!(session.player(a).unwrap().stats.shots_hit, 1);
    }

    #[test]
    fn test_grace_window_skips_early_samples() {
        let (session, a, b) = two_humans();
        let shooter = session.players().iter().position(|p| p.id == a).unwrap();
        let start = session.player(a).unwrap().position;
        // Place everything on top of the launch point
        let mut players = session.players().to_vec();
        players[1].position = start;
        let points: Vec<TrajectoryPoint> = (0..=GRACE_SAMPLES)
            .map(|i| TrajectoryPoint {
                x: start.x,
                y: start.y,
                vx: 0.0,
                vy: 0.0,
                t: i as f32 * 0.016,
            })
            .collect();

        let report = scan_trajectory(&points[..GRACE_SAMPLES], &players, shooter, session.terrain(), 0);
        assert_eq!(report.kind, ImpactKind::Expired);

        let report = scan_trajectory(&points, &players, shooter, session.terrain(), 0);
        assert_eq!(report.kind, ImpactKind::Tank(b));
        assert_eq!(report.impact_index, GRACE_SAMPLES);
    }

    #[test]
    fn test_turn_ceiling_picks_highest_hp() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let config = GameConfig {
            max_turns: 2,
            ..GameConfig::default()
        };
        let mut session = GameSession::with_terrain(
            Uuid::new_v4(),
            vec![Participant::human(a, "Alice"), Participant::human(b, "Bob")],
            RuleSet::default(),
            config,
            Terrain::flat(config.width, config.height, 200.0),
            ChaCha8Rng::seed_from_u64(1),
        );
        session.set_wind(0.0);

        // Harmless shots straight up into the sky off to the side
        session.submit_action(a, 170.0, 20.0, WeaponKind::Standard).unwrap();
        session.run_until_idle(60_000);
        assert_eq!(session.status(), SessionStatus::Active);

        session.submit_action(b, 10.0, 20.0, WeaponKind::Standard).unwrap();
        session.run_until_idle(60_000);

        assert_eq!(session.status(), SessionStatus::Completed);
        // Equal hp resolves to list order
        let hp_a = session.player(a).unwrap().hp;
        let hp_b = session.player(b).unwrap().hp;
        let expected = if hp_b > hp_a { b } else { a };
        assert_eq!(session.winner(), Some(expected));
        assert!(session.take_summary().is_some());
        assert!(session.take_summary().is_none());

        assert_eq!(
            session.submit_action(a, 45.0, 50.0, WeaponKind::Standard),
            Err(ActionError::NotActive)
        );
    }

    #[test]
    fn test_ai_opening_turn_fires_automatically() {
        let human = Uuid::new_v4();
        let mut session = flat_session(vec![
            Participant::ai(AiDifficulty::Easy),
            Participant::human(human, "Alice"),
        ]);
        session.start();

        let opening = session.drain_outbox();
        assert!(opening
            .iter()
            .any(|d| matches!(d, Dispatch::To(id, ServerMsg::GameStart { .. }) if *id == human)));
        assert_eq!(session.player(human).map(|p| p.kind), Some(PlayerKind::Human));

        session.run_until_idle(60_000);
        assert_eq!(session.players()[0].stats.shots_fired, 1);
        assert_eq!(session.turn_index(), 1);
    }

    #[test]
    fn test_ai_without_ammo_stalls() {
        let human = Uuid::new_v4();
        let mut rules = RuleSet::default();
        for kind in WeaponKind::ALL {
            rules.weapons.get_mut(&kind).unwrap().ammo = Ammo::Count(0);
        }
        let config = GameConfig::default();
        let mut session = GameSession::with_terrain(
            Uuid::new_v4(),
            vec![Participant::ai(AiDifficulty::Medium), Participant::human(human, "Alice")],
            rules,
            config,
            Terrain::flat(config.width, config.height, 200.0),
            ChaCha8Rng::seed_from_u64(3),
        );
        session.start();
        session.run_until_idle(60_000);

        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.turn_index(), 0);
        assert_eq!(session.next_event_ms(), None);
    }

    #[test]
    fn test_cluster_secondaries_are_staggered_and_harmless() {
        let (mut session, a, _) = two_humans();
        session.submit_action(a, 60.0, 60.0, WeaponKind::Cluster).unwrap();
        session.run_until_idle(60_000);

        let explosions: Vec<_> = session
            .drain_outbox()
            .into_iter()
            .filter_map(|d| match d {
                Dispatch::All(ServerMsg::ExplosionEvent { secondary, damage, .. }) => {
                    Some((secondary, damage))
                }
                _ => None,
            })
            .collect();

        assert_eq!(explosions.len(), 6);
        assert!(!explosions[0].0);
        assert!(explosions[1..].iter().all(|(secondary, damage)| *secondary && damage.is_empty()));
    }

    #[test]
    fn test_napalm_pools_burn_standing_tank() {
        let (mut session, a, b) = two_humans();
        let shooter_x = session.player(a).unwrap().position.x;
        session.place_player(b, shooter_x + 60.0);

        let report = session.submit_action(a, 0.0, 100.0, WeaponKind::Napalm).unwrap();
        let resolved_at = (report.impact_index as u64 + 1) * FRAME_MS;
        session.advance_to(resolved_at);
        assert_eq!(session.hazards().pools().len(), NAPALM_POOL_COUNT);

        session.advance_to(resolved_at + FLOW_INTERVAL_MS);
        assert!(session
            .drain_outbox()
            .iter()
            .any(|d| matches!(d, Dispatch::All(ServerMsg::HazardUpdate { .. }))));

        // Stand Bob in the middle of a pool before the first burn
        let pool = session.hazards().pools()[0].position();
        let bob = session.players.iter().position(|p| p.id == b).unwrap();
        session.players[bob].position = pool;
        let hp_before = session.players[bob].hp;
        let intensity = session.hazards().pool_at(pool).unwrap().intensity;

        session.advance_to(resolved_at + DAMAGE_INTERVAL_MS);

        let burns: Vec<DamageReport> = session
            .drain_outbox()
            .into_iter()
            .filter_map(|d| match d {
                Dispatch::All(ServerMsg::HazardDamage { damage }) => Some(damage),
                _ => None,
            })
            .flatten()
            .collect();
        let burn = burns.iter().find(|r| r.player_id == b).unwrap();
        assert_eq!(burn.damage, (BASE_TICK_DAMAGE * intensity).floor() as u32);
        assert!(burn.new_hp < hp_before);
        assert_eq!(session.player(b).unwrap().hp, burn.new_hp);
    }

    #[test]
    fn test_mutual_elimination_is_a_draw() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rules = RuleSet::default();
        rules.weapons.get_mut(&WeaponKind::Standard).unwrap().damage = 1000;
        let config = GameConfig::default();
        let mut session = GameSession::with_terrain(
            Uuid::new_v4(),
            vec![Participant::human(a, "Alice"), Participant::human(b, "Bob")],
            rules,
            config,
            Terrain::flat(config.width, config.height, 200.0),
            ChaCha8Rng::seed_from_u64(11),
        );
        session.set_wind(0.0);
        let shooter_x = session.player(a).unwrap().position.x;
        session.place_player(b, shooter_x + 20.0);

        // Weak vertical lob comes down between both tanks
        let report = session.submit_action(a, 90.0, 5.0, WeaponKind::Standard).unwrap();
        assert_eq!(report.kind, ImpactKind::Terrain);
        session.run_until_idle(60_000);

        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(session.winner().is_none());
        assert!(session.players().iter().all(|p| p.hp == 0));

        let game_overs: Vec<Option<Uuid>> = session
            .drain_outbox()
            .into_iter()
            .filter_map(|d| match d {
                Dispatch::All(ServerMsg::GameOver { winner, .. }) => Some(winner),
                _ => None,
            })
            .collect();
        assert_eq!(game_overs, vec![None]);

        let summary = session.take_summary().unwrap();
        assert!(summary.winner.is_none());
    }

    #[test]
    fn test_destroyed_tank_forfeits_its_turn_slot() {
        let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut session = flat_session(vec![
            Participant::human(ids[0], "Alice"),
            Participant::human(ids[1], "Bob"),
            Participant::human(ids[2], "Carol"),
        ]);
        session.players[1].hp = 0;

        // Lob off the left edge
        session.submit_action(ids[0], 135.0, 100.0, WeaponKind::Standard).unwrap();
        session.run_until_idle(60_000);

        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.current_player().id, ids[2]);
        assert_eq!(session.turn_number(), 3);
        assert_eq!(session.turn_index(), (session.turn_number() as usize - 1) % 3);
    }

    #[test]
    fn test_fall_damage_after_deep_crater() {
        let (mut session, a, b) = two_humans();
        let shooter_x = session.player(a).unwrap().position.x;
        session.place_player(b, shooter_x + 60.0);
        let before_y = session.player(b).unwrap().position.y;

        // Carve the ground out from under Bob without touching his hp
        let under = Vec2::new(shooter_x + 60.0, 420.0);
        session.terrain.carve(under, 60.0, crate::game::terrain::CraterShape::Standard);
        session.settle_tanks();

        let bob = session.player(b).unwrap();
        let fall = bob.position.y - before_y;
        assert!(fall > FALL_DAMAGE_THRESHOLD);
        assert_eq!(bob.hp, 100 - (fall / FALL_DAMAGE_DIVISOR).floor() as u32);
    }
}
