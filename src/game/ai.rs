//! Computer opponents
//!
//! Each difficulty is a pure function of the battlefield, the AI's own tank
//! and its living opponents. The pacing delay is returned with the decision
//! and scheduled by the session; nothing here waits.

use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::physics::{FlightBounds, LaunchParams, PhysicsEngine, Vec2};
use super::player::Player;
use super::terrain::Terrain;
use super::weapons::{WeaponInventory, WeaponKind};

/// Power needed to reach this distance in a straight-line estimate
const POWER_DISTANCE_SCALE: f32 = 600.0;
const WIND_ANGLE_FACTOR: f32 = 2.0;
const BASE_THINKING_MS: f32 = 2000.0;
const THINKING_SPREAD_MS: f32 = 2000.0;
const HARD_MIN_THINKING_MS: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiDifficulty {
    Easy,
    Medium,
    Hard,
}

impl AiDifficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            AiDifficulty::Easy => "easy",
            AiDifficulty::Medium => "medium",
            AiDifficulty::Hard => "hard",
        }
    }

    /// Display name of the computer player
    pub fn player_name(self) -> &'static str {
        match self {
            AiDifficulty::Easy => "CPU-Novice",
            AiDifficulty::Medium => "CPU-Alpha",
            AiDifficulty::Hard => "CPU-Elite",
        }
    }
}

impl std::fmt::Display for AiDifficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "medium" => Ok(AiDifficulty::Medium),
            "hard" => Ok(AiDifficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AiError {
    #[error("no living opponent to target")]
    NoTarget,

    #[error("no weapon with remaining ammo")]
    NoAmmo,
}

/// A fully formed shot plus how long to pretend to think about it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiDecision {
    pub angle: f32,
    pub power: f32,
    pub weapon: WeaponKind,
    pub thinking_delay_ms: u64,
}

/// Read-only battlefield view the AI plans against
#[derive(Debug, Clone, Copy)]
pub struct Battlefield<'a> {
    pub terrain: &'a Terrain,
    pub wind: f32,
    pub gravity: f32,
}

/// Pick a shot for `me` at the given difficulty
pub fn decide<R: Rng + ?Sized>(
    difficulty: AiDifficulty,
    field: &Battlefield<'_>,
    me: &Player,
    opponents: &[&Player],
    rng: &mut R,
) -> Result<AiDecision, AiError> {
    match difficulty {
        AiDifficulty::Easy => decide_easy(field, me, opponents, rng),
        AiDifficulty::Medium => decide_medium(field, me, opponents, rng),
        AiDifficulty::Hard => decide_hard(field, me, opponents, rng),
    }
}

fn decide_easy<R: Rng + ?Sized>(
    field: &Battlefield<'_>,
    me: &Player,
    opponents: &[&Player],
    rng: &mut R,
) -> Result<AiDecision, AiError> {
    let target = nearest_target(me, opponents).ok_or(AiError::NoTarget)?;

    let (angle, power) = direct_aim(me.position, target.position, None);
    let (mut angle, mut power) = add_noise(angle, power, 50.0, 60.0, rng);

    if rng.gen::<f32>() < 0.1 {
        angle = rng.gen_range(0.0..180.0);
        power = rng.gen_range(0.0..100.0);
    }

    Ok(AiDecision {
        angle,
        power,
        weapon: gate_weapon(WeaponKind::Standard, &me.inventory)?,
        thinking_delay_ms: thinking_delay(AiDifficulty::Easy, rng),
    })
}

fn decide_medium<R: Rng + ?Sized>(
    field: &Battlefield<'_>,
    me: &Player,
    opponents: &[&Player],
    rng: &mut R,
) -> Result<AiDecision, AiError> {
    let target = nearest_target(me, opponents).ok_or(AiError::NoTarget)?;
    let distance = me.position.distance(target.position);

    let wind = (rng.gen::<f32>() > 0.3).then_some(field.wind);
    let (angle, power) = direct_aim(me.position, target.position, wind);
    let (mut angle, mut power) = add_noise(angle, power, 20.0, 30.0, rng);

    if rng.gen::<f32>() < 0.05 {
        (angle, power) = add_noise(angle, power, 60.0, 50.0, rng);
    }

    let choice = medium_weapon(distance, &me.inventory, rng);

    Ok(AiDecision {
        angle,
        power,
        weapon: gate_weapon(choice, &me.inventory)?,
        thinking_delay_ms: thinking_delay(AiDifficulty::Medium, rng),
    })
}

fn decide_hard<R: Rng + ?Sized>(
    field: &Battlefield<'_>,
    me: &Player,
    opponents: &[&Player],
    rng: &mut R,
) -> Result<AiDecision, AiError> {
    let target = nearest_target(me, opponents).ok_or(AiError::NoTarget)?;
    let distance = me.position.distance(target.position);

    let (best_angle, best_power, best_error) = plan_shot(field, me.position, target.position);

    let (mut angle, mut power) = add_noise(best_angle, best_power, 6.0, 10.0, rng);

    if rng.gen::<f32>() < 0.05 {
        (angle, power) = add_noise(angle, power, 30.0, 20.0, rng);
    }

    let choice = hard_weapon(distance, best_error, &me.inventory, rng);

    Ok(AiDecision {
        angle,
        power,
        weapon: gate_weapon(choice, &me.inventory)?,
        thinking_delay_ms: thinking_delay(AiDifficulty::Hard, rng),
    })
}

/// Coarse grid search over angle and power, then a unit-step local refinement
///
/// Returns the best angle, power and the distance from its impact to `target`
/// (infinite when no candidate lands on the playfield).
pub fn plan_shot(field: &Battlefield<'_>, from: Vec2, target: Vec2) -> (f32, f32, f32) {
    let score = |angle: f32, power: f32| {
        simulate_impact(field, from, angle, power).map(|impact| impact.distance(target))
    };

    let mut best = (45.0, 50.0, f32::INFINITY);

    for angle in (20..=160).step_by(10) {
        for power in (30..=100).step_by(10) {
            let (angle, power) = (angle as f32, power as f32);
            match score(angle, power) {
                Some(error) if error < best.2 => best = (angle, power, error),
                _ => {}
            }
        }
    }

    let (coarse_angle, coarse_power, _) = best;
    for angle_offset in -5..=5 {
        for power_offset in -5..=5 {
            let angle = coarse_angle + angle_offset as f32;
            let power = coarse_power + power_offset as f32;
            if !(0.0..=180.0).contains(&angle) || !(0.0..=100.0).contains(&power) {
                continue;
            }
            match score(angle, power) {
                Some(error) if error < best.2 => best = (angle, power, error),
                _ => {}
            }
        }
    }

    best
}

/// Closest opponent by straight-line distance; first one wins ties
pub fn nearest_target<'a>(me: &Player, opponents: &[&'a Player]) -> Option<&'a Player> {
    opponents.iter().copied().min_by(|a, b| {
        a.position
            .distance(me.position)
            .total_cmp(&b.position.distance(me.position))
    })
}

/// Straight-line angle and a distance-proportional power
pub fn direct_aim(from: Vec2, to: Vec2, wind: Option<f32>) -> (f32, f32) {
    let dx = to.x - from.x;
    // Screen y grows downward
    let dy = from.y - to.y;

    let mut angle = dy.atan2(dx).to_degrees();
    if let Some(wind) = wind {
        angle += wind * WIND_ANGLE_FACTOR;
    }

    let distance = (dx * dx + dy * dy).sqrt();
    let power = (distance / POWER_DISTANCE_SCALE * 100.0).min(100.0);

    (angle.clamp(0.0, 180.0), power)
}

/// Symmetric uniform noise, clamped to the legal ranges
pub fn add_noise<R: Rng + ?Sized>(
    angle: f32,
    power: f32,
    angle_variance: f32,
    power_variance: f32,
    rng: &mut R,
) -> (f32, f32) {
    let angle_noise = (rng.gen::<f32>() - 0.5) * angle_variance;
    let power_noise = (rng.gen::<f32>() - 0.5) * power_variance;
    (
        (angle + angle_noise).clamp(0.0, 180.0),
        (power + power_noise).clamp(0.0, 100.0),
    )
}

/// Range-based weapon pick
pub fn medium_weapon<R: Rng + ?Sized>(
    distance: f32,
    inventory: &WeaponInventory,
    rng: &mut R,
) -> WeaponKind {
    if distance > 500.0 && inventory.has_ammo(WeaponKind::Heavy) {
        WeaponKind::Heavy
    } else if distance > 300.0 && distance < 500.0 && inventory.has_ammo(WeaponKind::Cluster) {
        WeaponKind::Cluster
    } else if distance > 200.0 && distance < 600.0 && inventory.has_ammo(WeaponKind::Mirv) {
        WeaponKind::Mirv
    } else if inventory.has_ammo(WeaponKind::Digger) && rng.gen::<f32>() < 0.2 {
        WeaponKind::Digger
    } else {
        WeaponKind::Standard
    }
}

/// Weapon pick that also weighs how close the planned shot lands
pub fn hard_weapon<R: Rng + ?Sized>(
    distance: f32,
    aim_error: f32,
    inventory: &WeaponInventory,
    rng: &mut R,
) -> WeaponKind {
    if aim_error < 30.0 && distance < 400.0 && inventory.has_ammo(WeaponKind::Heavy) {
        WeaponKind::Heavy
    } else if aim_error > 30.0 && aim_error < 100.0 && inventory.has_ammo(WeaponKind::Cluster) {
        WeaponKind::Cluster
    } else if distance > 400.0 && inventory.has_ammo(WeaponKind::Mirv) {
        WeaponKind::Mirv
    } else if aim_error < 20.0 && inventory.has_ammo(WeaponKind::Digger) && rng.gen::<f32>() < 0.3 {
        WeaponKind::Digger
    } else {
        WeaponKind::Standard
    }
}

fn gate_weapon(choice: WeaponKind, inventory: &WeaponInventory) -> Result<WeaponKind, AiError> {
    if inventory.has_ammo(choice) {
        Ok(choice)
    } else {
        inventory.first_available().ok_or(AiError::NoAmmo)
    }
}

fn thinking_delay<R: Rng + ?Sized>(difficulty: AiDifficulty, rng: &mut R) -> u64 {
    let base = BASE_THINKING_MS + rng.gen::<f32>() * THINKING_SPREAD_MS;
    let delay = match difficulty {
        AiDifficulty::Hard => (base * 0.5).max(HARD_MIN_THINKING_MS),
        _ => base,
    };
    delay as u64
}

/// First terrain contact inside the playfield, ignoring tanks
fn simulate_impact(field: &Battlefield<'_>, start: Vec2, angle: f32, power: f32) -> Option<Vec2> {
    let width = field.terrain.width() as f32;
    let height = field.terrain.playfield_height();
    let params = LaunchParams::new(start, angle, power, field.wind).with_gravity(field.gravity);
    let points = PhysicsEngine::trajectory(&params, &FlightBounds::around(width, height));

    for point in points {
        if point.x < 0.0 || point.x > width || point.y > height {
            return None;
        }
        if point.x < width && field.terrain.check_collision(point.x, point.y) {
            return Some(point.position());
        }
    }
    None
}
