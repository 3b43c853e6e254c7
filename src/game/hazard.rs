//! Lava pools left behind by napalm: spawning, downhill flow and burn damage

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::physics::Vec2;
use super::player::Player;
use super::terrain::Terrain;

/// Flow simulation interval
pub const FLOW_INTERVAL_MS: u64 = 500;
/// Burn damage interval
pub const DAMAGE_INTERVAL_MS: u64 = 1000;
/// Damage at full intensity per damage tick
pub const BASE_TICK_DAMAGE: f32 = 5.0;
/// Pools below this intensity are removed
pub const MIN_INTENSITY: f32 = 0.3;
/// Pools spawned by one napalm impact
pub const NAPALM_POOL_COUNT: usize = 6;

const POOL_RADIUS: f32 = 15.0;
/// Flow ticks a pool burns before it starts cooling
const BURN_TICKS: u32 = 20;
/// Height difference that starts a pool flowing
const FLOW_SLOPE: f32 = 2.0;
/// Height difference below which ground counts as flat
const FLAT_SLOPE: f32 = 1.0;
const FLOW_STEP: f32 = 1.0;
const FLOW_RETENTION: f32 = 0.98;
const POOLING_GAIN: f32 = 1.05;
const MERGE_SHARE: f32 = 0.3;
const COOLING_RETENTION: f32 = 0.5;

/// A transient patch of burning ground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LavaPool {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// In (0, 1]; scales damage and visuals
    pub intensity: f32,
    #[serde(skip)]
    burn_ticks: u32,
}

impl LavaPool {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Burn damage dealt to one player in a damage tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardHit {
    pub player_id: Uuid,
    pub damage: u32,
    pub new_hp: u32,
}

/// All lava pools in a session
#[derive(Debug, Clone, Default)]
pub struct HazardField {
    pools: Vec<LavaPool>,
    next_id: u32,
}

impl HazardField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pools(&self) -> &[LavaPool] {
        &self.pools
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn clear(&mut self) {
        self.pools.clear();
    }

    /// Add a single pool (used by tests and replays)
    pub fn insert(&mut self, position: Vec2, radius: f32, intensity: f32) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.pools.push(LavaPool {
            id,
            x: position.x,
            y: position.y,
            radius,
            intensity: intensity.clamp(0.0, 1.0),
            burn_ticks: BURN_TICKS,
        });
        id
    }

    /// Scatter `count` pools in a ring around an impact
    pub fn spawn_ring<R: Rng + ?Sized>(&mut self, center: Vec2, count: usize, rng: &mut R) {
        for i in 0..count {
            let angle = std::f32::consts::TAU * i as f32 / count as f32 + rng.gen_range(-0.15..0.15);
            let distance = 10.0 + rng.gen_range(0.0..20.0);
            let position = Vec2::new(
                center.x + angle.cos() * distance,
                center.y + angle.sin() * distance,
            );
            let intensity = 0.8 + rng.gen_range(0.0..0.2);
            self.insert(position, POOL_RADIUS, intensity);
        }
    }

    /// First pool covering a point
    pub fn pool_at(&self, point: Vec2) -> Option<&LavaPool> {
        self.pools
            .iter()
            .find(|pool| pool.position().distance(point) <= pool.radius)
    }

    /// Advance the flow simulation by one tick
    pub fn flow(&mut self, terrain: &Terrain) {
        let heights = terrain.heights();
        let width = heights.len();

        let mut i = 0;
        while i < self.pools.len() {
            let column = self.pools[i].x.floor();
            if column < 1.0 || column >= (width as f32 - 1.0) {
                self.pools.remove(i);
                continue;
            }
            let xi = column as usize;

            let left_slope = heights[xi] - heights[xi - 1];
            let right_slope = heights[xi] - heights[xi + 1];

            let step = if left_slope > FLOW_SLOPE && left_slope > right_slope {
                -FLOW_STEP
            } else if right_slope > FLOW_SLOPE && right_slope > left_slope {
                FLOW_STEP
            } else {
                0.0
            };

            if step != 0.0 {
                let pool = &mut self.pools[i];
                pool.x += step;
                pool.y = terrain.surface_y(pool.x);
                pool.intensity *= FLOW_RETENTION;
            } else if left_slope.abs() < FLAT_SLOPE && right_slope.abs() < FLAT_SLOPE {
                self.pools[i].intensity = (self.pools[i].intensity * POOLING_GAIN).min(1.0);
                let removed_before = self.absorb_neighbors(i);
                i -= removed_before;
            }

            let pool = &mut self.pools[i];
            if pool.burn_ticks > 0 {
                pool.burn_ticks -= 1;
            } else {
                pool.intensity *= COOLING_RETENTION;
            }

            i += 1;
        }

        self.pools.retain(|pool| pool.intensity >= MIN_INTENSITY);
    }

    /// Merge every pool overlapping pool `index` into it
    ///
    /// Returns how many removed pools sat before `index` in the list.
    fn absorb_neighbors(&mut self, index: usize) -> usize {
        let center = self.pools[index].position();
        let radius = self.pools[index].radius;

        let absorbed: Vec<usize> = self
            .pools
            .iter()
            .enumerate()
            .filter(|(j, other)| *j != index && other.position().distance(center) < radius)
            .map(|(j, _)| j)
            .collect();

        if absorbed.is_empty() {
            return 0;
        }

        let mut intensity = self.pools[index].intensity;
        for &j in &absorbed {
            intensity = (intensity + self.pools[j].intensity * MERGE_SHARE).min(1.0);
        }
        self.pools[index].intensity = intensity;

        let removed_before = absorbed.iter().filter(|&&j| j < index).count();
        for &j in absorbed.iter().rev() {
            self.pools.remove(j);
        }
        removed_before
    }

    /// Burn every living player standing in a pool
    pub fn damage_tick(&self, players: &mut [Player]) -> Vec<HazardHit> {
        let mut hits = Vec::new();

        for player in players.iter_mut().filter(|p| p.is_alive()) {
            let Some(pool) = self.pool_at(player.position) else {
                continue;
            };

            let damage = (BASE_TICK_DAMAGE * pool.intensity).floor() as u32;
            if damage == 0 {
                continue;
            }

            let lost = player.apply_damage(damage);
            hits.push(HazardHit {
                player_id: player.id,
                damage: lost,
                new_hp: player.hp,
            });
        }

        hits
    }
}
