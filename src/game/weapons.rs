//! Weapon catalog, ammo bookkeeping and impact effect resolution

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hazard::{HazardField, NAPALM_POOL_COUNT};
use super::physics::{PhysicsEngine, Vec2};
use super::player::Player;
use super::rules::RuleSet;
use super::terrain::{CraterShape, Terrain};

const CLUSTER_BOMBLETS: usize = 5;
const MIRV_SPACING: f32 = 40.0;
const MIRV_JITTER: f32 = 20.0;
/// Terrain contacts a digger survives before detonating
pub const DIGGER_PENETRATION: u32 = 3;

/// Every weapon a tank can fire
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Standard,
    Heavy,
    Cluster,
    Mirv,
    Digger,
    Napalm,
}

impl WeaponKind {
    /// Catalog order; also the fallback order when a weapon runs dry
    pub const ALL: [WeaponKind; 6] = [
        WeaponKind::Standard,
        WeaponKind::Heavy,
        WeaponKind::Cluster,
        WeaponKind::Mirv,
        WeaponKind::Digger,
        WeaponKind::Napalm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WeaponKind::Standard => "standard",
            WeaponKind::Heavy => "heavy",
            WeaponKind::Cluster => "cluster",
            WeaponKind::Mirv => "mirv",
            WeaponKind::Digger => "digger",
            WeaponKind::Napalm => "napalm",
        }
    }

    /// Base catalog entry
    pub fn stats(self) -> WeaponStats {
        let (damage, splash_radius, explosion_radius, ammo) = match self {
            WeaponKind::Standard => (30, 30.0, 35.0, Ammo::Unlimited),
            WeaponKind::Heavy => (50, 50.0, 60.0, Ammo::Count(3)),
            WeaponKind::Cluster => (20, 25.0, 30.0, Ammo::Count(3)),
            WeaponKind::Mirv => (35, 35.0, 40.0, Ammo::Count(3)),
            WeaponKind::Digger => (40, 40.0, 45.0, Ammo::Count(3)),
            WeaponKind::Napalm => (15, 40.0, 35.0, Ammo::Count(2)),
        };

        WeaponStats {
            kind: self,
            damage,
            splash_radius,
            explosion_radius,
            ammo,
            velocity_modifier: if self == WeaponKind::Heavy { 0.8 } else { 1.0 },
            penetration: if self == WeaponKind::Digger {
                DIGGER_PENETRATION
            } else {
                0
            },
        }
    }
}

impl std::fmt::Display for WeaponKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaining shots for one weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ammo {
    Unlimited,
    Count(u32),
}

impl Ammo {
    pub fn is_available(&self) -> bool {
        match self {
            Ammo::Unlimited => true,
            Ammo::Count(n) => *n > 0,
        }
    }

    /// Spend one shot; false when empty
    pub fn consume(&mut self) -> bool {
        match self {
            Ammo::Unlimited => true,
            Ammo::Count(0) => false,
            Ammo::Count(n) => {
                *n -= 1;
                true
            }
        }
    }
}

/// Static weapon properties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    pub kind: WeaponKind,
    pub damage: u32,
    pub splash_radius: f32,
    /// Crater radius
    pub explosion_radius: f32,
    pub ammo: Ammo,
    /// Scales launch power
    pub velocity_modifier: f32,
    pub penetration: u32,
}

/// Per-player ammo by weapon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeaponInventory {
    ammo: BTreeMap<WeaponKind, Ammo>,
}

impl WeaponInventory {
    pub fn from_rules(rules: &RuleSet) -> Self {
        let ammo = WeaponKind::ALL
            .iter()
            .map(|&kind| (kind, rules.weapon(kind).ammo))
            .collect();
        Self { ammo }
    }

    pub fn ammo(&self, kind: WeaponKind) -> Ammo {
        self.ammo.get(&kind).copied().unwrap_or(Ammo::Count(0))
    }

    pub fn has_ammo(&self, kind: WeaponKind) -> bool {
        self.ammo(kind).is_available()
    }

    /// Spend one round of `kind`; false (and no change) when empty
    pub fn consume(&mut self, kind: WeaponKind) -> bool {
        self.ammo.get_mut(&kind).map_or(false, Ammo::consume)
    }

    /// First weapon in catalog order that can still fire
    pub fn first_available(&self) -> Option<WeaponKind> {
        WeaponKind::ALL.into_iter().find(|&k| self.has_ammo(k))
    }
}

impl Default for WeaponInventory {
    fn default() -> Self {
        Self::from_rules(&RuleSet::default())
    }
}

/// Damage one player took from an explosion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    pub player_id: Uuid,
    pub damage: u32,
    pub new_hp: u32,
}

/// Terrain and hazard side effects of one detonation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpactEffects {
    /// Sub-impacts that crater but deal no damage of their own
    pub secondary_impacts: Vec<Vec2>,
    pub secondary_radius: f32,
    pub pools_spawned: usize,
}

/// Applies weapon effects at an impact point
pub struct WeaponEffectResolver;

impl WeaponEffectResolver {
    /// Carve craters and spawn hazards for a detonation at `impact`
    pub fn resolve<R: Rng + ?Sized>(
        kind: WeaponKind,
        impact: Vec2,
        terrain: &mut Terrain,
        hazards: &mut HazardField,
        rng: &mut R,
    ) -> ImpactEffects {
        let profile = kind.stats();
        let radius = profile.explosion_radius;
        let mut effects = ImpactEffects {
            secondary_radius: radius,
            ..Default::default()
        };

        match kind {
            WeaponKind::Standard | WeaponKind::Heavy => {
                terrain.carve(impact, radius, CraterShape::Standard);
            }
            WeaponKind::Cluster => {
                terrain.carve(impact, radius * 0.5, CraterShape::Standard);
                for i in 0..CLUSTER_BOMBLETS {
                    let angle = TAU * i as f32 / CLUSTER_BOMBLETS as f32 + rng.gen_range(0.0..0.5);
                    let distance = 20.0 + rng.gen_range(0.0..30.0);
                    let bomblet = Vec2::new(
                        impact.x + angle.cos() * distance,
                        impact.y + angle.sin() * distance,
                    );
                    terrain.carve(bomblet, radius, CraterShape::Standard);
                    effects.secondary_impacts.push(bomblet);
                }
            }
            WeaponKind::Mirv => {
                for offset in [-MIRV_SPACING, 0.0, MIRV_SPACING] {
                    let warhead =
                        Vec2::new(impact.x + offset, impact.y + rng.gen_range(0.0..MIRV_JITTER));
                    terrain.carve(warhead, radius, CraterShape::Standard);
                    effects.secondary_impacts.push(warhead);
                }
            }
            WeaponKind::Digger => {
                terrain.carve(impact, radius, CraterShape::Burrow);
            }
            WeaponKind::Napalm => {
                terrain.carve(impact, radius * 0.5, CraterShape::Standard);
                hazards.spawn_ring(impact, NAPALM_POOL_COUNT, rng);
                effects.pools_spawned = NAPALM_POOL_COUNT;
            }
        }

        effects
    }

    /// Splash damage from the primary impact; credits the shooter for hits on others
    pub fn apply_splash(
        impact: Vec2,
        damage: u32,
        splash_radius: f32,
        shooter: usize,
        players: &mut [Player],
    ) -> Vec<DamageReport> {
        let mut reports = Vec::new();
        let mut dealt_to_others = 0;

        for (idx, player) in players.iter_mut().enumerate() {
            if !player.is_alive() {
                continue;
            }

            let amount = PhysicsEngine::splash_damage(impact, player.position, splash_radius, damage);
            if amount == 0 {
                continue;
            }

            let lost = player.apply_damage(amount);
            if idx != shooter {
                dealt_to_others += lost;
            }
            reports.push(DamageReport {
                player_id: player.id,
                damage: lost,
                new_hp: player.hp,
            });
        }

        if dealt_to_others > 0 {
            if let Some(shooter) = players.get_mut(shooter) {
                shooter.stats.damage_dealt += dealt_to_others;
                shooter.stats.shots_hit += 1;
            }
        }

        reports
    }
}
