//! Per-match rule sets supplied by the first entrant

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::physics::DEFAULT_GRAVITY;
use super::weapons::{Ammo, WeaponKind};

pub const MIN_GRAVITY: f32 = 100.0;
pub const MAX_GRAVITY: f32 = 5000.0;
pub const MAX_WEAPON_DAMAGE: u32 = 100;
pub const MAX_AMMO: u32 = 99;

#[derive(Debug, Error, PartialEq)]
pub enum RulesError {
    #[error("gravity {0} outside [{MIN_GRAVITY}, {MAX_GRAVITY}]")]
    Gravity(f32),

    #[error("{weapon} damage {value} outside [1, {MAX_WEAPON_DAMAGE}]")]
    Damage { weapon: WeaponKind, value: u32 },

    #[error("{weapon} ammo {value} exceeds {MAX_AMMO}")]
    Ammo { weapon: WeaponKind, value: u32 },
}

impl RulesError {
    pub fn code(&self) -> &'static str {
        "INVALID_SETTINGS"
    }
}

/// Overridable values for one weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponRule {
    pub damage: u32,
    pub ammo: Ammo,
}

/// Gravity and weapon overrides for a match
///
/// Deserialization fills any omitted field from the defaults, so clients
/// may send only the values they want to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub gravity: f32,
    pub weapons: BTreeMap<WeaponKind, WeaponRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let weapons = WeaponKind::ALL
            .iter()
            .map(|&kind| {
                let profile = kind.stats();
                (
                    kind,
                    WeaponRule {
                        damage: profile.damage,
                        ammo: profile.ammo,
                    },
                )
            })
            .collect();

        Self {
            gravity: DEFAULT_GRAVITY,
            weapons,
        }
    }
}

impl RuleSet {
    /// Rule for a weapon, falling back to the catalog when not overridden
    pub fn weapon(&self, kind: WeaponKind) -> WeaponRule {
        self.weapons.get(&kind).copied().unwrap_or_else(|| {
            let profile = kind.stats();
            WeaponRule {
                damage: profile.damage,
                ammo: profile.ammo,
            }
        })
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        if !self.gravity.is_finite() || !(MIN_GRAVITY..=MAX_GRAVITY).contains(&self.gravity) {
            return Err(RulesError::Gravity(self.gravity));
        }

        for (&weapon, rule) in &self.weapons {
            if rule.damage == 0 || rule.damage > MAX_WEAPON_DAMAGE {
                return Err(RulesError::Damage {
                    weapon,
                    value: rule.damage,
                });
            }
            if let Ammo::Count(value) = rule.ammo {
                if value > MAX_AMMO {
                    return Err(RulesError::Ammo { weapon, value });
                }
            }
        }

        Ok(())
    }
}
