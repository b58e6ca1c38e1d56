//! Homeostasis: the agent's normalized internal-drive state.
//!
//! The stored state is always fully populated over the eight drives; values
//! are clamped to `[0, 1]` and rounded to two decimal places before storage.
//! Derivation from a raw bot observation is partial — fields that cannot be
//! derived are absent and keep their carried value on merge.

use serde::{Deserialize, Serialize};

/// Day-phase boundary ticks (Minecraft-style clock, 24000 ticks/day).
pub const NIGHT_START_TICK: u32 = 13_000;
pub const NIGHT_END_TICK: u32 = 23_000;

/// Clamp to `[0, 1]` and round to two decimal places.
pub fn clamp_round(value: f64) -> f64 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * 100.0).round() / 100.0
}

/// Raw bot-state observation used to derive drives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BotObservation {
    /// Raw health points, 0..=20. Absent when the adapter has no reading.
    pub health: Option<i64>,
    /// Raw food points, 0..=20.
    pub food: Option<i64>,
    /// Hostiles within threat radius.
    pub nearby_hostiles: u32,
    /// World clock tick within the day cycle.
    pub time_of_day: Option<u32>,
}

impl BotObservation {
    pub fn is_night(&self) -> Option<bool> {
        self.time_of_day
            .map(|t| (NIGHT_START_TICK..NIGHT_END_TICK).contains(&t))
    }
}

/// Drives derivable from a single observation. Absent fields keep their
/// previous value when merged into [`HomeostasisState`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DerivedDrives {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hunger: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defensive_readiness: Option<f64>,
}

/// Derive drives from a raw observation.
///
/// Contract values (reproduced exactly):
/// - `health = raw_health / 20`
/// - `hunger = 1 - food / 20`
/// - `safety = max(0, 0.9 - 0.15 * hostiles - 0.1 * night)`
/// - `energy = (health + (1 - hunger)) / 2` only when both inputs available
/// - `defensive_readiness = max(0, 1 - 0.2 * hostiles)`
pub fn derive_drives(obs: &BotObservation) -> DerivedDrives {
    let health = obs.health.map(|h| clamp_round(h as f64 / 20.0));
    let hunger = obs.food.map(|f| clamp_round(1.0 - f as f64 / 20.0));

    let energy = match (health, hunger) {
        (Some(h), Some(g)) => Some(clamp_round((h + (1.0 - g)) / 2.0)),
        _ => None,
    };

    let hostiles = obs.nearby_hostiles as f64;
    let night = match obs.is_night() {
        Some(true) => 1.0,
        _ => 0.0,
    };
    let safety = Some(clamp_round((0.9 - 0.15 * hostiles - 0.1 * night).max(0.0)));
    let defensive_readiness = Some(clamp_round((1.0 - 0.2 * hostiles).max(0.0)));

    DerivedDrives {
        health,
        hunger,
        energy,
        safety,
        defensive_readiness,
    }
}

/// The stored homeostasis state: eight scalar drives, always populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomeostasisState {
    pub health: f64,
    pub hunger: f64,
    pub energy: f64,
    pub safety: f64,
    pub curiosity: f64,
    pub social: f64,
    pub achievement: f64,
    pub creativity: f64,
    /// Auxiliary readiness drive feeding the safety-risk scoring term.
    pub defensive_readiness: f64,
}

impl Default for HomeostasisState {
    fn default() -> Self {
        Self {
            health: 1.0,
            hunger: 0.0,
            energy: 1.0,
            safety: 0.9,
            curiosity: 0.5,
            social: 0.3,
            achievement: 0.3,
            creativity: 0.3,
            defensive_readiness: 1.0,
        }
    }
}

impl HomeostasisState {
    /// Merge derived drives into the carried state. Absent fields keep the
    /// previous value; present fields are already clamped and rounded.
    pub fn apply(&mut self, derived: &DerivedDrives) {
        if let Some(v) = derived.health {
            self.health = v;
        }
        if let Some(v) = derived.hunger {
            self.hunger = v;
        }
        if let Some(v) = derived.energy {
            self.energy = v;
        }
        if let Some(v) = derived.safety {
            self.safety = v;
        }
        if let Some(v) = derived.defensive_readiness {
            self.defensive_readiness = v;
        }
    }

    /// All eight drive values, for invariant checks.
    pub fn drives(&self) -> [f64; 8] {
        [
            self.health,
            self.hunger,
            self.energy,
            self.safety,
            self.curiosity,
            self.social,
            self.achievement,
            self.creativity,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_scenario() {
        // health 16, food 5, 2 hostiles, tick 18000 (night)
        let obs = BotObservation {
            health: Some(16),
            food: Some(5),
            nearby_hostiles: 2,
            time_of_day: Some(18_000),
        };
        let d = derive_drives(&obs);
        assert_eq!(d.health, Some(0.80));
        assert_eq!(d.hunger, Some(0.75));
        assert_eq!(d.safety, Some(0.50));
        assert_eq!(d.energy, Some(0.53));
    }

    #[test]
    fn test_energy_absent_without_both_inputs() {
        let obs = BotObservation {
            health: Some(10),
            food: None,
            nearby_hostiles: 0,
            time_of_day: None,
        };
        let d = derive_drives(&obs);
        assert!(d.health.is_some());
        assert!(d.hunger.is_none());
        assert!(d.energy.is_none());
    }

    #[test]
    fn test_clamping_over_integer_grid() {
        for health in -100..=100i64 {
            for food in (-10..=40i64).step_by(5) {
                let obs = BotObservation {
                    health: Some(health),
                    food: Some(food),
                    nearby_hostiles: 3,
                    time_of_day: Some(0),
                };
                let d = derive_drives(&obs);
                for v in [d.health, d.hunger, d.energy, d.safety, d.defensive_readiness]
                    .into_iter()
                    .flatten()
                {
                    assert!((0.0..=1.0).contains(&v), "value {} out of range", v);
                    // Two decimal places: scaling by 100 yields an integer.
                    assert!(
                        ((v * 100.0).round() - v * 100.0).abs() < 1e-9,
                        "value {} not rounded to 2dp",
                        v
                    );
                }
            }
        }
    }

    #[test]
    fn test_apply_keeps_carried_values() {
        let mut state = HomeostasisState::default();
        let before_curiosity = state.curiosity;
        state.apply(&DerivedDrives {
            health: Some(0.4),
            ..Default::default()
        });
        assert_eq!(state.health, 0.4);
        assert_eq!(state.curiosity, before_curiosity);
    }

    #[test]
    fn test_night_window() {
        let mk = |t| BotObservation {
            time_of_day: Some(t),
            ..Default::default()
        };
        assert_eq!(mk(12_999).is_night(), Some(false));
        assert_eq!(mk(13_000).is_night(), Some(true));
        assert_eq!(mk(22_999).is_night(), Some(true));
        assert_eq!(mk(23_000).is_night(), Some(false));
    }
}
