//! Signal -> need processing.
//!
//! Each tick: raw signals and the bot observation are folded into the
//! carried homeostasis state, then a fixed rule set derives this tick's
//! needs. Thresholds are strict (`>`), never inclusive.

use serde::{Deserialize, Serialize};

use crate::domain::{
    derive_drives, BotObservation, HomeostasisState, Need, NeedType, Signal,
};

/// One need-derivation rule: a drive reading, a strict threshold, and the
/// need the exceedance produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeedRule {
    pub need_type: NeedType,
    pub threshold: f64,
}

/// The fixed rule table, evaluated in order.
///
/// Each rule reads a deficit value from the homeostasis state (for inverted
/// drives such as safety the deficit is `1 - drive`), and fires only when
/// the deficit is strictly greater than the threshold.
fn deficit(state: &HomeostasisState, need_type: NeedType) -> f64 {
    match need_type {
        NeedType::Nutrition => state.hunger,
        NeedType::Survival => 1.0 - state.health,
        NeedType::Safety => 1.0 - state.safety,
        NeedType::Exploration => state.curiosity,
        NeedType::Curiosity => state.curiosity,
        NeedType::Social => state.social,
        NeedType::Achievement => state.achievement,
        NeedType::Creativity => state.creativity,
    }
}

const RULES: &[NeedRule] = &[
    NeedRule {
        need_type: NeedType::Nutrition,
        threshold: 0.7,
    },
    NeedRule {
        need_type: NeedType::Survival,
        threshold: 0.7,
    },
    NeedRule {
        need_type: NeedType::Safety,
        threshold: 0.5,
    },
    NeedRule {
        need_type: NeedType::Exploration,
        threshold: 0.6,
    },
    NeedRule {
        need_type: NeedType::Social,
        threshold: 0.6,
    },
    NeedRule {
        need_type: NeedType::Achievement,
        threshold: 0.5,
    },
    NeedRule {
        need_type: NeedType::Creativity,
        threshold: 0.6,
    },
];

/// Stateful processor carrying homeostasis between ticks.
#[derive(Debug, Default)]
pub struct SignalProcessor {
    state: HomeostasisState,
}

impl SignalProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn homeostasis(&self) -> &HomeostasisState {
        &self.state
    }

    /// Fold one tick of inputs into the carried state and derive needs.
    ///
    /// Signals currently inform urgency escalation only; the drive values
    /// themselves come from the bot observation so that replayed
    /// observations always produce identical state.
    pub fn process_tick(&mut self, _signals: &[Signal], obs: &BotObservation) -> Vec<Need> {
        let derived = derive_drives(obs);
        self.state.apply(&derived);
        derive_needs(&self.state)
    }
}

/// Derive this tick's needs from a homeostasis state.
pub fn derive_needs(state: &HomeostasisState) -> Vec<Need> {
    let mut needs = Vec::new();
    for rule in RULES {
        let value = deficit(state, rule.need_type);
        if value > rule.threshold {
            needs.push(Need::new(rule.need_type, value, value));
        }
    }
    needs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(hunger: f64) -> HomeostasisState {
        HomeostasisState {
            hunger,
            curiosity: 0.0,
            social: 0.0,
            achievement: 0.0,
            creativity: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_hunger_rule_strict_threshold() {
        // food=5 -> hunger=0.75 > 0.7 fires
        let needs = derive_needs(&state_with(0.75));
        assert!(needs.iter().any(|n| n.need_type == NeedType::Nutrition));

        // food=6 -> hunger=0.70, not > 0.7, must not fire
        let needs = derive_needs(&state_with(0.70));
        assert!(!needs.iter().any(|n| n.need_type == NeedType::Nutrition));
    }

    #[test]
    fn test_nutrition_urgency_tracks_hunger() {
        let needs = derive_needs(&state_with(0.9));
        let nutrition = needs
            .iter()
            .find(|n| n.need_type == NeedType::Nutrition)
            .expect("nutrition need");
        assert_eq!(nutrition.urgency, 0.9);
        assert_eq!(nutrition.intensity, 0.9);
    }

    #[test]
    fn test_safety_need_from_low_safety() {
        let state = HomeostasisState {
            safety: 0.4,
            hunger: 0.0,
            curiosity: 0.0,
            social: 0.0,
            achievement: 0.0,
            creativity: 0.0,
            ..Default::default()
        };
        let needs = derive_needs(&state);
        let safety = needs
            .iter()
            .find(|n| n.need_type == NeedType::Safety)
            .expect("safety need");
        assert!((safety.intensity - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_processor_carries_state_between_ticks() {
        let mut processor = SignalProcessor::new();

        // First tick has full vitals
        processor.process_tick(
            &[],
            &BotObservation {
                health: Some(16),
                food: Some(5),
                nearby_hostiles: 0,
                time_of_day: Some(0),
            },
        );
        assert_eq!(processor.homeostasis().hunger, 0.75);

        // Second tick has no food reading; hunger is carried
        processor.process_tick(
            &[],
            &BotObservation {
                health: Some(16),
                food: None,
                nearby_hostiles: 0,
                time_of_day: Some(0),
            },
        );
        assert_eq!(processor.homeostasis().hunger, 0.75);
    }
}
