//! Raw signals from the embodied world.
//!
//! Signals are transient: the world adapter produces a batch each planning
//! tick and the signal processor consumes them in the same tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Urgency band attached to a raw signal by its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalUrgency {
    Low,
    Medium,
    High,
    Emergency,
}

/// Kind of raw signal produced by the world adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Health,
    Food,
    HostileProximity,
    LightLevel,
    TimeOfDay,
    Weather,
    SocialContact,
    Discovery,
}

/// A single raw signal observed during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    /// Raw magnitude; producer-scaled (health 0..20, food 0..20, counts, ...).
    pub value: f64,
    pub urgency: SignalUrgency,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn new(signal_type: SignalType, value: f64, urgency: SignalUrgency) -> Self {
        Self {
            signal_type,
            value,
            urgency,
            timestamp: Utc::now(),
        }
    }

    /// Whether any signal in the batch carries emergency urgency.
    pub fn any_emergency(signals: &[Signal]) -> bool {
        signals
            .iter()
            .any(|s| s.urgency == SignalUrgency::Emergency)
    }
}
