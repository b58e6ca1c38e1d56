//! Needs derived from homeostasis. Needs live one planning tick.

use serde::{Deserialize, Serialize};

/// Closed need taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedType {
    Survival,
    Safety,
    Exploration,
    Social,
    Achievement,
    Creativity,
    Curiosity,
    Nutrition,
}

/// A need derived purely from the homeostasis state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Need {
    pub id: String,
    pub need_type: NeedType,
    /// How strongly the drive deviates, in `[0, 1]`.
    pub intensity: f64,
    /// How quickly it must be addressed, in `[0, 1]`.
    pub urgency: f64,
    /// Current satisfaction level, in `[0, 1]`.
    pub satisfaction: f64,
}

impl Need {
    pub fn new(need_type: NeedType, intensity: f64, urgency: f64) -> Self {
        let intensity = intensity.clamp(0.0, 1.0);
        let urgency = urgency.clamp(0.0, 1.0);
        Self {
            id: format!("need-{}", serde_variant_name(need_type)),
            need_type,
            intensity,
            urgency,
            satisfaction: 1.0 - intensity,
        }
    }
}

fn serde_variant_name(t: NeedType) -> &'static str {
    match t {
        NeedType::Survival => "survival",
        NeedType::Safety => "safety",
        NeedType::Exploration => "exploration",
        NeedType::Social => "social",
        NeedType::Achievement => "achievement",
        NeedType::Creativity => "creativity",
        NeedType::Curiosity => "curiosity",
        NeedType::Nutrition => "nutrition",
    }
}
