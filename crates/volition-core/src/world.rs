//! World-adapter contract.
//!
//! The core never calls native world APIs directly. Everything it knows
//! about the embodied world arrives through [`WorldAdapter`], and every
//! long-running call observes a [`CancelToken`].
//!
//! A deterministic in-memory [`SimWorld`] ships here as a public module so
//! smoke runs and downstream crates can exercise the full pipeline without
//! a live world.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BotObservation, CoreError, Result};

/// Cooperative cancellation token. Cancellation is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A hostile entity in the hazard summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hostile {
    pub kind: String,
    pub position: Position,
}

/// Weather state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    Thunder,
}

/// Hazard summary returned by `snapshot()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub nearby_hostiles: Vec<Hostile>,
    pub light_level: u8,
    pub biome: String,
    pub weather: Weather,
    pub time_of_day: u32,
    pub position: Position,
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self {
            nearby_hostiles: Vec::new(),
            light_level: 15,
            biome: "plains".to_string(),
            weather: Weather::Clear,
            time_of_day: 1_000,
            position: Position::default(),
        }
    }
}

/// A stack of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

/// Inventory contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Inventory {
    pub items: Vec<ItemStack>,
}

impl Inventory {
    pub fn count_of(&self, name: &str) -> u32 {
        self.items
            .iter()
            .filter(|i| i.name == name)
            .map(|i| i.count)
            .sum()
    }
}

/// The contract consumed from the embodied world.
#[async_trait]
pub trait WorldAdapter: Send + Sync {
    /// Hazard summary for the current tick.
    async fn snapshot(&self) -> Result<WorldSnapshot>;

    /// Current inventory.
    async fn inventory(&self) -> Result<Inventory>;

    /// Raw bot vitals for homeostasis derivation.
    fn observe(&self) -> BotObservation;

    /// Wall-clock now, injectable for deterministic tests.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend until `n` world ticks have elapsed.
    async fn wait_for_ticks(&self, n: u32) -> Result<()>;
}

/// Deterministic in-memory world for smoke runs and tests.
#[derive(Debug, Default)]
pub struct SimWorld {
    state: Mutex<SimState>,
}

#[derive(Debug, Clone, Default)]
struct SimState {
    snapshot: WorldSnapshot,
    inventory: Inventory,
    observation: BotObservation,
    now: Option<DateTime<Utc>>,
    ticks_waited: u64,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&self, snapshot: WorldSnapshot) {
        self.state.lock().expect("sim state").snapshot = snapshot;
    }

    pub fn set_inventory(&self, inventory: Inventory) {
        self.state.lock().expect("sim state").inventory = inventory;
    }

    pub fn set_observation(&self, observation: BotObservation) {
        self.state.lock().expect("sim state").observation = observation;
    }

    /// Pin `now()` for deterministic time-dependent tests.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.state.lock().expect("sim state").now = Some(now);
    }

    pub fn ticks_waited(&self) -> u64 {
        self.state.lock().expect("sim state").ticks_waited
    }
}

#[async_trait]
impl WorldAdapter for SimWorld {
    async fn snapshot(&self) -> Result<WorldSnapshot> {
        Ok(self.state.lock().expect("sim state").snapshot.clone())
    }

    async fn inventory(&self) -> Result<Inventory> {
        Ok(self.state.lock().expect("sim state").inventory.clone())
    }

    fn observe(&self) -> BotObservation {
        self.state.lock().expect("sim state").observation
    }

    fn now(&self) -> DateTime<Utc> {
        self.state
            .lock()
            .expect("sim state")
            .now
            .unwrap_or_else(Utc::now)
    }

    async fn wait_for_ticks(&self, n: u32) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| {
            CoreError::PlanningFailed {
                stage: "world".to_string(),
                cause: "sim state poisoned".to_string(),
            }
        })?;
        state.ticks_waited += n as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_idempotent() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_inventory_count_sums_stacks() {
        let inv = Inventory {
            items: vec![
                ItemStack {
                    name: "torch".to_string(),
                    count: 4,
                },
                ItemStack {
                    name: "torch".to_string(),
                    count: 3,
                },
            ],
        };
        assert_eq!(inv.count_of("torch"), 7);
        assert_eq!(inv.count_of("bread"), 0);
    }

    #[tokio::test]
    async fn test_sim_world_roundtrip() {
        let world = SimWorld::new();
        world.set_observation(BotObservation {
            health: Some(16),
            food: Some(5),
            nearby_hostiles: 2,
            time_of_day: Some(18_000),
        });
        assert_eq!(world.observe().health, Some(16));

        world.wait_for_ticks(5).await.unwrap();
        world.wait_for_ticks(3).await.unwrap();
        assert_eq!(world.ticks_waited(), 8);
    }

    #[test]
    fn test_position_distance() {
        let a = Position {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        let b = Position {
            x: 3.0,
            y: 4.0,
            z: 0.0,
        };
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }
}
