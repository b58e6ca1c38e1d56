//! Named sensor predicates.
//!
//! The predicate set is closed; resolution is owned here, not by callers.
//! Each predicate maps `(params, ctx)` to a boolean against the current
//! world snapshot. Unknown names fail with `unknown_predicate`.

use volition_core::world::{Position, Weather};
use volition_core::{ExecError, ExecErrorCode};

use crate::leaf::LeafCtx;

/// Evaluate a named predicate.
pub async fn evaluate(
    name: &str,
    params: &serde_json::Value,
    ctx: &LeafCtx,
) -> Result<bool, ExecError> {
    let world_err =
        |e: volition_core::CoreError| ExecError::new(ExecErrorCode::Unknown, e.to_string());

    match name {
        "distance_to" => {
            let snapshot = ctx.world.snapshot().await.map_err(world_err)?;
            let target = position_param(params)?;
            let lte = f64_param(params, "lte").unwrap_or(1.0);
            Ok(snapshot.position.distance_to(&target) <= lte)
        }
        "hostiles_present" => {
            let snapshot = ctx.world.snapshot().await.map_err(world_err)?;
            Ok(!snapshot.nearby_hostiles.is_empty())
        }
        "light_level_safe" => {
            let snapshot = ctx.world.snapshot().await.map_err(world_err)?;
            let min = f64_param(params, "min").unwrap_or(8.0) as u8;
            Ok(snapshot.light_level >= min)
        }
        "inventory_has_item" => {
            let inventory = ctx.world.inventory().await.map_err(world_err)?;
            let item = str_param(params, "item")?;
            let count = f64_param(params, "count").unwrap_or(1.0) as u32;
            Ok(inventory.count_of(&item) >= count)
        }
        "position_reached" => {
            let snapshot = ctx.world.snapshot().await.map_err(world_err)?;
            let target = position_param(params)?;
            let tolerance = f64_param(params, "tolerance").unwrap_or(1.0);
            Ok(snapshot.position.distance_to(&target) <= tolerance)
        }
        "time_elapsed" => {
            let snapshot = ctx.world.snapshot().await.map_err(world_err)?;
            let after_tick = f64_param(params, "after_tick").unwrap_or(0.0) as u32;
            Ok(snapshot.time_of_day >= after_tick)
        }
        "health_low" => {
            let obs = ctx.world.observe();
            let below = f64_param(params, "below").unwrap_or(0.3);
            match obs.health {
                Some(h) => Ok((h as f64 / 20.0) < below),
                None => Ok(false),
            }
        }
        "hunger_low" => {
            let obs = ctx.world.observe();
            let below = f64_param(params, "below").unwrap_or(7.0) as i64;
            match obs.food {
                Some(f) => Ok(f < below),
                None => Ok(false),
            }
        }
        "weather_bad" => {
            let snapshot = ctx.world.snapshot().await.map_err(world_err)?;
            Ok(snapshot.weather != Weather::Clear)
        }
        "biome_safe" => {
            let snapshot = ctx.world.snapshot().await.map_err(world_err)?;
            let safe = match params.get("safe_biomes").and_then(|v| v.as_array()) {
                Some(list) => list
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                None => vec![
                    "plains".to_string(),
                    "forest".to_string(),
                    "meadow".to_string(),
                ],
            };
            Ok(safe.iter().any(|b| *b == snapshot.biome))
        }
        other => Err(ExecError::new(
            ExecErrorCode::UnknownPredicate,
            format!("no predicate named '{other}'"),
        )),
    }
}

fn f64_param(params: &serde_json::Value, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

fn str_param(params: &serde_json::Value, key: &str) -> Result<String, ExecError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ExecError::new(
                ExecErrorCode::InvalidArgs,
                format!("predicate missing '{key}' param"),
            )
        })
}

fn position_param(params: &serde_json::Value) -> Result<Position, ExecError> {
    let coord = |key: &str| {
        f64_param(params, key).ok_or_else(|| {
            ExecError::new(
                ExecErrorCode::InvalidArgs,
                format!("predicate missing '{key}' param"),
            )
        })
    };
    Ok(Position {
        x: coord("x")?,
        y: coord("y")?,
        z: coord("z")?,
    })
}
