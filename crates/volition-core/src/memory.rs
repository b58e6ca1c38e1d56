//! Best-effort client for the external memory service.
//!
//! All calls retry with exponential backoff (3 attempts) behind a
//! per-instance circuit breaker (3 failures / 30 s cooldown). Failures
//! degrade to `None` — memory is advisory and never blocks planning.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::breaker::CooldownBreaker;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 200;
const BREAKER_THRESHOLD: u32 = 3;
const BREAKER_COOLDOWN_SECS: i64 = 30;

/// Provenance slice of `GET /state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProvenanceSummary {
    #[serde(default)]
    pub recent_actions: Vec<String>,
}

/// Episodic slice of `GET /state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EpisodicSummary {
    #[serde(default)]
    pub recent_memories: Vec<serde_json::Value>,
}

/// Semantic slice of `GET /state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SemanticSummary {
    #[serde(default)]
    pub total_entities: u64,
    #[serde(default)]
    pub total_relationships: u64,
}

/// Response shape of `GET /state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemoryStateSummary {
    #[serde(default)]
    pub provenance: ProvenanceSummary,
    #[serde(default)]
    pub episodic: EpisodicSummary,
    #[serde(default)]
    pub semantic: SemanticSummary,
}

/// Request body for `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,
    pub max_age: u64,
}

/// One ranked memory from `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMemory {
    pub id: String,
    pub score: f64,
    pub content: serde_json::Value,
}

/// Best-effort memory-service client.
pub struct MemoryClient {
    base_url: String,
    client: reqwest::Client,
    breaker: Mutex<CooldownBreaker>,
    journal: Option<std::sync::Arc<Mutex<crate::events::Journal>>>,
    discovered: std::sync::atomic::AtomicBool,
}

impl MemoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            breaker: Mutex::new(CooldownBreaker::new(
                BREAKER_THRESHOLD,
                chrono::Duration::seconds(BREAKER_COOLDOWN_SECS),
            )),
            journal: None,
            discovered: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Publish `memory_system_discovered` into this journal on the first
    /// successful call.
    pub fn with_journal(mut self, journal: std::sync::Arc<Mutex<crate::events::Journal>>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// `GET /state`, or `None` when the service is unavailable.
    pub async fn state(&self) -> Option<MemoryStateSummary> {
        self.get_json("/state").await
    }

    /// `GET /telemetry` — recent events, or `None`.
    pub async fn telemetry(&self) -> Option<Vec<serde_json::Value>> {
        self.get_json("/telemetry").await
    }

    /// `POST /search`, or `None`.
    pub async fn search(&self, request: &SearchRequest) -> Option<Vec<RankedMemory>> {
        if self.breaker_open() {
            return None;
        }
        let url = format!("{}/search", self.base_url);
        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.post(&url).json(request).send().await {
                Ok(resp) => match resp.json::<Vec<RankedMemory>>().await {
                    Ok(memories) => {
                        self.record_success();
                        return Some(memories);
                    }
                    Err(e) => {
                        warn!(event = "memory.decode_error", url = %url, error = %e);
                        self.record_failure();
                        return None;
                    }
                },
                Err(e) => {
                    if attempt == MAX_ATTEMPTS {
                        warn!(event = "memory.unavailable", url = %url, error = %e);
                        self.record_failure();
                        return None;
                    }
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
        None
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        if self.breaker_open() {
            return None;
        }
        let url = format!("{}{}", self.base_url, path);
        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.get(&url).send().await {
                Ok(resp) => match resp.json::<T>().await {
                    Ok(value) => {
                        self.record_success();
                        return Some(value);
                    }
                    Err(e) => {
                        warn!(event = "memory.decode_error", url = %url, error = %e);
                        self.record_failure();
                        return None;
                    }
                },
                Err(e) => {
                    if attempt == MAX_ATTEMPTS {
                        warn!(event = "memory.unavailable", url = %url, error = %e);
                        self.record_failure();
                        return None;
                    }
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
        None
    }

    fn breaker_open(&self) -> bool {
        let now = Utc::now();
        let mut breaker = self.breaker.lock().expect("breaker lock");
        breaker.tick(now);
        breaker.is_open(now)
    }

    fn record_failure(&self) {
        self.breaker
            .lock()
            .expect("breaker lock")
            .record_failure(Utc::now());
    }

    fn record_success(&self) {
        self.breaker.lock().expect("breaker lock").record_success();
        if let Some(journal) = &self.journal {
            let first = !self
                .discovered
                .swap(true, std::sync::atomic::Ordering::SeqCst);
            if first {
                journal
                    .lock()
                    .expect("journal lock")
                    .memory_system_discovered(self.base_url.as_str());
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt - 1))
}
