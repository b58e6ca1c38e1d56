//! Volition epistemic planner.
//!
//! Belief states over a bounded hypothesis set with discrete-bucket
//! probabilities: every stored probability is one of the eleven values
//! `{0.0, 0.1, ..., 1.0}`, never a raw float. Updates are pure; each
//! returns a new belief state. Probe selection maximizes expected entropy
//! reduction with a deterministic tie-break, and no external action may
//! commit while the confidence gate reports `reached = false`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Hard cap on concurrently tracked hypotheses.
pub const MAX_HYPOTHESES: usize = 32;

/// Default confidence threshold for commitment.
pub const DEFAULT_CONFIDENCE_THRESHOLD: ProbBucket = ProbBucket::B8;

/// Epistemic-planner errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BeliefError {
    #[error("no hypotheses supplied")]
    NoHypotheses,

    #[error("likelihood for unknown hypothesis: {0}")]
    UnknownHypothesis(String),
}

/// Result type for belief operations.
pub type BeliefResult<T> = std::result::Result<T, BeliefError>;

/// One of the eleven discrete probability values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum ProbBucket {
    #[default]
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
    B8,
    B9,
    B10,
}

impl ProbBucket {
    /// Snap a raw probability to the nearest bucket.
    pub fn snap(p: f64) -> Self {
        let tenths = (p.clamp(0.0, 1.0) * 10.0).round() as u8;
        Self::from_tenths(tenths)
    }

    pub fn from_tenths(tenths: u8) -> Self {
        match tenths {
            0 => ProbBucket::B0,
            1 => ProbBucket::B1,
            2 => ProbBucket::B2,
            3 => ProbBucket::B3,
            4 => ProbBucket::B4,
            5 => ProbBucket::B5,
            6 => ProbBucket::B6,
            7 => ProbBucket::B7,
            8 => ProbBucket::B8,
            9 => ProbBucket::B9,
            _ => ProbBucket::B10,
        }
    }

    pub fn tenths(self) -> u8 {
        self as u8
    }

    /// The bucket's probability value.
    pub fn value(self) -> f64 {
        self.tenths() as f64 / 10.0
    }
}

impl From<ProbBucket> for u8 {
    fn from(b: ProbBucket) -> u8 {
        b.tenths()
    }
}

impl TryFrom<u8> for ProbBucket {
    type Error = String;

    fn try_from(tenths: u8) -> Result<Self, Self::Error> {
        if tenths > 10 {
            return Err(format!("bucket tenths out of range: {tenths}"));
        }
        Ok(Self::from_tenths(tenths))
    }
}

/// One possible observation of a probe with per-hypothesis likelihoods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub id: String,
    /// `P(observation | hypothesis)`.
    pub likelihoods: BTreeMap<String, f64>,
}

/// A discriminative probe the agent can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub id: String,
    pub outcomes: Vec<ProbeOutcome>,
}

/// The belief state. All probabilities are buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefState {
    pub distribution: BTreeMap<String, ProbBucket>,
    pub explored: BTreeSet<String>,
    pub entropy: f64,
    pub last_updated_tick: u64,
}

impl BeliefState {
    /// Uniform belief over `hypotheses`, snapped to buckets, capped at
    /// [`MAX_HYPOTHESES`] with deterministic eviction.
    pub fn initialize(hypotheses: &[&str], tick: u64) -> BeliefResult<Self> {
        if hypotheses.is_empty() {
            return Err(BeliefError::NoHypotheses);
        }

        let uniform = 1.0 / hypotheses.len() as f64;
        let mut distribution: BTreeMap<String, ProbBucket> = hypotheses
            .iter()
            .map(|h| (h.to_string(), ProbBucket::snap(uniform)))
            .collect();
        enforce_cap(&mut distribution);

        Ok(Self {
            entropy: entropy_of(&distribution),
            distribution,
            explored: BTreeSet::new(),
            last_updated_tick: tick,
        })
    }

    /// Bayesian update: posterior = prior x likelihood, renormalized and
    /// snapped back to buckets. Returns a new state.
    pub fn update(&self, likelihoods: &BTreeMap<String, f64>, tick: u64) -> BeliefResult<Self> {
        for hypothesis in likelihoods.keys() {
            if !self.distribution.contains_key(hypothesis) {
                return Err(BeliefError::UnknownHypothesis(hypothesis.clone()));
            }
        }

        let raw: BTreeMap<String, f64> = self
            .distribution
            .iter()
            .map(|(h, bucket)| {
                let likelihood = likelihoods.get(h).copied().unwrap_or(1.0);
                (h.clone(), bucket.value() * likelihood)
            })
            .collect();
        let total: f64 = raw.values().sum();

        let mut distribution: BTreeMap<String, ProbBucket> = raw
            .into_iter()
            .map(|(h, p)| {
                let normalized = if total > 0.0 { p / total } else { 0.0 };
                (h, ProbBucket::snap(normalized))
            })
            .collect();
        enforce_cap(&mut distribution);

        Ok(Self {
            entropy: entropy_of(&distribution),
            distribution,
            explored: self.explored.clone(),
            last_updated_tick: tick,
        })
    }

    /// Mark a probe explored. Returns a new state.
    pub fn mark_explored(&self, probe_id: &str, tick: u64) -> Self {
        let mut explored = self.explored.clone();
        explored.insert(probe_id.to_string());
        Self {
            distribution: self.distribution.clone(),
            explored,
            entropy: self.entropy,
            last_updated_tick: tick,
        }
    }

    /// The most probable hypothesis, ties broken by id.
    pub fn best_hypothesis(&self) -> Option<(&str, ProbBucket)> {
        self.distribution
            .iter()
            .max_by(|(ida, a), (idb, b)| a.cmp(b).then_with(|| idb.cmp(ida)))
            .map(|(id, bucket)| (id.as_str(), *bucket))
    }
}

/// Evict lowest-probability hypotheses (ties evict the lexicographically
/// later id) until the cap holds.
fn enforce_cap(distribution: &mut BTreeMap<String, ProbBucket>) {
    while distribution.len() > MAX_HYPOTHESES {
        let victim = distribution
            .iter()
            .min_by(|(ida, a), (idb, b)| a.cmp(b).then_with(|| idb.cmp(ida)))
            .map(|(id, _)| id.clone())
            .expect("non-empty distribution");
        distribution.remove(&victim);
    }
}

/// Shannon entropy over the normalized bucket values.
fn entropy_of(distribution: &BTreeMap<String, ProbBucket>) -> f64 {
    let total: f64 = distribution.values().map(|b| b.value()).sum();
    if total <= 0.0 {
        return 0.0;
    }
    -distribution
        .values()
        .map(|b| b.value() / total)
        .filter(|p| *p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f64>()
}

/// Expected information gain of a probe against a belief.
pub fn expected_information_gain(belief: &BeliefState, probe: &Probe) -> f64 {
    let prior_entropy = entropy_of(&belief.distribution);
    let prior_total: f64 = belief.distribution.values().map(|b| b.value()).sum();
    if prior_total <= 0.0 {
        return 0.0;
    }

    let mut expected_posterior_entropy = 0.0;
    for outcome in &probe.outcomes {
        // P(outcome) under the current belief.
        let p_outcome: f64 = belief
            .distribution
            .iter()
            .map(|(h, bucket)| {
                let likelihood = outcome.likelihoods.get(h).copied().unwrap_or(0.0);
                (bucket.value() / prior_total) * likelihood
            })
            .sum();
        if p_outcome <= 0.0 {
            continue;
        }

        // Posterior entropy given the outcome (raw, before snapping — the
        // gain metric ranks probes; state stays bucketed).
        let posterior: Vec<f64> = belief
            .distribution
            .iter()
            .map(|(h, bucket)| {
                let likelihood = outcome.likelihoods.get(h).copied().unwrap_or(0.0);
                bucket.value() * likelihood
            })
            .collect();
        let posterior_total: f64 = posterior.iter().sum();
        let posterior_entropy = if posterior_total > 0.0 {
            -posterior
                .iter()
                .map(|p| p / posterior_total)
                .filter(|p| *p > 0.0)
                .map(|p| p * p.ln())
                .sum::<f64>()
        } else {
            0.0
        };
        expected_posterior_entropy += p_outcome * posterior_entropy;
    }

    prior_entropy - expected_posterior_entropy
}

/// Pick the unexplored probe with the highest expected information gain;
/// ties resolve to the lexicographically smaller probe id.
pub fn select_probe<'a>(belief: &BeliefState, probes: &'a [Probe]) -> Option<&'a Probe> {
    probes
        .iter()
        .filter(|p| !belief.explored.contains(&p.id))
        .map(|p| (p, expected_information_gain(belief, p)))
        .max_by(|(pa, ga), (pb, gb)| {
            ga.partial_cmp(gb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| pb.id.cmp(&pa.id))
        })
        .map(|(p, _)| p)
}

/// Outcome of the confidence gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceCheck {
    pub reached: bool,
    pub best_hypothesis: Option<String>,
    pub probability: ProbBucket,
}

/// Check whether the top hypothesis clears `threshold`. External actions
/// must not commit while `reached` is false.
pub fn check_confidence(belief: &BeliefState, threshold: ProbBucket) -> ConfidenceCheck {
    match belief.best_hypothesis() {
        Some((id, bucket)) => ConfidenceCheck {
            reached: bucket >= threshold,
            best_hypothesis: Some(id.to_string()),
            probability: bucket,
        },
        None => ConfidenceCheck {
            reached: false,
            best_hypothesis: None,
            probability: ProbBucket::B0,
        },
    }
}
