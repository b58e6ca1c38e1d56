//! Typed event records and the observer seam.
//!
//! Components publish strongly typed events; subscribers implement
//! [`Observer`]. There is no string-keyed listener registration, so an
//! unknown event is a compile error, not a silent no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::router::TaskDecision;

/// Planning-pipeline lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanningEvent {
    PlanningComplete {
        plan_id: uuid::Uuid,
        goal_id: String,
        decision: TaskDecision,
    },
    PlanningError {
        stage: String,
        cause: String,
    },
    PlanReady {
        plan_id: uuid::Uuid,
    },
    PlanCompleted {
        plan_id: uuid::Uuid,
    },
    PlanFailed {
        plan_id: uuid::Uuid,
        cause: String,
    },
    PlanError {
        plan_id: uuid::Uuid,
        cause: String,
    },
}

/// Executor / state-machine lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorEvent {
    Initialized,
    StateEntered { state: String },
    StateExited { state: String },
    StateChanged { from: String, to: String },
    Paused,
    Resumed,
    Stopped,
    Completed,
    Error { cause: String },
    ExecutionComplete { task_id: String },
    ExecutionFailed { task_id: String, cause: String },
}

/// Cognitive-stream events: journal entries and memory-service discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CognitiveEvent {
    EventAdded { kind: String },
    NoteAdded { text: String },
    MemorySystemDiscovered { endpoint: String },
}

/// A timestamped event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<E> {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: E,
}

/// Subscriber interface for typed event streams.
pub trait Observer<E>: Send + Sync {
    fn notify(&self, event: &Envelope<E>);
}

/// An ordered set of observers plus the sequence counter.
pub struct ObserverSet<E> {
    observers: Vec<Arc<dyn Observer<E>>>,
    next_seq: u64,
}

impl<E> Default for ObserverSet<E> {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
            next_seq: 1,
        }
    }
}

impl<E: Clone> ObserverSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn Observer<E>>) {
        self.observers.push(observer);
    }

    /// Publish to every observer in subscription order.
    pub fn publish(&mut self, event: E) {
        let envelope = Envelope {
            seq: self.next_seq,
            timestamp: Utc::now(),
            event,
        };
        self.next_seq += 1;
        for observer in &self.observers {
            observer.notify(&envelope);
        }
    }
}

/// The agent's cognitive journal: owns the [`CognitiveEvent`] stream.
#[derive(Default)]
pub struct Journal {
    stream: ObserverSet<CognitiveEvent>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn Observer<CognitiveEvent>>) {
        self.stream.subscribe(observer);
    }

    pub fn add_event(&mut self, kind: impl Into<String>) {
        self.stream
            .publish(CognitiveEvent::EventAdded { kind: kind.into() });
    }

    pub fn add_note(&mut self, text: impl Into<String>) {
        self.stream
            .publish(CognitiveEvent::NoteAdded { text: text.into() });
    }

    pub fn memory_system_discovered(&mut self, endpoint: impl Into<String>) {
        self.stream.publish(CognitiveEvent::MemorySystemDiscovered {
            endpoint: endpoint.into(),
        });
    }
}

/// Observer that collects events for assertions.
#[derive(Default)]
pub struct CollectingObserver<E> {
    events: std::sync::Mutex<Vec<Envelope<E>>>,
}

impl<E: Clone> CollectingObserver<E> {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn collected(&self) -> Vec<Envelope<E>> {
        self.events.lock().expect("collector lock").clone()
    }
}

impl<E: Clone + Send + Sync> Observer<E> for CollectingObserver<E> {
    fn notify(&self, event: &Envelope<E>) {
        self.events.lock().expect("collector lock").push(event.clone());
    }
}
