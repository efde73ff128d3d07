//! Lifecycle events.
//!
//! Each orchestrator owns its own `EventBus`. Listeners run synchronously,
//! in subscription order, on the task that emits the event, so anything
//! subscribed before a call has observed its events when the call returns.

use crate::types::{OverallHealth, SuiteSummary};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum OrchestratorEvent {
    #[serde(rename = "discovery:start")]
    DiscoveryStart { project_dir: PathBuf },

    #[serde(rename = "discovery:complete")]
    DiscoveryComplete {
        services: usize,
        endpoints: usize,
        suggested_tests: usize,
    },

    #[serde(rename = "suite:start")]
    SuiteStart { name: String },

    #[serde(rename = "suite:complete")]
    SuiteComplete {
        name: String,
        summary: SuiteSummary,
        total_duration_ms: u64,
    },

    #[serde(rename = "health:start")]
    HealthStart { adapters: usize },

    #[serde(rename = "health:complete")]
    HealthComplete { overall: OverallHealth },
}

impl OrchestratorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::DiscoveryStart { .. } => "discovery:start",
            OrchestratorEvent::DiscoveryComplete { .. } => "discovery:complete",
            OrchestratorEvent::SuiteStart { .. } => "suite:start",
            OrchestratorEvent::SuiteComplete { .. } => "suite:complete",
            OrchestratorEvent::HealthStart { .. } => "health:start",
            OrchestratorEvent::HealthComplete { .. } => "health:complete",
        }
    }
}

type Listener = Arc<dyn Fn(&OrchestratorEvent) + Send + Sync>;
type Listeners = Mutex<Vec<(u64, Listener)>>;

fn lock(listeners: &Listeners) -> MutexGuard<'_, Vec<(u64, Listener)>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Arc<Listeners>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Deliver `event` to every current listener
    pub fn emit(&self, event: &OrchestratorEvent) {
        // Snapshot so listeners may subscribe or unsubscribe while handling
        let snapshot: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

/// Handle returned by `EventBus::subscribe`
#[must_use = "dropping a Subscription keeps the listener; call unsubscribe() to remove it"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Remove the listener. Returns false when the bus is already gone.
    pub fn unsubscribe(self) -> bool {
        match self.listeners.upgrade() {
            Some(listeners) => {
                let mut listeners = lock(&listeners);
                let before = listeners.len();
                listeners.retain(|(id, _)| *id != self.id);
                listeners.len() < before
            }
            None => false,
        }
    }
}
