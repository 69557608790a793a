use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::models::GenerationEvent;
use super::session::{GenerationSession, Subscription};

/// Presentations by id, each carrying its own subscribers.
#[derive(Clone, Default)]
pub struct EventHub {
    sessions: Arc<DashMap<String, Arc<GenerationSession>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<GenerationSession>) {
        self.sessions.insert(session.id().to_string(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<GenerationSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn all(&self) -> Vec<Arc<GenerationSession>> {
        self.sessions.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Subscribe to a presentation. `None` if the id is unknown.
    pub async fn attach(&self, id: &str) -> Option<Subscription> {
        let session = self.get(id)?;
        Some(session.attach().await)
    }

    /// Record and fan out an event. Returns false if the id is unknown.
    pub async fn broadcast(&self, id: &str, event: GenerationEvent) -> bool {
        match self.get(id) {
            Some(session) => {
                session.record(event).await;
                true
            }
            None => {
                debug!(session = %id, "Broadcast to unknown presentation");
                false
            }
        }
    }
}
