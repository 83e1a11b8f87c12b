//! Assigned-teacher persona selection.
//!
//! Persona assignment is gated on having a completed diagnostic, so the
//! selection subscribes to the diagnostic workflow's `Invalidated`
//! events instead of being reset by the diagnostic store directly.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::diagnostic::DiagnosticEvent;
use crate::persistence::{StateStore, PERSONA_STATE_KEY};

/// The AI teacher profile a trainee has been matched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPersona {
    pub persona_id: String,
    pub display_name: String,
    #[serde(default)]
    pub teaching_style: Option<String>,
}

/// Persisted holder of the current persona selection.
pub struct PersonaStore {
    storage: Arc<dyn StateStore>,
    assigned: Mutex<Option<TeacherPersona>>,
}

impl PersonaStore {
    pub fn new(storage: Arc<dyn StateStore>) -> Self {
        let assigned = Self::rehydrate(storage.as_ref());
        Self {
            storage,
            assigned: Mutex::new(assigned),
        }
    }

    fn rehydrate(storage: &dyn StateStore) -> Option<TeacherPersona> {
        match storage.get(PERSONA_STATE_KEY) {
            Ok(Some(blob)) => match serde_json::from_str(&blob) {
                Ok(persona) => Some(persona),
                Err(err) => {
                    warn!(
                        target: "persona_store",
                        %err,
                        "discarding undecodable persona blob"
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(
                    target: "persona_store",
                    %err,
                    "persona storage unavailable; starting empty"
                );
                None
            }
        }
    }

    pub fn assign(&self, persona: TeacherPersona) {
        match serde_json::to_string(&persona) {
            Ok(blob) => {
                if let Err(err) = self.storage.put(PERSONA_STATE_KEY, &blob) {
                    warn!(target: "persona_store", %err, "failed to persist persona");
                }
            }
            Err(err) => warn!(target: "persona_store", %err, "failed to encode persona"),
        }
        *self.lock_assigned() = Some(persona);
    }

    pub fn assigned(&self) -> Option<TeacherPersona> {
        self.lock_assigned().clone()
    }

    pub fn clear(&self) {
        if let Err(err) = self.storage.remove(PERSONA_STATE_KEY) {
            warn!(target: "persona_store", %err, "failed to clear persisted persona");
        }
        *self.lock_assigned() = None;
    }

    /// Clears the selection whenever the diagnostic workflow announces
    /// that local progress was discarded.
    pub fn watch_invalidation(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<DiagnosticEvent>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(DiagnosticEvent::Invalidated) => {
                        info!(
                            target: "persona_store",
                            "diagnostic invalidated; clearing persona selection"
                        );
                        store.clear();
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            target: "persona_store",
                            skipped,
                            "lagged behind diagnostic events"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn lock_assigned(&self) -> MutexGuard<'_, Option<TeacherPersona>> {
        self.assigned.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStateStore;
    use tokio::time::{sleep, timeout, Duration};

    fn persona() -> TeacherPersona {
        TeacherPersona {
            persona_id: "mentor-3".into(),
            display_name: "Coach Ibarra".into(),
            teaching_style: Some("socratic".into()),
        }
    }

    #[test]
    fn assignment_persists_and_rehydrates() {
        let storage = Arc::new(MemoryStateStore::default());
        {
            let store = PersonaStore::new(Arc::clone(&storage) as Arc<dyn StateStore>);
            store.assign(persona());
        }

        let rebuilt = PersonaStore::new(Arc::clone(&storage) as Arc<dyn StateStore>);
        assert_eq!(rebuilt.assigned(), Some(persona()));
    }

    #[test]
    fn clear_removes_selection_and_blob() {
        let storage = Arc::new(MemoryStateStore::default());
        let store = PersonaStore::new(Arc::clone(&storage) as Arc<dyn StateStore>);
        store.assign(persona());

        store.clear();

        assert_eq!(store.assigned(), None);
        assert_eq!(storage.get(PERSONA_STATE_KEY).expect("get"), None);
    }

    #[tokio::test]
    async fn invalidation_event_clears_selection() {
        let storage = Arc::new(MemoryStateStore::default());
        let store = Arc::new(PersonaStore::new(
            Arc::clone(&storage) as Arc<dyn StateStore>
        ));
        store.assign(persona());

        let (events_tx, events_rx) = broadcast::channel(8);
        let watcher = store.watch_invalidation(events_rx);

        events_tx
            .send(DiagnosticEvent::Invalidated)
            .expect("subscriber alive");

        timeout(Duration::from_millis(500), async {
            while store.assigned().is_some() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("persona should clear after invalidation");

        drop(events_tx);
        watcher.await.expect("watcher exits when the bus closes");
    }
}
