use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use fieldgate_core::{status_text, STATUS_KEY};
use fieldgate_mqtt::CommandHandler;

/// Value reported until a device or command says otherwise.
pub const DEFAULT_STATUS: &str = "UNKNOWN";

/// The single process-wide device status.
///
/// Shared between HTTP handlers and the broker subscriber. Every access
/// goes through the mutex; the lock is never held across I/O.
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<Mutex<String>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(DEFAULT_STATUS.to_string())),
        }
    }

    pub fn get(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, value: impl Into<String>) {
        let value = value.into();
        {
            let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = value.clone();
        }
        // Reported after the lock is released; the update itself never
        // waits on the logging pipeline.
        info!(status = %value, "status updated");
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes broker-originated commands straight into the status store.
///
/// The subscriber runs in its own task; converging on the store's mutex
/// is the only coordination it needs with the HTTP side.
pub struct StatusCommandHandler {
    status: StatusStore,
}

impl StatusCommandHandler {
    pub fn new(status: StatusStore) -> Self {
        Self { status }
    }
}

#[async_trait]
impl CommandHandler for StatusCommandHandler {
    async fn handle(&self, command: Value) {
        if let Some(status) = command.get(STATUS_KEY) {
            let status = status_text(status);
            info!(status = %status, "applying broker command");
            self.status.set(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn starts_unknown() {
        assert_eq!(StatusStore::new().get(), DEFAULT_STATUS);
    }

    #[test]
    fn set_is_visible_to_subsequent_get() {
        let store = StatusStore::new();
        store.set("WATERING");
        assert_eq!(store.get(), "WATERING");
    }

    #[test]
    fn concurrent_writers_never_tear_the_value() {
        let store = StatusStore::new();
        let candidates: Vec<String> = (0..8).map(|i| format!("STATE_{i}")).collect();
        let handles: Vec<_> = candidates
            .iter()
            .cloned()
            .map(|value| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.set(value.clone());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(candidates.contains(&store.get()));
    }

    #[tokio::test]
    async fn broker_command_updates_store() {
        let store = StatusStore::new();
        let handler = StatusCommandHandler::new(store.clone());
        handler.handle(json!({"status": "IDLE"})).await;
        assert_eq!(store.get(), "IDLE");
    }
}
