//! Client-persisted overlay data patched onto server responses: cover
//! images the list endpoint does not echo back, and a bounded list of
//! locally created events shown until the server's own list converges.
//!
//! Both tables follow the same shape: load everything, mutate in memory,
//! write everything back. Reads and writes never propagate failures; the
//! feature degrades to "no overlay" instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::api_client::RawEvent;

const COVERS_TABLE: &str = "event_covers";
const LOCAL_EVENTS_TABLE: &str = "local_events";

/// Most-recent-first cap on locally created event snapshots. Entries are a
/// stop-gap until the server lists the event itself, so plain FIFO eviction
/// is enough.
pub const LOCAL_EVENTS_CAP: usize = 20;

/// Storage the overlay tables persist through. Injectable so tests (and
/// hosts without a filesystem) can substitute an in-memory implementation.
pub trait OverlayBackend: Send + Sync {
    /// Returns the raw serialized table, or `None` when absent/unreadable.
    fn read(&self, table: &str) -> Option<String>;

    /// Persists the serialized table. Failures must be swallowed.
    fn write(&self, table: &str, payload: &str);
}

/// One JSON file per table under the engine's data directory.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::debug!(
                target: "conecta_feed::overlay::file_backend",
                "Could not create overlay directory {:?}: {}",
                dir,
                e
            );
        }
        FileBackend {
            dir: dir.to_path_buf(),
        }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.json", table))
    }
}

impl OverlayBackend for FileBackend {
    fn read(&self, table: &str) -> Option<String> {
        std::fs::read_to_string(self.table_path(table)).ok()
    }

    fn write(&self, table: &str, payload: &str) {
        if let Err(e) = std::fs::write(self.table_path(table), payload) {
            tracing::debug!(
                target: "conecta_feed::overlay::file_backend",
                "Dropping overlay write for {}: {}",
                table,
                e
            );
        }
    }
}

/// In-memory backend for tests and embedders without durable storage.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlayBackend for MemoryBackend {
    fn read(&self, table: &str) -> Option<String> {
        self.tables.lock().ok()?.get(table).cloned()
    }

    fn write(&self, table: &str, payload: &str) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(table.to_string(), payload.to_string());
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlayStore {
    backend: Arc<dyn OverlayBackend>,
}

impl std::fmt::Debug for dyn OverlayBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<OverlayBackend>")
    }
}

impl OverlayStore {
    pub fn new(backend: Arc<dyn OverlayBackend>) -> Self {
        OverlayStore { backend }
    }

    fn load_table<T: serde::de::DeserializeOwned + Default>(&self, table: &str) -> T {
        let Some(raw) = self.backend.read(table) else {
            return T::default();
        };
        match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(
                    target: "conecta_feed::overlay",
                    "Malformed overlay table {}, resetting: {}",
                    table,
                    e
                );
                T::default()
            }
        }
    }

    fn store_table<T: serde::Serialize>(&self, table: &str, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(payload) => self.backend.write(table, &payload),
            Err(e) => {
                tracing::debug!(
                    target: "conecta_feed::overlay",
                    "Dropping overlay write for {}: {}",
                    table,
                    e
                );
            }
        }
    }

    /// Upserts the locally chosen cover for an event.
    pub fn save_cover(&self, event_id: i64, data_url: &str) {
        if event_id <= 0 || data_url.is_empty() {
            return;
        }
        let mut covers: HashMap<String, String> = self.load_table(COVERS_TABLE);
        covers.insert(event_id.to_string(), data_url.to_string());
        self.store_table(COVERS_TABLE, &covers);
    }

    pub fn cover(&self, event_id: i64) -> Option<String> {
        let covers: HashMap<String, String> = self.load_table(COVERS_TABLE);
        covers.get(&event_id.to_string()).cloned()
    }

    /// Upserts a locally created event snapshot at the head of the list and
    /// truncates to the [`LOCAL_EVENTS_CAP`] most recent.
    pub fn save_local_event(&self, event: &RawEvent) {
        if event.id <= 0 {
            return;
        }
        let mut events: Vec<RawEvent> = self.load_table(LOCAL_EVENTS_TABLE);
        events.retain(|existing| existing.id != event.id);
        events.insert(0, event.clone());
        events.truncate(LOCAL_EVENTS_CAP);
        self.store_table(LOCAL_EVENTS_TABLE, &events);
    }

    /// Locally created event snapshots, most recent first.
    pub fn local_events(&self) -> Vec<RawEvent> {
        self.load_table(LOCAL_EVENTS_TABLE)
    }
}
