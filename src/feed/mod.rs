//! The feed engine: one orchestrator owning the API client, the scope
//! resolver, the overlay store and the in-memory feed list. The UI layer
//! drives it through [`FeedEngine::load`] and the mutation methods and
//! renders the [`FeedItem`] sequence it exposes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::api_client::{ApiClient, NewEvent, NewPoll, NewThread};
use crate::error::{FeedError, Result};
use crate::types::{CategoryFilter, CommentPreview, FeedItem};

pub mod aggregator;
pub mod mutations;
pub mod normalizer;
pub mod overlay;
pub mod scope;

use normalizer::{normalize_comment, normalize_event, normalize_poll, normalize_thread};
use overlay::{FileBackend, OverlayBackend, OverlayStore};
use scope::ScopeResolver;

/// Thread page size when the config does not override it.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Events are fetched once per reset with this fixed page size; they have no
/// incremental pagination.
pub(crate) const EVENTS_PAGE_SIZE: usize = 10;
pub(crate) const POLLS_PAGE_SIZE: usize = 20;

/// Generic user-facing message for a failed feed fetch.
pub const LOAD_ERROR_MESSAGE: &str = "Could not load the feed. Try again in a moment.";

/// Guidance shown when the faculty feed is requested but the caller's
/// profile has no university.
pub const SCOPE_GUIDANCE_MESSAGE: &str =
    "Complete your profile with your university to see this feed.";

#[derive(Clone)]
pub struct FeedEngineConfig {
    /// Base URL of the backend, e.g. `https://api.conecta.example`.
    pub api_base_url: String,

    /// Directory for persisted client data (the overlay tables).
    pub data_dir: PathBuf,

    /// Thread page size; drives the `has_more` signal.
    pub page_size: usize,

    /// Bearer token of the logged-in caller, when there is one.
    pub auth_token: Option<String>,
}

impl FeedEngineConfig {
    pub fn new(api_base_url: impl Into<String>, data_dir: &Path) -> Self {
        FeedEngineConfig {
            api_base_url: api_base_url.into(),
            data_dir: data_dir.to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
            auth_token: None,
        }
    }

    /// Reads the configuration from the environment (`CONECTA_API_URL`,
    /// `CONECTA_DATA_DIR`, `CONECTA_AUTH_TOKEN`), honoring an `.env` file
    /// when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_base_url = std::env::var("CONECTA_API_URL")
            .map_err(|_| FeedError::Configuration("CONECTA_API_URL is not set".to_string()))?;
        let data_dir = std::env::var("CONECTA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("conecta-data"));

        let mut config = FeedEngineConfig::new(api_base_url, &data_dir);
        config.auth_token = std::env::var("CONECTA_AUTH_TOKEN").ok();
        Ok(config)
    }
}

impl std::fmt::Debug for FeedEngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedEngineConfig")
            .field("api_base_url", &self.api_base_url)
            .field("data_dir", &self.data_dir)
            .field("page_size", &self.page_size)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Filter the UI drives the feed with. Changing it does not reload by
/// itself; the caller follows up with `load(true)`.
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub category: CategoryFilter,
    pub search: String,
}

/// The renderable feed state. `skip` and `has_more` are driven only by the
/// thread sub-stream.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub items: Vec<FeedItem>,
    pub skip: usize,
    pub has_more: bool,
    /// User-facing message for the last failed load, if any.
    pub error: Option<String>,
}

pub struct FeedEngine {
    config: FeedEngineConfig,
    api: Arc<ApiClient>,
    scope: ScopeResolver,
    overlay: OverlayStore,
    state: RwLock<FeedState>,
    filter: RwLock<FeedFilter>,
    load_in_flight: AtomicBool,
    alive: AtomicBool,
}

impl FeedEngine {
    pub fn new(config: FeedEngineConfig) -> Result<Self> {
        let backend = Arc::new(FileBackend::new(&config.data_dir.join("overlay")));
        Self::with_overlay_backend(config, backend)
    }

    /// Builds the engine over an injected overlay backend. Tests use this
    /// with an in-memory backend instead of real persistent storage.
    pub fn with_overlay_backend(
        config: FeedEngineConfig,
        backend: Arc<dyn OverlayBackend>,
    ) -> Result<Self> {
        let api = Arc::new(ApiClient::new(
            config.api_base_url.clone(),
            config.auth_token.clone(),
        )?);

        Ok(FeedEngine {
            scope: ScopeResolver::new(api.clone()),
            overlay: OverlayStore::new(backend),
            api,
            config,
            state: RwLock::new(FeedState::default()),
            filter: RwLock::new(FeedFilter::default()),
            load_in_flight: AtomicBool::new(false),
            alive: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &FeedEngineConfig {
        &self.config
    }

    pub fn scope(&self) -> &ScopeResolver {
        &self.scope
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.api
    }

    pub(crate) fn overlay(&self) -> &OverlayStore {
        &self.overlay
    }

    // --- state access ---

    pub fn state(&self) -> FeedState {
        self.state
            .read()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// The merged, ordered feed the renderer consumes.
    pub fn items(&self) -> Vec<FeedItem> {
        self.state().items
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more
    }

    pub fn error(&self) -> Option<String> {
        self.state().error
    }

    /// Applies a state mutation unless the engine has been shut down; a
    /// dead engine discards results instead of writing them.
    pub(crate) fn write_state<R>(&self, f: impl FnOnce(&mut FeedState) -> R) -> Option<R> {
        if !self.is_alive() {
            return None;
        }
        self.state.write().ok().map(|mut state| f(&mut state))
    }

    // --- filter ---

    pub fn filter(&self) -> FeedFilter {
        self.filter
            .read()
            .map(|filter| filter.clone())
            .unwrap_or_default()
    }

    /// Switches the active category. The caller re-triggers `load(true)`;
    /// the aggregator's scope guard keeps an unresolved faculty switch from
    /// racing a stale feed in.
    pub fn set_category(&self, category: CategoryFilter) {
        if let Ok(mut filter) = self.filter.write() {
            filter.category = category;
        }
    }

    pub fn set_search(&self, search: impl Into<String>) {
        if let Ok(mut filter) = self.filter.write() {
            filter.search = search.into();
        }
    }

    // --- lifecycle ---

    /// Marks the engine dead: in-flight work completes but its results are
    /// discarded and no further state is written.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);
        tracing::debug!(target: "conecta_feed::engine", "Engine shut down");
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    // --- creation (server-confirmed, then prepended locally) ---

    pub async fn create_thread(&self, payload: &NewThread) -> Result<FeedItem> {
        let raw = self.api.create_thread(payload).await?;
        let item = normalize_thread(&raw);
        self.prepend(item.clone());
        Ok(item)
    }

    /// Creates an event and records the client-side overlay data: the
    /// chosen cover (the list endpoint does not echo it back) and a local
    /// snapshot shown until the server's own list includes the event.
    pub async fn create_event(
        &self,
        payload: &NewEvent,
        cover_data_url: Option<&str>,
    ) -> Result<FeedItem> {
        let mut raw = self.api.create_event(payload).await?;

        if let Some(cover) = cover_data_url {
            self.overlay.save_cover(raw.id, cover);
            if raw.photo_url.is_none() {
                raw.photo_url = Some(cover.to_string());
            }
        }
        self.overlay.save_local_event(&raw);

        let item = normalize_event(&raw, self.overlay.cover(raw.id));
        self.prepend(item.clone());
        Ok(item)
    }

    pub async fn create_poll(&self, payload: &NewPoll) -> Result<FeedItem> {
        let raw = self.api.create_poll(payload).await?;
        let item = normalize_poll(&raw);
        self.prepend(item.clone());
        Ok(item)
    }

    fn prepend(&self, item: FeedItem) {
        self.write_state(|state| state.items.insert(0, item));
    }

    // --- comments (pass-through thread actions) ---

    pub async fn comments(
        &self,
        thread_id: i64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<CommentPreview>> {
        let raw = self.api.list_comments(thread_id, skip, limit).await?;
        Ok(raw.iter().map(normalize_comment).collect())
    }

    /// Posts a comment and returns the created preview for the caller to
    /// attach locally.
    pub async fn add_comment(&self, thread_id: i64, content: &str) -> Result<CommentPreview> {
        let raw = self.api.add_comment(thread_id, content).await?;
        Ok(normalize_comment(&raw))
    }
}

impl std::fmt::Debug for FeedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedEngine")
            .field("config", &self.config)
            .field("items", &self.state().items.len())
            .field("alive", &self.is_alive())
            .finish()
    }
}
