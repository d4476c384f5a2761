pub use crate::api_client::{
    ApiClient, ApiClientError, EventQuery, NewEvent, NewPoll, NewThread, ThreadQuery,
};
pub use crate::error::{FeedError, Result};
pub use crate::feed::overlay::{
    FileBackend, MemoryBackend, OverlayBackend, OverlayStore, LOCAL_EVENTS_CAP,
};
pub use crate::feed::scope::{ScopeContext, ScopeResolver};
pub use crate::feed::{
    FeedEngine, FeedEngineConfig, FeedFilter, FeedState, DEFAULT_PAGE_SIZE, LOAD_ERROR_MESSAGE,
    SCOPE_GUIDANCE_MESSAGE,
};
pub use crate::types::{
    AuthorSummary, CategoryFilter, CommentPreview, EventItem, FeedItem, FeedKey, ItemKind,
    PollItem, PollOption, RsvpStatus, Scope, ThreadItem,
};

use once_cell::sync::OnceCell;
use std::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt::Layer, prelude::*, registry::Registry};

mod api_client;
mod error;
mod feed;
mod types;

static TRACING_GUARDS: OnceCell<Mutex<Option<(WorkerGuard, WorkerGuard)>>> = OnceCell::new();
static TRACING_INIT: OnceCell<()> = OnceCell::new();

pub fn init_tracing(logs_dir: &std::path::Path) {
    TRACING_INIT.get_or_init(|| {
        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix("conecta-feed")
            .filename_suffix("log")
            .build(logs_dir)
            .expect("Failed to create file appender");

        let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
        let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

        TRACING_GUARDS
            .set(Mutex::new(Some((file_guard, stdout_guard))))
            .ok();

        let stdout_layer = Layer::new()
            .with_writer(non_blocking_stdout)
            .with_ansi(true)
            .with_target(true);

        let file_layer = Layer::new()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true);

        Registry::default()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(stdout_layer)
            .with(file_layer)
            .init();
    });
}
