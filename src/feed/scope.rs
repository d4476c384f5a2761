//! Resolution of the caller's university affiliation, which gates every
//! faculty-scoped query.

use std::sync::{Arc, RwLock};

use tokio::sync::OnceCell;

use crate::api_client::ApiClient;

/// The caller's affiliation as currently known. Starts unloaded, is
/// populated by at most one profile fetch per engine lifetime and never
/// invalidated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeContext {
    pub university: Option<String>,
    pub loaded: bool,
}

pub struct ScopeResolver {
    api: Arc<ApiClient>,
    context: RwLock<ScopeContext>,
    resolved: OnceCell<()>,
}

impl ScopeResolver {
    pub fn new(api: Arc<ApiClient>) -> Self {
        ScopeResolver {
            api,
            context: RwLock::new(ScopeContext::default()),
            resolved: OnceCell::new(),
        }
    }

    /// Synchronous snapshot of the current context. Callers must check
    /// `loaded` before issuing a faculty-scoped fetch; an unloaded context
    /// is a deferred state, not an error.
    pub fn current(&self) -> ScopeContext {
        self.context
            .read()
            .map(|ctx| ctx.clone())
            .unwrap_or_default()
    }

    /// Resolves the caller's affiliation. Idempotent and single-flight:
    /// concurrent callers await the same profile fetch, and later calls
    /// return the cached context without touching the network.
    ///
    /// Resolution never blocks the feed forever: with no caller identity it
    /// completes immediately with no affiliation, and a failed profile
    /// fetch is logged and treated the same way.
    pub async fn resolve(&self) -> ScopeContext {
        self.resolved
            .get_or_init(|| async {
                let university = self.fetch_university().await;
                if let Ok(mut ctx) = self.context.write() {
                    *ctx = ScopeContext {
                        university,
                        loaded: true,
                    };
                }
            })
            .await;
        self.current()
    }

    async fn fetch_university(&self) -> Option<String> {
        if !self.api.has_auth_token() {
            tracing::debug!(
                target: "conecta_feed::scope::resolve",
                "No caller identity, resolving scope without affiliation"
            );
            return None;
        }

        match self.api.fetch_my_profile().await {
            Ok(profile) => profile
                .university
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            Err(e) => {
                tracing::warn!(
                    target: "conecta_feed::scope::resolve",
                    "Profile fetch failed, resolving scope without affiliation: {}",
                    e
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for ScopeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeResolver")
            .field("context", &self.current())
            .finish()
    }
}
