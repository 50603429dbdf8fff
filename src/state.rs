use crate::config::AppConfig;
use crate::identity::Directory;
use crate::kv::Kv;
use crate::token_coordinator::TokenCoordinator;
use std::sync::Arc;

/// Shared application state injected into every handler via `State<AppState>`.
/// Cheap to clone: every field is itself a cheap handle (an `Arc` or a pool
/// clone), matching the teacher's per-router `Arc<...State>` convention —
/// here collapsed into one struct since every route needs the same handles.
#[derive(Clone)]
pub struct AppState {
    pub directory: Directory,
    pub kv: Kv,
    pub tokens: TokenCoordinator,
    pub config: Arc<AppConfig>,
}
