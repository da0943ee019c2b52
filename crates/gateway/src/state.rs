use std::path::PathBuf;
use std::sync::Arc;

use gw_domain::config::Config;
use gw_executor::Executor;
use gw_pricing::PriceCatalog;
use gw_providers::Dispatcher;
use gw_router::Router;
use gw_usage::UsageManager;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub config_path: PathBuf,

    pub dispatcher: Arc<Dispatcher>,
    pub router: Arc<Router>,
    pub usage: Arc<UsageManager>,
    pub pricing: Arc<PriceCatalog>,
    pub executor: Arc<Executor>,

    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
