//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameConfig, SessionRegistry};
use crate::store::AuthBackend;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game_config: Arc<GameConfig>,
    pub backend: AuthBackend,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let backend = AuthBackend::new(&config);

        Self {
            config,
            game_config: Arc::new(GameConfig::default()),
            backend,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}
