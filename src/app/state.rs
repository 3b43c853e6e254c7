//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::registry::SessionRegistry;
use crate::game::runner::SessionSpawner;
use crate::game::snapshot::{MatchSummarySink, TracingSummarySink};
use crate::matchmaking::MatchmakingService;
use crate::ws::channels::PlayerChannels;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub channels: Arc<PlayerChannels>,
    pub matchmaking: Arc<MatchmakingService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_sink(config, Arc::new(TracingSummarySink))
    }

    /// Build state that hands finished matches to `sink`
    pub fn with_sink(config: Config, sink: Arc<dyn MatchSummarySink>) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(SessionRegistry::new());
        let channels = Arc::new(PlayerChannels::new());

        let spawner = SessionSpawner {
            registry: registry.clone(),
            channels: channels.clone(),
            sink,
            game: config.game,
            grace: config.session_grace,
        };

        // Arc for sharing across cloned AppState
        let matchmaking = Arc::new(MatchmakingService::new(spawner, config.queue));

        Self {
            config,
            registry,
            channels,
            matchmaking,
        }
    }
}
