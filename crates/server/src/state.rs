use std::sync::Arc;

use conveyor_core::{Config, SanitizedConfig, SequentialLane, TaskRegistry};

/// Shared application state
pub struct AppState {
    config: Config,
    registry: Arc<TaskRegistry>,
    /// Present only in sequential mode; feeds queue depth and the current
    /// task pointer into the health endpoint.
    lane: Option<Arc<SequentialLane>>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<TaskRegistry>,
        lane: Option<Arc<SequentialLane>>,
    ) -> Self {
        Self {
            config,
            registry,
            lane,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn lane(&self) -> Option<&Arc<SequentialLane>> {
        self.lane.as_ref()
    }
}
