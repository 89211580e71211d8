use std::sync::Arc;

use crate::config::DetectorConfig;

/// Read-only; each request builds its own scorer from this config.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DetectorConfig>,
}

impl AppState {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}
