use std::sync::Arc;

use crate::config::Config;
use crate::tracker::JobTracker;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tracker: JobTracker,
}

impl AppState {
    pub fn new(config: Config, tracker: JobTracker) -> Self {
        Self {
            config: Arc::new(config),
            tracker,
        }
    }
}
