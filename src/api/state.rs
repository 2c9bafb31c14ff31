use std::sync::Arc;

use crate::database::Repository;
use crate::modules::action::DailyPipeline;

/// 所有 handler 共享的状态
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub pipeline: DailyPipeline,
    /// /api/cron 的 Bearer token
    pub cron_secret: String,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, pipeline: DailyPipeline, cron_secret: String) -> Arc<Self> {
        Arc::new(Self { repo, pipeline, cron_secret })
    }
}
