use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Database;
use crate::services::notify::Notifier;

pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub notifier: Arc<dyn Notifier>,
}
