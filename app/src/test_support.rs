use std::path::PathBuf;

use watch_db::Database;

use crate::app::SharedState;
use crate::config::AppConfig;

/// Shared state over an in-memory database with unconfigured platform clients.
pub async fn test_state() -> SharedState {
    let db = Database::open_in_memory().unwrap();
    SharedState::new(db, AppConfig::default(), PathBuf::from("."))
        .await
        .unwrap()
}
