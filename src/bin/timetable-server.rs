use anyhow::{Context, Result};

use timetable_scheduler::config::{Config, init_logging};
use timetable_scheduler::rules::FileRulesProvider;
use timetable_scheduler::server::{AppState, run_server};
use timetable_scheduler::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(&config.log_level);

    let store = SqliteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    let state = AppState::new(store, FileRulesProvider::new(&config.rules_path));

    run_server(state, config.bind_addr)
        .await
        .context("server terminated")?;
    Ok(())
}
