use anyhow::{Context, Result};
use log::info;

use timetable_scheduler::config::{Config, init_logging};
use timetable_scheduler::rules::FileRulesProvider;
use timetable_scheduler::service::generate_current_term;
use timetable_scheduler::solver::Scheduler;
use timetable_scheduler::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(&config.log_level);

    let store = SqliteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    let rules = FileRulesProvider::new(&config.rules_path);
    info!("Using rules document {}", rules.path().display());

    let result = generate_current_term(&store, &rules, &mut Scheduler::new())
        .await
        .context("timetable generation failed")?;

    println!("Timetable generated: {result}");
    Ok(())
}
