//! One scheduler run from stored obligations to a replaced grid.

use log::info;

use crate::data::BuildResult;
use crate::error::SchedulerError;
use crate::rules::RulesProvider;
use crate::solver::Scheduler;
use crate::store::{AssignmentRepository, TermRepository, TimetableStore, persist};

/// Rebuilds the current term's timetable and replaces the stored grid.
///
/// Aborts with [`SchedulerError::NoActiveTerm`] before reading anything else
/// when no term is current. Stored data is only touched by the final
/// atomic replace.
pub async fn generate_current_term<S, R>(
    store: &S,
    rules: &R,
    scheduler: &mut Scheduler,
) -> Result<BuildResult, SchedulerError>
where
    S: TermRepository + AssignmentRepository + TimetableStore + Sync,
    R: RulesProvider + Sync + ?Sized,
{
    let term = store
        .get_current_term()
        .await?
        .ok_or(SchedulerError::NoActiveTerm)?;
    info!("Generating timetable for term {} ({})", term.id, term.name);

    let policy = rules.load();
    let assignments = store.list_assignments().await?;
    let schedule = scheduler.build(term.id, &assignments, &policy);

    let result = persist(store, term.id, &schedule.entries).await?;
    info!(
        "Term {} timetable stored: {} ({} assignments short of target)",
        term.id,
        result,
        schedule.deficits.len()
    );
    Ok(result)
}
