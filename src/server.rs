use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use log::info;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::data::{BuildResult, SolveInput, SolveOutput};
use crate::error::SchedulerError;
use crate::report::{ComparisonReport, compare, teacher_contains};
use crate::rules::{FileRulesProvider, RulesProvider};
use crate::service::generate_current_term;
use crate::solver::Scheduler;
use crate::store::{AssignmentRepository, SqliteStore, TermRepository, TimetableStore};

#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub rules: FileRulesProvider,
    /// Serialises runs; its day cursors persist for the life of the process.
    pub scheduler: Arc<Mutex<Scheduler>>,
}

impl AppState {
    pub fn new(store: SqliteStore, rules: FileRulesProvider) -> Self {
        Self {
            store,
            rules,
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
        }
    }
}

async fn generate_handler(State(state): State<AppState>) -> Result<Json<BuildResult>, SchedulerError> {
    let mut scheduler = state.scheduler.lock().await;
    let result = generate_current_term(&state.store, &state.rules, &mut scheduler).await?;
    Ok(Json(result))
}

async fn solve_handler(State(state): State<AppState>, Json(input): Json<SolveInput>) -> Json<SolveOutput> {
    let policy = input.policy.unwrap_or_else(|| state.rules.load());
    let schedule = Scheduler::new().build(input.term_id, &input.assignments, &policy);
    Json(SolveOutput {
        entries: schedule.entries,
        deficits: schedule.deficits,
        swaps: schedule.swaps,
    })
}

#[derive(Debug, Deserialize)]
struct ReportParams {
    #[serde(default)]
    only_mismatches: bool,
    teacher_contains: Option<String>,
}

async fn report_handler(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ComparisonReport>, SchedulerError> {
    let term = state
        .store
        .get_current_term()
        .await?
        .ok_or(SchedulerError::NoActiveTerm)?;
    let mut assignments = state.store.list_assignments().await?;
    if let Some(needle) = params.teacher_contains.as_deref() {
        assignments = teacher_contains(&assignments, needle);
    }
    let entries = state.store.list_term_entries(term.id).await?;
    let report = compare(&assignments, &entries);
    Ok(Json(if params.only_mismatches {
        report.only_mismatches()
    } else {
        report
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/timetable/generate", post(generate_handler))
        .route("/v1/timetable/solve", post(solve_handler))
        .route("/v1/timetable/report", get(report_handler))
        .with_state(state)
}

pub async fn run_server(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
