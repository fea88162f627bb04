use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::progress::{compute_stats, CompletionEvent, ProgressRecord, Stats};

#[derive(Debug, Deserialize)]
pub struct QuizSubmission {
    pub score: u32,
    pub passed: bool,
}

#[derive(Debug, Deserialize)]
pub struct SimulationSubmission {
    #[serde(default)]
    pub outcome: Value,
}

/// Read a learner's record and catalog totals, then aggregate.
///
/// The two reads are independent; stats are computed from whatever each returned.
pub(crate) async fn load_stats(state: &AppState, learner_id: &str) -> Result<(Stats, ProgressRecord), ApiError> {
    let record = state.progress.get_progress(learner_id).await?;
    let totals = state.catalog.published_counts().await?;

    let mut stats = compute_stats(record.as_ref(), &totals);
    if state.settings.clamp_display_percentages {
        stats = stats.clamped();
    }

    let record = record.unwrap_or_else(|| ProgressRecord::empty(learner_id));
    Ok((stats, record))
}

/// GET /api/progress - the caller's own progress record
pub async fn progress_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let record = state
        .progress
        .get_progress(&user.subject)
        .await?
        .unwrap_or_else(|| ProgressRecord::empty(&user.subject));

    Ok(ApiResponse::ok(json!({ "progress": record })))
}

/// GET /api/progress/stats - completion percentages for the caller
pub async fn stats_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let (stats, record) = load_stats(&state, &user.subject).await?;
    Ok(ApiResponse::ok(json!({ "stats": stats, "progress": record })))
}

/// POST /api/progress/modules/:id
pub async fn module_complete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(module_id): Path<String>,
) -> ApiResult<Value> {
    record(&state, &user, CompletionEvent::Module { module_id }).await
}

/// POST /api/progress/quizzes/:id - body `{ "score": 0..=100, "passed": bool }`
pub async fn quiz_submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(quiz_id): Path<String>,
    submission: Result<Json<QuizSubmission>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(submission) = submission?;
    let event = CompletionEvent::Quiz {
        quiz_id,
        score: submission.score,
        passed: submission.passed,
    };
    record(&state, &user, event).await
}

/// POST /api/progress/simulations/:id - body `{ "outcome": any }`
pub async fn simulation_complete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(simulation_id): Path<String>,
    submission: Result<Json<SimulationSubmission>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(submission) = submission?;
    let event = CompletionEvent::Simulation {
        simulation_id,
        outcome: submission.outcome,
    };
    record(&state, &user, event).await
}

async fn record(state: &AppState, user: &AuthUser, event: CompletionEvent) -> ApiResult<Value> {
    let record = state.progress.record_completion(&user.subject, event).await?;
    Ok(ApiResponse::created(json!({ "progress": record })))
}
