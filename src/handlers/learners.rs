use axum::{
    extract::{Path, State},
    http::HeaderMap,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::progress::load_stats;
use crate::app::AppState;
use crate::auth::{Role, RoleTable};
use crate::middleware::{ApiResponse, ApiResult};

/// What a staff member sees of another learner's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerView {
    /// Stats and the full completion record
    Full,
    /// Stats only
    Summary,
}

// First match wins; keep roles disjoint across entries.
static LEARNER_VIEWS: Lazy<RoleTable<LearnerView>> = Lazy::new(|| {
    RoleTable::new()
        .entry(&[Role::Admin], LearnerView::Full)
        .entry(&[Role::Instructor], LearnerView::Summary)
});

/// GET /api/learners/:id/progress
pub async fn learner_progress_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(learner_id): Path<String>,
) -> ApiResult<Value> {
    let (claims, view) = state.gate.dispatch(&headers, &*LEARNER_VIEWS).into_result()?;

    tracing::debug!(viewer = %claims.sub, role = %claims.role, learner = %learner_id, ?view, "Learner progress lookup");

    let (stats, record) = load_stats(&state, &learner_id).await?;
    let data = match view {
        LearnerView::Full => json!({ "stats": stats, "progress": record }),
        LearnerView::Summary => json!({ "stats": stats }),
    };
    Ok(ApiResponse::ok(data))
}
