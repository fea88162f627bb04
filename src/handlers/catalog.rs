use axum::extract::State;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::progress::CatalogTotals;

/// GET /api/catalog/totals - published content counts (admin only)
pub async fn totals_get(State(state): State<AppState>) -> ApiResult<CatalogTotals> {
    let totals = state.catalog.published_counts().await?;
    Ok(ApiResponse::ok(totals))
}
