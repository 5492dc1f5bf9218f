use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use imprint_core::error::CoreError;
use imprint_db::store::QuotaLedger;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::ApiKeyAuth;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub plan: String,
    pub used: i64,
    /// `null` for unlimited plans.
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
}

/// GET /api/v1/usage
///
/// API calls counted in the current billing cycle.
pub async fn get_usage(
    caller: ApiKeyAuth,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let usage = state
        .store
        .usage(caller.account_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Account",
            id: caller.account_id,
        })?;

    Ok(Json(UsageResponse {
        plan: caller.plan_name,
        used: usage.used,
        limit: usage.limit,
        remaining: usage.remaining(),
    }))
}
