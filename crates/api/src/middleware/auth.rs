//! API key authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use imprint_core::api_keys::{extract_prefix, hash_api_key, parse_bearer};
use imprint_core::error::CoreError;
use imprint_core::types::DbId;
use imprint_db::models::account::ApiKeyPrincipal;
use imprint_db::store::AccountDirectory;

use crate::error::AppError;
use crate::state::AppState;

/// The account behind a valid, unrevoked API key.
///
/// Use this as an extractor parameter in any handler that requires authentication:
///
/// ```ignore
/// async fn my_handler(caller: ApiKeyAuth) -> AppResult<Json<()>> {
///     tracing::info!(account_id = caller.account_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    pub account_id: DbId,
    pub plan_name: String,
}

impl From<ApiKeyPrincipal> for ApiKeyAuth {
    fn from(p: ApiKeyPrincipal) -> Self {
        Self {
            account_id: p.account_id,
            plan_name: p.plan_name,
        }
    }
}

impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let key = parse_bearer(auth_header).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <api key>".into(),
            ))
        })?;

        let principal = state
            .store
            .find_principal_by_key_hash(&hash_api_key(key))
            .await?
            .ok_or_else(|| {
                tracing::debug!(key_prefix = extract_prefix(key), "Rejected unknown API key");
                AppError::Core(CoreError::Unauthorized("Invalid or revoked API key".into()))
            })?;

        // Usage tracking must never hold up or fail the request.
        let store = std::sync::Arc::clone(&state.store);
        let api_key_id = principal.api_key_id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_api_key(api_key_id).await {
                tracing::warn!(api_key_id, error = %e, "Failed to record API key use");
            }
        });

        Ok(principal.into())
    }
}
