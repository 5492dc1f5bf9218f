use crate::types::DbId;

/// Domain-level error shared by every crate in the workspace.
///
/// HTTP mapping lives in the API crate; this type only describes what went
/// wrong in domain terms.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The account has no API calls left in the current billing cycle.
    /// `in_flight` counts admitted calls that are still rendering.
    #[error("Rate limited: {used} of {limit:?} API calls used, {in_flight} in flight")]
    RateLimited {
        used: i64,
        limit: Option<i64>,
        in_flight: i64,
    },
}
