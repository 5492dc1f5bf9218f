//! Request extractors shared by the handlers.
//!
//! - [`auth::ApiKeyAuth`] -- Resolves the caller from an `Authorization: Bearer <key>` header.
//! - [`extract`] -- `Json`/`Query`/`Path` wrappers whose rejections use the JSON error body.

pub mod auth;
pub mod extract;
