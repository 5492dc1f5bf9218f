//! Pure domain logic for the Imprint render service.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! persistence layer, the render engine and the HTTP server alike.

pub mod api_keys;
pub mod error;
pub mod hashing;
pub mod output;
pub mod quota;
pub mod scene;
pub mod substitution;
pub mod types;
