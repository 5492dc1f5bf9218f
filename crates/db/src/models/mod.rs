//! Row types and DTOs, one module per table family.

pub mod account;
pub mod generated_image;
pub mod job;
pub mod status;
pub mod template;
pub mod webhook;
