//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod account_repo;
pub mod api_key_repo;
pub mod generated_image_repo;
pub mod job_repo;
pub mod template_repo;
pub mod webhook_repo;

pub use account_repo::AccountRepo;
pub use api_key_repo::ApiKeyRepo;
pub use generated_image_repo::GeneratedImageRepo;
pub use job_repo::RenderJobRepo;
pub use template_repo::TemplateRepo;
pub use webhook_repo::WebhookRepo;
