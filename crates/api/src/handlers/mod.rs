pub mod images;
pub mod jobs;
pub mod templates;
pub mod usage;
