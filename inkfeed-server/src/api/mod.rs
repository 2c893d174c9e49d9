//! HTTP handlers

pub mod archive;
pub mod export;
pub mod files;
pub mod health;
mod html;
pub mod stats;
pub mod submit;
pub mod ui;

pub use archive::archive_routes;
pub use export::export_routes;
pub use files::file_routes;
pub use health::health_routes;
pub use stats::stats_routes;
pub use submit::submit_routes;
pub use ui::ui_routes;
