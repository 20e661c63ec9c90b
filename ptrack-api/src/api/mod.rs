//! HTTP API handlers for ptrack-api

pub mod activity;
pub mod auth;
pub mod health;
pub mod suggestions;
pub mod voice_journals;

pub use activity::activity_routes;
pub use auth::CurrentUser;
pub use health::health_routes;
pub use suggestions::suggestion_routes;
pub use voice_journals::voice_journal_routes;
