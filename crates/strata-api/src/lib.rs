pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use app::{build_app, build_app_with_nudges};
pub use error::ApiError;
pub use state::{AppState, Nudges};
