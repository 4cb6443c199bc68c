pub mod app;
pub mod auth;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod state;

pub use app::build_app;
pub use controller::{Controller, DeploymentSummary};
pub use error::ApiError;
pub use state::AppState;
