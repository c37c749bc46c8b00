// Declare the main modules
pub mod auth;
pub mod compose;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod filters;
pub mod handlers;
pub mod logging;
pub mod pricing;
pub mod router;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use router::{create_router, AppState};
