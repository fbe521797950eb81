mod error;
pub mod models;
pub mod rate_limit;
mod server;
pub mod services;
pub mod state;
pub mod utils;

pub use error::ApiError;
pub use server::{build_router, run};
pub use state::AppState;
