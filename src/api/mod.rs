//! HTTP boundary for the job tracker.
//!
//! A thin axum layer: it checks the shared token, limits and parses request
//! bodies, and turns [`crate::tracker::JobTracker`] results into JSON.

mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;

pub use error::ApiError;
pub use server::{router, run};
pub use state::AppState;
