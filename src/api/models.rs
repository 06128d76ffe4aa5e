//! Wire types of the HTTP API that are not job views.
//!
//! Jobs themselves are served as [`crate::ledger::JobView`]:
//!
//! ```json
//! {
//!   "id": "01932c4e-8a51-7cc3-9d0e-5f1f3b0c2a11",
//!   "url": "https://example.com/video",
//!   "caption": false,
//!   "cookie": "",
//!   "refer": "",
//!   "stream-format": "",
//!   "status": "PartlyDone",
//!   "errors": ["HTTP 404 for https://example.com/video/2"],
//!   "created_at": 1700000000,
//!   "finished_at": 1700000012
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;

/// `?token=` carried by every protected request
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_jobs: usize,
    pub outstanding_jobs: usize,
    pub jobs: MetricsSnapshot,
}
