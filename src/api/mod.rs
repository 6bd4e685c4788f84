//! HTTP exposition of the per-node metrics
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/metrics` | GET | One fresh scrape (Prometheus text format) |
//! | `/health` | GET | Liveness check |

mod handlers;
mod server;

pub use handlers::*;
pub use server::*;
