//! Control plane for the video handler.
//!
//! A small axum router in front of the stage controller and the adaptive
//! bitrate controller. Stage calls can block on pipeline state changes, so
//! handlers run them on the blocking pool.
//!
//! # Endpoints
//!
//! | Endpoint | Description |
//! |----------|-------------|
//! | `GET /api/health` | Liveness, uptime and version |
//! | `GET /api/stream` | Current bitrate/fps targets and RTCP activity |
//! | `GET /api/motioncells` | Stage properties and `enabled` |
//! | `POST /api/motioncells` | Toggle the stage and/or set properties |

pub mod error;
pub mod routes;
mod state;

pub use error::{ApiError, ApiErrorResponse};
pub use routes::api_router;
pub use state::ApiState;
