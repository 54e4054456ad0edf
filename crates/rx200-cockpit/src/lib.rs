//! `rx200-cockpit` – The control API and operator web UI
//!
//! Boots an HTTP server (default port `3000`) that:
//!
//! 1. **Serves** the embedded operator page at `/`: five joint sliders,
//!    gripper open/close, home, demo, and a status light polled every five
//!    seconds.
//!
//! 2. **Accepts** motion requests on `/arm`, `/gripper` and `/command`, which
//!    are translated and published immediately, and on `/sequence` and
//!    `/demo`, which are handed to the [`Dispatcher`][rx200_runtime::Dispatcher]
//!    and run in the background.
//!
//! 3. **Reports** server liveness (`/status`), the dispatcher state
//!    (`GET /sequence`) and the robot's latest joint positions
//!    (`/joint_states`).
//!
//! Shape violations answer 400, a second concurrent sequence answers 409, and
//! internal faults answer a generic 500.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{AppState, CockpitServer, DEFAULT_BIND_ADDRESS, DEFAULT_PORT, build_router};
