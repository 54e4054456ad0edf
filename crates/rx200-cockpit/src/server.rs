//! [`CockpitServer`] – HTTP server for the control API and operator UI.
//!
//! Listens on `0.0.0.0:3000` by default (configurable via
//! [`CockpitServer::with_bind_address`] and [`CockpitServer::with_port`]).

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use rx200_middleware::JointStateSnapshot;
use rx200_runtime::Dispatcher;
use rx200_types::BridgeError;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::routes;

/// Default TCP port for the control API.
pub const DEFAULT_PORT: u16 = 3000;

/// Default interface the server binds to.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// The compiled-in operator UI (HTML + CSS + JS).
pub(crate) const COCKPIT_HTML: &str = include_str!("cockpit.html");

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub snapshot: Arc<JointStateSnapshot>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, snapshot: Arc<JointStateSnapshot>) -> Self {
        Self { dispatcher, snapshot }
    }
}

/// Build the full route table with CORS applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(routes::index))
        .route("/status", get(routes::status))
        .route("/command", post(routes::command))
        .route("/arm", post(routes::arm))
        .route("/gripper", post(routes::gripper))
        .route(
            "/sequence",
            post(routes::start_sequence).get(routes::sequence_status),
        )
        .route("/demo", get(routes::demo))
        .route("/joint_states", get(routes::joint_states))
        .layer(cors)
        .with_state(state)
}

/// HTTP front end of the bridge.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rx200_cockpit::{AppState, CockpitServer};
/// use rx200_middleware::{EventBus, JointStateSnapshot, Ros2Publisher};
/// use rx200_runtime::{Dispatcher, ExecutionMode};
///
/// #[tokio::main]
/// async fn main() {
///     let bus = Arc::new(EventBus::default());
///     let dispatcher = Dispatcher::new(
///         Arc::new(Ros2Publisher::arm(Arc::clone(&bus))),
///         Arc::new(Ros2Publisher::gripper(Arc::clone(&bus))),
///         ExecutionMode::Batched,
///         2.0,
///     );
///     let state = AppState::new(dispatcher, Arc::new(JointStateSnapshot::new()));
///     CockpitServer::new(state)
///         .run(std::future::pending())
///         .await
///         .expect("cockpit server failed");
/// }
/// ```
pub struct CockpitServer {
    state: AppState,
    bind_address: String,
    port: u16,
}

impl CockpitServer {
    /// Create a server for `state` on [`DEFAULT_BIND_ADDRESS`]:[`DEFAULT_PORT`].
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the bind interface (builder-style).
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Return the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] if the listener cannot bind and
    /// [`BridgeError::Internal`] if the server stops abnormally.
    pub async fn run<F>(self, shutdown: F) -> Result<(), BridgeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let endpoint = format!("{}:{}", self.bind_address, self.port);
        let listener = TcpListener::bind(endpoint.as_str())
            .await
            .map_err(|e| BridgeError::Transport {
                endpoint: endpoint.clone(),
                details: format!("bind failed: {e}"),
            })?;
        info!(%endpoint, "control server listening");

        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| BridgeError::Internal(format!("http server error: {e}")))?;
        info!("control server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx200_middleware::{EventBus, Ros2Publisher};
    use rx200_runtime::ExecutionMode;

    fn state() -> AppState {
        let bus = Arc::new(EventBus::default());
        let dispatcher = Dispatcher::new(
            Arc::new(Ros2Publisher::arm(Arc::clone(&bus))),
            Arc::new(Ros2Publisher::gripper(bus)),
            ExecutionMode::Serial,
            2.0,
        );
        AppState::new(dispatcher, Arc::new(JointStateSnapshot::new()))
    }

    #[test]
    fn builder_overrides_defaults() {
        let server = CockpitServer::new(state());
        assert_eq!(server.port(), DEFAULT_PORT);
        let server = server.with_port(8088).with_bind_address("127.0.0.1");
        assert_eq!(server.port(), 8088);
        assert_eq!(server.bind_address, "127.0.0.1");
    }

    #[tokio::test]
    async fn run_reports_bind_failure() {
        let blocker = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = blocker.local_addr().unwrap().port();
        let result = CockpitServer::new(state())
            .with_bind_address("127.0.0.1")
            .with_port(port)
            .run(std::future::ready(()))
            .await;
        assert!(
            matches!(result, Err(BridgeError::Transport { .. })),
            "expected a bind failure on an occupied port, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let result = CockpitServer::new(state())
            .with_bind_address("127.0.0.1")
            .with_port(0)
            .run(std::future::ready(()))
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn ui_renders_joint_states_as_text() {
        let readout = COCKPIT_HTML
            .split("async function refreshReadouts()")
            .nth(1)
            .and_then(|rest| rest.split("function requireConnection()").next())
            .expect("read-out code present");
        assert!(!readout.contains("innerHTML"), "joint names come from ROS and must not be parsed as markup");
        assert!(readout.contains("textContent"));
        assert!(readout.contains("Number.isFinite(value)"), "non-numeric positions must not break the refresh");
    }
}
