//! rosbridge WebSocket link to ROS 2.
//!
//! This module provides [`RosbridgeLink`], which:
//!
//! 1. **Connects** to a `rosbridge_server` WebSocket, advertises the arm and
//!    gripper `JointTrajectory` topics and subscribes to the robot's
//!    `JointState` topic.
//!
//! 2. **Forwards** every [`TrajectoryEvent`] on the [`EventBus`] trajectory
//!    lanes as an `op: publish` frame.
//!
//! 3. **Ingests** inbound `JointState` publishes into the shared
//!    [`JointStateSnapshot`].
//!
//! When the connection drops the link waits `reconnect_delay` and dials again.
//! Trajectories published while disconnected are dropped.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rx200_types::{BridgeError, JointStateMessage, TrajectoryEvent};
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic};
use crate::joint_state::JointStateSnapshot;
use crate::ros2_adapter::{DEFAULT_ARM_TOPIC, DEFAULT_GRIPPER_TOPIC};

/// Default `rosbridge_server` address.
pub const DEFAULT_ROSBRIDGE_URL: &str = "ws://localhost:9090";

/// Default topic the robot publishes its joint states on.
pub const DEFAULT_JOINT_STATES_TOPIC: &str = "/rx200/joint_states";

const TRAJECTORY_TYPE: &str = "trajectory_msgs/msg/JointTrajectory";
const JOINT_STATE_TYPE: &str = "sensor_msgs/msg/JointState";

/// Middleware topic names used by the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTopics {
    pub arm: String,
    pub gripper: String,
    pub joint_states: String,
}

impl Default for LinkTopics {
    fn default() -> Self {
        Self {
            arm: DEFAULT_ARM_TOPIC.to_string(),
            gripper: DEFAULT_GRIPPER_TOPIC.to_string(),
            joint_states: DEFAULT_JOINT_STATES_TOPIC.to_string(),
        }
    }
}

enum SessionEnd {
    Shutdown,
    Closed,
}

/// Bridge between the internal [`EventBus`] and a `rosbridge_server`.
#[derive(Clone)]
pub struct RosbridgeLink {
    bus: Arc<EventBus>,
    snapshot: Arc<JointStateSnapshot>,
    url: String,
    topics: LinkTopics,
    reconnect_delay: Duration,
}

impl RosbridgeLink {
    /// Create a link to `url` that drains `bus` and feeds `snapshot`.
    pub fn new(
        bus: Arc<EventBus>,
        snapshot: Arc<JointStateSnapshot>,
        url: impl Into<String>,
        topics: LinkTopics,
    ) -> Self {
        Self {
            bus,
            snapshot,
            url: url.into(),
            topics,
            reconnect_delay: Duration::from_secs(3),
        }
    }

    /// Override the pause between reconnection attempts (builder-style).
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Keep the link up until `shutdown` flips to `true` (or its sender is
    /// dropped).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.session(&mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Closed) => {
                    warn!(url = %self.url, "rosbridge closed the connection");
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "rosbridge link down");
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!(url = %self.url, "rosbridge link stopped");
    }

    async fn session(&self, shutdown: &mut watch::Receiver<bool>) -> Result<SessionEnd, BridgeError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| self.transport_error(e))?;
        info!(url = %self.url, "rosbridge connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        // Subscribe before the handshake so nothing published after the
        // advertise frames is missed.
        let mut arm_rx = self.bus.subscribe_to(Topic::ArmTrajectory);
        let mut gripper_rx = self.bus.subscribe_to(Topic::GripperTrajectory);

        for frame in self.handshake_frames() {
            ws_tx
                .send(Message::Text(frame.into()))
                .await
                .map_err(|e| self.transport_error(e))?;
        }

        loop {
            let received = tokio::select! {
                result = arm_rx.recv() => result,
                result = gripper_rx.recv() => result,
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_incoming(text.as_str());
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                        Some(Err(e)) => return Err(self.transport_error(e)),
                        Some(Ok(_)) => continue,
                    }
                }
                _ = shutdown.changed() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            };

            match received {
                Ok(event) => {
                    let frame = publish_frame(&event)?;
                    ws_tx
                        .send(Message::Text(frame.into()))
                        .await
                        .map_err(|e| self.transport_error(e))?;
                    debug!(topic = %event.topic, points = event.message.points.len(), "trajectory forwarded");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "rosbridge link lagged; trajectories dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(SessionEnd::Shutdown),
            }
        }
    }

    /// Frames sent right after connecting: two `advertise` ops and one
    /// `subscribe` op.
    pub(crate) fn handshake_frames(&self) -> Vec<String> {
        vec![
            json!({ "op": "advertise", "topic": self.topics.arm, "type": TRAJECTORY_TYPE }).to_string(),
            json!({ "op": "advertise", "topic": self.topics.gripper, "type": TRAJECTORY_TYPE }).to_string(),
            json!({ "op": "subscribe", "topic": self.topics.joint_states, "type": JOINT_STATE_TYPE }).to_string(),
        ]
    }

    /// Parse a frame from rosbridge.
    ///
    /// Only `publish` ops on the joint-state topic are acted upon; everything
    /// else (status ops, other topics, malformed JSON) is ignored.
    pub(crate) fn handle_incoming(&self, text: &str) {
        let Ok(json) = serde_json::from_str::<serde_json::Value>(text) else {
            return;
        };

        let op = json.get("op").and_then(|o| o.as_str()).unwrap_or("");
        let topic = json.get("topic").and_then(|t| t.as_str()).unwrap_or("");
        if op != "publish" || topic != self.topics.joint_states {
            return;
        }

        let Some(msg) = json.get("msg") else {
            return;
        };
        match serde_json::from_value::<JointStateMessage>(msg.clone()) {
            Ok(state) => {
                self.snapshot.apply(&state);
            }
            Err(e) => warn!(topic, error = %e, "malformed joint state"),
        }
    }

    fn transport_error(&self, e: impl std::fmt::Display) -> BridgeError {
        BridgeError::Transport {
            endpoint: self.url.clone(),
            details: e.to_string(),
        }
    }
}

/// Wrap a trajectory event in a rosbridge `publish` op.
pub(crate) fn publish_frame(event: &TrajectoryEvent) -> Result<String, BridgeError> {
    let msg = serde_json::to_value(&event.message)
        .map_err(|e| BridgeError::Serialization(e.to_string()))?;
    Ok(json!({ "op": "publish", "topic": event.topic, "msg": msg }).to_string())
}
