//! ROS 2 publisher for the RX200 controllers.
//!
//! [`Ros2Publisher`] implements [`TrajectoryPublisher`] by wrapping each
//! `trajectory_msgs/msg/JointTrajectory` in a [`TrajectoryEvent`] addressed to
//! a middleware topic and publishing it on the actuator's [`Topic`] lane of the
//! internal [`EventBus`].  The [`RosbridgeLink`][crate::ros2_bridge::RosbridgeLink]
//! drains those lanes onto the rosbridge WebSocket.

use async_trait::async_trait;
use chrono::Utc;
use rx200_types::{Actuator, BridgeError, TrajectoryEvent, TrajectoryMessage};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::adapter::TrajectoryPublisher;
use crate::bus::{EventBus, Topic};

/// Default middleware topic for arm trajectories.
pub const DEFAULT_ARM_TOPIC: &str = "/rx200/arm_controller/joint_trajectory";

/// Default middleware topic for gripper trajectories.
pub const DEFAULT_GRIPPER_TOPIC: &str = "/rx200/gripper_controller/joint_trajectory";

/// Maximum number of points accepted in a single trajectory.
///
/// Larger messages are rejected before they reach the bus.
pub const MAX_TRAJECTORY_POINTS: usize = 1024;

/// Publishes one actuator's trajectories towards ROS 2.
pub struct Ros2Publisher {
    bus: Arc<EventBus>,
    actuator: Actuator,
    topic: String,
}

impl Ros2Publisher {
    /// Create a publisher for `actuator` that addresses `topic`.
    pub fn new(bus: Arc<EventBus>, actuator: Actuator, topic: impl Into<String>) -> Self {
        Self {
            bus,
            actuator,
            topic: topic.into(),
        }
    }

    /// Publisher on [`DEFAULT_ARM_TOPIC`].
    pub fn arm(bus: Arc<EventBus>) -> Self {
        Self::new(bus, Actuator::Arm, DEFAULT_ARM_TOPIC)
    }

    /// Publisher on [`DEFAULT_GRIPPER_TOPIC`].
    pub fn gripper(bus: Arc<EventBus>) -> Self {
        Self::new(bus, Actuator::Gripper, DEFAULT_GRIPPER_TOPIC)
    }

    pub fn actuator(&self) -> Actuator {
        self.actuator
    }

    fn check_shape(&self, message: &TrajectoryMessage) -> Result<(), BridgeError> {
        if message.points.len() > MAX_TRAJECTORY_POINTS {
            return Err(BridgeError::InvalidCommand(format!(
                "trajectory has {} points, exceeding the limit of {}",
                message.points.len(),
                MAX_TRAJECTORY_POINTS,
            )));
        }
        let joints = message.joint_names.len();
        if let Some(point) = message.points.iter().find(|p| p.positions.len() != joints) {
            return Err(BridgeError::Serialization(format!(
                "trajectory point carries {} positions for {} joints",
                point.positions.len(),
                joints
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TrajectoryPublisher for Ros2Publisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, message: TrajectoryMessage) -> Result<(), BridgeError> {
        self.check_shape(&message)?;
        let event = TrajectoryEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: format!("rx200-middleware::ros2/{}", self.actuator),
            topic: self.topic.clone(),
            message,
        };
        let receivers = self.bus.publish_to(Topic::for_actuator(self.actuator), event);
        if receivers == 0 {
            debug!(topic = %self.topic, "no transport attached; trajectory dropped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx200_types::{Header, RosTime, TrajectoryPoint};

    fn make_message(joints: usize, positions: usize, points: usize) -> TrajectoryMessage {
        TrajectoryMessage {
            header: Header::default(),
            joint_names: (0..joints).map(|i| format!("j{i}")).collect(),
            points: (0..points)
                .map(|_| TrajectoryPoint {
                    positions: vec![0.0; positions],
                    velocities: vec![],
                    accelerations: vec![],
                    effort: vec![],
                    time_from_start: RosTime::default(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn publish_routes_to_actuator_lane() {
        let bus = Arc::new(EventBus::default());
        let mut arm_rx = bus.subscribe_to(Topic::ArmTrajectory);
        let mut gripper_rx = bus.subscribe_to(Topic::GripperTrajectory);
        let publisher = Ros2Publisher::gripper(Arc::clone(&bus));

        publisher.publish(make_message(2, 2, 1)).await.unwrap();

        let event = gripper_rx.recv().await.unwrap();
        assert_eq!(event.topic, DEFAULT_GRIPPER_TOPIC);
        assert_eq!(event.source, "rx200-middleware::ros2/gripper");
        assert!(arm_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_link_is_fire_and_forget() {
        let bus = Arc::new(EventBus::default());
        let publisher = Ros2Publisher::arm(bus);
        assert!(publisher.publish(make_message(5, 5, 1)).await.is_ok());
        assert_eq!(publisher.topic(), DEFAULT_ARM_TOPIC);
    }

    #[tokio::test]
    async fn publish_rejects_oversized_trajectory() {
        let publisher = Ros2Publisher::arm(Arc::new(EventBus::default()));
        let result = publisher
            .publish(make_message(5, 5, MAX_TRAJECTORY_POINTS + 1))
            .await;
        assert!(
            matches!(result, Err(BridgeError::InvalidCommand(_))),
            "expected InvalidCommand for oversized trajectory, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn publish_rejects_ragged_points() {
        let publisher = Ros2Publisher::arm(Arc::new(EventBus::default()));
        let result = publisher.publish(make_message(5, 4, 1)).await;
        assert!(matches!(result, Err(BridgeError::Serialization(_))));
    }
}
