//! `rx200-middleware` – transport plumbing for the RX200 bridge
//!
//! Moves finished trajectories from the dispatcher out to ROS 2 and brings
//! joint states back, without caring what the motions mean.
//!
//! # Modules
//!
//! - [`adapter`] – The [`TrajectoryPublisher`] seam the dispatcher publishes
//!   through.
//! - [`bus`] – Two-lane publish/subscribe bus built on Tokio broadcast
//!   channels.
//! - [`joint_state`] – Latest joint positions reported by the robot.
//! - [`ros2_adapter`] – [`Ros2Publisher`], the bus-backed publisher for each
//!   controller topic.
//! - [`ros2_bridge`] – [`RosbridgeLink`], the WebSocket client that speaks the
//!   rosbridge protocol.

pub mod adapter;
pub mod bus;
pub mod joint_state;
pub mod ros2_adapter;
pub mod ros2_bridge;

pub use adapter::TrajectoryPublisher;
pub use bus::{EventBus, Topic, TopicReceiver};
pub use joint_state::{JointPositions, JointStateSnapshot};
pub use ros2_adapter::{DEFAULT_ARM_TOPIC, DEFAULT_GRIPPER_TOPIC, MAX_TRAJECTORY_POINTS, Ros2Publisher};
pub use ros2_bridge::{DEFAULT_JOINT_STATES_TOPIC, DEFAULT_ROSBRIDGE_URL, LinkTopics, RosbridgeLink};
