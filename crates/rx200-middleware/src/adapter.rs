//! The output-channel seam.
//!
//! The dispatcher never speaks to ROS 2 directly.  It hands finished
//! [`TrajectoryMessage`]s to a [`TrajectoryPublisher`], one per actuator, and
//! the publisher decides how they reach the outside world.
//!
//! - [`Ros2Publisher`][crate::ros2_adapter::Ros2Publisher] – routes the
//!   message over the internal [`EventBus`][crate::bus::EventBus] to the
//!   [`RosbridgeLink`][crate::ros2_bridge::RosbridgeLink].

use async_trait::async_trait;
use rx200_types::{BridgeError, TrajectoryMessage};

/// A write-only output channel for one actuator.
///
/// # Contract
///
/// * `publish` is fire-and-forget: it returns once the message has been handed
///   to the transport and never waits for the controller to acknowledge or
///   execute it.
/// * An `Err` means the message was not handed over.  Callers do not retry.
#[async_trait]
pub trait TrajectoryPublisher: Send + Sync {
    /// Middleware topic this publisher writes to.
    fn topic(&self) -> &str;

    /// Hand `message` to the transport.
    async fn publish(&self, message: TrajectoryMessage) -> Result<(), BridgeError>;
}
