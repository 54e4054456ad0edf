//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into one [`Topic`] lane per actuator so the arm and
//! gripper output channels never share a queue:
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::ArmTrajectory`] | Joint trajectories for the five arm joints |
//! | [`Topic::GripperTrajectory`] | Mirrored finger trajectories |

use rx200_types::{Actuator, TrajectoryEvent};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Trajectories bound for the arm controller.
    ArmTrajectory,
    /// Trajectories bound for the gripper controller.
    GripperTrajectory,
}

impl Topic {
    /// The output lane that carries commands for `actuator`.
    pub fn for_actuator(actuator: Actuator) -> Self {
        match actuator {
            Actuator::Arm => Topic::ArmTrajectory,
            Actuator::Gripper => Topic::GripperTrajectory,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    arm_trajectory: broadcast::Sender<TrajectoryEvent>,
    gripper_trajectory: broadcast::Sender<TrajectoryEvent>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (arm_trajectory, _) = broadcast::channel(capacity);
        let (gripper_trajectory, _) = broadcast::channel(capacity);
        Self {
            arm_trajectory,
            gripper_trajectory,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `0` when nobody is listening on the topic; the event is
    /// dropped, as on a middleware topic with no subscribers.
    pub fn publish_to(&self, topic: Topic, event: TrajectoryEvent) -> usize {
        self.topic_sender(topic).send(event).unwrap_or(0)
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of receivers currently attached to `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<TrajectoryEvent> {
        match topic {
            Topic::ArmTrajectory => &self.arm_trajectory,
            Topic::GripperTrajectory => &self.gripper_trajectory,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<TrajectoryEvent>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<TrajectoryEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<TrajectoryEvent, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rx200_types::{Header, TrajectoryMessage};
    use uuid::Uuid;

    fn make_event(topic: &str) -> TrajectoryEvent {
        TrajectoryEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: "rx200-middleware::test".to_string(),
            topic: topic.to_string(),
            message: TrajectoryMessage {
                header: Header::default(),
                joint_names: vec![],
                points: vec![],
            },
        }
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.publish_to(Topic::ArmTrajectory, make_event("/arm")), 0);
    }

    #[test]
    fn topic_for_actuator() {
        assert_eq!(Topic::for_actuator(Actuator::Arm), Topic::ArmTrajectory);
        assert_eq!(Topic::for_actuator(Actuator::Gripper), Topic::GripperTrajectory);
    }

    /// Two independent subscribers on the same topic both receive the event.
    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::ArmTrajectory);
        let mut subscriber2 = bus.subscribe_to(Topic::ArmTrajectory);

        let event = make_event("/rx200/arm_controller/joint_trajectory");
        assert_eq!(bus.publish_to(Topic::ArmTrajectory, event.clone()), 2);

        let recv1 = subscriber1.recv().await?;
        let recv2 = subscriber2.recv().await?;

        assert_eq!(recv1.id, event.id, "subscriber 1 got wrong event");
        assert_eq!(recv2.id, event.id, "subscriber 2 got wrong event");
        Ok(())
    }

    /// A gripper subscriber must not receive arm trajectories because they
    /// are routed through separate channels.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() {
        let bus = EventBus::default();
        let mut gripper_sub = bus.subscribe_to(Topic::GripperTrajectory);
        let _arm_sub = bus.subscribe_to(Topic::ArmTrajectory);

        bus.publish_to(Topic::ArmTrajectory, make_event("/arm"));

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            gripper_sub.recv(),
        )
        .await;

        assert!(
            result.is_err(),
            "gripper subscriber must not receive an arm trajectory"
        );
        assert_eq!(gripper_sub.topic(), Topic::GripperTrajectory);
    }

    /// Flooding a low-capacity channel while a subscriber sleeps must produce
    /// a `Lagged` error rather than panicking or blocking.
    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        const CAPACITY: usize = 16;
        let bus = EventBus::new(CAPACITY);
        let mut slow_sub = bus.subscribe_to(Topic::ArmTrajectory);

        for _ in 0..1_000 {
            bus.publish_to(Topic::ArmTrajectory, make_event("/arm"));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }
}
