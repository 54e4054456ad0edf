//! `rx200-types` – shared vocabulary of the RX200 bridge
//!
//! Defines the operator-facing [`MotionCommand`], the ROS 2 wire messages
//! (`trajectory_msgs/JointTrajectory`, `sensor_msgs/JointState`) and the
//! [`BridgeError`] every crate returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Joint names of the RX200 arm controller, in wire order.
pub const ARM_JOINT_NAMES: [&str; 5] = ["waist", "shoulder", "elbow", "wrist_angle", "wrist_rotate"];

/// Joint names of the RX200 gripper controller, in wire order.
pub const GRIPPER_JOINT_NAMES: [&str; 2] = ["left_finger", "right_finger"];

/// Fully open finger position in metres. `0.0` is fully closed.
pub const GRIPPER_MAX_OPENING: f64 = 0.03;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// The two independently commanded parts of the arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actuator {
    /// Five revolute joints from waist to wrist rotation.
    Arm,
    /// Two prismatic fingers driven with mirrored targets.
    Gripper,
}

impl Actuator {
    /// Number of positions a command for this actuator must carry.
    pub fn joint_count(self) -> usize {
        self.joint_names().len()
    }

    /// Joint names in the order the controller expects them.
    pub fn joint_names(self) -> &'static [&'static str] {
        match self {
            Actuator::Arm => &ARM_JOINT_NAMES,
            Actuator::Gripper => &GRIPPER_JOINT_NAMES,
        }
    }
}

impl std::fmt::Display for Actuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actuator::Arm => write!(f, "arm"),
            Actuator::Gripper => write!(f, "gripper"),
        }
    }
}

/// One motion request: target joint positions plus optional timing.
///
/// On the JSON wire the actuator travels as `"type"` and timing fields are
/// camelCase (`timeFromStart`); the snake_case `time_from_start` spelling is
/// accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionCommand {
    #[serde(rename = "type")]
    pub actuator: Actuator,
    pub positions: Vec<f64>,
    /// Seconds from trajectory start at which the target should be reached.
    #[serde(default, alias = "time_from_start", skip_serializing_if = "Option::is_none")]
    pub time_from_start: Option<f64>,
    /// Seconds to wait after this step before the next one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
}

impl MotionCommand {
    /// Arm command from five joint angles in radians.
    pub fn arm(positions: [f64; 5]) -> Self {
        Self {
            actuator: Actuator::Arm,
            positions: positions.to_vec(),
            time_from_start: None,
            delay: None,
        }
    }

    /// Gripper command from a single finger opening; the second finger
    /// mirrors the first.
    pub fn gripper(opening: f64) -> Self {
        Self {
            actuator: Actuator::Gripper,
            positions: vec![opening, -opening],
            time_from_start: None,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay_secs: f64) -> Self {
        self.delay = Some(delay_secs);
        self
    }

    pub fn with_time_from_start(mut self, secs: f64) -> Self {
        self.time_from_start = Some(secs);
        self
    }

    /// Check the command against its actuator's joint count and make sure
    /// every number it carries is usable.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidCommand`] on a position-count mismatch,
    /// a non-finite position, or a negative / non-finite timing field.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let expected = self.actuator.joint_count();
        if self.positions.len() != expected {
            return Err(BridgeError::InvalidCommand(format!(
                "{} command needs {} positions, got {}",
                self.actuator,
                expected,
                self.positions.len()
            )));
        }
        if let Some(index) = self.positions.iter().position(|p| !p.is_finite()) {
            return Err(BridgeError::InvalidCommand(format!(
                "{} position {index} is not a finite number",
                self.actuator
            )));
        }
        check_seconds("timeFromStart", self.time_from_start)?;
        check_seconds("delay", self.delay)?;
        Ok(())
    }
}

fn check_seconds(field: &str, value: Option<f64>) -> Result<(), BridgeError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(BridgeError::InvalidCommand(format!(
            "{field} must be a non-negative number of seconds, got {v}"
        ))),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Wire messages (ROS 2 message layout)
// ---------------------------------------------------------------------------

/// `builtin_interfaces/Time` and `builtin_interfaces/Duration`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosTime {
    pub sec: i32,
    pub nanosec: u32,
}

impl RosTime {
    /// Split a duration in seconds into whole seconds and a nanosecond
    /// remainder.
    ///
    /// The remainder is rounded to the nearest nanosecond before truncation so
    /// that millisecond inputs survive binary floating point:
    /// `(1.001 - 1.0) * 1e9` evaluates to `999_999.9999`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidCommand`] for negative, non-finite, or
    /// out-of-range (`> i32::MAX` seconds) inputs.
    pub fn from_secs_f64(secs: f64) -> Result<Self, BridgeError> {
        if !secs.is_finite() || secs < 0.0 || secs > f64::from(i32::MAX) {
            return Err(BridgeError::InvalidCommand(format!(
                "duration {secs} s cannot be expressed as a ROS duration"
            )));
        }
        let whole = secs.floor();
        let mut sec = whole as i32;
        let mut nanosec = ((secs - whole) * NANOS_PER_SEC).round() as u32;
        if nanosec >= 1_000_000_000 {
            sec = sec.checked_add(1).ok_or_else(|| {
                BridgeError::InvalidCommand(format!("duration {secs} s overflows"))
            })?;
            nanosec -= 1_000_000_000;
        }
        Ok(Self { sec, nanosec })
    }

    pub fn as_secs_f64(&self) -> f64 {
        f64::from(self.sec) + f64::from(self.nanosec) / NANOS_PER_SEC
    }
}

/// `std_msgs/Header`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: RosTime,
    pub frame_id: String,
}

/// `trajectory_msgs/JointTrajectoryPoint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub positions: Vec<f64>,
    #[serde(default)]
    pub velocities: Vec<f64>,
    #[serde(default)]
    pub accelerations: Vec<f64>,
    #[serde(default)]
    pub effort: Vec<f64>,
    pub time_from_start: RosTime,
}

/// `trajectory_msgs/JointTrajectory`: the payload handed to the middleware.
///
/// A zero header stamp tells the controller to start executing on receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMessage {
    pub header: Header,
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
}

/// `sensor_msgs/JointState` as received from the robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointStateMessage {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub position: Vec<f64>,
    #[serde(default)]
    pub velocity: Vec<f64>,
    #[serde(default)]
    pub effort: Vec<f64>,
}

/// A trajectory on its way to a middleware topic, as routed over the
/// internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "rx200-middleware::ros2/arm"
    pub source: String,
    /// Middleware topic name, e.g. `/rx200/arm_controller/joint_trajectory`.
    pub topic: String,
    pub message: TrajectoryMessage,
}

/// Error type shared by every RX200 bridge crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    /// Malformed or out-of-range input. Surfaces as HTTP 400.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The transport refused the message or the link to it failed.
    #[error("Transport error on {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("A motion sequence is already running")]
    SequenceBusy,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
