//! Motion request → `JointTrajectory` conversion.
//!
//! Every function here is pure: the same input always yields the same
//! [`TrajectoryMessage`], and nothing is published.

use rx200_types::{
    Actuator, BridgeError, Header, MotionCommand, RosTime, TrajectoryMessage, TrajectoryPoint,
};

/// `time_from_start` used for a single command that does not carry one.
pub const DEFAULT_TIME_FROM_START_SECS: f64 = 1.0;

/// Build a one-point trajectory for `actuator`.
///
/// For the gripper only the first position is honoured; the second finger
/// is always set to its negation.
///
/// # Errors
///
/// [`BridgeError::InvalidCommand`] when the position count does not match the
/// actuator, a position is not finite, or `time_from_start` cannot be
/// expressed as a ROS duration.
pub fn translate(
    actuator: Actuator,
    positions: &[f64],
    time_from_start: Option<f64>,
) -> Result<TrajectoryMessage, BridgeError> {
    translate_command(&MotionCommand {
        actuator,
        positions: positions.to_vec(),
        time_from_start,
        delay: None,
    })
}

/// [`translate`] for a whole [`MotionCommand`].
pub fn translate_command(command: &MotionCommand) -> Result<TrajectoryMessage, BridgeError> {
    command.validate()?;
    let time = RosTime::from_secs_f64(command.time_from_start.unwrap_or(DEFAULT_TIME_FROM_START_SECS))?;
    Ok(message(command.actuator, vec![point(mirrored(command), time)]))
}

/// Build one multi-point trajectory from `commands`, which must all target
/// `actuator`.
///
/// Point `i` is due at the running sum of the delays of commands `0..=i`
/// (`default_delay` where a command has none).  A command's own
/// `time_from_start` replaces its point time without resetting the running
/// sum.
///
/// # Errors
///
/// [`BridgeError::InvalidCommand`] for an empty batch, a command aimed at the
/// other actuator, or any command that fails validation.
pub fn translate_batch(
    actuator: Actuator,
    commands: &[MotionCommand],
    default_delay: f64,
) -> Result<TrajectoryMessage, BridgeError> {
    if commands.is_empty() {
        return Err(BridgeError::InvalidCommand(format!(
            "{actuator} batch contains no commands"
        )));
    }

    let mut elapsed = 0.0;
    let mut points = Vec::with_capacity(commands.len());
    for (index, command) in commands.iter().enumerate() {
        if command.actuator != actuator {
            return Err(BridgeError::InvalidCommand(format!(
                "step {index} targets the {} but the batch is for the {actuator}",
                command.actuator
            )));
        }
        command.validate()?;
        elapsed += command.delay.unwrap_or(default_delay);
        let due = command.time_from_start.unwrap_or(elapsed);
        points.push(point(mirrored(command), RosTime::from_secs_f64(due)?));
    }
    Ok(message(actuator, points))
}

/// Positions as sent to the controller.  `command` must already be valid.
fn mirrored(command: &MotionCommand) -> Vec<f64> {
    match command.actuator {
        Actuator::Arm => command.positions.clone(),
        Actuator::Gripper => vec![command.positions[0], -command.positions[0]],
    }
}

fn point(positions: Vec<f64>, time_from_start: RosTime) -> TrajectoryPoint {
    TrajectoryPoint {
        positions,
        velocities: Vec::new(),
        accelerations: Vec::new(),
        effort: Vec::new(),
        time_from_start,
    }
}

fn message(actuator: Actuator, points: Vec<TrajectoryPoint>) -> TrajectoryMessage {
    TrajectoryMessage {
        // A zero stamp tells the controller to start immediately.
        header: Header::default(),
        joint_names: actuator.joint_names().iter().map(|n| n.to_string()).collect(),
        points,
    }
}
