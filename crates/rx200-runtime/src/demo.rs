//! The canned demonstration sequence served by `GET /demo`.

use rx200_types::{GRIPPER_MAX_OPENING, MotionCommand};

/// Pause after every demo step, in seconds.
pub const DEMO_STEP_DELAY_SECS: f64 = 2.0;

/// Home pose, open the gripper, swing the waist, tilt shoulder and elbow,
/// roll the wrist, close the gripper, and return home.
pub fn demo_sequence() -> Vec<MotionCommand> {
    [
        MotionCommand::arm([0.0, 0.0, 0.0, 0.0, 0.0]),
        MotionCommand::gripper(GRIPPER_MAX_OPENING),
        MotionCommand::arm([1.0, 0.0, 0.0, 0.0, 0.0]),
        MotionCommand::arm([1.0, 0.5, 0.5, 0.0, 0.0]),
        MotionCommand::arm([1.0, 0.5, 0.5, 0.0, 1.0]),
        MotionCommand::gripper(0.0),
        MotionCommand::arm([0.0, 0.0, 0.0, 0.0, 0.0]),
    ]
    .into_iter()
    .map(|step| step.with_delay(DEMO_STEP_DELAY_SECS))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx200_types::Actuator;

    #[test]
    fn demo_is_valid_and_returns_home() {
        let demo = demo_sequence();
        assert_eq!(demo.len(), 7);
        assert!(demo.iter().all(|c| c.validate().is_ok()));
        assert!(demo.iter().all(|c| c.delay == Some(DEMO_STEP_DELAY_SECS)));
        assert_eq!(demo.first(), demo.last(), "demo starts and ends at the home pose");
        let gripper_steps = demo.iter().filter(|c| c.actuator == Actuator::Gripper).count();
        assert_eq!(gripper_steps, 2);
    }
}
