//! [`Dispatcher`] – runs motion sequences against the arm and gripper
//! controllers.
//!
//! A dispatcher owns one [`TrajectoryPublisher`] per actuator and a fixed
//! [`ExecutionMode`]:
//!
//! * **Serial** – each command is translated and published on its own, then
//!   the dispatcher sleeps for that command's delay before the next one.
//! * **Batched** – the sequence is split per actuator (keeping relative
//!   order), every command is translated up front, each non-empty half is
//!   published as a single multi-point trajectory, and the dispatcher then
//!   sleeps once for the sum of all delays.
//!
//! Only one sequence runs at a time.  [`Dispatcher::begin`] takes the
//! running slot synchronously and fails with [`BridgeError::SequenceBusy`]
//! while it is held, which lets an HTTP handler answer before the sequence
//! has finished:
//!
//! ```rust,no_run
//! # async fn demo(dispatcher: rx200_runtime::Dispatcher) -> Result<(), rx200_types::BridgeError> {
//! use rx200_types::MotionCommand;
//!
//! let run = dispatcher.begin(vec![MotionCommand::arm([0.0; 5]).with_delay(1.0)])?;
//! let accepted = run.accepted();
//! tokio::spawn(run.execute());
//! println!("accepted {} steps", accepted.sequence_length);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rx200_middleware::{MAX_TRAJECTORY_POINTS, TrajectoryPublisher};
use rx200_types::{Actuator, BridgeError, MotionCommand, RosTime, TrajectoryMessage};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::translator::{DEFAULT_TIME_FROM_START_SECS, translate_batch, translate_command};

/// Delay applied after a step that does not carry its own.
pub const DEFAULT_STEP_DELAY_SECS: f64 = 2.0;

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// How a dispatcher turns a sequence into publishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Serial,
    #[default]
    Batched,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => f.write_str("serial"),
            Self::Batched => f.write_str("batched"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "batched" => Ok(Self::Batched),
            other => Err(BridgeError::Config(format!(
                "unknown execution mode {other:?} (expected \"serial\" or \"batched\")"
            ))),
        }
    }
}

/// Lifecycle of the most recent sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Returned as soon as a sequence has been admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceAccepted {
    pub sequence_length: usize,
    pub mode: ExecutionMode,
}

/// Returned once a sequence has run to the end.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport {
    pub mode: ExecutionMode,
    pub steps: usize,
    /// Number of trajectory messages handed to the publishers.
    pub messages_published: usize,
    /// Wall time from the first publish to the end of the last wait.
    pub elapsed: Duration,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Sequenced command dispatcher.  Cheap to clone; clones share the running
/// slot.
#[derive(Clone)]
pub struct Dispatcher {
    arm: Arc<dyn TrajectoryPublisher>,
    gripper: Arc<dyn TrajectoryPublisher>,
    mode: ExecutionMode,
    default_delay: f64,
    state: Arc<Mutex<DispatcherState>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("arm", &self.arm.topic())
            .field("gripper", &self.gripper.topic())
            .field("mode", &self.mode)
            .field("default_delay", &self.default_delay)
            .field("state", &self.state())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher publishing through `arm` and `gripper`.
    ///
    /// `default_delay` (seconds) applies to steps without their own `delay`.
    pub fn new(
        arm: Arc<dyn TrajectoryPublisher>,
        gripper: Arc<dyn TrajectoryPublisher>,
        mode: ExecutionMode,
        default_delay: f64,
    ) -> Self {
        Self {
            arm,
            gripper,
            mode,
            default_delay,
            state: Arc::new(Mutex::new(DispatcherState::Idle)),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn default_delay(&self) -> f64 {
        self.default_delay
    }

    /// State of the current or most recent sequence.
    pub fn state(&self) -> DispatcherState {
        *self.lock_state()
    }

    /// Check that `sequence` can run to the end in this dispatcher's mode.
    ///
    /// Besides [`MotionCommand::validate`] for every step, this checks that
    /// each delay is a usable wait and that every point time fits a ROS
    /// duration.  In batched mode that is each actuator's running sum of
    /// delays; each batch must also stay within [`MAX_TRAJECTORY_POINTS`] and
    /// the total wait must be usable.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidCommand`] naming the first offending step.
    pub fn check(&self, sequence: &[MotionCommand]) -> Result<(), BridgeError> {
        let mut elapsed = [0.0_f64; 2];
        let mut points = [0_usize; 2];
        let mut total = 0.0;
        for (index, command) in sequence.iter().enumerate() {
            command.validate().map_err(|e| step_error(index, e))?;
            let delay = self.delay_of(command);
            seconds(delay).map_err(|e| step_error(index, e))?;
            total += delay;

            let lane = match command.actuator {
                Actuator::Arm => 0,
                Actuator::Gripper => 1,
            };
            let due = match self.mode {
                ExecutionMode::Serial => command.time_from_start.unwrap_or(DEFAULT_TIME_FROM_START_SECS),
                ExecutionMode::Batched => {
                    elapsed[lane] += delay;
                    points[lane] += 1;
                    if points[lane] > MAX_TRAJECTORY_POINTS {
                        return Err(step_error(
                            index,
                            BridgeError::InvalidCommand(format!(
                                "{} batch exceeds the limit of {MAX_TRAJECTORY_POINTS} points",
                                command.actuator
                            )),
                        ));
                    }
                    command.time_from_start.unwrap_or(elapsed[lane])
                }
            };
            RosTime::from_secs_f64(due).map_err(|e| step_error(index, e))?;
        }
        if self.mode == ExecutionMode::Batched {
            seconds(total)?;
        }
        Ok(())
    }

    /// Check `sequence` and claim the running slot for it.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidCommand`] when [`check`][Self::check] fails, and
    /// [`BridgeError::SequenceBusy`] while another sequence is running.  In
    /// both cases nothing is published and the running sequence is left
    /// untouched.
    pub fn begin(&self, sequence: Vec<MotionCommand>) -> Result<SequenceRun, BridgeError> {
        self.check(&sequence)?;
        {
            let mut state = self.lock_state();
            if *state == DispatcherState::Running {
                return Err(BridgeError::SequenceBusy);
            }
            *state = DispatcherState::Running;
        }
        info!(steps = sequence.len(), mode = %self.mode, "sequence accepted");
        Ok(SequenceRun {
            guard: RunGuard {
                state: Arc::clone(&self.state),
            },
            dispatcher: self.clone(),
            sequence,
        })
    }

    /// [`begin`][Self::begin] followed by [`SequenceRun::execute`].
    pub async fn execute(&self, sequence: Vec<MotionCommand>) -> Result<SequenceReport, BridgeError> {
        self.begin(sequence)?.execute().await
    }

    /// Translate and publish a single command right away.
    ///
    /// Single commands bypass the running slot, so they can be sent while a
    /// sequence is in flight.
    #[instrument(skip(self, command), fields(actuator = %command.actuator))]
    pub async fn send_single(&self, command: &MotionCommand) -> Result<(), BridgeError> {
        let message = translate_command(command)?;
        self.publisher(command.actuator).publish(message).await
    }

    fn publisher(&self, actuator: Actuator) -> &dyn TrajectoryPublisher {
        match actuator {
            Actuator::Arm => self.arm.as_ref(),
            Actuator::Gripper => self.gripper.as_ref(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DispatcherState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn delay_of(&self, command: &MotionCommand) -> f64 {
        command.delay.unwrap_or(self.default_delay)
    }

    async fn run_serial(&self, sequence: &[MotionCommand]) -> Result<usize, BridgeError> {
        let mut published = 0;
        for (index, command) in sequence.iter().enumerate() {
            let message = translate_command(command)
                .map_err(|e| step_error(index, e))?;
            self.publisher(command.actuator)
                .publish(message)
                .await
                .map_err(|e| step_error(index, e))?;
            published += 1;
            let delay = self.delay_of(command);
            debug!(step = index, actuator = %command.actuator, delay, "step published");
            tokio::time::sleep(seconds(delay)?).await;
        }
        Ok(published)
    }

    async fn run_batched(&self, sequence: &[MotionCommand]) -> Result<usize, BridgeError> {
        let (arm, gripper): (Vec<MotionCommand>, Vec<MotionCommand>) = sequence
            .iter()
            .cloned()
            .partition(|c| c.actuator == Actuator::Arm);

        let mut batches: Vec<(Actuator, TrajectoryMessage)> = Vec::with_capacity(2);
        for (actuator, commands) in [(Actuator::Arm, arm), (Actuator::Gripper, gripper)] {
            if !commands.is_empty() {
                batches.push((actuator, translate_batch(actuator, &commands, self.default_delay)?));
            }
        }
        let total = seconds(sequence.iter().map(|c| self.delay_of(c)).sum())?;

        let mut published = 0;
        for (actuator, message) in batches {
            let points = message.points.len();
            self.publisher(actuator).publish(message).await?;
            published += 1;
            debug!(%actuator, points, "batch published");
        }
        tokio::time::sleep(total).await;
        Ok(published)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Running sequence
// ─────────────────────────────────────────────────────────────────────────────

/// A sequence that holds the dispatcher's running slot.
///
/// Dropping it without calling [`execute`][Self::execute] releases the slot
/// and marks the sequence failed.
#[derive(Debug)]
pub struct SequenceRun {
    dispatcher: Dispatcher,
    sequence: Vec<MotionCommand>,
    guard: RunGuard,
}

impl SequenceRun {
    pub fn accepted(&self) -> SequenceAccepted {
        SequenceAccepted {
            sequence_length: self.sequence.len(),
            mode: self.dispatcher.mode,
        }
    }

    /// Run the sequence to completion.
    #[instrument(skip(self), fields(steps = self.sequence.len(), mode = %self.dispatcher.mode))]
    pub async fn execute(self) -> Result<SequenceReport, BridgeError> {
        let started = Instant::now();
        let result = match self.dispatcher.mode {
            ExecutionMode::Serial => self.dispatcher.run_serial(&self.sequence).await,
            ExecutionMode::Batched => self.dispatcher.run_batched(&self.sequence).await,
        };

        match result {
            Ok(messages_published) => {
                self.guard.finish(DispatcherState::Completed);
                let report = SequenceReport {
                    mode: self.dispatcher.mode,
                    steps: self.sequence.len(),
                    messages_published,
                    elapsed: started.elapsed(),
                };
                info!(messages = report.messages_published, elapsed_ms = report.elapsed.as_millis() as u64, "sequence completed");
                Ok(report)
            }
            Err(e) => {
                self.guard.finish(DispatcherState::Failed);
                error!(error = %e, "sequence failed");
                Err(e)
            }
        }
    }
}

#[derive(Debug)]
struct RunGuard {
    state: Arc<Mutex<DispatcherState>>,
}

impl RunGuard {
    fn finish(&self, outcome: DispatcherState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = outcome;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state == DispatcherState::Running {
            *state = DispatcherState::Failed;
        }
    }
}

fn seconds(secs: f64) -> Result<Duration, BridgeError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| BridgeError::InvalidCommand(format!("delay {secs} s is not usable: {e}")))
}

fn step_error(index: usize, e: BridgeError) -> BridgeError {
    match e {
        BridgeError::InvalidCommand(msg) => BridgeError::InvalidCommand(format!("step {index}: {msg}")),
        other => other,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::error::Error;

    /// Publisher that records every message together with the (paused) clock
    /// reading at publish time.
    struct RecordingPublisher {
        topic: String,
        sent: Mutex<Vec<(Duration, TrajectoryMessage)>>,
        origin: Instant,
        fail: bool,
    }

    impl RecordingPublisher {
        fn new(topic: &str, origin: Instant) -> Arc<Self> {
            Arc::new(Self {
                topic: topic.to_string(),
                sent: Mutex::new(Vec::new()),
                origin,
                fail: false,
            })
        }

        fn failing(topic: &str, origin: Instant) -> Arc<Self> {
            Arc::new(Self {
                topic: topic.to_string(),
                sent: Mutex::new(Vec::new()),
                origin,
                fail: true,
            })
        }

        fn sent(&self) -> Vec<(Duration, TrajectoryMessage)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrajectoryPublisher for RecordingPublisher {
        fn topic(&self) -> &str {
            &self.topic
        }

        async fn publish(&self, message: TrajectoryMessage) -> Result<(), BridgeError> {
            if self.fail {
                return Err(BridgeError::Transport {
                    endpoint: self.topic.clone(),
                    details: "link down".to_string(),
                });
            }
            self.sent.lock().unwrap().push((self.origin.elapsed(), message));
            Ok(())
        }
    }

    fn setup(mode: ExecutionMode) -> (Dispatcher, Arc<RecordingPublisher>, Arc<RecordingPublisher>) {
        let origin = Instant::now();
        let arm = RecordingPublisher::new("/arm", origin);
        let gripper = RecordingPublisher::new("/gripper", origin);
        let dispatcher = Dispatcher::new(
            Arc::clone(&arm) as Arc<dyn TrajectoryPublisher>,
            Arc::clone(&gripper) as Arc<dyn TrajectoryPublisher>,
            mode,
            DEFAULT_STEP_DELAY_SECS,
        );
        (dispatcher, arm, gripper)
    }

    #[tokio::test(start_paused = true)]
    async fn serial_publishes_in_order_and_waits_sum_of_delays() -> Result<(), Box<dyn Error>> {
        let (dispatcher, arm, _) = setup(ExecutionMode::Serial);
        let sequence = vec![
            MotionCommand::arm([0.0; 5]).with_delay(1.0),
            MotionCommand::arm([1.0, 0.0, 0.0, 0.0, 0.0]).with_delay(0.5),
            MotionCommand::arm([2.0, 0.0, 0.0, 0.0, 0.0]).with_delay(2.5),
        ];

        let report = dispatcher.execute(sequence).await?;

        let sent = arm.sent();
        assert_eq!(sent.len(), 3, "one publish per command");
        let at: Vec<Duration> = sent.iter().map(|(t, _)| *t).collect();
        assert_eq!(at, [Duration::ZERO, Duration::from_secs(1), Duration::from_millis(1500)]);
        let waists: Vec<f64> = sent.iter().map(|(_, m)| m.points[0].positions[0]).collect();
        assert_eq!(waists, [0.0, 1.0, 2.0]);
        assert_eq!(report.messages_published, 3);
        assert_eq!(report.elapsed, Duration::from_secs(4));
        assert_eq!(dispatcher.state(), DispatcherState::Completed);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn serial_two_step_arm_then_gripper() -> Result<(), Box<dyn Error>> {
        let (dispatcher, arm, gripper) = setup(ExecutionMode::Serial);
        let sequence = vec![
            MotionCommand::arm([0.0; 5]).with_delay(1.0),
            MotionCommand {
                actuator: Actuator::Gripper,
                positions: vec![0.03, -0.03],
                time_from_start: None,
                delay: Some(1.0),
            },
        ];

        dispatcher.execute(sequence).await?;

        let arm_sent = arm.sent();
        let gripper_sent = gripper.sent();
        assert_eq!(arm_sent.len(), 1);
        assert_eq!(gripper_sent.len(), 1);
        assert_eq!(arm_sent[0].0, Duration::ZERO);
        assert_eq!(gripper_sent[0].0, Duration::from_secs(1), "gripper publish ~1 s after arm");
        assert_eq!(gripper_sent[0].1.points[0].positions, vec![0.03, -0.03]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn serial_uses_default_delay() -> Result<(), Box<dyn Error>> {
        let (dispatcher, _, gripper) = setup(ExecutionMode::Serial);
        let report = dispatcher
            .execute(vec![MotionCommand::gripper(0.0), MotionCommand::gripper(0.01)])
            .await?;
        assert_eq!(gripper.sent()[1].0, Duration::from_secs(2));
        assert_eq!(report.elapsed, Duration::from_secs(4));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_step_is_refused_before_anything_runs() {
        let (dispatcher, arm, _) = setup(ExecutionMode::Serial);
        let bad = MotionCommand {
            actuator: Actuator::Arm,
            positions: vec![0.0; 4],
            time_from_start: None,
            delay: None,
        };
        let sequence = vec![MotionCommand::arm([0.0; 5]).with_delay(0.1), bad, MotionCommand::arm([0.0; 5])];

        let result = dispatcher.execute(sequence).await;

        assert!(
            matches!(&result, Err(BridgeError::InvalidCommand(msg)) if msg.starts_with("step 1")),
            "expected step 1 to fail validation, got: {result:?}"
        );
        assert!(arm.sent().is_empty(), "no step of a refused sequence may be published");
        assert_eq!(dispatcher.state(), DispatcherState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_aborts_without_retry() {
        let origin = Instant::now();
        let arm = RecordingPublisher::failing("/arm", origin);
        let gripper = RecordingPublisher::new("/gripper", origin);
        let dispatcher = Dispatcher::new(
            arm,
            Arc::clone(&gripper) as Arc<dyn TrajectoryPublisher>,
            ExecutionMode::Serial,
            1.0,
        );

        let result = dispatcher
            .execute(vec![MotionCommand::arm([0.0; 5]), MotionCommand::gripper(0.02)])
            .await;

        assert!(matches!(result, Err(BridgeError::Transport { .. })));
        assert!(gripper.sent().is_empty());
        assert_eq!(dispatcher.state(), DispatcherState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn batched_publishes_one_message_per_actuator() -> Result<(), Box<dyn Error>> {
        let (dispatcher, arm, gripper) = setup(ExecutionMode::Batched);
        let sequence = vec![
            MotionCommand::arm([0.0; 5]).with_delay(1.0),
            MotionCommand::gripper(0.03).with_delay(1.0),
            MotionCommand::arm([1.0, 0.0, 0.0, 0.0, 0.0]).with_delay(1.0),
            MotionCommand::gripper(0.0).with_delay(1.0),
            MotionCommand::arm([1.0, 0.5, 0.0, 0.0, 0.0]).with_delay(1.0),
        ];

        let report = dispatcher.execute(sequence).await?;

        let arm_sent = arm.sent();
        let gripper_sent = gripper.sent();
        assert_eq!(arm_sent.len(), 1, "exactly one arm message");
        assert_eq!(gripper_sent.len(), 1, "exactly one gripper message");

        let arm_msg = &arm_sent[0].1;
        let waists: Vec<f64> = arm_msg.points.iter().map(|p| p.positions[0]).collect();
        assert_eq!(waists, [0.0, 1.0, 1.0]);
        let times: Vec<RosTime> = arm_msg.points.iter().map(|p| p.time_from_start).collect();
        assert_eq!(
            times,
            [
                RosTime { sec: 1, nanosec: 0 },
                RosTime { sec: 2, nanosec: 0 },
                RosTime { sec: 3, nanosec: 0 },
            ]
        );
        let openings: Vec<f64> = gripper_sent[0].1.points.iter().map(|p| p.positions[0]).collect();
        assert_eq!(openings, [0.03, 0.0]);

        assert_eq!(report.messages_published, 2);
        assert_eq!(report.elapsed, Duration::from_secs(5), "waits for the sum of all delays");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn batched_time_override_applies_to_one_point() -> Result<(), Box<dyn Error>> {
        let (dispatcher, arm, _) = setup(ExecutionMode::Batched);
        let sequence = vec![
            MotionCommand::arm([0.0; 5]),
            MotionCommand::arm([0.0; 5]).with_time_from_start(1.5),
            MotionCommand::arm([0.0; 5]),
        ];

        dispatcher.execute(sequence).await?;

        let times: Vec<f64> = arm.sent()[0].1.points.iter().map(|p| p.time_from_start.as_secs_f64()).collect();
        assert_eq!(times, [2.0, 1.5, 6.0]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn batched_validation_failure_publishes_nothing() {
        let (dispatcher, arm, gripper) = setup(ExecutionMode::Batched);
        let bad = MotionCommand {
            actuator: Actuator::Gripper,
            positions: vec![0.01, -0.01, 0.0],
            time_from_start: None,
            delay: None,
        };
        let result = dispatcher.execute(vec![MotionCommand::arm([0.0; 5]), bad]).await;

        assert!(matches!(result, Err(BridgeError::InvalidCommand(_))));
        assert!(arm.sent().is_empty(), "arm batch must not go out when the gripper batch is invalid");
        assert!(gripper.sent().is_empty());
        assert_eq!(dispatcher.state(), DispatcherState::Idle);
    }

    #[test]
    fn check_caps_points_per_batch() {
        let (batched, _, _) = setup(ExecutionMode::Batched);
        let mut sequence = vec![MotionCommand::arm([0.0; 5]).with_delay(0.0); MAX_TRAJECTORY_POINTS];
        sequence.push(MotionCommand::gripper(0.0).with_delay(0.0));
        assert!(batched.check(&sequence).is_ok(), "the cap is per actuator");

        sequence.push(MotionCommand::arm([0.0; 5]).with_delay(0.0));
        let err = batched.check(&sequence).unwrap_err();
        assert!(
            matches!(&err, BridgeError::InvalidCommand(msg) if msg.starts_with(&format!("step {}", MAX_TRAJECTORY_POINTS + 1))),
            "got: {err:?}"
        );

        let (serial, _, _) = setup(ExecutionMode::Serial);
        assert!(serial.check(&sequence).is_ok(), "serial mode sends one point per message");
    }

    #[test]
    fn check_rejects_delays_that_cannot_be_waited() {
        for mode in [ExecutionMode::Serial, ExecutionMode::Batched] {
            let (dispatcher, _, _) = setup(mode);
            let sequence = vec![MotionCommand::arm([0.0; 5]).with_delay(1e20), MotionCommand::arm([0.0; 5])];
            let err = dispatcher.check(&sequence).unwrap_err();
            assert!(
                matches!(&err, BridgeError::InvalidCommand(msg) if msg.starts_with("step 0")),
                "{mode}: got {err:?}"
            );
        }
    }

    #[test]
    fn check_rejects_running_time_beyond_ros_duration() {
        let (batched, _, _) = setup(ExecutionMode::Batched);
        let big = f64::from(i32::MAX) / 2.0 + 1.0;
        let sequence = vec![
            MotionCommand::gripper(0.0).with_delay(big),
            MotionCommand::arm([0.0; 5]).with_delay(big),
            MotionCommand::gripper(0.0).with_delay(big),
        ];
        let err = batched.check(&sequence).unwrap_err();
        assert!(
            matches!(&err, BridgeError::InvalidCommand(msg) if msg.starts_with("step 2")),
            "the gripper's own running sum overflows at its second point, got {err:?}"
        );

        let (serial, _, _) = setup(ExecutionMode::Serial);
        assert!(serial.check(&sequence).is_ok());
        let late = [MotionCommand::arm([0.0; 5]).with_time_from_start(3e9)];
        assert!(serial.check(&late).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn refused_sequence_leaves_serial_run_unpublished() {
        let (dispatcher, arm, _) = setup(ExecutionMode::Serial);
        let sequence = vec![MotionCommand::arm([0.0; 5]).with_delay(1e20), MotionCommand::arm([0.0; 5])];

        assert!(matches!(dispatcher.begin(sequence), Err(BridgeError::InvalidCommand(_))));
        assert!(arm.sent().is_empty());
        assert_eq!(dispatcher.state(), DispatcherState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_sequence_is_rejected_while_running() -> Result<(), Box<dyn Error>> {
        let (dispatcher, arm, _) = setup(ExecutionMode::Serial);
        let first = dispatcher.begin(vec![
            MotionCommand::arm([0.0; 5]).with_delay(1.0),
            MotionCommand::arm([1.0, 0.0, 0.0, 0.0, 0.0]).with_delay(1.0),
        ])?;
        let handle = tokio::spawn(first.execute());
        tokio::task::yield_now().await;
        assert_eq!(dispatcher.state(), DispatcherState::Running);

        let second = dispatcher.begin(vec![MotionCommand::arm([9.0; 5])]);
        assert!(matches!(second, Err(BridgeError::SequenceBusy)));

        let report = handle.await??;
        assert_eq!(report.messages_published, 2, "running sequence finishes untouched");
        assert!(arm.sent().iter().all(|(_, m)| m.points[0].positions[0] != 9.0));
        assert_eq!(dispatcher.state(), DispatcherState::Completed);

        dispatcher.execute(vec![MotionCommand::arm([0.0; 5]).with_delay(0.0)]).await?;
        Ok(())
    }

    #[tokio::test]
    async fn dropped_run_releases_slot() {
        let (dispatcher, _, _) = setup(ExecutionMode::Batched);
        let run = dispatcher.begin(vec![MotionCommand::arm([0.0; 5])]).unwrap();
        assert_eq!(run.accepted(), SequenceAccepted { sequence_length: 1, mode: ExecutionMode::Batched });
        drop(run);
        assert_eq!(dispatcher.state(), DispatcherState::Failed);
        assert!(dispatcher.begin(Vec::new()).is_ok());
    }

    #[tokio::test]
    async fn send_single_routes_by_actuator() -> Result<(), Box<dyn Error>> {
        let (dispatcher, arm, gripper) = setup(ExecutionMode::Batched);
        dispatcher.send_single(&MotionCommand::gripper(0.02)).await?;
        assert!(arm.sent().is_empty());
        assert_eq!(gripper.sent()[0].1.points[0].positions, vec![0.02, -0.02]);
        assert_eq!(dispatcher.state(), DispatcherState::Idle, "single commands leave the slot alone");
        Ok(())
    }

    #[test]
    fn execution_mode_parses_case_insensitively() {
        assert_eq!("Serial".parse::<ExecutionMode>().unwrap(), ExecutionMode::Serial);
        assert_eq!(" batched ".parse::<ExecutionMode>().unwrap(), ExecutionMode::Batched);
        assert!(matches!("parallel".parse::<ExecutionMode>(), Err(BridgeError::Config(_))));
        assert_eq!(ExecutionMode::default(), ExecutionMode::Batched);
    }
}
