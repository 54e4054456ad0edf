//! Request handlers and wire DTOs for the control API.
//!
//! Every handler validates its input here, at the boundary, so the
//! dispatcher only ever sees well-formed [`MotionCommand`]s.  Sequences are
//! acknowledged as soon as they are admitted and then run in the background;
//! their outcome only reaches the server log.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Html,
};
use rx200_middleware::JointPositions;
use rx200_runtime::{DispatcherState, ExecutionMode, demo_sequence};
use rx200_types::{Actuator, GRIPPER_MAX_OPENING, MotionCommand};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::server::{AppState, COCKPIT_HTML};

const ARM_FORMAT_HINT: &str = "Invalid data format. Positions must be an array of 5 values [waist, shoulder, elbow, wrist_angle, wrist_rotate]";
const GRIPPER_FORMAT_HINT: &str = "Invalid data format. Position must be a number from 0.0 (closed) to 0.03 (open)";
const COMMAND_FORMAT_HINT: &str = "Invalid data format. Expected {type: \"arm\"|\"gripper\", positions: number[] | position: number, timeFromStart?: number}";
const SEQUENCE_FORMAT_HINT: &str = "Invalid data format. Sequence must be an array of commands";

// ─────────────────────────────────────────────────────────────────────────────
// DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Uniform success envelope.
#[derive(Debug, Serialize)]
pub struct Ack<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> Ack<T> {
    fn new(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ArmRequest {
    pub positions: Option<Vec<f64>>,
    #[serde(default, alias = "timeFromStart")]
    pub time_from_start: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ArmEcho {
    pub positions: Vec<f64>,
    pub time_from_start: f64,
}

#[derive(Debug, Deserialize)]
pub struct GripperRequest {
    pub position: Option<f64>,
    #[serde(default, alias = "timeFromStart")]
    pub time_from_start: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct GripperEcho {
    pub position: f64,
    pub time_from_start: f64,
}

/// Body of `POST /command` and one step of a `POST /sequence` body.
/// Gripper commands may give a single `position` instead of the two-finger
/// `positions` array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(rename = "type")]
    pub actuator: Actuator,
    pub positions: Option<Vec<f64>>,
    pub position: Option<f64>,
    #[serde(default, alias = "time_from_start")]
    pub time_from_start: Option<f64>,
    pub delay: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SequenceRequest {
    pub sequence: Option<Vec<CommandRequest>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceLength {
    pub sequence_length: usize,
}

#[derive(Debug, Serialize)]
pub struct SequenceStatus {
    pub state: DispatcherState,
    pub mode: ExecutionMode,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn index() -> Html<&'static str> {
    Html(COCKPIT_HTML)
}

pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online",
        message: "RX200 control server is running and ready",
    })
}

pub async fn arm(
    State(state): State<AppState>,
    body: Result<Json<ArmRequest>, JsonRejection>,
) -> ApiResult<Ack<ArmEcho>> {
    let request = parse(body, ARM_FORMAT_HINT)?;
    let positions = request
        .positions
        .filter(|p| p.len() == Actuator::Arm.joint_count())
        .ok_or_else(|| ApiError::BadRequest(ARM_FORMAT_HINT.to_string()))?;
    let time_from_start = request.time_from_start.unwrap_or(1.0);

    let command = MotionCommand {
        actuator: Actuator::Arm,
        positions: positions.clone(),
        time_from_start: Some(time_from_start),
        delay: None,
    };
    state.dispatcher.send_single(&command).await?;

    Ok(Ack::new(
        "Command sent to robot arm",
        ArmEcho {
            positions,
            time_from_start,
        },
    ))
}

pub async fn gripper(
    State(state): State<AppState>,
    body: Result<Json<GripperRequest>, JsonRejection>,
) -> ApiResult<Ack<GripperEcho>> {
    let request = parse(body, GRIPPER_FORMAT_HINT)?;
    let position = request
        .position
        .filter(|p| in_gripper_range(*p))
        .ok_or_else(|| ApiError::BadRequest(GRIPPER_FORMAT_HINT.to_string()))?;
    let time_from_start = request.time_from_start.unwrap_or(1.0);

    let command = MotionCommand::gripper(position).with_time_from_start(time_from_start);
    state.dispatcher.send_single(&command).await?;

    Ok(Ack::new(
        "Command sent to robot gripper",
        GripperEcho {
            position,
            time_from_start,
        },
    ))
}

pub async fn command(
    State(state): State<AppState>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResult<Ack<MotionCommand>> {
    let command = parse(body, COMMAND_FORMAT_HINT)?.into_command()?;
    state.dispatcher.send_single(&command).await?;
    Ok(Ack::new(format!("Command sent to robot {}", command.actuator), command))
}

pub async fn start_sequence(
    State(state): State<AppState>,
    body: Result<Json<SequenceRequest>, JsonRejection>,
) -> ApiResult<Ack<SequenceLength>> {
    let request = parse(body, SEQUENCE_FORMAT_HINT)?;
    let steps = request
        .sequence
        .ok_or_else(|| ApiError::BadRequest(SEQUENCE_FORMAT_HINT.to_string()))?;
    let commands = steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| {
            step.into_command().map_err(|e| match e {
                ApiError::BadRequest(msg) => ApiError::BadRequest(format!("step {index}: {msg}")),
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let length = launch(&state, commands)?;
    Ok(Ack::new(
        "Starting movement sequence execution",
        SequenceLength {
            sequence_length: length,
        },
    ))
}

pub async fn sequence_status(State(state): State<AppState>) -> Json<SequenceStatus> {
    Json(SequenceStatus {
        state: state.dispatcher.state(),
        mode: state.dispatcher.mode(),
    })
}

pub async fn demo(State(state): State<AppState>) -> ApiResult<Ack<SequenceLength>> {
    let length = launch(&state, demo_sequence())?;
    Ok(Ack::new(
        "Demo sequence started",
        SequenceLength {
            sequence_length: length,
        },
    ))
}

pub async fn joint_states(State(state): State<AppState>) -> Json<JointPositions> {
    Json(state.snapshot.current())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Admit `commands` and run them in the background.
fn launch(state: &AppState, commands: Vec<MotionCommand>) -> Result<usize, ApiError> {
    let run = state.dispatcher.begin(commands)?;
    let accepted = run.accepted();
    info!(steps = accepted.sequence_length, mode = %accepted.mode, "sequence started");
    // Failures are logged by the run itself.
    tokio::spawn(run.execute());
    Ok(accepted.sequence_length)
}

fn parse<T: DeserializeOwned>(body: Result<Json<T>, JsonRejection>, hint: &str) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "rejected request body");
            Err(ApiError::BadRequest(hint.to_string()))
        }
    }
}

fn in_gripper_range(position: f64) -> bool {
    (0.0..=GRIPPER_MAX_OPENING).contains(&position)
}

fn check_command(command: &MotionCommand) -> Result<(), ApiError> {
    command.validate()?;
    if command.actuator == Actuator::Gripper && !in_gripper_range(command.positions[0]) {
        return Err(ApiError::BadRequest(format!(
            "gripper opening {} is outside [0, {GRIPPER_MAX_OPENING}]",
            command.positions[0]
        )));
    }
    Ok(())
}

impl CommandRequest {
    fn into_command(self) -> Result<MotionCommand, ApiError> {
        let positions = match (self.actuator, self.positions, self.position) {
            (_, Some(positions), _) => positions,
            (Actuator::Gripper, None, Some(opening)) => vec![opening, -opening],
            (actuator, None, _) => {
                return Err(ApiError::BadRequest(format!("{actuator} command has no positions")));
            }
        };
        let command = MotionCommand {
            actuator: self.actuator,
            positions,
            time_from_start: self.time_from_start,
            delay: self.delay,
        };
        check_command(&command)?;
        Ok(command)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
