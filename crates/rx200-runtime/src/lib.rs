//! `rx200-runtime` – motion execution for the RX200 bridge
//!
//! Turns operator motion requests into controller trajectories and plays
//! sequences of them out over time.
//!
//! # Modules
//!
//! - [`translator`] – pure conversion from [`MotionCommand`][rx200_types::MotionCommand]s
//!   to `JointTrajectory` messages, including the seconds → `{sec, nanosec}`
//!   split and the mirrored gripper finger.
//! - [`dispatcher`] – [`Dispatcher`][dispatcher::Dispatcher]: the sequenced
//!   command dispatcher with its serial and batched
//!   [`ExecutionMode`][dispatcher::ExecutionMode]s and a one-at-a-time
//!   running slot.
//! - [`demo`] – the built-in demonstration sequence.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod demo;
pub mod dispatcher;
pub mod telemetry;
pub mod translator;

pub use demo::demo_sequence;
pub use dispatcher::{
    DEFAULT_STEP_DELAY_SECS, Dispatcher, DispatcherState, ExecutionMode, SequenceAccepted,
    SequenceReport, SequenceRun,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use translator::{translate, translate_batch, translate_command};
