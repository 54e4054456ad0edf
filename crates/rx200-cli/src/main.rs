//! `rx200-cli` – RX200 remote control bridge
//!
//! This binary is the entry point for the bridge.  It:
//!
//! 1. Loads `~/.rx200/config.toml`, writing one with defaults on first run.
//! 2. Wires the event bus, the two controller publishers, the sequence
//!    dispatcher and the joint-state snapshot together.
//! 3. Keeps a [`RosbridgeLink`] to ROS 2 up in the background.
//! 4. Serves the control API and operator UI until **Ctrl-C**, then shuts
//!    both down gracefully.

mod config;

use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use rx200_cockpit::{AppState, CockpitServer};
use rx200_middleware::{EventBus, JointStateSnapshot, LinkTopics, Ros2Publisher, RosbridgeLink};
use rx200_runtime::{Dispatcher, init_tracing};
use rx200_types::{Actuator, BridgeError};

fn main() {
    // Must run before the Tokio runtime is built; see `init_tracing`.
    let _telemetry = init_tracing("rx200-bridge");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => first_run_config(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    if let Err(e) = cfg.validate() {
        println!("{}: {}", "Invalid configuration".red().bold(), e);
        std::process::exit(1);
    }
    print_summary(&cfg);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the Tokio runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cfg)) {
        println!("{}: {}", "Bridge stopped with an error".red().bold(), e);
        std::process::exit(1);
    }
    println!("{}", "  ✓ RX200 bridge stopped.".green());
}

async fn run(cfg: config::Config) -> Result<(), BridgeError> {
    // ── Shutdown signal ───────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ctrlc_tx = shutdown_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        let _ = ctrlc_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Plumbing ──────────────────────────────────────────────────────────
    let bus = Arc::new(EventBus::default());
    let snapshot = Arc::new(JointStateSnapshot::new());
    let dispatcher = Dispatcher::new(
        Arc::new(Ros2Publisher::new(Arc::clone(&bus), Actuator::Arm, cfg.arm_topic.clone())),
        Arc::new(Ros2Publisher::new(Arc::clone(&bus), Actuator::Gripper, cfg.gripper_topic.clone())),
        cfg.execution_mode,
        cfg.default_delay_secs,
    );

    let link = RosbridgeLink::new(
        Arc::clone(&bus),
        Arc::clone(&snapshot),
        cfg.rosbridge_url.clone(),
        LinkTopics {
            arm: cfg.arm_topic.clone(),
            gripper: cfg.gripper_topic.clone(),
            joint_states: cfg.joint_states_topic.clone(),
        },
    )
    .with_reconnect_delay(Duration::from_secs(cfg.reconnect_secs));
    let link_task = tokio::spawn(link.run(shutdown_rx.clone()));

    // ── HTTP ──────────────────────────────────────────────────────────────
    let mut server_shutdown = shutdown_rx;
    let result = CockpitServer::new(AppState::new(dispatcher, snapshot))
        .with_bind_address(cfg.bind_address.clone())
        .with_port(cfg.http_port)
        .run(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await;

    // Stop the link too if the server ended on its own.
    let _ = shutdown_tx.send(true);
    if let Err(e) = link_task.await {
        warn!(error = %e, "rosbridge link task ended abnormally");
    }
    info!("bridge shut down");
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// First run
// ─────────────────────────────────────────────────────────────────────────────

fn first_run_config() -> config::Config {
    let mut cfg = config::Config::default();
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} Default config written to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___  _  __ ___  ___   ___ "#.bold().cyan());
    println!("{}", r#"  / _ \| |/ /|_  |/ _ \ / _ \"#.bold().cyan());
    println!("{}", r#" / , _/>  </ __// // // // /"#.bold().cyan());
    println!("{}", r#"/_/|_|/_/|_/____/\___/ \___/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "RX200 Bridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Browser remote control for the Interbotix RX200 arm");
    println!();
}

fn print_summary(cfg: &config::Config) {
    println!("  Control UI     {}", format!("http://{}:{}", cfg.bind_address, cfg.http_port).bold());
    println!("  rosbridge      {}", cfg.rosbridge_url.dimmed());
    println!("  Arm topic      {}", cfg.arm_topic.dimmed());
    println!("  Gripper topic  {}", cfg.gripper_topic.dimmed());
    println!(
        "  Sequences      {} (default step delay {} s)",
        cfg.execution_mode.to_string().bold(),
        cfg.default_delay_secs
    );
    println!();
    println!("  Press {} to stop.\n", "Ctrl-C".bold().cyan());
}
