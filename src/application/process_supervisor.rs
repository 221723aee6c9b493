// Supervisor trait for the external simulation process
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output of a running simulation, in the order it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    /// Sent once both output streams are drained.
    Exited(Option<i32>),
}

#[derive(thiserror::Error, Debug)]
pub enum StartError {
    #[error("simulation is already running")]
    AlreadyRunning,
    #[error("failed to launch {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    NotRunning,
    /// Exited after the graceful terminate request.
    Terminated,
    /// Ignored the terminate request and was killed.
    Killed,
    /// Ignored the terminate request; escalation is disabled.
    TimedOut,
}

#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Launch the simulation and hand back its output events.
    async fn start(&self) -> Result<mpsc::Receiver<ProcessEvent>, StartError>;

    /// Stop the simulation. A no-op when nothing is running.
    async fn stop(&self) -> StopOutcome;

    async fn is_running(&self) -> bool;
}
