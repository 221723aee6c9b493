// Simulation service - drives the simulator and folds its telemetry into the session
use crate::application::process_supervisor::{
    ProcessEvent, ProcessSupervisor, StartError, StopOutcome,
};
use crate::domain::session::{Session, SessionDelta, SessionSnapshot};
use crate::domain::telemetry::MissingFieldPolicy;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Messages published to live chart subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Snapshot(SessionSnapshot),
    Delta(SessionDelta),
    Reset { run: u64 },
    Finished { run: u64, exit_code: Option<i32> },
}

/// Enabled state of the start/stop controls. Exactly one is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl Controls {
    pub fn for_running(running: bool) -> Self {
        Self {
            start_enabled: !running,
            stop_enabled: running,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatus {
    pub running: bool,
    pub run: u64,
    pub samples: u64,
    pub rejected_lines: u64,
    pub controls: Controls,
}

#[derive(thiserror::Error, Debug)]
pub enum SimulationError {
    #[error("simulation is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Start(#[from] StartError),
}

#[derive(Clone)]
pub struct SimulationService {
    supervisor: Arc<dyn ProcessSupervisor>,
    session: Arc<RwLock<Session>>,
    updates: broadcast::Sender<StreamMessage>,
    closing: watch::Sender<bool>,
    /// Held from the running check until the launch result is known.
    launching: Arc<Mutex<()>>,
}

impl SimulationService {
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        policy: MissingFieldPolicy,
        channel_capacity: usize,
    ) -> Self {
        let (updates, _) = broadcast::channel(channel_capacity.max(1));
        let (closing, _) = watch::channel(false);
        Self {
            supervisor,
            session: Arc::new(RwLock::new(Session::new(policy))),
            updates,
            closing,
            launching: Arc::new(Mutex::new(())),
        }
    }

    /// Clear the charts and launch a new run.
    ///
    /// The charts are cleared even when the launch fails.
    pub async fn start(&self) -> Result<SimulationStatus, SimulationError> {
        let _launching = self.launching.lock().await;
        if self.supervisor.is_running().await {
            return Err(SimulationError::AlreadyRunning);
        }

        let run = self.session.write().await.reset();
        let _ = self.updates.send(StreamMessage::Reset { run });

        let events = match self.supervisor.start().await {
            Ok(events) => events,
            Err(StartError::AlreadyRunning) => return Err(SimulationError::AlreadyRunning),
            Err(e) => {
                tracing::warn!("Failed to start simulation: {}", e);
                return Err(e.into());
            }
        };
        tracing::info!(run, "Simulation started");

        tokio::spawn(pump_events(
            run,
            events,
            self.session.clone(),
            self.updates.clone(),
        ));

        Ok(self.status().await)
    }

    pub async fn stop(&self) -> StopOutcome {
        let outcome = self.supervisor.stop().await;
        match outcome {
            StopOutcome::NotRunning => tracing::debug!("Stop requested with no simulation running"),
            StopOutcome::TimedOut => {
                tracing::warn!("Simulation ignored the stop request; treating it as stopped")
            }
            _ => tracing::info!(?outcome, "Simulation stopped"),
        }
        outcome
    }

    /// Stop any running simulation and end all live streams.
    pub async fn shutdown(&self) {
        self.closing.send_replace(true);
        if self.supervisor.is_running().await {
            let outcome = self.supervisor.stop().await;
            tracing::info!(?outcome, "Simulation stopped on shutdown");
        }
    }

    pub async fn status(&self) -> SimulationStatus {
        let running = self.supervisor.is_running().await;
        let session = self.session.read().await;
        SimulationStatus {
            running,
            run: session.run(),
            samples: session.samples(),
            rejected_lines: session.rejected_lines(),
            controls: Controls::for_running(running),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.snapshot()
    }

    /// Live chart updates, starting with a snapshot of the current session.
    pub async fn subscribe(&self) -> BoxStream<'static, StreamMessage> {
        // Holding the read lock keeps the pump from publishing between the
        // snapshot and the subscription.
        let session = self.session.read().await;
        let receiver = self.updates.subscribe();
        let snapshot = session.snapshot();
        drop(session);

        let mut live = BroadcastStream::new(receiver);
        let mut closing = self.closing.subscribe();
        let closed = async move {
            let _ = closing.wait_for(|closing| *closing).await;
        };

        Box::pin(async_stream::stream! {
            tokio::pin!(closed);
            yield StreamMessage::Snapshot(snapshot);

            loop {
                let msg = tokio::select! {
                    _ = &mut closed => break,
                    msg = live.next() => msg,
                };
                match msg {
                    Some(Ok(msg)) => yield msg,
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        tracing::warn!("Chart subscriber lagged, skipped {} messages", skipped);
                    }
                    None => break,
                }
            }
        })
    }
}

async fn pump_events(
    run: u64,
    mut events: mpsc::Receiver<ProcessEvent>,
    session: Arc<RwLock<Session>>,
    updates: broadcast::Sender<StreamMessage>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ProcessEvent::Stdout(line) => {
                let mut session = session.write().await;
                if session.run() != run {
                    tracing::debug!(run, "Discarding output of a superseded run");
                    break;
                }
                match session.ingest(&line) {
                    Ok(Some(delta)) => {
                        let _ = updates.send(StreamMessage::Delta(delta));
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(run, "Skipping telemetry line: {}", e),
                }
            }
            ProcessEvent::Stderr(line) => tracing::warn!(run, "Sim error: {}", line),
            ProcessEvent::Exited(exit_code) => {
                tracing::info!(run, ?exit_code, "Simulation exited");
                if session.read().await.run() == run {
                    let _ = updates.send(StreamMessage::Finished { run, exit_code });
                }
            }
        }
    }
}
