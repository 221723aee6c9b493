// Child process supervisor - runs the simulator executable with piped output
use crate::application::process_supervisor::{
    ProcessEvent, ProcessSupervisor, StartError, StopOutcome,
};
use crate::infrastructure::config::SimulatorSettings;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

const EVENT_BUFFER: usize = 1024;
/// How long output may keep draining once the process is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

type StopRequest = oneshot::Sender<StopOutcome>;

struct RunningChild {
    pid: Option<u32>,
    stop_tx: mpsc::Sender<StopRequest>,
}

impl RunningChild {
    /// The supervising task closes its end once the process is gone.
    fn is_alive(&self) -> bool {
        !self.stop_tx.is_closed()
    }
}

pub struct ChildProcessSupervisor {
    executable: PathBuf,
    args: Vec<String>,
    stop_timeout: Duration,
    kill_on_timeout: bool,
    running: Mutex<Option<RunningChild>>,
}

impl ChildProcessSupervisor {
    pub fn new(
        executable: PathBuf,
        args: Vec<String>,
        stop_timeout: Duration,
        kill_on_timeout: bool,
    ) -> Self {
        Self {
            executable,
            args,
            stop_timeout,
            kill_on_timeout,
            running: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &SimulatorSettings) -> anyhow::Result<Self> {
        Ok(Self::new(
            settings.resolve_executable()?,
            settings.args.clone(),
            settings.stop_timeout(),
            settings.kill_on_timeout,
        ))
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }
}

#[async_trait]
impl ProcessSupervisor for ChildProcessSupervisor {
    async fn start(&self) -> Result<mpsc::Receiver<ProcessEvent>, StartError> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(RunningChild::is_alive) {
            return Err(StartError::AlreadyRunning);
        }

        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(self.kill_on_timeout)
            .spawn()
            .map_err(|source| StartError::Spawn {
                path: self.executable.clone(),
                source,
            })?;
        let pid = child.id();

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(tokio::spawn(forward_lines(
                stdout,
                events_tx.clone(),
                ProcessEvent::Stdout,
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(tokio::spawn(forward_lines(
                stderr,
                events_tx.clone(),
                ProcessEvent::Stderr,
            )));
        }

        let (stop_tx, stop_rx) = mpsc::channel(1);
        tokio::spawn(supervise(
            child,
            stop_rx,
            events_tx,
            forwarders,
            self.stop_timeout,
            self.kill_on_timeout,
        ));

        tracing::info!(?pid, "Launched {}", self.executable.display());
        *running = Some(RunningChild { pid, stop_tx });
        Ok(events_rx)
    }

    async fn stop(&self) -> StopOutcome {
        // Release the lock before waiting so status queries are not blocked
        // for the whole stop timeout.
        let stop_tx = match self.running.lock().await.as_ref() {
            Some(child) if child.is_alive() => {
                tracing::debug!(pid = ?child.pid, "Requesting simulation stop");
                child.stop_tx.clone()
            }
            _ => return StopOutcome::NotRunning,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if stop_tx.send(reply_tx).await.is_err() {
            return StopOutcome::NotRunning;
        }
        reply_rx.await.unwrap_or(StopOutcome::NotRunning)
    }

    async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(RunningChild::is_alive)
    }
}

enum Ending {
    Exited(Option<i32>),
    StopRequested(StopRequest),
}

/// Owns the child for its whole life: waits for it to exit or serves a stop
/// request, then reports `Exited` once its output is drained.
async fn supervise(
    mut child: Child,
    mut stop_rx: mpsc::Receiver<StopRequest>,
    events: mpsc::Sender<ProcessEvent>,
    forwarders: Vec<JoinHandle<()>>,
    stop_timeout: Duration,
    kill_on_timeout: bool,
) {
    let ending = tokio::select! {
        status = child.wait() => Ending::Exited(exit_code(status)),
        Some(reply) = stop_rx.recv() => Ending::StopRequested(reply),
    };

    let code = match ending {
        Ending::Exited(code) => {
            stop_rx.close();
            code
        }
        Ending::StopRequested(reply) => {
            let (outcome, code) = terminate(&mut child, stop_timeout, kill_on_timeout).await;
            stop_rx.close();
            let _ = reply.send(outcome);
            code
        }
    };
    // Stop requests that raced with the exit.
    while let Ok(reply) = stop_rx.try_recv() {
        let _ = reply.send(StopOutcome::NotRunning);
    }
    drop(stop_rx);

    for forwarder in forwarders {
        let abort = forwarder.abort_handle();
        if tokio::time::timeout(DRAIN_TIMEOUT, forwarder).await.is_err() {
            tracing::warn!("Simulation output still open after exit; dropping it");
            abort.abort();
        }
    }

    let _ = events.send(ProcessEvent::Exited(code)).await;
}

async fn terminate(
    child: &mut Child,
    stop_timeout: Duration,
    kill_on_timeout: bool,
) -> (StopOutcome, Option<i32>) {
    request_terminate(child);

    match tokio::time::timeout(stop_timeout, child.wait()).await {
        Ok(status) => (StopOutcome::Terminated, exit_code(status)),
        Err(_) if kill_on_timeout => {
            tracing::warn!(
                "Simulation did not exit within {:?}, killing it",
                stop_timeout
            );
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill simulation: {}", e);
            }
            let code = child.try_wait().ok().flatten().and_then(|s| s.code());
            (StopOutcome::Killed, code)
        }
        Err(_) => (StopOutcome::TimedOut, None),
    }
}

#[cfg(unix)]
fn request_terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: `pid` is our own child and has not been reaped yet.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == -1 {
        tracing::warn!(
            "Failed to signal simulation: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn request_terminate(child: &mut Child) {
    // No graceful signal here; the stop timeout never comes into play.
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to stop simulation: {}", e);
    }
}

fn exit_code(status: std::io::Result<ExitStatus>) -> Option<i32> {
    match status {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::warn!("Failed to wait for simulation: {}", e);
            None
        }
    }
}

/// Forward each `\n`-terminated line of `reader`. Invalid UTF-8 is replaced
/// rather than ending the stream.
async fn forward_lines<R>(
    reader: R,
    events: mpsc::Sender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(&['\r', '\n'][..])
                    .to_string();
                if events.send(wrap(line)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read simulation output: {}", e);
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str, stop_timeout: Duration) -> ChildProcessSupervisor {
        ChildProcessSupervisor::new(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), script.to_string()],
            stop_timeout,
            true,
        )
    }

    async fn drain(mut events: mpsc::Receiver<ProcessEvent>) -> Vec<ProcessEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
                .await
                .expect("timed out waiting for process events")
                .expect("event channel closed before exit");
            let exited = matches!(event, ProcessEvent::Exited(_));
            seen.push(event);
            if exited {
                return seen;
            }
        }
    }

    #[tokio::test]
    async fn test_forwards_stdout_and_stderr() {
        let supervisor = shell(
            r#"printf '%s\n' '{"time":0}' 'second'; echo oops 1>&2"#,
            Duration::from_secs(3),
        );

        let events = drain(supervisor.start().await.unwrap()).await;

        let stdout: Vec<&ProcessEvent> = events
            .iter()
            .filter(|e| matches!(e, ProcessEvent::Stdout(_)))
            .collect();
        assert_eq!(
            stdout,
            vec![
                &ProcessEvent::Stdout(r#"{"time":0}"#.to_string()),
                &ProcessEvent::Stdout("second".to_string()),
            ]
        );
        assert!(events.contains(&ProcessEvent::Stderr("oops".to_string())));
        assert_eq!(events.last(), Some(&ProcessEvent::Exited(Some(0))));
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_terminates_gracefully() {
        let supervisor = shell("exec sleep 30", Duration::from_secs(3));
        let events = supervisor.start().await.unwrap();
        assert!(supervisor.is_running().await);

        assert_eq!(supervisor.stop().await, StopOutcome::Terminated);
        assert!(!supervisor.is_running().await);
        assert_eq!(drain(events).await.last(), Some(&ProcessEvent::Exited(None)));
    }

    #[tokio::test]
    async fn test_stop_escalates_to_kill() {
        let supervisor = shell(
            "trap '' TERM; while true; do sleep 0.05; done",
            Duration::from_millis(200),
        );
        let events = supervisor.start().await.unwrap();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(supervisor.stop().await, StopOutcome::Killed);
        assert!(!supervisor.is_running().await);
        drain(events).await;
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let supervisor = shell("true", Duration::from_secs(1));
        assert_eq!(supervisor.stop().await, StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_second_start_is_refused() {
        let supervisor = shell("exec sleep 30", Duration::from_secs(3));
        let _events = supervisor.start().await.unwrap();

        assert!(matches!(
            supervisor.start().await,
            Err(StartError::AlreadyRunning)
        ));
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let supervisor = ChildProcessSupervisor::new(
            PathBuf::from("/nonexistent/simulate"),
            Vec::new(),
            Duration::from_secs(1),
            true,
        );

        assert!(matches!(
            supervisor.start().await,
            Err(StartError::Spawn { .. })
        ));
        assert!(!supervisor.is_running().await);
    }
}
