// Bundled simulator - emits random potentiostat telemetry as JSON lines on stdout
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::{Instant, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

const RUN_FOR: Duration = Duration::from_secs(30);
const INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
struct Reading {
    time: f64,
    voltage: f64,
    current: f64,
    resistance: f64,
}

impl Reading {
    fn sample<R: Rng>(elapsed: Duration, rng: &mut R) -> Self {
        Self {
            time: round_to(elapsed.as_secs_f64(), 2),
            voltage: round_to(rng.gen_range(0.0..5.0), 3),
            current: round_to(rng.gen_range(-0.01..0.01), 6),
            resistance: round_to(rng.gen_range(1000.0..10000.0), 2),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // stdout carries telemetry; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut stdout = tokio::io::stdout();
    let mut rng = rand::thread_rng();
    let start = Instant::now();

    let mut ticker = tokio::time::interval(INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let terminated = terminated();
    tokio::pin!(terminated);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut terminated => {
                tracing::info!("Simulation stopped by signal");
                return Ok(());
            }
        }
        let elapsed = start.elapsed();
        if elapsed >= RUN_FOR {
            break;
        }

        let mut line = serde_json::to_vec(&Reading::sample(elapsed, &mut rng))?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }

    tracing::info!("Simulation finished after {:?}", RUN_FOR);
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn terminated() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
