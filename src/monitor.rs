// src/monitor.rs
//! Runs the telemetry engine in the background and publishes snapshots

use crate::{
    config::HudConfig,
    engine::{MetricsSnapshot, TelemetryEngine},
    error::Result,
    gps::{
        channel::{ByteChannel, ReplayChannel, SerialChannel},
        nmea::SentenceDecoder,
    },
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::{Duration, Instant},
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

/// Where bytes come from
#[derive(Debug, Clone)]
pub enum GpsSource {
    Serial { port: String },
    Replay { path: PathBuf, baud: u32, line_interval: Duration },
}

/// Owns the polling task; readers only ever see whole snapshots
pub struct HudMonitor {
    snapshot: Arc<RwLock<MetricsSnapshot>>,
    running: Arc<AtomicBool>,
}

impl HudMonitor {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(MetricsSnapshot::default())),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Build an engine for `source` and start polling it
    pub fn start_source(&self, source: GpsSource, config: &HudConfig) -> Result<JoinHandle<()>> {
        let interval = Duration::from_millis(config.poll_interval_ms.max(1));
        match source {
            GpsSource::Serial { port } => {
                info!("Using serial GPS on {}", port);
                let engine = TelemetryEngine::new(config, SerialChannel::new(port))?;
                Ok(self.start(engine, interval))
            }
            GpsSource::Replay {
                path,
                baud,
                line_interval,
            } => {
                info!("Replaying {} as a {} baud receiver", path.display(), baud);
                let channel = ReplayChannel::from_file(&path, baud, line_interval)?;
                let engine = TelemetryEngine::new(config, channel)?;
                Ok(self.start(engine, interval))
            }
        }
    }

    /// Spawn the polling loop. The engine is moved into the task and is its only writer.
    pub fn start<C, D>(&self, mut engine: TelemetryEngine<C, D>, interval: Duration) -> JoinHandle<()>
    where
        C: ByteChannel + Send + 'static,
        D: SentenceDecoder + Send + 'static,
    {
        let snapshot = Arc::clone(&self.snapshot);
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            engine.initialize(0);

            while running.load(Ordering::Relaxed) {
                ticker.tick().await;
                let now = started.elapsed().as_millis() as u64;
                let latest = engine.poll(now).clone();

                // Short write: a plain struct assignment
                match snapshot.write() {
                    Ok(mut guard) => *guard = latest,
                    Err(poisoned) => *poisoned.into_inner() = latest,
                }
            }
            debug!("Polling loop stopped");
        })
    }

    /// Stop the monitor
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Stop polling and wait for the task. Returns false if the task panicked or was cancelled.
    pub async fn shutdown(&self, handle: JoinHandle<()>) -> bool {
        self.stop();
        match handle.await {
            Ok(()) => true,
            Err(e) => {
                warn!("Polling task ended abnormally: {}", e);
                false
            }
        }
    }

    /// Check if the monitor is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get a copy of the latest snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

impl Default for HudMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// List available serial ports
pub fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gps::{channel::mock::MockChannel, transport::LinkOutcome},
        status::Status,
    };

    #[tokio::test]
    async fn test_monitor_publishes_snapshots() {
        let mut config = HudConfig::default();
        config.transport.candidate_bauds = vec![9600];

        let engine = TelemetryEngine::new(&config, MockChannel::new(9600)).unwrap();

        let monitor = HudMonitor::new();
        let handle = monitor.start(engine, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.link, Some(LinkOutcome::Testing(9600)));
        assert_eq!(snapshot.status, Status::NotConnected);

        let clean = tokio::time::timeout(Duration::from_secs(1), monitor.shutdown(handle))
            .await
            .unwrap();
        assert!(clean);
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_reports_panicked_task() {
        let monitor = HudMonitor::new();
        let handle = tokio::spawn(async {
            panic!("decoder blew up");
        });

        assert!(!monitor.shutdown(handle).await);
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_missing_replay_file_is_an_error() {
        let monitor = HudMonitor::new();
        let source = GpsSource::Replay {
            path: PathBuf::from("/nonexistent/drive.nmea"),
            baud: 9600,
            line_interval: Duration::from_millis(100),
        };
        assert!(monitor.start_source(source, &HudConfig::default()).is_err());
    }
}
