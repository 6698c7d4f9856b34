// src/display/mod.rs
//! Output front-ends for metric snapshots

pub mod terminal;

use crate::{engine::MetricsSnapshot, error::Result, monitor::HudMonitor};
use std::{io::Write, time::Duration};

/// Print one snapshot per line as JSON until the monitor stops
pub async fn run_json(monitor: &HudMonitor, interval: Duration) -> Result<()> {
    let running = monitor.running_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            running.store(false, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let mut stdout = std::io::stdout();
    while monitor.is_running() {
        write_json_line(&mut stdout, &monitor.snapshot())?;
        stdout.flush()?;
        tokio::time::sleep(interval).await;
    }
    Ok(())
}

pub fn write_json_line(out: &mut impl Write, snapshot: &MetricsSnapshot) -> Result<()> {
    serde_json::to_writer(&mut *out, snapshot)?;
    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line() {
        let mut out = Vec::new();
        write_json_line(&mut out, &MetricsSnapshot::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["status"], "NotConnected");
    }
}
