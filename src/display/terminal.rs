// src/display/terminal.rs
//! Terminal dashboard

use crate::{
    engine::MetricsSnapshot,
    error::Result,
    metrics::AccelState,
    monitor::HudMonitor,
    status::Status,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::atomic::Ordering,
    time::Duration,
};
use tokio::time::sleep;

pub struct TerminalDisplay {
    refresh: Duration,
}

impl TerminalDisplay {
    pub fn new(refresh: Duration) -> Self {
        Self { refresh }
    }

    /// Redraw the dashboard until the monitor stops or Ctrl+C is pressed
    pub async fn run(&self, monitor: &HudMonitor) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        let running = monitor.running_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                running.store(false, Ordering::Relaxed);
            }
        });

        while monitor.is_running() {
            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
            render(&mut stdout, &monitor.snapshot())?;
            stdout.flush()?;
            sleep(self.refresh).await;
        }

        execute!(stdout, Show, EnableLineWrap)?;
        println!("\nShutting down...");
        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::NotConnected => Color::DarkGrey,
        Status::NoFix | Status::Poor => Color::Red,
        Status::Fair => Color::Yellow,
        Status::Good | Status::Excellent => Color::Green,
    }
}

fn format_coordinate(value: f64, positive: char, negative: char) -> String {
    let hemisphere = if value < 0.0 { negative } else { positive };
    format!("{:>11.6}° {}", value.abs(), hemisphere)
}

fn format_zero_to_sixty(snapshot: &MetricsSnapshot) -> String {
    let run = &snapshot.zero_to_sixty;
    match run.state {
        AccelState::Armed => "ready".to_string(),
        AccelState::Timing => format!("{:.1} s ...", run.elapsed_s),
        _ if run.last_completed_s.is_some() || run.elapsed_s > 0.0 => format!("{:.2} s", run.elapsed_s),
        _ => "--".to_string(),
    }
}

/// Draw one frame
pub fn render(out: &mut impl Write, snapshot: &MetricsSnapshot) -> Result<()> {
    execute!(
        out,
        SetForegroundColor(Color::Green),
        Print("=".repeat(44)),
        Print("\n  GPS HUD\n"),
        Print("=".repeat(44)),
        Print("\n"),
        ResetColor
    )?;

    let link = match snapshot.link {
        Some(link) if link.is_locked() => format!("{} baud", link.baud()),
        Some(link) => format!("trying {} baud", link.baud()),
        None => "starting".to_string(),
    };
    execute!(
        out,
        Print("  Status:     "),
        SetForegroundColor(status_color(snapshot.status)),
        Print(format!("{:<10}", snapshot.status.label())),
        ResetColor,
        Print(format!(" ({})\n", link)),
        Print(format!("  Local time: {}\n\n", snapshot.local_time.display()))
    )?;

    execute!(
        out,
        SetForegroundColor(Color::Cyan),
        Print("DRIVING:\n"),
        ResetColor,
        Print(format!(
            "  Speed:      {:>6.1} mph  {:>6.1} km/h\n",
            snapshot.speed_mph, snapshot.speed_kmh
        )),
        Print(format!("  Max:        {:>6.1} mph\n", snapshot.max_speed_mph)),
        Print(format!("  0-60:       {}\n\n", format_zero_to_sixty(snapshot)))
    )?;

    execute!(out, SetForegroundColor(Color::Yellow), Print("POSITION:\n"), ResetColor)?;
    if snapshot.location.valid {
        let loc = &snapshot.location;
        execute!(
            out,
            Print(format!("  Latitude:  {}\n", format_coordinate(loc.latitude, 'N', 'S'))),
            Print(format!("  Longitude: {}\n", format_coordinate(loc.longitude, 'E', 'W'))),
            Print(format!("  Altitude:  {:>11.1} m\n", loc.altitude))
        )?;
        if let Some(course) = snapshot.course {
            execute!(out, Print(format!("  Course:    {:>11.1}°\n", course)))?;
        }
    } else {
        execute!(out, Print("  No fix\n"))?;
    }

    let ttff = snapshot
        .time_to_first_fix_ms
        .map(|ms| format!("{:.1} s", ms as f64 / 1000.0))
        .unwrap_or_else(|| "--".to_string());
    execute!(
        out,
        Print("\n"),
        SetForegroundColor(Color::Magenta),
        Print("QUALITY:\n"),
        ResetColor,
        Print(format!("  Satellites: {}\n", snapshot.satellites)),
        Print(format!("  HDOP:       {:.1}\n", snapshot.hdop)),
        Print(format!("  TTFF:       {}\n", ttff)),
        Print(format!(
            "  Sentences:  {} ok / {} bad, {} bytes\n\n",
            snapshot.decoder.passed_checksum, snapshot.decoder.failed_checksum, snapshot.bytes_received
        ))
    )?;

    execute!(
        out,
        SetForegroundColor(Color::Green),
        Print("=".repeat(44)),
        Print("\nPress Ctrl+C to exit\n"),
        ResetColor
    )?;

    Ok(())
}
