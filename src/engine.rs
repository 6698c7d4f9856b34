// src/engine.rs
//! Telemetry engine
//!
//! One `poll(now)` call moves bytes from the channel through the decoder,
//! classifies the fix, advances the derived metrics and rebuilds the snapshot.
//! The engine is the only writer of all of this state; readers get copies of
//! [`MetricsSnapshot`].

use crate::{
    config::{FixConfig, HudConfig},
    error::Result,
    gps::{
        channel::ByteChannel,
        data::{FixSample, GpsLocation},
        nmea::{DecoderStats, NmeaDecoder, SentenceDecoder},
        transport::{LinkOutcome, TransportDetector, TransportState},
    },
    local_time::{self, LocalTime},
    metrics::{clamp_speed, AccelState, AccelTimer, MaxSpeedTracker},
    status::{classify, Status},
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ZeroToSixty {
    pub state: AccelState,
    /// Running time during a run, otherwise the last reported result
    pub elapsed_s: f64,
    pub last_completed_s: Option<f64>,
}

/// Everything the display layer needs for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp_ms: u64,
    pub status: Status,
    pub connected: bool,
    pub link: Option<LinkOutcome>,
    /// `valid` is false whenever there is no current fix; coordinates keep the last position
    pub location: GpsLocation,
    pub speed_mph: f64,
    pub speed_kmh: f64,
    pub course: Option<f64>,
    pub satellites: u32,
    pub hdop: f64,
    pub max_speed_mph: f64,
    pub zero_to_sixty: ZeroToSixty,
    pub local_time: LocalTime,
    pub time_to_first_fix_ms: Option<u64>,
    pub bytes_received: u64,
    pub decoder: DecoderStats,
}

/// Tracks how long it takes to (re)acquire a fix
#[derive(Debug, Default)]
struct FirstFix {
    searching_since: Option<u64>,
    have_fix: bool,
    last_duration_ms: Option<u64>,
}

impl FirstFix {
    fn update(&mut self, has_fix: bool, now: u64) {
        let since = *self.searching_since.get_or_insert(now);

        if has_fix && !self.have_fix {
            let duration = now.saturating_sub(since);
            info!("GPS fix acquired in {:.1} seconds", duration as f64 / 1000.0);
            self.last_duration_ms = Some(duration);
            self.have_fix = true;
        } else if !has_fix && self.have_fix {
            info!("Fix lost, waiting for GPS");
            self.have_fix = false;
            self.searching_since = Some(now);
        }
    }
}

pub struct TelemetryEngine<C, D = NmeaDecoder> {
    transport: TransportDetector<C, D>,
    fix_config: FixConfig,
    utc_offset_hours: i32,
    max_speed: MaxSpeedTracker,
    accel: AccelTimer,
    first_fix: FirstFix,
    diagnostics_interval_ms: u64,
    last_diagnostics: Option<u64>,
    snapshot: MetricsSnapshot,
}

impl<C: ByteChannel> TelemetryEngine<C, NmeaDecoder> {
    pub fn new(config: &HudConfig, channel: C) -> Result<Self> {
        Self::with_decoder(config, channel, NmeaDecoder::new())
    }
}

impl<C: ByteChannel, D: SentenceDecoder> TelemetryEngine<C, D> {
    pub fn with_decoder(config: &HudConfig, channel: C, decoder: D) -> Result<Self> {
        let transport = TransportDetector::new(config.transport.clone(), channel, decoder)?;
        Ok(Self {
            transport,
            fix_config: config.fix.clone(),
            utc_offset_hours: config.utc_offset_hours,
            max_speed: MaxSpeedTracker::new(config.fix.max_plausible_mph),
            accel: AccelTimer::new(config.fix.accel_timeout_ms),
            first_fix: FirstFix::default(),
            diagnostics_interval_ms: config.diagnostics_interval_ms,
            last_diagnostics: None,
            snapshot: MetricsSnapshot::default(),
        })
    }

    /// Start transport detection explicitly; `poll` does this on first use otherwise
    pub fn initialize(&mut self, now: u64) {
        self.transport.initialize(now);
    }

    /// Run one cycle and return the refreshed snapshot
    pub fn poll(&mut self, now: u64) -> &MetricsSnapshot {
        let link = self.transport.poll(now);
        let sample = self.transport.decoder().sample(now);

        let has_fix = sample.has_fix(self.fix_config.stale_fix_ms);
        let hdop = sample.hdop_or(self.fix_config.hdop_sentinel);
        let status = classify(link.connected, has_fix, hdop);

        let speed_mph = if has_fix {
            clamp_speed(sample.speed_mph(), self.fix_config.noise_floor_mph)
        } else {
            0.0
        };

        if has_fix {
            let reliable = hdop < self.fix_config.reliable_hdop;
            self.max_speed.update(speed_mph, reliable);
            self.accel.update(speed_mph, reliable, now);
        }
        self.first_fix.update(has_fix, now);

        self.snapshot = self.build_snapshot(now, &link, &sample, status, has_fix, hdop, speed_mph);
        self.log_diagnostics(now, &sample);
        &self.snapshot
    }

    pub fn snapshot(&self) -> &MetricsSnapshot {
        &self.snapshot
    }

    pub fn transport(&self) -> &TransportDetector<C, D> {
        &self.transport
    }

    #[allow(clippy::too_many_arguments)]
    fn build_snapshot(
        &self,
        now: u64,
        link: &TransportState,
        sample: &FixSample,
        status: Status,
        has_fix: bool,
        hdop: f64,
        speed_mph: f64,
    ) -> MetricsSnapshot {
        let speed_kmh = if speed_mph > 0.0 { sample.speed_kmh() } else { 0.0 };

        MetricsSnapshot {
            timestamp_ms: now,
            status,
            connected: link.connected,
            link: Some(link.outcome),
            location: GpsLocation {
                valid: has_fix,
                ..sample.location
            },
            speed_mph,
            speed_kmh,
            course: if has_fix { sample.course } else { None },
            satellites: sample.satellite_count(),
            hdop,
            max_speed_mph: self.max_speed.speed_max,
            zero_to_sixty: ZeroToSixty {
                state: self.accel.state(),
                elapsed_s: self.accel.elapsed_ms() as f64 / 1000.0,
                last_completed_s: self.accel.last_completed_ms().map(|ms| ms as f64 / 1000.0),
            },
            local_time: self.local_time(link.connected, sample),
            time_to_first_fix_ms: self.first_fix.last_duration_ms,
            bytes_received: link.bytes_received,
            decoder: self.transport.decoder().stats(),
        }
    }

    /// Needs both time and date: the date decides summer time
    fn local_time(&self, connected: bool, sample: &FixSample) -> LocalTime {
        match sample.date {
            Some(date) if connected && sample.time.valid => {
                let (hour, minute, dst) = local_time::to_local(
                    sample.time.hour,
                    sample.time.minute,
                    date.year,
                    date.month,
                    date.day,
                    self.utc_offset_hours,
                );
                LocalTime {
                    hour,
                    minute,
                    dst,
                    valid: true,
                }
            }
            _ => LocalTime::default(),
        }
    }

    fn log_diagnostics(&mut self, now: u64, sample: &FixSample) {
        let due = self
            .last_diagnostics
            .map_or(true, |at| now.saturating_sub(at) >= self.diagnostics_interval_ms);
        if !due {
            return;
        }
        self.last_diagnostics = Some(now);

        let stats = self.transport.decoder().stats();
        let date = sample
            .date
            .map(|d| format!("{}/{}/{}", d.month, d.day, d.year))
            .unwrap_or_else(|| "INVALID".to_string());
        let time = if sample.time.valid {
            let zone = match sample.date {
                Some(d) if local_time::is_dst(d.year, d.month, d.day, sample.time.hour) => "summer",
                Some(_) => "standard",
                None => "unknown",
            };
            format!(
                "{:02}:{:02}:{:02} UTC ({} time)",
                sample.time.hour, sample.time.minute, sample.time.second, zone
            )
        } else {
            "INVALID".to_string()
        };

        debug!(
            hdop = ?sample.hdop,
            satellites = ?sample.satellites,
            chars = stats.chars_processed,
            passed = stats.passed_checksum,
            failed = stats.failed_checksum,
            "GPS {} {}",
            date,
            time
        );
    }
}
