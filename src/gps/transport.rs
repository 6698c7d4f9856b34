// src/gps/transport.rs
//! Baud rate detection and link supervision
//!
//! The detector cycles through the candidate baud rates, giving each one a
//! fixed test window. A window that produced at least one checksum-valid
//! sentence locks the link at that rate. While locked, silence longer than the
//! data timeout reports the receiver as disconnected; if it stays silent for a
//! further re-test window the detector starts over from the first candidate.
//!
//! Everything is driven by `poll(now)`; nothing here sleeps or blocks.

use super::{
    channel::ByteChannel,
    nmea::{with_checksum, SentenceDecoder},
};
use crate::{config::TransportConfig, error::Result};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Commands sent after a lock to enable multi-constellation reporting.
/// PMTK lines target MediaTek modules, PUBX lines u-blox; each ignores the other's.
const RECEIVER_SETUP: [&str; 6] = [
    "PMTK353,1,1,1,1,0",                             // GPS + GLONASS + Galileo + BeiDou
    "PUBX,40,GLL,0,0,0,0,0,0",                       // GLL off
    "PUBX,40,VTG,0,0,0,0,0,0",                       // VTG off
    "PUBX,40,GSV,0,1,0,0,0,0",                       // GSV on
    "PMTK314,0,1,0,1,1,5,0,0,0,0,0,0,0,0,0,0,0,0,0", // RMC, GGA, GSA every fix; GSV every 5th
    "PMTK220,200",                                   // 5 Hz
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "baud")]
pub enum LinkOutcome {
    Testing(u32),
    Locked(u32),
}

impl LinkOutcome {
    pub fn baud(&self) -> u32 {
        match self {
            LinkOutcome::Testing(baud) | LinkOutcome::Locked(baud) => *baud,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LinkOutcome::Locked(_))
    }
}

/// What `poll` reports back each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransportState {
    pub outcome: LinkOutcome,
    pub candidate_index: usize,
    pub window_start: u64,
    /// A validated sentence arrived within the data timeout
    pub connected: bool,
    pub bytes_received: u64,
    pub sentences_validated: u64,
}

pub struct TransportDetector<C, D> {
    config: TransportConfig,
    channel: C,
    decoder: D,
    initialized: bool,
    outcome: LinkOutcome,
    candidate_index: usize,
    window_start: u64,
    window_sentences: u64,
    /// Set once a lock has been lost; later cycles use the shorter re-test window
    relocking: bool,
    last_sentence_at: Option<u64>,
    bytes_received: u64,
    sentences_validated: u64,
}

impl<C: ByteChannel, D: SentenceDecoder> TransportDetector<C, D> {
    pub fn new(config: TransportConfig, channel: C, decoder: D) -> Result<Self> {
        config.validate()?;
        let first = config.candidate_bauds[0];
        Ok(Self {
            config,
            channel,
            decoder,
            initialized: false,
            outcome: LinkOutcome::Testing(first),
            candidate_index: 0,
            window_start: 0,
            window_sentences: 0,
            relocking: false,
            last_sentence_at: None,
            bytes_received: 0,
            sentences_validated: 0,
        })
    }

    /// Begin testing the first candidate
    pub fn initialize(&mut self, now: u64) {
        info!(
            "Starting baud rate auto-detection over {:?}",
            self.config.candidate_bauds
        );
        self.initialized = true;
        self.begin_testing(0, now);
    }

    /// Feed pending bytes to the decoder and advance the detection state machine
    pub fn poll(&mut self, now: u64) -> TransportState {
        if !self.initialized {
            self.initialize(now);
        }

        let validated = self.pump(now);

        match self.outcome {
            LinkOutcome::Testing(baud) => {
                self.window_sentences += validated;
                if now.saturating_sub(self.window_start) >= self.window_len() {
                    self.finish_window(baud, now);
                }
            }
            LinkOutcome::Locked(baud) => {
                let silent_for = self
                    .last_sentence_at
                    .map_or(u64::MAX, |at| now.saturating_sub(at));
                if silent_for > self.config.data_timeout_ms + self.config.retest_window_ms {
                    warn!(
                        "No valid sentences at {} baud for {} ms, restarting detection",
                        baud, silent_for
                    );
                    self.relocking = true;
                    self.begin_testing(0, now);
                }
            }
        }

        self.state(now)
    }

    pub fn state(&self, now: u64) -> TransportState {
        TransportState {
            outcome: self.outcome,
            candidate_index: self.candidate_index,
            window_start: self.window_start,
            connected: self.is_connected(now),
            bytes_received: self.bytes_received,
            sentences_validated: self.sentences_validated,
        }
    }

    pub fn is_connected(&self, now: u64) -> bool {
        self.last_sentence_at
            .map_or(false, |at| now.saturating_sub(at) <= self.config.data_timeout_ms)
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Read at most `max_bytes_per_poll` bytes; returns how many sentences validated
    fn pump(&mut self, now: u64) -> u64 {
        let mut validated = 0;
        let mut budget = self.config.max_bytes_per_poll;

        while budget > 0 && self.channel.available() > 0 {
            let Some(byte) = self.channel.read() else {
                break;
            };
            budget -= 1;
            self.bytes_received += 1;
            if self.decoder.feed(byte, now) {
                validated += 1;
            }
        }

        if validated > 0 {
            self.sentences_validated += validated;
            self.last_sentence_at = Some(now);
        }
        validated
    }

    fn window_len(&self) -> u64 {
        if self.relocking {
            self.config.retest_window_ms
        } else {
            self.config.acquisition_window_ms
        }
    }

    fn finish_window(&mut self, baud: u32, now: u64) {
        if self.window_sentences > 0 {
            info!(
                "Locked at {} baud ({} valid sentences in test window)",
                baud, self.window_sentences
            );
            self.outcome = LinkOutcome::Locked(baud);
            self.relocking = false;
            if self.config.configure_receiver {
                self.configure_receiver();
            }
            return;
        }

        let next = self.candidate_index + 1;
        if next < self.config.candidate_bauds.len() {
            debug!(
                "Baud {} failed, trying {}",
                baud, self.config.candidate_bauds[next]
            );
            self.begin_testing(next, now);
        } else {
            debug!("All baud rates failed, restarting detection");
            self.begin_testing(0, now);
        }
    }

    fn begin_testing(&mut self, index: usize, now: u64) {
        let baud = self.config.candidate_bauds[index];
        self.candidate_index = index;
        self.outcome = LinkOutcome::Testing(baud);
        self.window_start = now;
        self.window_sentences = 0;
        self.decoder.reset();

        self.channel.close();
        if let Err(e) = self.channel.open(baud) {
            // The window still runs; it just validates nothing
            warn!("Failed to open channel at {} baud: {}", baud, e);
        }
        debug!("Testing baud rate {}", baud);
    }

    /// Fire-and-forget; nothing is read back
    fn configure_receiver(&mut self) {
        info!("Configuring receiver for multi-constellation reporting");
        for body in RECEIVER_SETUP {
            let command = with_checksum(body) + "\r\n";
            if let Err(e) = self.channel.write(command.as_bytes()) {
                warn!("Failed to send receiver command {}: {}", body, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::GpsError,
        gps::{channel::mock::MockChannel, nmea::NmeaDecoder},
    };

    const GGA: &str = "GPGGA,120000,5130.000,N,00007.000,W,1,09,0.8,35.0,M,47.0,M,,";

    fn config(bauds: &[u32]) -> TransportConfig {
        TransportConfig {
            candidate_bauds: bauds.to_vec(),
            max_bytes_per_poll: 1000,
            ..TransportConfig::default()
        }
    }

    fn detector(bauds: &[u32], native: u32) -> TransportDetector<MockChannel, NmeaDecoder> {
        TransportDetector::new(config(bauds), MockChannel::new(native), NmeaDecoder::new()).unwrap()
    }

    #[test]
    fn test_locks_on_second_candidate() {
        let mut det = detector(&[115200, 9600], 9600);
        det.initialize(0);

        det.channel.transmit(GGA);
        let state = det.poll(1000);
        assert_eq!(state.outcome, LinkOutcome::Testing(115200));
        assert_eq!(state.sentences_validated, 0);
        assert!(state.bytes_received > 0);

        let state = det.poll(5000);
        assert_eq!(state.outcome, LinkOutcome::Testing(9600));
        assert_eq!(state.candidate_index, 1);
        assert_eq!(state.window_start, 5000);

        det.channel.transmit(GGA);
        let state = det.poll(6000);
        assert_eq!(state.outcome, LinkOutcome::Testing(9600));
        assert!(state.connected);

        let state = det.poll(10_000);
        assert_eq!(state.outcome, LinkOutcome::Locked(9600));
        assert_eq!(det.channel.opened, vec![115200, 9600]);
    }

    #[test]
    fn test_cycle_wraps_to_first_candidate() {
        let mut det = detector(&[115200, 9600], 4800);
        det.initialize(0);

        assert_eq!(det.poll(5000).outcome, LinkOutcome::Testing(9600));
        let state = det.poll(10_000);
        assert_eq!(state.outcome, LinkOutcome::Testing(115200));
        assert_eq!(state.candidate_index, 0);
        assert!(!state.connected);
        assert_eq!(det.channel.opened, vec![115200, 9600, 115200]);
    }

    #[test]
    fn test_lock_sends_receiver_setup_once() {
        let mut det = detector(&[9600], 9600);
        det.initialize(0);
        det.channel.transmit(GGA);
        det.poll(100);
        det.poll(5000);
        det.channel.transmit(GGA);
        det.poll(5100);

        assert_eq!(det.channel.written.len(), RECEIVER_SETUP.len());
        assert_eq!(det.channel.written[0], "$PMTK353,1,1,1,1,0*2B\r\n");
        assert_eq!(det.channel.written[5], "$PMTK220,200*2C\r\n");
    }

    #[test]
    fn test_receiver_setup_can_be_disabled() {
        let mut cfg = config(&[9600]);
        cfg.configure_receiver = false;
        let mut det = TransportDetector::new(cfg, MockChannel::new(9600), NmeaDecoder::new()).unwrap();
        det.initialize(0);
        det.channel.transmit(GGA);
        det.poll(10);

        assert!(det.poll(5000).outcome.is_locked());
        assert!(det.channel.written.is_empty());
    }

    #[test]
    fn test_silence_disconnects_but_keeps_lock() {
        let mut det = detector(&[9600], 9600);
        det.initialize(0);
        det.channel.transmit(GGA);
        det.poll(4000);
        assert!(det.poll(5000).outcome.is_locked());

        // Validated at 4000; 3000 ms timeout
        assert!(det.poll(7000).connected);
        let state = det.poll(7001);
        assert!(!state.connected);
        assert_eq!(state.outcome, LinkOutcome::Locked(9600));

        // Data resumes before the re-test window runs out
        det.channel.transmit(GGA);
        let state = det.poll(8000);
        assert!(state.connected);
        assert_eq!(state.outcome, LinkOutcome::Locked(9600));
    }

    #[test]
    fn test_prolonged_silence_restarts_detection_and_relocks() {
        let mut det = detector(&[115200, 9600], 9600);
        det.initialize(0);
        det.poll(5000);
        det.channel.transmit(GGA);
        det.poll(6000);
        assert!(det.poll(10_000).outcome.is_locked());

        // 6000 + 3000 timeout + 2000 re-test window
        assert!(det.poll(11_000).outcome.is_locked());
        let state = det.poll(11_001);
        assert_eq!(state.outcome, LinkOutcome::Testing(115200));
        assert_eq!(state.candidate_index, 0);

        // Re-test windows are 2000 ms long
        assert_eq!(det.poll(13_000).outcome, LinkOutcome::Testing(115200));
        assert_eq!(det.poll(13_001).outcome, LinkOutcome::Testing(9600));
        assert_eq!(det.channel.written.len(), RECEIVER_SETUP.len());

        // Receiver comes back during the 9600 re-test window
        det.channel.transmit(GGA);
        let state = det.poll(14_000);
        assert!(state.connected);
        assert_eq!(state.outcome, LinkOutcome::Testing(9600));

        let state = det.poll(15_001);
        assert_eq!(state.outcome, LinkOutcome::Locked(9600));
        assert!(state.connected);

        // A fresh lock sends the setup commands again, exactly once
        assert_eq!(det.channel.written.len(), 2 * RECEIVER_SETUP.len());
        det.channel.transmit(GGA);
        det.poll(15_500);
        assert_eq!(det.channel.written.len(), 2 * RECEIVER_SETUP.len());
        assert_eq!(det.channel.written[RECEIVER_SETUP.len()], det.channel.written[0]);
    }

    #[test]
    fn test_byte_budget_per_poll() {
        let cfg = TransportConfig {
            candidate_bauds: vec![9600],
            max_bytes_per_poll: 50,
            ..TransportConfig::default()
        };
        let mut det = TransportDetector::new(cfg, MockChannel::new(9600), NmeaDecoder::new()).unwrap();
        det.initialize(0);
        det.channel.transmit(GGA);
        det.channel.transmit(GGA);
        let total = det.channel.pending.len() as u64;
        assert!(total > 100);

        assert_eq!(det.poll(1).bytes_received, 50);
        assert_eq!(det.poll(2).bytes_received, 100);
        let mut state = det.poll(3);
        while state.bytes_received < total {
            state = det.poll(4);
        }
        assert_eq!(state.sentences_validated, 2);
    }

    #[test]
    fn test_open_failure_keeps_cycling() {
        let mut det = detector(&[115200, 9600], 9600);
        det.channel.fail_open = true;
        det.initialize(0);

        assert_eq!(det.poll(5000).outcome, LinkOutcome::Testing(9600));
        assert_eq!(det.poll(10_000).outcome, LinkOutcome::Testing(115200));
        assert_eq!(det.channel.opened, vec![115200, 9600, 115200]);
    }

    #[test]
    fn test_poll_initializes_lazily() {
        let mut det = detector(&[38400], 38400);
        let state = det.poll(0);
        assert_eq!(state.outcome, LinkOutcome::Testing(38400));
        assert_eq!(det.channel.opened, vec![38400]);
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let result = TransportDetector::new(config(&[]), MockChannel::new(9600), NmeaDecoder::new());
        assert!(matches!(result, Err(GpsError::Config(_))));
    }
}
