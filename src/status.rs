// src/status.rs
//! Qualitative fix status from connection state and HDOP

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Status {
    #[default]
    NotConnected,
    NoFix,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Status {
    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            Status::NotConnected => "NC",
            Status::NoFix => "No Fix",
            Status::Poor => "Poor",
            Status::Fair => "Fair",
            Status::Good => "Good",
            Status::Excellent => "Excellent",
        }
    }

    /// True for the four HDOP grades
    pub fn has_fix(&self) -> bool {
        *self >= Status::Poor
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a poll cycle. `has_fix` must already account for fix age.
pub fn classify(connected: bool, has_fix: bool, hdop: f64) -> Status {
    if !connected {
        Status::NotConnected
    } else if !has_fix {
        Status::NoFix
    } else if hdop < 1.0 {
        Status::Excellent
    } else if hdop < 2.0 {
        Status::Good
    } else if hdop <= 5.0 {
        Status::Fair
    } else {
        // Also catches NaN
        Status::Poor
    }
}
