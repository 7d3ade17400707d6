//! Daemon status for the UI

use serde::Serialize;
use std::time::Duration;

/// Body of `GET /api/status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: String,
    /// Unix time in milliseconds
    pub timestamp: i64,
}

impl StatusReport {
    pub fn running(uptime: Duration) -> Self {
        Self {
            status: "running",
            version: env!("CARGO_PKG_VERSION"),
            uptime: format_uptime(uptime),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Render as `1h2m3s`, dropping leading zero units
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
