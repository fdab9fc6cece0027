use std::time::Duration;

use savemgr_engine::ProgressTracker;

pub fn format_bytes(bytes: f64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes.max(0.0);
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// `MM:SS`, or `HH:MM:SS` past an hour.
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    let (hours, mins, secs) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Speed and ETA line shown under the progress bar.
pub fn speed_line(speed_bytes_per_sec: f64, eta: Duration) -> String {
    format!(
        "Speed: {}/s | ETA: {}",
        format_bytes(speed_bytes_per_sec),
        format_eta(eta)
    )
}

pub fn tracker_speed_line(tracker: &ProgressTracker) -> String {
    speed_line(tracker.speed_bytes_per_sec(), tracker.eta())
}
