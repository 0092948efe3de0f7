// ProgressReporter - fraction, speed and ETA from raw byte counts
//
// Pure calculator: no clock, no throttling. The caller passes the time elapsed
// since its previous call.

use std::time::Duration;

use super::models::ProgressSample;
use super::utils::format_size;

#[derive(Debug, Default)]
pub struct ProgressReporter {
    last_transferred: u64,
    last_fraction: Option<f64>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(
        &mut self,
        transferred: u64,
        total: Option<u64>,
        elapsed_since_last: Duration,
    ) -> ProgressSample {
        let total = total.filter(|t| *t > 0);

        let fraction = total.map(|t| (transferred as f64 / t as f64).min(1.0));
        let fraction = match (fraction, self.last_fraction) {
            (Some(f), Some(prev)) => Some(f.max(prev)),
            (f, _) => f,
        };

        let secs = elapsed_since_last.as_secs_f64();
        let speed = if secs > 0.0 {
            let delta = transferred.saturating_sub(self.last_transferred);
            Some(delta as f64 / secs)
        } else {
            None
        };

        let eta = match (speed, total) {
            (Some(s), Some(t)) if s > 0.0 => {
                let remaining = t.saturating_sub(transferred);
                Some((remaining as f64 / s).round() as u64)
            }
            _ => None,
        };

        self.last_transferred = transferred;
        if fraction.is_some() {
            self.last_fraction = fraction;
        }

        ProgressSample {
            fraction,
            transferred_bytes: transferred,
            total_bytes: total,
            speed_bytes_per_sec: speed,
            eta_seconds: eta,
        }
    }
}

/// `m:ss`, or `--:--` when unknown
pub fn format_eta(eta_seconds: Option<u64>) -> String {
    match eta_seconds {
        Some(eta) => format!("{}:{:02}", eta / 60, eta % 60),
        None => "--:--".to_string(),
    }
}

pub fn format_speed(speed: Option<f64>) -> String {
    match speed {
        Some(s) if s > 0.0 => format!("{}/s", format_size(s)),
        _ => "-- B/s".to_string(),
    }
}

/// "Speed: <rate> | ETA: <eta>"
pub fn status_line(sample: &ProgressSample) -> String {
    format!(
        "Speed: {} | ETA: {}",
        format_speed(sample.speed_bytes_per_sec),
        format_eta(sample.eta_seconds)
    )
}
