//! Optimal execution window selection
//!
//! Picks the hours whose carbon intensity is at or below an order-statistic
//! threshold and groups them into contiguous windows, ranked from cleanest
//! to dirtiest.
//!
//! The threshold is `sorted[floor(24 * percentile / 100)]`, a plain index
//! into the sorted values rather than an interpolated percentile. Hour 23
//! and hour 0 are adjacent: when separate windows end at 23 and start at 0,
//! a merged window spanning midnight is added next to them.

use super::NormalizedSeries;
use crate::error::{OperatorError, Result};
use crate::models::{Window, HOURS_PER_DAY};
use serde::{Deserialize, Serialize};

/// Knobs for window selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowPolicy {
    /// Order-statistic cut in percent (0..=100)
    pub percentile: u32,
    /// Shortest run of good hours that becomes a window
    pub min_run_length: u32,
    /// Maximum number of windows returned
    pub max_windows: usize,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            percentile: 30,
            min_run_length: 2,
            max_windows: 3,
        }
    }
}

impl WindowPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.percentile > 100 {
            return Err(OperatorError::InvalidInput(format!(
                "percentile {} is above 100",
                self.percentile
            )));
        }
        if self.min_run_length == 0 {
            return Err(OperatorError::InvalidInput(
                "min_run_length must be at least 1".to_string(),
            ));
        }
        if self.max_windows == 0 {
            return Err(OperatorError::InvalidInput(
                "max_windows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Intensity value at the given order-statistic cut
pub fn threshold(series: &NormalizedSeries, percentile: u32) -> f64 {
    let mut sorted = *series.values();
    sorted.sort_by(f64::total_cmp);

    let index = (HOURS_PER_DAY * percentile as usize / 100).min(HOURS_PER_DAY - 1);
    sorted[index]
}

/// Which hours are at or below the threshold for `percentile`
pub fn good_hours(series: &NormalizedSeries, percentile: u32) -> [bool; HOURS_PER_DAY] {
    let cut = threshold(series, percentile);
    let mut good = [false; HOURS_PER_DAY];
    for (hour, value) in series.values().iter().enumerate() {
        good[hour] = *value <= cut;
    }
    good
}

/// Select and rank the low-intensity windows of a day
pub fn select_windows(series: &NormalizedSeries, policy: &WindowPolicy) -> Result<Vec<Window>> {
    policy.validate()?;

    let good = good_hours(series, policy.percentile);
    let mut windows = Vec::new();
    let mut run: Vec<u32> = Vec::new();

    // Slot 24 stands for hour 0 of the next day. It always closes the run
    // still open at hour 23; joining that run with the one starting at
    // hour 0 is left to the midnight merge below.
    for slot in 0..=HOURS_PER_DAY {
        let is_good = slot < HOURS_PER_DAY && good[slot];
        if is_good {
            run.push(slot as u32);
            continue;
        }
        if !run.is_empty() {
            if run.len() as u32 >= policy.min_run_length {
                windows.push(build_window(series, &run));
            }
            run.clear();
        }
    }

    if good[HOURS_PER_DAY - 1] && good[0] {
        if let Some(merged) = merge_across_midnight(series, &windows) {
            windows.push(merged);
        }
    }

    windows.sort_by(|a, b| a.avg_intensity.total_cmp(&b.avg_intensity));
    windows.truncate(policy.max_windows);
    Ok(windows)
}

fn merge_across_midnight(series: &NormalizedSeries, windows: &[Window]) -> Option<Window> {
    let last = HOURS_PER_DAY as u32 - 1;
    let evening = windows.iter().find(|w| w.end == last)?;
    let morning = windows.iter().find(|w| w.start == 0)?;

    // A single run covering the whole day has nothing to merge with.
    if evening.start == 0 {
        return None;
    }

    let mut hours = evening.hours();
    hours.extend(morning.hours());
    let mut merged = build_window(series, &hours);
    merged.start = evening.start;
    merged.end = morning.end;
    Some(merged)
}

fn build_window(series: &NormalizedSeries, hours: &[u32]) -> Window {
    let total: f64 = hours.iter().map(|h| series.get(*h)).sum();
    Window {
        start: hours[0],
        end: hours[hours.len() - 1],
        avg_intensity: (total / hours.len() as f64).round(),
        length: hours.len() as u32,
    }
}
