//! Carbon intensity windows
//!
//! This module turns a day of grid carbon intensity into the hours worth
//! running batch work in:
//! - Normalizing raw samples into one value per hour of day
//! - Selecting and ranking low-intensity windows
//! - Fetching intensity history from an external feed

mod feed;
mod normalizer;
mod window;

pub use feed::{ElectricityMapsFeed, StaticProfile, DEFAULT_ELECTRICITY_MAPS_URL};
pub use normalizer::{normalize, NormalizedSeries};
pub use window::{good_hours, select_windows, threshold, WindowPolicy};

use crate::error::Result;
use crate::models::{HourlyValue, Window, HOURS_PER_DAY};
use async_trait::async_trait;

/// Reference daily profile (gCO2eq/kWh) for the SK zone, used when no live
/// feed is configured
pub const REFERENCE_PROFILE: [f64; HOURS_PER_DAY] = [
    244.0, 219.0, 201.0, 198.0, 197.0, 196.0, 163.0, 140.0, 162.0, 176.0, 196.0, 195.0, 176.0,
    167.0, 180.0, 191.0, 190.0, 214.0, 200.0, 180.0, 181.0, 194.0, 228.0, 221.0,
];

/// Source of hourly carbon intensity samples
#[async_trait]
pub trait CarbonIntensitySource: Send + Sync {
    /// Raw samples, possibly with missing or repeated hours
    async fn hourly_intensity(&self) -> Result<Vec<HourlyValue>>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Fetch, normalize and select windows in one go
pub async fn compute_windows(
    source: &dyn CarbonIntensitySource,
    policy: &WindowPolicy,
) -> Result<Vec<Window>> {
    let samples = source.hourly_intensity().await?;
    let series = normalize(&samples)?;
    select_windows(&series, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_compute_windows_from_static_profile() {
        let windows = compute_windows(&StaticProfile::default(), &WindowPolicy::default())
            .await
            .unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!((windows[0].start, windows[0].end), (6, 9));
    }
}
