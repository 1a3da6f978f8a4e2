//! Hour-of-day normalization
//!
//! Folds raw `(hour, value)` samples into one value per hour of the day.
//! Duplicate hours are averaged; missing hours are filled by linear
//! interpolation between the nearest known neighbours, walking around
//! midnight when needed.

use crate::error::{OperatorError, Result};
use crate::models::{HourlyValue, HOURS_PER_DAY};

/// Exactly one value per hour of the day, indexed by hour
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    values: [f64; HOURS_PER_DAY],
}

impl NormalizedSeries {
    /// Build directly from 24 values, index = hour
    pub fn from_values(values: [f64; HOURS_PER_DAY]) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64; HOURS_PER_DAY] {
        &self.values
    }

    pub fn get(&self, hour: u32) -> f64 {
        self.values[hour as usize % HOURS_PER_DAY]
    }

    /// Series as hour-sorted `HourlyValue`s
    pub fn to_hourly(&self) -> Vec<HourlyValue> {
        self.values
            .iter()
            .enumerate()
            .map(|(hour, value)| HourlyValue::new(hour as u32, *value))
            .collect()
    }
}

/// Normalize raw samples into a 24-slot series
pub fn normalize(samples: &[HourlyValue]) -> Result<NormalizedSeries> {
    let mut sums = [0.0f64; HOURS_PER_DAY];
    let mut counts = [0usize; HOURS_PER_DAY];

    for sample in samples {
        if sample.hour as usize >= HOURS_PER_DAY {
            return Err(OperatorError::InvalidInput(format!(
                "hour {} is outside 0..=23",
                sample.hour
            )));
        }
        if !sample.value.is_finite() {
            continue;
        }
        sums[sample.hour as usize] += sample.value;
        counts[sample.hour as usize] += 1;
    }

    let known: Vec<Option<f64>> = sums
        .iter()
        .zip(counts.iter())
        .map(|(sum, count)| (*count > 0).then(|| sum / *count as f64))
        .collect();

    if known.iter().all(Option::is_none) {
        return Err(OperatorError::MissingData(
            "no hourly samples to normalize".to_string(),
        ));
    }

    let mut values = [0.0f64; HOURS_PER_DAY];
    for hour in 0..HOURS_PER_DAY {
        values[hour] = match known[hour] {
            Some(v) => v,
            None => interpolate(&known, hour),
        };
    }

    Ok(NormalizedSeries { values })
}

/// Fill a gap from the closest known hours on either side (circular)
fn interpolate(known: &[Option<f64>], hour: usize) -> f64 {
    let (back, prev) = (1..HOURS_PER_DAY)
        .find_map(|d| known[(hour + HOURS_PER_DAY - d) % HOURS_PER_DAY].map(|v| (d, v)))
        .unwrap_or((0, 0.0));
    let (ahead, next) = (1..HOURS_PER_DAY)
        .find_map(|d| known[(hour + d) % HOURS_PER_DAY].map(|v| (d, v)))
        .unwrap_or((0, prev));

    if back + ahead == 0 {
        return prev;
    }
    prev + (next - prev) * back as f64 / (back + ahead) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_day(f: impl Fn(u32) -> f64) -> Vec<HourlyValue> {
        (0..24).map(|h| HourlyValue::new(h, f(h))).collect()
    }

    #[test]
    fn test_complete_series_passes_through_sorted() {
        let mut samples = full_day(|h| 100.0 + h as f64);
        samples.reverse();

        let series = normalize(&samples).unwrap();
        assert_eq!(series.get(0), 100.0);
        assert_eq!(series.get(23), 123.0);
        assert_eq!(series.to_hourly()[5], HourlyValue::new(5, 105.0));
    }

    #[test]
    fn test_duplicate_hours_are_averaged() {
        let mut samples = full_day(|_| 200.0);
        samples.push(HourlyValue::new(7, 100.0));

        let series = normalize(&samples).unwrap();
        assert_eq!(series.get(7), 150.0);
        assert_eq!(series.get(8), 200.0);
    }

    #[test]
    fn test_missing_hour_is_interpolated() {
        let samples: Vec<HourlyValue> = full_day(|h| h as f64 * 10.0)
            .into_iter()
            .filter(|s| s.hour != 5 && s.hour != 6)
            .collect();

        let series = normalize(&samples).unwrap();
        // neighbours are 40 (hour 4) and 70 (hour 7)
        assert!((series.get(5) - 50.0).abs() < 1e-9);
        assert!((series.get(6) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_hours_interpolate_across_midnight() {
        let samples = vec![HourlyValue::new(22, 100.0), HourlyValue::new(2, 200.0)];

        let series = normalize(&samples).unwrap();
        // 22 -> 2 spans four steps
        assert!((series.get(0) - 150.0).abs() < 1e-9);
        assert!((series.get(23) - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_fills_whole_day() {
        let series = normalize(&[HourlyValue::new(12, 321.0)]).unwrap();
        assert!(series.values().iter().all(|v| *v == 321.0));
    }

    #[test]
    fn test_empty_input_is_missing_data() {
        assert!(matches!(
            normalize(&[]),
            Err(OperatorError::MissingData(_))
        ));
    }

    #[test]
    fn test_out_of_range_hour_is_rejected() {
        assert!(matches!(
            normalize(&[HourlyValue::new(24, 1.0)]),
            Err(OperatorError::InvalidInput(_))
        ));
    }
}
