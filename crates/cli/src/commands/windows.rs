//! Optimal window commands

use anyhow::{Context, Result};
use colored::Colorize;
use operator_lib::carbon::{normalize, select_windows, threshold, WindowPolicy};
use operator_lib::{HourlyValue, Window, HOURS_PER_DAY};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{format_window, print_info, print_records, OutputFormat};

/// Row for windows table
#[derive(Tabled)]
struct WindowRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Hours (UTC)")]
    hours: String,
    #[tabled(rename = "Length")]
    length: u32,
    #[tabled(rename = "Avg gCO2eq/kWh")]
    avg_intensity: String,
}

fn window_rows(windows: &[Window]) -> Vec<(usize, Window)> {
    windows.iter().cloned().enumerate().map(|(i, w)| (i + 1, w)).collect()
}

fn print_windows(windows: &[Window], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(windows)?);
            Ok(())
        }
        OutputFormat::Table => print_records(
            &window_rows(windows),
            |(rank, w)| WindowRow {
                rank: *rank,
                hours: format_window(w),
                length: w.length,
                avg_intensity: format!("{:.0}", w.avg_intensity),
            },
            format,
            "No optimal windows",
        ),
    }
}

/// Show the windows the operator stored for a date
pub async fn show_windows(client: &ApiClient, date: Option<String>, format: OutputFormat) -> Result<()> {
    let set = client.windows(date.as_deref()).await?;

    if let OutputFormat::Table = format {
        println!("{} {}", "Optimal windows for".bold(), set.date.cyan());
    }
    print_windows(&set.windows, format)
}

/// Parse `v0,v1,...` into hourly samples; blank entries are missing hours
pub fn parse_intensities(input: &str) -> Result<Vec<HourlyValue>> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    if parts.len() > HOURS_PER_DAY {
        anyhow::bail!("expected at most {} values, got {}", HOURS_PER_DAY, parts.len());
    }

    let mut samples = Vec::with_capacity(parts.len());
    for (hour, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        let value: f64 = part
            .parse()
            .with_context(|| format!("invalid intensity for hour {}: {}", hour, part))?;
        samples.push(HourlyValue::new(hour as u32, value));
    }
    Ok(samples)
}

/// Compute windows offline from a list of hourly intensities
pub fn plan(intensities: &str, policy: &WindowPolicy, format: OutputFormat) -> Result<()> {
    let samples = parse_intensities(intensities)?;
    let series = normalize(&samples)?;
    let windows = select_windows(&series, policy)?;

    if let OutputFormat::Table = format {
        print_info(&format!(
            "Threshold at the {}th percentile: {:.0} gCO2eq/kWh",
            policy.percentile,
            threshold(&series, policy.percentile)
        ));
    }
    print_windows(&windows, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_intensities_skips_blank_hours() {
        let samples = parse_intensities("100, 120,,90").unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].hour, 3);
        assert_eq!(samples[2].value, 90.0);
    }

    #[test]
    fn test_parse_intensities_rejects_garbage() {
        assert!(parse_intensities("100,abc").is_err());
        let too_many = vec!["1"; 25].join(",");
        assert!(parse_intensities(&too_many).is_err());
    }

    #[test]
    fn test_plan_reference_profile() {
        let values = operator_lib::carbon::REFERENCE_PROFILE
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        assert!(plan(&values, &WindowPolicy::default(), OutputFormat::Json).is_ok());
    }
}
