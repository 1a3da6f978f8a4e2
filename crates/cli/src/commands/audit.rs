//! Decision log commands

use anyhow::Result;
use operator_lib::{PlacementEvent, ScalingEvent};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_action, color_mode, color_trend, format_percent, format_replicas, format_timestamp,
    print_records, OutputFormat,
};

/// Row for scaling events table
#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Hour")]
    hour: u32,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Row for placement events table
#[derive(Tabled)]
struct PlacementRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "Action")]
    action: String,
}

fn event_row(event: &ScalingEvent) -> EventRow {
    let d = &event.decision;
    EventRow {
        id: event.id,
        timestamp: format_timestamp(&d.timestamp),
        hour: d.hour,
        deployment: format!("{}/{}", d.namespace, d.deployment),
        replicas: format_replicas(d.target_replicas),
        reason: d.reason.clone(),
    }
}

fn placement_row(event: &PlacementEvent) -> PlacementRow {
    PlacementRow {
        timestamp: format_timestamp(&event.timestamp),
        deployment: format!("{}/{}", event.namespace, event.deployment),
        node: event.node.clone(),
        mode: color_mode(event.mode),
        battery: format_percent(event.battery_level),
        trend: color_trend(event.trend),
        threshold: format_percent(event.adjusted_threshold),
        action: color_action(event.action),
    }
}

/// Show the most recent scaling decisions
pub async fn show_events(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let events = client.events(limit).await?;
    print_records(&events, event_row, format, "No scaling decisions recorded")
}

/// Show the most recent placement decisions
pub async fn show_placements(
    client: &ApiClient,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let events = client.placements(limit).await?;
    print_records(&events, placement_row, format, "No placement decisions recorded")
}
