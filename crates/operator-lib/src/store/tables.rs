//! redb table definitions for the decision store.
//!
//! Values are JSON-serialized models. Events are keyed by a monotonically
//! increasing sequence number so the newest entries sit at the end.

use redb::TableDefinition;

/// `DailyWindowSet` keyed by calendar date `YYYY-MM-DD`.
pub const WINDOWS: TableDefinition<&str, &[u8]> = TableDefinition::new("windows");

/// `ScalingDecision` keyed by sequence number.
pub const SCALING_EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("scaling_events");

/// `PlacementEvent` keyed by sequence number.
pub const PLACEMENT_EVENTS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("placement_events");
