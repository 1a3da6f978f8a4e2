//! Energy-aware placement
//!
//! Steers active deployments onto solar nodes whose batteries are healthy
//! and keeps them off nodes whose batteries are running low.

mod affinity;
mod controller;


pub use affinity::{
    apply_intent, avoid_patch, clear_patch, plan, prefer_patch, AffinityPlan, AffinityState,
};
pub use controller::{PlacementConfig, PlacementController, PlacementOutcome, PlacementReport};
