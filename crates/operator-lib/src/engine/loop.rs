//! Control loop
//!
//! Runs one controller on a fixed cadence: node-affinity passes every
//! `placement_interval`, queue-scaling checks every `scaling_interval`
//! aligned to the top of the hour. A shutdown signal is only observed
//! between passes, so the pass in flight always completes.

use super::EngineMode;
use crate::error::{OperatorError, Result};
use crate::health::{components, ComponentHealth, HealthRegistry};
use crate::models::ScalingDecision;
use crate::observability::OperatorMetrics;
use crate::placement::{PlacementController, PlacementReport};
use crate::scaling::ScalingController;
use chrono::{DateTime, Timelike, Utc};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Loop cadence
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between node-affinity passes (default: 60 seconds)
    pub placement_interval: Duration,
    /// Time between scaling checks (default: one hour)
    pub scaling_interval: Duration,
    /// Start scaling checks on the next full hour instead of one interval out
    pub align_to_hour: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            placement_interval: Duration::from_secs(60),
            scaling_interval: Duration::from_secs(3600),
            align_to_hour: true,
        }
    }
}

/// What a single pass produced
#[derive(Debug)]
pub enum PassOutcome {
    Placement(PlacementReport),
    Scaling(ScalingDecision),
    Failed(OperatorError),
}

impl PassOutcome {
    /// Whether the loop has to stop after this pass
    pub fn is_fatal(&self) -> bool {
        matches!(self, PassOutcome::Failed(e) if is_fatal(e))
    }
}

fn is_fatal(error: &OperatorError) -> bool {
    matches!(error, OperatorError::Store(e) if e.is_fatal())
}

/// Time left until the next full hour
pub fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let elapsed = u64::from(now.minute()) * 60 + u64::from(now.second());
    let nanos = u64::from(now.nanosecond().min(999_999_999));
    Duration::from_secs(3600 - elapsed).saturating_sub(Duration::from_nanos(nanos))
}

/// Drives one controller until shutdown
pub struct ControlLoop {
    mode: EngineMode,
    placement: Option<PlacementController>,
    scaling: Option<ScalingController>,
    health: HealthRegistry,
    config: LoopConfig,
    metrics: OperatorMetrics,
}

impl ControlLoop {
    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    /// Run until a shutdown signal arrives or a fatal error occurs
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let period = match self.mode {
            EngineMode::NodeAffinity => self.config.placement_interval,
            EngineMode::QueueScaling => self.config.scaling_interval,
        };
        info!(
            mode = %self.mode,
            interval_secs = period.as_secs(),
            "Starting control loop"
        );

        let first_tick = match self.mode {
            EngineMode::NodeAffinity => Duration::ZERO,
            EngineMode::QueueScaling => {
                self.startup().await?;
                if self.config.align_to_hour {
                    until_next_hour(Utc::now())
                } else {
                    period
                }
            }
        };

        let mut ticker = interval_at(Instant::now() + first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pass_count = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    pass_count += 1;
                    if let PassOutcome::Failed(e) = self.tick(Utc::now()).await {
                        if is_fatal(&e) {
                            error!(mode = %self.mode, error = %e, "Stopping control loop");
                            return Err(e);
                        }
                    }
                    debug!(mode = %self.mode, passes = pass_count, "Pass complete");
                }
                _ = shutdown.recv() => {
                    info!(mode = %self.mode, passes = pass_count, "Shutting down control loop");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Fetch today's windows and run one check right away
    async fn startup(&self) -> Result<()> {
        if let Some(scaling) = &self.scaling {
            if let Err(e) = scaling.refresh_windows(Utc::now()).await {
                if is_fatal(&e) {
                    self.mark_stopped(&e).await;
                    return Err(e);
                }
                warn!(error = %e, "Initial window fetch failed");
                self.health
                    .set_degraded(e.component(), e.to_string())
                    .await;
            }
        }
        match self.tick(Utc::now()).await {
            PassOutcome::Failed(e) if is_fatal(&e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Run one pass for `now` and fold its outcome into health and metrics
    pub async fn tick(&self, now: DateTime<Utc>) -> PassOutcome {
        let start = Instant::now();

        let outcome = match (self.mode, &self.placement, &self.scaling) {
            (EngineMode::NodeAffinity, Some(placement), _) => match placement.run_pass(now).await {
                Ok(report) => PassOutcome::Placement(report),
                Err(e) => PassOutcome::Failed(e),
            },
            (EngineMode::QueueScaling, _, Some(scaling)) => match scaling.hourly_check(now).await {
                Ok(decision) => PassOutcome::Scaling(decision),
                Err(e) => PassOutcome::Failed(e),
            },
            (mode, _, _) => PassOutcome::Failed(OperatorError::Config(format!(
                "no controller configured for {} mode",
                mode
            ))),
        };

        self.metrics
            .observe_pass_latency(self.mode.as_str(), start.elapsed().as_secs_f64());
        self.record_health(&outcome).await;
        outcome
    }

    async fn mark_stopped(&self, error: &OperatorError) {
        self.health
            .set_unhealthy(error.component(), error.to_string())
            .await;
        self.health
            .set_unhealthy(components::ENGINE, format!("{} loop stopped", self.mode))
            .await;
    }

    async fn record_health(&self, outcome: &PassOutcome) {
        match outcome {
            PassOutcome::Placement(report) => {
                let failures: Vec<_> = report.failures().collect();
                let last_error = failures.last().map(|(_, e)| e.to_string());
                self.health
                    .update(
                        components::CLUSTER,
                        ComponentHealth::from_failures(
                            failures.len(),
                            report.outcomes.len(),
                            last_error.as_deref(),
                        ),
                    )
                    .await;

                if report.missing_battery.is_empty() {
                    self.health.set_healthy(components::TELEMETRY).await;
                } else {
                    self.health
                        .set_degraded(
                            components::TELEMETRY,
                            format!(
                                "{} node checks had no battery data",
                                report.missing_battery.len()
                            ),
                        )
                        .await;
                }
                self.health.set_healthy(components::ENGINE).await;
            }
            PassOutcome::Scaling(_) => {
                for component in [components::CLUSTER, components::QUEUE, components::CARBON_FEED] {
                    self.health.set_healthy(component).await;
                }
                self.health.set_healthy(components::ENGINE).await;
            }
            PassOutcome::Failed(e) if is_fatal(e) => self.mark_stopped(e).await,
            PassOutcome::Failed(e) => {
                warn!(mode = %self.mode, error = %e, "Pass failed");
                self.health.set_degraded(e.component(), e.to_string()).await;
            }
        }
    }
}

/// Builder for a [`ControlLoop`]
pub struct ControlLoopBuilder {
    mode: EngineMode,
    placement: Option<PlacementController>,
    scaling: Option<ScalingController>,
    health: Option<HealthRegistry>,
    config: LoopConfig,
}

impl ControlLoopBuilder {
    pub fn new(mode: EngineMode) -> Self {
        Self {
            mode,
            placement: None,
            scaling: None,
            health: None,
            config: LoopConfig::default(),
        }
    }

    pub fn placement(mut self, controller: PlacementController) -> Self {
        self.placement = Some(controller);
        self
    }

    pub fn scaling(mut self, controller: ScalingController) -> Self {
        self.scaling = Some(controller);
        self
    }

    /// Registry the loop reports component health to
    pub fn health(mut self, registry: HealthRegistry) -> Self {
        self.health = Some(registry);
        self
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn placement_interval(mut self, interval: Duration) -> Self {
        self.config.placement_interval = interval;
        self
    }

    pub fn scaling_interval(mut self, interval: Duration) -> Self {
        self.config.scaling_interval = interval;
        self
    }

    pub fn align_to_hour(mut self, align: bool) -> Self {
        self.config.align_to_hour = align;
        self
    }

    pub fn build(self) -> anyhow::Result<ControlLoop> {
        match self.mode {
            EngineMode::NodeAffinity if self.placement.is_none() => {
                return Err(anyhow::anyhow!("Placement controller is required"));
            }
            EngineMode::QueueScaling if self.scaling.is_none() => {
                return Err(anyhow::anyhow!("Scaling controller is required"));
            }
            _ => {}
        }

        for (name, interval) in [
            ("placement_interval", self.config.placement_interval),
            ("scaling_interval", self.config.scaling_interval),
        ] {
            if interval.is_zero() {
                return Err(anyhow::anyhow!("{} must be greater than zero", name));
            }
        }

        Ok(ControlLoop {
            mode: self.mode,
            placement: self.placement,
            scaling: self.scaling,
            health: self.health.unwrap_or_default(),
            config: self.config,
            metrics: OperatorMetrics::new(),
        })
    }
}
