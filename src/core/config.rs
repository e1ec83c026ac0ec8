//! Tunable configuration for the marker pipeline.
//!
//! Options can be picked from device-class presets through [`PerformanceProfile`]
//! or loaded from JSON and validated before use.

use crate::{
    display::mode::DisplayModeConfig,
    labels::selector::{BudgetTier, LabelPolicy},
    pipeline::throttle::ThrottleConfig,
    render::{pool::PoolConfig, sprites::SpriteConfig},
    spatial::{clustering::ClusteringConfig, culling::CullingConfig},
    MarkerError, Result,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceProfile {
    Balanced,
    LowEnd,
    HighEnd,
    Custom(PipelineOptions),
}

impl PerformanceProfile {
    pub fn resolve(&self) -> PipelineOptions {
        match self {
            Self::Balanced => PipelineOptions::default(),
            Self::LowEnd => PipelineOptions {
                clustering: ClusteringConfig {
                    radius_px: 72.0,
                    max_indexed_points: 8_000,
                    ..ClusteringConfig::default()
                },
                culling: CullingConfig { padding_ratio: 0.25 },
                labels: LabelPolicy {
                    budget_tiers: vec![
                        BudgetTier {
                            min_zoom: 15.0,
                            budget: 4,
                        },
                        BudgetTier {
                            min_zoom: 16.0,
                            budget: 6,
                        },
                        BudgetTier {
                            min_zoom: 17.0,
                            budget: 10,
                        },
                    ],
                    max_eligible_markers: 60,
                    ..LabelPolicy::default()
                },
                pool: PoolConfig { pool_size: 40 },
                throttle: ThrottleConfig {
                    gesture_interval_ms: 200,
                },
                sprites: SpriteConfig {
                    cache_capacity: 128,
                    max_prefetch_per_frame: 6,
                    ..SpriteConfig::default()
                },
                ..PipelineOptions::default()
            },
            Self::HighEnd => PipelineOptions {
                clustering: ClusteringConfig {
                    radius_px: 50.0,
                    max_indexed_points: 50_000,
                    ..ClusteringConfig::default()
                },
                culling: CullingConfig { padding_ratio: 0.75 },
                labels: LabelPolicy {
                    budget_tiers: vec![
                        BudgetTier {
                            min_zoom: 15.0,
                            budget: 8,
                        },
                        BudgetTier {
                            min_zoom: 16.0,
                            budget: 14,
                        },
                        BudgetTier {
                            min_zoom: 17.0,
                            budget: 24,
                        },
                    ],
                    max_eligible_markers: 200,
                    ..LabelPolicy::default()
                },
                pool: PoolConfig { pool_size: 120 },
                throttle: ThrottleConfig {
                    gesture_interval_ms: 60,
                },
                sprites: SpriteConfig {
                    cache_capacity: 2048,
                    max_prefetch_per_frame: 32,
                    ..SpriteConfig::default()
                },
                ..PipelineOptions::default()
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Camera move issued when the user presses a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterPressConfig {
    pub animation_ms: u64,
    /// Extra span around the members, as a fraction of their extent
    pub padding_ratio: f64,
    /// The target zoom is at least this much deeper than the current one
    pub min_zoom_step: f64,
    /// Smallest region span in degrees, so co-located members do not zoom to max
    pub min_span_deg: f64,
}

impl Default for ClusterPressConfig {
    fn default() -> Self {
        Self {
            animation_ms: 350,
            padding_ratio: 0.3,
            min_zoom_step: 1.0,
            min_span_deg: 0.002,
        }
    }
}

impl ClusterPressConfig {
    pub fn animation(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }
}

/// All pipeline options in one serializable document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineOptions {
    pub clustering: ClusteringConfig,
    pub culling: CullingConfig,
    pub display_mode: DisplayModeConfig,
    pub labels: LabelPolicy,
    pub pool: PoolConfig,
    pub throttle: ThrottleConfig,
    pub sprites: SpriteConfig,
    pub cluster_press: ClusterPressConfig,
    /// Deadline for one batch of native projection queries
    pub projection_timeout_ms: u64,
}

impl PipelineOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn projection_timeout(&self) -> Duration {
        if self.projection_timeout_ms == 0 {
            Duration::from_millis(250)
        } else {
            Duration::from_millis(self.projection_timeout_ms)
        }
    }

    pub fn validate(&self) -> Result<()> {
        fn fail(message: impl Into<String>) -> Result<()> {
            Err(MarkerError::Config(message.into()))
        }

        let c = &self.clustering;
        if !c.radius_px.is_finite() || c.radius_px <= 0.0 {
            return fail(format!("clustering.radius_px must be positive, got {}", c.radius_px));
        }
        if c.attach_factor < 0.0 || c.pair_factor < 0.0 || c.overlap_factor < 0.0 {
            return fail("clustering factors must not be negative");
        }
        if !self.culling.padding_ratio.is_finite() || self.culling.padding_ratio < 0.0 {
            return fail("culling.padding_ratio must not be negative");
        }

        let d = &self.display_mode;
        if d.entry_hysteresis < 0.0 || d.exit_hysteresis < 0.0 {
            return fail("display_mode hysteresis must not be negative");
        }
        if d.exit_zoom() >= d.enter_zoom() {
            return fail(format!(
                "display_mode exit zoom {} must lie below enter zoom {}",
                d.exit_zoom(),
                d.enter_zoom()
            ));
        }

        let l = &self.labels;
        if l.min_label_width_px > l.max_label_width_px {
            return fail("labels.min_label_width_px exceeds max_label_width_px");
        }
        if l.char_width_px <= 0.0 || l.label_height_px <= 0.0 {
            return fail("labels text metrics must be positive");
        }
        if l.gap_px < 0.0 || l.screen_margin_px < 0.0 {
            return fail("labels gap and margin must not be negative");
        }

        if self.pool.pool_size == 0 {
            return fail("pool.pool_size must be at least 1");
        }
        if self.sprites.cluster_tiers.is_empty() {
            return fail("sprites.cluster_tiers must not be empty");
        }
        Ok(())
    }
}
