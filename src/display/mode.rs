//! Cluster vs. single-marker display mode with hysteresis and a cooldown.

use instant::Instant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Whether the map renders aggregated clusters or one marker per location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Cluster,
    Single,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::Cluster => f.write_str("cluster"),
            DisplayMode::Single => f.write_str("single"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayModeConfig {
    pub single_mode_threshold: f64,
    /// Added to the threshold to get the cluster → single zoom
    pub entry_hysteresis: f64,
    /// Subtracted from the threshold to get the single → cluster zoom
    pub exit_hysteresis: f64,
    /// Minimum time between two committed switches
    pub cooldown_ms: u64,
}

impl Default for DisplayModeConfig {
    fn default() -> Self {
        Self {
            single_mode_threshold: 15.0,
            entry_hysteresis: 0.16,
            exit_hysteresis: 0.3,
            cooldown_ms: 600,
        }
    }
}

impl DisplayModeConfig {
    pub fn enter_zoom(&self) -> f64 {
        self.single_mode_threshold + self.entry_hysteresis
    }

    pub fn exit_zoom(&self) -> f64 {
        self.single_mode_threshold - self.exit_hysteresis
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Mode for a zoom seen for the first time, with no hysteresis applied
    pub fn initial_mode(&self, zoom: f64) -> DisplayMode {
        if zoom.is_finite() && zoom >= self.single_mode_threshold {
            DisplayMode::Single
        } else {
            DisplayMode::Cluster
        }
    }
}

/// Mode the zoom asks for, given the current mode.
///
/// Entry into single mode needs `zoom >= enter_zoom`, exit needs
/// `zoom <= exit_zoom`. Anything in between keeps the current mode.
pub fn resolve_requested_mode(
    zoom: f64,
    current: DisplayMode,
    config: &DisplayModeConfig,
) -> DisplayMode {
    if !zoom.is_finite() {
        return current;
    }
    match current {
        DisplayMode::Cluster if zoom >= config.enter_zoom() => DisplayMode::Single,
        DisplayMode::Single if zoom <= config.exit_zoom() => DisplayMode::Cluster,
        _ => current,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitReason {
    SameMode,
    Cooldown,
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitDecision {
    pub commit: bool,
    pub reason: CommitReason,
}

/// Decides whether a requested mode may be committed now.
///
/// `last_switch_at = None` counts as infinitely long ago.
pub fn should_commit(
    now: Instant,
    last_switch_at: Option<Instant>,
    current: DisplayMode,
    requested: DisplayMode,
    cooldown: Duration,
) -> CommitDecision {
    if requested == current {
        return CommitDecision {
            commit: false,
            reason: CommitReason::SameMode,
        };
    }

    let cooled_down = match last_switch_at {
        None => true,
        Some(at) => now.checked_duration_since(at).map_or(false, |elapsed| elapsed >= cooldown),
    };

    if cooled_down {
        CommitDecision {
            commit: true,
            reason: CommitReason::Switch,
        }
    } else {
        CommitDecision {
            commit: false,
            reason: CommitReason::Cooldown,
        }
    }
}

/// Events that may drive a mode evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTrigger {
    /// The host view finished its first layout
    ViewReady,
    /// A camera gesture or animation came to rest
    CameraSettled,
    /// The user explicitly zoomed in, e.g. by pressing a cluster
    ZoomInAction,
    /// A frame of an ongoing drag or pinch. Never commits.
    GestureTick,
}

impl ModeTrigger {
    pub fn is_discrete(&self) -> bool {
        !matches!(self, ModeTrigger::GestureTick)
    }
}

/// Display-mode state machine
#[derive(Debug, Clone)]
pub struct DisplayModeController {
    config: DisplayModeConfig,
    mode: Option<DisplayMode>,
    last_switch_at: Option<Instant>,
    switch_count: u64,
}

impl DisplayModeController {
    pub fn new(config: DisplayModeConfig) -> Self {
        Self {
            config,
            mode: None,
            last_switch_at: None,
            switch_count: 0,
        }
    }

    pub fn config(&self) -> &DisplayModeConfig {
        &self.config
    }

    /// Current mode, `Cluster` until a zoom has been observed
    pub fn mode(&self) -> DisplayMode {
        self.mode.unwrap_or(DisplayMode::Cluster)
    }

    pub fn is_initialized(&self) -> bool {
        self.mode.is_some()
    }

    pub fn last_switch_at(&self) -> Option<Instant> {
        self.last_switch_at
    }

    /// Number of committed switches since creation
    pub fn switch_count(&self) -> u64 {
        self.switch_count
    }

    /// Seeds the mode from the first known zoom. Later calls are ignored.
    pub fn initialize(&mut self, zoom: f64) -> DisplayMode {
        if self.mode.is_none() {
            let mode = self.config.initial_mode(zoom);
            log::debug!("display mode initialized to {} at zoom {:.2}", mode, zoom);
            self.mode = Some(mode);
        }
        self.mode()
    }

    /// Evaluates the zoom on a trigger and commits a switch if allowed.
    ///
    /// Returns `None` for continuous triggers, which never touch the mode.
    pub fn evaluate(
        &mut self,
        trigger: ModeTrigger,
        zoom: f64,
        now: Instant,
    ) -> Option<CommitDecision> {
        if !trigger.is_discrete() {
            return None;
        }
        if self.mode.is_none() {
            self.initialize(zoom);
            return Some(CommitDecision {
                commit: false,
                reason: CommitReason::SameMode,
            });
        }

        let current = self.mode();
        let requested = resolve_requested_mode(zoom, current, &self.config);
        let decision = should_commit(
            now,
            self.last_switch_at,
            current,
            requested,
            self.config.cooldown(),
        );

        match decision.reason {
            CommitReason::Switch => {
                log::debug!(
                    "display mode {} -> {} at zoom {:.2} ({:?})",
                    current,
                    requested,
                    zoom,
                    trigger
                );
                self.mode = Some(requested);
                self.last_switch_at = Some(now);
                self.switch_count += 1;
            }
            CommitReason::Cooldown => {
                log::trace!("display mode switch to {} held back by cooldown", requested);
            }
            CommitReason::SameMode => {}
        }

        Some(decision)
    }

    /// Forgets the mode so the next zoom re-seeds it
    pub fn reset(&mut self) {
        self.mode = None;
        self.last_switch_at = None;
    }
}

impl Default for DisplayModeController {
    fn default() -> Self {
        Self::new(DisplayModeConfig::default())
    }
}
