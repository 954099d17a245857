//! Engine configuration sections
//!
//! Every section uses `#[serde(default)]` so partial YAML files work.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SyncError, SyncResult};

/// Root configuration for a sync session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How score positions map onto media time
    pub sync: SyncSettings,
    /// Main cursor appearance
    pub cursor: CursorConfig,
    /// Scroll-follow behavior
    pub scroll: ScrollConfig,
    /// Raw pointer handling
    pub pointer: PointerConfig,
}

impl EngineConfig {
    /// Check every section before a session uses it
    pub fn validate(&self) -> SyncResult<()> {
        self.sync.validate()?;

        let edge = self.scroll.edge_fraction;
        if !(0.0..=0.5).contains(&edge) {
            return Err(SyncError::Config(format!(
                "scroll.edge_fraction must be within [0, 0.5] (got {})",
                edge
            )));
        }
        let non_negative = [
            ("scroll.edge_step_px", self.scroll.edge_step_px),
            ("pointer.move_throttle_ms", self.pointer.move_throttle_ms),
            ("pointer.hit_padding_px", self.pointer.hit_padding_px),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SyncError::Config(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Alignment between the score and the media clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Silence before the first score position starts (ms)
    pub dead_time_ms: f64,
    /// Time the whole score spans after the dead time (ms)
    /// 0 means "derive from the score's tempo marks".
    pub duration_ms: f64,
}

impl SyncSettings {
    pub fn new(dead_time_ms: f64, duration_ms: f64) -> Self {
        Self {
            dead_time_ms,
            duration_ms,
        }
    }

    /// Reject negative or non-finite values
    pub fn validate(&self) -> SyncResult<()> {
        for (name, value) in [("dead_time_ms", self.dead_time_ms), ("duration_ms", self.duration_ms)] {
            if !value.is_finite() || value < 0.0 {
                return Err(SyncError::InvalidSyncSettings(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Main cursor appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Color noteheads under the lagging cursor
    pub notehead_coloring: bool,
    /// Color applied to highlighted noteheads
    pub notehead_color: String,
    /// Color of the interpolated cursor line
    pub lerper_color: String,
    /// Styles applied while the clock drives the cursor
    pub default_style: BTreeMap<String, String>,
    /// Styles applied while the user drags the cursor
    pub interacting_style: BTreeMap<String, String>,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            notehead_coloring: true,
            notehead_color: "#00ffd9".to_string(),
            lerper_color: "#00ffd9".to_string(),
            default_style: BTreeMap::from([
                ("box-shadow".to_string(), "none".to_string()),
                ("opacity".to_string(), "1".to_string()),
            ]),
            interacting_style: BTreeMap::from([
                ("box-shadow".to_string(), "0 0 0 2px #00ffd9".to_string()),
                ("opacity".to_string(), "0.8".to_string()),
            ]),
        }
    }
}

/// Scroll-follow behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Resume auto-follow after a drag (otherwise scrolling stays off)
    pub autoscroll_preferred: bool,
    /// Fraction of the viewport height treated as a scroll edge while dragging
    pub edge_fraction: f64,
    /// Pixels scrolled per intent step while dragging near an edge
    pub edge_step_px: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            autoscroll_preferred: true,
            edge_fraction: 0.1,
            edge_step_px: 24.0,
        }
    }
}

/// Raw pointer handling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    /// Minimum time between forwarded move events (ms)
    pub move_throttle_ms: f64,
    /// Extra hit area around the cursor (px)
    pub hit_padding_px: f64,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            move_throttle_ms: 30.0,
            hit_padding_px: 10.0,
        }
    }
}
