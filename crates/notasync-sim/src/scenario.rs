//! Scenario files
//!
//! ```yaml
//! score:
//!   uniform: { positions: 16, beats_each: 1, bpm: 60 }
//! viewport: { width: 800, height: 300 }
//! run_ms: 20000
//! loop_ms: [0, 4000]
//! script:
//!   - { at_ms: 500, action: down, x: 45, y: 40 }
//!   - { at_ms: 700, action: up, x: 300, y: 40 }
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use notasync_core::config::read_config;
use notasync_core::headless::ScriptedScore;

/// Either an explicit score or a generated one
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScoreSource {
    Uniform { uniform: UniformScore },
    Scripted(ScriptedScore),
}

impl ScoreSource {
    pub fn build(&self) -> ScriptedScore {
        match self {
            ScoreSource::Uniform { uniform } => {
                ScriptedScore::uniform(uniform.positions, uniform.beats_each, uniform.bpm)
            }
            ScoreSource::Scripted(score) => score.clone(),
        }
    }
}

/// Evenly spaced single-note positions
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UniformScore {
    pub positions: usize,
    #[serde(default = "default_beats_each")]
    pub beats_each: f64,
    #[serde(default = "default_bpm")]
    pub bpm: f64,
}

fn default_beats_each() -> f64 {
    1.0
}

fn default_bpm() -> f64 {
    notasync_core::score::DEFAULT_BPM
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 300.0,
        }
    }
}

/// Scripted host input
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    /// The user scrolls the container
    Scroll { top: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScriptStep {
    /// Simulation time the step fires at
    pub at_ms: f64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub score: ScoreSource,
    #[serde(default)]
    pub viewport: Viewport,
    /// Simulated wall time to run for
    #[serde(default = "default_run_ms")]
    pub run_ms: f64,
    /// Frame interval
    #[serde(default = "default_tick_ms")]
    pub tick_ms: f64,
    /// Start the clock playing
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    /// Loop range activated before playback starts
    #[serde(default)]
    pub loop_ms: Option<[f64; 2]>,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

fn default_run_ms() -> f64 {
    10_000.0
}

fn default_tick_ms() -> f64 {
    16.0
}

fn default_autoplay() -> bool {
    true
}

impl Scenario {
    /// Read, parse and check a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let mut scenario: Scenario =
            read_config(path).with_context(|| format!("Failed to load scenario {:?}", path))?;
        scenario.validate()?;
        scenario.script.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        log::info!(
            "Scenario::load: {:?} ({} script steps, {:.0} ms)",
            path,
            scenario.script.len(),
            scenario.run_ms
        );
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tick_ms.is_finite() && self.tick_ms > 0.0) {
            bail!("tick_ms must be positive (got {})", self.tick_ms);
        }
        if !(self.run_ms.is_finite() && self.run_ms >= 0.0) {
            bail!("run_ms must be non-negative (got {})", self.run_ms);
        }
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            bail!("viewport must have a positive size");
        }
        Ok(())
    }
}
