//! Notasync Sim - headless run of a sync scenario
//!
//! ## Usage
//!
//! ```text
//! notasync-sim [SCENARIO.yaml] [--config CONFIG.yaml]
//! ```
//!
//! Without a scenario, `demos/etude.yaml` is played. Without `--config`, the
//! engine configuration is read from the user config dir (defaults if absent).
//! Set `RUST_LOG=debug` to log every dispatched event.

use std::path::PathBuf;

use anyhow::Result;

use notasync_core::config::{default_config_path, load_config, EngineConfig};
use notasync_sim::{run, Scenario};

const DEFAULT_SCENARIO: &str = "demos/etude.yaml";

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let scenario_path = args
        .iter()
        .enumerate()
        .find(|(i, arg)| !arg.starts_with("--") && (*i == 0 || args[i - 1] != "--config"))
        .map(|(_, arg)| PathBuf::from(arg))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCENARIO));

    log::info!("notasync-sim starting up");
    let config: EngineConfig = load_config(&config_path);
    let scenario = Scenario::load(&scenario_path)?;

    let report = run(&scenario, config)?;

    println!("Scenario:      {}", scenario_path.display());
    println!("Frames:        {}", report.frames);
    println!("Clock:         {:.1} ms", report.final_clock_ms);
    match report.final_pointer {
        Some(index) => println!("Cursor:        pointer {}", index),
        None => println!("Cursor:        outside the score"),
    }
    println!("Scroll top:    {:.1} px", report.final_scroll_top);
    println!("Loop active:   {}", report.loop_active);
    println!("Clock seeks:   {}", report.seeks.len());
    println!();
    println!("Events:");
    for (name, count) in &report.event_counts {
        println!("  {:<24} {}", name, count);
    }

    Ok(())
}
