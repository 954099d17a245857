//! Configuration for notasync sessions
//!
//! - Generic YAML config loading/saving
//! - Engine settings (sync alignment, cursor styling, scrolling, pointer input)
//! - Standard config paths
//!
//! # Usage
//!
//! ```ignore
//! use notasync_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path());
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use settings::{CursorConfig, EngineConfig, PointerConfig, ScrollConfig, SyncSettings};
