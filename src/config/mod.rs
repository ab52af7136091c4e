// src/config/mod.rs

pub mod loader;
pub mod model;
mod validate;

pub use loader::{default_config_path, load_and_validate};
pub use model::{ConfigFile, ExperimentEntry, RawConfigFile, ScheduleEntry};
