#![allow(missing_docs)]

pub mod catalog;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod logging;
pub mod presets;
pub mod simulate;

pub use config::ConsoleConfig;
pub use presets::{Preset, PresetError};
pub use simulate::SimulatedCreate;
