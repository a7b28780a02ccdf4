//! Generator configuration (TOML file, `REGEN_*` environment variables)

pub mod defaults;
mod settings;

pub use settings::*;
