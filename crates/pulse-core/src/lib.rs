pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::{CheckConfig, EngineConfig, EngineSettings, PulseConfig};
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use types::*;
