pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::{ApiConfig, PanelConfig, PolicyOverrides, ServerEntry, WatchConfig, WatchSection};
pub use duration::{format_duration, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
