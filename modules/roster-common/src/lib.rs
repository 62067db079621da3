pub mod config;
pub mod error;
pub mod file_config;
pub mod media;
pub mod names;
pub mod types;

pub use config::Config;
pub use error::{DecodeError, RosterError};
pub use file_config::{load_engine_config, AuditConfig, EngineConfig, PacingConfig, PhotoConfig};
pub use names::{is_plausible_name, name_tokens, normalize_name};
pub use types::*;
