//! Configuration loading: profiles, walker settings, classification rules,
//! graph limits and logging.

pub mod loader;
pub mod types;

pub use loader::{ConfigError, ConfigLoader, default_config_path};
pub use types::{
    ClassifyRuleConfig, ConfigFile, DEFAULT_INDEX_PATH, GraphConfig, LoggingConfig, Profile,
    ResolvedConfig, SearchConfig, WalkerConfig,
};
