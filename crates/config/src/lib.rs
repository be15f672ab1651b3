//! Configuration loading, validation, and env substitution.
//!
//! Config files: `chanlink.toml`, `chanlink.yaml`, or `chanlink.json`
//! Searched in `./` then `~/.config/chanlink/` (or `CHANLINK_CONFIG_DIR`).
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, clear_data_dir, config_dir, data_dir,
        discover_and_load, load_config, set_config_dir, set_data_dir,
    },
    schema::{ChanlinkConfig, DatabaseConfig, DiscordConfig, MetricsConfig, RelayConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_for_run},
};
