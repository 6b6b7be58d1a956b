//! Configuration module
//!
//! Handles loading and validating configuration from TOML/YAML files and environment variables.

pub mod loader;
pub mod types;

pub use ::config::FileFormat;
pub use loader::{
    format_for_path, keys_dir_path, load_config, load_config_from_str, load_keys_dir,
    resolve_config_path,
};
pub use types::*;
