//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (KEYGATE__*)
//! 2. Configuration file (TOML or YAML)
//! 3. Default values

use crate::access_control::key_lines;
use crate::config::types::{AppConfig, UserConfig};
use crate::error::ConfigError;
use config::{Case, Config, Environment, File, FileFormat};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "keygate.toml",
    "keygate.yaml",
    ".keygate.toml",
    "~/.config/keygate/config.toml",
    "/etc/keygate/config.toml",
];

/// Prefix for environment overrides, e.g. `KEYGATE__ANON_ACCESS=read-write`
const ENV_PREFIX: &str = "KEYGATE";

/// Pick the file format from a path's extension (YAML for .yaml/.yml, TOML otherwise)
pub fn format_for_path(path: &Path) -> FileFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        _ => FileFormat::Toml,
    }
}

/// Load configuration from a string (useful for testing)
pub fn load_config_from_str(source: &str, format: FileFormat) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(source, format))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Resolve the configuration file to use, if any
///
/// An explicit path must exist. Without one, the first existing default path wins.
pub fn resolve_config_path(config_path: Option<&str>) -> Result<Option<String>, ConfigError> {
    if let Some(path) = config_path {
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        return Ok(Some(path.to_string()));
    }

    for path in DEFAULT_CONFIG_PATHS {
        let expanded = shellexpand::tilde(path);
        if Path::new(expanded.as_ref()).exists() {
            return Ok(Some(expanded.into_owned()));
        }
    }

    Ok(None)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Defaults come from serde defaults on AppConfig

    // 2. Configuration file
    if let Some(path) = resolve_config_path(config_path)? {
        debug!(path = %path, "Using configuration file");
        builder = builder.add_source(File::new(&path, format_for_path(Path::new(&path))));
    }

    // 3. Environment variables
    // e.g., KEYGATE__ANON_ACCESS, KEYGATE__PORT
    // Double underscore (__) separates nested keys, single underscores become hyphens
    builder = builder.add_source(env_source());

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let mut app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    // 4. Users from the key directory
    if let Some(dir) = keys_dir_path(&app_config) {
        app_config.users.extend(load_keys_dir(&dir)?);
    }

    validate_config(&app_config)?;

    Ok(app_config)
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .convert_case(Case::Kebab)
        .try_parsing(true)
}

/// The key directory named by `config`, with `~` expanded
pub fn keys_dir_path(config: &AppConfig) -> Option<PathBuf> {
    config
        .keys_dir
        .as_deref()
        .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
}

/// Load users from a directory of key files
///
/// Each regular file is one user: the file name is the user name and every
/// non-blank, non-`#` line is one of that user's authorized keys. Such users
/// are never admins and have no collaborator repositories. Unreadable files
/// and files without key lines are logged and skipped.
pub fn load_keys_dir(dir: &Path) -> Result<Vec<UserConfig>, ConfigError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        ConfigError::Load(format!(
            "Could not read key directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut users = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(file = %name, error = %e, "Could not read key file");
                continue;
            }
        };

        let keys: Vec<String> = key_lines(&contents).map(str::to_string).collect();
        if keys.is_empty() {
            warn!(file = %name, "Key file holds no keys, skipping");
            continue;
        }
        users.push(UserConfig {
            name: Some(name),
            keys,
            admin: false,
            collab_repos: Vec::new(),
        });
    }

    // read_dir order is platform dependent
    users.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(users)
}

/// Validate configuration values
///
/// Malformed keys are deliberately not checked here; they become policy
/// diagnostics so that one bad entry cannot lock out other users.
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.port == 0 {
        return Err(ConfigError::Invalid {
            message: "port must be greater than 0".to_string(),
        });
    }

    let mut repo_names = HashSet::new();
    for (index, repo) in config.repos.iter().enumerate() {
        if repo.name.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: format!("repos[{}].name", index),
            });
        }
        if !repo_names.insert(repo.name.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!("duplicate repository '{}'", repo.name),
            });
        }
    }

    let mut user_names = HashSet::new();
    for user in &config.users {
        if let Some(name) = &user.name
            && !user_names.insert(name.as_str())
        {
            return Err(ConfigError::Invalid {
                message: format!("duplicate user '{}'", name),
            });
        }
    }

    if crate::access_control::AnonAccess::parse(&config.anon_access).is_none() {
        warn!(
            anon_access = %config.anon_access,
            "Unrecognised anon-access mode, anonymous users will get no access"
        );
    }

    Ok(())
}
