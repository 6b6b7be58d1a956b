//! Configuration types for keygate
//!
//! This module defines the configuration structure that can be loaded from
//! TOML or YAML files and/or environment variables. Keys are hyphenated
//! (`anon-access`, `allow-keyless`, `collab-repos`).

use serde::Deserialize;

/// Default SSH port the front-end listens on
pub const DEFAULT_PORT: u16 = 23231;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppConfig {
    /// Display name of the server
    pub name: String,

    /// Host the SSH front-end binds to
    pub host: String,

    /// Port the SSH front-end binds to
    pub port: u16,

    /// Access mode applied when no configured key matches
    ///
    /// Kept as text: an unrecognised mode is not a load error and resolves
    /// to no access at evaluation time.
    pub anon_access: String,

    /// Whether sessions without a public key are accepted
    pub allow_keyless: bool,

    /// Configured users, in evaluation order
    pub users: Vec<UserConfig>,

    /// Repository descriptors
    pub repos: Vec<RepoConfig>,

    /// Optional directory of per-user key files
    pub keys_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "keygate".to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            anon_access: "read-only".to_string(),
            allow_keyless: true,
            users: Vec::new(),
            repos: Vec::new(),
            keys_dir: None,
        }
    }
}

impl AppConfig {
    /// Address string for the SSH front-end
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A configured user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserConfig {
    /// User identifier; defaulted when the policy is compiled
    pub name: Option<String>,

    /// Authorized keys in authorized_keys line format
    pub keys: Vec<String>,

    /// Admin users get full access to every repository
    pub admin: bool,

    /// Repositories this user may write to
    pub collab_repos: Vec<String>,
}

/// A repository descriptor
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RepoConfig {
    pub name: String,

    pub private: bool,

    /// Free-form description, not used for access decisions
    pub note: Option<String>,
}
