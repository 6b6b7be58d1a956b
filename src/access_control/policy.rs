//! Compiled access policy
//!
//! A [`Policy`] is an immutable snapshot built from [`AppConfig`]. Authorized
//! keys are parsed once here; entries that fail to parse are kept as
//! diagnostics instead of failing the whole policy.

use crate::access_control::keys::parse_authorized_key;
use crate::access_control::types::{AccessLevel, AnonAccess};
use crate::config::AppConfig;
use serde::Serialize;
use ssh_key::PublicKey;
use std::collections::HashSet;
use tracing::{debug, warn};

/// A configured authorized key, parsed or not
#[derive(Debug, Clone)]
pub enum AuthorizedKey {
    Parsed(PublicKey),
    /// Kept so evaluation can report which entry was skipped
    Malformed(String),
}

/// A user as seen by the evaluator
#[derive(Debug, Clone)]
pub struct PolicyUser {
    pub name: String,
    pub keys: Vec<AuthorizedKey>,
    pub admin: bool,
    pub collab_repos: HashSet<String>,
}

impl PolicyUser {
    /// Check if this user may write to the given repository
    pub fn is_collaborator(&self, repo: &str) -> bool {
        self.collab_repos.contains(repo)
    }
}

/// A repository descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDescriptor {
    pub name: String,
    pub private: bool,
}

/// A malformed authorized key found while compiling the policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDiagnostic {
    /// Owning user
    pub user: String,
    /// Position of the key in the user's list
    pub index: usize,
    pub key: String,
    pub reason: String,
}

/// Immutable access policy snapshot
#[derive(Debug, Clone)]
pub struct Policy {
    users: Vec<PolicyUser>,
    repos: Vec<RepoDescriptor>,
    anon_access: String,
    anon_level: AccessLevel,
    allow_keyless: bool,
    diagnostics: Vec<KeyDiagnostic>,
}

impl Policy {
    /// Compile a policy from configuration
    pub fn from_config(config: &AppConfig) -> Self {
        let mut diagnostics = Vec::new();

        let users = config
            .users
            .iter()
            .enumerate()
            .map(|(position, user)| {
                let name = user
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("user-{}", position));

                let keys = user
                    .keys
                    .iter()
                    .enumerate()
                    .map(|(index, text)| match parse_authorized_key(text) {
                        Ok(key) => AuthorizedKey::Parsed(key),
                        Err(e) => {
                            warn!(user = %name, index, error = %e, "Malformed authorized key");
                            diagnostics.push(KeyDiagnostic {
                                user: name.clone(),
                                index,
                                key: text.clone(),
                                reason: e.to_string(),
                            });
                            AuthorizedKey::Malformed(text.clone())
                        }
                    })
                    .collect();

                PolicyUser {
                    name,
                    keys,
                    admin: user.admin,
                    collab_repos: user.collab_repos.iter().cloned().collect(),
                }
            })
            .collect::<Vec<_>>();

        let repos = config
            .repos
            .iter()
            .map(|repo| RepoDescriptor {
                name: repo.name.clone(),
                private: repo.private,
            })
            .collect();

        debug!(
            users = users.len(),
            diagnostics = diagnostics.len(),
            anon_access = %config.anon_access,
            "Compiled access policy"
        );

        Self {
            users,
            repos,
            anon_access: config.anon_access.clone(),
            anon_level: AnonAccess::level_for(&config.anon_access),
            allow_keyless: config.allow_keyless,
            diagnostics,
        }
    }

    /// A policy with no users where everyone gets the given anonymous level
    pub fn anonymous(level: AccessLevel) -> Self {
        Self {
            users: Vec::new(),
            repos: Vec::new(),
            anon_access: level.as_str().to_string(),
            anon_level: level,
            allow_keyless: true,
            diagnostics: Vec::new(),
        }
    }

    /// Check if a repository is explicitly marked private
    ///
    /// Repositories without a descriptor are public.
    pub fn is_private(&self, repo: &str) -> bool {
        self.repos.iter().any(|r| r.name == repo && r.private)
    }

    pub fn users(&self) -> &[PolicyUser] {
        &self.users
    }

    pub fn has_users(&self) -> bool {
        !self.users.is_empty()
    }

    pub fn repos(&self) -> &[RepoDescriptor] {
        &self.repos
    }

    /// The configured anonymous mode text
    pub fn anon_access(&self) -> &str {
        &self.anon_access
    }

    /// Level granted to callers no configured key matches
    pub fn anon_level(&self) -> AccessLevel {
        self.anon_level
    }

    pub fn allow_keyless(&self) -> bool {
        self.allow_keyless
    }

    /// Malformed keys found while compiling
    pub fn diagnostics(&self) -> &[KeyDiagnostic] {
        &self.diagnostics
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
