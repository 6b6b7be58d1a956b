//! Access evaluation
//!
//! Resolves the access level of a presented public key on a repository.
//! Rules are applied in order and the first match wins:
//! 1. A matching key of an admin user grants admin access
//! 2. A matching key of a collaborator on the repository grants read-write
//! 3. A matching key on a public repository grants read-only
//! 4. A matching key on a private repository keeps scanning other users
//! 5. Nothing matched on a private repository (with users configured): no access
//! 6. Otherwise the anonymous access mode applies

use crate::access_control::keys::{fingerprint, keys_equal};
use crate::access_control::policy::{AuthorizedKey, Policy, PolicyUser};
use crate::access_control::types::AccessLevel;
use ssh_key::PublicKey;
use std::fmt;
use tracing::{debug, trace};

/// Which rule produced a decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionRule {
    Admin { user: String },
    Collaborator { user: String },
    PublicRepo { user: String },
    PrivateRepo,
    Anonymous,
    KeylessDisabled,
}

impl fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionRule::Admin { user } => write!(f, "user '{}' is an admin", user),
            DecisionRule::Collaborator { user } => {
                write!(f, "user '{}' is a collaborator", user)
            }
            DecisionRule::PublicRepo { user } => {
                write!(f, "user '{}' may read public repositories", user)
            }
            DecisionRule::PrivateRepo => write!(f, "repository is private"),
            DecisionRule::Anonymous => write!(f, "anonymous access"),
            DecisionRule::KeylessDisabled => write!(f, "keyless sessions are not allowed"),
        }
    }
}

/// Result of an access evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub level: AccessLevel,
    pub rule: DecisionRule,
}

impl AccessDecision {
    fn new(level: AccessLevel, rule: DecisionRule) -> Self {
        Self { level, rule }
    }

    pub fn is_allowed(&self) -> bool {
        self.level.can_read()
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }
}

/// Evaluates access against a policy snapshot
///
/// Holds no state of its own, so evaluating the same query twice always
/// gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct AccessEvaluator<'p> {
    policy: &'p Policy,
}

impl<'p> AccessEvaluator<'p> {
    pub fn new(policy: &'p Policy) -> Self {
        Self { policy }
    }

    /// Access level for a presented key on a repository
    pub fn evaluate(&self, repo: &str, key: &PublicKey) -> AccessLevel {
        self.explain(repo, key).level
    }

    /// Like [`evaluate`](Self::evaluate), also reporting the rule that decided
    pub fn explain(&self, repo: &str, key: &PublicKey) -> AccessDecision {
        let private = self.policy.is_private(repo);

        debug!(
            repo,
            private,
            key = %fingerprint(key),
            "Evaluating access"
        );

        for user in self.policy.users() {
            if !self.user_matches(user, key) {
                continue;
            }
            if user.admin {
                trace!(user = %user.name, "Matched admin user");
                return AccessDecision::new(
                    AccessLevel::Admin,
                    DecisionRule::Admin {
                        user: user.name.clone(),
                    },
                );
            }
            if user.is_collaborator(repo) {
                trace!(user = %user.name, "Matched collaborator");
                return AccessDecision::new(
                    AccessLevel::ReadWrite,
                    DecisionRule::Collaborator {
                        user: user.name.clone(),
                    },
                );
            }
            if !private {
                trace!(user = %user.name, "Matched user on public repository");
                return AccessDecision::new(
                    AccessLevel::ReadOnly,
                    DecisionRule::PublicRepo {
                        user: user.name.clone(),
                    },
                );
            }
            // Another entry may still grant more on this private repository
            trace!(user = %user.name, "Matched user lacks access to private repository");
        }

        self.fallback(private)
    }

    /// Access level for a session that authenticated without a public key
    pub fn evaluate_keyless(&self, repo: &str) -> AccessLevel {
        self.explain_keyless(repo).level
    }

    pub fn explain_keyless(&self, repo: &str) -> AccessDecision {
        if !self.policy.allow_keyless() {
            debug!(repo, "Keyless session rejected");
            return AccessDecision::new(AccessLevel::NoAccess, DecisionRule::KeylessDisabled);
        }
        self.fallback(self.policy.is_private(repo))
    }

    /// First user owning a key matching the presented one
    pub fn identify(&self, key: &PublicKey) -> Option<&'p PolicyUser> {
        self.policy
            .users()
            .iter()
            .find(|user| self.user_matches(user, key))
    }

    /// Whether the presented key belongs to any configured user
    pub fn is_authenticated(&self, key: &PublicKey) -> bool {
        self.identify(key).is_some()
    }

    fn user_matches(&self, user: &PolicyUser, key: &PublicKey) -> bool {
        user.keys.iter().enumerate().any(|(index, authorized)| match authorized {
            AuthorizedKey::Parsed(candidate) => keys_equal(key, candidate),
            AuthorizedKey::Malformed(_) => {
                debug!(user = %user.name, index, "Skipping malformed authorized key");
                false
            }
        })
    }

    fn fallback(&self, private: bool) -> AccessDecision {
        if private && self.policy.has_users() {
            trace!("No key matched on private repository");
            return AccessDecision::new(AccessLevel::NoAccess, DecisionRule::PrivateRepo);
        }
        trace!(anon_access = %self.policy.anon_access(), "Using anonymous access");
        AccessDecision::new(self.policy.anon_level(), DecisionRule::Anonymous)
    }
}

impl Policy {
    /// Evaluator borrowing this snapshot
    pub fn evaluator(&self) -> AccessEvaluator<'_> {
        AccessEvaluator::new(self)
    }
}

/// Access level for `key` on `repo` under `policy`
pub fn evaluate(repo: &str, key: &PublicKey, policy: &Policy) -> AccessLevel {
    AccessEvaluator::new(policy).evaluate(repo, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::keys::parse_authorized_key;
    use crate::config::{AppConfig, RepoConfig, UserConfig};

    const KEY_A: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEB";
    const KEY_B: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgIC";
    const KEY_C: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMD";

    fn key(text: &str) -> PublicKey {
        parse_authorized_key(text).unwrap()
    }

    fn user(name: &str, keys: &[&str]) -> UserConfig {
        UserConfig {
            name: Some(name.into()),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn private_repo(name: &str) -> RepoConfig {
        RepoConfig {
            name: name.into(),
            private: true,
            note: None,
        }
    }

    #[test]
    fn test_admin_wins_on_private_repo() {
        let config = AppConfig {
            users: vec![UserConfig {
                admin: true,
                ..user("root", &[KEY_A])
            }],
            repos: vec![private_repo("infra")],
            ..Default::default()
        };
        let policy = Policy::from_config(&config);
        let decision = policy.evaluator().explain("infra", &key(KEY_A));
        assert_eq!(decision.level, AccessLevel::Admin);
        assert_eq!(
            decision.rule,
            DecisionRule::Admin {
                user: "root".into()
            }
        );
    }

    #[test]
    fn test_collaborator_gets_read_write() {
        let config = AppConfig {
            users: vec![UserConfig {
                collab_repos: vec!["infra".into()],
                ..user("dev", &[KEY_A])
            }],
            repos: vec![private_repo("infra")],
            ..Default::default()
        };
        let policy = Policy::from_config(&config);
        assert_eq!(
            evaluate("infra", &key(KEY_A), &policy),
            AccessLevel::ReadWrite
        );
    }

    #[test]
    fn test_matched_user_reads_public_repo() {
        let config = AppConfig {
            anon_access: "no-access".into(),
            users: vec![user("reader", &[KEY_A])],
            ..Default::default()
        };
        let policy = Policy::from_config(&config);
        assert_eq!(
            evaluate("docs", &key(KEY_A), &policy),
            AccessLevel::ReadOnly
        );
    }

    #[test]
    fn test_insufficient_match_keeps_scanning() {
        let config = AppConfig {
            users: vec![
                user("plain", &[KEY_A]),
                UserConfig {
                    collab_repos: vec!["infra".into()],
                    ..user("shared", &[KEY_A])
                },
            ],
            repos: vec![private_repo("infra")],
            ..Default::default()
        };
        let policy = Policy::from_config(&config);
        assert_eq!(
            evaluate("infra", &key(KEY_A), &policy),
            AccessLevel::ReadWrite
        );
    }

    #[test]
    fn test_matched_user_denied_on_private_repo() {
        let config = AppConfig {
            anon_access: "admin-access".into(),
            users: vec![user("plain", &[KEY_A])],
            repos: vec![private_repo("infra")],
            ..Default::default()
        };
        let policy = Policy::from_config(&config);
        let decision = policy.evaluator().explain("infra", &key(KEY_A));
        assert_eq!(decision.level, AccessLevel::NoAccess);
        assert_eq!(decision.rule, DecisionRule::PrivateRepo);
    }

    #[test]
    fn test_malformed_key_skipped() {
        let config = AppConfig {
            users: vec![
                user("broken", &["not a key"]),
                UserConfig {
                    admin: true,
                    ..user("root", &[KEY_B])
                },
            ],
            repos: vec![private_repo("infra")],
            ..Default::default()
        };
        let policy = Policy::from_config(&config);
        assert_eq!(evaluate("infra", &key(KEY_B), &policy), AccessLevel::Admin);
    }

    #[test]
    fn test_keyless_sessions() {
        let mut config = AppConfig {
            anon_access: "read-only".into(),
            users: vec![user("someone", &[KEY_A])],
            repos: vec![private_repo("infra")],
            ..Default::default()
        };
        let policy = Policy::from_config(&config);
        assert_eq!(
            policy.evaluator().evaluate_keyless("docs"),
            AccessLevel::ReadOnly
        );
        assert_eq!(
            policy.evaluator().evaluate_keyless("infra"),
            AccessLevel::NoAccess
        );

        config.allow_keyless = false;
        let policy = Policy::from_config(&config);
        let decision = policy.evaluator().explain_keyless("docs");
        assert_eq!(decision.level, AccessLevel::NoAccess);
        assert_eq!(decision.rule, DecisionRule::KeylessDisabled);
    }

    #[test]
    fn test_identify() {
        let config = AppConfig {
            users: vec![user("alice", &[KEY_A]), user("bob", &[KEY_B])],
            ..Default::default()
        };
        let policy = Policy::from_config(&config);
        let evaluator = policy.evaluator();
        assert_eq!(
            evaluator.identify(&key(KEY_B)).map(|u| u.name.as_str()),
            Some("bob")
        );
        assert!(evaluator.is_authenticated(&key(KEY_A)));
        assert!(!evaluator.is_authenticated(&key(KEY_C)));
    }

    #[test]
    fn test_decision_helpers() {
        let policy = Policy::anonymous(AccessLevel::NoAccess);
        let decision = policy.evaluator().explain("any", &key(KEY_C));
        assert!(decision.is_denied());
        assert_eq!(decision.rule.to_string(), "anonymous access");
    }
}
