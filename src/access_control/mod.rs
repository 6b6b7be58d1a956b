//! Access control module
//!
//! Decides what a caller presenting an SSH public key may do on a repository.
//!
//! ## Access Control Model
//!
//! Configured users are scanned in order; for the first of their keys that
//! matches the presented key:
//!
//! 1. **Admin users** get admin access on every repository
//! 2. **Collaborators** on the repository get read-write access
//! 3. **Any other user** gets read-only access on public repositories
//! 4. On private repositories, the scan continues with the next user
//!
//! When no key matches, private repositories deny access as soon as any user
//! is configured. Everything else falls back to the `anon-access` mode.
//!
//! Malformed authorized keys never deny access to other users: they are
//! recorded as diagnostics and skipped during evaluation.
//!
//! ## Example Configuration
//!
//! ```toml
//! anon-access = "read-only"
//! allow-keyless = true
//!
//! [[users]]
//! name = "ops"
//! admin = true
//! keys = ["ssh-ed25519 AAAA... ops@laptop"]
//!
//! [[users]]
//! name = "dev"
//! keys = ["ssh-ed25519 AAAA... dev@desktop"]
//! collab-repos = ["infra"]
//!
//! [[repos]]
//! name = "infra"
//! private = true
//! ```

pub mod keys;
pub mod policy;
pub mod resolver;
pub mod store;
pub mod types;

pub use keys::{fingerprint, key_lines, keys_equal, parse_authorized_key, read_public_key_file};
pub use policy::{AuthorizedKey, KeyDiagnostic, Policy, PolicyUser, RepoDescriptor};
pub use resolver::{AccessDecision, AccessEvaluator, DecisionRule, evaluate};
pub use store::PolicyStore;
pub use types::{AccessLevel, AnonAccess};
