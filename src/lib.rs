//! keygate
//!
//! Public-key access control for SSH services hosting multiple repositories.
//!
//! ## Features
//!
//! - **Per-repository access levels**: `no-access`, `read-only`, `read-write`, `admin-access`
//! - **Users identified by authorized keys**, with admin and collaborator grants
//! - **Private repositories** that never fall back to anonymous access
//! - **Hot reload** of the policy without interrupting evaluations
//! - **Flexible configuration** via TOML/YAML files, environment variables and key directories
//!
//! ## Example
//!
//! ```no_run
//! use keygate::access_control::{Policy, parse_authorized_key};
//! use keygate::config::load_config;
//!
//! let config = load_config(Some("keygate.toml")).unwrap();
//! let policy = Policy::from_config(&config);
//! let key = parse_authorized_key("ssh-ed25519 AAAA...").unwrap();
//! let level = policy.evaluator().evaluate("infra", &key);
//! println!("{level}");
//! ```

pub mod access_control;
pub mod config;
pub mod error;
pub mod logging;
pub mod transport;

// Re-export main types
pub use access_control::{AccessEvaluator, AccessLevel, Policy, PolicyStore};
pub use config::{AppConfig, load_config};
pub use error::{ConfigError, KeyError, TransportError};
