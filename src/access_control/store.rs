//! Shared policy snapshot with atomic reload
//!
//! Readers take an `Arc<Policy>` and evaluate against it without holding the
//! lock. A reload compiles the new policy first and only then swaps the
//! pointer under the write lock, so readers see either the old or the new
//! snapshot and never a partial one.

use crate::access_control::policy::Policy;
use crate::config::load_config;
use crate::error::ConfigError;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Holder of the current policy snapshot
#[derive(Debug)]
pub struct PolicyStore {
    current: RwLock<Arc<Policy>>,
}

impl PolicyStore {
    pub fn new(policy: Policy) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<Policy> {
        Arc::clone(&self.read())
    }

    /// Publish a new snapshot, returning the previous one
    pub fn replace(&self, policy: Policy) -> Arc<Policy> {
        let next = Arc::new(policy);
        std::mem::replace(&mut *self.write(), next)
    }

    /// Load configuration and publish the compiled policy
    ///
    /// On error the current snapshot stays in place.
    pub fn reload(&self, config_path: Option<&str>) -> Result<Arc<Policy>, ConfigError> {
        let config = load_config(config_path)?;
        let policy = Policy::from_config(&config);
        info!(
            users = policy.users().len(),
            diagnostics = policy.diagnostics().len(),
            "Reloaded access policy"
        );
        self.replace(policy);
        Ok(self.snapshot())
    }

    // A panic while holding the lock cannot leave a half-written Arc behind,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Arc<Policy>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<Policy>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(Policy::default())
    }
}
