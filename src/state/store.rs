//! Thread-safe containers for the configuration and results documents,
//! shared between the worker thread, the API dispatcher and any frontend.
//!
//! Configuration changes are never applied in place: a caller stages a
//! replacement with [`ConfigStore::stage_pending`], and the worker thread
//! swaps it in at the start of its next tick via
//! [`ConfigStore::take_pending`], so a config document is never observed
//! half-updated mid-measurement.

use std::sync::{Arc, RwLock};

use crate::config::{Config, ReloadKind};
use crate::state::results::Results;

/// Shared, versioned configuration with a staged pending replacement.
pub struct ConfigStore {
    current: RwLock<Config>,
    pending: RwLock<Option<Config>>,
}

impl ConfigStore {
    pub fn new(initial: Config) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(initial),
            pending: RwLock::new(None),
        })
    }

    /// A snapshot of the currently active configuration.
    pub fn current(&self) -> Config {
        self.current.read().unwrap().clone()
    }

    /// Validate and stage `new` for application at the next tick boundary,
    /// returning the kind of reload it will require.
    pub fn stage_pending(&self, new: Config) -> anyhow::Result<ReloadKind> {
        new.validate()?;
        let kind = self.current.read().unwrap().reload_kind(&new);
        *self.pending.write().unwrap() = Some(new);
        Ok(kind)
    }

    /// Called by the worker at the start of a tick: if a pending config is
    /// staged, swap it in and return it so the caller can react (e.g. tear
    /// down and rebuild drivers for a full restart).
    pub fn take_pending(&self) -> Option<Config> {
        let mut pending = self.pending.write().unwrap();
        if let Some(new) = pending.take() {
            *self.current.write().unwrap() = new.clone();
            Some(new)
        } else {
            None
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.read().unwrap().is_some()
    }

    /// Mutate the active configuration directly, bypassing the staged
    /// pending/reload-kind machinery. Used by the worker itself to fold a
    /// just-completed calibration's solved `r_s`/`r_offset` back into the
    /// live document, which is not a reconfiguration a caller staged.
    pub fn mutate_current<F: FnOnce(&mut Config)>(&self, f: F) {
        f(&mut self.current.write().unwrap());
    }
}

/// Shared results document the worker publishes into and readers poll.
pub struct ResultsStore {
    current: RwLock<Results>,
}

impl ResultsStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(Results::default()),
        })
    }

    pub fn snapshot(&self) -> Results {
        self.current.read().unwrap().clone()
    }

    pub fn publish(&self, results: Results) {
        *self.current.write().unwrap() = results;
    }
}

impl Default for ResultsStore {
    fn default() -> Self {
        Self {
            current: RwLock::new(Results::default()),
        }
    }
}
