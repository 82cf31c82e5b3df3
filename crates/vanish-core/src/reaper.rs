//! Inactivity expiry
//!
//! [`ExpiryReaper::sweep`] is the synchronous unit of work; scheduling it on
//! an interval is left to the runtime crate.

use std::sync::Arc;

use core::time::Duration;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::registry::IdentityRegistry;
use crate::types::IdentityHandle;

/// Finds and erases identities inactive for longer than a threshold
#[derive(Debug, Clone)]
pub struct ExpiryReaper {
    registry: Arc<IdentityRegistry>,
    threshold: Duration,
}

impl ExpiryReaper {
    /// Create a reaper using the registry's configured threshold
    pub fn new(registry: Arc<IdentityRegistry>) -> Self {
        let threshold = registry.config().inactivity_threshold();
        Self::with_threshold(registry, threshold)
    }

    /// Create a reaper with an explicit threshold
    pub fn with_threshold(registry: Arc<IdentityRegistry>, threshold: Duration) -> Self {
        Self {
            registry,
            threshold,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Erase every identity whose inactivity strictly exceeds the threshold
    ///
    /// Candidates are snapshotted first and each is re-checked at erasure
    /// time. Identities that left or became active in between are skipped.
    /// Returns the number of identities erased.
    pub fn sweep(&self) -> Result<usize> {
        let candidates = self.registry.inactive_handles(self.threshold)?;
        let erased = self.expire_candidates(&candidates);

        debug!(
            "Expiry sweep finished: {} candidates, {} erased",
            candidates.len(),
            erased
        );
        Ok(erased)
    }

    /// A failed erasure is logged and the remaining candidates still run
    fn expire_candidates(&self, candidates: &[IdentityHandle]) -> usize {
        let mut erased = 0;
        for handle in candidates {
            match self.registry.expire_if_inactive(handle, self.threshold) {
                Ok(true) => {
                    debug!("Expired inactive identity {}", handle);
                    erased += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to expire identity {}: {}", handle, e),
            }
        }
        erased
    }
}
