//! Round-robin coordinator selection
//!
//! Selection uses a single shared cursor and never locks the registry for
//! longer than one read. Fairness is exact when the registry is stable and
//! approximate while it is being mutated.

use crate::record::CoordinatorRecord;
use crate::registry::RotationSource;
use qgate_common::error::{GatewayError, Result};
use qgate_common::METRICS;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// Attempts made before a shrinking registry is reported as empty
const MAX_ATTEMPTS: usize = 2;

/// Atomic-cursor rotation over a [`RotationSource`]
#[derive(Debug, Default)]
pub struct RotationSelector {
    cursor: AtomicUsize,
}

impl RotationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the rotation at `cursor`
    pub fn with_cursor(cursor: usize) -> Self {
        Self {
            cursor: AtomicUsize::new(cursor),
        }
    }

    /// Current cursor position
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Pick the next coordinator
    ///
    /// The size read and the fetch are separate reads of the source, so a
    /// concurrent removal can shrink it in between. That race is retried
    /// once and then reported as `NoActiveCoordinator`; `IndexOutOfRange`
    /// never reaches the caller.
    pub fn select<S>(&self, source: &S) -> Result<CoordinatorRecord>
    where
        S: RotationSource + ?Sized,
    {
        for attempt in 0..MAX_ATTEMPTS {
            let size = source.size();
            if size == 0 {
                METRICS.coordinator.no_coordinator.inc();
                return Err(GatewayError::NoActiveCoordinator);
            }

            let index = self.advance(size);
            match source.at(index) {
                Ok(record) => {
                    METRICS.coordinator.selections.inc();
                    trace!(index, size, coordinator = %record, "Selected coordinator");
                    return Ok(record);
                }
                Err(GatewayError::IndexOutOfRange { index, size }) => {
                    debug!(attempt, index, size, "Registry shrank during selection");
                    METRICS.coordinator.selection_retries.inc();
                }
                Err(e) => return Err(e),
            }
        }

        METRICS.coordinator.no_coordinator.inc();
        Err(GatewayError::NoActiveCoordinator)
    }

    /// Claim an index and move the cursor past it
    fn advance(&self, size: usize) -> usize {
        let current = self.cursor.load(Ordering::Acquire);
        if current >= size {
            // Index 0 is handed out here, so the next caller continues at 1.
            // A lost race means someone else already moved the cursor.
            let _ = self
                .cursor
                .compare_exchange(current, 1, Ordering::AcqRel, Ordering::Acquire);
            0
        } else {
            self.cursor.fetch_add(1, Ordering::AcqRel);
            current
        }
    }
}
