//! Max processed block height
//!
//! The tracker only moves forward. A block's payloads must be applied before
//! its height is advanced to, so after a crash the scanner resumes at
//! [HeightTracker::next_height] and at most the last block is applied twice,
//! never skipped.

pub mod store;

use self::store::HeightStore;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum HeightError {
    #[error("cannot move max processed height back from {current} to {requested}")]
    NonMonotonic { current: u32, requested: u32 },

    #[error("expected max processed height {expected}, found {actual}")]
    Conflict { expected: u32, actual: u32 },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Reads and advances the max processed height of a [HeightStore].
///
/// Any number of trackers may share one store. Every write is a
/// compare-and-set in the store, so two trackers never both move the height
/// from the same value.
#[derive(Debug)]
pub struct HeightTracker<S> {
    store: Arc<S>,
    start_height: u32,
}

impl<S: HeightStore> HeightTracker<S> {
    /// `start_height` is reported until a height has been persisted
    pub fn new(store: Arc<S>, start_height: u32) -> Self {
        Self {
            store,
            start_height,
        }
    }

    pub fn start_height(&self) -> u32 {
        self.start_height
    }

    /// Current max processed height
    pub fn get(&self) -> Result<u32, HeightError> {
        Ok(self.current()?.1)
    }

    /// Height the next scan resumes at
    pub fn next_height(&self) -> Result<u32, HeightError> {
        Ok(self.get()?.saturating_add(1))
    }

    /// Persist `new_height` as the max processed height.
    ///
    /// Advancing to the current height is a no-op success. Moving backwards is
    /// a [HeightError::NonMonotonic] and means the caller is processing blocks
    /// out of order.
    pub fn advance(&self, new_height: u32) -> Result<(), HeightError> {
        loop {
            let (stored, current) = self.current()?;
            if !Self::check(current, new_height)? {
                return Ok(());
            }
            if self.store.compare_and_set_max_processed_height(stored, new_height)? {
                debug!("Advanced max processed height from {current} to {new_height}");
                return Ok(());
            }
            trace!("Max processed height moved while advancing to {new_height}, rereading");
        }
    }

    /// Advance from `expected` to `new_height`, failing with
    /// [HeightError::Conflict] if any other writer has moved the height.
    ///
    /// This is how a scanner claims a block: of all callers passing the same
    /// `expected`, at most one succeeds.
    pub fn compare_and_advance(&self, expected: u32, new_height: u32) -> Result<(), HeightError> {
        let (stored, current) = self.current()?;
        if current != expected {
            return Err(HeightError::Conflict {
                expected,
                actual: current,
            });
        }
        if !Self::check(current, new_height)? {
            return Ok(());
        }
        if !self.store.compare_and_set_max_processed_height(stored, new_height)? {
            return Err(HeightError::Conflict {
                expected,
                actual: self.get()?,
            });
        }

        debug!("Advanced max processed height from {current} to {new_height}");
        Ok(())
    }

    /// Persisted value and the height it stands for
    fn current(&self) -> Result<(Option<u32>, u32), HeightError> {
        let stored = self.store.get_max_processed_height()?;
        Ok((stored, stored.unwrap_or(self.start_height)))
    }

    /// Whether moving from `current` to `new_height` needs a write
    fn check(current: u32, new_height: u32) -> Result<bool, HeightError> {
        if new_height < current {
            return Err(HeightError::NonMonotonic {
                current,
                requested: new_height,
            });
        }
        if new_height == current {
            trace!("Max processed height already at {current}");
            return Ok(false);
        }
        Ok(true)
    }
}
