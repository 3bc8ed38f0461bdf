//! Shared "mount is reachable" flag.
//!
//! Exactly one [`LivenessWriter`] exists, shared by the reachability cycle and the
//! device's shutdown request; every other cycle holds a [`LivenessReader`] and only
//! consults it before deciding to do I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Create the flag, initially unreachable.
pub fn liveness() -> (LivenessWriter, LivenessReader) {
    let flag = Arc::new(AtomicBool::new(false));
    (LivenessWriter(Arc::clone(&flag)), LivenessReader(flag))
}

#[derive(Debug)]
pub struct LivenessWriter(Arc<AtomicBool>);

impl LivenessWriter {
    /// Store the new value and return the previous one.
    pub fn set(&self, reachable: bool) -> bool {
        self.0.swap(reachable, Ordering::SeqCst)
    }

    pub fn reader(&self) -> LivenessReader {
        LivenessReader(Arc::clone(&self.0))
    }
}

#[derive(Debug, Clone)]
pub struct LivenessReader(Arc<AtomicBool>);

impl LivenessReader {
    pub fn is_reachable(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
