//! Process-wide counters for exchanges and poll ticks.
//!
//! Cheap relaxed atomics; read them with [`snapshot`].
use std::sync::atomic::{AtomicU64, Ordering};

static EXCHANGES_OK: AtomicU64 = AtomicU64::new(0);
static EXCHANGES_REJECTED: AtomicU64 = AtomicU64::new(0);
static CONNECT_FAILURES: AtomicU64 = AtomicU64::new(0);
static SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
static RECEIVE_FAILURES: AtomicU64 = AtomicU64::new(0);
static SHAPE_FAILURES: AtomicU64 = AtomicU64::new(0);
static TICKS_SKIPPED_BUSY: AtomicU64 = AtomicU64::new(0);
static TICKS_GATED_OFFLINE: AtomicU64 = AtomicU64::new(0);

/// Failure class of a transport exchange, as counted by the metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Rejected,
    Connect,
    Send,
    Receive,
    Shape,
}

pub fn inc_exchange_ok() {
    EXCHANGES_OK.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_exchange_failed(class: FailureClass) {
    let counter = match class {
        FailureClass::Rejected => &EXCHANGES_REJECTED,
        FailureClass::Connect => &CONNECT_FAILURES,
        FailureClass::Send => &SEND_FAILURES,
        FailureClass::Receive => &RECEIVE_FAILURES,
        FailureClass::Shape => &SHAPE_FAILURES,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_tick_skipped() {
    TICKS_SKIPPED_BUSY.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_tick_gated() {
    TICKS_GATED_OFFLINE.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub exchanges_ok: u64,
    pub exchanges_rejected: u64,
    pub connect_failures: u64,
    pub send_failures: u64,
    pub receive_failures: u64,
    pub shape_failures: u64,
    pub ticks_skipped_busy: u64,
    pub ticks_gated_offline: u64,
}

impl Snapshot {
    pub fn exchanges_failed(&self) -> u64 {
        self.exchanges_rejected
            + self.connect_failures
            + self.send_failures
            + self.receive_failures
            + self.shape_failures
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        exchanges_ok: EXCHANGES_OK.load(Ordering::Relaxed),
        exchanges_rejected: EXCHANGES_REJECTED.load(Ordering::Relaxed),
        connect_failures: CONNECT_FAILURES.load(Ordering::Relaxed),
        send_failures: SEND_FAILURES.load(Ordering::Relaxed),
        receive_failures: RECEIVE_FAILURES.load(Ordering::Relaxed),
        shape_failures: SHAPE_FAILURES.load(Ordering::Relaxed),
        ticks_skipped_busy: TICKS_SKIPPED_BUSY.load(Ordering::Relaxed),
        ticks_gated_offline: TICKS_GATED_OFFLINE.load(Ordering::Relaxed),
    }
}
