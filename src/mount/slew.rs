//! Slew and alert edge detection on the pointing status code.
//!
//! The mount reports a numeric status with every pointing poll. Two edges matter to
//! consumers: entering an alert status, and a slew coming to rest. After a meridian flip
//! the mount needs extra time before its axes are mechanically settled, so "slew
//! finished" is delayed by a one-shot timer in that case.

use std::time::Duration;

use log::{debug, info};
use tokio::task::JoinHandle;

use super::pointing::PointingState;
use crate::events::{emit, EventSink, MountEvent};

/// Status codes that require operator attention
pub const ALERT_STATUS: [u32; 3] = [1, 98, 99];
/// Status codes in which the mount is not moving on its own
pub const SETTLED_STATUS: [u32; 2] = [2, 6];

pub fn is_slewing(status: u32) -> bool {
    !SETTLED_STATUS.contains(&status)
}

pub fn is_alert(status: u32) -> bool {
    ALERT_STATUS.contains(&status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlewPhase {
    Idle,
    Alerted,
    Slewing,
    Settling,
}

/// What a single status observation asks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub alert: bool,
    /// Slew ended; emit "slew finished" after this delay
    pub settle: Option<Duration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlewState {
    previous_slewing: bool,
    previous_alert: bool,
}

impl SlewState {
    pub fn advance(&mut self, status: u32, flipped: bool, settle_flip: Duration) -> Transition {
        let mut transition = Transition::default();

        let alert = is_alert(status);
        if alert && !self.previous_alert {
            transition.alert = true;
        }
        self.previous_alert = alert;

        let slewing = is_slewing(status);
        if self.previous_slewing && !slewing {
            transition.settle = Some(if flipped { settle_flip } else { Duration::ZERO });
        }
        self.previous_slewing = slewing;

        transition
    }

    pub fn is_slewing(&self) -> bool {
        self.previous_slewing
    }

    pub fn is_alerted(&self) -> bool {
        self.previous_alert
    }
}

/// Pointing completion hook: feeds [`SlewState`] and owns the settle timer.
pub struct SlewMonitor {
    state: SlewState,
    settle_flip: Duration,
    events: EventSink,
    pending: Option<JoinHandle<()>>,
}

impl SlewMonitor {
    pub fn new(settle_flip: Duration, events: EventSink) -> Self {
        Self {
            state: SlewState::default(),
            settle_flip,
            events,
            pending: None,
        }
    }

    pub fn phase(&self) -> SlewPhase {
        if self.state.is_alerted() {
            SlewPhase::Alerted
        } else if self.state.is_slewing() {
            SlewPhase::Slewing
        } else if self.pending.as_ref().is_some_and(|t| !t.is_finished()) {
            SlewPhase::Settling
        } else {
            SlewPhase::Idle
        }
    }

    pub fn observe(&mut self, pointing: &PointingState) {
        let Some(status) = pointing.status else {
            return;
        };
        let transition = self.state.advance(status, pointing.flipped, self.settle_flip);

        if transition.alert {
            info!("mount entered alert status {}", status);
            emit(&self.events, MountEvent::Alert);
        }
        if let Some(delay) = transition.settle {
            self.settle_after(delay);
        }
    }

    fn settle_after(&mut self, delay: Duration) {
        if let Some(previous) = self.pending.take() {
            previous.abort();
        }
        if delay.is_zero() {
            emit(&self.events, MountEvent::SlewFinished);
            return;
        }
        debug!("pier side flipped, waiting {:?} for the mount to settle", delay);
        let events = self.events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            emit(&events, MountEvent::SlewFinished);
        }));
    }
}

impl Drop for SlewMonitor {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.take() {
            timer.abort();
        }
    }
}
