//! Notifications published by the polling engine.
//!
//! GUI or orchestration layers subscribe by holding the receiving end of the
//! [`EventSink`] channel handed to [`crate::mount::MountDevice::new`].

use serde::Serialize;
use tokio::sync::mpsc;

use crate::mount::clock::ClockState;
use crate::mount::dome::DomeState;
use crate::mount::firmware::FirmwareState;
use crate::mount::pointing::PointingState;
use crate::mount::setting::SettingState;

pub type EventSink = mpsc::UnboundedSender<MountEvent>;
pub type EventStream = mpsc::UnboundedReceiver<MountEvent>;

pub fn channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MountEvent {
    PointingUpdated(PointingState),
    DomeUpdated(DomeState),
    SettingUpdated(SettingState),
    ClockUpdated(ClockState),
    /// Firmware read once after the mount came up
    FirmwareUpdated(FirmwareState),
    /// Result of every reachability probe
    Reachability(bool),
    /// The mount became reachable after being down (or at first contact)
    MountUp,
    SlewFinished,
    Alert,
    /// Upload progress in percent, 0..=100
    TrajectoryProgress(u8),
    TrajectoryDone { replay: bool, programmed: bool },
}

impl MountEvent {
    /// Short name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            MountEvent::PointingUpdated(_) => "pointing",
            MountEvent::DomeUpdated(_) => "dome",
            MountEvent::SettingUpdated(_) => "setting",
            MountEvent::ClockUpdated(_) => "clock",
            MountEvent::FirmwareUpdated(_) => "firmware",
            MountEvent::Reachability(_) => "reachability",
            MountEvent::MountUp => "mount_up",
            MountEvent::SlewFinished => "slew_finished",
            MountEvent::Alert => "alert",
            MountEvent::TrajectoryProgress(_) => "trajectory_progress",
            MountEvent::TrajectoryDone { .. } => "trajectory_done",
        }
    }
}

/// Publish without caring whether anyone is still listening.
pub(crate) fn emit(sink: &EventSink, event: MountEvent) {
    if sink.send(event).is_err() {
        log::trace!("event receiver dropped");
    }
}
