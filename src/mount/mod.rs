//! # Mount Device
//!
//! [`MountDevice`] wires the subsystem polls into running cycles: reachability gates
//! everything else through the liveness flag, the pointing cycle drives the slew monitor,
//! and dome and clock cycles only run while enabled. All cycles share one worker pool,
//! one event sink and one cancellation token.
//!
//! ```rust,no_run
//! use mountlink::events;
//! use mountlink::mount::{MountDevice, MountOptions};
//!
//! # async fn run() {
//! let (sink, mut stream) = events::channel();
//! let mut mount = MountDevice::new(
//!     MountOptions { host: Some("192.168.2.15".into()), ..Default::default() },
//!     sink,
//! );
//! mount.start();
//! while let Some(event) = stream.recv().await {
//!     println!("{}", event.name());
//! }
//! mount.stop().await;
//! # }
//! ```

pub mod clock;
pub mod convert;
pub mod dome;
pub mod firmware;
pub mod liveness;
pub mod pointing;
pub mod reachability;
pub mod setting;
pub mod slew;
pub mod trajectory;
pub mod wol;

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{emit, EventSink, MountEvent};
use crate::poll::{CycleContext, CycleHandle, PollCycle};
use crate::transport::{Connection, Timeouts, DEFAULT_PORT};
use crate::worker::{WorkerPool, DEFAULT_WORKERS};
use clock::ClockState;
use dome::DomeState;
use firmware::{fetch_on_startup, FirmwareState};
use liveness::{LivenessReader, LivenessWriter};
use pointing::PointingState;
use reachability::{track_liveness, Reachability, PROBE_TIMEOUT};
use setting::SettingState;
use slew::SlewMonitor;
use trajectory::{TrajectoryUpload, TrajectoryWindow};
use wol::{boot_mount, MacAddress, WolError, DEFAULT_BROADCAST};

/// Delay after a meridian flip before the slew counts as finished
pub const DEFAULT_SETTLE_FLIP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePeriods {
    pub pointing: Duration,
    pub dome: Duration,
    pub clock: Duration,
    pub reachability: Duration,
    pub setting: Duration,
}

impl Default for CyclePeriods {
    fn default() -> Self {
        Self {
            pointing: Duration::from_millis(500),
            dome: Duration::from_millis(950),
            clock: Duration::from_millis(1000),
            reachability: Duration::from_millis(2700),
            setting: Duration::from_millis(3100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MountOptions {
    pub host: Option<String>,
    pub port: u16,
    pub mac: Option<String>,
    pub timeouts: Timeouts,
    pub probe_timeout: Duration,
    pub settle_flip: Duration,
    pub periods: CyclePeriods,
    pub workers: usize,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            mac: None,
            timeouts: Timeouts::default(),
            probe_timeout: PROBE_TIMEOUT,
            settle_flip: DEFAULT_SETTLE_FLIP,
            periods: CyclePeriods::default(),
            workers: DEFAULT_WORKERS,
        }
    }
}

struct Cycles {
    cancel: CancellationToken,
    liveness: LivenessReader,
    liveness_writer: Arc<LivenessWriter>,
    firmware: watch::Receiver<FirmwareState>,
    reachability: CycleHandle<Reachability>,
    pointing: CycleHandle<PointingState>,
    setting: CycleHandle<SettingState>,
    dome: CycleHandle<DomeState>,
    clock: CycleHandle<ClockState>,
}

pub struct MountDevice {
    options: MountOptions,
    conn: Connection,
    pool: WorkerPool,
    events: EventSink,
    dome_enabled: bool,
    clock_enabled: bool,
    cycles: Option<Cycles>,
}

impl MountDevice {
    pub fn new(options: MountOptions, events: EventSink) -> Self {
        let conn = Connection::new(options.host.clone(), options.port).with_timeouts(options.timeouts);
        let pool = WorkerPool::new(options.workers);
        Self {
            options,
            conn,
            pool,
            events,
            dome_enabled: false,
            clock_enabled: false,
            cycles: None,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_running(&self) -> bool {
        self.cycles.is_some()
    }

    /// Spawn all cycles. Calling it while running does nothing.
    pub fn start(&mut self) {
        if self.cycles.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let ctx = CycleContext {
            conn: self.conn.clone(),
            pool: self.pool.clone(),
            events: self.events.clone(),
            cancel: cancel.clone(),
        };
        let periods = self.options.periods;
        let (writer, liveness) = liveness::liveness();
        let writer = Arc::new(writer);
        let (firmware_tx, firmware) = watch::channel(FirmwareState::default());
        let startup = fetch_on_startup(
            self.conn.clone(),
            self.pool.clone(),
            self.events.clone(),
            firmware_tx,
        );

        let reachability = PollCycle::new("reachability", periods.reachability, |s: &Reachability| {
            MountEvent::Reachability(s.reachable)
        })
        .with_state(Reachability {
            reachable: false,
            timeout: self.options.probe_timeout,
        })
        .on_complete(track_liveness(Arc::clone(&writer), self.events.clone(), startup))
        .spawn(ctx.clone());

        let mut monitor = SlewMonitor::new(self.options.settle_flip, self.events.clone());
        let pointing = PollCycle::new("pointing", periods.pointing, |s: &PointingState| {
            MountEvent::PointingUpdated(s.clone())
        })
        .gated_by(liveness.clone())
        .on_complete(move |s: &PointingState| monitor.observe(s))
        .spawn(ctx.clone());

        let setting = PollCycle::new("setting", periods.setting, |s: &SettingState| {
            MountEvent::SettingUpdated(s.clone())
        })
        .gated_by(liveness.clone())
        .spawn(ctx.clone());

        let mut dome = PollCycle::new("dome", periods.dome, |s: &DomeState| {
            MountEvent::DomeUpdated(s.clone())
        })
        .gated_by(liveness.clone());
        if !self.dome_enabled {
            dome = dome.disabled();
        }
        let dome = dome.spawn(ctx.clone());

        let mut clock = PollCycle::new("clock", periods.clock, |s: &ClockState| {
            MountEvent::ClockUpdated(s.clone())
        })
        .gated_by(liveness.clone());
        if !self.clock_enabled {
            clock = clock.disabled();
        }
        let clock = clock.spawn(ctx);

        info!(
            "polling mount {} with {} workers",
            self.conn.addr().unwrap_or_else(|| "<no host>".into()),
            self.pool.size()
        );
        self.cycles = Some(Cycles {
            cancel,
            liveness,
            liveness_writer: writer,
            firmware,
            reachability,
            pointing,
            setting,
            dome,
            clock,
        });
    }

    /// Cancel every cycle and wait until their drivers have exited.
    pub async fn stop(&mut self) {
        let Some(cycles) = self.cycles.take() else {
            return;
        };
        cycles.cancel.cancel();
        cycles.reachability.join().await;
        cycles.pointing.join().await;
        cycles.setting.join().await;
        cycles.dome.join().await;
        cycles.clock.join().await;
        info!("mount polling stopped");
    }

    pub fn start_dome(&mut self) {
        self.dome_enabled = true;
        if let Some(c) = &self.cycles {
            c.dome.start();
        }
    }

    pub fn stop_dome(&mut self) {
        self.dome_enabled = false;
        if let Some(c) = &self.cycles {
            c.dome.stop();
        }
    }

    pub fn start_clock(&mut self) {
        self.clock_enabled = true;
        if let Some(c) = &self.cycles {
            c.clock.start();
        }
    }

    pub fn stop_clock(&mut self) {
        self.clock_enabled = false;
        if let Some(c) = &self.cycles {
            c.clock.stop();
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.cycles.as_ref().is_some_and(|c| c.liveness.is_reachable())
    }

    pub fn pointing(&self) -> Option<watch::Receiver<PointingState>> {
        self.cycles.as_ref().map(|c| c.pointing.subscribe())
    }

    pub fn setting(&self) -> Option<watch::Receiver<SettingState>> {
        self.cycles.as_ref().map(|c| c.setting.subscribe())
    }

    pub fn dome(&self) -> Option<watch::Receiver<DomeState>> {
        self.cycles.as_ref().map(|c| c.dome.subscribe())
    }

    pub fn clock(&self) -> Option<watch::Receiver<ClockState>> {
        self.cycles.as_ref().map(|c| c.clock.subscribe())
    }

    /// Firmware read at the last rising edge of reachability
    pub fn firmware(&self) -> Option<watch::Receiver<FirmwareState>> {
        self.cycles.as_ref().map(|c| c.firmware.clone())
    }

    /// Ask the mount computer to shut down. On success the mount counts as unreachable
    /// until the next probe; power can be cut about 20 seconds later.
    pub async fn shutdown(&self) -> bool {
        let reply = self.conn.communicate(":shutdown#").await;
        let accepted = reply.success && reply.responses.first().is_some_and(|r| r != "0");
        if !accepted {
            warn!("mount refused shutdown");
            return false;
        }
        info!("mount shutting down");
        if let Some(c) = &self.cycles {
            c.liveness_writer.set(false);
            emit(&self.events, MountEvent::Reachability(false));
        }
        true
    }

    /// Upload a trajectory as one worker pool unit.
    pub fn prog_trajectory(&self, upload: TrajectoryUpload) -> JoinHandle<Option<TrajectoryWindow>> {
        let conn = self.conn.clone();
        let events = self.events.clone();
        self.pool
            .submit(async move { trajectory::upload(&conn, &upload, &events).await })
    }

    /// Send a Wake-on-LAN packet to the configured MAC address.
    pub async fn boot(&self) -> Result<(), WolError> {
        let mac: MacAddress = self.options.mac.as_deref().ok_or(WolError::NoMac)?.parse()?;
        boot_mount(&mac, DEFAULT_BROADCAST).await
    }
}

impl Drop for MountDevice {
    fn drop(&mut self) {
        if let Some(cycles) = &self.cycles {
            warn!("mount device dropped while polling; cancelling cycles");
            cycles.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;

    #[tokio::test]
    async fn start_and_stop_without_host() {
        let (tx, mut rx) = events::channel();
        let mut mount = MountDevice::new(
            MountOptions {
                periods: CyclePeriods {
                    reachability: Duration::from_millis(10),
                    ..Default::default()
                },
                ..Default::default()
            },
            tx,
        );
        mount.start();
        assert!(mount.is_running());

        let ev = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                match rx.recv().await {
                    Some(MountEvent::Reachability(r)) => return r,
                    Some(_) => continue,
                    None => panic!("closed"),
                }
            }
        })
        .await
        .expect("timeout");
        assert!(!ev);
        assert!(!mount.is_reachable());

        mount.stop().await;
        assert!(!mount.is_running());
        assert!(mount.pointing().is_none());
    }

    #[tokio::test]
    async fn boot_without_mac_fails() {
        let (tx, _rx) = events::channel();
        let mount = MountDevice::new(MountOptions::default(), tx);
        assert!(matches!(mount.boot().await, Err(WolError::NoMac)));
    }

    #[tokio::test]
    async fn shutdown_without_host_fails() {
        let (tx, _rx) = events::channel();
        let mount = MountDevice::new(MountOptions::default(), tx);
        assert!(!mount.shutdown().await);
        assert!(mount.firmware().is_none());
    }
}
