//! One-shot firmware query, run each time the mount comes up.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::events::{emit, EventSink, MountEvent};
use crate::poll::Poll;
use crate::transport::Connection;
use crate::worker::WorkerPool;

/// Firmware query; `:U2#` keeps the mount in high precision mode.
pub const FIRMWARE_BATCH: &str = ":U2#:GVD#:GVN#:GVP#:GVT#";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FirmwareState {
    /// Build date, e.g. `Mar 19 2021`
    pub date: String,
    /// Version number, e.g. `2.16.11`
    pub number: String,
    pub product: String,
    pub time: String,
}

impl FirmwareState {
    /// `2.16.11` as `(2, 16, 11)`; missing parts count as zero.
    pub fn version(&self) -> Option<(u32, u32, u32)> {
        let mut parts = self.number.trim().split('.').map(|p| p.parse::<u32>().ok());
        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some((major, minor, patch))
    }

    pub fn parse(&mut self, response: &[String], chunks: usize) -> bool {
        if response.len() != chunks || response.len() != 4 {
            warn!("wrong number of chunks in firmware reply: {}", response.len());
            return false;
        }
        self.date = response[0].clone();
        self.number = response[1].clone();
        self.product = response[2].clone();
        self.time = response[3].clone();
        true
    }
}

impl Poll for FirmwareState {
    async fn poll(&mut self, conn: &Connection) -> bool {
        let reply = conn.communicate(FIRMWARE_BATCH).await;
        if !reply.success {
            return false;
        }
        self.parse(&reply.responses, reply.chunks)
    }
}

/// Startup action for the reachability hook: query the firmware once on the worker pool
/// and publish it.
pub(crate) fn fetch_on_startup(
    conn: Connection,
    pool: WorkerPool,
    events: EventSink,
    state: watch::Sender<FirmwareState>,
) -> impl FnMut() + Send + 'static {
    let state = Arc::new(state);
    move || {
        let conn = conn.clone();
        let events = events.clone();
        let state = Arc::clone(&state);
        pool.submit(async move {
            let mut firmware = FirmwareState::default();
            if !firmware.poll(&conn).await {
                warn!("firmware query failed");
                return;
            }
            info!(
                "mount {} firmware {} ({} {})",
                firmware.product, firmware.number, firmware.date, firmware.time
            );
            state.send_replace(firmware.clone());
            emit(&events, MountEvent::FirmwareUpdated(firmware));
        });
    }
}
