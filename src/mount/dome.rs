//! Dome status as seen by the mount (only polled while a dome is attached).

use log::warn;
use serde::Serialize;

use super::convert::{value_to_float, value_to_int};
use crate::poll::Poll;
use crate::transport::Connection;

pub const DOME_BATCH: &str = ":GDS#:GDF#:GDW#:GDA#";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomeState {
    /// 0 closed, 1 open, 2 moving
    pub shutter_state: Option<u8>,
    pub flap_state: Option<u8>,
    pub slewing: Option<bool>,
    /// Degrees, 0..360
    pub azimuth: Option<f64>,
}

fn opening_state(value: &str) -> Option<u8> {
    match value_to_int(value)? {
        v @ 0..=2 => Some(v as u8),
        _ => None,
    }
}

impl DomeState {
    pub fn parse(&mut self, response: &[String], chunks: usize) -> bool {
        if response.len() != chunks || response.len() != 4 {
            warn!("wrong number of chunks in dome reply: {}", response.len());
            return false;
        }
        self.shutter_state = opening_state(&response[0]);
        self.flap_state = opening_state(&response[1]);
        self.slewing = value_to_int(&response[2]).map(|v| v != 0);
        // tenths of a degree
        self.azimuth = value_to_float(&response[3]).map(|v| (v / 10.0).rem_euclid(360.0));
        true
    }
}

impl Poll for DomeState {
    async fn poll(&mut self, conn: &Connection) -> bool {
        let reply = conn.communicate(DOME_BATCH).await;
        if !reply.success {
            return false;
        }
        self.parse(&reply.responses, reply.chunks)
    }
}
