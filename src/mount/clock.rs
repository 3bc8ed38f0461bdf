//! Mount clock drift against the host clock.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use super::convert::value_to_float;
use crate::poll::Poll;
use crate::transport::Connection;

pub const CLOCK_BATCH: &str = ":GJD1#";

/// Samples averaged into [`ClockState::time_diff_ms`]
const SAMPLES: usize = 5;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const MS_PER_DAY: f64 = 86_400_000.0;

pub fn julian_date(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / MS_PER_DAY + UNIX_EPOCH_JD
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClockState {
    pub mount_jd: Option<f64>,
    /// Mean of the recent mount-minus-host differences, milliseconds
    pub time_diff_ms: Option<f64>,
    #[serde(skip)]
    samples: VecDeque<f64>,
}

impl ClockState {
    pub fn parse(&mut self, response: &[String], chunks: usize, host: DateTime<Utc>) -> bool {
        if response.len() != chunks || response.len() != 1 {
            warn!("wrong number of chunks in clock reply: {}", response.len());
            return false;
        }
        let Some(mount_jd) = value_to_float(&response[0]) else {
            warn!("malformed julian date: {}", response[0]);
            return false;
        };
        self.mount_jd = Some(mount_jd);
        self.push_sample((mount_jd - julian_date(host)) * MS_PER_DAY);
        true
    }

    fn push_sample(&mut self, diff_ms: f64) {
        if self.samples.len() == SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(diff_ms);
        self.time_diff_ms = Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64);
    }
}

impl Poll for ClockState {
    async fn poll(&mut self, conn: &Connection) -> bool {
        let reply = conn.communicate(CLOCK_BATCH).await;
        if !reply.success {
            return false;
        }
        self.parse(&reply.responses, reply.chunks, Utc::now())
    }
}
