//! Slow settings poll: slew rates, meridian and horizon limits, refraction data.

use log::warn;
use serde::Serialize;

use super::convert::value_to_float;
use crate::poll::Poll;
use crate::transport::Connection;

/// `:GREF`, `:Guaf` and `:Gdat` answer a single digit without end mark; together with the
/// `:Gh` reply they arrive as one segment, e.g. `110+90#`.
pub const SETTING_BATCH: &str =
    ":GMs#:GMsa#:GMsb#:Gmte#:Glmt#:Glms#:GRTMP#:GRPRS#:GTMP1#:GREF#:Guaf#:Gdat#:Gh#:Go#";

const SETTING_CHUNKS: usize = 11;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingState {
    /// Degrees per second
    pub slew_rate: Option<f64>,
    pub slew_rate_min: Option<f64>,
    pub slew_rate_max: Option<f64>,
    /// Minutes until the meridian flip
    pub time_to_flip: Option<f64>,
    /// Degrees
    pub meridian_limit_track: Option<f64>,
    pub meridian_limit_slew: Option<f64>,
    pub refraction_temp: Option<f64>,
    pub refraction_press: Option<f64>,
    pub telescope_temp_dec: Option<f64>,
    pub status_refraction: bool,
    pub status_unattended_flip: bool,
    pub status_dual_axis_tracking: bool,
    pub horizon_limit_high: Option<f64>,
    pub horizon_limit_low: Option<f64>,
}

impl SettingState {
    /// Minutes until the mount crosses the tracking meridian limit (4 minutes per degree).
    pub fn time_to_meridian(&self) -> Option<i64> {
        let flip = self.time_to_flip?;
        let limit = self.meridian_limit_track?;
        Some((flip - limit * 4.0) as i64)
    }

    pub fn parse(&mut self, response: &[String], chunks: usize) -> bool {
        if response.len() != chunks || response.len() != SETTING_CHUNKS {
            warn!("wrong number of chunks in setting reply: {}", response.len());
            return false;
        }
        let flags = response[9].as_bytes();
        if flags.len() < 3 || !response[9].is_char_boundary(3) {
            warn!("malformed setting flag block: {}", response[9]);
            return false;
        }

        self.slew_rate = value_to_float(&response[0]);
        self.slew_rate_min = value_to_float(&response[1]);
        self.slew_rate_max = value_to_float(&response[2]);
        self.time_to_flip = value_to_float(&response[3]);
        self.meridian_limit_track = value_to_float(&response[4]);
        self.meridian_limit_slew = value_to_float(&response[5]);
        self.refraction_temp = value_to_float(&response[6]);
        self.refraction_press = value_to_float(&response[7]);
        self.telescope_temp_dec = value_to_float(&response[8]);
        self.status_refraction = flags[0] == b'1';
        self.status_unattended_flip = flags[1] == b'1';
        self.status_dual_axis_tracking = flags[2] == b'1';
        self.horizon_limit_high = value_to_float(&response[9][3..]);
        self.horizon_limit_low = value_to_float(&response[10]);
        true
    }
}

impl Poll for SettingState {
    async fn poll(&mut self, conn: &Connection) -> bool {
        let reply = conn.communicate(SETTING_BATCH).await;
        if !reply.success {
            return false;
        }
        self.parse(&reply.responses, reply.chunks)
    }
}
