//! Fast pointing poll: sidereal time, axis angles and the `:Ginfo` status record.

use log::warn;
use serde::Serialize;

use super::convert::{value_to_float, value_to_int};
use super::slew::is_slewing;
use crate::poll::Poll;
use crate::transport::Connection;

/// Pointing poll batch; `:U2#` switches the mount to high precision and answers nothing.
pub const POINTING_BATCH: &str = ":U2#:GS#:GDUT#:GaXa#:GaXb#:Ginfo#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PierSide {
    East,
    West,
}

impl PierSide {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "E" | "e" => Some(PierSide::East),
            "W" | "w" => Some(PierSide::West),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PointingState {
    pub time_sidereal: String,
    /// UT1-UTC in seconds
    pub ut1_utc: Option<f64>,
    pub angular_pos_ra: Option<f64>,
    pub angular_pos_dec: Option<f64>,
    /// Hours
    pub ra_jnow: Option<f64>,
    /// Degrees
    pub dec_jnow: Option<f64>,
    pub pierside: Option<PierSide>,
    pub az: Option<f64>,
    pub alt: Option<f64>,
    pub time_jd: Option<f64>,
    pub status: Option<u32>,
    pub status_slew: bool,
    /// Pier side differs from the side seen while the mount was last settled
    pub flipped: bool,
    #[serde(skip)]
    pub(super) settled_pierside: Option<PierSide>,
}

impl PointingState {
    /// Parse the reply of [`POINTING_BATCH`].
    pub fn parse(&mut self, response: &[String], chunks: usize) -> bool {
        if response.len() != chunks || response.len() != 5 {
            warn!("wrong number of chunks in pointing reply: {}", response.len());
            return false;
        }
        let info: Vec<&str> = response[4].split(',').collect();
        if info.len() < 8 {
            warn!("malformed :Ginfo record: {}", response[4]);
            return false;
        }
        let Some(status) = value_to_int(info[6]).and_then(|s| u32::try_from(s).ok()) else {
            warn!("malformed mount status: {}", info[6]);
            return false;
        };

        self.time_sidereal = response[0].clone();
        // the mount flags pending leap seconds with a trailing L
        self.ut1_utc = value_to_float(&response[1].replace('L', ""));
        self.angular_pos_ra = value_to_float(&response[2]);
        self.angular_pos_dec = value_to_float(&response[3]);
        self.ra_jnow = value_to_float(info[0]);
        self.dec_jnow = value_to_float(info[1]);
        self.pierside = PierSide::parse(info[2]);
        self.az = value_to_float(info[3]);
        self.alt = value_to_float(info[4]);
        self.time_jd = value_to_float(info[5]);
        self.status = Some(status);
        self.status_slew = info[7].trim() == "1";

        self.flipped = matches!(
            (self.settled_pierside, self.pierside),
            (Some(before), Some(now)) if before != now
        );
        if !is_slewing(status) {
            self.settled_pierside = self.pierside;
        }
        true
    }
}

impl Poll for PointingState {
    async fn poll(&mut self, conn: &Connection) -> bool {
        let reply = conn.communicate(POINTING_BATCH).await;
        if !reply.success {
            return false;
        }
        self.parse(&reply.responses, reply.chunks)
    }
}
