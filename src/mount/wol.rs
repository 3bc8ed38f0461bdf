//! Wake-on-LAN boot of a powered-down mount.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use log::info;
use thiserror::Error;
use tokio::net::UdpSocket;

pub const DEFAULT_BROADCAST: &str = "255.255.255.255:9";

#[derive(Debug, Error)]
pub enum WolError {
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
    #[error("no MAC address configured")]
    NoMac,
    #[error("invalid broadcast address: {0}")]
    InvalidBroadcast(String),
    #[error("sending magic packet failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Six `0xFF` bytes followed by the address repeated sixteen times
    pub fn magic_packet(&self) -> Vec<u8> {
        let mut packet = vec![0xFF; 6];
        for _ in 0..16 {
            packet.extend_from_slice(&self.0);
        }
        packet
    }
}

impl FromStr for MacAddress {
    type Err = WolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WolError::InvalidMac(s.to_string());
        let parts: Vec<&str> = s.trim().split(|c: char| c == ':' || c == '-').collect();
        if parts.len() != 6 {
            return Err(invalid());
        }
        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

pub async fn boot_mount(mac: &MacAddress, broadcast: &str) -> Result<(), WolError> {
    let target: SocketAddr = broadcast
        .parse()
        .map_err(|_| WolError::InvalidBroadcast(broadcast.to_string()))?;
    let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind).await?;
    socket.set_broadcast(true)?;
    socket.send_to(&mac.magic_packet(), target).await?;
    info!("magic packet for {} sent to {}", mac, target);
    Ok(())
}
