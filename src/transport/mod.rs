//! # Mount Transport
//!
//! One [`Connection::exchange`] owns exactly one TCP socket for its whole lifetime:
//! connect, send the batch in one write, receive until the classified reply shape is
//! satisfied, then shut down and close. Sockets are never reused or pooled; the mount
//! computer handles short-lived connections better than idle ones.
//!
//! Failures are typed as [`TransportError`] underneath, but [`Connection::communicate`]
//! swallows them into a failed [`Reply`] so that pollers treat any failure as
//! "state unchanged, retry next cycle".
//!
//! ```rust,no_run
//! use mountlink::transport::Connection;
//!
//! #[tokio::main]
//! async fn main() {
//!     let conn = Connection::new(Some("192.168.2.15".to_string()), 3492);
//!     let reply = conn.communicate(":U2#:GS#:Ginfo#").await;
//!     if reply.success {
//!         println!("sidereal time {}", reply.responses[0]);
//!     }
//! }
//! ```

use std::io;
use std::net::Shutdown;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace, warn};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::logutil::{escape_bytes, escape_log};
use crate::metrics::{self, FailureClass};
use crate::protocol::{self, BatchShape};

/// Default command port of the mount computer
pub const DEFAULT_PORT: u16 = 3492;

/// Replies normally arrive within half a second; two seconds leaves room for busy mounts.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(2);

const RECV_CHUNK: usize = 2048;

pub const REASON_SOCKET_ERROR: &str = "Socket error";
pub const REASON_TIMEOUT: &str = "Timeout";
pub const REASON_EXCEPTION: &str = "Exception";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unknown command in batch: {0}")]
    InvalidCommand(String),
    #[error("no mount host configured")]
    NoHost,
    #[error("connect to {addr} timed out")]
    ConnectTimeout { addr: String },
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    #[error("receive timed out after {received} bytes")]
    ReceiveTimeout { received: usize },
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
    #[error("reply contains non-ASCII data")]
    Decode,
    #[error(
        "connection closed early: {chunks}/{expected_chunks} chunks, {bytes}/{min_bytes} bytes"
    )]
    Shape {
        expected_chunks: usize,
        chunks: usize,
        min_bytes: usize,
        bytes: usize,
    },
}

impl TransportError {
    pub fn class(&self) -> FailureClass {
        match self {
            TransportError::InvalidCommand(_) | TransportError::NoHost => FailureClass::Rejected,
            TransportError::ConnectTimeout { .. } | TransportError::Connect { .. } => {
                FailureClass::Connect
            }
            TransportError::Send(_) => FailureClass::Send,
            TransportError::ReceiveTimeout { .. }
            | TransportError::Receive(_)
            | TransportError::Decode => FailureClass::Receive,
            TransportError::Shape { .. } => FailureClass::Shape,
        }
    }
}

/// Socket deadlines of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub receive: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: SOCKET_TIMEOUT,
            receive: SOCKET_TIMEOUT,
        }
    }
}

/// Successful exchange result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Reply segments in command order, split on `#`
    pub tokens: Vec<String>,
    /// Number of `#` delimiters actually received
    pub chunks: usize,
}

/// Outcome of [`Connection::communicate`]; never carries partial data on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub success: bool,
    pub responses: Vec<String>,
    pub chunks: usize,
}

impl Reply {
    pub fn failed() -> Self {
        Self::default()
    }
}

impl From<Response> for Reply {
    fn from(r: Response) -> Self {
        Self {
            success: true,
            responses: r.tokens,
            chunks: r.chunks,
        }
    }
}

/// Outcome of [`Connection::communicate_raw`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub connected: bool,
    pub received: bool,
    /// Decoded payload on success, otherwise one of the `REASON_*` literals
    pub payload: String,
}

impl RawReply {
    fn failure(connected: bool, reason: &str) -> Self {
        Self {
            connected,
            received: false,
            payload: reason.to_string(),
        }
    }
}

/// Address and deadlines of the mount command port. Cheap to clone; holds no socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    host: Option<String>,
    port: u16,
    timeouts: Timeouts,
}

impl Connection {
    pub fn new(host: Option<String>, port: u16) -> Self {
        Self {
            host,
            port,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// `host:port`, or `None` while host or port are unset
    pub fn addr(&self) -> Option<String> {
        match &self.host {
            Some(host) if !host.trim().is_empty() && self.port != 0 => {
                let host = host.trim();
                // IPv6 literals need brackets before the port
                if host.contains(':') && !host.starts_with('[') {
                    Some(format!("[{}]:{}", host, self.port))
                } else {
                    Some(format!("{}:{}", host, self.port))
                }
            }
            _ => None,
        }
    }

    pub fn has_host(&self) -> bool {
        self.addr().is_some()
    }

    /// Validate, send and receive one command batch; failures collapse into a failed reply.
    pub async fn communicate(&self, batch: &str) -> Reply {
        match self.exchange(batch).await {
            Ok(response) => {
                metrics::inc_exchange_ok();
                response.into()
            }
            Err(e) => {
                metrics::inc_exchange_failed(e.class());
                match e {
                    TransportError::InvalidCommand(_) => warn!("{}", e),
                    _ => debug!("exchange failed: {}", e),
                }
                Reply::failed()
            }
        }
    }

    /// Typed variant of [`Connection::communicate`].
    pub async fn exchange(&self, batch: &str) -> Result<Response, TransportError> {
        if !protocol::valid_command_set(batch) {
            return Err(TransportError::InvalidCommand(escape_log(batch)));
        }
        let addr = self.addr().ok_or(TransportError::NoHost)?;
        let shape = protocol::classify(batch);
        let id = exchange_id();
        trace!(
            "[{}] sending  : {}, getData: {}, minBytes: {}, chunks: {}, host: {}",
            id,
            escape_log(batch),
            shape.must_wait,
            shape.min_bytes,
            shape.chunks_to_receive,
            addr
        );

        let mut client = self.build_client(&addr).await?;
        let result = self.transfer(&mut client, batch, shape).await;
        close_client_hard(Some(client)).await;

        let response = result?;
        trace!("[{}] response : {:?}", id, response.tokens);
        Ok(response)
    }

    async fn transfer(
        &self,
        client: &mut TcpStream,
        batch: &str,
        shape: BatchShape,
    ) -> Result<Response, TransportError> {
        client
            .write_all(batch.as_bytes())
            .await
            .map_err(TransportError::Send)?;
        if !shape.must_wait {
            return Ok(Response::default());
        }
        let raw = receive_data(client, shape, self.timeouts.receive).await?;
        Ok(split_response(&raw))
    }

    async fn build_client(&self, addr: &str) -> Result<TcpStream, TransportError> {
        let client = match time::timeout(self.timeouts.connect, TcpStream::connect(addr)).await {
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr: addr.to_string(),
                })
            }
            Ok(Err(source)) => {
                return Err(TransportError::Connect {
                    addr: addr.to_string(),
                    source,
                })
            }
            Ok(Ok(client)) => client,
        };
        if let Err(e) = client.set_nodelay(true) {
            debug!("could not set TCP_NODELAY on {}: {}", addr, e);
        }
        Ok(client)
    }

    /// Send without validation and return whatever the first read delivers.
    ///
    /// Used for service commands outside the vocabulary; the caller interprets the
    /// payload itself.
    pub async fn communicate_raw(&self, batch: &str) -> RawReply {
        let Some(addr) = self.addr() else {
            return RawReply::failure(false, REASON_SOCKET_ERROR);
        };
        let mut client = match self.build_client(&addr).await {
            Ok(client) => client,
            Err(e) => {
                debug!("raw exchange: {}", e);
                metrics::inc_exchange_failed(e.class());
                return RawReply::failure(false, REASON_SOCKET_ERROR);
            }
        };

        let reply = raw_transfer(&mut client, batch, self.timeouts.receive).await;
        close_client_hard(Some(client)).await;
        reply
    }
}

/// Shut down both directions and close; never fails outward.
///
/// Returns false if there is no client or the shutdown is refused (e.g. the peer has
/// already reset the connection).
pub async fn close_client_hard(client: Option<TcpStream>) -> bool {
    let Some(client) = client else {
        return false;
    };
    match client
        .into_std()
        .and_then(|socket| socket.shutdown(Shutdown::Both))
    {
        Ok(()) => true,
        Err(e) => {
            debug!("hard close: {}", e);
            false
        }
    }
}

/// Send and take the first read of a raw exchange on an already connected client.
async fn raw_transfer<S>(client: &mut S, batch: &str, timeout: Duration) -> RawReply
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = client.write_all(batch.as_bytes()).await {
        debug!("raw exchange: send failed: {}", e);
        metrics::inc_exchange_failed(FailureClass::Send);
        return RawReply::failure(true, REASON_EXCEPTION);
    }

    let mut buf = vec![0u8; RECV_CHUNK];
    match time::timeout(timeout, client.read(&mut buf)).await {
        Err(_) => {
            metrics::inc_exchange_failed(FailureClass::Receive);
            RawReply::failure(true, REASON_TIMEOUT)
        }
        Ok(Err(e)) => {
            debug!("raw exchange: receive failed: {}", e);
            metrics::inc_exchange_failed(FailureClass::Receive);
            RawReply::failure(true, REASON_EXCEPTION)
        }
        Ok(Ok(n)) => match decode_ascii(&buf[..n]) {
            Some(payload) => {
                metrics::inc_exchange_ok();
                RawReply {
                    connected: true,
                    received: true,
                    payload,
                }
            }
            None => {
                metrics::inc_exchange_failed(FailureClass::Receive);
                RawReply::failure(true, REASON_EXCEPTION)
            }
        },
    }
}

async fn receive_data(
    client: &mut TcpStream,
    shape: BatchShape,
    timeout: Duration,
) -> Result<String, TransportError> {
    let mut buf = BytesMut::with_capacity(RECV_CHUNK);
    loop {
        let before = buf.len();
        let n = match time::timeout(timeout, client.read_buf(&mut buf)).await {
            Err(_) => return Err(TransportError::ReceiveTimeout { received: buf.len() }),
            Ok(Err(e)) => return Err(TransportError::Receive(e)),
            Ok(Ok(n)) => n,
        };
        if n == 0 {
            return Err(TransportError::Shape {
                expected_chunks: shape.chunks_to_receive,
                chunks: count_chunks(&buf),
                min_bytes: shape.min_bytes,
                bytes: buf.len(),
            });
        }
        if !buf[before..].is_ascii() {
            debug!("non-ASCII reply: {}", escape_bytes(&buf));
            return Err(TransportError::Decode);
        }
        if shape_satisfied(&buf, shape) {
            break;
        }
    }
    decode_ascii(&buf).ok_or(TransportError::Decode)
}

fn count_chunks(data: &[u8]) -> usize {
    data.iter().filter(|&&b| b == b'#').count()
}

fn shape_satisfied(data: &[u8], shape: BatchShape) -> bool {
    count_chunks(data) >= shape.chunks_to_receive && data.len() >= shape.min_bytes
}

fn decode_ascii(data: &[u8]) -> Option<String> {
    if data.is_ascii() {
        std::str::from_utf8(data).ok().map(str::to_string)
    } else {
        None
    }
}

fn split_response(raw: &str) -> Response {
    Response {
        tokens: raw
            .trim_end_matches('#')
            .split('#')
            .map(str::to_string)
            .collect(),
        chunks: count_chunks(raw.as_bytes()),
    }
}

fn exchange_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_trims_the_final_end_mark() {
        let r = split_response("13:15:35.68#0.12#");
        assert_eq!(r.tokens, vec!["13:15:35.68", "0.12"]);
        assert_eq!(r.chunks, 2);
    }

    #[test]
    fn ack_bytes_merge_into_the_next_chunk() {
        let r = split_response("1+90#");
        assert_eq!(r.tokens, vec!["1+90"]);
        assert_eq!(r.chunks, 1);
        let r = split_response("1");
        assert_eq!(r.tokens, vec!["1"]);
        assert_eq!(r.chunks, 0);
    }

    #[test]
    fn shape_needs_chunks_and_bytes() {
        let shape = protocol::classify(":GTsid#:Gd#");
        assert!(!shape_satisfied(b"1", shape));
        assert!(shape_satisfied(b"1+45*00:00.0#", shape));
        let ack_only = protocol::classify(":Sz180*00#");
        assert!(shape_satisfied(b"1", ack_only));
    }

    #[test]
    fn addr_requires_host_and_port() {
        assert_eq!(Connection::new(None, DEFAULT_PORT).addr(), None);
        assert_eq!(Connection::new(Some(" ".into()), DEFAULT_PORT).addr(), None);
        assert_eq!(Connection::new(Some("mount".into()), 0).addr(), None);
        assert_eq!(
            Connection::new(Some("mount".into()), 3492).addr().as_deref(),
            Some("mount:3492")
        );
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        assert_eq!(
            Connection::new(Some("::1".into()), 3492).addr().as_deref(),
            Some("[::1]:3492")
        );
        assert_eq!(
            Connection::new(Some("[fe80::1]".into()), 3492).addr().as_deref(),
            Some("[fe80::1]:3492")
        );
    }

    #[tokio::test]
    async fn ipv6_loopback_exchange() {
        let Ok(listener) = tokio::net::TcpListener::bind("[::1]:0").await else {
            // host without IPv6
            return;
        };
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(b"13:15:35.68#").await;
        });
        let response = Connection::new(Some("::1".into()), port)
            .exchange(":GS#")
            .await
            .expect("exchange");
        assert_eq!(response.tokens, vec!["13:15:35.68"]);
    }

    #[tokio::test]
    async fn raw_send_failure_stops_before_reading() {
        let mut client = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "reset"))
            .build();
        let reply = raw_transfer(&mut client, ":GVN#", SOCKET_TIMEOUT).await;
        assert!(reply.connected);
        assert!(!reply.received);
        assert_eq!(reply.payload, REASON_EXCEPTION);
    }

    #[tokio::test]
    async fn raw_transfer_returns_first_read() {
        let mut client = tokio_test::io::Builder::new()
            .write(b":GVN#")
            .read(b"10micron GM1000HPS#")
            .build();
        let reply = raw_transfer(&mut client, ":GVN#", SOCKET_TIMEOUT).await;
        assert!(reply.connected);
        assert!(reply.received);
        assert_eq!(reply.payload, "10micron GM1000HPS#");
    }

    #[tokio::test]
    async fn no_host_fails_without_io() {
        let conn = Connection::new(None, DEFAULT_PORT);
        let err = conn.exchange(":GS#").await.unwrap_err();
        assert!(matches!(err, TransportError::NoHost));
        assert_eq!(conn.communicate(":GS#").await, Reply::failed());
    }

    #[tokio::test]
    async fn unknown_command_is_rejected_first() {
        let conn = Connection::new(None, DEFAULT_PORT);
        let err = conn.exchange(":AP#:test#").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn close_without_client_reports_false() {
        assert!(!close_client_hard(None).await);
    }

    #[tokio::test]
    async fn raw_without_host_is_a_socket_error() {
        let reply = Connection::new(None, DEFAULT_PORT).communicate_raw(":GVN#").await;
        assert!(!reply.connected);
        assert!(!reply.received);
        assert_eq!(reply.payload, REASON_SOCKET_ERROR);
    }
}
