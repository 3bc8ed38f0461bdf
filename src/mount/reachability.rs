//! Reachability probe: a bare TCP connect with no protocol bytes.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time;

use crate::events::{emit, EventSink, MountEvent};
use crate::mount::liveness::LivenessWriter;
use crate::poll::Poll;
use crate::transport::{close_client_hard, Connection};

/// Short fixed connect deadline of the probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connect and immediately close again; any error means unreachable.
pub async fn check_reachable(addr: &str, timeout: Duration) -> bool {
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Err(_) => {
            debug!("mount connection to {} timed out", addr);
            false
        }
        Ok(Err(e)) => {
            debug!("mount {} not reachable: {}", addr, e);
            false
        }
        Ok(Ok(client)) => {
            close_client_hard(Some(client)).await;
            true
        }
    }
}

/// Poll state of the reachability cycle
#[derive(Debug, Clone, Serialize)]
pub struct Reachability {
    pub reachable: bool,
    #[serde(skip)]
    pub timeout: Duration,
}

impl Default for Reachability {
    fn default() -> Self {
        Self {
            reachable: false,
            timeout: PROBE_TIMEOUT,
        }
    }
}

impl Poll for Reachability {
    async fn poll(&mut self, conn: &Connection) -> bool {
        self.reachable = match conn.addr() {
            Some(addr) => check_reachable(&addr, self.timeout).await,
            None => false,
        };
        true
    }
}

/// Completion hook of the reachability cycle. Besides [`crate::mount::MountDevice::shutdown`]
/// it is the only place the liveness flag is written; `on_up` runs on every rising edge.
pub(crate) fn track_liveness(
    writer: Arc<LivenessWriter>,
    events: EventSink,
    mut on_up: impl FnMut() + Send + 'static,
) -> impl FnMut(&Reachability) + Send {
    move |probe: &Reachability| {
        let was = writer.set(probe.reachable);
        if probe.reachable != was {
            info!(
                "mount is {}",
                if probe.reachable { "reachable" } else { "not reachable" }
            );
        }
        if probe.reachable && !was {
            emit(&events, MountEvent::MountUp);
            on_up();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::mount::liveness;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn accepted_connect_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
        assert!(check_reachable(&addr, PROBE_TIMEOUT).await);
        let _ = accept.await;
    }

    #[tokio::test]
    async fn refused_connect_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        drop(listener);
        assert!(!check_reachable(&addr, PROBE_TIMEOUT).await);
    }

    #[tokio::test]
    async fn no_host_probes_nothing() {
        let mut probe = Reachability {
            reachable: true,
            ..Default::default()
        };
        assert!(probe.poll(&Connection::new(None, 3492)).await);
        assert!(!probe.reachable);
    }

    #[test]
    fn mount_up_fires_on_rising_edge_only() {
        let (tx, mut rx) = events::channel();
        let (writer, reader) = liveness::liveness();
        let startups = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&startups);
        let mut hook = track_liveness(Arc::new(writer), tx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let up = Reachability {
            reachable: true,
            ..Default::default()
        };
        let down = Reachability::default();

        hook(&up);
        hook(&up);
        assert!(reader.is_reachable());
        hook(&down);
        assert!(!reader.is_reachable());
        hook(&up);

        let mut mount_up = 0;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, MountEvent::MountUp) {
                mount_up += 1;
            }
        }
        assert_eq!(mount_up, 2);
        assert_eq!(startups.load(Ordering::SeqCst), 2);
    }
}
