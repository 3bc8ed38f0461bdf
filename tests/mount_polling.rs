mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::MockMount;
use mountlink::events::{self, EventStream, MountEvent};
use mountlink::mount::clock::CLOCK_BATCH;
use mountlink::mount::dome::DOME_BATCH;
use mountlink::mount::firmware::FIRMWARE_BATCH;
use mountlink::mount::pointing::{PierSide, POINTING_BATCH};
use mountlink::mount::setting::SETTING_BATCH;
use mountlink::mount::{CyclePeriods, MountDevice, MountOptions};
use tokio::net::TcpListener;
use tokio::time::{timeout, Instant};

const SETTING_REPLY: &str = "15#02#15#0123#05#20#+010.0#0950.0#+012.5#101+90#00#";

fn pointing_reply(pierside: &str, status: u32) -> Vec<u8> {
    format!(
        "13:15:35.68#0.12#+180.0#-045.5#19.44591,+88.0032,{},002.9803,+47.9945,2458352.10403639,{},0#",
        pierside, status
    )
    .into_bytes()
}

/// Pointing polls walk through `script` (pier side, status), repeating its last entry.
fn scripted_mount(script: Vec<(&'static str, u32)>) -> impl Fn(&str) -> Vec<Vec<u8>> {
    let polls = Arc::new(AtomicUsize::new(0));
    move |request: &str| match request {
        r if r == POINTING_BATCH => {
            let n = polls.fetch_add(1, Ordering::SeqCst).min(script.len() - 1);
            let (side, status) = script[n];
            vec![pointing_reply(side, status)]
        }
        r if r == SETTING_BATCH => vec![SETTING_REPLY.as_bytes().to_vec()],
        r if r == DOME_BATCH => vec![b"1#0#0#1800#".to_vec()],
        r if r == CLOCK_BATCH => vec![b"2458352.10403639#".to_vec()],
        r if r == FIRMWARE_BATCH => vec![b"Mar 19 2021#2.16.11#10micron GM1000HPS#10:56:38#".to_vec()],
        ":shutdown#" => vec![b"1".to_vec()],
        _ => vec![b"E#".to_vec()],
    }
}

fn fast_options(host: &str, port: u16) -> MountOptions {
    MountOptions {
        host: Some(host.to_string()),
        port,
        settle_flip: Duration::from_millis(150),
        periods: CyclePeriods {
            pointing: Duration::from_millis(30),
            dome: Duration::from_millis(30),
            clock: Duration::from_millis(30),
            reachability: Duration::from_millis(20),
            setting: Duration::from_millis(40),
        },
        ..Default::default()
    }
}

async fn collect_for(stream: &mut EventStream, window: Duration) -> Vec<MountEvent> {
    let deadline = Instant::now() + window;
    let mut out = Vec::new();
    while let Ok(Some(ev)) = timeout(deadline.saturating_duration_since(Instant::now()), stream.recv()).await {
        out.push(ev);
    }
    out
}

#[tokio::test]
async fn polls_every_enabled_subsystem() {
    let mock = MockMount::start(scripted_mount(vec![("W", 0)])).await;
    let (sink, mut stream) = events::channel();
    let mut mount = MountDevice::new(fast_options(&mock.host, mock.port), sink);
    mount.start_dome();
    mount.start_clock();
    mount.start();
    let pointing = mount.pointing().expect("running");

    let mut seen_up = false;
    let mut seen_pointing = false;
    let mut seen_setting = false;
    let mut seen_dome = false;
    let mut seen_clock = false;
    timeout(Duration::from_secs(5), async {
        while !(seen_up && seen_pointing && seen_setting && seen_dome && seen_clock) {
            match stream.recv().await.expect("closed") {
                MountEvent::MountUp => seen_up = true,
                MountEvent::PointingUpdated(p) if p.status.is_some() => {
                    assert_eq!(p.pierside, Some(PierSide::West));
                    assert_eq!(p.ra_jnow, Some(19.44591));
                    seen_pointing = true;
                }
                MountEvent::SettingUpdated(s) if s.slew_rate.is_some() => {
                    assert_eq!(s.horizon_limit_high, Some(90.0));
                    seen_setting = true;
                }
                MountEvent::DomeUpdated(d) if d.azimuth.is_some() => {
                    assert_eq!(d.azimuth, Some(180.0));
                    assert_eq!(d.shutter_state, Some(1));
                    seen_dome = true;
                }
                MountEvent::ClockUpdated(c) if c.mount_jd.is_some() => seen_clock = true,
                _ => {}
            }
        }
    })
    .await
    .expect("not every subsystem published");

    assert!(mount.is_reachable());
    assert_eq!(pointing.borrow().status, Some(0));

    mount.stop().await;
    assert!(!mount.is_running());
}

#[tokio::test]
async fn dome_and_clock_stay_idle_until_enabled() {
    let mock = MockMount::start(scripted_mount(vec![("E", 2)])).await;
    let (sink, mut stream) = events::channel();
    let mut mount = MountDevice::new(fast_options(&mock.host, mock.port), sink);
    mount.start();

    let events = collect_for(&mut stream, Duration::from_millis(400)).await;
    assert!(events.iter().any(|e| matches!(e, MountEvent::PointingUpdated(_))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, MountEvent::DomeUpdated(_) | MountEvent::ClockUpdated(_))));
    assert!(mock.requests().iter().all(|r| r != DOME_BATCH && r != CLOCK_BATCH));

    mount.start_dome();
    let events = collect_for(&mut stream, Duration::from_millis(400)).await;
    assert!(events.iter().any(|e| matches!(e, MountEvent::DomeUpdated(_))));

    mount.stop().await;
}

#[tokio::test]
async fn flipped_slew_finishes_once_after_settling() {
    let mock = MockMount::start(scripted_mount(vec![("E", 2), ("W", 0), ("W", 2)])).await;
    let (sink, mut stream) = events::channel();
    let mut mount = MountDevice::new(fast_options(&mock.host, mock.port), sink);
    mount.start();

    let events = collect_for(&mut stream, Duration::from_millis(900)).await;
    mount.stop().await;

    let finished = events
        .iter()
        .filter(|e| matches!(e, MountEvent::SlewFinished))
        .count();
    assert_eq!(finished, 1);
    assert!(!events.iter().any(|e| matches!(e, MountEvent::Alert)));
}

#[tokio::test]
async fn alert_status_is_reported_once() {
    let mock = MockMount::start(scripted_mount(vec![("E", 0), ("E", 99), ("E", 98), ("E", 0)])).await;
    let (sink, mut stream) = events::channel();
    let mut mount = MountDevice::new(fast_options(&mock.host, mock.port), sink);
    mount.start();

    let events = collect_for(&mut stream, Duration::from_millis(500)).await;
    mount.stop().await;

    let alerts = events.iter().filter(|e| matches!(e, MountEvent::Alert)).count();
    assert_eq!(alerts, 1);
}

#[tokio::test]
async fn unreachable_mount_is_never_queried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let (sink, mut stream) = events::channel();
    let mut mount = MountDevice::new(fast_options("127.0.0.1", port), sink);
    mount.start();

    let events = collect_for(&mut stream, Duration::from_millis(300)).await;
    mount.stop().await;

    assert!(events
        .iter()
        .any(|e| matches!(e, MountEvent::Reachability(false))));
    assert!(!events.iter().any(|e| matches!(e, MountEvent::MountUp)));
    // gated cycles keep republishing their unchanged state
    assert!(events
        .iter()
        .any(|e| matches!(e, MountEvent::PointingUpdated(p) if p.status.is_none())));
    assert!(!events
        .iter()
        .any(|e| matches!(e, MountEvent::PointingUpdated(p) if p.status.is_some())));
}

#[tokio::test]
async fn firmware_is_read_when_the_mount_comes_up() {
    let mock = MockMount::start(scripted_mount(vec![("W", 0)])).await;
    let (sink, mut stream) = events::channel();
    let mut mount = MountDevice::new(fast_options(&mock.host, mock.port), sink);
    mount.start();

    let firmware = timeout(Duration::from_secs(5), async {
        loop {
            if let MountEvent::FirmwareUpdated(fw) = stream.recv().await.expect("closed") {
                return fw;
            }
        }
    })
    .await
    .expect("firmware never published");
    assert_eq!(firmware.product, "10micron GM1000HPS");
    assert_eq!(firmware.version(), Some((2, 16, 11)));
    assert_eq!(mount.firmware().expect("running").borrow().number, "2.16.11");

    tokio::time::sleep(Duration::from_millis(150)).await;
    mount.stop().await;
    let queries = mock.requests().iter().filter(|r| *r == FIRMWARE_BATCH).count();
    assert_eq!(queries, 1, "firmware read more than once while the mount stayed up");
}

#[tokio::test]
async fn shutdown_marks_the_mount_down() {
    let mock = MockMount::start(scripted_mount(vec![("W", 0)])).await;
    let (sink, mut stream) = events::channel();
    let mut options = fast_options(&mock.host, mock.port);
    options.periods.reachability = Duration::from_secs(30);
    let mut mount = MountDevice::new(options, sink);
    mount.start();

    timeout(Duration::from_secs(5), async {
        while !matches!(stream.recv().await.expect("closed"), MountEvent::MountUp) {}
    })
    .await
    .expect("mount never came up");
    assert!(mount.is_reachable());

    assert!(mount.shutdown().await);
    assert!(!mount.is_reachable());
    assert!(mock.requests().iter().any(|r| r == ":shutdown#"));

    mount.stop().await;
}

#[tokio::test]
async fn refused_shutdown_is_reported() {
    let mock = MockMount::start(|_| vec![b"0".to_vec()]).await;
    let (sink, _stream) = events::channel();
    let mount = MountDevice::new(fast_options(&mock.host, mock.port), sink);
    assert!(!mount.shutdown().await);
    assert_eq!(mock.requests(), vec![":shutdown#"]);
}
