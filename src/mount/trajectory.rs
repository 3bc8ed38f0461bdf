//! Satellite trajectory upload.
//!
//! A precomputed track is uploaded as a sequence of `:TRADD` batches followed by one
//! finalize command. The mount answers every `:TRADD` point with its own chunk, `E`
//! marking a rejected point. The finalize reply is `start,end,flip` on success.

use log::{info, warn};
use serde::Serialize;

use super::convert::value_to_float;
use crate::events::{emit, EventSink, MountEvent};
use crate::transport::Connection;

/// Upper bound on the number of `:TRADD` exchanges per upload
pub const MAX_CHUNKS: usize = 32;
const POINTS_PER_CHUNK: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct TrajectoryUpload {
    /// (altitude, azimuth) in degrees, in track order
    pub points: Vec<(f64, f64)>,
    pub replay: bool,
    /// Julian date (UTC) at which the track starts; sends `:TRNEW` first when set
    pub start_jd: Option<f64>,
}

/// Track window calculated by the mount
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryWindow {
    pub jd_start: Option<f64>,
    pub jd_end: Option<f64>,
    pub flip: bool,
}

/// Chunk sizes for `n` points: `min(32, ceil(n / 32))` chunks, the first ones one larger
/// where `n` does not divide evenly.
pub fn chunk_sizes(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let count = n.div_ceil(POINTS_PER_CHUNK).clamp(1, MAX_CHUNKS);
    let (base, extra) = (n / count, n % count);
    (0..count).map(|i| base + usize::from(i < extra)).collect()
}

pub fn split_chunks(points: &[(f64, f64)]) -> Vec<&[(f64, f64)]> {
    let mut rest = points;
    chunk_sizes(points.len())
        .into_iter()
        .map(|size| {
            let (head, tail) = rest.split_at(size);
            rest = tail;
            head
        })
        .collect()
}

pub fn progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done * 100 / total).min(100) as u8
}

fn add_command(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(alt, az)| format!(":TRADD{:.4},{:.4}#", az, alt))
        .collect()
}

/// Upload one trajectory and publish progress. Returns the mount's track window when the
/// trajectory was programmed.
pub async fn upload(
    conn: &Connection,
    upload: &TrajectoryUpload,
    events: &EventSink,
) -> Option<TrajectoryWindow> {
    let window = program(conn, upload, events).await;
    emit(
        events,
        MountEvent::TrajectoryDone {
            replay: upload.replay,
            programmed: window.is_some(),
        },
    );
    window
}

async fn program(
    conn: &Connection,
    upload: &TrajectoryUpload,
    events: &EventSink,
) -> Option<TrajectoryWindow> {
    if upload.points.is_empty() {
        warn!("trajectory upload without points");
        return None;
    }
    if let Some(jd) = upload.start_jd {
        if !start(conn, jd).await {
            return None;
        }
    }

    let chunks = split_chunks(&upload.points);
    let total = chunks.len();
    for (i, chunk) in chunks.into_iter().enumerate() {
        if !add(conn, chunk).await {
            warn!("trajectory chunk {}/{} rejected", i + 1, total);
            return None;
        }
        emit(events, MountEvent::TrajectoryProgress(progress(i + 1, total)));
    }

    let window = finalize(conn, upload.replay).await;
    if let Some(w) = &window {
        info!(
            "trajectory programmed: start {:?} end {:?} flip {}",
            w.jd_start, w.jd_end, w.flip
        );
    }
    window
}

async fn start(conn: &Connection, jd: f64) -> bool {
    let reply = conn.communicate(&format!(":TRNEW{}#", jd)).await;
    if !reply.success || reply.responses.len() != 1 {
        return false;
    }
    reply.responses[0] == "V"
}

async fn add(conn: &Connection, chunk: &[(f64, f64)]) -> bool {
    let reply = conn.communicate(&add_command(chunk)).await;
    if !reply.success {
        return false;
    }
    if reply.responses.len() != reply.chunks || reply.responses.len() != chunk.len() {
        warn!("wrong number of chunks in trajectory reply: {}", reply.responses.len());
        return false;
    }
    reply.responses.iter().all(|r| r != "E")
}

async fn finalize(conn: &Connection, replay: bool) -> Option<TrajectoryWindow> {
    let command = if replay { ":TRREPLAY#" } else { ":TRP#" };
    let reply = conn.communicate(command).await;
    if !reply.success || reply.responses.len() != 1 {
        return None;
    }
    parse_window(&reply.responses[0])
}

fn parse_window(value: &str) -> Option<TrajectoryWindow> {
    let fields: Vec<&str> = value.split(',').collect();
    let [start, end, flip] = fields.as_slice() else {
        warn!("trajectory not accepted: {}", value);
        return None;
    };
    Some(TrajectoryWindow {
        jd_start: value_to_float(start),
        jd_end: value_to_float(end),
        flip: flip.trim() == "F",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_is_bounded() {
        assert_eq!(chunk_sizes(0), Vec::<usize>::new());
        assert_eq!(chunk_sizes(1), vec![1]);
        assert_eq!(chunk_sizes(32), vec![32]);
        assert_eq!(chunk_sizes(33), vec![17, 16]);
        assert_eq!(chunk_sizes(640), vec![32; 20]);
        let big = chunk_sizes(5000);
        assert_eq!(big.len(), MAX_CHUNKS);
        assert_eq!(big.iter().sum::<usize>(), 5000);
    }

    #[test]
    fn split_keeps_order() {
        let points: Vec<(f64, f64)> = (0..70).map(|i| (i as f64, 0.0)).collect();
        let chunks = split_chunks(&points);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0][0].0, 0.0);
        assert_eq!(chunks[2].last().map(|p| p.0), Some(69.0));
    }

    #[test]
    fn add_command_sends_azimuth_first() {
        assert_eq!(
            add_command(&[(45.0, 180.5), (46.0, 181.0)]),
            ":TRADD180.5000,45.0000#:TRADD181.0000,46.0000#"
        );
    }

    #[test]
    fn window_reply() {
        let w = parse_window("2458352.1,2458352.2,F").expect("window");
        assert_eq!(w.jd_start, Some(2458352.1));
        assert!(w.flip);
        assert!(parse_window("E").is_none());
        assert!(parse_window("N").is_none());
    }

    #[test]
    fn progress_is_capped() {
        assert_eq!(progress(1, 3), 33);
        assert_eq!(progress(3, 3), 100);
        assert_eq!(progress(4, 3), 100);
    }
}
