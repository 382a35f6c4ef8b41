//! Tracing initialisation and the on-vehicle snapshot ring.
//!
//! Call [`init_tracing`] once at process startup to wire up the `tracing`
//! subscriber.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `BURRO_LOG` | Log filter (default `"info"`). |
//! | `BURRO_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! burro_runtime::telemetry::init_tracing();
//! ```

use std::collections::VecDeque;

use burro_types::Snapshot;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// ────────────────────────────────────────────────────────────────────────────
// Subscriber setup
// ────────────────────────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// Reads the filter from `BURRO_LOG` (default `"info"`) and switches to
/// newline-delimited JSON when `BURRO_LOG_FORMAT=json`, for ingestion by an
/// off-vehicle collector.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed; call this once,
/// from the binary.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_env("BURRO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var("BURRO_LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SnapshotRing
// ────────────────────────────────────────────────────────────────────────────

/// Bounded history of [`Snapshot`]s, oldest dropped first.
///
/// The control loop pushes one snapshot per tick; consumers (telemetry
/// export, the sim status line) read [`latest`][SnapshotRing::latest] or
/// walk the ring for a short history.
#[derive(Debug)]
pub struct SnapshotRing {
    buf: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotRing {
    /// A ring holding at most `capacity` snapshots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.buf.back()
    }

    /// Oldest-to-newest walk of the retained history.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.buf.iter()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use burro_types::{ImuSample, Pose};
    use chrono::Utc;

    use super::*;

    fn snapshot_at(uptime: f32) -> Snapshot {
        Snapshot {
            captured_at: Utc::now(),
            uptime,
            imu: ImuSample::default(),
            estimated: Pose::default(),
            current_waypoint: None,
            next_waypoint: None,
            has_fix: false,
        }
    }

    #[test]
    fn ring_keeps_only_the_newest() {
        let mut ring = SnapshotRing::new(3);
        for i in 0..5 {
            ring.push(snapshot_at(i as f32));
        }
        assert_eq!(ring.len(), 3);
        let uptimes: Vec<f32> = ring.iter().map(|s| s.uptime).collect();
        assert_eq!(uptimes, vec![2.0, 3.0, 4.0]);
        assert_eq!(ring.latest().map(|s| s.uptime), Some(4.0));
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut ring = SnapshotRing::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.push(snapshot_at(0.0));
        ring.push(snapshot_at(1.0));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.latest().map(|s| s.uptime), Some(1.0));
    }

    #[test]
    fn latest_is_none_when_empty() {
        let ring = SnapshotRing::new(4);
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
    }

    #[test]
    fn snapshots_serialize_for_export() {
        let json = serde_json::to_string(&snapshot_at(1.5)).expect("serializable");
        assert!(json.contains("\"uptime\":1.5"));
        assert!(json.contains("\"has_fix\":false"));
    }
}
