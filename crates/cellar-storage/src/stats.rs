//! Usage counters for drivers and bins.
//!
//! Counters are incremented from arbitrary request tasks, so they are atomics;
//! they are monotonically non-decreasing within a process lifetime and reset
//! only by restart. Both layers (bin and driver) track usage independently.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for file operations.
#[derive(Debug, Default)]
pub struct Stats {
    uploaded: AtomicU64,
    downloaded: AtomicU64,
    redirected: AtomicU64,
    deleted: AtomicU64,
    failed: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    pub fn record_uploaded(&self) {
        self.uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Mutually exclusive with downloads: a redirect answers the request
    /// without opening a byte stream.
    pub fn record_redirected(&self) {
        self.redirected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uploaded: self.uploaded.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            redirected: self.redirected.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a `Stats`, serializable for the admin surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uploaded: u64,
    pub downloaded: u64,
    pub redirected: u64,
    pub deleted: u64,
    pub failed: u64,
}

impl StatsSnapshot {
    /// Sum multiple snapshots into one.
    pub fn sum<I: IntoIterator<Item = StatsSnapshot>>(snapshots: I) -> StatsSnapshot {
        snapshots
            .into_iter()
            .fold(StatsSnapshot::default(), |mut total, s| {
                total.uploaded += s.uploaded;
                total.downloaded += s.downloaded;
                total.redirected += s.redirected;
                total.deleted += s.deleted;
                total.failed += s.failed;
                total
            })
    }

    fn merge(self, other: StatsSnapshot, f: impl Fn(u64, u64) -> u64) -> StatsSnapshot {
        StatsSnapshot {
            uploaded: f(self.uploaded, other.uploaded),
            downloaded: f(self.downloaded, other.downloaded),
            redirected: f(self.redirected, other.redirected),
            deleted: f(self.deleted, other.deleted),
            failed: f(self.failed, other.failed),
        }
    }
}

/// Per-counter floating-point figures, for means and deviations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct StatsFloats {
    pub uploaded: f64,
    pub downloaded: f64,
    pub redirected: f64,
    pub deleted: f64,
    pub failed: f64,
}

/// Aggregate over a set of snapshots: extremes, totals, per-counter mean and
/// population standard deviation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSummary {
    pub count: usize,
    pub minimum: StatsSnapshot,
    pub maximum: StatsSnapshot,
    pub total: StatsSnapshot,
    pub average: StatsFloats,
    pub std_dev: StatsFloats,
}

impl StatsSummary {
    pub fn from_snapshots<I: IntoIterator<Item = StatsSnapshot>>(snapshots: I) -> StatsSummary {
        let snaps: Vec<StatsSnapshot> = snapshots.into_iter().collect();
        let Some(&first) = snaps.first() else {
            return StatsSummary::default();
        };

        let mut minimum = first;
        let mut maximum = first;
        for s in &snaps[1..] {
            minimum = minimum.merge(*s, u64::min);
            maximum = maximum.merge(*s, u64::max);
        }

        let total = StatsSnapshot::sum(snaps.iter().copied());
        let n = snaps.len() as f64;
        let average = StatsFloats {
            uploaded: total.uploaded as f64 / n,
            downloaded: total.downloaded as f64 / n,
            redirected: total.redirected as f64 / n,
            deleted: total.deleted as f64 / n,
            failed: total.failed as f64 / n,
        };

        let mut variance = StatsFloats::default();
        for s in &snaps {
            variance.uploaded += (s.uploaded as f64 - average.uploaded).powi(2);
            variance.downloaded += (s.downloaded as f64 - average.downloaded).powi(2);
            variance.redirected += (s.redirected as f64 - average.redirected).powi(2);
            variance.deleted += (s.deleted as f64 - average.deleted).powi(2);
            variance.failed += (s.failed as f64 - average.failed).powi(2);
        }
        let std_dev = StatsFloats {
            uploaded: (variance.uploaded / n).sqrt(),
            downloaded: (variance.downloaded / n).sqrt(),
            redirected: (variance.redirected / n).sqrt(),
            deleted: (variance.deleted / n).sqrt(),
            failed: (variance.failed / n).sqrt(),
        };

        StatsSummary {
            count: snaps.len(),
            minimum,
            maximum,
            total,
            average,
            std_dev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.record_uploaded();
        stats.record_uploaded();
        stats.record_failed();

        let snap = stats.snapshot();
        assert_eq!(snap.uploaded, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.downloaded, 0);
    }

    #[test]
    fn snapshots_sum() {
        let a = StatsSnapshot {
            uploaded: 1,
            downloaded: 2,
            redirected: 0,
            deleted: 1,
            failed: 0,
        };
        let b = StatsSnapshot {
            uploaded: 3,
            downloaded: 0,
            redirected: 5,
            deleted: 0,
            failed: 2,
        };

        let total = StatsSnapshot::sum([a, b]);
        assert_eq!(total.uploaded, 4);
        assert_eq!(total.downloaded, 2);
        assert_eq!(total.redirected, 5);
        assert_eq!(total.deleted, 1);
        assert_eq!(total.failed, 2);
    }

    #[test]
    fn summary_tracks_extremes_mean_and_deviation() {
        let a = StatsSnapshot {
            uploaded: 1,
            downloaded: 4,
            ..StatsSnapshot::default()
        };
        let b = StatsSnapshot {
            uploaded: 3,
            downloaded: 4,
            ..StatsSnapshot::default()
        };

        let summary = StatsSummary::from_snapshots([a, b]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.minimum.uploaded, 1);
        assert_eq!(summary.maximum.uploaded, 3);
        assert_eq!(summary.total.uploaded, 4);
        assert_eq!(summary.average.uploaded, 2.0);
        // Equidistant from the mean by 1.
        assert_eq!(summary.std_dev.uploaded, 1.0);
        // Identical values have no spread.
        assert_eq!(summary.std_dev.downloaded, 0.0);
    }

    #[test]
    fn summary_of_nothing_is_empty() {
        let summary = StatsSummary::from_snapshots(Vec::new());
        assert_eq!(summary.count, 0);
        assert_eq!(summary.total, StatsSnapshot::default());
    }
}
