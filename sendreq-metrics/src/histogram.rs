use crate::data::{HistoSnapshot, Percentile};
use crate::util;
use fnv::FnvHashMap;
use hdrhistogram::Histogram;
use std::hash::Hash;
use std::time::Duration;

/// Significant figures kept by every latency histogram.
const SIGFIG: u8 = 3;
/// Largest trackable sample, one hour in microseconds. Longer samples are clamped to it.
const HIGHEST_TRACKABLE: u64 = 3_600_000_000;

/// Latency histograms keyed by `T`, recorded with microsecond resolution.
pub struct Histograms<T> {
    data: FnvHashMap<T, Histogram<u64>>,
}

impl<T> Default for Histograms<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        Histograms::new()
    }
}

impl<T> Histograms<T>
where
    T: Hash + Eq,
{
    pub fn new() -> Histograms<T> {
        Histograms {
            data: FnvHashMap::default(),
        }
    }

    /// Register interest in the key with an empty histogram.
    /// Registering an existing key leaves its samples untouched.
    pub fn init(&mut self, key: T) {
        self.data.entry(key).or_insert_with(new_histogram);
    }

    /// Record one elapsed sample for the key.
    /// If the key hasn't been registered, this is ignored.
    pub fn record(&mut self, key: &T, d: Duration) {
        if let Some(h) = self.data.get_mut(key) {
            h.saturating_record(util::dur_to_u64(d));
        }
    }

    /// Summarize the key's samples. `None` if the key is unknown or has no samples yet.
    pub fn snapshot(&self, key: &T, percentiles: &[Percentile]) -> Option<HistoSnapshot<Duration>> {
        self.data
            .get(key)
            .and_then(|h| HistoSnapshot::from_histo(h, percentiles))
    }
}

fn new_histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(1, HIGHEST_TRACKABLE, SIGFIG)
        .expect("constant bounds and sigfig are valid for hdrhistogram")
}
