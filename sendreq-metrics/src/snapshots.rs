use crate::util;
use hdrhistogram::Histogram;
use std::fmt::{self, Display};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Percentile {
    label: String,
    percentile: f64,
}

impl Percentile {
    pub fn new<S: Into<String>>(label: S, percentile: f64) -> Percentile {
        Percentile {
            label: label.into(),
            percentile,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> f64 {
        self.percentile
    }
}

impl Display for Percentile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

pub fn default_percentiles() -> Vec<Percentile> {
    vec![
        Percentile::new("p50", 50.0),
        Percentile::new("p75", 75.0),
        Percentile::new("p90", 90.0),
        Percentile::new("p95", 95.0),
        Percentile::new("p99", 99.0),
        Percentile::new("p99.9", 99.9),
    ]
}

#[derive(Debug, Clone)]
pub struct HistoSnapshot<T> {
    count: u64,
    min: T,
    max: T,
    mean: T,
    stdev: T,
    percentiles: Vec<(Percentile, T)>,
}

impl<T: Clone> HistoSnapshot<T> {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> T {
        self.min.clone()
    }

    pub fn max(&self) -> T {
        self.max.clone()
    }

    pub fn mean(&self) -> T {
        self.mean.clone()
    }

    pub fn stdev(&self) -> T {
        self.stdev.clone()
    }

    pub fn percentiles(&self) -> Vec<(Percentile, T)> {
        self.percentiles.clone()
    }
}

impl HistoSnapshot<Duration> {
    /// Summarize a histogram of microsecond values. Returns `None` for an empty histogram.
    pub fn from_histo(
        histo: &Histogram<u64>,
        percentiles: &[Percentile],
    ) -> Option<HistoSnapshot<Duration>> {
        if histo.len() == 0 {
            return None;
        }
        let min = util::u64_to_dur(histo.min());
        let max = util::u64_to_dur(histo.max());
        let mean = util::u64_to_dur(histo.mean().trunc() as u64);
        let stdev = util::u64_to_dur(histo.stdev().trunc() as u64);
        let values = percentiles
            .iter()
            .map(|p| {
                (
                    p.clone(),
                    util::u64_to_dur(histo.value_at_percentile(p.percentile)),
                )
            })
            .collect();
        Some(HistoSnapshot {
            count: histo.len(),
            min,
            max,
            mean,
            stdev,
            percentiles: values,
        })
    }
}
