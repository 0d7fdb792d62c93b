mod histogram;
mod snapshots;
mod stopwatch;
mod util;

pub use self::histogram::Histograms;
pub use self::stopwatch::Stopwatch;
pub mod data {
    pub use crate::snapshots::{default_percentiles, HistoSnapshot, Percentile};
}
