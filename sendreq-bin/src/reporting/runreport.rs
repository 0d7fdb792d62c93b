use crate::accumulator::Phase;
use sendreq_client::RequestResult;
use sendreq_metrics::data::HistoSnapshot;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

/// Snapshot of a run, produced once when the run stops.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub completed: u64,
    pub failed: u64,
    pub elapsed: Duration,
    pub throughput_sample: Option<u64>,
    pub first_result: Option<RequestResult>,
    /// Latency per phase over successful requests only.
    pub phase_stats: Vec<(Phase, HistoSnapshot<Duration>)>,
}

impl RunReport {
    pub fn succeeded(&self) -> u64 {
        self.completed - self.failed
    }

    /// Completed requests divided by elapsed wall time.
    pub fn average_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }

    /// The one-second throughput sample, or the average rate for runs shorter than a second.
    pub fn requests_per_second(&self) -> f64 {
        self.throughput_sample
            .map(|s| s as f64)
            .unwrap_or_else(|| self.average_rate())
    }
}

fn fmt_duration(d: &Duration) -> String {
    if d.as_secs() >= 5 {
        let s: f64 = d.as_secs() as f64 + (d.subsec_millis() as f64 / 1000.0);
        format!("{:.3}s", s)
    } else if d.as_millis() < 5 {
        format!("{:.2}ms", d.as_micros() as f64 / 1000.0)
    } else {
        format!("{}ms", d.as_millis())
    }
}

fn fmt_size(s: u64) -> String {
    let magnitudes = &["B", "KB", "MB", "GB"];
    let max_magnitude = magnitudes.len() - 1;
    let mut total = s as f64;
    let mut cur_magnitude = 0;
    while total > 1024.0 && cur_magnitude < max_magnitude {
        total /= 1024.0;
        cur_magnitude += 1;
    }
    if cur_magnitude == 0 {
        format!("{:.0}{}", total, magnitudes[cur_magnitude])
    } else {
        format!("{:.1}{}", total, magnitudes[cur_magnitude])
    }
}

fn format_first_result(r: &RequestResult, f: &mut Formatter) -> FmtResult {
    if let Some(ref e) = r.error {
        return writeln!(f, "First request: {} failed: {}", r.host, e);
    }
    write!(f, "First request: {}", r.host)?;
    if let Some(status) = r.status {
        write!(f, " ({})", status)?;
    }
    writeln!(f, " {}", fmt_size(r.body_length))?;
    write!(f, "   ")?;
    for phase in Phase::ALL.iter() {
        write!(f, " {}: {}", phase, fmt_duration(&phase.of(&r.timing)))?;
    }
    writeln!(f)
}

fn format_phase_stats(phase: Phase, h: &HistoSnapshot<Duration>, f: &mut Formatter) -> FmtResult {
    write!(
        f,
        "  {:<8} count {}/min {}/avg {}/max {}/stdev {}",
        phase,
        h.count(),
        fmt_duration(&h.min()),
        fmt_duration(&h.mean()),
        fmt_duration(&h.max()),
        fmt_duration(&h.stdev())
    )?;
    for (p, v) in h.percentiles() {
        write!(f, " {} {}", p, fmt_duration(&v))?;
    }
    writeln!(f)
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        writeln!(
            f,
            "* {} requests ({} failed) in {}",
            self.completed,
            self.failed,
            fmt_duration(&self.elapsed)
        )?;
        write!(f, "Requests/sec: {:.2}", self.requests_per_second())?;
        if self.throughput_sample.is_some() {
            writeln!(f, " (sampled at 1s, {:.2} average)", self.average_rate())?;
        } else {
            writeln!(f, " (average, run shorter than 1s)")?;
        }
        if let Some(ref first) = self.first_result {
            format_first_result(first, f)?;
        }
        if !self.phase_stats.is_empty() {
            writeln!(f, "Successful requests ({}):", self.succeeded())?;
            for (phase, h) in &self.phase_stats {
                format_phase_stats(*phase, h, f)?;
            }
        }
        Ok(())
    }
}
