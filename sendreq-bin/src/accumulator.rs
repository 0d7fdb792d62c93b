use crate::reporting::RunReport;
use sendreq_client::{PhaseTiming, RequestResult};
use sendreq_metrics::data::default_percentiles;
use sendreq_metrics::{Histograms, Stopwatch};
use std::fmt;
use std::time::{Duration, Instant};

/// Elapsed time after which the throughput sample is taken.
const THROUGHPUT_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    DnsLookup,
    TcpConnection,
    TlsHandshake,
    ServerProcessing,
    ContentTransfer,
    Total,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::DnsLookup,
        Phase::TcpConnection,
        Phase::TlsHandshake,
        Phase::ServerProcessing,
        Phase::ContentTransfer,
        Phase::Total,
    ];

    pub fn of(self, t: &PhaseTiming) -> Duration {
        match self {
            Phase::DnsLookup => t.dns_lookup,
            Phase::TcpConnection => t.tcp_connection,
            Phase::TlsHandshake => t.tls_handshake,
            Phase::ServerProcessing => t.server_processing,
            Phase::ContentTransfer => t.content_transfer,
            Phase::Total => t.total(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Phase::DnsLookup => "DNS",
            Phase::TcpConnection => "Conn",
            Phase::TlsHandshake => "TLS",
            Phase::ServerProcessing => "Server",
            Phase::ContentTransfer => "Transfer",
            Phase::Total => "Total",
        };
        f.pad(label)
    }
}

/// Run-wide totals. Only the consumer of the result channel touches it.
pub struct RunAccumulator {
    stopwatch: Stopwatch,
    completed: u64,
    failed: u64,
    first_result: Option<RequestResult>,
    throughput_sample: Option<u64>,
    phases: Histograms<Phase>,
}

impl Default for RunAccumulator {
    fn default() -> Self {
        RunAccumulator::new()
    }
}

impl RunAccumulator {
    pub fn new() -> RunAccumulator {
        RunAccumulator::started_at(Instant::now())
    }

    pub fn started_at(start: Instant) -> RunAccumulator {
        let mut phases = Histograms::new();
        for phase in Phase::ALL.iter() {
            phases.init(*phase);
        }
        RunAccumulator {
            stopwatch: Stopwatch::started_at(start),
            completed: 0,
            failed: 0,
            first_result: None,
            throughput_sample: None,
            phases,
        }
    }

    pub fn record(&mut self, result: RequestResult) {
        self.record_at(result, Instant::now());
    }

    /// Count `result` as consumed at `now`.
    ///
    /// Failures are counted too; only successful timings reach the phase histograms.
    pub fn record_at(&mut self, result: RequestResult, now: Instant) {
        self.completed += 1;
        if result.is_success() {
            for phase in Phase::ALL.iter() {
                self.phases.record(phase, phase.of(&result.timing));
            }
        } else {
            self.failed += 1;
        }
        if self.first_result.is_none() {
            self.first_result = Some(result);
        }
        if self.throughput_sample.is_none() && self.stopwatch.elapsed_at(now) > THROUGHPUT_WINDOW
        {
            self.throughput_sample = Some(self.completed);
        }
    }

    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    pub fn failed_count(&self) -> u64 {
        self.failed
    }

    pub fn throughput_sample(&self) -> Option<u64> {
        self.throughput_sample
    }

    pub fn report(&self) -> RunReport {
        self.report_at(Instant::now())
    }

    pub fn report_at(&self, now: Instant) -> RunReport {
        let percentiles = default_percentiles();
        let phase_stats = Phase::ALL
            .iter()
            .filter_map(|p| self.phases.snapshot(p, &percentiles).map(|s| (*p, s)))
            .collect();
        RunReport {
            completed: self.completed,
            failed: self.failed,
            elapsed: self.stopwatch.elapsed_at(now),
            throughput_sample: self.throughput_sample,
            first_result: self.first_result.clone(),
            phase_stats,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::stub_timing;
    use sendreq_client::RequestError;

    fn ok(host: &str) -> RequestResult {
        RequestResult::success(host.into(), 200, stub_timing(), 10)
    }

    fn failed(host: &str) -> RequestResult {
        RequestResult::failure(host.into(), RequestError::Connect("refused".into()))
    }

    #[test]
    fn counts_every_result_including_failures() {
        let start = Instant::now();
        let mut acc = RunAccumulator::started_at(start);
        acc.record_at(ok("a"), start);
        acc.record_at(failed("b"), start);
        acc.record_at(ok("c"), start);
        assert_eq!(acc.completed_count(), 3);
        assert_eq!(acc.failed_count(), 1);
    }

    #[test]
    fn first_result_is_written_once() {
        let start = Instant::now();
        let mut acc = RunAccumulator::started_at(start);
        acc.record_at(failed("a"), start);
        acc.record_at(ok("b"), start);
        let first = acc.report_at(start).first_result.unwrap();
        assert_eq!(first.host, "a");
        assert!(!first.is_success());
        assert_eq!(first.timing, PhaseTiming::default());
    }

    #[test]
    fn throughput_sample_freezes_after_one_second() {
        let start = Instant::now();
        let mut acc = RunAccumulator::started_at(start);
        acc.record_at(ok("a"), start + Duration::from_millis(200));
        acc.record_at(ok("b"), start + Duration::from_millis(1000));
        assert_eq!(acc.throughput_sample(), None);
        acc.record_at(ok("c"), start + Duration::from_millis(1001));
        assert_eq!(acc.throughput_sample(), Some(3));
        acc.record_at(ok("d"), start + Duration::from_millis(1500));
        acc.record_at(ok("e"), start + Duration::from_secs(5));
        assert_eq!(acc.throughput_sample(), Some(3));
        assert_eq!(acc.completed_count(), 5);
    }

    #[test]
    fn phase_stats_ignore_failures() {
        let start = Instant::now();
        let mut acc = RunAccumulator::started_at(start);
        acc.record_at(ok("a"), start);
        acc.record_at(failed("b"), start);
        let report = acc.report_at(start + Duration::from_millis(10));
        let (phase, dns) = &report.phase_stats[0];
        assert_eq!(*phase, Phase::DnsLookup);
        assert_eq!(dns.count(), 1);
        assert_eq!(dns.min(), Duration::from_millis(1));
        let total = report
            .phase_stats
            .iter()
            .find(|(p, _)| *p == Phase::Total)
            .map(|(_, s)| s.max())
            .unwrap();
        assert!(total >= Duration::from_millis(10));
    }

    #[test]
    fn report_without_results_has_no_phase_stats() {
        let start = Instant::now();
        let acc = RunAccumulator::started_at(start);
        let report = acc.report_at(start + Duration::from_millis(3));
        assert_eq!(report.completed, 0);
        assert!(report.first_result.is_none());
        assert!(report.phase_stats.is_empty());
        assert_eq!(report.elapsed, Duration::from_millis(3));
    }

    #[test]
    fn phase_of_total_sums_phases() {
        assert_eq!(Phase::Total.of(&stub_timing()), Duration::from_millis(10));
        assert_eq!(Phase::TlsHandshake.of(&stub_timing()), Duration::default());
    }
}
