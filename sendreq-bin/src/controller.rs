use crate::accumulator::RunAccumulator;
use crate::config::{Config, Iterations};
use crate::dispatch::Dispatcher;
use crate::interrupt::Interrupted;
use crate::reporting::RunReport;
use sendreq_client::{Execute, RequestResult};
use slog::{debug, info, o};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running(Iterations),
    Stopping,
    Done,
}

enum PassOutcome {
    Completed,
    Interrupted,
}

/// Repeats passes over the host list and owns the run's accumulator.
pub struct RunController {
    dispatcher: Dispatcher,
    hosts: Vec<String>,
    iterations: Iterations,
    interrupted: Interrupted,
    accumulator: RunAccumulator,
    logger: slog::Logger,
}

impl RunController {
    pub fn new(
        dispatcher: Dispatcher,
        hosts: Vec<String>,
        iterations: Iterations,
        interrupted: Interrupted,
        logger: slog::Logger,
    ) -> RunController {
        RunController {
            dispatcher,
            hosts,
            iterations,
            interrupted,
            accumulator: RunAccumulator::new(),
            logger,
        }
    }

    pub fn from_config(
        config: Config,
        executor: Arc<dyn Execute>,
        interrupted: Interrupted,
        logger: slog::Logger,
    ) -> RunController {
        let logger = logger.new(o!("endpoint" => config.endpoint.clone()));
        let dispatcher = Dispatcher::new(executor, config.endpoint, config.timeout, config.mode)
            .with_concurrency_limit(config.concurrency.unwrap_or(0));
        RunController::new(
            dispatcher,
            config.hosts,
            config.iterations,
            interrupted,
            logger,
        )
    }

    /// Run until the configured passes are done or the run is interrupted.
    ///
    /// The report is produced exactly once, on the way from `Stopping` to `Done`.
    pub async fn run(mut self) -> RunReport {
        info!(self.logger, "starting run";
            "hosts" => self.hosts.len(),
            "iterations" => format!("{:?}", self.iterations));
        self.accumulator = RunAccumulator::new();
        let mut state = RunState::Running(self.iterations);
        let mut passes = 0u64;
        let mut report = None;
        while state != RunState::Done {
            state = match state {
                RunState::Running(remaining) => {
                    if remaining.exhausted() || self.interrupted.interrupted() {
                        RunState::Stopping
                    } else {
                        match self.run_pass().await {
                            PassOutcome::Completed => {
                                passes += 1;
                                debug!(self.logger, "pass completed";
                                    "pass" => passes,
                                    "completed" => self.accumulator.completed_count());
                                RunState::Running(remaining.after_pass())
                            }
                            PassOutcome::Interrupted => {
                                info!(self.logger, "run interrupted"; "pass" => passes + 1);
                                RunState::Stopping
                            }
                        }
                    }
                }
                RunState::Stopping => {
                    report = Some(self.accumulator.report());
                    RunState::Done
                }
                RunState::Done => RunState::Done,
            };
        }
        info!(self.logger, "run finished";
            "passes" => passes,
            "completed" => self.accumulator.completed_count(),
            "failed" => self.accumulator.failed_count(),
            "throughput_sample" => format!("{:?}", self.accumulator.throughput_sample()));
        report.unwrap_or_else(|| self.accumulator.report())
    }

    async fn run_pass(&mut self) -> PassOutcome {
        let interrupted = self.interrupted.clone();
        let mut results = self.dispatcher.dispatch(&self.hosts);
        loop {
            tokio::select! {
                biased;
                _ = interrupted.wait() => return PassOutcome::Interrupted,
                next = results.recv() => match next {
                    Some(result) => self.consume(result),
                    None => return PassOutcome::Completed,
                },
            }
        }
    }

    fn consume(&mut self, result: RequestResult) {
        match result.error {
            Some(ref e) => debug!(self.logger, "request failed";
                "host" => result.host.as_str(),
                "error" => e.to_string()),
            None => debug!(self.logger, "request completed";
                "host" => result.host.as_str(),
                "status" => result.status,
                "total" => format!("{:?}", result.timing.total()),
                "body_length" => result.body_length),
        }
        self.accumulator.record(result);
    }
}
