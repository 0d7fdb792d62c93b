mod accumulator;
mod config;
mod controller;
mod dispatch;
mod interrupt;
mod reporting;
#[cfg(test)]
mod test_support;

use crate::config::{Config, Overrides};
use crate::controller::RunController;
use crate::interrupt::Interrupted;
use crate::reporting::RunReport;
use anyhow::Error;
use clap::{value_t, App, Arg, ArgMatches};
use sendreq_client::Client;
use slog::{o, Drain, Level};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// How long blocked DNS lookups may delay process exit once the run is over.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

fn root_logger(level: Level) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stdout().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let async_drain = slog_async::Async::new(drain).build().fuse();
    let level_filter = slog::LevelFilter(async_drain, level).fuse();
    slog::Logger::root(level_filter, o!())
}

fn run(
    logger: slog::Logger,
    config: Config,
    interrupted: Interrupted,
) -> Result<RunReport, Error> {
    let rt = Runtime::new()?;
    let controller =
        RunController::from_config(config, Arc::new(Client::new()), interrupted, logger);
    let report = rt.block_on(controller.run());
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(report)
}

fn overrides(matches: &ArgMatches) -> Overrides {
    let given = |name: &str| matches.is_present(name);
    Overrides {
        endpoint: matches.value_of("endpoint").map(String::from),
        hosts: matches.value_of("hosts").map(PathBuf::from),
        parallel: if given("parallel") {
            Some(value_t!(matches, "parallel", bool).unwrap_or_else(|e| e.exit()))
        } else {
            None
        },
        iteration: if given("iteration") {
            Some(value_t!(matches, "iteration", i64).unwrap_or_else(|e| e.exit()))
        } else {
            None
        },
        timeout: matches.value_of("timeout").map(String::from),
        concurrency: if given("concurrency") {
            Some(value_t!(matches, "concurrency", usize).unwrap_or_else(|e| e.exit()))
        } else {
            None
        },
    }
}

fn main() {
    let matches = App::new("sendreq")
        .version("0.1.0")
        .author("Benn Sundsrud <benn.sundsrud@gmail.com>")
        .about("Send GET requests to one endpoint for many Host headers and measure latency")
        .arg(
            Arg::with_name("endpoint")
                .long("endpoint")
                .value_name("URL")
                .help("HTTP requests endpoint")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("hosts")
                .long("hosts")
                .value_name("FILE")
                .help("File with one HOST header value per line")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("parallel")
                .long("parallel")
                .value_name("BOOL")
                .possible_values(&["true", "false"])
                .help("Send the requests of a pass concurrently [default: true]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("iteration")
                .long("iteration")
                .value_name("N")
                .allow_hyphen_values(true)
                .help("Number of passes over the hosts file, -1 runs until Ctrl+C [default: -1]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .value_name("DURATION")
                .help("Per-request timeout such as 500ms or 2s, 0 disables it [default: 0]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("concurrency")
                .long("concurrency")
                .value_name("N")
                .help("Max in-flight requests of a parallel pass, 0 is unbounded [default: 0]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML config file, flags take precedence")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets verbosity level"),
        )
        .get_matches();

    let config_path = matches.value_of("config").map(Path::new);
    let config = match Config::load(config_path, overrides(&matches)) {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("Could not load config: {}", e);
            std::process::exit(1);
        }
    };
    let level = match matches.occurrences_of("v") {
        0 => Level::Warning,
        1 => Level::Info,
        2 => Level::Debug,
        3 => Level::Trace,
        _ => {
            eprintln!("WARNING: more than -vvv is ignored");
            Level::Trace
        }
    };
    let interrupted = match interrupt::register() {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Could not install Ctrl+C handler: {}", e);
            std::process::exit(1);
        }
    };
    let logger = root_logger(level);
    match run(logger, config, interrupted) {
        Ok(report) => println!("{}", report),
        Err(e) => {
            eprintln!("Error running probe: {}", e);
            std::process::exit(1);
        }
    }
}
