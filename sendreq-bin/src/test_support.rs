use futures::future::BoxFuture;
use futures::FutureExt;
use sendreq_client::{Execute, PhaseTiming, RequestError, RequestResult, RequestTarget};
use slog::{Drain, Key, OwnedKVList, Record, Serializer, KV};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// Keeps every record as `msg key=value ...`, record values only.
struct CaptureDrain(Arc<Mutex<Vec<String>>>);

struct Line(String);

impl Serializer for Line {
    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        self.0.push_str(&format!(" {}={}", key, val));
        Ok(())
    }
}

impl Drain for CaptureDrain {
    type Ok = ();
    type Err = slog::Never;

    fn log(&self, record: &Record, _values: &OwnedKVList) -> Result<(), slog::Never> {
        let mut line = Line(record.msg().to_string());
        record
            .kv()
            .serialize(record, &mut line)
            .expect("serializing into a string");
        self.0.lock().unwrap().push(line.0);
        Ok(())
    }
}

pub fn capture_logger() -> (slog::Logger, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let logger = slog::Logger::root(CaptureDrain(lines.clone()), slog::o!());
    (logger, lines)
}

pub fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}

/// Timing reported by every successful stub call.
pub fn stub_timing() -> PhaseTiming {
    PhaseTiming {
        dns_lookup: Duration::from_millis(1),
        tcp_connection: Duration::from_millis(2),
        tls_handshake: Duration::default(),
        server_processing: Duration::from_millis(3),
        content_transfer: Duration::from_millis(4),
    }
}

#[derive(Default)]
pub struct Stats {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub targets: Mutex<Vec<RequestTarget>>,
}

type Hook = Box<dyn Fn(usize) + Send + Sync>;

/// Executor answering from memory: 200 with a 10 byte body, unless the host is marked failing.
#[derive(Default)]
pub struct StubExecutor {
    pub stats: Arc<Stats>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    delay: Duration,
    hook: Option<Hook>,
}

impl StubExecutor {
    pub fn new() -> StubExecutor {
        StubExecutor::default()
    }

    pub fn failing(mut self, host: &str) -> Self {
        self.failing.insert(host.to_string());
        self
    }

    pub fn delay_for(mut self, host: &str, d: Duration) -> Self {
        self.delays.insert(host.to_string(), d);
        self
    }

    pub fn delay(mut self, d: Duration) -> Self {
        self.delay = d;
        self
    }

    /// Run `hook` with the 1-based call number when each call starts.
    pub fn on_call<F: Fn(usize) + Send + Sync + 'static>(mut self, hook: F) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }
}

impl Execute for StubExecutor {
    fn execute(&self, target: RequestTarget) -> BoxFuture<'static, RequestResult> {
        let call = self.stats.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut seen) = self.stats.targets.lock() {
            seen.push(target.clone());
        }
        if let Some(hook) = &self.hook {
            hook(call);
        }
        let fail = self.failing.contains(&target.host);
        let delay = self.delays.get(&target.host).copied().unwrap_or(self.delay);
        let stats = self.stats.clone();
        async move {
            let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if delay > Duration::default() {
                tokio::time::sleep(delay).await;
            }
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);
            if fail {
                RequestResult::failure(target.host, RequestError::Connect("refused".into()))
            } else {
                RequestResult::success(target.host, 200, stub_timing(), 10)
            }
        }
        .boxed()
    }
}
