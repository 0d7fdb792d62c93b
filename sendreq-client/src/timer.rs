use crate::events::{Event, EventCollector, EventSet};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Five disjoint phases of one request. Their sum is the wall-clock time of the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    pub dns_lookup: Duration,
    pub tcp_connection: Duration,
    pub tls_handshake: Duration,
    pub server_processing: Duration,
    pub content_transfer: Duration,
}

#[derive(Debug, Error)]
#[error("Invalid Event Set: {0}")]
pub struct InvalidEventSetError(String);

impl PhaseTiming {
    /// Build a timing from recorded events.
    ///
    /// Each phase ends at a cumulative checkpoint measured from `Initiated`. A phase that
    /// began but never finished runs until the last recorded event; phases that never
    /// began collapse to zero.
    pub fn from_events(ev: &EventSet) -> Result<PhaseTiming, InvalidEventSetError> {
        let initiated = match ev.initiated_at() {
            Some(i) => i,
            None => return Err(InvalidEventSetError("No Initiated event".into())),
        };
        let offset = |e: Event| ev.time_between(Event::Initiated, e);
        let end = ev
            .last_at()
            .map(|t| t.saturating_duration_since(initiated))
            .unwrap_or_default();

        let mut prev = Duration::default();
        let mut checkpoint = |begun: bool, reached: Option<Duration>| {
            let at = match reached {
                Some(t) => t,
                None if begun => end,
                None => prev,
            };
            prev = prev.max(at);
            prev
        };
        let resolved = checkpoint(
            ev.contains(Event::DnsResolutionStarted),
            offset(Event::DnsResolutionFinished),
        );
        let connected = checkpoint(
            ev.contains(Event::ConnectionStarted),
            offset(Event::Connected),
        );
        let negotiated = checkpoint(
            ev.contains(Event::TlsNegotiationStarted),
            offset(Event::TlsNegotiated),
        );
        let first_byte = checkpoint(ev.contains(Event::Connected), offset(Event::HeadersReceived));
        let done = checkpoint(
            ev.contains(Event::HeadersReceived),
            offset(Event::FullResponse),
        );

        Ok(PhaseTiming {
            dns_lookup: resolved,
            tcp_connection: connected - resolved,
            tls_handshake: negotiated - connected,
            server_processing: first_byte - negotiated,
            content_transfer: done - first_byte,
        })
    }

    pub fn total(&self) -> Duration {
        self.dns_lookup
            + self.tcp_connection
            + self.tls_handshake
            + self.server_processing
            + self.content_transfer
    }
}

impl Display for PhaseTiming {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("Timing")
            .field("dns_lookup", &self.dns_lookup)
            .field("tcp_connection", &self.tcp_connection)
            .field("tls_handshake", &self.tls_handshake)
            .field("server_processing", &self.server_processing)
            .field("content_transfer", &self.content_transfer)
            .field("total", &self.total())
            .finish()
    }
}

/// Records the checkpoints of one call.
///
/// Hand `events()` to the transport so DNS, connect and TLS checkpoints land in the
/// same queue, then run the call through `instrument`.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    events: EventCollector,
}

impl PhaseTimer {
    pub fn new() -> PhaseTimer {
        PhaseTimer {
            events: EventCollector::new(),
        }
    }

    pub fn events(&self) -> EventCollector {
        self.events.clone()
    }

    /// Run `call` to completion and return its output with the measured timing.
    ///
    /// `FullResponse` is recorded when the call succeeds and `Failed` when it errors,
    /// so a failure still yields timing up to the point where it happened.
    pub async fn instrument<F, T, E>(&self, call: F) -> (Result<T, E>, PhaseTiming)
    where
        F: Future<Output = Result<T, E>>,
    {
        self.events.add(Event::Initiated);
        let outcome = call.await;
        match outcome {
            Ok(_) => self.events.add(Event::FullResponse),
            Err(_) => self.events.add(Event::Failed),
        }
        let timing = PhaseTiming::from_events(&self.events.drain_events()).unwrap_or_default();
        (outcome, timing)
    }
}
