use crossbeam::queue::SegQueue;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transport checkpoints of a single request, in the order they normally occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Initiated,
    DnsResolutionStarted,
    DnsResolutionFinished,
    ConnectionStarted,
    Connected,
    TlsNegotiationStarted,
    TlsNegotiated,
    HeadersReceived,
    FullResponse,
    Failed,
}

/// Lock-free sink for the events of one request. Clones share the same queue.
#[derive(Debug, Default)]
pub struct EventCollector(Arc<SegQueue<(Event, Instant)>>);

impl Clone for EventCollector {
    fn clone(&self) -> EventCollector {
        EventCollector(self.0.clone())
    }
}

impl EventCollector {
    pub fn new() -> Self {
        EventCollector(Arc::new(SegQueue::new()))
    }

    pub fn add(&self, e: Event) {
        self.add_at(e, Instant::now());
    }

    pub fn add_at(&self, e: Event, at: Instant) {
        self.0.push((e, at));
    }

    pub fn drain_events(&self) -> EventSet {
        let mut r = Vec::new();
        while let Some((e, t)) = self.0.pop() {
            r.push((e, t));
        }
        EventSet(r)
    }
}

#[derive(Debug)]
pub struct EventSet(Vec<(Event, Instant)>);

impl EventSet {
    pub fn iter(&self) -> impl Iterator<Item = &(Event, Instant)> {
        self.0.iter()
    }

    pub fn initiated_at(&self) -> Option<Instant> {
        self.find_event(Event::Initiated)
    }

    pub fn contains(&self, ev: Event) -> bool {
        self.find_event(ev).is_some()
    }

    pub fn find_event(&self, ev: Event) -> Option<Instant> {
        self.iter().find(|&(e, _t)| *e == ev).map(|&(_e, t)| t)
    }

    /// The latest instant recorded for any event.
    pub fn last_at(&self) -> Option<Instant> {
        self.iter().map(|&(_e, t)| t).max()
    }

    /// Time from the first occurrence of `first` to the first occurrence of `second`.
    pub fn time_between(&self, first: Event, second: Event) -> Option<Duration> {
        let start = self.find_event(first);
        let end = self.find_event(second);
        start.and_then(|s| end.map(|e| e.saturating_duration_since(s)))
    }
}
