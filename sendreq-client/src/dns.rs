use crate::events::{Event, EventCollector};
use crate::FutureResponse;
use futures::prelude::*;
use hyper::client::connect::dns::Name;
use hyper::service::Service;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::task::Context;
use std::task::Poll;

/// Blocking system resolver that brackets each lookup with DNS events.
#[derive(Clone)]
pub struct TracingResolver {
    events: EventCollector,
}

impl Service<Name> for TracingResolver {
    type Response = IpAddrs;
    type Error = std::io::Error;
    type Future = FutureResponse<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _: &mut Context) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, name: Name) -> Self::Future {
        let events = self.events.clone();
        async move {
            events.add(Event::DnsResolutionStarted);
            if let Some(addrs) = try_parse_ipaddr(name.as_str()) {
                events.add(Event::DnsResolutionFinished);
                return Ok(addrs);
            }
            let ipaddrs = tokio::task::spawn_blocking(move || resolve(&name)).await??;
            events.add(Event::DnsResolutionFinished);
            Ok(ipaddrs)
        }
        .boxed()
    }
}

#[derive(Debug)]
pub struct IpAddrs {
    inner: std::vec::IntoIter<IpAddr>,
}

impl Iterator for IpAddrs {
    type Item = IpAddr;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl TracingResolver {
    pub fn new(events: EventCollector) -> TracingResolver {
        TracingResolver { events }
    }
}

fn try_parse_ipaddr(host: &str) -> Option<IpAddrs> {
    // URI hosts keep the brackets around IPv6 literals
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.parse::<IpAddr>().ok().map(|addr| IpAddrs {
        inner: vec![addr].into_iter(),
    })
}

fn resolve(name: &Name) -> Result<IpAddrs, std::io::Error> {
    (name.as_str(), 0).to_socket_addrs().map(|sockets| IpAddrs {
        inner: sockets
            .map(|s: SocketAddr| s.ip())
            .collect::<Vec<_>>()
            .into_iter(),
    })
}
