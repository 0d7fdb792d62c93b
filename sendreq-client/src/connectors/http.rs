use crate::dns::TracingResolver;
use crate::events::{Event, EventCollector};
use crate::FutureResponse;
use futures::prelude::*;
use hyper::client::connect::dns::Name;
use hyper::service::Service;
use hyper::Uri;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::task::Context;
use std::task::Poll;
use tokio::net::TcpStream;

/// Plain TCP connector recording DNS and connect checkpoints for one request.
#[derive(Clone)]
pub struct TracingConnector {
    resolver: TracingResolver,
    events: EventCollector,
    nodelay: bool,
}

impl TracingConnector {
    pub fn new(events: EventCollector) -> TracingConnector {
        let resolver = TracingResolver::new(events.clone());
        TracingConnector {
            resolver,
            events,
            nodelay: false,
        }
    }

    pub fn set_nodelay(&mut self, nodelay: bool) {
        self.nodelay = nodelay;
    }
}

impl Service<Uri> for TracingConnector {
    type Response = TcpStream;
    type Error = std::io::Error;
    type Future = FutureResponse<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _: &mut Context) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let host = match dst.host() {
            None => {
                return future::err(io::Error::new(io::ErrorKind::InvalidInput, "Invalid Host"))
                    .boxed();
            }
            Some(host) => host.to_string(),
        };
        let is_https = dst.scheme_str() == Some("https");
        let port = dst
            .port_u16()
            .unwrap_or_else(|| if is_https { 443 } else { 80 });
        let nodelay = self.nodelay;
        let events = self.events.clone();
        let mut resolver = self.resolver.clone();
        async move {
            let name = Name::from_str(&host).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid Host: {}", e))
            })?;
            let addrs: Vec<SocketAddr> = resolver
                .call(name)
                .await?
                .map(|a| SocketAddr::new(a, port))
                .collect();
            if addrs.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Did not resolve an address",
                ));
            }
            events.add(Event::ConnectionStarted);
            let stream = connect_first(&addrs).await?;
            events.add(Event::Connected);
            stream.set_nodelay(nodelay)?;
            Ok(stream)
        }
        .boxed()
    }
}

/// Try each resolved address in order, returning the first established stream.
async fn connect_first(addrs: &[SocketAddr]) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "No address to connect to")))
}
