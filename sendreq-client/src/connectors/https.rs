use super::http::TracingConnector;
use crate::events::{Event, EventCollector};
use crate::FutureResponse;
use futures::prelude::*;
use hyper::service::Service;
use hyper::Uri;
use hyper_rustls::MaybeHttpsStream;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};
use std::convert::TryFrom;
use std::error::Error;
use std::io;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Connector that adds a traced TLS handshake on top of `TracingConnector` for `https` URIs.
#[derive(Clone)]
pub struct TracingHttpsConnector {
    http: TracingConnector,
    tls_config: Arc<ClientConfig>,
    events: EventCollector,
}

/// Client TLS configuration trusting the bundled web PKI roots.
pub fn default_tls_config() -> ClientConfig {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));
    ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

impl TracingHttpsConnector {
    pub fn new(
        tls_config: Arc<ClientConfig>,
        nodelay: bool,
        events: EventCollector,
    ) -> TracingHttpsConnector {
        let mut http = TracingConnector::new(events.clone());
        http.set_nodelay(nodelay);
        TracingHttpsConnector {
            http,
            tls_config,
            events,
        }
    }
}

impl Service<Uri> for TracingHttpsConnector {
    type Response = MaybeHttpsStream<TcpStream>;
    type Error = Box<dyn Error + Send + Sync + 'static>;
    type Future = FutureResponse<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _: &mut Context) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let events = self.events.clone();
        let connecting = self.http.call(dst.clone());
        let cfg = self.tls_config.clone();
        async move {
            let is_https = dst.scheme_str() == Some("https");
            let tcp = connecting.await?;
            if !is_https {
                return Ok(MaybeHttpsStream::Http(tcp));
            }

            let hostname = match dst.host() {
                Some(h) => h.trim_start_matches('[').trim_end_matches(']').to_string(),
                None => {
                    return Err(io::Error::new(io::ErrorKind::InvalidInput, "Missing Host").into())
                }
            };
            let server_name = match ServerName::try_from(hostname.as_str()) {
                Ok(name) => name,
                Err(e) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("invalid dnsname: {}", e),
                    )
                    .into())
                }
            };
            events.add(Event::TlsNegotiationStarted);
            let tls = TlsConnector::from(cfg).connect(server_name, tcp).await?;
            events.add(Event::TlsNegotiated);
            Ok(MaybeHttpsStream::Https(tls))
        }
        .boxed()
    }
}
