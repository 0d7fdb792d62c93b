use crate::connectors::https::default_tls_config;
use crate::connectors::TracingHttpsConnector;
use crate::error::RequestError;
use crate::events::Event;
use crate::timer::{PhaseTimer, PhaseTiming};
use futures::future::BoxFuture;
use futures::prelude::*;
use hyper::body::HttpBody;
use hyper::client::Client as HyperClient;
use hyper::header::HOST;
use hyper::{Body, Request, Uri};
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;

/// Input of one call: where to connect, which `Host` to ask for, and the overall deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub endpoint: String,
    pub host: String,
    /// Zero means no deadline.
    pub timeout: Duration,
}

impl RequestTarget {
    pub fn new<E: Into<String>, H: Into<String>>(
        endpoint: E,
        host: H,
        timeout: Duration,
    ) -> RequestTarget {
        RequestTarget {
            endpoint: endpoint.into(),
            host: host.into(),
            timeout,
        }
    }
}

/// Outcome of one call. Failed results carry a zeroed timing.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult {
    pub host: String,
    pub status: Option<u16>,
    pub timing: PhaseTiming,
    pub body_length: u64,
    pub error: Option<RequestError>,
}

impl RequestResult {
    pub fn success(host: String, status: u16, timing: PhaseTiming, body_length: u64) -> Self {
        RequestResult {
            host,
            status: Some(status),
            timing,
            body_length,
            error: None,
        }
    }

    pub fn failure(host: String, error: RequestError) -> Self {
        RequestResult {
            host,
            status: None,
            timing: PhaseTiming::default(),
            body_length: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Something that turns a `RequestTarget` into a `RequestResult`.
///
/// Implementations never fail: every problem is reported through `RequestResult::error`.
pub trait Execute: Send + Sync {
    fn execute(&self, target: RequestTarget) -> BoxFuture<'static, RequestResult>;
}

/// Phase-timed HTTP GET executor. Every call opens and closes its own connection.
#[derive(Clone)]
pub struct Client {
    tls_config: Arc<ClientConfig>,
}

impl Default for Client {
    fn default() -> Self {
        Client::new()
    }
}

impl Client {
    pub fn new() -> Client {
        Client::with_tls_config(default_tls_config())
    }

    pub fn with_tls_config(config: ClientConfig) -> Client {
        Client {
            tls_config: Arc::new(config),
        }
    }

    /// Issue one GET for `target` and drain the response body.
    pub async fn request(&self, target: RequestTarget) -> RequestResult {
        let timer = PhaseTimer::new();
        let connector = TracingHttpsConnector::new(self.tls_config.clone(), true, timer.events());
        let client = HyperClient::builder()
            .pool_max_idle_per_host(0)
            .build::<_, Body>(connector);
        let events = timer.events();
        let call = with_deadline(target.timeout, async {
            let req = build_request(&target)?;
            let res = client
                .request(req)
                .await
                .map_err(|e| RequestError::from_hyper(&e))?;
            events.add(Event::HeadersReceived);
            let status = res.status().as_u16();
            let body_length = drain(res.into_body()).await?;
            Ok((status, body_length))
        });
        let (outcome, timing) = timer.instrument(call).await;
        match outcome {
            Ok((status, body_length)) => {
                RequestResult::success(target.host, status, timing, body_length)
            }
            Err(e) => RequestResult::failure(target.host, e),
        }
    }
}

impl Execute for Client {
    fn execute(&self, target: RequestTarget) -> BoxFuture<'static, RequestResult> {
        let client = self.clone();
        async move { client.request(target).await }.boxed()
    }
}

fn build_request(target: &RequestTarget) -> Result<Request<Body>, RequestError> {
    let uri = target
        .endpoint
        .parse::<Uri>()
        .map_err(|e| RequestError::InvalidRequest(format!("{}: {}", target.endpoint, e)))?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(RequestError::InvalidRequest(format!(
            "{}: not an absolute URL",
            target.endpoint
        )));
    }
    Request::get(uri)
        .header(HOST, target.host.as_str())
        .body(Body::empty())
        .map_err(|e| RequestError::InvalidRequest(e.to_string()))
}

/// Read the body to the end, keeping only its length.
async fn drain(mut body: Body) -> Result<u64, RequestError> {
    let mut length = 0u64;
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| RequestError::Body(e.to_string()))?;
        length = length.saturating_add(chunk.len() as u64);
    }
    Ok(length)
}

async fn with_deadline<F, T>(timeout: Duration, call: F) -> Result<T, RequestError>
where
    F: Future<Output = Result<T, RequestError>>,
{
    if timeout == Duration::default() {
        return call.await;
    }
    match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => Err(RequestError::Timeout(timeout)),
    }
}
