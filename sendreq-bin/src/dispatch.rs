use crate::config::DispatchMode;
use sendreq_client::{Execute, RequestResult, RequestTarget};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Semaphore;

/// Runs passes over a host list and funnels every result into one channel.
pub struct Dispatcher {
    executor: Arc<dyn Execute>,
    endpoint: String,
    timeout: Duration,
    mode: DispatchMode,
    limit: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(
        executor: Arc<dyn Execute>,
        endpoint: String,
        timeout: Duration,
        mode: DispatchMode,
    ) -> Dispatcher {
        Dispatcher {
            executor,
            endpoint,
            timeout,
            mode,
            limit: None,
        }
    }

    /// Cap the number of in-flight requests of a parallel pass. `0` removes the cap.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Dispatcher {
        self.limit = if limit > 0 {
            Some(Arc::new(Semaphore::new(limit)))
        } else {
            None
        };
        self
    }

    fn targets(&self, hosts: &[String]) -> Vec<RequestTarget> {
        hosts
            .iter()
            .map(|h| RequestTarget::new(self.endpoint.as_str(), h.as_str(), self.timeout))
            .collect()
    }

    /// Start one pass over `hosts`.
    ///
    /// The receiver yields one result per host and closes when the pass is over. Sequential
    /// passes yield in host order, parallel passes in completion order. Dropping the
    /// receiver stops a sequential pass after its current request; parallel requests
    /// already running finish and their results are discarded.
    pub fn dispatch(&self, hosts: &[String]) -> UnboundedReceiver<RequestResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        let targets = self.targets(hosts);
        match self.mode {
            DispatchMode::Sequential => {
                let executor = self.executor.clone();
                tokio::spawn(async move {
                    for target in targets {
                        let result = executor.execute(target).await;
                        if tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            DispatchMode::Parallel => {
                for target in targets {
                    let executor = self.executor.clone();
                    let limit = self.limit.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let _permit = match limit {
                            Some(semaphore) => match semaphore.acquire_owned().await {
                                Ok(permit) => Some(permit),
                                Err(_closed) => return,
                            },
                            None => None,
                        };
                        let result = executor.execute(target).await;
                        // the receiver is gone once the run has been interrupted
                        let _ = tx.send(result);
                    });
                }
            }
        }
        rx
    }
}
