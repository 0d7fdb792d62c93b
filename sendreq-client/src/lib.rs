pub mod client;
pub mod connectors;
pub mod dns;
pub mod error;
pub mod events;
pub mod timer;

pub use crate::client::{Client, Execute, RequestResult, RequestTarget};
pub use crate::error::RequestError;
pub use crate::events::{Event, EventCollector, EventSet};
pub use crate::timer::{PhaseTimer, PhaseTiming};
use std::future::Future;
use std::pin::Pin;
pub(crate) type FutureResponse<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;
