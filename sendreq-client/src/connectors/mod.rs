pub mod http;
pub mod https;

pub use self::http::TracingConnector;
pub use self::https::TracingHttpsConnector;
