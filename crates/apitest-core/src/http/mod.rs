//! Outbound HTTP: request building and the transport seam.

mod request;
mod transport;

pub use request::{build_request, PreparedRequest, REDACTED};
pub use transport::{HttpResponse, HttpTransport, OutboundRequest, ReqwestTransport};
