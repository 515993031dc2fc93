//! request-box: token-scoped HTTP request capture.
//!
//! Clients create a token, send arbitrary requests tagged with it, and read
//! back the most recent captures for that token.

pub mod cli;
pub mod error;
pub mod inbox;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod request;
pub mod server;
pub mod service;
pub mod settings;
pub mod telemetry;

pub use error::{CaptureError, CaptureResult};
pub use inbox::RequestInbox;
pub use registry::TokenRegistry;
pub use request::{CapturedRequest, IncomingRequest, RequestBody};
pub use service::CaptureService;
