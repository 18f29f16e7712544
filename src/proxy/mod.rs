//! Backend proxy subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → handlers.rs (read body once, pick ProxyRoute)
//!     → forward.rs (ForwardedRequest: path, headers, body policy; one outbound call)
//!     → relay.rs (status check, Stream / Json / RawText decision)
//!     → stream.rs (event-stream passthrough, terminal error event)
//!     → error.rs (any failure → JSON envelope)
//! ```
//!
//! # Design Decisions
//! - One parameterised forwarder for every proxied route
//! - No retries, no circuit breaking: failures surface immediately
//! - Streams are never buffered or re-framed

pub mod error;
pub mod forward;
pub mod handlers;
pub mod relay;
pub mod route;
pub mod stream;

pub use error::ProxyError;
pub use forward::{ForwardBody, ForwardedRequest, Forwarder};
pub use relay::{relay, RelayDecision};
pub use route::{ProxyRoute, ProxyRoutes, StreamingPredicate};
