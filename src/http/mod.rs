//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, trace, timeout, body limit)
//!     → proxy / meta / sessions handlers
//!     → error.rs (every failure leaves as an ErrorEnvelope)
//! ```

pub mod error;
pub mod server;

pub use error::ErrorEnvelope;
pub use server::{AppState, HttpServer, ServerError};
