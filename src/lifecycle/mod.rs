//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! SIGTERM / Ctrl+C (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → HttpServer stops accepting, drains in-flight requests
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_listener, wait_for_signal};
