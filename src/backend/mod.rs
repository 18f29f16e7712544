//! Backend addressing and backend-owned resources.
//!
//! # Data Flow
//! ```text
//! BackendConfig (url, use_real_backend)
//!     → locator.rs (per execution context: mock / proxy / external)
//!     → upstream origin for the forwarder
//!
//! Session fork
//!     → vector_store.rs (provision a fresh vector store on the backend)
//! ```

pub mod locator;
pub mod vector_store;

pub use locator::{BackendLocator, BackendTarget, ClientConfig, ExecutionContext};
pub use vector_store::{BackendVectorStores, LocalVectorStores, VectorStoreProvisioner};
