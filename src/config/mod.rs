//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: NEXT_PUBLIC_*, DATABASE_URL, ...)
//!     → validation.rs (semantic checks)
//!     → BffConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Environment variables win over the file so deployments can keep
//!   the frontend's variable names
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::{
    BackendConfig, BffConfig, DatabaseConfig, ListenerConfig, MetaCacheConfig,
    ObservabilityConfig, TimeoutConfig,
};
