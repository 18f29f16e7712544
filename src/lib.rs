//! Backend-for-frontend for the tutoring web app.

pub mod backend;
pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod meta;
pub mod observability;
pub mod proxy;
pub mod sessions;

pub use config::BffConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
