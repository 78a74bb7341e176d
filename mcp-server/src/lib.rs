//! Task orchestrator server binary support.
//!
//! Wires process-level [`Config`] and a SQLite-backed `Orchestrator`
//! together, then exposes it over the default stdio transport or the
//! optional HTTP/SSE transport.

pub mod config;
pub mod setup;
pub mod stdio;
pub mod telemetry;

pub use config::Config;
pub use setup::{
    create_http_transport, create_store, ensure_database_directory,
    ensure_database_directory_from_config, initialize_app,
};
pub use stdio::serve_stdio;
pub use telemetry::init_telemetry;
