//! ---
//! pv_section: "01-core-functionality"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Shared configuration and logging primitives."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
//! Shared primitives for the PaperVision tooling workspace.
//! This crate exposes configuration loading and tracing setup consumed by the
//! engine messaging layer and the `pvctl` binary.

pub mod config;
pub mod logging;

pub use config::{AppConfig, EngineConfig, EngineTransport, LoadedAppConfig, LoggingConfig};
pub use logging::{init, init_tracing, LogFormat};
