//! # quote-render
//!
//! A small HTTP service that merges a JSON payload into an HTML template,
//! prints the result to PDF in headless Chrome and returns the document as
//! base64.
//!
//! ## Pipeline
//!
//! | Step | Component | Failure |
//! |------|-----------|---------|
//! | Template | [`TemplateRenderer`] | `TemplateNotFound`, `TemplateRender` |
//! | Session | [`SessionManager`] | `SessionStart` |
//! | Acquire | [`DocumentProducer`] | `ContextAcquire` |
//! | Load | [`DocumentProducer`] | `LoadTimeout`, `Load` |
//! | Stabilize | [`DocumentProducer`] | logged only |
//! | Export | [`DocumentProducer`] | `Export` |
//! | Validate | [`check_document`] | `InvalidOutput` |
//!
//! One Chrome process is shared by all requests. It is started at boot (or on
//! the first request), checked before each use and replaced when it stops
//! answering. Each request gets its own page, which is closed on every path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quote_render::{Config, RenderRequest, RenderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RenderService::new(Config::default());
//!
//!     let request = RenderRequest {
//!         template_id: "manager_report".to_string(),
//!         data: json!({"title": "Q1"}),
//!         ..Default::default()
//!     };
//!     let document = service.render(request).await?;
//!     println!("Rendered {} bytes", document.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # HTTP server on $PORT (default 3000)
//! quote-render serve
//!
//! # One document to disk
//! quote-render render --template manager_report --data quote.json --output quote.pdf --landscape
//! ```

/// Configuration and settings for the render service
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Template lookup and rendering
pub mod template;

/// Spreadsheet payload decoding
pub mod tables;

/// Document validation and response envelopes
pub mod output;

/// Prometheus metrics
pub mod metrics;

/// Shared browser session lifecycle
pub mod session;

/// Chrome implementation of the session traits
pub mod chrome;

/// Per-request document production
pub mod producer;

/// Request orchestration
pub mod service;

/// Health reporting
pub mod health;

/// HTTP routes and server
pub mod server;

/// Command-line interface implementation
pub mod cli;

#[cfg(test)]
mod testing;


pub use chrome::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use health::*;
pub use crate::metrics::install_recorder;
pub use output::*;
pub use producer::*;
pub use server::*;
pub use service::*;
pub use session::*;
pub use tables::*;
pub use template::*;
