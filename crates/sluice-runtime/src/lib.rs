//! Sluice Runtime - configuration, logging and dispatch for the Sluice pipeline.
//!
//! This crate provides:
//! - Layered configuration with figment (`sluice.toml`, `sluice.yaml`, `SLUICE_*`)
//! - Logging setup on `tracing-subscriber` with optional rolling files
//! - The [`Dispatcher`], which resolves a handler, runs it and renders its view
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use sluice_runtime::{DispatcherBuilder, config::load_config, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let dispatcher = DispatcherBuilder::from_config(&config)?
//!         .view("books/list", books_view())
//!         .build();
//!     dispatcher.register_controller(books_controller())?;
//!
//!     let outcome = dispatcher.dispatch(Arc::new(WebRequest::new("/books"))).await?;
//!     println!("{}", outcome.status());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;

pub use config::{ConfigError, ConfigLoader, ConfigResult, SluiceConfig};
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherBuilder, default_view_name};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
