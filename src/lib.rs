//! DEPG - Decent Espresso Profile Generator
//!
//! Evaluates a profile spreadsheet with dropdown selections as inputs and
//! renders the computed results as a Tcl profile for a Decent Espresso
//! machine.
//!
//! # Features
//!
//! - Workbook-backed formula engine (calamine + formualizer)
//! - Dropdown discovery from list data validations, cached as JSON
//! - Validated JSON/YAML configuration with template checking at load
//! - HTTP form server (axum) and CLI
//!
//! # Example
//!
//! ```no_run
//! use depg::catalog::load_or_build;
//! use depg::config::load_config;
//! use depg::engine::EvaluationSession;
//! use depg::generator::{ProfileGenerator, Submission};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = load_config(Path::new("config.json"))?;
//! let session = EvaluationSession::load(&config.spreadsheet_file)?;
//! let cache = load_or_build(&config, &session, false)?;
//!
//! let generator = ProfileGenerator::new(Arc::new(config), session);
//! let submission = Submission::default().select("B3", "Dark").with_title("Sunday");
//! println!("{}", generator.generate(&cache, &submission)?.profile);
//! # Ok::<(), depg::error::DepgError>(())
//! ```

pub mod address;
pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod excel;
pub mod generator;
pub mod profile;
pub mod types;

// Re-export commonly used types
pub use error::{DepgError, DepgResult};
pub use types::OrderedMap;
