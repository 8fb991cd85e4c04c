//! DEPG HTTP API
//!
//! `GET /` serves the dropdown catalog, `POST /` turns a form submission into
//! a Tcl profile. Run with `depg serve` or `depg-server`.

pub mod handlers;
pub mod server;

pub use server::{init_tracing, router, run_api_server, ApiConfig, AppState, Mode};
