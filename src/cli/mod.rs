//! CLI command handlers

pub mod commands;

pub use commands::{
    address, cache, dropdowns, generate, init_logging, load_app_state, parse_selection, serve,
};
