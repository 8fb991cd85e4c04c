//! DEPG server binary
//!
//! Loads the config and the workbook once, makes sure the dropdown cache
//! exists, then serves the profile form.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use depg::api::{init_tracing, run_api_server, ApiConfig, Mode};
use depg::cli::load_app_state;

#[derive(Parser, Debug)]
#[command(name = "depg-server")]
#[command(version)]
#[command(about = "DEPG server - espresso profile form over HTTP")]
#[command(long_about = r#"
DEPG server

Endpoints:
  - GET  /                       - Dropdown catalog and spreadsheet properties
  - POST /                       - Form fields keyed by cell -> Tcl profile
  - POST /api/v1/cache/rebuild   - Rebuild the dropdown cache
  - GET  /health                 - Health check
  - GET  /version                - Server version info

DEPG_ENV=dev selects debug logging on port 5001; otherwise port 80.

Example usage:
  depg-server --config /srv/depg/config.json
  DEPG_ENV=dev depg-server

  curl -X POST http://localhost:5001/ -d B3=Dark -d profile_title=Sunday
"#)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.json", env = "DEPG_CONFIG")]
    config: PathBuf,

    /// Host address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "DEPG_HOST")]
    host: String,

    /// Port to listen on (defaults by mode)
    #[arg(short, long, env = "DEPG_PORT")]
    port: Option<u16>,

    /// Rebuild the dropdown cache before serving
    #[arg(long)]
    rebuild: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mode = Mode::from_env();
    init_tracing(mode);
    tracing::info!(?mode, "starting");

    let config_path = args.config.clone();
    let rebuild = args.rebuild;
    let state = tokio::task::spawn_blocking(move || load_app_state(&config_path, rebuild)).await??;

    let config = ApiConfig {
        host: args.host,
        port: args.port.unwrap_or_else(|| mode.default_port()),
    };

    run_api_server(config, Arc::new(state)).await
}
