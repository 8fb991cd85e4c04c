use clap::{Parser, Subcommand};
use depg::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "depg")]
#[command(about = "Decent Espresso Profile Generator")]
#[command(long_about = "DEPG - Decent Espresso Profile Generator

Pick shot parameters from the profile spreadsheet's dropdowns, evaluate the
spreadsheet and get a Tcl profile the machine can load.

COMMANDS:
  cache       - Rebuild the dropdown cache from the workbook
  dropdowns   - List cached dropdowns and their values
  generate    - Render a profile from COORD=VALUE selections
  address     - Show the engine address of a cell coordinate
  serve       - Run the HTTP form server

EXAMPLES:
  depg cache
  depg generate -s B3=Dark -s B5=18g --title \"Sunday Shot\" -o sunday.tcl
  depg address b37
  DEPG_ENV=dev depg serve")]
#[command(version)]
struct Cli {
    /// Configuration file (.json, .yaml or .yml)
    #[arg(short, long, global = true, default_value = "config.json", env = "DEPG_CONFIG")]
    config: PathBuf,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the dropdown cache from the workbook
    Cache,

    /// List cached dropdowns
    Dropdowns,

    #[command(long_about = "Render a profile from dropdown selections.

Each selection is COORD=VALUE where COORD is a dropdown's cell. Dropdowns
left out keep the workbook's own value. The profile goes to stdout unless
--output is given.")]
    Generate {
        /// Dropdown selection, COORD=VALUE (repeatable)
        #[arg(short, long = "select", value_name = "COORD=VALUE", value_parser = cli::parse_selection)]
        selections: Vec<(String, String)>,

        /// Profile title
        #[arg(short, long)]
        title: Option<String>,

        /// Write the profile to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the engine address of a cell coordinate
    Address {
        /// Cell coordinate, e.g. B37
        coord: String,

        /// Sheet name (defaults to the cached sheet)
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Run the HTTP server (port 5001 when DEPG_ENV=dev, else 80)
    Serve {
        /// Host address to bind to
        #[arg(short = 'H', long, default_value = "0.0.0.0", env = "DEPG_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "DEPG_PORT")]
        port: Option<u16>,

        /// Rebuild the dropdown cache before serving
        #[arg(long)]
        rebuild: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve { .. }) {
        cli::init_logging(cli.verbose);
    }

    match cli.command {
        Commands::Cache => cli::cache(cli.config)?,

        Commands::Dropdowns => cli::dropdowns(cli.config)?,

        Commands::Generate {
            selections,
            title,
            output,
        } => cli::generate(cli.config, selections, title, output)?,

        Commands::Address { coord, sheet } => cli::address(cli.config, coord, sheet)?,

        Commands::Serve {
            host,
            port,
            rebuild,
        } => cli::serve(cli.config, host, port, rebuild)?,
    }
    Ok(())
}
