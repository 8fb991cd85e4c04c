use crate::address::AddressTranslator;
use crate::api::{self, ApiConfig, AppState, Mode};
use crate::catalog::{load_cache, load_or_build, refresh_cache, DropdownCache};
use crate::config::load_config;
use crate::engine::EvaluationSession;
use crate::error::{DepgError, DepgResult};
use crate::generator::{ProfileGenerator, Submission};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parse a `COORD=VALUE` selection; the value may be empty or contain `=`
pub fn parse_selection(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((coord, value)) if !coord.trim().is_empty() => {
            Ok((coord.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected COORD=VALUE, got '{}'", raw)),
    }
}

/// Log to stderr so profile output on stdout stays clean
pub fn init_logging(verbose: bool) {
    let default = if verbose { "depg=debug" } else { "depg=warn" };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .try_init();
}

fn load_generator(config_path: &Path) -> DepgResult<ProfileGenerator> {
    let config = load_config(config_path)?;
    let session = EvaluationSession::load(&config.spreadsheet_file)?;
    Ok(ProfileGenerator::new(Arc::new(config), session))
}

/// Everything the server needs: config, loaded workbook and a ready cache
pub fn load_app_state(config_path: &Path, rebuild: bool) -> DepgResult<AppState> {
    let generator = load_generator(config_path)?;
    let cache = load_or_build(generator.config(), generator.session(), rebuild)?;
    Ok(AppState::new(generator, cache))
}

/// Execute the cache command - rebuild the dropdown cache from the workbook
pub fn cache(config_path: PathBuf) -> DepgResult<()> {
    println!("{}", "☕ DEPG - Rebuilding dropdown cache".bold().green());
    println!("   Config: {}", config_path.display());

    let generator = load_generator(&config_path)?;
    let cache = refresh_cache(generator.config(), generator.session())?;

    println!("   Sheet: {}", cache.properties.sheet_name.bright_blue());
    println!(
        "{}",
        format!(
            "✅ {} dropdowns written to {}",
            cache.dropdown_data.len(),
            generator.config().cache_json.display()
        )
        .green()
    );
    Ok(())
}

fn print_properties(cache: &DropdownCache) {
    let props = &cache.properties;
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("   Sheet: {}", props.sheet_name.bright_blue().bold());
    println!("   Created: {} by {}", show(&props.created), show(&props.creator));
    println!(
        "   Modified: {} by {}",
        show(&props.modified),
        show(&props.last_modified_by)
    );
}

/// Execute the dropdowns command - list the cached catalog
pub fn dropdowns(config_path: PathBuf) -> DepgResult<()> {
    let config = load_config(&config_path)?;
    let cache = load_cache(&config.cache_json)?;

    println!("{}", "📋 DEPG - Dropdowns".bold().green());
    print_properties(&cache);
    println!();

    for (coord, entry) in cache.dropdown_data.iter() {
        println!(
            "   {} {}",
            coord.cyan().bold(),
            entry.category.bright_blue()
        );
        for value in &entry.values {
            println!("      - {}", value);
        }
    }
    Ok(())
}

/// Execute the generate command - render a profile from selections
pub fn generate(
    config_path: PathBuf,
    selections: Vec<(String, String)>,
    title: Option<String>,
    output: Option<PathBuf>,
) -> DepgResult<()> {
    let generator = load_generator(&config_path)?;
    let cache = load_or_build(generator.config(), generator.session(), false)?;

    let mut submission = Submission::default();
    for (coord, value) in selections {
        if !cache.dropdown_data.contains_key(&coord) {
            eprintln!(
                "{}",
                format!("⚠️  {} is not a dropdown; ignored", coord).yellow()
            );
        }
        submission = submission.select(coord, value);
    }
    submission.title = title;

    let generated = generator.generate(&cache, &submission)?;

    match output {
        Some(path) => {
            fs::write(&path, &generated.profile)?;
            eprintln!(
                "{}",
                format!("✅ Profile written to {}", path.display()).green()
            );
        }
        None => print!("{}", generated.profile),
    }
    Ok(())
}

/// Execute the address command - show the engine address of a coordinate
pub fn address(config_path: PathBuf, coord: String, sheet: Option<String>) -> DepgResult<()> {
    let config = load_config(&config_path)?;
    let translator = match sheet {
        Some(sheet) => AddressTranslator::with_sheet(&config.spreadsheet_file, sheet),
        None => {
            let cache = load_cache(&config.cache_json)?;
            AddressTranslator::new(&config, Some(&cache.properties))
        }
    };
    println!("{}", translator.translate(&coord)?);
    Ok(())
}

/// Execute the serve command - load everything, then run the HTTP server
pub fn serve(
    config_path: PathBuf,
    host: String,
    port: Option<u16>,
    rebuild: bool,
) -> anyhow::Result<()> {
    let mode = Mode::from_env();
    api::init_tracing(mode);

    let state = load_app_state(&config_path, rebuild)?;
    let config = ApiConfig {
        host,
        port: port.unwrap_or_else(|| mode.default_port()),
    };

    let runtime = tokio::runtime::Runtime::new().map_err(DepgError::Io)?;
    runtime.block_on(api::run_api_server(config, Arc::new(state)))
}
