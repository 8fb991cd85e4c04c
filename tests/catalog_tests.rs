//! Dropdown cache built from a real workbook

mod common;

use common::Fixture;
use depg::catalog::{build_cache, load_cache, load_or_build, refresh_cache, CatalogEntry};
use depg::config::load_config;
use depg::engine::EvaluationSession;
use depg::DepgError;
use pretty_assertions::assert_eq;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILD
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_build_cache_from_validations() {
    let fixture = Fixture::new();
    let config = load_config(&fixture.config_path).unwrap();
    let session = EvaluationSession::load(&config.spreadsheet_file).unwrap();

    let cache = build_cache(&config, &session).unwrap();

    assert_eq!(cache.properties.sheet_name, "Generator");
    let coords: Vec<&str> = cache.dropdown_data.keys().collect();
    assert_eq!(coords, ["B3", "B4", "B5"]);

    assert_eq!(
        cache.dropdown_data.get("B3"),
        Some(&CatalogEntry::new("Roast", strings(&["Light", "Medium", "Dark"])))
    );
    assert_eq!(
        cache.dropdown_data.get("B4"),
        Some(&CatalogEntry::new("Dose", strings(&["18", "20"])))
    );
    // Label comes from a formula
    assert_eq!(
        cache.dropdown_data.get("B5"),
        Some(&CatalogEntry::new("Basket", strings(&["18g", "20g"])))
    );
}

#[test]
fn test_build_does_not_write() {
    let fixture = Fixture::new();
    let config = load_config(&fixture.config_path).unwrap();
    let session = EvaluationSession::load(&config.spreadsheet_file).unwrap();
    build_cache(&config, &session).unwrap();
    assert!(!fixture.cache_path().exists());
}

// ═══════════════════════════════════════════════════════════════════════════
// PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_refresh_writes_pretty_json() {
    let fixture = Fixture::new();
    let config = load_config(&fixture.config_path).unwrap();
    let session = EvaluationSession::load(&config.spreadsheet_file).unwrap();

    let built = refresh_cache(&config, &session).unwrap();
    let text = std::fs::read_to_string(fixture.cache_path()).unwrap();
    assert!(text.contains("\n    \"dropdown_data\": {"));
    assert!(!text.contains("selected_idx"));

    let loaded = load_cache(&fixture.cache_path()).unwrap();
    assert_eq!(loaded, built);
}

#[test]
fn test_load_or_build_prefers_existing_cache() {
    let fixture = Fixture::new();
    let config = load_config(&fixture.config_path).unwrap();
    let session = EvaluationSession::load(&config.spreadsheet_file).unwrap();

    let first = load_or_build(&config, &session, false).unwrap();
    assert!(fixture.cache_path().exists());

    // A hand-edited cache is served as-is until a forced rebuild
    let edited = std::fs::read_to_string(fixture.cache_path())
        .unwrap()
        .replace("\"Roast\"", "\"Roast level\"");
    std::fs::write(fixture.cache_path(), edited).unwrap();

    let loaded = load_or_build(&config, &session, false).unwrap();
    assert_eq!(loaded.dropdown_data.get("B3").unwrap().category, "Roast level");

    let rebuilt = load_or_build(&config, &session, true).unwrap();
    assert_eq!(rebuilt, first);
}

#[test]
fn test_corrupt_cache_is_fatal() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.cache_path().parent().unwrap()).unwrap();
    std::fs::write(fixture.cache_path(), "not json").unwrap();

    let config = load_config(&fixture.config_path).unwrap();
    let session = EvaluationSession::load(&config.spreadsheet_file).unwrap();
    assert!(matches!(
        load_or_build(&config, &session, false),
        Err(DepgError::Cache(_))
    ));
}
