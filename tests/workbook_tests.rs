//! Workbook loading and inspection against a real .xlsx package

mod common;

use common::Fixture;
use depg::address::qualified_address;
use depg::engine::{EvaluationSession, Overrides, Value, WorkbookEngine};
use depg::excel::{inspect_workbook, ListSource};
use pretty_assertions::assert_eq;

fn addr(fixture: &Fixture, sheet: &str, coord: &str) -> String {
    qualified_address(&fixture.workbook_path(), sheet, coord)
}

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE LOAD
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_engine_reads_every_sheet() {
    let fixture = Fixture::new();
    let engine = WorkbookEngine::load(fixture.workbook_path()).unwrap();
    assert_eq!(engine.book(), "PROFILE_GENERATOR.XLSX");
    assert_eq!(engine.sheet_names(), ["Lists".to_string(), "Generator".to_string()]);
    assert_eq!(engine.formula_count(), 3);
}

#[test]
fn test_baseline_evaluation() {
    let fixture = Fixture::new();
    let session = EvaluationSession::load(&fixture.workbook_path()).unwrap();
    let solution = session.baseline().unwrap();

    assert_eq!(solution.value(&addr(&fixture, "Generator", "B10")), Value::Number(90.4));
    assert_eq!(
        solution.value(&addr(&fixture, "Generator", "A5")),
        Value::Text("Basket".to_string())
    );
    assert_eq!(
        solution.value(&addr(&fixture, "Lists", "A3")),
        Value::Text("Dark".to_string())
    );
}

#[test]
fn test_overrides_flow_through_formulas() {
    let fixture = Fixture::new();
    let session = EvaluationSession::load(&fixture.workbook_path()).unwrap();

    let mut overrides = Overrides::new();
    overrides.insert(addr(&fixture, "Generator", "B3"), Value::from_input("Light"));
    overrides.insert(addr(&fixture, "Generator", "B4"), Value::from_input("20"));
    let solution = session.evaluate(&overrides).unwrap();

    assert_eq!(solution.value(&addr(&fixture, "Generator", "B10")), Value::Number(94.3));
    match solution.value(&addr(&fixture, "Generator", "B11")) {
        Value::Number(n) => assert!((n - 31.0).abs() < 1e-9),
        other => panic!("expected a number, got {other:?}"),
    }

    // The session itself is unchanged
    let baseline = session.baseline().unwrap();
    assert_eq!(baseline.value(&addr(&fixture, "Generator", "B10")), Value::Number(90.4));
}

#[test]
fn test_unknown_selection_yields_error_marker() {
    let fixture = Fixture::new();
    let session = EvaluationSession::load(&fixture.workbook_path()).unwrap();

    let mut overrides = Overrides::new();
    overrides.insert(addr(&fixture, "Generator", "B3"), Value::from_input("Blonde"));
    let solution = session.evaluate(&overrides).unwrap();

    let cell = solution.get(&addr(&fixture, "Generator", "B10")).unwrap();
    assert_eq!(cell.error().map(|e| e.marker()), Some("#N/A"));
}

#[test]
fn test_missing_workbook() {
    let dir = tempfile::tempdir().unwrap();
    assert!(EvaluationSession::load(&dir.path().join("none.xlsx")).is_err());
}

// ═══════════════════════════════════════════════════════════════════════════
// INSPECTION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_inspection_finds_active_sheet_and_properties() {
    let fixture = Fixture::new();
    let inspection = inspect_workbook(&fixture.workbook_path()).unwrap();

    assert_eq!(inspection.sheets, ["Lists".to_string(), "Generator".to_string()]);
    assert_eq!(inspection.active_sheet, 1);
    assert_eq!(inspection.active_sheet_name(), "Generator");
    assert_eq!(inspection.properties.creator.as_deref(), Some("Jane Barista"));

    let created = inspection.properties.created.clone().unwrap();
    assert_eq!(created.len(), "2024-01-01 00:00:00".len());
    assert_eq!(&created[4..5], "-");
    assert_eq!(&created[10..11], " ");
}

#[test]
fn test_inspection_reads_list_validations() {
    let fixture = Fixture::new();
    let inspection = inspect_workbook(&fixture.workbook_path()).unwrap();
    let validations: Vec<_> = inspection.active_validations().collect();

    let targets: Vec<String> = validations.iter().map(|v| v.target.to_string()).collect();
    assert_eq!(targets, ["B3", "B4", "B5"]);

    assert_eq!(
        validations[0].source,
        ListSource::Range {
            sheet: Some("Lists".to_string()),
            range: "A1:A3".to_string(),
        }
    );
    assert_eq!(
        validations[1].source,
        ListSource::Inline(vec!["18".to_string(), "20".to_string()])
    );
    assert_eq!(
        validations[2].source,
        ListSource::Range {
            sheet: None,
            range: "H1:H2".to_string(),
        }
    );
}
