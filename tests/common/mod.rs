//! Shared fixtures: a small profile workbook and its config
#![allow(dead_code)]

use rust_xlsxwriter::{DataValidation, DocProperties, Formula, Workbook};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const WORKBOOK_FILE: &str = "profile_generator.xlsx";

pub const CONFIG: &str = r#"{
    "spreadsheet_file": "profile_generator.xlsx",
    "cache_json": "cache/dropdowns.json",
    "result_coords": {"temp": "B10", "time": "B11"},
    "result_rounding": {"temp": 1, "time": 0},
    "profile": {
        "advanced_shot": [
            {"name": "preinfusion", "temperature": "{temp}", "seconds": 8.0, "exit_if": true},
            {"name": "pour", "temperature": "{temp}", "seconds": "{time}"}
        ],
        "title": "{profile_title}",
        "notes": "{profile_notes}",
        "author": "Decent",
        "profile_hide": false,
        "espresso_temperature": "{temp}"
    }
}"#;

/// Profile for B3=Dark, B4=20, titled "Sunday Shot"
pub const DARK_SUNDAY_PROFILE: &str = "advanced_shot {{name preinfusion temperature 86.6 seconds 8.0 exit_if True} {name pour temperature 86.6 seconds 31}}\n\
title {Sunday Shot}\n\
notes {Roast: Dark, Dose: 20, Basket: }\n\
author Decent\n\
profile_hide False\n\
espresso_temperature 86.6\n";

/// Workbook layout:
///
/// `Lists` (first tab): roast names in A1:A3, temperatures in B1:B3.
/// `Generator` (active tab): dropdowns at B3 (range on Lists), B4 (inline
/// list) and B5 (local range H1:H2, label computed by a formula); results at
/// B10 (temperature) and B11 (shot time).
pub fn write_workbook(path: &Path) {
    let mut workbook = Workbook::new();
    workbook.set_properties(&DocProperties::new().set_author("Jane Barista"));

    let lists = workbook.add_worksheet();
    lists.set_name("Lists").unwrap();
    for (row, (roast, temp)) in [("Light", 94.3), ("Medium", 90.4), ("Dark", 86.6)]
        .iter()
        .enumerate()
    {
        lists.write_string(row as u32, 0, *roast).unwrap();
        lists.write_number(row as u32, 1, *temp).unwrap();
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Generator").unwrap();
    sheet.set_active(true);

    sheet.write_string(2, 0, "Roast").unwrap();
    sheet.write_string(2, 1, "Medium").unwrap();
    let roast = DataValidation::new().allow_list_formula(Formula::new("=Lists!$A$1:$A$3"));
    sheet.add_data_validation(2, 1, 2, 1, &roast).unwrap();

    sheet.write_string(3, 0, "Dose").unwrap();
    sheet.write_number(3, 1, 18).unwrap();
    let dose = DataValidation::new().allow_list_strings(&["18", "20"]).unwrap();
    sheet.add_data_validation(3, 1, 3, 1, &dose).unwrap();

    sheet.write_formula(4, 0, "=\"Bas\"&\"ket\"").unwrap();
    sheet.write_string(4, 1, "18g").unwrap();
    sheet.write_string(0, 7, "18g").unwrap();
    sheet.write_string(1, 7, "20g").unwrap();
    let basket = DataValidation::new().allow_list_formula(Formula::new("=$H$1:$H$2"));
    sheet.add_data_validation(4, 1, 4, 1, &basket).unwrap();

    sheet
        .write_formula(9, 1, "=VLOOKUP(B3,Lists!A1:B3,2,FALSE)")
        .unwrap();
    sheet.write_formula(10, 1, "=B4*1.55").unwrap();

    workbook.save(path).unwrap();
}

/// A temp directory holding the workbook and `config.json`
pub struct Fixture {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        write_workbook(&dir.path().join(WORKBOOK_FILE));
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, CONFIG).unwrap();
        Self { dir, config_path }
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.dir.path().join(WORKBOOK_FILE)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join("cache").join("dropdowns.json")
    }
}
