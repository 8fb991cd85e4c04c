//! Profile generation
//!
//! One submission in, one profile out: selections become engine overrides,
//! the workbook is evaluated, configured result cells are read and rounded,
//! and the profile template is rendered to Tcl.

use crate::address::AddressTranslator;
use crate::catalog::{Catalog, DropdownCache};
use crate::config::{Config, NOTES_FIELD, TITLE_FIELD};
use crate::engine::{EvaluationSession, Overrides, Solution, Value};
use crate::error::{DepgError, DepgResult};
use crate::profile::{render_profile, ProfileDocument, ResultSet, ResultValue};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Submitted form fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    /// Coordinate → submitted value
    pub selections: HashMap<String, String>,
    pub title: Option<String>,
}

impl Submission {
    /// Split raw form fields into selections and the profile title
    pub fn from_form(mut form: HashMap<String, String>) -> Self {
        let title = form.remove(TITLE_FIELD);
        Self {
            selections: form,
            title,
        }
    }

    pub fn select(mut self, coord: impl Into<String>, value: impl Into<String>) -> Self {
        self.selections.insert(coord.into(), value.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Everything a generation produced
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedProfile {
    /// Tcl profile text
    pub profile: String,
    #[serde(skip)]
    pub document: ProfileDocument,
    pub results: ResultSet,
    /// Catalog with this submission's selections
    pub catalog: Catalog,
    pub notes: String,
}

#[derive(Clone)]
pub struct ProfileGenerator {
    config: Arc<Config>,
    session: EvaluationSession,
}

impl ProfileGenerator {
    pub fn new(config: Arc<Config>, session: EvaluationSession) -> Self {
        Self { config, session }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &EvaluationSession {
        &self.session
    }

    pub fn translator(&self, cache: &DropdownCache) -> AddressTranslator {
        AddressTranslator::new(&self.config, Some(&cache.properties))
    }

    /// Only catalog coordinates become overrides; other fields are ignored
    pub fn overrides(&self, cache: &DropdownCache, submission: &Submission) -> DepgResult<Overrides> {
        let translator = self.translator(cache);
        let mut overrides = Overrides::new();
        for coord in cache.dropdown_data.keys() {
            if let Some(value) = submission.selections.get(coord) {
                overrides.insert(translator.translate(coord)?, Value::from_input(value));
            }
        }
        Ok(overrides)
    }

    /// Read and round every configured result cell
    pub fn results(&self, solution: &Solution, translator: &AddressTranslator) -> DepgResult<ResultSet> {
        let mut results = ResultSet::new();
        for (field, coord) in self.config.result_coords.iter() {
            let address = translator.translate(coord)?;
            let value = solution.value(&address);
            let precision = self.config.result_rounding.get(field).copied().flatten();

            let result = match value {
                Value::Error(e) => {
                    return Err(DepgError::Evaluation {
                        field: field.to_string(),
                        address,
                        marker: e.marker().to_string(),
                    })
                }
                Value::Array(_) => {
                    return Err(DepgError::Evaluation {
                        field: field.to_string(),
                        address,
                        marker: "a multi-cell range".to_string(),
                    })
                }
                Value::Text(text) => match text.trim().parse::<f64>() {
                    Ok(n) => ResultValue::number(n, precision),
                    Err(_) => ResultValue::Text(text),
                },
                other => match other.as_number() {
                    Ok(n) => ResultValue::number(n, precision),
                    Err(e) => {
                        return Err(DepgError::Evaluation {
                            field: field.to_string(),
                            address,
                            marker: e.marker().to_string(),
                        })
                    }
                },
            };
            results.insert(field, result);
        }
        Ok(results)
    }

    pub fn generate(&self, cache: &DropdownCache, submission: &Submission) -> DepgResult<GeneratedProfile> {
        let started = Instant::now();
        let catalog = cache.with_selections(&submission.selections);
        let notes = cache.notes(&submission.selections);

        let overrides = self.overrides(cache, submission)?;
        let solution = self.session.evaluate(&overrides)?;

        let mut results = self.results(&solution, &self.translator(cache))?;
        results.insert(NOTES_FIELD, ResultValue::Text(notes.clone()));
        results.insert(
            TITLE_FIELD,
            ResultValue::Text(submission.title.clone().unwrap_or_default()),
        );

        let document = render_profile(&self.config.profile, &results)?;
        let profile = document.to_tcl();

        tracing::info!(
            overrides = overrides.len(),
            results = self.config.result_coords.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "profile generated"
        );

        Ok(GeneratedProfile {
            profile,
            document,
            results,
            catalog,
            notes,
        })
    }
}
