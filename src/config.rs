//! Configuration loader
//!
//! The config names the spreadsheet, the cache file, which cells hold the
//! results (and how to round them) and the profile template. It is loaded
//! once; any problem here is fatal.

use crate::address::CellRef;
use crate::error::{DepgError, DepgResult};
use crate::profile::template::Template;
use crate::types::OrderedMap;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The distinguished profile field holding the ordered step list
pub const STEPS_FIELD: &str = "advanced_shot";
/// Template field carrying the "category: value" summary of the selections
pub const NOTES_FIELD: &str = "profile_notes";
/// Template field carrying the user-supplied title
pub const TITLE_FIELD: &str = "profile_title";

/// Default config location, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// A literal value as written in the profile template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawProfileField {
    Steps(Vec<OrderedMap<TemplateValue>>),
    Value(TemplateValue),
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    spreadsheet_file: PathBuf,
    cache_json: PathBuf,
    result_coords: OrderedMap<String>,
    result_rounding: OrderedMap<Option<u32>>,
    profile: OrderedMap<RawProfileField>,
}

/// One profile field: copied verbatim or rendered from results
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTemplate {
    Literal(TemplateValue),
    Format(Template),
}

impl FieldTemplate {
    fn from_value(value: TemplateValue) -> DepgResult<Self> {
        match value {
            TemplateValue::Text(s) => {
                let template = Template::parse(&s)?;
                match template.literal_text() {
                    Some(text) => Ok(FieldTemplate::Literal(TemplateValue::Text(text))),
                    None => Ok(FieldTemplate::Format(template)),
                }
            }
            other => Ok(FieldTemplate::Literal(other)),
        }
    }
}

/// Profile template: base fields plus the ordered step templates
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileTemplate {
    pub base: OrderedMap<FieldTemplate>,
    pub steps: Vec<OrderedMap<FieldTemplate>>,
}

impl ProfileTemplate {
    /// Every format-string field, base first then steps
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.base
            .values()
            .chain(self.steps.iter().flat_map(|s| s.values()))
            .filter_map(|f| match f {
                FieldTemplate::Format(t) => Some(t),
                FieldTemplate::Literal(_) => None,
            })
    }
}

/// Immutable application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub spreadsheet_file: PathBuf,
    pub cache_json: PathBuf,
    pub result_coords: OrderedMap<String>,
    /// `None` keeps full precision
    pub result_rounding: OrderedMap<Option<u32>>,
    pub profile: ProfileTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json,
        }
    }
}

/// Load and validate the config file.
///
/// Relative paths inside the config resolve against the config's directory.
pub fn load_config(path: &Path) -> DepgResult<Config> {
    if !path.is_file() {
        return Err(DepgError::Config(format!(
            "could not load config: {} not found",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let config = Config::parse(&content, ConfigFormat::from_path(path), base_dir)?;

    tracing::debug!(
        config = %path.display(),
        results = config.result_coords.len(),
        steps = config.profile.steps.len(),
        "configuration loaded"
    );
    Ok(config)
}

impl Config {
    pub fn parse(content: &str, format: ConfigFormat, base_dir: &Path) -> DepgResult<Config> {
        if content.trim().is_empty() {
            return Err(DepgError::Config("could not load config: file is empty".to_string()));
        }

        let value: serde_json::Value = match format {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        };
        if is_falsy(&value) {
            return Err(DepgError::Config("could not load config: no settings".to_string()));
        }
        validate_against_schema(&value)?;

        let raw: RawConfig = serde_json::from_value(value)?;

        let config = Config {
            spreadsheet_file: resolve(base_dir, raw.spreadsheet_file),
            cache_json: resolve(base_dir, raw.cache_json),
            result_coords: raw.result_coords,
            result_rounding: raw.result_rounding,
            profile: build_profile(raw.profile)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Names a template may reference
    pub fn known_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.result_coords.keys().collect();
        fields.push(NOTES_FIELD);
        fields.push(TITLE_FIELD);
        fields
    }

    fn validate(&self) -> DepgResult<()> {
        for (key, coord) in self.result_coords.iter() {
            CellRef::parse(coord).map_err(|_| {
                DepgError::Config(format!("result_coords.{key}: '{coord}' is not a cell coordinate"))
            })?;
            if !self.result_rounding.contains_key(key) {
                return Err(DepgError::Config(format!(
                    "result_rounding has no entry for '{key}' (use null for no rounding)"
                )));
            }
        }

        let known = self.known_fields();
        for template in self.profile.templates() {
            for name in template.placeholders() {
                if !known.contains(&name) {
                    return Err(DepgError::Config(format!(
                        "profile template '{}' references unknown field '{}'",
                        template.source(),
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn is_falsy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn build_profile(raw: OrderedMap<RawProfileField>) -> DepgResult<ProfileTemplate> {
    let mut profile = ProfileTemplate::default();
    let mut saw_steps = false;

    for (name, field) in raw {
        match (name == STEPS_FIELD, field) {
            (true, RawProfileField::Steps(steps)) => {
                saw_steps = true;
                for step in steps {
                    let mut rendered = OrderedMap::new();
                    for (key, value) in step {
                        rendered.insert(key, FieldTemplate::from_value(value)?);
                    }
                    profile.steps.push(rendered);
                }
            }
            (false, RawProfileField::Value(value)) => {
                profile.base.insert(name, FieldTemplate::from_value(value)?);
            }
            (true, RawProfileField::Value(_)) => {
                return Err(DepgError::Config(format!(
                    "profile.{STEPS_FIELD} must be a list of steps"
                )));
            }
            (false, RawProfileField::Steps(_)) => {
                return Err(DepgError::Config(format!(
                    "profile.{name}: only {STEPS_FIELD} may hold a list"
                )));
            }
        }
    }

    if !saw_steps {
        return Err(DepgError::Config(format!("profile.{STEPS_FIELD} is missing")));
    }
    Ok(profile)
}

/// Validate the raw config against the embedded JSON Schema
fn validate_against_schema(value: &serde_json::Value) -> DepgResult<()> {
    let schema_str = include_str!("../schema/depg-config.schema.json");
    let schema_value: serde_json::Value = serde_json::from_str(schema_str)
        .map_err(|e| DepgError::Config(format!("Failed to parse schema: {}", e)))?;

    let compiled_schema = JSONSchema::compile(&schema_value)
        .map_err(|e| DepgError::Config(format!("Failed to compile schema: {}", e)))?;

    if let Err(errors) = compiled_schema.validate(value) {
        let error_messages: Vec<String> = errors.map(|e| format!("  - {}", e)).collect();
        return Err(DepgError::Config(format!(
            "Schema validation failed:\n{}",
            error_messages.join("\n")
        )));
    }

    Ok(())
}
