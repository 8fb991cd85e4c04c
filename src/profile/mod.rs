//! Profile rendering
//!
//! Merges computed results into the configured profile template and writes
//! the result as the Tcl script the espresso machine loads.

pub mod tcl;
pub mod template;

use crate::config::{FieldTemplate, ProfileTemplate, TemplateValue, STEPS_FIELD};
use crate::error::DepgResult;
use crate::types::OrderedMap;
use serde::Serialize;
use std::fmt;

pub use template::Template;

/// A computed value available to templates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    /// `precision` is the number of decimals kept, `None` for full precision
    Number { value: f64, precision: Option<u32> },
    Text(String),
}

impl ResultValue {
    /// Round half-to-even at `precision` decimals, keeping the precision for display
    pub fn number(raw: f64, precision: Option<u32>) -> Self {
        let value = match precision {
            Some(p) => format!("{:.*}", p as usize, raw).parse().unwrap_or(raw),
            None => raw,
        };
        ResultValue::Number { value, precision }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Number {
                value,
                precision: Some(p),
            } => write!(f, "{:.*}", *p as usize, value),
            ResultValue::Number {
                value,
                precision: None,
            } => write!(f, "{}", value),
            ResultValue::Text(s) => f.write_str(s),
        }
    }
}

/// Result-field name → value, in config order
pub type ResultSet = OrderedMap<ResultValue>;

/// A rendered profile attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderedValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl RenderedValue {
    /// The word as the machine should read it; numbers and booleans are
    /// spelled the way the reference tooling spells them (`8.0`, `True`)
    pub fn as_word(&self) -> String {
        match self {
            RenderedValue::Bool(true) => "True".to_string(),
            RenderedValue::Bool(false) => "False".to_string(),
            RenderedValue::Number(n) => n.to_string(),
            RenderedValue::Text(s) => s.clone(),
        }
    }
}

impl From<&TemplateValue> for RenderedValue {
    fn from(value: &TemplateValue) -> Self {
        match value {
            TemplateValue::Bool(b) => RenderedValue::Bool(*b),
            TemplateValue::Number(n) => RenderedValue::Number(n.clone()),
            TemplateValue::Text(s) => RenderedValue::Text(s.clone()),
        }
    }
}

/// The final profile: ordered steps plus ordered base attributes
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ProfileDocument {
    pub steps: Vec<OrderedMap<RenderedValue>>,
    pub base: OrderedMap<RenderedValue>,
}

impl ProfileDocument {
    /// Serialize to the Tcl profile format.
    ///
    /// The step list comes first as one nested list, then one `key value`
    /// line per base attribute.
    pub fn to_tcl(&self) -> String {
        let steps: Vec<String> = self
            .steps
            .iter()
            .map(|step| {
                let words: Vec<String> = step
                    .iter()
                    .flat_map(|(k, v)| [k.to_string(), v.as_word()])
                    .collect();
                tcl::stringify_list(&words)
            })
            .collect();

        let mut out = format!("{} {{{}}}\n", STEPS_FIELD, steps.join(" "));
        for (key, value) in self.base.iter() {
            out.push_str(&tcl::stringify(key));
            out.push(' ');
            out.push_str(&tcl::stringify(&value.as_word()));
            out.push('\n');
        }
        out
    }
}

fn render_fields(
    fields: &OrderedMap<FieldTemplate>,
    values: &ResultSet,
) -> DepgResult<OrderedMap<RenderedValue>> {
    let mut out = OrderedMap::new();
    for (key, field) in fields.iter() {
        let rendered = match field {
            FieldTemplate::Literal(value) => RenderedValue::from(value),
            FieldTemplate::Format(template) => RenderedValue::Text(template.render(values)?),
        };
        out.insert(key, rendered);
    }
    Ok(out)
}

/// Fill the template with computed values
pub fn render_profile(template: &ProfileTemplate, values: &ResultSet) -> DepgResult<ProfileDocument> {
    let base = render_fields(&template.base, values)?;
    let steps = template
        .steps
        .iter()
        .map(|step| render_fields(step, values))
        .collect::<DepgResult<Vec<_>>>()?;
    Ok(ProfileDocument { steps, base })
}
