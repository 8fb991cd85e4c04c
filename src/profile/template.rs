//! Format-string templates for profile fields
//!
//! Syntax: `{name}` substitutes a value, `{name:.2f}` substitutes a number
//! with fixed decimals, `{{` and `}}` are literal braces. Anything else is an
//! error at parse time.

use super::{ResultSet, ResultValue};
use crate::error::{DepgError, DepgResult};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field {
        name: String,
        precision: Option<usize>,
    },
}

/// A parsed format string
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> DepgResult<Self> {
        let err = |msg: &str| DepgError::Template(format!("{msg} in '{source}'"));
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(err("single '}'")),
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(err("nested '{'")),
                            Some(ch) => inner.push(ch),
                            None => return Err(err("unclosed '{'")),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_field(&inner).ok_or_else(|| {
                        err(&format!("unsupported placeholder '{{{inner}}}'"))
                    })?);
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the template has no placeholders
    pub fn is_literal(&self) -> bool {
        self.placeholders().next().is_none()
    }

    /// Rendered text of a template without placeholders, braces unescaped
    pub fn literal_text(&self) -> Option<String> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => Some(text.as_str()),
                Segment::Field { .. } => None,
            })
            .collect()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, values: &ResultSet) -> DepgResult<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { name, precision } => {
                    let value = values.get(name).ok_or_else(|| {
                        DepgError::Config(format!(
                            "profile template '{}' needs '{}' but it was not computed",
                            self.source, name
                        ))
                    })?;
                    match (precision, value) {
                        (None, v) => out.push_str(&v.to_string()),
                        (Some(p), ResultValue::Number { value, .. }) => {
                            out.push_str(&format!("{:.*}", p, value))
                        }
                        (Some(_), ResultValue::Text(_)) => {
                            return Err(DepgError::Template(format!(
                                "'{}' is text and cannot take a numeric format in '{}'",
                                name, self.source
                            )))
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

fn parse_field(inner: &str) -> Option<Segment> {
    let (name, spec) = match inner.split_once(':') {
        Some((name, spec)) => (name, Some(spec)),
        None => (inner, None),
    };

    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_')
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }

    let precision = match spec {
        None => None,
        Some(spec) => Some(
            spec.strip_prefix('.')?
                .strip_suffix('f')?
                .parse::<usize>()
                .ok()?,
        ),
    };

    Some(Segment::Field {
        name: name.to_string(),
        precision,
    })
}
