//! Front-matter parsing

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_yaml::Value;

use crate::error::ContentError;

/// Line that opens and closes the metadata block
const DELIMITER: &str = "---";

/// Front-matter data from a post
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Vec<String>,
    pub featured: bool,

    /// Fields this crate does not know about, in source order
    pub extra: IndexMap<String, Value>,
}

impl FrontMatter {
    /// Parse front-matter from file contents.
    /// Returns (front_matter, body)
    pub fn parse(content: &str) -> Result<(Self, &str), ContentError> {
        let (yaml, body) = split_block(content)?;
        let fields = parse_mapping(yaml)?;
        let front_matter = Self::from_fields(fields)?;
        Ok((front_matter, body))
    }

    fn from_fields(fields: IndexMap<String, Value>) -> Result<Self, ContentError> {
        let mut fm = FrontMatter::default();

        for (key, value) in fields {
            match key.as_str() {
                "title" => fm.title = optional_string(value, "title")?,
                "date" => fm.date = optional_string(value, "date")?,
                "excerpt" => fm.excerpt = optional_string(value, "excerpt")?,
                "tags" => fm.tags = string_list(value, "tags")?,
                "featured" => fm.featured = boolean(value, "featured")?,
                _ => {
                    fm.extra.insert(key, value);
                }
            }
        }

        Ok(fm)
    }

    /// The required title
    pub fn require_title(&self) -> Result<&str, ContentError> {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => Ok(title),
            _ => Err(ContentError::MissingField("title")),
        }
    }

    /// Parse the required date field into a calendar date
    pub fn parse_date(&self) -> Result<NaiveDate, ContentError> {
        let raw = self
            .date
            .as_deref()
            .ok_or(ContentError::MissingField("date"))?;
        parse_date_string(raw).ok_or_else(|| ContentError::InvalidDate(raw.to_string()))
    }
}

/// Split file contents into the YAML block and the body
fn split_block(content: &str) -> Result<(&str, &str), ContentError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');

    let first = lines.next().unwrap_or("");
    if first.trim_end() != DELIMITER {
        return Err(ContentError::MalformedFrontMatter(
            "file must start with a `---` line".to_string(),
        ));
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let yaml = &content[yaml_start..offset];
            let body = &content[offset + line.len()..];
            return Ok((yaml, body));
        }
        offset += line.len();
    }

    Err(ContentError::MalformedFrontMatter(
        "no closing `---` line".to_string(),
    ))
}

fn parse_mapping(yaml: &str) -> Result<IndexMap<String, Value>, ContentError> {
    if yaml.trim().is_empty() {
        return Ok(IndexMap::new());
    }

    let value: Value = serde_yaml::from_str(yaml)
        .map_err(|e| ContentError::MalformedFrontMatter(e.to_string()))?;

    match value {
        Value::Null => Ok(IndexMap::new()),
        Value::Mapping(map) => map
            .into_iter()
            .map(|(key, value)| match scalar_to_string(&key) {
                Some(key) => Ok((key, value)),
                None => Err(ContentError::MalformedFrontMatter(
                    "front-matter keys must be plain scalars".to_string(),
                )),
            })
            .collect(),
        _ => Err(ContentError::MalformedFrontMatter(
            "front matter must be a key-value mapping".to_string(),
        )),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn optional_string(value: Value, field: &'static str) -> Result<Option<String>, ContentError> {
    match value {
        Value::Null => Ok(None),
        other => scalar_to_string(&other)
            .map(Some)
            .ok_or(ContentError::InvalidFieldType {
                field,
                expected: "a string",
            }),
    }
}

/// Accepts a single string or a list of strings.
/// Blank entries are dropped, duplicates keep their first position.
fn string_list(value: Value, field: &'static str) -> Result<Vec<String>, ContentError> {
    let invalid = || ContentError::InvalidFieldType {
        field,
        expected: "a string or a list of strings",
    };

    let items = match value {
        Value::Null => Vec::new(),
        Value::Sequence(seq) => seq
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| scalar_to_string(item).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?,
        other => vec![scalar_to_string(&other).ok_or_else(invalid)?],
    };

    let mut list: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !list.iter().any(|existing| existing == item) {
            list.push(item.to_string());
        }
    }
    Ok(list)
}

fn boolean(value: Value, field: &'static str) -> Result<bool, ContentError> {
    let invalid = ContentError::InvalidFieldType {
        field,
        expected: "a boolean",
    };

    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            _ => Err(invalid),
        },
        _ => Err(invalid),
    }
}

/// Parse a date string in various formats, keeping only the calendar date
pub fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d"];
    for fmt in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    let offset_formats = [
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S %z",
    ];
    for fmt in offset_formats {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.date_naive());
        }
    }

    None
}
