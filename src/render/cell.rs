use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use super::escape_html;
use crate::schema::{CellFormat, FieldKind};

pub const EMPTY_CELL: &str = "-";

/// Calendar rendering for date and datetime cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateStyle {
    pub date_format: String,
    pub datetime_format: String,
    /// Zone datetimes are shown in; `None` uses the local zone.
    pub offset: Option<FixedOffset>,
}

impl Default for DateStyle {
    fn default() -> Self {
        Self {
            date_format: "%-m/%-d/%Y".to_string(),
            datetime_format: "%-m/%-d/%Y, %-I:%M:%S %p".to_string(),
            offset: None,
        }
    }
}

impl DateStyle {
    pub fn format_date(&self, raw: &str) -> String {
        let date_part = raw.split('T').next().unwrap_or(raw);
        match NaiveDate::parse_from_str(date_part.trim(), "%Y-%m-%d") {
            Ok(date) => date.format(&self.date_format).to_string(),
            Err(_) => raw.to_string(),
        }
    }

    pub fn format_datetime(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return match self.offset {
                Some(offset) => dt.with_timezone(&offset).format(&self.datetime_format).to_string(),
                None => dt.with_timezone(&Local).format(&self.datetime_format).to_string(),
            };
        }
        for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
                return naive.format(&self.datetime_format).to_string();
            }
        }
        raw.to_string()
    }
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"P(?:(\d+)D)?T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?")
            .expect("duration pattern is valid")
    })
}

/// Formats an ISO-8601-like duration (`P1DT2H30M45S`).
///
/// Returns `None` when the text has no `P..T..` token.
pub fn format_duration(raw: &str) -> Option<String> {
    let caps = duration_re().captures(raw)?;
    // Digits pass through as text with leading zeros dropped.
    let part = |i: usize| {
        match caps.get(i).map(|m| m.as_str().trim_start_matches('0')) {
            Some(digits) if !digits.is_empty() => digits,
            _ => "0",
        }
    };
    Some(format!(
        "{} days, {} hours, {} minutes, {} seconds",
        part(1),
        part(2),
        part(3),
        part(4)
    ))
}

/// JavaScript-style truthiness, which the backend's conventions rely on.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Plain text of a JSON value: strings unquoted, everything else as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn relation_label(kind: &FieldKind, item: &Value) -> Option<String> {
    let target = kind.relation_target()?;
    let obj = item.as_object()?;
    let display = obj.get(&target.display)?;
    let id = obj.get("id").map(value_text).unwrap_or_default();
    Some(format!(
        "{} id:{} ({})",
        target.label,
        id,
        value_text(display)
    ))
}

/// Renders one table cell. Output is HTML-safe.
pub fn format_cell(kind: &FieldKind, value: Option<&Value>, style: &DateStyle) -> String {
    let format = kind.cell_format();
    let truthy = is_truthy(value);

    match format {
        CellFormat::Image => {
            return match value.filter(|_| truthy) {
                Some(v) => format!(r#"<img src="{}" alt="img">"#, escape_html(&value_text(v))),
                None => EMPTY_CELL.to_string(),
            };
        }
        CellFormat::Download => {
            return match value.filter(|_| truthy) {
                Some(v) => format!(
                    r#"<a href="{}" download>Download</a>"#,
                    escape_html(&value_text(v))
                ),
                None => EMPTY_CELL.to_string(),
            };
        }
        CellFormat::Boolean => {
            return if truthy { "True" } else { "False" }.to_string();
        }
        CellFormat::Date if truthy => {
            if let Some(v) = value {
                return escape_html(&style.format_date(&value_text(v)));
            }
        }
        CellFormat::Time if truthy => {
            if let Some(v) = value {
                return escape_html(&value_text(v));
            }
        }
        CellFormat::DateTime if truthy => {
            if let Some(v) = value {
                return escape_html(&style.format_datetime(&value_text(v)));
            }
        }
        CellFormat::Duration if truthy => {
            if let Some(v) = value {
                return format_duration(&value_text(v))
                    .map(|s| escape_html(&s))
                    .unwrap_or_default();
            }
        }
        CellFormat::Relation if truthy => {
            return value
                .and_then(|v| relation_label(kind, v))
                .map(|s| escape_html(&s))
                .unwrap_or_else(|| EMPTY_CELL.to_string());
        }
        CellFormat::ManyRelation => {
            let items = match value {
                Some(Value::Array(items)) if !items.is_empty() => items,
                _ => return EMPTY_CELL.to_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|item| relation_label(kind, item).unwrap_or_else(|| value_text(item)))
                .collect();
            return escape_html(&parts.join(", "));
        }
        _ => {}
    }

    if is_blank(value) {
        return EMPTY_CELL.to_string();
    }
    value
        .map(|v| escape_html(&value_text(v)))
        .unwrap_or_else(|| EMPTY_CELL.to_string())
}
