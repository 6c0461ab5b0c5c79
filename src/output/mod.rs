pub mod report;

use serde::Serialize;

use crate::model::Row;
use crate::pagination::PaginationState;
use crate::render::cell::{format_cell, value_text};
use crate::render::{format_label, DateStyle, EMPTY_CELL};
use crate::schema::{CellFormat, TableSchema};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

/// One listed page, as written by `list`.
#[derive(Clone, Debug, Serialize)]
pub struct PageReport {
    pub table: String,
    pub fields: Vec<String>,
    pub data: Vec<Row>,
    pub pagination: PaginationState,
    /// Rendered listing and pagination markup; not part of the JSON output.
    #[serde(skip)]
    pub body: String,
}

fn unescape_html(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Cell text without markup; links and images become their URL.
pub fn plain_cell(schema: &TableSchema, field: &str, row: &Row, style: &DateStyle) -> String {
    let kind = schema.cell_kind(field);
    let value = row.get(field);
    match kind.cell_format() {
        CellFormat::Image | CellFormat::Download => value
            .map(value_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| EMPTY_CELL.to_string()),
        _ => unescape_html(&format_cell(&kind, value, style)),
    }
}

/// Escapes the characters that would split a tab-separated record.
fn tsv_field(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}

pub fn render_text(schema: &TableSchema, report: &PageReport, style: &DateStyle) -> Vec<u8> {
    let mut out = String::new();
    let headers: Vec<String> = report.fields.iter().map(|f| format_label(f)).collect();
    out.push_str(&headers.join("\t"));
    out.push('\n');
    for row in &report.data {
        let cells: Vec<String> = report
            .fields
            .iter()
            .map(|f| tsv_field(&plain_cell(schema, f, row, style)))
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    let p = &report.pagination;
    if p.enabled {
        out.push_str(&format!(
            "-- page {} of {} ({} items, {} per page)\n",
            p.page, p.total_pages, p.total_items, p.page_size
        ));
    } else {
        out.push_str(&format!("-- {} items\n", p.total_items));
    }
    out.into_bytes()
}

pub fn render_json(report: &PageReport) -> Vec<u8> {
    serde_json::to_vec_pretty(report).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render(
    format: OutputFormat,
    schema: &TableSchema,
    report: &PageReport,
    style: &DateStyle,
) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(schema, report, style),
        OutputFormat::Json => render_json(report),
        OutputFormat::Html => report::render_html(report),
    }
}
