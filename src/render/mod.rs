//! HTML markup for table listings and create/edit forms.
//!
//! Everything here is a pure function of rows, schema and option lists; the
//! caller decides where the markup goes.

pub mod cell;
pub mod widgets;

use crate::model::{RelatedOptionSets, Row};
use crate::schema::TableSchema;

pub use cell::{format_cell, format_duration, DateStyle, EMPTY_CELL};
pub use widgets::render_field;

pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `date_field` -> `Date Field`
pub fn format_label(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut out = String::with_capacity(spaced.len());
    let mut prev_word = false;
    for ch in spaced.chars() {
        let word = ch.is_ascii_alphanumeric();
        if word && !prev_word {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev_word = word;
    }
    out
}

/// `table1` -> `Table 1`
pub fn table_title(table: &str) -> String {
    table.replacen("table", "Table ", 1)
}

/// Columns shown for a page of rows: the first row's keys, in server order.
pub fn list_fields(rows: &[Row]) -> Vec<String> {
    rows.first().map(|r| r.field_names()).unwrap_or_default()
}

/// Renders the listing for `rows`. `fields` usually comes from [`list_fields`].
pub fn render_list(schema: &TableSchema, rows: &[Row], fields: &[String], style: &DateStyle) -> String {
    let title = escape_html(&table_title(&schema.table));
    let mut html = format!(r#"<span class="tablediv_title">{title}</span><br>"#);
    html.push_str(r#"<button class="tablediv_button" onclick="openCrudModal('create')">Add New Entry +</button>"#);

    if rows.is_empty() {
        html.push_str(r#"<br><span class="tablediv_title">No entries found :(</span>"#);
        return html;
    }

    html.push_str(r#"<table class="crud-table"><thead><tr>"#);
    for f in fields {
        html.push_str(&format!("<th>{}</th>", escape_html(&format_label(f))));
    }
    html.push_str("<th>Actions</th></tr></thead><tbody>");

    for row in rows {
        html.push_str("<tr>");
        for f in fields {
            let kind = schema.cell_kind(f);
            html.push_str(&format!("<td>{}</td>", format_cell(&kind, row.get(f), style)));
        }
        let id = row
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "null".to_string());
        html.push_str(&format!(
            r#"<td><button class="edit_button" onclick="openCrudModal('edit', {id})">Edit</button><button class="delete_button" onclick="deleteEntry({id})">Delete</button></td>"#
        ));
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Renders one widget per non-`id` field, pre-filled from `row` when editing.
pub fn render_form_fields(
    schema: &TableSchema,
    row: Option<&Row>,
    fields: &[String],
    options: &RelatedOptionSets,
) -> String {
    fields
        .iter()
        .filter(|f| f.as_str() != "id")
        .map(|f| {
            let kind = schema.form_kind(f);
            render_field(f, &kind, row.and_then(|r| r.get(f)), options)
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Full create/edit form: hidden table and id controls, widgets, submit button.
pub fn render_form(
    schema: &TableSchema,
    row: Option<&Row>,
    fields: &[String],
    options: &RelatedOptionSets,
) -> String {
    let id = row.and_then(|r| r.id());
    let (title, submit) = match id {
        Some(_) => ("Edit Entry", "Update"),
        None => ("Create Entry", "Create"),
    };
    let id_value = id.map(|i| i.to_string()).unwrap_or_default();
    let body = render_form_fields(schema, row, fields, options);
    format!(
        r#"<form id="crudForm" onsubmit="submitCrud(event)">
    <h2 id="crudTitle">{title}</h2>
    <input type="hidden" id="crudTable" name="crudTable" value="{}">
    <input type="hidden" id="crudId" name="crudId" value="{id_value}">
    <div id="formFields">{body}</div>
    <button type="submit" id="crudSubmitBtn">{submit}</button>
</form>"#,
        escape_html(&schema.table)
    )
}

/// Panel shown in place of the listing when loading fails.
pub fn render_error(table: &str, message: &str) -> String {
    format!(
        r#"<span class="tablediv_title">Error loading {}</span><br><span class="error">Error: {}</span>"#,
        escape_html(&table_title(table)),
        escape_html(message)
    )
}
