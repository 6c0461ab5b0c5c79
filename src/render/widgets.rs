use serde_json::Value;

use super::{escape_html, format_label};
use crate::model::{value_as_id, RelatedOption, RelatedOptionSets};
use crate::render::cell::value_text;
use crate::schema::{Choice, FieldKind, RelationTarget, Widget};

/// Id currently referenced by a relation or choice value (`{id, ..}` or a bare id).
pub(crate) fn selected_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Object(obj) => obj.get("id").and_then(value_as_id),
        other => value_as_id(other),
    }
}

pub(crate) fn selected_ids(value: Option<&Value>) -> Vec<i64> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|i| selected_id(Some(i))).collect(),
        _ => Vec::new(),
    }
}

fn row_wrap(label: &str, control: &str) -> String {
    format!(
        r#"
        <div class="form-row">
            <label class="label_field">{label}:</label>
            {control}
        </div>"#
    )
}

fn selected_attr(selected: bool) -> &'static str {
    if selected {
        " selected"
    } else {
        ""
    }
}

fn relation_option_label(target: &RelationTarget, opt: &RelatedOption) -> String {
    let display = opt
        .attr(&target.display)
        .map(value_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "N/A".to_string());
    format!("{} - {} ({})", opt.id, target.label, display)
}

fn render_select(field: &str, kind: &FieldKind, value: Option<&Value>, options: &RelatedOptionSets) -> String {
    let label = format_label(field);
    let current = selected_id(value);
    let mut opts = format!(r#"<option value="">-- Select {label} --</option>"#);

    match kind {
        FieldKind::Relation(target) => {
            for opt in options.get(&target.options) {
                opts.push_str(&format!(
                    r#"<option value="{}"{}>{}</option>"#,
                    opt.id,
                    selected_attr(current == Some(opt.id)),
                    escape_html(&relation_option_label(target, opt))
                ));
            }
        }
        FieldKind::Choice(choices) => {
            for Choice { id, name } in choices {
                opts.push_str(&format!(
                    r#"<option value="{id}"{}>{}</option>"#,
                    selected_attr(current == Some(*id)),
                    escape_html(name)
                ));
            }
        }
        _ => {}
    }

    let control = format!(
        r#"<select class="input_field" name="{}">{opts}</select>"#,
        escape_html(field)
    );
    row_wrap(&label, &control)
}

fn render_multi_select(
    field: &str,
    target: &RelationTarget,
    value: Option<&Value>,
    options: &RelatedOptionSets,
) -> String {
    let current = selected_ids(value);
    let mut opts = String::new();
    for opt in options.get(&target.options) {
        opts.push_str(&format!(
            r#"<option value="{}"{}>{}</option>"#,
            opt.id,
            selected_attr(current.contains(&opt.id)),
            escape_html(&relation_option_label(target, opt))
        ));
    }
    let control = format!(
        r#"<select class="input_field" name="{}" multiple size="3">{opts}</select>"#,
        escape_html(field)
    );
    row_wrap(&format_label(field), &control)
}

fn render_file_input(field: &str, value: Option<&Value>) -> String {
    let current = value
        .map(value_text)
        .filter(|s| !s.is_empty())
        .map(|s| format!(r#"<span class="current_file">Current: {}</span>"#, escape_html(&s)))
        .unwrap_or_default();
    let control = format!(
        r#"{current}<input class="input_field" type="file" name="{}">"#,
        escape_html(field)
    );
    row_wrap(&format_label(field), &control)
}

fn render_input(field: &str, input_type: Option<&str>, value: &str, extra: &str) -> String {
    let type_attr = input_type
        .map(|t| format!(r#" type="{t}""#))
        .unwrap_or_default();
    let control = format!(
        r#"<input class="input_field"{type_attr} name="{}" value="{}"{extra}>"#,
        escape_html(field),
        escape_html(value)
    );
    row_wrap(&format_label(field), &control)
}

fn text_value(value: Option<&Value>) -> String {
    value.map(value_text).unwrap_or_default()
}

/// Renders the edit widget for one field.
pub fn render_field(
    field: &str,
    kind: &FieldKind,
    value: Option<&Value>,
    options: &RelatedOptionSets,
) -> String {
    match (kind.widget(), kind) {
        (Widget::Select, _) => render_select(field, kind, value, options),
        (Widget::MultiSelect, FieldKind::ManyRelation(target)) => {
            render_multi_select(field, target, value, options)
        }
        (Widget::FilePicker, _) => render_file_input(field, value),
        (Widget::Checkbox, _) => {
            let checked = crate::render::cell::is_truthy(value);
            let control = format!(
                r#"<input class="input_field" type="checkbox" name="{}"{}>"#,
                escape_html(field),
                if checked { " checked" } else { "" }
            );
            row_wrap(&format_label(field), &control)
        }
        (Widget::DatePicker, _) => {
            let raw = text_value(value);
            let date = raw.split('T').next().unwrap_or_default().to_string();
            render_input(field, Some("date"), &date, "")
        }
        (Widget::TimePicker, _) => render_input(field, Some("time"), &text_value(value), ""),
        (Widget::DateTimePicker, _) => {
            let raw = text_value(value);
            let local = raw.strip_suffix('Z').unwrap_or(&raw).to_string();
            render_input(field, Some("datetime-local"), &local, "")
        }
        (Widget::DurationText, _) => render_input(
            field,
            Some("text"),
            &text_value(value),
            r#" placeholder="P1DT2H30M45S""#,
        ),
        (Widget::Email, _) => render_input(field, Some("email"), &text_value(value), " required"),
        _ => render_input(field, None, &text_value(value), ""),
    }
}
