pub mod attachment;

use std::path::PathBuf;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::fetcher::{CrudClient, CrudError, Payload};
use crate::model::Row;
use crate::schema::{FieldKind, TableSchema, ValueEncoding, Widget};

pub use attachment::SelectedFile;

/// Controls holding the table name and row id; never part of the payload.
pub const META_CONTROLS: [&str; 2] = ["crudTable", "crudId"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlKind {
    Text(String),
    Hidden(String),
    /// Dropdown whose value is sent as plain text (fixed choices).
    Select { value: String },
    /// Dropdown referencing one related row.
    RelationSelect { value: String },
    /// Multi-select referencing related rows.
    MultiSelect { selected: Vec<String> },
    Checkbox { checked: bool },
    File { files: Vec<SelectedFile> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormControl {
    pub name: String,
    pub kind: ControlKind,
}

impl FormControl {
    pub fn new(name: &str, kind: ControlKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    fn from_field(name: &str, kind: &FieldKind, value: Option<&Value>) -> Self {
        let text = value.map(crate::render::cell::value_text).unwrap_or_default();
        let control = match (kind.widget(), kind.encoding()) {
            (Widget::Select, ValueEncoding::RelationOne) => ControlKind::RelationSelect {
                value: crate::render::widgets::selected_id(value)
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            },
            (Widget::Select, _) => ControlKind::Select {
                value: crate::render::widgets::selected_id(value)
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            },
            (Widget::MultiSelect, _) => ControlKind::MultiSelect {
                selected: crate::render::widgets::selected_ids(value)
                    .into_iter()
                    .map(|id| id.to_string())
                    .collect(),
            },
            (Widget::Checkbox, _) => ControlKind::Checkbox {
                checked: crate::render::cell::is_truthy(value),
            },
            (Widget::FilePicker, _) => ControlKind::File { files: Vec::new() },
            (Widget::DatePicker, _) => {
                ControlKind::Text(text.split('T').next().unwrap_or_default().to_string())
            }
            (Widget::DateTimePicker, _) => {
                ControlKind::Text(text.strip_suffix('Z').unwrap_or(&text).to_string())
            }
            _ => ControlKind::Text(text),
        };
        Self::new(name, control)
    }
}

fn relation_id(raw: &str) -> Option<Value> {
    raw.trim().parse::<i64>().ok().map(|id| json!({ "id": id }))
}

/// Walks the controls into a JSON payload. File controls are left out; see
/// [`Form::payload_with_attachments`].
pub fn serialize(controls: &[FormControl]) -> Payload {
    let mut payload = Map::new();
    for control in controls {
        if control.name.is_empty() || META_CONTROLS.contains(&control.name.as_str()) {
            continue;
        }
        let value = match &control.kind {
            ControlKind::MultiSelect { selected } => {
                Value::Array(selected.iter().filter_map(|s| relation_id(s)).collect())
            }
            ControlKind::RelationSelect { value } => relation_id(value).unwrap_or(Value::Null),
            ControlKind::Checkbox { checked } => Value::Bool(*checked),
            ControlKind::File { .. } => continue,
            ControlKind::Text(value) | ControlKind::Hidden(value) | ControlKind::Select { value } => {
                if value.is_empty() {
                    Value::Null
                } else {
                    Value::String(value.clone())
                }
            }
        };
        payload.insert(control.name.clone(), value);
    }
    payload
}

fn parse_checked(raw: &str) -> Result<bool, CrudError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" | "y" => Ok(true),
        "false" | "0" | "off" | "no" | "n" | "" => Ok(false),
        other => Err(CrudError::InvalidPayload {
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

/// Editable state of the create/edit form for one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Form {
    pub table: String,
    pub id: Option<i64>,
    pub controls: Vec<FormControl>,
}

impl Form {
    /// Controls the rendered form would contain, pre-filled from `row`.
    pub fn for_table(schema: &TableSchema, row: Option<&Row>, fields: &[String]) -> Self {
        let mut controls = vec![
            FormControl::new("crudTable", ControlKind::Hidden(schema.table.clone())),
            FormControl::new(
                "crudId",
                ControlKind::Hidden(
                    row.and_then(|r| r.id())
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                ),
            ),
        ];
        for field in fields.iter().filter(|f| f.as_str() != "id") {
            let kind = schema.form_kind(field);
            controls.push(FormControl::from_field(
                field,
                &kind,
                row.and_then(|r| r.get(field)),
            ));
        }
        Self {
            table: schema.table.clone(),
            id: row.and_then(|r| r.id()),
            controls,
        }
    }

    pub fn control_mut(&mut self, name: &str) -> Option<&mut FormControl> {
        self.controls.iter_mut().find(|c| c.name == name)
    }

    /// Sets a control from text, interpreting it by the control's kind.
    /// Unknown names become plain text controls.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<(), CrudError> {
        let Some(control) = self.control_mut(name) else {
            self.controls
                .push(FormControl::new(name, ControlKind::Text(raw.to_string())));
            return Ok(());
        };
        match &mut control.kind {
            ControlKind::Text(v) | ControlKind::Hidden(v) => *v = raw.to_string(),
            ControlKind::Select { value } | ControlKind::RelationSelect { value } => {
                *value = raw.trim().to_string()
            }
            ControlKind::MultiSelect { selected } => {
                *selected = raw
                    .split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect();
            }
            ControlKind::Checkbox { checked } => *checked = parse_checked(raw)?,
            ControlKind::File { files } => *files = vec![SelectedFile::new(raw.trim())],
        }
        Ok(())
    }

    /// Selects `path` in the file control `name`, creating the control if needed.
    pub fn attach(&mut self, name: &str, path: impl Into<PathBuf>) {
        let file = SelectedFile::new(path);
        match self.control_mut(name) {
            Some(FormControl {
                kind: ControlKind::File { files },
                ..
            }) => *files = vec![file],
            Some(other) => other.kind = ControlKind::File { files: vec![file] },
            None => self.controls.push(FormControl::new(
                name,
                ControlKind::File { files: vec![file] },
            )),
        }
    }

    /// First selected file of every file control.
    pub fn selected_files(&self) -> Vec<(String, SelectedFile)> {
        self.controls
            .iter()
            .filter_map(|c| match &c.kind {
                ControlKind::File { files } => files.first().map(|f| (c.name.clone(), f.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn has_files(&self) -> bool {
        !self.selected_files().is_empty()
    }

    /// Serialized controls plus the row id when editing.
    pub fn payload(&self) -> Payload {
        let mut payload = serialize(&self.controls);
        if let Some(id) = self.id {
            payload.insert("id".to_string(), Value::from(id));
        }
        payload
    }

    /// [`Form::payload`] with every selected file merged in as `{name, content}`.
    /// Any unreadable file fails the whole call.
    pub async fn payload_with_attachments(&self) -> Result<Payload, CrudError> {
        let mut payload = self.payload();
        let files = self.selected_files();
        if files.is_empty() {
            return Ok(payload);
        }
        for (field, attachment) in attachment::encode_all(&files).await? {
            let value = serde_json::to_value(attachment).map_err(|e| CrudError::InvalidPayload {
                message: e.to_string(),
            })?;
            payload.insert(field, value);
        }
        Ok(payload)
    }

    /// Creates or updates the row, encoding attachments first when any are selected.
    pub async fn submit(&self, client: &CrudClient) -> Result<Row, CrudError> {
        let payload = if self.has_files() {
            self.payload_with_attachments().await?
        } else {
            self.payload()
        };
        debug!(table = %self.table, id = ?self.id, fields = payload.len(), "submitting form");
        match self.id {
            Some(id) => client.update(&self.table, id, payload).await,
            None => client.create(&self.table, payload).await,
        }
    }
}
