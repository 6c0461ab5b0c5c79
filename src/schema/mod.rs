//! Per-table field schemas.
//!
//! Rows carry no type information, so every field is interpreted through a
//! [`FieldKind`] looked up by table and field name. The kind decides how a
//! cell is formatted, which form widget edits it, and how the widget's state
//! is serialized back into a write payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The related table a relation field points at.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelationTarget {
    /// Display name used in cells and option labels, e.g. `Table2`.
    pub label: String,
    /// Attribute of the related row shown next to its id.
    pub display: String,
    /// Key of the option list in the list response, e.g. `table2_options`.
    pub options: String,
}

impl RelationTarget {
    pub fn new(label: &str, display: &str, options: &str) -> Self {
        Self {
            label: label.to_string(),
            display: display.to_string(),
            options: options.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Choice {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Image,
    File,
    Boolean,
    Date,
    Time,
    DateTime,
    Duration,
    Email,
    Relation(RelationTarget),
    ManyRelation(RelationTarget),
    Choice(Vec<Choice>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Widget {
    Select,
    MultiSelect,
    FilePicker,
    Checkbox,
    DatePicker,
    TimePicker,
    DateTimePicker,
    DurationText,
    Email,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellFormat {
    Image,
    Download,
    Boolean,
    Date,
    Time,
    DateTime,
    Duration,
    Relation,
    ManyRelation,
    Plain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueEncoding {
    /// `{id}` or null.
    RelationOne,
    /// `[{id}, ...]`.
    RelationMany,
    Checkbox,
    /// Skipped by the direct pass, merged later as `{name, content}`.
    Attachment,
    /// String value, or null when empty.
    Text,
}

impl FieldKind {
    /// Kind implied by the backend's field naming conventions.
    pub fn from_convention(field: &str) -> Self {
        match field {
            "image_field" => FieldKind::Image,
            "file_field" => FieldKind::File,
            "boolean_field" => FieldKind::Boolean,
            "date_field" => FieldKind::Date,
            "time_field" => FieldKind::Time,
            "datetime_field" => FieldKind::DateTime,
            "duration_field" => FieldKind::Duration,
            "foreign_key" | "one_to_one" => FieldKind::Relation(RelationTarget::new(
                "Table2",
                "positive_small_int",
                "table2_options",
            )),
            "many_to_many" => FieldKind::ManyRelation(RelationTarget::new(
                "Table3",
                "email_field",
                "table3_options",
            )),
            _ => FieldKind::Text,
        }
    }

    pub fn widget(&self) -> Widget {
        match self {
            FieldKind::Relation(_) | FieldKind::Choice(_) => Widget::Select,
            FieldKind::ManyRelation(_) => Widget::MultiSelect,
            FieldKind::Image | FieldKind::File => Widget::FilePicker,
            FieldKind::Boolean => Widget::Checkbox,
            FieldKind::Date => Widget::DatePicker,
            FieldKind::Time => Widget::TimePicker,
            FieldKind::DateTime => Widget::DateTimePicker,
            FieldKind::Duration => Widget::DurationText,
            FieldKind::Email => Widget::Email,
            FieldKind::Text => Widget::Text,
        }
    }

    pub fn cell_format(&self) -> CellFormat {
        match self {
            FieldKind::Image => CellFormat::Image,
            FieldKind::File => CellFormat::Download,
            FieldKind::Boolean => CellFormat::Boolean,
            FieldKind::Date => CellFormat::Date,
            FieldKind::Time => CellFormat::Time,
            FieldKind::DateTime => CellFormat::DateTime,
            FieldKind::Duration => CellFormat::Duration,
            FieldKind::Relation(_) => CellFormat::Relation,
            FieldKind::ManyRelation(_) => CellFormat::ManyRelation,
            FieldKind::Email | FieldKind::Choice(_) | FieldKind::Text => CellFormat::Plain,
        }
    }

    pub fn encoding(&self) -> ValueEncoding {
        match self {
            FieldKind::Relation(_) => ValueEncoding::RelationOne,
            FieldKind::ManyRelation(_) => ValueEncoding::RelationMany,
            FieldKind::Boolean => ValueEncoding::Checkbox,
            FieldKind::Image | FieldKind::File => ValueEncoding::Attachment,
            _ => ValueEncoding::Text,
        }
    }

    pub fn relation_target(&self) -> Option<&RelationTarget> {
        match self {
            FieldKind::Relation(t) | FieldKind::ManyRelation(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub fields: Vec<FieldSpec>,
    /// Tables without a registered schema edit every field as plain text,
    /// while their cells still follow the naming conventions.
    pub plain_forms: bool,
}

impl TableSchema {
    pub fn new(table: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            table: table.to_string(),
            fields,
            plain_forms: false,
        }
    }

    pub fn unregistered(table: &str) -> Self {
        Self {
            table: table.to_string(),
            fields: Vec::new(),
            plain_forms: true,
        }
    }

    /// Kind used for formatting cells of `field`.
    pub fn cell_kind(&self, field: &str) -> FieldKind {
        self.declared(field)
            .cloned()
            .unwrap_or_else(|| FieldKind::from_convention(field))
    }

    /// Kind used for the form widget and payload encoding of `field`.
    pub fn form_kind(&self, field: &str) -> FieldKind {
        if self.plain_forms {
            return FieldKind::Text;
        }
        self.declared(field).cloned().unwrap_or(FieldKind::Text)
    }

    fn declared(&self, field: &str) -> Option<&FieldKind> {
        self.fields.iter().find(|f| f.name == field).map(|f| &f.kind)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: TableSchema) {
        self.tables.insert(schema.table.clone(), schema);
    }

    pub fn schema_for(&self, table: &str) -> TableSchema {
        self.tables
            .get(table)
            .cloned()
            .unwrap_or_else(|| TableSchema::unregistered(table))
    }

    pub fn is_registered(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Adds (or replaces) schemas described in the config file.
    pub fn extend_from_config(&mut self, schemas: &HashMap<String, Vec<FieldSpec>>) {
        for (table, fields) in schemas {
            self.register(TableSchema::new(table, fields.clone()));
        }
    }
}

/// Schemas for the backend's three demo tables.
pub fn default_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::empty();

    let table1 = [
        "foreign_key",
        "one_to_one",
        "many_to_many",
        "boolean_field",
        "date_field",
        "time_field",
        "datetime_field",
        "image_field",
        "file_field",
    ]
    .iter()
    .map(|name| FieldSpec::new(name, FieldKind::from_convention(name)))
    .collect();
    registry.register(TableSchema::new("table1", table1));

    registry.register(TableSchema::new(
        "table2",
        vec![FieldSpec::new(
            "positive_small_int",
            FieldKind::Choice(vec![
                Choice {
                    id: 1,
                    name: "Option 1".to_string(),
                },
                Choice {
                    id: 2,
                    name: "Option 2".to_string(),
                },
            ]),
        )],
    ));

    registry.register(TableSchema::new(
        "table3",
        vec![
            FieldSpec::new("duration_field", FieldKind::Duration),
            FieldSpec::new("email_field", FieldKind::Email),
        ],
    ));

    registry
}
