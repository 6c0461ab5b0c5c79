use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One record of a table resource. Field order follows the server response.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Row(pub Map<String, Value>);

impl Row {
    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(value_as_id)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Row(map)
    }
}

/// Write-side reference to a related row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelationRef {
    pub id: i64,
}

/// A row offered as a choice for a relation field, e.g. `{id, positive_small_int}`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RelatedOption {
    pub id: i64,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl RelatedOption {
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }
}

/// Base64 file upload embedded in a write payload.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Attachment {
    pub name: String,
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WirePagination {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_previous: bool,
}

/// Body of `GET <base>/<table>/`.
///
/// Besides `data` and `pagination` the server may attach option lists for
/// relation dropdowns under `<table>_options` keys (`table2_options`, ...).
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ListResponse {
    #[serde(default)]
    pub data: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<WirePagination>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListResponse {
    pub fn related_options(&self) -> RelatedOptionSets {
        let mut sets = RelatedOptionSets::default();
        for (key, value) in self.extra.iter() {
            if !key.ends_with("_options") {
                continue;
            }
            match serde_json::from_value::<Vec<RelatedOption>>(value.clone()) {
                Ok(opts) => sets.insert(key, opts),
                Err(err) => warn!(key = %key, error = %err, "ignoring malformed option list"),
            }
        }
        sets
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelatedOptionSets {
    sets: Vec<(String, Vec<RelatedOption>)>,
}

impl RelatedOptionSets {
    pub fn insert(&mut self, key: &str, options: Vec<RelatedOption>) {
        if let Some(slot) = self.sets.iter_mut().find(|(k, _)| k == key) {
            slot.1 = options;
        } else {
            self.sets.push((key.to_string(), options));
        }
    }

    pub fn get(&self, key: &str) -> &[RelatedOption] {
        self.sets
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Create/update responses arrive either wrapped as `{data: Row}` or bare.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum WriteResponse {
    Wrapped { data: Row },
    Bare(Row),
}

impl WriteResponse {
    pub fn into_row(self) -> Row {
        match self {
            WriteResponse::Wrapped { data } => data,
            WriteResponse::Bare(row) => row,
        }
    }
}

/// Accepts both JSON integers and numeric strings, as ids travel as either.
pub fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
