//! Question and query model.
//!
//! A [`Question`] pairs a saved or ad-hoc [`Card`] with the field
//! [`Metadata`] needed to interpret its query. Only the parts of the query
//! language the console reasons about are typed; unknown keys of cards,
//! structured queries and field options are kept as raw JSON so they
//! serialize back unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub type CardId = u64;
pub type FieldId = u64;

const DATE_TYPES: &[&str] = &[
    "type/Date",
    "type/DateTime",
    "type/DateTimeWithTZ",
    "type/DateTimeWithLocalTZ",
    "type/DateTimeWithZoneID",
    "type/DateTimeWithZoneOffset",
    "type/Instant",
    "type/Temporal",
];

const TIME_TYPES: &[&str] = &[
    "type/Time",
    "type/TimeWithTZ",
    "type/TimeWithLocalTZ",
    "type/TimeWithZoneOffset",
];

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Field {
    #[serde(default)]
    pub id: Option<FieldId>,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub effective_type: Option<String>,
}

impl Field {
    /// The type used for classification: the effective type wins over the
    /// storage type when both are known.
    pub fn semantic_type(&self) -> Option<&str> {
        self.effective_type
            .as_deref()
            .or(self.base_type.as_deref())
    }

    pub fn is_date(&self) -> bool {
        self.semantic_type()
            .map(|ty| DATE_TYPES.contains(&ty))
            .unwrap_or(false)
    }

    pub fn is_time(&self) -> bool {
        self.semantic_type()
            .map(|ty| TIME_TYPES.contains(&ty))
            .unwrap_or(false)
    }

    fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Metadata {
    fields: HashMap<FieldId, Field>,
}

impl Metadata {
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        let fields = fields
            .into_iter()
            .filter_map(|field| field.id.map(|id| (id, field)))
            .collect();
        Self { fields }
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(&id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub temporal_unit: Option<String>,
    pub base_type: Option<String>,
    /// Options the console does not interpret, e.g. `join-alias` or `binning`.
    pub extra: Map<String, Value>,
}

impl FieldOptions {
    fn from_value(value: Option<&Value>) -> Self {
        let mut extra = value
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut take = |key: &str| match extra.remove(key) {
            Some(Value::String(text)) => Some(text),
            Some(other) => {
                extra.insert(key.to_string(), other);
                None
            }
            None => None,
        };
        Self {
            temporal_unit: take("temporal-unit"),
            base_type: take("base-type"),
            extra,
        }
    }

    fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(unit) = &self.temporal_unit {
            map.insert("temporal-unit".into(), Value::String(unit.clone()));
        }
        if let Some(base_type) = &self.base_type {
            map.insert("base-type".into(), Value::String(base_type.clone()));
        }
        if map.is_empty() {
            Value::Null
        } else {
            Value::Object(map)
        }
    }
}

/// A field reference clause, e.g. `["field", 12, {"temporal-unit": "month"}]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldRef {
    Field { id: FieldId, options: FieldOptions },
    Named { name: String, options: FieldOptions },
    Expression { name: String },
    Unknown(Value),
}

impl FieldRef {
    pub fn temporal_unit(&self) -> Option<&str> {
        match self {
            Self::Field { options, .. } | Self::Named { options, .. } => {
                options.temporal_unit.as_deref()
            }
            _ => None,
        }
    }
}

impl From<Value> for FieldRef {
    fn from(value: Value) -> Self {
        let parsed = match value.as_array().map(Vec::as_slice) {
            Some([Value::String(tag), Value::Number(id), rest @ ..]) if tag == "field" => {
                id.as_u64().map(|id| Self::Field {
                    id,
                    options: FieldOptions::from_value(rest.first()),
                })
            }
            Some([Value::String(tag), Value::String(name), rest @ ..]) if tag == "field" => {
                Some(Self::Named {
                    name: name.clone(),
                    options: FieldOptions::from_value(rest.first()),
                })
            }
            Some([Value::String(tag), Value::String(name), ..]) if tag == "expression" => {
                Some(Self::Expression { name: name.clone() })
            }
            _ => None,
        };
        parsed.unwrap_or_else(|| Self::Unknown(value))
    }
}

impl From<FieldRef> for Value {
    fn from(clause: FieldRef) -> Self {
        match clause {
            FieldRef::Field { id, options } => json!(["field", id, options.to_value()]),
            FieldRef::Named { name, options } => json!(["field", name, options.to_value()]),
            FieldRef::Expression { name } => json!(["expression", name]),
            FieldRef::Unknown(value) => value,
        }
    }
}

/// A grouping dimension of a structured query, bound to the metadata that
/// resolves its field.
#[derive(Clone, Copy, Debug)]
pub struct Breakout<'a> {
    clause: &'a FieldRef,
    metadata: &'a Metadata,
}

impl<'a> Breakout<'a> {
    pub fn clause(&self) -> &'a FieldRef {
        self.clause
    }

    pub fn field(&self) -> Field {
        match self.clause {
            FieldRef::Field { id, options } => match self.metadata.field(*id) {
                Some(field) => field.clone(),
                None => Field {
                    id: Some(*id),
                    name: format!("field_{id}"),
                    base_type: options.base_type.clone(),
                    ..Field::default()
                },
            },
            FieldRef::Named { name, options } => Field {
                name: name.clone(),
                base_type: options.base_type.clone(),
                ..Field::default()
            },
            FieldRef::Expression { name } => Field::unresolved(name.clone()),
            FieldRef::Unknown(_) => Field::unresolved("unknown"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StructuredQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregation: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakout: Vec<FieldRef>,
    /// Filters, joins, limits and other clauses carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeQuery {
    pub query: String,
    #[serde(default, rename = "template-tags")]
    pub template_tags: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetQuery {
    Query {
        database: u64,
        query: StructuredQuery,
    },
    Native {
        database: u64,
        native: NativeQuery,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub display: String,
    pub dataset_query: DatasetQuery,
    #[serde(default)]
    pub visualization_settings: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A card plus the metadata needed to interpret it.
#[derive(Clone, Debug)]
pub struct Question {
    card: Card,
    metadata: Arc<Metadata>,
}

impl Question {
    pub fn new(card: Card, metadata: Arc<Metadata>) -> Self {
        Self { card, metadata }
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    pub fn id(&self) -> Option<CardId> {
        self.card.id
    }

    /// Ad-hoc questions have no id until they are persisted.
    pub fn is_saved(&self) -> bool {
        self.card.id.is_some()
    }

    pub fn is_structured(&self) -> bool {
        matches!(self.card.dataset_query, DatasetQuery::Query { .. })
    }

    pub fn query(&self) -> Option<&StructuredQuery> {
        match &self.card.dataset_query {
            DatasetQuery::Query { query, .. } => Some(query),
            DatasetQuery::Native { .. } => None,
        }
    }

    pub fn breakouts(&self) -> Vec<Breakout<'_>> {
        self.query()
            .map(|query| {
                query
                    .breakout
                    .iter()
                    .map(|clause| Breakout {
                        clause,
                        metadata: &self.metadata,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> String {
        self.card
            .name
            .clone()
            .unwrap_or_else(|| "New question".to_string())
    }
}
