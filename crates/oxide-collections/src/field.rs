//! Schema fields.
//!
//! A [`Field`] is identified by its immutable `id`; its `name` is the only
//! attribute that may change between two versions of a collection and it is
//! also the name of the physical column. Each field kind carries its own
//! options shape, modelled as a variant of [`FieldOptions`].

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ModelError;

/// Column definition used by every single value text-like field.
const TEXT_COLUMN: &str = "TEXT DEFAULT '' NOT NULL";

/// Column definition used by every multiple value field.
const JSON_ARRAY_COLUMN: &str = "JSON DEFAULT '[]' NOT NULL";

/// Whether a field holds a single value or an ordered list of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// One scalar value per row.
    Single,
    /// A JSON array of values per row.
    Multiple,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Multiple => f.write_str("multiple"),
        }
    }
}

/// The type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Editor,
    Number,
    Bool,
    Email,
    Url,
    Date,
    Select,
    Json,
    File,
    Relation,
}

impl FieldKind {
    /// Returns the type name used in collection records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Editor => "editor",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Email => "email",
            Self::Url => "url",
            Self::Date => "date",
            Self::Select => "select",
            Self::Json => "json",
            Self::File => "file",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "text" => Self::Text,
            "editor" => Self::Editor,
            "number" => Self::Number,
            "bool" => Self::Bool,
            "email" => Self::Email,
            "url" => Self::Url,
            "date" => Self::Date,
            "select" => Self::Select,
            "json" => Self::Json,
            "file" => Self::File,
            "relation" => Self::Relation,
            other => return Err(ModelError::UnknownFieldType(other.to_string())),
        })
    }
}

/// Options of a `text` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextOptions {
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub pattern: String,
}

/// Options of a `number` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberOptions {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub no_decimal: bool,
}

/// Options of a `select` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectOptions {
    pub max_select: usize,
    pub values: Vec<String>,
}

/// Options of a `file` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileOptions {
    pub max_select: usize,
    pub max_size: u64,
    pub mime_types: Vec<String>,
    pub thumbs: Vec<String>,
    pub protected: bool,
}

/// Options of a `relation` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationOptions {
    /// Id of the referenced collection.
    pub collection_id: String,
    pub cascade_delete: bool,
    pub min_select: Option<usize>,
    /// `None` means unlimited.
    pub max_select: Option<usize>,
    /// Names of the referenced collection's fields shown as the record summary.
    pub display_fields: Vec<String>,
}

/// Kind specific options of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOptions {
    Text(TextOptions),
    Editor,
    Number(NumberOptions),
    Bool,
    Email,
    Url,
    Date,
    Select(SelectOptions),
    Json,
    File(FileOptions),
    Relation(RelationOptions),
}

impl FieldOptions {
    /// Returns the field kind these options belong to.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Editor => FieldKind::Editor,
            Self::Number(_) => FieldKind::Number,
            Self::Bool => FieldKind::Bool,
            Self::Email => FieldKind::Email,
            Self::Url => FieldKind::Url,
            Self::Date => FieldKind::Date,
            Self::Select(_) => FieldKind::Select,
            Self::Json => FieldKind::Json,
            Self::File(_) => FieldKind::File,
            Self::Relation(_) => FieldKind::Relation,
        }
    }

    /// Returns whether the options describe a multiple value field.
    ///
    /// Kinds without a multiplicity setting are always single.
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        match self {
            Self::Select(opts) => opts.max_select > 1,
            Self::File(opts) => opts.max_select > 1,
            Self::Relation(opts) => opts.max_select.is_none_or(|max| max > 1),
            _ => false,
        }
    }

    fn decode(kind: FieldKind, field: &str, raw: serde_json::Value) -> Result<Self, ModelError> {
        let raw = if raw.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            raw
        };
        let invalid = |source| ModelError::InvalidOptions {
            kind: kind.to_string(),
            field: field.to_string(),
            source,
        };

        Ok(match kind {
            FieldKind::Text => Self::Text(serde_json::from_value(raw).map_err(invalid)?),
            FieldKind::Number => Self::Number(serde_json::from_value(raw).map_err(invalid)?),
            FieldKind::Select => Self::Select(serde_json::from_value(raw).map_err(invalid)?),
            FieldKind::File => Self::File(serde_json::from_value(raw).map_err(invalid)?),
            FieldKind::Relation => Self::Relation(serde_json::from_value(raw).map_err(invalid)?),
            FieldKind::Editor => Self::Editor,
            FieldKind::Bool => Self::Bool,
            FieldKind::Email => Self::Email,
            FieldKind::Url => Self::Url,
            FieldKind::Date => Self::Date,
            FieldKind::Json => Self::Json,
        })
    }
}

/// A single schema field of a collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawField")]
pub struct Field {
    /// Stable identity, never changes once assigned.
    pub id: String,
    /// Display and column name.
    pub name: String,
    pub system: bool,
    pub required: bool,
    pub options: FieldOptions,
}

impl Field {
    /// Creates a new field.
    pub fn new(id: impl Into<String>, name: impl Into<String>, options: FieldOptions) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system: false,
            required: false,
            options,
        }
    }

    /// Creates a plain `text` field.
    pub fn text(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, FieldOptions::Text(TextOptions::default()))
    }

    /// Creates a `select` field allowing up to `max_select` of `values`.
    pub fn select(
        id: impl Into<String>,
        name: impl Into<String>,
        max_select: usize,
        values: &[&str],
    ) -> Self {
        Self::new(
            id,
            name,
            FieldOptions::Select(SelectOptions {
                max_select,
                values: values.iter().map(ToString::to_string).collect(),
            }),
        )
    }

    /// Creates a `relation` field pointing at the collection with `collection_id`.
    pub fn relation(
        id: impl Into<String>,
        name: impl Into<String>,
        collection_id: impl Into<String>,
        max_select: Option<usize>,
        display_fields: &[&str],
    ) -> Self {
        Self::new(
            id,
            name,
            FieldOptions::Relation(RelationOptions {
                collection_id: collection_id.into(),
                max_select,
                display_fields: display_fields.iter().map(ToString::to_string).collect(),
                ..RelationOptions::default()
            }),
        )
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns the field kind.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.options.kind()
    }

    /// Returns the SQL column definition fragment for this field.
    #[must_use]
    pub fn column_definition(&self) -> &'static str {
        match &self.options {
            FieldOptions::Number(_) => "NUMERIC DEFAULT 0 NOT NULL",
            FieldOptions::Bool => "BOOLEAN DEFAULT FALSE NOT NULL",
            FieldOptions::Json => "JSON DEFAULT NULL",
            FieldOptions::Select(_) | FieldOptions::File(_) | FieldOptions::Relation(_) => {
                if self.is_multiple() {
                    JSON_ARRAY_COLUMN
                } else {
                    TEXT_COLUMN
                }
            }
            FieldOptions::Text(_)
            | FieldOptions::Editor
            | FieldOptions::Email
            | FieldOptions::Url
            | FieldOptions::Date => TEXT_COLUMN,
        }
    }

    /// Returns whether the field stores a JSON array of values.
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        self.options.is_multiple()
    }

    /// Returns the field cardinality.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        if self.is_multiple() {
            Cardinality::Multiple
        } else {
            Cardinality::Single
        }
    }

    /// Returns the relation options, if this is a relation field.
    #[must_use]
    pub fn relation_options(&self) -> Option<&RelationOptions> {
        match &self.options {
            FieldOptions::Relation(opts) => Some(opts),
            _ => None,
        }
    }

    /// Returns mutable relation options, if this is a relation field.
    pub fn relation_options_mut(&mut self) -> Option<&mut RelationOptions> {
        match &mut self.options {
            FieldOptions::Relation(opts) => Some(opts),
            _ => None,
        }
    }

    /// Returns the cached display field names of a relation field.
    #[must_use]
    pub fn display_fields(&self) -> Option<&[String]> {
        self.relation_options().map(|opts| opts.display_fields.as_slice())
    }

    /// Returns whether this is a relation field pointing at `collection_id`.
    #[must_use]
    pub fn references(&self, collection_id: &str) -> bool {
        self.relation_options()
            .is_some_and(|opts| opts.collection_id == collection_id)
    }
}

#[derive(Serialize)]
struct EmptyOptions {}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Field", 6)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("type", self.kind().as_str())?;
        state.serialize_field("system", &self.system)?;
        state.serialize_field("required", &self.required)?;
        match &self.options {
            FieldOptions::Text(opts) => state.serialize_field("options", opts)?,
            FieldOptions::Number(opts) => state.serialize_field("options", opts)?,
            FieldOptions::Select(opts) => state.serialize_field("options", opts)?,
            FieldOptions::File(opts) => state.serialize_field("options", opts)?,
            FieldOptions::Relation(opts) => state.serialize_field("options", opts)?,
            _ => state.serialize_field("options", &EmptyOptions {})?,
        }
        state.end()
    }
}

/// Wire shape of a field inside a collection record.
#[derive(Deserialize)]
struct RawField {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    system: bool,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    options: serde_json::Value,
}

impl TryFrom<RawField> for Field {
    type Error = ModelError;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let kind: FieldKind = raw.kind.parse()?;
        let options = FieldOptions::decode(kind, &raw.name, raw.options)?;
        Ok(Self {
            id: raw.id,
            name: raw.name,
            system: raw.system,
            required: raw.required,
            options,
        })
    }
}
