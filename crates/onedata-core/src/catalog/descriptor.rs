//! Declarative model descriptors.
//!
//! A managed type describes itself once with a [`ModelDescriptor`]: a list of
//! properties, each with a primitive kind and a closed set of tags.

use std::time::Duration;

use onedata_proto::Value;
use serde::{Deserialize, Serialize};

/// Underlying primitive kind of a property, nullability stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Bool,
    Guid,
    Char,
    String,
    DateTime,
    Decimal,
    Float32,
    Float64,
    UInt8,
    Int8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Bytes,
    /// Enumerations persist as their integer discriminant.
    Enum,
}

impl PrimitiveKind {
    /// Check if values of this kind are rendered as quoted text.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            PrimitiveKind::String | PrimitiveKind::Char | PrimitiveKind::Guid | PrimitiveKind::DateTime
        )
    }

    /// Integer, floating point and decimal kinds.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Bool
                | PrimitiveKind::Guid
                | PrimitiveKind::Char
                | PrimitiveKind::String
                | PrimitiveKind::DateTime
                | PrimitiveKind::Bytes
        )
    }

    /// Zero value written into existing rows when a column becomes NOT NULL.
    pub fn zero_value(self) -> Value {
        match self {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::Guid => Value::Uuid([0; 16]),
            PrimitiveKind::Char | PrimitiveKind::String => Value::String(String::new()),
            PrimitiveKind::DateTime => Value::Timestamp(0),
            PrimitiveKind::Decimal | PrimitiveKind::Float64 => Value::Float64(0.0),
            PrimitiveKind::Float32 => Value::Float32(0.0),
            PrimitiveKind::UInt32 | PrimitiveKind::Int64 | PrimitiveKind::UInt64 => Value::Int64(0),
            PrimitiveKind::Bytes => Value::Bytes(Vec::new()),
            PrimitiveKind::UInt8
            | PrimitiveKind::Int8
            | PrimitiveKind::Int16
            | PrimitiveKind::UInt16
            | PrimitiveKind::Int32
            | PrimitiveKind::Enum => Value::Int32(0),
        }
    }
}

/// How a primary key obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyGeneration {
    /// The caller supplies the key.
    #[default]
    Supplied,
    /// Identity / AUTO_INCREMENT column.
    AutoIncrement,
    /// Assigned by the insert procedure (e.g. a new GUID).
    Generated,
}

impl KeyGeneration {
    /// Check if the database assigns the key.
    pub fn is_server_generated(self) -> bool {
        !matches!(self, KeyGeneration::Supplied)
    }
}

/// Server-populated value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoKind {
    /// Current date without time.
    Date,
    /// Current date and time.
    DateTime,
}

/// Action applied to referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForeignAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignAction {
    /// SQL text of the action, as it appears in `ON DELETE ...`.
    pub fn sql(self) -> &'static str {
        match self {
            ForeignAction::NoAction => "NO ACTION",
            ForeignAction::Cascade => "CASCADE",
            ForeignAction::SetNull => "SET NULL",
            ForeignAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse the `DELETE_RULE` reported by the information schema.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "NO ACTION" | "RESTRICT" => Some(ForeignAction::NoAction),
            "CASCADE" => Some(ForeignAction::Cascade),
            "SET NULL" => Some(ForeignAction::SetNull),
            "SET DEFAULT" => Some(ForeignAction::SetDefault),
            _ => None,
        }
    }
}

/// Target of a foreign-key property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignReference {
    /// Referenced table (without prefix).
    pub table: String,
    /// Referenced column.
    #[serde(default = "default_reference_column")]
    pub column: String,
    /// Referenced schema; the owning model's schema when absent.
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub on_delete: ForeignAction,
}

fn default_reference_column() -> String {
    "Id".to_string()
}

impl ForeignReference {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: default_reference_column(),
            schema: None,
            on_delete: ForeignAction::NoAction,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn on_delete(mut self, action: ForeignAction) -> Self {
        self.on_delete = action;
        self
    }
}

/// Model-level tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTag {
    /// Backing table and optional schema.
    Table { name: String, schema: Option<String> },
    /// Keep an in-process cache that expires after `expiration_secs`.
    CacheEnabled { expiration_secs: u64 },
}

/// Property-level tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyTag {
    /// Not persisted.
    Unmanaged,
    /// Populated by the database, never supplied by callers.
    Auto(AutoKind),
    /// Primary key.
    PrimaryKey(KeyGeneration),
    /// Creation timestamp (implies `Auto(DateTime)`).
    DateCreated,
    /// Modification timestamp (implies `Auto(DateTime)`).
    DateModified,
    /// References another table.
    ForeignKey(ForeignReference),
    /// Back-reference to rows of another model; never persisted.
    ForeignCollection { model: String },
    /// Unique constraint.
    Unique,
    /// Column default.
    Default(Value),
    /// Declared maximum length for variable-length columns.
    DataLength(u32),
}

/// One declared property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PrimitiveKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub tags: Vec<PropertyTag>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            tags: Vec::new(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_tag(mut self, tag: PropertyTag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn primary_key(self, generation: KeyGeneration) -> Self {
        self.with_tag(PropertyTag::PrimaryKey(generation))
    }

    pub fn auto(self, kind: AutoKind) -> Self {
        self.with_tag(PropertyTag::Auto(kind))
    }

    pub fn date_created(self) -> Self {
        self.with_tag(PropertyTag::DateCreated)
    }

    pub fn date_modified(self) -> Self {
        self.with_tag(PropertyTag::DateModified)
    }

    pub fn unmanaged(self) -> Self {
        self.with_tag(PropertyTag::Unmanaged)
    }

    pub fn unique(self) -> Self {
        self.with_tag(PropertyTag::Unique)
    }

    pub fn foreign_key(self, reference: ForeignReference) -> Self {
        self.with_tag(PropertyTag::ForeignKey(reference))
    }

    pub fn foreign_collection(self, model: impl Into<String>) -> Self {
        self.with_tag(PropertyTag::ForeignCollection {
            model: model.into(),
        })
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.with_tag(PropertyTag::Default(value.into()))
    }

    pub fn data_length(self, length: u32) -> Self {
        self.with_tag(PropertyTag::DataLength(length))
    }

    /// Primary key tag, if any.
    pub fn key_generation(&self) -> Option<KeyGeneration> {
        self.tags.iter().find_map(|t| match t {
            PropertyTag::PrimaryKey(g) => Some(*g),
            _ => None,
        })
    }

    /// Effective auto kind, taking the timestamp tags into account.
    pub fn auto_kind(&self) -> Option<AutoKind> {
        self.tags.iter().find_map(|t| match t {
            PropertyTag::Auto(kind) => Some(*kind),
            PropertyTag::DateCreated | PropertyTag::DateModified => Some(AutoKind::DateTime),
            _ => None,
        })
    }

    pub fn has_tag(&self, predicate: impl Fn(&PropertyTag) -> bool) -> bool {
        self.tags.iter().any(predicate)
    }

    pub fn is_unique(&self) -> bool {
        self.has_tag(|t| matches!(t, PropertyTag::Unique))
    }

    pub fn foreign_reference(&self) -> Option<&ForeignReference> {
        self.tags.iter().find_map(|t| match t {
            PropertyTag::ForeignKey(r) => Some(r),
            _ => None,
        })
    }

    pub fn declared_default(&self) -> Option<&Value> {
        self.tags.iter().find_map(|t| match t {
            PropertyTag::Default(v) => Some(v),
            _ => None,
        })
    }

    pub fn declared_length(&self) -> Option<u32> {
        self.tags.iter().find_map(|t| match t {
            PropertyTag::DataLength(n) => Some(*n),
            _ => None,
        })
    }
}

/// Declarative description of a managed type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<ModelTag>,
    pub properties: Vec<PropertyDescriptor>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Back the model by `table` in the default schema.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.tags.push(ModelTag::Table {
            name: table.into(),
            schema: None,
        });
        self
    }

    /// Back the model by `table` in an explicit schema.
    pub fn with_table_in(mut self, table: impl Into<String>, schema: impl Into<String>) -> Self {
        self.tags.push(ModelTag::Table {
            name: table.into(),
            schema: Some(schema.into()),
        });
        self
    }

    pub fn with_cache(mut self, expiration: Duration) -> Self {
        self.tags.push(ModelTag::CacheEnabled {
            expiration_secs: expiration.as_secs(),
        });
        self
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }
}
