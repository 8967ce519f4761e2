// Attribute Schema
//
// Declarative table describing the shape of a resource's local
// configuration: which attributes exist, their kinds, whether they are
// required, their defaults and their validation rules.
//
// Validation is pure: raw user JSON in, normalized JSON (defaults applied)
// out.

use serde::Serialize;
use serde_json::{Map, Value};

/// Kind of value an attribute holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kind {
    Text,
    Bool,

    /// Ordered list of nested blocks.
    List {
        min_items: usize,
        max_items: Option<usize>,
        block: Block,
    },
}

/// Whether an attribute must be set by the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,

    /// Absent values take `default`, or stay absent when there is none.
    Optional { default: Option<Value> },
}

/// Value-level rule checked after the kind matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "values", rename_all = "snake_case")]
pub enum Validation {
    None,
    NotEmpty,
    OneOfIgnoreCase(&'static [&'static str]),
}

/// A single named entry of a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: Kind,
    pub presence: Presence,
    pub validation: Validation,
}

impl Attribute {
    fn new(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional { default: None },
            validation: Validation::None,
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, Kind::Text)
    }

    pub fn bool(name: &'static str) -> Self {
        Self::new(name, Kind::Bool)
    }

    pub fn list(name: &'static str, block: Block) -> Self {
        Self::new(
            name,
            Kind::List {
                min_items: 0,
                max_items: None,
                block,
            },
        )
    }

    pub fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    /// Optional with a default applied when the user leaves it unset.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.presence = Presence::Optional {
            default: Some(value.into()),
        };
        self
    }

    pub fn not_empty(mut self) -> Self {
        self.validation = Validation::NotEmpty;
        self
    }

    pub fn one_of_ignore_case(mut self, values: &'static [&'static str]) -> Self {
        self.validation = Validation::OneOfIgnoreCase(values);
        self
    }

    /// Bounds the number of items. Only meaningful for list attributes.
    pub fn items(mut self, min: usize, max: Option<usize>) -> Self {
        if let Kind::List {
            min_items,
            max_items,
            ..
        } = &mut self.kind
        {
            *min_items = min;
            *max_items = max;
        }
        self
    }

    fn check(&self, path: &str, value: &Value) -> Result<Value, SchemaError> {
        match &self.kind {
            Kind::Text => {
                let text = value
                    .as_str()
                    .ok_or_else(|| SchemaError::new(path, SchemaErrorKind::WrongType("text")))?;
                self.check_text(path, text)?;
                Ok(value.clone())
            }
            Kind::Bool => {
                if value.is_boolean() {
                    Ok(value.clone())
                } else {
                    Err(SchemaError::new(path, SchemaErrorKind::WrongType("bool")))
                }
            }
            Kind::List {
                min_items,
                max_items,
                block,
            } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| SchemaError::new(path, SchemaErrorKind::WrongType("list")))?;

                if items.len() < *min_items {
                    return Err(SchemaError::new(
                        path,
                        SchemaErrorKind::TooFewItems {
                            min: *min_items,
                            actual: items.len(),
                        },
                    ));
                }
                if let Some(max) = max_items {
                    if items.len() > *max {
                        return Err(SchemaError::new(
                            path,
                            SchemaErrorKind::TooManyItems {
                                max: *max,
                                actual: items.len(),
                            },
                        ));
                    }
                }

                let mut normalized = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{path}.{index}");
                    let fields = item.as_object().ok_or_else(|| {
                        SchemaError::new(&item_path, SchemaErrorKind::WrongType("block"))
                    })?;
                    normalized.push(Value::Object(block.validate_at(&item_path, fields)?));
                }
                Ok(Value::Array(normalized))
            }
        }
    }

    fn check_text(&self, path: &str, text: &str) -> Result<(), SchemaError> {
        match self.validation {
            Validation::None => Ok(()),
            Validation::NotEmpty if text.is_empty() => {
                Err(SchemaError::new(path, SchemaErrorKind::Empty))
            }
            Validation::NotEmpty => Ok(()),
            Validation::OneOfIgnoreCase(allowed) => {
                if allowed.iter().any(|a| a.eq_ignore_ascii_case(text)) {
                    Ok(())
                } else {
                    Err(SchemaError::new(
                        path,
                        SchemaErrorKind::NotOneOf {
                            value: text.to_string(),
                            allowed: allowed.join(", "),
                        },
                    ))
                }
            }
        }
    }
}

/// Ordered set of attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Block {
    attributes: Vec<Attribute>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, replacing any existing one with the same name.
    pub fn with(mut self, attribute: Attribute) -> Self {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Validate raw user configuration against this block.
    ///
    /// Returns the configuration with defaults filled in. Stops at the
    /// first violation.
    pub fn validate(&self, raw: &Value) -> Result<Map<String, Value>, SchemaError> {
        let fields = raw
            .as_object()
            .ok_or_else(|| SchemaError::new("", SchemaErrorKind::WrongType("block")))?;
        self.validate_at("", fields)
    }

    fn validate_at(
        &self,
        prefix: &str,
        fields: &Map<String, Value>,
    ) -> Result<Map<String, Value>, SchemaError> {
        if let Some(unknown) = fields.keys().find(|k| self.attribute(k).is_none()) {
            return Err(SchemaError::new(
                &join(prefix, unknown),
                SchemaErrorKind::Unknown,
            ));
        }

        let mut normalized = Map::new();
        for attribute in &self.attributes {
            let path = join(prefix, attribute.name);
            match fields.get(attribute.name) {
                None | Some(Value::Null) => match &attribute.presence {
                    Presence::Required => {
                        return Err(SchemaError::new(&path, SchemaErrorKind::Missing))
                    }
                    Presence::Optional { default: Some(value) } => {
                        normalized.insert(attribute.name.to_string(), value.clone());
                    }
                    Presence::Optional { default: None } => {}
                },
                Some(value) => {
                    normalized.insert(attribute.name.to_string(), attribute.check(&path, value)?);
                }
            }
        }
        Ok(normalized)
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Reason an attribute failed validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaErrorKind {
    #[error("unsupported attribute")]
    Unknown,

    #[error("required attribute is missing")]
    Missing,

    #[error("expected {0}")]
    WrongType(&'static str),

    #[error("must not be empty")]
    Empty,

    #[error("`{value}` is not one of: {allowed}")]
    NotOneOf { value: String, allowed: String },

    #[error("expected at least {min} item(s), got {actual}")]
    TooFewItems { min: usize, actual: usize },

    #[error("expected at most {max} item(s), got {actual}")]
    TooManyItems { max: usize, actual: usize },
}

/// Validation failure at a dotted attribute path (`settings.0.status_name`).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid attribute `{path}`: {kind}")]
pub struct SchemaError {
    pub path: String,
    pub kind: SchemaErrorKind,
}

impl SchemaError {
    fn new(path: &str, kind: SchemaErrorKind) -> Self {
        Self {
            path: path.to_string(),
            kind,
        }
    }
}
