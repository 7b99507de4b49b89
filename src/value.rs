// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::ResolveError;

use core::fmt;

use anyhow::{anyhow, bail, Result};
use serde_json::{Map, Value as Json};

/// The JSON object shape carried by resolved objects.
pub type JsonMap = Map<String, Json>;

// We cannot use a bare serde_json::Value here because resolution works over
// a fixed set of shapes and every consumer must match them exhaustively.
// Absent stands in for path keys that were walked but never bound.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Absent,
    Scalar(String),
    ScalarList(Vec<String>),
    Object(ResolvedObject),
    ObjectList(Vec<ResolvedObject>),
}

impl ResolvedValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, ResolvedValue::Absent)
    }

    /// The shape of this value, as used in type-mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResolvedValue::Absent => "absent",
            ResolvedValue::Scalar(_) => "a scalar",
            ResolvedValue::ScalarList(_) => "a scalar list",
            ResolvedValue::Object(_) => "an object",
            ResolvedValue::ObjectList(_) => "an object list",
        }
    }

    pub fn as_scalar(&self) -> Result<&String> {
        match self {
            ResolvedValue::Scalar(s) => Ok(s),
            _ => Err(anyhow!("not a scalar")),
        }
    }

    pub fn as_list(&self) -> Result<&Vec<String>> {
        match self {
            ResolvedValue::ScalarList(l) => Ok(l),
            _ => Err(anyhow!("not a scalar list")),
        }
    }

    pub fn as_object(&self) -> Result<&ResolvedObject> {
        match self {
            ResolvedValue::Object(o) => Ok(o),
            _ => Err(anyhow!("not an object")),
        }
    }

    pub fn as_object_list(&self) -> Result<&Vec<ResolvedObject>> {
        match self {
            ResolvedValue::ObjectList(l) => Ok(l),
            _ => Err(anyhow!("not an object list")),
        }
    }
}

impl From<String> for ResolvedValue {
    fn from(s: String) -> Self {
        ResolvedValue::Scalar(s)
    }
}

impl From<&str> for ResolvedValue {
    fn from(s: &str) -> Self {
        ResolvedValue::Scalar(s.to_string())
    }
}

impl From<Vec<String>> for ResolvedValue {
    fn from(l: Vec<String>) -> Self {
        ResolvedValue::ScalarList(l)
    }
}

impl From<ResolvedObject> for ResolvedValue {
    fn from(o: ResolvedObject) -> Self {
        ResolvedValue::Object(o)
    }
}

impl From<Vec<ResolvedObject>> for ResolvedValue {
    fn from(l: Vec<ResolvedObject>) -> Self {
        ResolvedValue::ObjectList(l)
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Absent => write!(f, "<absent>"),
            ResolvedValue::Scalar(s) => write!(f, "{s}"),
            ResolvedValue::ScalarList(l) => write!(f, "{l:?}"),
            ResolvedValue::Object(o) => write!(f, "{o}"),
            ResolvedValue::ObjectList(l) => {
                write!(f, "[")?;
                for (i, o) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{o}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A dereferenced remote entity or parsed JSON literal, remembering the
/// source string that produced it.
///
/// Equality is structural over both the source and the fields; serde_json
/// maps compare canonically, so two objects fetched from the same source
/// with the same content always collapse during deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObject {
    source: String,
    fields: JsonMap,
}

impl ResolvedObject {
    pub fn new(source: impl Into<String>, fields: JsonMap) -> Self {
        Self {
            source: source.into(),
            fields,
        }
    }

    /// Parse a raw JSON object literal, keeping the literal as the source.
    pub fn from_json_str(source: &str) -> Result<Self> {
        match serde_json::from_str::<Json>(source) {
            Ok(Json::Object(fields)) => Ok(Self::new(source, fields)),
            Ok(_) => bail!(ResolveError::ParseError(
                source.to_string(),
                "not a JSON object".to_string()
            )),
            Err(e) => bail!(ResolveError::ParseError(source.to_string(), e.to_string())),
        }
    }

    /// Wrap an entity fetched from a store under the URI it came from.
    pub fn from_entity(source: impl Into<String>, entity: Json) -> Result<Self> {
        let source = source.into();
        match entity {
            Json::Object(fields) => Ok(Self::new(source, fields)),
            other => bail!(ResolveError::ParseError(
                source,
                format!("entity is not a JSON object: {other}")
            )),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fields(&self) -> &JsonMap {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Json> {
        self.fields.get(name)
    }
}

impl fmt::Display for ResolvedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Json::Object(self.fields.clone()))
    }
}
