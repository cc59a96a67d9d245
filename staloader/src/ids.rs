use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LoaderError, Result};

/// Identifier assigned by the entity-graph service. The service hands out
/// 64-bit integers or UUID strings depending on entity kind and server
/// configuration, so both encodings must round-trip through URLs and
/// `@iot.id` references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Long(i64),
    Text(String),
}

impl EntityId {
    /// Extracts the new entity's id from the `Location` header of a creation
    /// response, e.g. `…/Things(42)` or `…/Parties('9e0a6ef2-…')`.
    pub fn from_location(location: &str) -> Result<Self> {
        let inner = location
            .rfind('(')
            .and_then(|start| location.strip_suffix(')').map(|s| &s[start + 1..]))
            .ok_or_else(|| LoaderError::MissingEntityId(location.to_string()))?;

        if let Some(quoted) = inner
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
        {
            Uuid::parse_str(quoted)
                .map_err(|_| LoaderError::MissingEntityId(location.to_string()))?;
            return Ok(EntityId::Text(quoted.to_string()));
        }

        inner
            .parse::<i64>()
            .map(EntityId::Long)
            .map_err(|_| LoaderError::MissingEntityId(location.to_string()))
    }

    /// Reads an id out of an `@iot.id` JSON value.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(EntityId::Long),
            serde_json::Value::String(s) => Some(EntityId::Text(s.clone())),
            _ => None,
        }
    }

    /// Renders the `Collection(id)` URL segment. Integer ids are bare,
    /// textual ids are single-quoted, as the service's URL grammar requires.
    pub fn path_segment(&self, collection: &str) -> String {
        match self {
            EntityId::Long(n) => format!("{collection}({n})"),
            EntityId::Text(s) => format!("{collection}('{s}')"),
        }
    }

    /// An `{"@iot.id": …}` reference object for linking payloads.
    pub fn as_ref_value(&self) -> serde_json::Value {
        serde_json::json!({ "@iot.id": self })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Long(n) => write!(f, "{n}"),
            EntityId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Long(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Text(value.to_string())
    }
}
