// Resource State
//
// Local state of one resource instance: an optional remote identity plus
// the attribute values described by the resource schema. Mappers read and
// write it; it never talks to the remote service itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute values held for a single resource instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default)]
    attributes: Map<String, Value>,
}

impl ResourceData {
    /// Create empty state with no identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap already-validated attributes (see `schema::Block::validate`).
    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self {
            id: None,
            attributes,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Forget the remote identity, e.g. after the remote object is deleted.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// First element of a list-of-blocks attribute.
    ///
    /// Single-block attributes are stored as one-element lists.
    pub fn first_block(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key)?.as_array()?.first()?.as_object()
    }

    pub fn first_block_mut(&mut self, key: &str) -> Option<&mut Map<String, Value>> {
        self.attributes
            .get_mut(key)?
            .as_array_mut()?
            .first_mut()?
            .as_object_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_block_reads_single_element_list() {
        let mut data = ResourceData::new();
        data.set("settings", json!([{ "name": "a" }]));

        assert_eq!(data.first_block("settings").unwrap()["name"], "a");

        data.first_block_mut("settings")
            .unwrap()
            .insert("name".into(), json!("b"));
        assert_eq!(data.get("settings").unwrap(), &json!([{ "name": "b" }]));
    }

    #[test]
    fn first_block_of_wrong_shape_is_none() {
        let mut data = ResourceData::new();
        data.set("empty", json!([]));
        data.set("scalar", json!("x"));
        data.set("scalars", json!([1]));

        assert!(data.first_block("empty").is_none());
        assert!(data.first_block("scalar").is_none());
        assert!(data.first_block("scalars").is_none());
        assert!(data.first_block("missing").is_none());
    }

    #[test]
    fn identity_lifecycle() {
        let mut data = ResourceData::new();
        assert!(data.id().is_none());

        data.set_id("42");
        assert_eq!(data.id(), Some("42"));

        data.clear_id();
        assert!(data.id().is_none());
    }
}
