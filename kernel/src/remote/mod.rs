// Remote Policy Configuration
//
// Wire shape of a policy configuration as returned and accepted by the
// remote policy service. Shared by every policy type; each type only
// interprets its own keys inside `settings`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Reference to the kind of policy a configuration instantiates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyTypeRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

/// A policy configuration record.
///
/// `settings` is left untyped here: its layout depends on the policy type,
/// and keys a mapper does not own must survive a read/write cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_blocking: Option<bool>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<PolicyTypeRef>,

    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl PolicyConfiguration {
    /// Policy type id, if the record carries one.
    pub fn type_id(&self) -> Option<Uuid> {
        self.type_ref.as_ref().and_then(|t| t.id)
    }
}
