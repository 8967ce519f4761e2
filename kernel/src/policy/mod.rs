// Branch Policy Mapping
//
// Converts between local resource state and remote policy configurations.
// Every policy type shares the base behaviour in `base` and adds its own
// settings on top.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::remote::PolicyConfiguration;
use crate::schema::Block;
use crate::state::ResourceData;

pub mod base;
pub mod status_check;

/// Which way a conversion was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Remote → local.
    Flatten,

    /// Local → remote.
    Expand,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Flatten => f.write_str("flatten"),
            Direction::Expand => f.write_str("expand"),
        }
    }
}

/// Errors produced while mapping a policy.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("unable to {direction} branch policy settings: {source}")]
    Settings {
        direction: Direction,
        source: serde_json::Error,
    },

    #[error("local state has no `{0}` block")]
    MissingBlock(&'static str),

    #[error("local state is missing attribute `{0}`")]
    MissingAttribute(&'static str),

    #[error("attribute `{name}` must be {expected}")]
    WrongType {
        name: &'static str,
        expected: &'static str,
    },

    #[error("remote policy configuration has no id")]
    MissingId,

    #[error("error parsing policy configuration id `{id}`: {source}")]
    InvalidId {
        id: String,
        source: std::num::ParseIntError,
    },
}

/// Read/write hooks for one kind of branch policy.
pub trait PolicyMapper: Send + Sync {
    /// Resource type name, used in logs.
    fn name(&self) -> &'static str;

    /// Remote policy type this mapper handles.
    fn policy_type(&self) -> Uuid;

    /// Full local schema, base attributes included.
    fn schema(&self) -> Block;

    /// Populate local state from a remote configuration.
    fn flatten(
        &self,
        data: &mut ResourceData,
        config: &PolicyConfiguration,
        project_id: &str,
    ) -> Result<(), PolicyError>;

    /// Build a remote configuration and its project id from local state.
    fn expand(
        &self,
        data: &ResourceData,
        type_id: Uuid,
    ) -> Result<(PolicyConfiguration, String), PolicyError>;
}

/// Decode the remote `settings` object into a typed view.
pub(crate) fn decode_remote_settings<T: DeserializeOwned>(
    config: &PolicyConfiguration,
) -> Result<T, PolicyError> {
    serde_json::from_value(Value::Object(config.settings.clone())).map_err(|source| {
        PolicyError::Settings {
            direction: Direction::Flatten,
            source,
        }
    })
}

/// Decode the single local `settings` block into a typed view.
pub(crate) fn decode_local_settings<T: DeserializeOwned>(
    data: &ResourceData,
) -> Result<T, PolicyError> {
    let block = data
        .first_block(base::SETTINGS)
        .ok_or(PolicyError::MissingBlock(base::SETTINGS))?;

    serde_json::from_value(Value::Object(block.clone())).map_err(|source| PolicyError::Settings {
        direction: Direction::Expand,
        source,
    })
}
