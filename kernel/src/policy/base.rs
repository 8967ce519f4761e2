// Base Branch Policy
//
// Attributes and conversions shared by every branch policy type:
// project, enablement flags and the repository/ref scopes a policy
// applies to. Policy types extend the `settings` block with their own
// attributes and call `base_flatten`/`base_expand` first.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{decode_local_settings, decode_remote_settings, PolicyError};
use crate::remote::{PolicyConfiguration, PolicyTypeRef};
use crate::schema::{Attribute, Block};
use crate::state::ResourceData;

pub const PROJECT_ID: &str = "project_id";
pub const ENABLED: &str = "enabled";
pub const BLOCKING: &str = "blocking";
pub const SETTINGS: &str = "settings";
pub const SCOPE: &str = "scope";
pub const REPOSITORY_ID: &str = "repository_id";
pub const REPOSITORY_REF: &str = "repository_ref";
pub const MATCH_TYPE: &str = "match_type";

pub const MATCH_TYPE_EXACT: &str = "Exact";
pub const MATCH_TYPE_PREFIX: &str = "Prefix";
pub const MATCH_TYPE_DEFAULT_BRANCH: &str = "DefaultBranch";

const MATCH_TYPES: &[&str] = &[MATCH_TYPE_EXACT, MATCH_TYPE_PREFIX, MATCH_TYPE_DEFAULT_BRANCH];

/// Base policy schema with `settings_attributes` merged into the
/// `settings` block.
pub fn policy_schema(settings_attributes: impl IntoIterator<Item = Attribute>) -> Block {
    let scope = Block::new()
        .with(Attribute::text(REPOSITORY_ID))
        .with(Attribute::text(REPOSITORY_REF))
        .with(
            Attribute::text(MATCH_TYPE)
                .default_value(MATCH_TYPE_EXACT)
                .one_of_ignore_case(MATCH_TYPES),
        );

    let settings = settings_attributes.into_iter().fold(
        Block::new().with(Attribute::list(SCOPE, scope).required().items(1, None)),
        Block::with,
    );

    Block::new()
        .with(Attribute::text(PROJECT_ID).required().not_empty())
        .with(Attribute::bool(ENABLED).default_value(true))
        .with(Attribute::bool(BLOCKING).default_value(true))
        .with(
            Attribute::list(SETTINGS, settings)
                .required()
                .items(1, Some(1)),
        )
}

/// Scope entry as stored by the remote service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteScope {
    repository_id: Option<String>,
    ref_name: Option<String>,
    match_kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteCommonSettings {
    #[serde(default)]
    scope: Vec<RemoteScope>,
}

/// Scope block as held in local state.
#[derive(Debug, Deserialize)]
struct LocalScope {
    #[serde(default)]
    repository_id: String,

    #[serde(default)]
    repository_ref: String,

    #[serde(default = "default_match_type")]
    match_type: String,
}

fn default_match_type() -> String {
    MATCH_TYPE_EXACT.to_string()
}

#[derive(Debug, Deserialize)]
struct LocalCommonSettings {
    scope: Vec<LocalScope>,
}

/// Populate the shared attributes and rebuild the `settings` block from a
/// remote configuration.
///
/// The `settings` list is replaced with a single block holding only the
/// scopes; policy types fill in their own keys afterwards.
pub fn base_flatten(
    data: &mut ResourceData,
    config: &PolicyConfiguration,
    project_id: &str,
) -> Result<(), PolicyError> {
    let id = config.id.ok_or(PolicyError::MissingId)?;
    let common: RemoteCommonSettings = decode_remote_settings(config)?;

    let scopes: Vec<Value> = common
        .scope
        .into_iter()
        .map(|scope| {
            json!({
                REPOSITORY_ID: scope.repository_id.unwrap_or_default(),
                REPOSITORY_REF: scope.ref_name.unwrap_or_default(),
                MATCH_TYPE: scope.match_kind.unwrap_or_else(default_match_type),
            })
        })
        .collect();

    data.set_id(id.to_string());
    data.set(PROJECT_ID, project_id);
    data.set(ENABLED, config.is_enabled.unwrap_or(true));
    data.set(BLOCKING, config.is_blocking.unwrap_or(true));
    data.set(SETTINGS, json!([{ SCOPE: scopes }]));

    tracing::trace!(policy_id = id, project_id, "flattened base policy");
    Ok(())
}

/// Build the remote configuration skeleton and project id from local state.
///
/// The remote `settings` object holds only `scope`; policy types add their
/// own keys to it.
pub fn base_expand(
    data: &ResourceData,
    type_id: Uuid,
) -> Result<(PolicyConfiguration, String), PolicyError> {
    let project_id = match data.get(PROJECT_ID) {
        Some(Value::String(project_id)) => project_id.clone(),
        Some(_) => {
            return Err(PolicyError::WrongType {
                name: PROJECT_ID,
                expected: "text",
            })
        }
        None => return Err(PolicyError::MissingAttribute(PROJECT_ID)),
    };

    let id = data
        .id()
        .map(|id| {
            id.parse::<i32>().map_err(|source| PolicyError::InvalidId {
                id: id.to_string(),
                source,
            })
        })
        .transpose()?;

    let config = PolicyConfiguration {
        id,
        is_enabled: Some(bool_or(data, ENABLED, true)?),
        is_blocking: Some(bool_or(data, BLOCKING, true)?),
        type_ref: Some(PolicyTypeRef { id: Some(type_id) }),
        settings: expand_settings(data)?,
    };

    Ok((config, project_id))
}

fn bool_or(data: &ResourceData, name: &'static str, default: bool) -> Result<bool, PolicyError> {
    match data.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value.as_bool().ok_or(PolicyError::WrongType {
            name,
            expected: "bool",
        }),
    }
}

fn expand_settings(data: &ResourceData) -> Result<Map<String, Value>, PolicyError> {
    let common: LocalCommonSettings = decode_local_settings(data)?;

    let scopes: Vec<Value> = common
        .scope
        .into_iter()
        .map(|scope| {
            let mut entry = Map::new();
            if !scope.repository_id.is_empty() {
                entry.insert("repositoryId".into(), scope.repository_id.into());
            }
            // A default-branch scope is resolved by the service; any ref is dropped.
            if scope.match_type.eq_ignore_ascii_case(MATCH_TYPE_DEFAULT_BRANCH) {
                entry.insert("matchKind".into(), MATCH_TYPE_DEFAULT_BRANCH.into());
            } else {
                if !scope.repository_ref.is_empty() {
                    entry.insert("refName".into(), scope.repository_ref.into());
                }
                entry.insert("matchKind".into(), scope.match_type.into());
            }
            Value::Object(entry)
        })
        .collect();

    let mut settings = Map::new();
    settings.insert(SCOPE.into(), Value::Array(scopes));
    Ok(settings)
}
