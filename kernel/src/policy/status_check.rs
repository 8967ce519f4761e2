// Status Check Branch Policy
//
// Requires an external status (posted by CI or another service) to
// succeed before a pull request can complete.

use serde::Deserialize;
use uuid::Uuid;

use super::base::{self, SETTINGS};
use super::{decode_local_settings, decode_remote_settings, PolicyError, PolicyMapper};
use crate::remote::PolicyConfiguration;
use crate::schema::{Attribute, Block};
use crate::state::ResourceData;

/// Remote policy type id of status check policies.
pub const STATUS_CHECK: Uuid = Uuid::from_u128(0xcbdc66da_9728_4af8_aada_9a5a32e4a226);

pub const STATUS_NAME: &str = "status_name";
pub const INVALIDATE_ON_SOURCE_UPDATE: &str = "invalidate_on_source_update";
pub const DISPLAY_NAME: &str = "display_name";

/// The status check entries of the local `settings` block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct StatusCheckSettings {
    pub status_name: String,

    #[serde(default)]
    pub invalidate_on_source_update: bool,

    /// Absent in state reads as empty text.
    #[serde(default)]
    pub display_name: String,
}

/// Status check keys of the remote `settings` object.
///
/// Missing or null keys take zero values.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteStatusCheckSettings {
    status_name: Option<String>,
    invalidate_on_source_update: Option<bool>,
    display_name: Option<String>,
}

impl From<RemoteStatusCheckSettings> for StatusCheckSettings {
    fn from(remote: RemoteStatusCheckSettings) -> Self {
        Self {
            status_name: remote.status_name.unwrap_or_default(),
            invalidate_on_source_update: remote.invalidate_on_source_update.unwrap_or_default(),
            display_name: remote.display_name.unwrap_or_default(),
        }
    }
}

/// Mapper for `branch_policy_status_check` resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCheckPolicy;

impl PolicyMapper for StatusCheckPolicy {
    fn name(&self) -> &'static str {
        "branch_policy_status_check"
    }

    fn policy_type(&self) -> Uuid {
        STATUS_CHECK
    }

    fn schema(&self) -> Block {
        base::policy_schema([
            Attribute::text(STATUS_NAME).required().not_empty(),
            Attribute::bool(INVALIDATE_ON_SOURCE_UPDATE).default_value(false),
            // No default and no validation, unlike its siblings.
            Attribute::text(DISPLAY_NAME),
        ])
    }

    fn flatten(
        &self,
        data: &mut ResourceData,
        config: &PolicyConfiguration,
        project_id: &str,
    ) -> Result<(), PolicyError> {
        base::base_flatten(data, config, project_id)?;

        let settings: StatusCheckSettings =
            decode_remote_settings::<RemoteStatusCheckSettings>(config)?.into();

        let block = data
            .first_block_mut(SETTINGS)
            .ok_or(PolicyError::MissingBlock(SETTINGS))?;
        block.insert(STATUS_NAME.into(), settings.status_name.into());
        block.insert(
            INVALIDATE_ON_SOURCE_UPDATE.into(),
            settings.invalidate_on_source_update.into(),
        );
        block.insert(DISPLAY_NAME.into(), settings.display_name.into());

        tracing::debug!(resource = self.name(), id = ?data.id(), "flattened policy");
        Ok(())
    }

    fn expand(
        &self,
        data: &ResourceData,
        type_id: Uuid,
    ) -> Result<(PolicyConfiguration, String), PolicyError> {
        let (mut config, project_id) = base::base_expand(data, type_id)?;
        let settings: StatusCheckSettings = decode_local_settings(data)?;

        config
            .settings
            .insert("statusName".into(), settings.status_name.into());
        config.settings.insert(
            "invalidateOnSourceUpdate".into(),
            settings.invalidate_on_source_update.into(),
        );
        config
            .settings
            .insert("displayName".into(), settings.display_name.into());

        tracing::debug!(resource = self.name(), id = ?config.id, "expanded policy");
        Ok((config, project_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Direction;
    use crate::remote::PolicyTypeRef;
    use crate::schema::SchemaErrorKind;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn remote(settings: Value) -> PolicyConfiguration {
        PolicyConfiguration {
            id: Some(1),
            is_enabled: Some(true),
            is_blocking: Some(true),
            type_ref: Some(PolicyTypeRef {
                id: Some(STATUS_CHECK),
            }),
            settings: settings.as_object().cloned().unwrap(),
        }
    }

    fn scope() -> Value {
        json!([{
            "repositoryId": "test-repo-id",
            "refName": "test-ref-name",
            "matchKind": "test-match-kind",
        }])
    }

    #[test]
    fn flatten_expand_roundtrip() {
        let project_id = Uuid::new_v4().to_string();
        let type_id = Uuid::new_v4();
        let mut original = remote(json!({
            "scope": scope(),
            "statusName": "test status",
            "invalidateOnSourceUpdate": true,
            "displayName": "test display name",
        }));
        original.type_ref = Some(PolicyTypeRef { id: Some(type_id) });

        let mut data = ResourceData::new();
        StatusCheckPolicy
            .flatten(&mut data, &original, &project_id)
            .unwrap();
        let (expanded, expanded_project_id) = StatusCheckPolicy.expand(&data, type_id).unwrap();

        assert_eq!(expanded, original);
        assert_eq!(expanded_project_id, project_id);
    }

    fn roundtrip(
        status_name: &str,
        invalidate: bool,
        display_name: &str,
        enabled: bool,
        blocking: bool,
    ) -> (PolicyConfiguration, PolicyConfiguration) {
        let mut original = remote(json!({
            "scope": scope(),
            "statusName": status_name,
            "invalidateOnSourceUpdate": invalidate,
            "displayName": display_name,
        }));
        original.is_enabled = Some(enabled);
        original.is_blocking = Some(blocking);

        let mut data = ResourceData::new();
        StatusCheckPolicy
            .flatten(&mut data, &original, "project")
            .unwrap();
        let (expanded, _) = StatusCheckPolicy.expand(&data, STATUS_CHECK).unwrap();
        (original, expanded)
    }

    #[test]
    fn roundtrip_edge_triples() {
        let cases = [
            ("a", false, "", false, false),
            ("ünï", true, "x", true, false),
            ("s", false, "disp", false, true),
            ("ci / build", true, "  ", true, true),
        ];

        for (status_name, invalidate, display_name, enabled, blocking) in cases {
            let (original, expanded) =
                roundtrip(status_name, invalidate, display_name, enabled, blocking);
            assert_eq!(expanded, original);
        }
    }

    proptest! {
        #[test]
        fn roundtrip_holds_for_any_triple(
            status_name in ".{1,32}",
            invalidate in any::<bool>(),
            display_name in ".{0,32}",
            enabled in any::<bool>(),
            blocking in any::<bool>(),
        ) {
            let (original, expanded) =
                roundtrip(&status_name, invalidate, &display_name, enabled, blocking);
            prop_assert_eq!(expanded, original);
        }
    }

    #[test]
    fn flatten_writes_settings_block() {
        let mut data = ResourceData::new();
        StatusCheckPolicy
            .flatten(
                &mut data,
                &remote(json!({
                    "scope": scope(),
                    "statusName": "ci/build",
                    "invalidateOnSourceUpdate": false,
                })),
                "project",
            )
            .unwrap();

        let block = data.first_block(SETTINGS).unwrap();
        assert_eq!(block[STATUS_NAME], "ci/build");
        assert_eq!(block[INVALIDATE_ON_SOURCE_UPDATE], false);
        assert_eq!(block[DISPLAY_NAME], "");
        assert!(block.contains_key("scope"));
    }

    #[test]
    fn absent_display_name_expands_to_empty_text() {
        let mut data = ResourceData::new();
        data.set(base::PROJECT_ID, "project");
        data.set(
            SETTINGS,
            json!([{
                "scope": [{ "repository_id": "r", "repository_ref": "refs/heads/main", "match_type": "Exact" }],
                STATUS_NAME: "ci/build",
            }]),
        );

        let (config, _) = StatusCheckPolicy.expand(&data, STATUS_CHECK).unwrap();

        assert_eq!(config.settings["displayName"], "");
        assert_eq!(config.settings["invalidateOnSourceUpdate"], false);
        assert_eq!(config.settings["statusName"], "ci/build");
    }

    #[test]
    fn empty_status_name_fails_validation() {
        let err = StatusCheckPolicy
            .schema()
            .validate(&json!({
                "project_id": "project",
                "settings": [{
                    "status_name": "",
                    "scope": [{ "repository_id": "r" }],
                }]
            }))
            .unwrap_err();

        assert_eq!(err.path, "settings.0.status_name");
        assert_eq!(err.kind, SchemaErrorKind::Empty);
    }

    #[test]
    fn schema_applies_settings_defaults() {
        let validated = StatusCheckPolicy
            .schema()
            .validate(&json!({
                "project_id": "project",
                "settings": [{
                    "status_name": "ci/build",
                    "scope": [{ "repository_id": "r" }],
                }]
            }))
            .unwrap();

        let settings = &validated["settings"][0];
        assert_eq!(settings[INVALIDATE_ON_SOURCE_UPDATE], false);
        assert!(settings.get(DISPLAY_NAME).is_none());
        assert_eq!(settings["scope"][0]["match_type"], "Exact");
    }

    #[test]
    fn malformed_remote_settings_fail_flatten() {
        let err = StatusCheckPolicy
            .flatten(
                &mut ResourceData::new(),
                &remote(json!({ "scope": scope(), "statusName": 5 })),
                "project",
            )
            .unwrap_err();

        assert!(matches!(
            err,
            PolicyError::Settings {
                direction: Direction::Flatten,
                ..
            }
        ));
    }

    #[test]
    fn malformed_local_state_fails_expand() {
        let mut data = ResourceData::new();
        data.set(base::PROJECT_ID, "project");
        data.set(
            SETTINGS,
            json!([{ "scope": [], STATUS_NAME: true }]),
        );

        let err = StatusCheckPolicy.expand(&data, STATUS_CHECK).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::Settings {
                direction: Direction::Expand,
                ..
            }
        ));

        data.set(SETTINGS, json!([]));
        let err = StatusCheckPolicy.expand(&data, STATUS_CHECK).unwrap_err();
        assert!(matches!(err, PolicyError::MissingBlock(SETTINGS)));
    }
}
