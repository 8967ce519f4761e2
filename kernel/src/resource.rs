// Policy Resource Lifecycle
//
// Drives create/read/update/delete for one policy type:
// raw config → schema → expand → client → flatten → state

use serde_json::Value;

use crate::client::{ClientError, PolicyClient};
use crate::policy::base::PROJECT_ID;
use crate::policy::{PolicyError, PolicyMapper};
use crate::schema::SchemaError;
use crate::state::ResourceData;

/// Errors that can occur during a lifecycle operation.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("invalid configuration: {0}")]
    Schema(#[from] SchemaError),

    #[error("policy mapping failed: {0}")]
    Policy(#[from] PolicyError),

    #[error("policy service error: {0}")]
    Client(#[from] ClientError),

    #[error("resource has no id")]
    MissingId,

    #[error("resource id `{0}` is not a policy configuration id")]
    InvalidId(String),

    #[error("resource state has no project id")]
    MissingProject,
}

/// A branch policy resource backed by mapper `M`.
#[derive(Debug, Clone, Default)]
pub struct PolicyResource<M> {
    mapper: M,
}

impl<M: PolicyMapper> PolicyResource<M> {
    pub fn new(mapper: M) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Validate raw user configuration into state with defaults applied.
    pub fn plan(&self, raw: &Value) -> Result<ResourceData, ResourceError> {
        let attributes = self.mapper.schema().validate(raw)?;
        Ok(ResourceData::from_attributes(attributes))
    }

    /// Create the remote policy and return the resulting state.
    pub fn create<C: PolicyClient>(
        &self,
        client: &mut C,
        raw: &Value,
    ) -> Result<ResourceData, ResourceError> {
        let mut data = self.plan(raw)?;
        let (config, project_id) = self.mapper.expand(&data, self.mapper.policy_type())?;

        let created = client.create_policy_configuration(&config, &project_id)?;
        self.mapper.flatten(&mut data, &created, &project_id)?;

        tracing::info!(
            resource = self.mapper.name(),
            id = ?data.id(),
            project_id = %project_id,
            "created policy"
        );
        Ok(data)
    }

    /// Refresh `data` from the remote policy.
    pub fn read<C: PolicyClient>(
        &self,
        client: &C,
        data: &mut ResourceData,
    ) -> Result<(), ResourceError> {
        let id = policy_id(data)?;
        let project_id = state_project_id(data)?;

        let config = client.get_policy_configuration(&project_id, id)?;
        self.mapper.flatten(data, &config, &project_id)?;

        tracing::debug!(resource = self.mapper.name(), id, project_id = %project_id, "read policy");
        Ok(())
    }

    /// Replace the remote policy with `raw` and refresh `data`.
    ///
    /// `data` is left untouched when any step fails.
    pub fn update<C: PolicyClient>(
        &self,
        client: &mut C,
        data: &mut ResourceData,
        raw: &Value,
    ) -> Result<(), ResourceError> {
        let id = policy_id(data)?;

        let mut planned = self.plan(raw)?;
        planned.set_id(id.to_string());
        let (config, project_id) = self.mapper.expand(&planned, self.mapper.policy_type())?;

        let updated = client.update_policy_configuration(&config, &project_id, id)?;
        self.mapper.flatten(&mut planned, &updated, &project_id)?;
        *data = planned;

        tracing::info!(resource = self.mapper.name(), id, project_id = %project_id, "updated policy");
        Ok(())
    }

    /// Delete the remote policy and clear the state's identity.
    pub fn delete<C: PolicyClient>(
        &self,
        client: &mut C,
        data: &mut ResourceData,
    ) -> Result<(), ResourceError> {
        let id = policy_id(data)?;
        let project_id = state_project_id(data)?;

        client.delete_policy_configuration(&project_id, id)?;
        data.clear_id();

        tracing::info!(resource = self.mapper.name(), id, project_id = %project_id, "deleted policy");
        Ok(())
    }
}

fn policy_id(data: &ResourceData) -> Result<i32, ResourceError> {
    let id = data.id().ok_or(ResourceError::MissingId)?;
    id.parse().map_err(|_| ResourceError::InvalidId(id.to_string()))
}

fn state_project_id(data: &ResourceData) -> Result<String, ResourceError> {
    data.get(PROJECT_ID)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ResourceError::MissingProject)
}
