// Policy Configuration Client
//
// Access contract for the remote policy service. Implementations may talk
// to a REST endpoint, a fixture file, or memory; the resource lifecycle
// only depends on this trait.

use std::collections::BTreeMap;

use crate::remote::PolicyConfiguration;

/// Errors reported by a policy client.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("policy configuration {id} not found in project `{project}`")]
    NotFound { project: String, id: i32 },

    #[error("policy configuration rejected: {0}")]
    Rejected(String),
}

/// Remote store of policy configurations, keyed by project.
///
/// Implementations must:
/// - assign the id on create
/// - return the stored record (with id) from every write
/// - keep records of different projects apart
pub trait PolicyClient: Send + Sync {
    fn create_policy_configuration(
        &mut self,
        config: &PolicyConfiguration,
        project: &str,
    ) -> Result<PolicyConfiguration, ClientError>;

    fn get_policy_configuration(
        &self,
        project: &str,
        id: i32,
    ) -> Result<PolicyConfiguration, ClientError>;

    fn update_policy_configuration(
        &mut self,
        config: &PolicyConfiguration,
        project: &str,
        id: i32,
    ) -> Result<PolicyConfiguration, ClientError>;

    fn delete_policy_configuration(&mut self, project: &str, id: i32) -> Result<(), ClientError>;
}

/// In-memory client with sequential ids.
#[derive(Debug, Default)]
pub struct InMemoryPolicyClient {
    next_id: i32,
    configs: BTreeMap<(String, i32), PolicyConfiguration>,
}

impl InMemoryPolicyClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl PolicyClient for InMemoryPolicyClient {
    fn create_policy_configuration(
        &mut self,
        config: &PolicyConfiguration,
        project: &str,
    ) -> Result<PolicyConfiguration, ClientError> {
        if config.type_id().is_none() {
            return Err(ClientError::Rejected("missing policy type".into()));
        }

        self.next_id += 1;
        let mut stored = config.clone();
        stored.id = Some(self.next_id);

        self.configs
            .insert((project.to_string(), self.next_id), stored.clone());
        Ok(stored)
    }

    fn get_policy_configuration(
        &self,
        project: &str,
        id: i32,
    ) -> Result<PolicyConfiguration, ClientError> {
        self.configs
            .get(&(project.to_string(), id))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                project: project.to_string(),
                id,
            })
    }

    fn update_policy_configuration(
        &mut self,
        config: &PolicyConfiguration,
        project: &str,
        id: i32,
    ) -> Result<PolicyConfiguration, ClientError> {
        let slot = self
            .configs
            .get_mut(&(project.to_string(), id))
            .ok_or_else(|| ClientError::NotFound {
                project: project.to_string(),
                id,
            })?;

        let mut stored = config.clone();
        stored.id = Some(id);
        *slot = stored.clone();
        Ok(stored)
    }

    fn delete_policy_configuration(&mut self, project: &str, id: i32) -> Result<(), ClientError> {
        self.configs
            .remove(&(project.to_string(), id))
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound {
                project: project.to_string(),
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::PolicyTypeRef;
    use uuid::Uuid;

    fn config() -> PolicyConfiguration {
        PolicyConfiguration {
            type_ref: Some(PolicyTypeRef {
                id: Some(Uuid::new_v4()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let mut client = InMemoryPolicyClient::new();

        let first = client.create_policy_configuration(&config(), "p").unwrap();
        let second = client.create_policy_configuration(&config(), "p").unwrap();

        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
        assert_eq!(client.len(), 2);
    }

    #[test]
    fn records_are_scoped_by_project() {
        let mut client = InMemoryPolicyClient::new();
        let created = client.create_policy_configuration(&config(), "a").unwrap();

        let err = client.get_policy_configuration("b", created.id.unwrap()).unwrap_err();
        assert_eq!(err, ClientError::NotFound { project: "b".into(), id: 1 });
    }

    #[test]
    fn create_without_type_is_rejected() {
        let mut client = InMemoryPolicyClient::new();
        let err = client
            .create_policy_configuration(&PolicyConfiguration::default(), "p")
            .unwrap_err();

        assert!(matches!(err, ClientError::Rejected(_)));
        assert!(client.is_empty());
    }

    #[test]
    fn update_and_delete_missing_record_fail() {
        let mut client = InMemoryPolicyClient::new();

        assert!(client.update_policy_configuration(&config(), "p", 9).is_err());
        assert!(client.delete_policy_configuration("p", 9).is_err());
    }
}
