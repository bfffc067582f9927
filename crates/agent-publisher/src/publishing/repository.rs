use super::domain::{Agent, AgentId, AgentLanguagePreference, Property, PropertyId};

/// Storage for listings. Writes are compare-and-swap on [`Property::version`].
pub trait PropertyRepository: Send + Sync {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError>;
    /// Persists `property` if the stored version still equals `property.version`,
    /// returning the record with its version bumped.
    fn update_property(&self, property: Property) -> Result<Property, RepositoryError>;
    fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError>;
    /// All properties owned by the agent in insertion order.
    fn properties_for_agent(&self, agent_id: &AgentId) -> Result<Vec<Property>, RepositoryError>;
}

/// Storage for agent accounts. Slugs are unique; writes are compare-and-swap
/// on [`Agent::version`].
pub trait AgentRepository: Send + Sync {
    fn insert_agent(&self, agent: Agent) -> Result<Agent, RepositoryError>;
    fn update_agent(&self, agent: Agent) -> Result<Agent, RepositoryError>;
    fn fetch_agent(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError>;
    fn fetch_agent_by_slug(&self, slug: &str) -> Result<Option<Agent>, RepositoryError>;
}

pub trait PreferenceRepository: Send + Sync {
    fn upsert_preferences(
        &self,
        preference: AgentLanguagePreference,
    ) -> Result<AgentLanguagePreference, RepositoryError>;
    fn fetch_preferences(
        &self,
        agent_id: &AgentId,
    ) -> Result<Option<AgentLanguagePreference>, RepositoryError>;
}

/// Everything the publishing service persists.
pub trait PublishingStore: PropertyRepository + AgentRepository + PreferenceRepository {}

impl<T> PublishingStore for T where T: PropertyRepository + AgentRepository + PreferenceRepository {}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record was modified concurrently (expected version {expected}, found {found})")]
    StaleVersion { expected: u64, found: u64 },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
