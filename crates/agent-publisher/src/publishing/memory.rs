use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{Agent, AgentId, AgentLanguagePreference, Property, PropertyId};
use super::repository::{
    AgentRepository, PreferenceRepository, PropertyRepository, RepositoryError,
};

/// Process-local store backing the service. One instance is created at startup
/// and shared through an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    properties: HashMap<PropertyId, Property>,
    property_order: Vec<PropertyId>,
    agents: HashMap<AgentId, Agent>,
    preferences: HashMap<AgentId, AgentLanguagePreference>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl PropertyRepository for InMemoryStore {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.properties.contains_key(&property.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.property_order.push(property.id.clone());
        guard
            .properties
            .insert(property.id.clone(), property.clone());
        Ok(property)
    }

    fn update_property(&self, mut property: Property) -> Result<Property, RepositoryError> {
        let mut guard = self.lock()?;
        let stored = guard
            .properties
            .get_mut(&property.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != property.version {
            return Err(RepositoryError::StaleVersion {
                expected: property.version,
                found: stored.version,
            });
        }
        property.version += 1;
        *stored = property.clone();
        Ok(property)
    }

    fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.properties.get(id).cloned())
    }

    fn properties_for_agent(&self, agent_id: &AgentId) -> Result<Vec<Property>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .property_order
            .iter()
            .filter_map(|id| guard.properties.get(id))
            .filter(|property| &property.agent_id == agent_id)
            .cloned()
            .collect())
    }
}

impl AgentRepository for InMemoryStore {
    fn insert_agent(&self, agent: Agent) -> Result<Agent, RepositoryError> {
        let mut guard = self.lock()?;
        let slug_taken = guard
            .agents
            .values()
            .any(|existing| existing.slug == agent.slug);
        if slug_taken || guard.agents.contains_key(&agent.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    fn update_agent(&self, mut agent: Agent) -> Result<Agent, RepositoryError> {
        let mut guard = self.lock()?;
        let stored = guard
            .agents
            .get_mut(&agent.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != agent.version {
            return Err(RepositoryError::StaleVersion {
                expected: agent.version,
                found: stored.version,
            });
        }
        agent.version += 1;
        *stored = agent.clone();
        Ok(agent)
    }

    fn fetch_agent(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.agents.get(id).cloned())
    }

    fn fetch_agent_by_slug(&self, slug: &str) -> Result<Option<Agent>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .agents
            .values()
            .find(|agent| agent.slug == slug)
            .cloned())
    }
}

impl PreferenceRepository for InMemoryStore {
    fn upsert_preferences(
        &self,
        preference: AgentLanguagePreference,
    ) -> Result<AgentLanguagePreference, RepositoryError> {
        let mut guard = self.lock()?;
        guard
            .preferences
            .insert(preference.agent_id.clone(), preference.clone());
        Ok(preference)
    }

    fn fetch_preferences(
        &self,
        agent_id: &AgentId,
    ) -> Result<Option<AgentLanguagePreference>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.preferences.get(agent_id).cloned())
    }
}
