use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::publishing::domain::{
    Agent, AgentId, AgentLanguagePreference, AgentRegistration, ExternalPostId,
    PageConnectionPayload, Property, PropertyDraft, PropertyId, PropertyTranslation,
};
use crate::publishing::facebook::{FacebookError, FacebookGateway, ManagedPage, PagePost};
use crate::publishing::memory::InMemoryStore;
use crate::publishing::registry::LanguageCode;
use crate::publishing::repository::{
    AgentRepository, PreferenceRepository, PropertyRepository, RepositoryError,
};
use crate::publishing::service::PublishingService;

/// Gateway double that records posts and rejects configured pages.
#[derive(Default)]
pub(super) struct RecordingFacebook {
    posts: Mutex<Vec<PagePost>>,
    failing_pages: Vec<String>,
    managed_pages: Vec<ManagedPage>,
    oauth_configured: bool,
}

impl RecordingFacebook {
    pub(super) fn failing(pages: &[&str]) -> Self {
        Self {
            failing_pages: pages.iter().map(|page| page.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(super) fn with_managed_pages(pages: Vec<ManagedPage>) -> Self {
        Self {
            managed_pages: pages,
            oauth_configured: true,
            ..Self::default()
        }
    }

    pub(super) fn posts(&self) -> Vec<PagePost> {
        self.posts.lock().expect("posts mutex").clone()
    }
}

#[async_trait]
impl FacebookGateway for RecordingFacebook {
    async fn publish_post(&self, post: &PagePost) -> Result<ExternalPostId, FacebookError> {
        let mut guard = self.posts.lock().expect("posts mutex");
        guard.push(post.clone());
        if self.failing_pages.contains(&post.page_id.0) {
            return Err(FacebookError::Api {
                status: 400,
                body: "{\"error\":{\"message\":\"(#200) permissions error\"}}".to_string(),
            });
        }
        Ok(ExternalPostId(format!("{}_{}", post.page_id.0, guard.len())))
    }

    fn authorization_url(&self, state: &str) -> Result<String, FacebookError> {
        if !self.oauth_configured {
            return Err(FacebookError::NotConfigured("FB_APP_ID"));
        }
        Ok(format!("https://www.facebook.com/v18.0/dialog/oauth?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<Vec<ManagedPage>, FacebookError> {
        if code == "expired" {
            return Err(FacebookError::Api {
                status: 400,
                body: "code has expired".to_string(),
            });
        }
        Ok(self.managed_pages.clone())
    }
}

/// Store whose property writes always lose the version race. Agent writes
/// lose the first `agent_races` times.
#[derive(Default)]
pub(super) struct RacingStore {
    inner: InMemoryStore,
    agent_races: AtomicUsize,
}

impl RacingStore {
    pub(super) fn losing_agent_writes(times: usize) -> Self {
        Self {
            agent_races: AtomicUsize::new(times),
            ..Self::default()
        }
    }
}

impl PropertyRepository for RacingStore {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError> {
        self.inner.insert_property(property)
    }

    fn update_property(&self, property: Property) -> Result<Property, RepositoryError> {
        Err(RepositoryError::StaleVersion {
            expected: property.version,
            found: property.version + 1,
        })
    }

    fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        self.inner.fetch_property(id)
    }

    fn properties_for_agent(&self, agent_id: &AgentId) -> Result<Vec<Property>, RepositoryError> {
        self.inner.properties_for_agent(agent_id)
    }
}

impl AgentRepository for RacingStore {
    fn insert_agent(&self, agent: Agent) -> Result<Agent, RepositoryError> {
        self.inner.insert_agent(agent)
    }

    fn update_agent(&self, agent: Agent) -> Result<Agent, RepositoryError> {
        let lost = self
            .agent_races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lost {
            return Err(RepositoryError::StaleVersion {
                expected: agent.version,
                found: agent.version + 1,
            });
        }
        self.inner.update_agent(agent)
    }

    fn fetch_agent(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        self.inner.fetch_agent(id)
    }

    fn fetch_agent_by_slug(&self, slug: &str) -> Result<Option<Agent>, RepositoryError> {
        self.inner.fetch_agent_by_slug(slug)
    }
}

impl PreferenceRepository for RacingStore {
    fn upsert_preferences(
        &self,
        preference: AgentLanguagePreference,
    ) -> Result<AgentLanguagePreference, RepositoryError> {
        self.inner.upsert_preferences(preference)
    }

    fn fetch_preferences(
        &self,
        agent_id: &AgentId,
    ) -> Result<Option<AgentLanguagePreference>, RepositoryError> {
        self.inner.fetch_preferences(agent_id)
    }
}

pub(super) type TestService = PublishingService<InMemoryStore, RecordingFacebook>;

pub(super) fn build_service_with(
    facebook: RecordingFacebook,
) -> (Arc<TestService>, Arc<InMemoryStore>, Arc<RecordingFacebook>) {
    let store = Arc::new(InMemoryStore::new());
    let facebook = Arc::new(facebook);
    let service = Arc::new(PublishingService::new(store.clone(), facebook.clone()));
    (service, store, facebook)
}

pub(super) fn build_service() -> (Arc<TestService>, Arc<InMemoryStore>, Arc<RecordingFacebook>) {
    build_service_with(RecordingFacebook::default())
}

pub(super) fn registration(name: &str) -> AgentRegistration {
    AgentRegistration {
        name: name.to_string(),
        slug: None,
        email: Some("priya@example.in".to_string()),
        phone: Some("+91 98200 00000".to_string()),
        bio: Some("Residential specialist in western Mumbai".to_string()),
        is_public: true,
    }
}

pub(super) fn draft(title: &str) -> PropertyDraft {
    let mut translations = BTreeMap::new();
    translations.insert(
        LanguageCode::Mr,
        PropertyTranslation {
            title: format!("{title} (मराठी)"),
            description: None,
        },
    );
    PropertyDraft {
        title: title.to_string(),
        description: "Bright flat near the promenade".to_string(),
        price: 8_500_000.0,
        location: "Bandra West, Mumbai".to_string(),
        bedrooms: Some(2),
        bathrooms: Some(2.0),
        area_sqft: Some(950),
        property_type: Some("apartment".to_string()),
        images: vec!["https://img.example/listing-1.jpg".to_string()],
        translations,
    }
}

/// Registers an agent with two connected pages and one draft property.
pub(super) fn seed_agent(service: &TestService) -> (Agent, Property) {
    let agent = service
        .register_agent(registration("Priya Sharma"))
        .expect("agent registers");
    service
        .connect_pages(
            &agent.id,
            vec![
                PageConnectionPayload {
                    page_id: "page-en".to_string(),
                    page_name: Some("Priya Homes".to_string()),
                    access_token: "token-en".to_string(),
                },
                PageConnectionPayload {
                    page_id: "page-hi".to_string(),
                    page_name: Some("Priya Homes Hindi".to_string()),
                    access_token: "token-hi".to_string(),
                },
            ],
        )
        .expect("pages connect");
    let property = service
        .create_property(&agent.id, draft("Sea-facing 2BHK"))
        .expect("property created");
    (agent, property)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
