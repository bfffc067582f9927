use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::domain::{
    Agent, AgentId, AgentLanguagePreference, AgentPublicProfile, AgentRegistration,
    ExternalPostId, FacebookPageConnection, FacebookPageId, PageConnectionPayload,
    PerLanguageStatus, PreferenceUpdate, Property, PropertyDraft, PropertyId, PublishingRequest,
    PublishingSnapshot, PublishingStatus, ValidationError,
};
use super::facebook::{FacebookError, FacebookGateway, PagePost};
use super::import::{parse_property_rows, PropertyImportError};
use super::message::compose_listing_post;
use super::registry::{ChannelId, LanguageCode};
use super::repository::{PublishingStore, RepositoryError};

/// Service owning the publishing workflow: agents, listings, language
/// preferences and the draft/published lifecycle.
pub struct PublishingService<S, F> {
    store: Arc<S>,
    facebook: Arc<F>,
    locks: PropertyLocks,
    oauth_states: OAuthStates,
}

/// Attempts at a read-modify-write of an agent before reporting a conflict.
const AGENT_WRITE_ATTEMPTS: usize = 3;

const OAUTH_STATE_TTL: Duration = Duration::from_secs(10 * 60);

type PropertyLock = Arc<tokio::sync::Mutex<()>>;

/// Per-property async locks serializing publish and unpublish of one listing.
/// Entries live only while some task holds or waits on them.
#[derive(Default)]
struct PropertyLocks {
    handles: Mutex<HashMap<PropertyId, PropertyLock>>,
}

impl PropertyLocks {
    fn table(&self) -> Result<MutexGuard<'_, HashMap<PropertyId, PropertyLock>>, PublishingError> {
        self.handles.lock().map_err(|_| {
            PublishingError::Repository(RepositoryError::Unavailable(
                "property lock table poisoned".to_string(),
            ))
        })
    }

    fn handle(&self, id: &PropertyId) -> Result<PropertyLock, PublishingError> {
        Ok(self.table()?.entry(id.clone()).or_default().clone())
    }

    /// Drops the table entry once the caller's handle is gone and nobody else
    /// holds one. Handles are only cloned under the table lock.
    fn release(&self, id: &PropertyId, handle: PropertyLock) {
        drop(handle);
        if let Ok(mut table) = self.handles.lock() {
            if table
                .get(id)
                .is_some_and(|entry| Arc::strong_count(entry) == 1)
            {
                table.remove(id);
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.handles.lock().map(|table| table.len()).unwrap_or_default()
    }
}

struct PendingAuthorization {
    agent_id: AgentId,
    issued_at: Instant,
}

/// Single-use OAuth `state` values handed out by the authorize step.
struct OAuthStates {
    pending: Mutex<HashMap<String, PendingAuthorization>>,
    ttl: Duration,
}

impl Default for OAuthStates {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl: OAUTH_STATE_TTL,
        }
    }
}

impl OAuthStates {
    fn table(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<String, PendingAuthorization>>, PublishingError> {
        self.pending.lock().map_err(|_| {
            PublishingError::Repository(RepositoryError::Unavailable(
                "oauth state table poisoned".to_string(),
            ))
        })
    }

    fn issue(&self, agent_id: &AgentId) -> Result<String, PublishingError> {
        let state = Uuid::new_v4().simple().to_string();
        let mut table = self.table()?;
        let ttl = self.ttl;
        table.retain(|_, pending| pending.issued_at.elapsed() < ttl);
        table.insert(
            state.clone(),
            PendingAuthorization {
                agent_id: agent_id.clone(),
                issued_at: Instant::now(),
            },
        );
        Ok(state)
    }

    /// Removes `state` and returns the agent it was issued for. Unknown,
    /// reused and expired values are rejected.
    fn consume(&self, state: &str) -> Result<AgentId, PublishingError> {
        match self.table()?.remove(state) {
            Some(pending) if pending.issued_at.elapsed() < self.ttl => Ok(pending.agent_id),
            _ => Err(ValidationError::Invalid("unknown or expired oauth state".to_string()).into()),
        }
    }
}

/// Why a single (language, channel) pair did not publish.
#[derive(Debug, thiserror::Error)]
pub enum PublishFailure {
    #[error("channel '{0}' has no integration")]
    ChannelNotSupported(ChannelId),
    #[error("no facebook page mapped for language '{0}'")]
    NoFacebookPage(LanguageCode),
    #[error("facebook page '{0}' is not connected to the agent account")]
    PageNotConnected(String),
    #[error(transparent)]
    ExternalPostFailure(#[from] FacebookError),
}

impl PublishFailure {
    pub fn status(&self) -> PerLanguageStatus {
        match self {
            PublishFailure::ChannelNotSupported(_) | PublishFailure::NoFacebookPage(_) => {
                PerLanguageStatus::NotSupported
            }
            PublishFailure::PageNotConnected(_) | PublishFailure::ExternalPostFailure(_) => {
                PerLanguageStatus::Failed
            }
        }
    }
}

enum Delivery {
    Website,
    Facebook(ExternalPostId),
}

/// Accumulates pair outcomes during one publish run.
struct FanOut {
    language_status: BTreeMap<LanguageCode, PerLanguageStatus>,
    channel_results: BTreeMap<ChannelId, BTreeMap<LanguageCode, PerLanguageStatus>>,
    facebook_posts: BTreeMap<LanguageCode, ExternalPostId>,
}

impl FanOut {
    fn new(languages: &[LanguageCode]) -> Self {
        Self {
            language_status: languages
                .iter()
                .map(|language| (*language, PerLanguageStatus::Pending))
                .collect(),
            channel_results: BTreeMap::new(),
            facebook_posts: BTreeMap::new(),
        }
    }

    fn record(
        &mut self,
        language: LanguageCode,
        channel: ChannelId,
        result: Result<Delivery, PublishFailure>,
    ) {
        let status = match result {
            Ok(Delivery::Website) => PerLanguageStatus::Published,
            Ok(Delivery::Facebook(post_id)) => {
                self.facebook_posts.insert(language, post_id);
                PerLanguageStatus::Published
            }
            Err(failure) => {
                let status = failure.status();
                if status == PerLanguageStatus::Failed {
                    warn!(%language, %channel, error = %failure, "publish pair failed");
                } else {
                    debug!(%language, %channel, reason = %failure, "publish pair not supported");
                }
                status
            }
        };

        self.channel_results
            .entry(channel)
            .or_default()
            .insert(language, status);
        let merged = self
            .language_status
            .get(&language)
            .copied()
            .unwrap_or(PerLanguageStatus::Unknown)
            .merge(status);
        self.language_status.insert(language, merged);
    }

    fn published_channels(&self) -> BTreeSet<ChannelId> {
        self.channel_results
            .iter()
            .filter(|(_, languages)| {
                languages
                    .values()
                    .any(|status| *status == PerLanguageStatus::Published)
            })
            .map(|(channel, _)| *channel)
            .collect()
    }
}

/// Body returned by unpublish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnpublishOutcome {
    pub property_id: PropertyId,
    pub status: PublishingStatus,
}

impl<S, F> PublishingService<S, F>
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    pub fn new(store: Arc<S>, facebook: Arc<F>) -> Self {
        Self {
            store,
            facebook,
            locks: PropertyLocks::default(),
            oauth_states: OAuthStates::default(),
        }
    }

    /// Runs the language x channel fan-out and marks the property published.
    /// Partial failures are reported in the snapshot, never as errors.
    pub async fn publish(
        &self,
        agent_id: &AgentId,
        request: PublishingRequest,
    ) -> Result<PublishingSnapshot, PublishingError> {
        request.validate()?;
        let property_id = request.property_id.clone();
        let lock = self.locks.handle(&property_id)?;
        let result = {
            let _serialized = lock.lock().await;
            self.publish_serialized(agent_id, request).await
        };
        self.locks.release(&property_id, lock);
        result
    }

    async fn publish_serialized(
        &self,
        agent_id: &AgentId,
        request: PublishingRequest,
    ) -> Result<PublishingSnapshot, PublishingError> {
        let mut property = self.owned_property(agent_id, &request.property_id)?;
        let agent = self.require_agent(agent_id)?;
        let preferences = self.store.fetch_preferences(agent_id)?;
        let (languages, channels) = request.normalized_targets();

        let mut fan_out = FanOut::new(&languages);
        for language in &languages {
            for channel in &channels {
                let result = self
                    .deliver(
                        &property,
                        &agent,
                        preferences.as_ref(),
                        &request,
                        *language,
                        *channel,
                    )
                    .await;
                fan_out.record(*language, *channel, result);
            }
        }

        property.publishing_status = PublishingStatus::Published;
        property.published_at = Some(Utc::now());
        property.published_channels = fan_out.published_channels();
        property.language_status = fan_out.language_status;
        property.channel_results = fan_out.channel_results;
        property.facebook_posts.extend(fan_out.facebook_posts);
        property.auto_translate = request.auto_translate;

        let stored = self.store.update_property(property)?;
        info!(
            property_id = %stored.id.0,
            channels = ?stored.published_channels,
            languages = ?stored.language_status,
            "property published"
        );
        Ok(stored.snapshot())
    }

    async fn deliver(
        &self,
        property: &Property,
        agent: &Agent,
        preferences: Option<&AgentLanguagePreference>,
        request: &PublishingRequest,
        language: LanguageCode,
        channel: ChannelId,
    ) -> Result<Delivery, PublishFailure> {
        match channel {
            ChannelId::Website => Ok(Delivery::Website),
            ChannelId::Facebook => {
                let page_id = resolve_page(request, preferences, language)
                    .ok_or(PublishFailure::NoFacebookPage(language))?;
                let connection = agent
                    .page_connection(&page_id)
                    .ok_or_else(|| PublishFailure::PageNotConnected(page_id.0.clone()))?;
                let post = PagePost {
                    page_id,
                    access_token: connection.access_token.clone(),
                    message: compose_listing_post(property, language),
                    image_url: property.listing.images.first().cloned(),
                };
                let post_id = self.facebook.publish_post(&post).await?;
                Ok(Delivery::Facebook(post_id))
            }
            ChannelId::Instagram | ChannelId::Linkedin => {
                Err(PublishFailure::ChannelNotSupported(channel))
            }
        }
    }

    /// Returns the property to draft. Per-language results and channels are
    /// cleared; the ids of external posts already made are kept.
    pub async fn unpublish(
        &self,
        agent_id: &AgentId,
        property_id: &PropertyId,
    ) -> Result<UnpublishOutcome, PublishingError> {
        let lock = self.locks.handle(property_id)?;
        let result = {
            let _serialized = lock.lock().await;
            self.unpublish_serialized(agent_id, property_id)
        };
        self.locks.release(property_id, lock);
        result
    }

    fn unpublish_serialized(
        &self,
        agent_id: &AgentId,
        property_id: &PropertyId,
    ) -> Result<UnpublishOutcome, PublishingError> {
        let mut property = self.owned_property(agent_id, property_id)?;
        property.publishing_status = PublishingStatus::Draft;
        property.published_at = None;
        property.published_channels.clear();
        property.language_status.clear();
        property.channel_results.clear();

        let stored = self.store.update_property(property)?;
        info!(property_id = %stored.id.0, "property unpublished");
        Ok(UnpublishOutcome {
            property_id: stored.id,
            status: stored.publishing_status,
        })
    }

    pub fn get_status(&self, property_id: &PropertyId) -> Result<PublishingSnapshot, PublishingError> {
        Ok(self.require_property(property_id)?.snapshot())
    }

    /// Agent profile plus published listings only.
    pub fn public_profile(&self, slug: &str) -> Result<AgentPublicProfile, PublishingError> {
        let agent = self
            .store
            .fetch_agent_by_slug(slug)?
            .filter(|agent| agent.is_public)
            .ok_or_else(|| PublishingError::not_found("agent", slug))?;

        let languages = self
            .store
            .fetch_preferences(&agent.id)?
            .map(|preference| preference.languages())
            .unwrap_or_default();
        let properties = self
            .store
            .properties_for_agent(&agent.id)?
            .iter()
            .filter(|property| property.is_published())
            .map(Property::public_view)
            .collect();

        Ok(AgentPublicProfile {
            agent_id: agent.id,
            name: agent.name,
            slug: agent.slug,
            bio: agent.bio,
            email: agent.email,
            phone: agent.phone,
            languages,
            properties,
        })
    }

    /// Replaces the agent's stored preference wholesale.
    pub fn set_preferences(
        &self,
        agent_id: &AgentId,
        update: PreferenceUpdate,
    ) -> Result<AgentLanguagePreference, PublishingError> {
        update.validate()?;
        self.require_agent(agent_id)?;
        let preference = AgentLanguagePreference {
            agent_id: agent_id.clone(),
            primary_language: update.primary_language,
            secondary_languages: update.secondary_languages,
            facebook_page_mappings: update.facebook_page_mappings,
            auto_translate_enabled: update.auto_translate_enabled,
            updated_at: Utc::now(),
        };
        Ok(self.store.upsert_preferences(preference)?)
    }

    pub fn get_preferences(
        &self,
        agent_id: &AgentId,
    ) -> Result<AgentLanguagePreference, PublishingError> {
        self.store
            .fetch_preferences(agent_id)?
            .ok_or_else(|| PublishingError::not_found("language preferences", &agent_id.0))
    }

    pub fn register_agent(&self, registration: AgentRegistration) -> Result<Agent, PublishingError> {
        let name = registration.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }
        let slug = slugify(registration.slug.as_deref().unwrap_or(name));
        if slug.is_empty() {
            return Err(ValidationError::Invalid(
                "slug must contain at least one letter or digit".to_string(),
            )
            .into());
        }

        let agent = Agent {
            id: AgentId::generate(),
            name: name.to_string(),
            slug,
            email: registration.email,
            phone: registration.phone,
            bio: registration.bio,
            is_public: registration.is_public,
            facebook_pages: Vec::new(),
            created_at: Utc::now(),
            version: 0,
        };
        let stored = self.store.insert_agent(agent).map_err(|err| match err {
            RepositoryError::Conflict => PublishingError::Conflict("agent slug already taken".to_string()),
            other => other.into(),
        })?;
        info!(agent_id = %stored.id.0, slug = %stored.slug, "agent registered");
        Ok(stored)
    }

    pub fn get_agent(&self, agent_id: &AgentId) -> Result<Agent, PublishingError> {
        self.require_agent(agent_id)
    }

    /// Registers page tokens obtained outside the OAuth flow.
    pub fn connect_pages(
        &self,
        agent_id: &AgentId,
        pages: Vec<PageConnectionPayload>,
    ) -> Result<Vec<FacebookPageConnection>, PublishingError> {
        let now = Utc::now();
        let mut connections = Vec::with_capacity(pages.len());
        for page in pages {
            let page_id = page.page_id.trim().to_string();
            if page_id.is_empty() {
                return Err(ValidationError::MissingField("page_id").into());
            }
            if page.access_token.trim().is_empty() {
                return Err(ValidationError::MissingField("access_token").into());
            }
            connections.push(FacebookPageConnection {
                page_name: page.page_name.unwrap_or_else(|| page_id.clone()),
                page_id: FacebookPageId(page_id),
                access_token: page.access_token,
                connected_at: now,
            });
        }
        self.store_connections(agent_id, connections)
    }

    pub fn facebook_pages(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<FacebookPageConnection>, PublishingError> {
        Ok(self.require_agent(agent_id)?.facebook_pages)
    }

    /// Dialog URL carrying a fresh single-use `state` bound to the agent.
    pub fn facebook_authorization_url(&self, agent_id: &AgentId) -> Result<String, PublishingError> {
        self.require_agent(agent_id)?;
        let state = self.oauth_states.issue(agent_id)?;
        self.facebook.authorization_url(&state).map_err(|err| {
            let _ = self.oauth_states.consume(&state);
            err.into()
        })
    }

    /// Completes the OAuth callback. `state` must be one issued by
    /// [`Self::facebook_authorization_url`] and is spent even if the exchange fails.
    pub async fn complete_facebook_oauth(
        &self,
        code: &str,
        state: &str,
    ) -> Result<Vec<FacebookPageConnection>, PublishingError> {
        if code.trim().is_empty() {
            return Err(ValidationError::MissingField("code").into());
        }
        let agent_id = self.oauth_states.consume(state)?;
        self.require_agent(&agent_id)?;

        let pages = self.facebook.exchange_code(code).await?;
        let now = Utc::now();
        let connections = pages
            .into_iter()
            .map(|page| FacebookPageConnection {
                page_id: FacebookPageId(page.id),
                page_name: page.name,
                access_token: page.access_token,
                connected_at: now,
            })
            .collect();
        let stored = self.store_connections(&agent_id, connections)?;
        info!(agent_id = %agent_id.0, pages = stored.len(), "facebook pages connected");
        Ok(stored)
    }

    pub fn create_property(
        &self,
        agent_id: &AgentId,
        draft: PropertyDraft,
    ) -> Result<Property, PublishingError> {
        draft.validate()?;
        self.require_agent(agent_id)?;
        let property = Property::new_draft(agent_id.clone(), draft, Utc::now());
        Ok(self.store.insert_property(property)?)
    }

    pub fn get_property(&self, property_id: &PropertyId) -> Result<Property, PublishingError> {
        self.require_property(property_id)
    }

    pub fn agent_properties(&self, agent_id: &AgentId) -> Result<Vec<Property>, PublishingError> {
        self.require_agent(agent_id)?;
        Ok(self.store.properties_for_agent(agent_id)?)
    }

    /// Creates one draft per CSV row. Nothing is stored if any row is invalid.
    pub fn import_properties<R: Read>(
        &self,
        agent_id: &AgentId,
        reader: R,
    ) -> Result<Vec<Property>, PublishingError> {
        self.require_agent(agent_id)?;
        let drafts = parse_property_rows(reader)?;
        let now = Utc::now();
        drafts
            .into_iter()
            .map(|draft| {
                let property = Property::new_draft(agent_id.clone(), draft, now);
                self.store.insert_property(property).map_err(PublishingError::from)
            })
            .collect()
    }

    /// Merges connections into the stored agent, re-reading on a lost
    /// version race.
    fn store_connections(
        &self,
        agent_id: &AgentId,
        connections: Vec<FacebookPageConnection>,
    ) -> Result<Vec<FacebookPageConnection>, PublishingError> {
        let mut attempt = 1;
        loop {
            let mut agent = self.require_agent(agent_id)?;
            agent.connect_pages(connections.clone());
            match self.store.update_agent(agent) {
                Ok(stored) => return Ok(stored.facebook_pages),
                Err(RepositoryError::StaleVersion { .. }) if attempt < AGENT_WRITE_ATTEMPTS => {
                    debug!(agent_id = %agent_id.0, attempt, "agent changed concurrently, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn require_agent(&self, agent_id: &AgentId) -> Result<Agent, PublishingError> {
        self.store
            .fetch_agent(agent_id)?
            .ok_or_else(|| PublishingError::not_found("agent", &agent_id.0))
    }

    fn require_property(&self, property_id: &PropertyId) -> Result<Property, PublishingError> {
        self.store
            .fetch_property(property_id)?
            .ok_or_else(|| PublishingError::not_found("property", &property_id.0))
    }

    /// Another agent's property is reported as missing.
    fn owned_property(
        &self,
        agent_id: &AgentId,
        property_id: &PropertyId,
    ) -> Result<Property, PublishingError> {
        let property = self.require_property(property_id)?;
        if &property.agent_id != agent_id {
            return Err(PublishingError::not_found("property", &property_id.0));
        }
        Ok(property)
    }
}

/// Explicit request mapping wins over the agent's stored mapping.
fn resolve_page(
    request: &PublishingRequest,
    preferences: Option<&AgentLanguagePreference>,
    language: LanguageCode,
) -> Option<FacebookPageId> {
    request
        .facebook_page_mappings
        .get(&language)
        .or_else(|| preferences.and_then(|preference| preference.page_for(language)))
        .cloned()
}

pub(crate) fn slugify(name: &str) -> String {
    let mut slug = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.trim_matches('-').to_string()
}

/// Error raised by the publishing service.
#[derive(Debug, thiserror::Error)]
pub enum PublishingError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Import(#[from] PropertyImportError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Facebook(#[from] FacebookError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl PublishingError {
    fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<RepositoryError> for PublishingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict | RepositoryError::StaleVersion { .. } => {
                Self::Conflict(err.to_string())
            }
            other => Self::Repository(other),
        }
    }
}
