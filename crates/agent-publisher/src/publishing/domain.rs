use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registry::{ChannelId, LanguageCode, UnknownCode};

/// Identifier wrapper for agent accounts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

/// Identifier wrapper for property listings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacebookPageId(pub String);

/// Post identifier handed back by the Graph API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalPostId(pub String);

impl AgentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl PropertyId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Lifecycle state controlling public visibility of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishingStatus {
    #[default]
    Draft,
    Published,
}

impl PublishingStatus {
    pub fn label(self) -> &'static str {
        match self {
            PublishingStatus::Draft => "draft",
            PublishingStatus::Published => "published",
        }
    }
}

/// Outcome recorded for one language after a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerLanguageStatus {
    Pending,
    Published,
    Failed,
    NotSupported,
    Unknown,
}

impl PerLanguageStatus {
    pub fn label(self) -> &'static str {
        match self {
            PerLanguageStatus::Pending => "pending",
            PerLanguageStatus::Published => "published",
            PerLanguageStatus::Failed => "failed",
            PerLanguageStatus::NotSupported => "not_supported",
            PerLanguageStatus::Unknown => "unknown",
        }
    }

    fn rank(self) -> u8 {
        match self {
            PerLanguageStatus::Unknown => 0,
            PerLanguageStatus::Pending => 1,
            PerLanguageStatus::NotSupported => 2,
            PerLanguageStatus::Failed => 3,
            PerLanguageStatus::Published => 4,
        }
    }

    /// Combines the outcomes of two channels for the same language. A language
    /// counts as published as soon as one channel published it.
    pub fn merge(self, other: PerLanguageStatus) -> PerLanguageStatus {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Localized copy of a listing's headline content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyTranslation {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Listing data supplied by the agent when a property is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub bedrooms: Option<u8>,
    #[serde(default)]
    pub bathrooms: Option<f32>,
    #[serde(default)]
    pub area_sqft: Option<u32>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub translations: BTreeMap<LanguageCode, PropertyTranslation>,
}

impl PropertyDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::Invalid(format!(
                "price must be a non-negative amount, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

/// Persisted listing record including its publishing state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: PropertyId,
    pub agent_id: AgentId,
    #[serde(flatten)]
    pub listing: PropertyDraft,
    pub created_at: DateTime<Utc>,
    pub publishing_status: PublishingStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub published_channels: BTreeSet<ChannelId>,
    pub language_status: BTreeMap<LanguageCode, PerLanguageStatus>,
    pub channel_results: BTreeMap<ChannelId, BTreeMap<LanguageCode, PerLanguageStatus>>,
    pub facebook_posts: BTreeMap<LanguageCode, ExternalPostId>,
    pub auto_translate: bool,
    pub version: u64,
}

impl Property {
    pub fn new_draft(agent_id: AgentId, listing: PropertyDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: PropertyId::generate(),
            agent_id,
            listing,
            created_at: now,
            publishing_status: PublishingStatus::Draft,
            published_at: None,
            published_channels: BTreeSet::new(),
            language_status: BTreeMap::new(),
            channel_results: BTreeMap::new(),
            facebook_posts: BTreeMap::new(),
            auto_translate: false,
            version: 0,
        }
    }

    pub fn is_published(&self) -> bool {
        self.publishing_status == PublishingStatus::Published
    }

    pub fn title_for(&self, language: LanguageCode) -> &str {
        self.listing
            .translations
            .get(&language)
            .map(|translation| translation.title.as_str())
            .unwrap_or(&self.listing.title)
    }

    pub fn description_for(&self, language: LanguageCode) -> &str {
        self.listing
            .translations
            .get(&language)
            .and_then(|translation| translation.description.as_deref())
            .unwrap_or(&self.listing.description)
    }

    pub fn snapshot(&self) -> PublishingSnapshot {
        PublishingSnapshot {
            property_id: self.id.clone(),
            publishing_status: self.publishing_status,
            published_at: self.published_at,
            published_channels: self.published_channels.clone(),
            language_status: self.language_status.clone(),
            facebook_posts: self.facebook_posts.clone(),
            channel_results: self.channel_results.clone(),
            auto_translate: self.auto_translate,
        }
    }

    pub fn public_view(&self) -> PublicListing {
        PublicListing {
            id: self.id.clone(),
            title: self.listing.title.clone(),
            description: self.listing.description.clone(),
            price: self.listing.price,
            location: self.listing.location.clone(),
            bedrooms: self.listing.bedrooms,
            bathrooms: self.listing.bathrooms,
            area_sqft: self.listing.area_sqft,
            property_type: self.listing.property_type.clone(),
            images: self.listing.images.clone(),
            translations: self.listing.translations.clone(),
            published_at: self.published_at,
            published_channels: self.published_channels.clone(),
        }
    }
}

/// Publishing state returned by publish and status reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishingSnapshot {
    pub property_id: PropertyId,
    pub publishing_status: PublishingStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub published_channels: BTreeSet<ChannelId>,
    pub language_status: BTreeMap<LanguageCode, PerLanguageStatus>,
    pub facebook_posts: BTreeMap<LanguageCode, ExternalPostId>,
    pub channel_results: BTreeMap<ChannelId, BTreeMap<LanguageCode, PerLanguageStatus>>,
    pub auto_translate: bool,
}

/// Listing as exposed on an agent's public website.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicListing {
    pub id: PropertyId,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<f32>,
    pub area_sqft: Option<u32>,
    pub property_type: Option<String>,
    pub images: Vec<String>,
    pub translations: BTreeMap<LanguageCode, PropertyTranslation>,
    pub published_at: Option<DateTime<Utc>>,
    pub published_channels: BTreeSet<ChannelId>,
}

/// Raw publish body as received over HTTP; codes are validated into a
/// [`PublishingRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishPayload {
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub target_languages: Vec<String>,
    #[serde(default)]
    pub publishing_channels: Vec<String>,
    #[serde(default)]
    pub facebook_page_mappings: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub auto_translate: bool,
}

/// Validated publish request.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishingRequest {
    pub property_id: PropertyId,
    pub target_languages: Vec<LanguageCode>,
    pub channels: Vec<ChannelId>,
    pub facebook_page_mappings: BTreeMap<LanguageCode, FacebookPageId>,
    pub auto_translate: bool,
}

impl PublishingRequest {
    pub fn new(
        property_id: PropertyId,
        target_languages: Vec<LanguageCode>,
        channels: Vec<ChannelId>,
    ) -> Self {
        Self {
            property_id,
            target_languages,
            channels,
            facebook_page_mappings: BTreeMap::new(),
            auto_translate: false,
        }
    }

    pub fn with_page(mut self, language: LanguageCode, page_id: &str) -> Self {
        self.facebook_page_mappings
            .insert(language, FacebookPageId(page_id.to_string()));
        self
    }

    /// Validates the raw payload for the property addressed by the route.
    pub fn from_payload(
        property_id: PropertyId,
        payload: PublishPayload,
    ) -> Result<Self, ValidationError> {
        if let Some(body_id) = payload.property_id.as_deref() {
            if !body_id.is_empty() && body_id != property_id.0 {
                return Err(ValidationError::PropertyMismatch {
                    path: property_id.0,
                    body: body_id.to_string(),
                });
            }
        }

        let target_languages = parse_codes::<LanguageCode>(&payload.target_languages)?;
        let channels = parse_codes::<ChannelId>(&payload.publishing_channels)?;

        let mut facebook_page_mappings = BTreeMap::new();
        for (language, page) in payload.facebook_page_mappings.unwrap_or_default() {
            let language = language.parse::<LanguageCode>()?;
            let page = page.trim();
            if !page.is_empty() {
                facebook_page_mappings.insert(language, FacebookPageId(page.to_string()));
            }
        }

        let request = Self {
            property_id,
            target_languages,
            channels,
            facebook_page_mappings,
            auto_translate: payload.auto_translate,
        };
        request.validate()?;
        Ok(request)
    }

    /// Rejects empty target lists.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.target_languages.is_empty() {
            return Err(ValidationError::EmptyLanguages);
        }
        if self.channels.is_empty() {
            return Err(ValidationError::EmptyChannels);
        }
        Ok(())
    }

    /// Targets with duplicates collapsed, keeping first-seen order.
    pub(crate) fn normalized_targets(&self) -> (Vec<LanguageCode>, Vec<ChannelId>) {
        (dedup(&self.target_languages), dedup(&self.channels))
    }
}

fn dedup<T: Copy + PartialEq>(items: &[T]) -> Vec<T> {
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(*item);
        }
    }
    unique
}

fn parse_codes<T>(raw: &[String]) -> Result<Vec<T>, ValidationError>
where
    T: std::str::FromStr<Err = UnknownCode>,
{
    raw.iter()
        .map(|code| code.parse::<T>().map_err(ValidationError::from))
        .collect()
}

/// Agent-wide language targeting and page routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLanguagePreference {
    pub agent_id: AgentId,
    pub primary_language: LanguageCode,
    pub secondary_languages: Vec<LanguageCode>,
    pub facebook_page_mappings: BTreeMap<LanguageCode, FacebookPageId>,
    pub auto_translate_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl AgentLanguagePreference {
    pub fn page_for(&self, language: LanguageCode) -> Option<&FacebookPageId> {
        self.facebook_page_mappings.get(&language)
    }

    /// Primary language followed by the secondaries, in configured order.
    pub fn languages(&self) -> Vec<LanguageCode> {
        let mut languages = vec![self.primary_language];
        languages.extend(self.secondary_languages.iter().copied());
        languages
    }
}

/// Raw preference body as received over HTTP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencePayload {
    pub primary_language: String,
    #[serde(default)]
    pub secondary_languages: Vec<String>,
    #[serde(default)]
    pub facebook_page_mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub auto_translate_enabled: bool,
}

/// Validated replacement for an agent's stored preference.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceUpdate {
    pub primary_language: LanguageCode,
    pub secondary_languages: Vec<LanguageCode>,
    pub facebook_page_mappings: BTreeMap<LanguageCode, FacebookPageId>,
    pub auto_translate_enabled: bool,
}

impl PreferenceUpdate {
    pub fn from_payload(payload: PreferencePayload) -> Result<Self, ValidationError> {
        let primary_language = payload.primary_language.parse::<LanguageCode>()?;
        let secondary_languages = parse_codes::<LanguageCode>(&payload.secondary_languages)?;
        let mut facebook_page_mappings = BTreeMap::new();
        for (language, page) in payload.facebook_page_mappings {
            let language = language.parse::<LanguageCode>()?;
            let page = page.trim();
            if !page.is_empty() {
                facebook_page_mappings.insert(language, FacebookPageId(page.to_string()));
            }
        }

        let update = Self {
            primary_language,
            secondary_languages: dedup(&secondary_languages),
            facebook_page_mappings,
            auto_translate_enabled: payload.auto_translate_enabled,
        };
        update.validate()?;
        Ok(update)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.secondary_languages.contains(&self.primary_language) {
            return Err(ValidationError::PrimaryInSecondaries(self.primary_language));
        }
        Ok(())
    }
}

/// Facebook page the agent granted access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacebookPageConnection {
    pub page_id: FacebookPageId,
    pub page_name: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub connected_at: DateTime<Utc>,
}

/// Agent account and public profile data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub slug: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_public: bool,
    pub facebook_pages: Vec<FacebookPageConnection>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Agent {
    pub fn page_connection(&self, page_id: &FacebookPageId) -> Option<&FacebookPageConnection> {
        self.facebook_pages
            .iter()
            .find(|connection| &connection.page_id == page_id)
    }

    /// Replaces connections for the given pages and keeps the others.
    pub fn connect_pages(&mut self, connections: Vec<FacebookPageConnection>) {
        for connection in connections {
            match self
                .facebook_pages
                .iter_mut()
                .find(|existing| existing.page_id == connection.page_id)
            {
                Some(existing) => *existing = connection,
                None => self.facebook_pages.push(connection),
            }
        }
    }
}

/// Body accepted when an agent account is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

/// Page connection submitted manually rather than through OAuth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConnectionPayload {
    pub page_id: String,
    #[serde(default)]
    pub page_name: Option<String>,
    pub access_token: String,
}

/// Public website projection of an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPublicProfile {
    pub agent_id: AgentId,
    pub name: String,
    pub slug: String,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub languages: Vec<LanguageCode>,
    pub properties: Vec<PublicListing>,
}

/// Request-level validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("target_languages must contain at least one language")]
    EmptyLanguages,
    #[error("publishing_channels must contain at least one channel")]
    EmptyChannels,
    #[error(transparent)]
    UnknownCode(#[from] UnknownCode),
    #[error("body property_id '{body}' does not match route property '{path}'")]
    PropertyMismatch { path: String, body: String },
    #[error("primary language '{0}' cannot also be listed as a secondary language")]
    PrimaryInSecondaries(LanguageCode),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0}")]
    Invalid(String),
}
