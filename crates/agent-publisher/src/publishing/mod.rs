//! Listing publishing workflow.
//!
//! A property starts as a draft and is published to a set of target
//! languages across the agent website and Facebook. Each (language, channel)
//! pair is attempted once; outcomes land in the property's per-language status
//! map instead of failing the request. The public website projection only ever
//! shows published properties.

pub mod domain;
pub mod facebook;
pub mod import;
pub mod memory;
pub mod message;
pub mod registry;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Agent, AgentId, AgentLanguagePreference, AgentPublicProfile, AgentRegistration,
    ExternalPostId, FacebookPageConnection, FacebookPageId, PageConnectionPayload,
    PerLanguageStatus, PreferencePayload, PreferenceUpdate, Property, PropertyDraft, PropertyId,
    PropertyTranslation, PublicListing, PublishPayload, PublishingRequest, PublishingSnapshot,
    PublishingStatus, ValidationError,
};
pub use facebook::{FacebookError, FacebookGateway, GraphApiClient, ManagedPage, PagePost};
pub use import::{parse_property_rows, PropertyImportError};
pub use memory::InMemoryStore;
pub use registry::{supported_channels, supported_languages, ChannelId, LanguageCode};
pub use repository::{
    AgentRepository, PreferenceRepository, PropertyRepository, PublishingStore, RepositoryError,
};
pub use router::{publishing_router, AGENT_HEADER};
pub use service::{PublishFailure, PublishingError, PublishingService, UnpublishOutcome};
