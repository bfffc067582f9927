use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AgentId, AgentRegistration, PageConnectionPayload, PreferencePayload, PreferenceUpdate,
    PropertyDraft, PropertyId, PublishPayload, PublishingRequest, ValidationError,
};
use super::facebook::{FacebookError, FacebookGateway};
use super::registry::{supported_channels, supported_languages};
use super::repository::{PublishingStore, RepositoryError};
use super::service::{PublishingError, PublishingService};

/// Header naming the authenticated agent on owner-only routes. Authentication
/// itself happens upstream.
pub const AGENT_HEADER: &str = "x-agent-id";

type SharedService<S, F> = Arc<PublishingService<S, F>>;

/// Router builder exposing the publishing workflow over HTTP.
pub fn publishing_router<S, F>(service: SharedService<S, F>) -> Router
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    Router::new()
        .route("/languages/supported", get(languages_handler))
        .route("/channels/supported", get(channels_handler))
        .route("/agents", post(register_agent_handler::<S, F>))
        .route("/agents/:agent_id", get(agent_handler::<S, F>))
        .route(
            "/agents/:agent_id/language-preferences",
            put(set_preferences_handler::<S, F>).get(get_preferences_handler::<S, F>),
        )
        .route(
            "/agents/:agent_id/facebook-pages",
            put(connect_pages_handler::<S, F>).get(list_pages_handler::<S, F>),
        )
        .route(
            "/agents/:agent_id/properties",
            get(agent_properties_handler::<S, F>),
        )
        .route(
            "/agents/:agent_id/properties/import",
            post(import_properties_handler::<S, F>),
        )
        .route("/agent-public/:slug", get(public_profile_handler::<S, F>))
        .route(
            "/facebook/oauth/authorize",
            get(oauth_authorize_handler::<S, F>),
        )
        .route(
            "/facebook/oauth/callback",
            get(oauth_callback_handler::<S, F>),
        )
        .route("/properties", post(create_property_handler::<S, F>))
        .route(
            "/properties/:property_id",
            get(property_handler::<S, F>),
        )
        .route(
            "/properties/:property_id/publish",
            post(publish_handler::<S, F>),
        )
        .route(
            "/properties/:property_id/unpublish",
            post(unpublish_handler::<S, F>),
        )
        .route(
            "/properties/:property_id/status",
            get(status_handler::<S, F>),
        )
        .with_state(service)
}

pub(crate) fn error_response(err: PublishingError) -> Response {
    let status = match &err {
        PublishingError::NotFound { .. } => StatusCode::NOT_FOUND,
        PublishingError::Validation(_) | PublishingError::Import(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PublishingError::Conflict(_) => StatusCode::CONFLICT,
        PublishingError::Facebook(FacebookError::NotConfigured(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PublishingError::Facebook(_) => StatusCode::BAD_GATEWAY,
        PublishingError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        PublishingError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, PublishingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

fn requesting_agent(headers: &HeaderMap) -> Result<AgentId, PublishingError> {
    headers
        .get(AGENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| AgentId(value.to_string()))
        .ok_or(PublishingError::Validation(ValidationError::MissingField(
            "x-agent-id header",
        )))
}

pub(crate) async fn languages_handler() -> Response {
    Json(supported_languages()).into_response()
}

pub(crate) async fn channels_handler() -> Response {
    Json(supported_channels()).into_response()
}

pub(crate) async fn register_agent_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Json(registration): Json<AgentRegistration>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(StatusCode::CREATED, service.register_agent(registration))
}

pub(crate) async fn agent_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(agent_id): Path<String>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(StatusCode::OK, service.get_agent(&AgentId(agent_id)))
}

pub(crate) async fn set_preferences_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(agent_id): Path<String>,
    Json(payload): Json<PreferencePayload>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    let result = PreferenceUpdate::from_payload(payload)
        .map_err(PublishingError::from)
        .and_then(|update| service.set_preferences(&AgentId(agent_id), update));
    respond(StatusCode::OK, result)
}

pub(crate) async fn get_preferences_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(agent_id): Path<String>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(StatusCode::OK, service.get_preferences(&AgentId(agent_id)))
}

pub(crate) async fn connect_pages_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(agent_id): Path<String>,
    Json(pages): Json<Vec<PageConnectionPayload>>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(
        StatusCode::OK,
        service.connect_pages(&AgentId(agent_id), pages),
    )
}

pub(crate) async fn list_pages_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(agent_id): Path<String>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(StatusCode::OK, service.facebook_pages(&AgentId(agent_id)))
}

pub(crate) async fn agent_properties_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(agent_id): Path<String>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(StatusCode::OK, service.agent_properties(&AgentId(agent_id)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportRequest {
    pub(crate) csv: String,
}

pub(crate) async fn import_properties_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(agent_id): Path<String>,
    Json(request): Json<ImportRequest>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    let result = service
        .import_properties(&AgentId(agent_id), request.csv.as_bytes())
        .map(|properties| {
            json!({
                "imported": properties.len(),
                "properties": properties,
            })
        });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn public_profile_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(slug): Path<String>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(StatusCode::OK, service.public_profile(&slug))
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorizeQuery {
    pub(crate) agent_id: String,
}

pub(crate) async fn oauth_authorize_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    let result = service
        .facebook_authorization_url(&AgentId(query.agent_id))
        .map(|url| json!({ "authorization_url": url }));
    respond(StatusCode::OK, result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct OAuthCallbackQuery {
    #[serde(default)]
    pub(crate) code: Option<String>,
    #[serde(default)]
    pub(crate) state: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) error_description: Option<String>,
}

pub(crate) async fn oauth_callback_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    if let Some(error) = query.error {
        let detail = query.error_description.unwrap_or(error);
        return error_response(
            ValidationError::Invalid(format!("facebook authorization denied: {detail}")).into(),
        );
    }
    let (Some(code), Some(state)) = (query.code, query.state) else {
        return error_response(ValidationError::MissingField("code and state").into());
    };

    let result = service
        .complete_facebook_oauth(&code, &state)
        .await
        .map(|pages| json!({ "connected_pages": pages }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn create_property_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    headers: HeaderMap,
    Json(draft): Json<PropertyDraft>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    let result = requesting_agent(&headers).and_then(|agent| service.create_property(&agent, draft));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn property_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(property_id): Path<String>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(StatusCode::OK, service.get_property(&PropertyId(property_id)))
}

pub(crate) async fn publish_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<PublishPayload>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    let agent = match requesting_agent(&headers) {
        Ok(agent) => agent,
        Err(err) => return error_response(err),
    };
    let request = match PublishingRequest::from_payload(PropertyId(property_id), payload) {
        Ok(request) => request,
        Err(err) => return error_response(err.into()),
    };
    respond(StatusCode::OK, service.publish(&agent, request).await)
}

pub(crate) async fn unpublish_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    let agent = match requesting_agent(&headers) {
        Ok(agent) => agent,
        Err(err) => return error_response(err),
    };
    respond(
        StatusCode::OK,
        service.unpublish(&agent, &PropertyId(property_id)).await,
    )
}

pub(crate) async fn status_handler<S, F>(
    State(service): State<SharedService<S, F>>,
    Path(property_id): Path<String>,
) -> Response
where
    S: PublishingStore + 'static,
    F: FacebookGateway + 'static,
{
    respond(StatusCode::OK, service.get_status(&PropertyId(property_id)))
}
