use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use agent_publisher::publishing::{
    publishing_router, AgentId, AgentRegistration, ChannelId, ExternalPostId, FacebookError,
    FacebookGateway, FacebookPageId, InMemoryStore, LanguageCode, ManagedPage,
    PageConnectionPayload, PagePost, PerLanguageStatus, PreferenceUpdate, PropertyDraft,
    PropertyTranslation, PublishingRequest, PublishingService, PublishingStatus, AGENT_HEADER,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Default)]
struct FakeGraph {
    posts: Mutex<Vec<PagePost>>,
    rejected_pages: Vec<String>,
}

impl FakeGraph {
    fn rejecting(page: &str) -> Self {
        Self {
            rejected_pages: vec![page.to_string()],
            ..Self::default()
        }
    }

    fn posted_pages(&self) -> Vec<String> {
        self.posts
            .lock()
            .expect("posts mutex")
            .iter()
            .map(|post| post.page_id.0.clone())
            .collect()
    }
}

#[async_trait]
impl FacebookGateway for FakeGraph {
    async fn publish_post(&self, post: &PagePost) -> Result<ExternalPostId, FacebookError> {
        self.posts.lock().expect("posts mutex").push(post.clone());
        if self.rejected_pages.contains(&post.page_id.0) {
            return Err(FacebookError::Api {
                status: 403,
                body: "page token revoked".to_string(),
            });
        }
        Ok(ExternalPostId(format!("{}_post", post.page_id.0)))
    }

    fn authorization_url(&self, _state: &str) -> Result<String, FacebookError> {
        Err(FacebookError::NotConfigured("FB_APP_ID"))
    }

    async fn exchange_code(&self, _code: &str) -> Result<Vec<ManagedPage>, FacebookError> {
        Err(FacebookError::NotConfigured("FB_APP_ID"))
    }
}

type Service = PublishingService<InMemoryStore, FakeGraph>;

fn listing(title: &str) -> PropertyDraft {
    let mut translations = BTreeMap::new();
    translations.insert(
        LanguageCode::Hi,
        PropertyTranslation {
            title: "समुद्र के सामने 2BHK".to_string(),
            description: None,
        },
    );
    PropertyDraft {
        title: title.to_string(),
        description: "Corner flat with a balcony".to_string(),
        price: 8_500_000.0,
        location: "Bandra West, Mumbai".to_string(),
        bedrooms: Some(2),
        bathrooms: Some(2.0),
        area_sqft: Some(950),
        property_type: Some("apartment".to_string()),
        images: vec!["https://img.example/bandra-1.jpg".to_string()],
        translations,
    }
}

/// Public agent with pages for en and hi; mr has no page mapping.
fn onboard(service: &Service) -> AgentId {
    let agent = service
        .register_agent(AgentRegistration {
            name: "Anita Desai".to_string(),
            is_public: true,
            ..AgentRegistration::default()
        })
        .expect("agent registers");
    service
        .connect_pages(
            &agent.id,
            vec![
                PageConnectionPayload {
                    page_id: "fb-en".to_string(),
                    page_name: Some("Anita Homes".to_string()),
                    access_token: "token-en".to_string(),
                },
                PageConnectionPayload {
                    page_id: "fb-hi".to_string(),
                    page_name: None,
                    access_token: "token-hi".to_string(),
                },
            ],
        )
        .expect("pages connect");

    let mut mappings = BTreeMap::new();
    mappings.insert(LanguageCode::En, FacebookPageId("fb-en".to_string()));
    mappings.insert(LanguageCode::Hi, FacebookPageId("fb-hi".to_string()));
    service
        .set_preferences(
            &agent.id,
            PreferenceUpdate {
                primary_language: LanguageCode::En,
                secondary_languages: vec![LanguageCode::Hi, LanguageCode::Mr],
                facebook_page_mappings: mappings,
                auto_translate_enabled: false,
            },
        )
        .expect("preferences saved");
    agent.id
}

#[tokio::test]
async fn draft_to_published_and_back() {
    let graph = Arc::new(FakeGraph::default());
    let service = Service::new(Arc::new(InMemoryStore::default()), graph.clone());
    let agent_id = onboard(&service);
    let property = service
        .create_property(&agent_id, listing("Sea-facing 2BHK"))
        .expect("draft created");

    let profile = service.public_profile("anita-desai").expect("profile");
    assert!(profile.properties.is_empty());
    assert_eq!(
        profile.languages,
        vec![LanguageCode::En, LanguageCode::Hi, LanguageCode::Mr]
    );

    let request = PublishingRequest::new(
        property.id.clone(),
        vec![LanguageCode::En, LanguageCode::Hi, LanguageCode::Mr],
        vec![ChannelId::Website, ChannelId::Facebook],
    );
    let snapshot = service
        .publish(&agent_id, request)
        .await
        .expect("publish completes");

    assert_eq!(snapshot.publishing_status, PublishingStatus::Published);
    assert_eq!(
        snapshot.language_status.get(&LanguageCode::Mr),
        Some(&PerLanguageStatus::Published)
    );
    assert_eq!(
        snapshot.channel_results[&ChannelId::Facebook][&LanguageCode::Mr],
        PerLanguageStatus::NotSupported
    );
    assert_eq!(snapshot.facebook_posts.len(), 2);
    assert_eq!(graph.posted_pages(), vec!["fb-en", "fb-hi"]);

    let profile = service.public_profile("anita-desai").expect("profile");
    assert_eq!(profile.properties.len(), 1);
    assert_eq!(profile.properties[0].id, property.id);

    service
        .unpublish(&agent_id, &property.id)
        .await
        .expect("unpublish");
    let profile = service.public_profile("anita-desai").expect("profile");
    assert!(profile.properties.is_empty());

    let status = service.get_status(&property.id).expect("status");
    assert_eq!(status.publishing_status, PublishingStatus::Draft);
    assert!(status.published_channels.is_empty());
    assert_eq!(status.facebook_posts.len(), 2);
}

#[tokio::test]
async fn rejected_page_is_reported_without_failing_publish() {
    let graph = Arc::new(FakeGraph::rejecting("fb-hi"));
    let service = Service::new(Arc::new(InMemoryStore::default()), graph);
    let agent_id = onboard(&service);
    let property = service
        .create_property(&agent_id, listing("Garden villa"))
        .expect("draft created");

    let snapshot = service
        .publish(
            &agent_id,
            PublishingRequest::new(
                property.id.clone(),
                vec![LanguageCode::En, LanguageCode::Hi],
                vec![ChannelId::Facebook],
            ),
        )
        .await
        .expect("publish completes");

    assert_eq!(snapshot.publishing_status, PublishingStatus::Published);
    assert_eq!(snapshot.language_status[&LanguageCode::En], PerLanguageStatus::Published);
    assert_eq!(snapshot.language_status[&LanguageCode::Hi], PerLanguageStatus::Failed);
    assert!(snapshot.published_channels.contains(&ChannelId::Facebook));
    assert!(!snapshot.facebook_posts.contains_key(&LanguageCode::Hi));
}

#[tokio::test]
async fn unmapped_language_never_reaches_facebook() {
    let graph = Arc::new(FakeGraph::default());
    let service = Service::new(Arc::new(InMemoryStore::default()), graph.clone());
    let agent_id = onboard(&service);
    let property = service
        .create_property(&agent_id, listing("Studio near station"))
        .expect("draft created");

    let snapshot = service
        .publish(
            &agent_id,
            PublishingRequest::new(
                property.id.clone(),
                vec![LanguageCode::Mr, LanguageCode::Gu],
                vec![ChannelId::Facebook],
            ),
        )
        .await
        .expect("publish completes");

    assert!(graph.posted_pages().is_empty());
    assert_eq!(snapshot.language_status[&LanguageCode::Mr], PerLanguageStatus::NotSupported);
    assert_eq!(snapshot.language_status[&LanguageCode::Gu], PerLanguageStatus::NotSupported);
    assert!(snapshot.published_channels.is_empty());
    assert_eq!(snapshot.publishing_status, PublishingStatus::Published);
}

#[tokio::test]
async fn republishing_yields_the_same_statuses() {
    let service = Service::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(FakeGraph::default()),
    );
    let agent_id = onboard(&service);
    let property = service
        .create_property(&agent_id, listing("Hillside bungalow"))
        .expect("draft created");
    let request = PublishingRequest::new(
        property.id.clone(),
        vec![LanguageCode::En, LanguageCode::Mr],
        vec![ChannelId::Website, ChannelId::Facebook, ChannelId::Linkedin],
    );

    let first = service
        .publish(&agent_id, request.clone())
        .await
        .expect("first publish");
    let second = service
        .publish(&agent_id, request)
        .await
        .expect("second publish");

    assert_eq!(first.language_status, second.language_status);
    assert_eq!(first.channel_results, second.channel_results);
    assert_eq!(first.published_channels, second.published_channels);
    assert_eq!(second, service.get_status(&property.id).expect("status"));
}

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, agent: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(agent) = agent {
        builder = builder.header(AGENT_HEADER, agent);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn http_surface_covers_the_listing_lifecycle() {
    let service = Arc::new(Service::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(FakeGraph::default()),
    ));
    let app = publishing_router(service);

    let (status, agent) = call(
        &app,
        json_request(
            Method::POST,
            "/agents",
            None,
            json!({ "name": "Rahul Mehta", "slug": "rahul" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let agent_id = agent["id"].as_str().expect("agent id").to_string();

    let (status, _) = call(
        &app,
        json_request(
            Method::PUT,
            &format!("/agents/{agent_id}/language-preferences"),
            None,
            json!({ "primary_language": "gu", "secondary_languages": ["en"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, property) = call(
        &app,
        json_request(
            Method::POST,
            "/properties",
            Some(&agent_id),
            json!({ "title": "Riverside plot", "price": 1200000.0, "location": "Ahmedabad" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let property_id = property["id"].as_str().expect("property id").to_string();

    let (status, snapshot) = call(
        &app,
        json_request(
            Method::POST,
            &format!("/properties/{property_id}/publish"),
            Some(&agent_id),
            json!({
                "target_languages": ["gu", "en"],
                "publishing_channels": ["website", "linkedin"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["publishing_status"], "published");
    assert_eq!(snapshot["language_status"]["gu"], "published");
    assert_eq!(snapshot["channel_results"]["linkedin"]["en"], "not_supported");

    let (status, stored) = call(&app, get(&format!("/properties/{property_id}/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored, snapshot);

    let (status, profile) = call(&app, get("/agent-public/rahul")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["languages"], json!(["gu", "en"]));
    assert_eq!(profile["properties"][0]["title"], "Riverside plot");

    let (status, outcome) = call(
        &app,
        json_request(
            Method::POST,
            &format!("/properties/{property_id}/unpublish"),
            Some(&agent_id),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "draft");

    let (status, stored) = call(&app, get(&format!("/properties/{property_id}/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["publishing_status"], "draft");
    assert_eq!(stored["published_channels"], json!([]));

    let (_, profile) = call(&app, get("/agent-public/rahul")).await;
    assert_eq!(profile["properties"], json!([]));
}

#[tokio::test]
async fn http_rejects_foreign_and_malformed_publishes() {
    let service = Arc::new(Service::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(FakeGraph::default()),
    ));
    let owner = onboard(&service);
    let intruder = service
        .register_agent(AgentRegistration {
            name: "Vikram Rao".to_string(),
            ..AgentRegistration::default()
        })
        .expect("second agent");
    let property = service
        .create_property(&owner, listing("Lake view 3BHK"))
        .expect("draft created");
    let app = publishing_router(service);
    let uri = format!("/properties/{}/publish", property.id.0);
    let body = json!({ "target_languages": ["en"], "publishing_channels": ["website"] });

    let (status, _) = call(
        &app,
        json_request(Method::POST, &uri, Some(&intruder.id.0), body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, json_request(Method::POST, &uri, None, body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, error) = call(
        &app,
        json_request(
            Method::POST,
            &uri,
            Some(&owner.0),
            json!({ "target_languages": ["fr"], "publishing_channels": ["website"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error["error"].as_str().expect("message").contains("fr"));

    let (status, stored) = call(&app, get(&format!("/properties/{}/status", property.id.0))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["publishing_status"], "draft");
}
