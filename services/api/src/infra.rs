use agent_publisher::publishing::{
    ExternalPostId, FacebookError, FacebookGateway, ManagedPage, PagePost,
};
use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Offline stand-in for the Graph API used by the demo. Posts are kept in
/// memory and get sequential ids.
#[derive(Default, Clone)]
pub(crate) struct DryRunFacebook {
    posts: Arc<Mutex<Vec<PagePost>>>,
}

impl DryRunFacebook {
    pub(crate) fn posts(&self) -> Vec<PagePost> {
        self.posts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FacebookGateway for DryRunFacebook {
    async fn publish_post(&self, post: &PagePost) -> Result<ExternalPostId, FacebookError> {
        let mut guard = self
            .posts
            .lock()
            .map_err(|_| FacebookError::Transport("dry-run post log poisoned".to_string()))?;
        guard.push(post.clone());
        Ok(ExternalPostId(format!("{}_dryrun{}", post.page_id.0, guard.len())))
    }

    fn authorization_url(&self, _state: &str) -> Result<String, FacebookError> {
        Err(FacebookError::NotConfigured("FB_APP_ID"))
    }

    async fn exchange_code(&self, _code: &str) -> Result<Vec<ManagedPage>, FacebookError> {
        Err(FacebookError::NotConfigured("FB_APP_ID"))
    }
}
