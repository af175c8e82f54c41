/// Extraction workflow shared by the text popover and the image overlay
///
/// One run is a fixed sequence of round trips:
/// 1. upload the payload (text file, or the fetched image bytes)
/// 2. image only: turn the uploaded file descriptor into a chart project
/// 3. read the project for its dataset and thumbnail
/// 4. create a share record
///
/// Any failure aborts the run and no partial result is produced.

use crate::activity::{self, Activity, ActivityAction, ActivityStatus};
use crate::api::{ApiClient, ApiError};
use crate::session::{Session, UserProfile};
use crate::storage::KeyValueStore;
use serde::Serialize;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Image { src: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub preview_link: String,
    pub dataset_download_url: String,
    pub thumbnail_url: Option<String>,
    pub share_url: String,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("No credits left")]
    NoCredits,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl WorkflowError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, WorkflowError::Api(e) if e.is_rate_limited())
    }
}

/// Run the remote sequence for `payload` with an already authorized token
pub async fn run_extraction(
    api: &ApiClient,
    token: &str,
    payload: &Payload,
) -> Result<ExtractionResult, ApiError> {
    let project_id = match payload {
        Payload::Text(text) => api.upload_text(token, text).await?,
        Payload::Image { src } => {
            let image = api.fetch_image(src).await?;
            let descriptor = api.upload_image(token, image).await?;
            api.create_chart(token, &descriptor).await?
        }
    };
    log::debug!("Created project {}", project_id);

    let assets = api.project(token, &project_id).await?;
    let share_id = api.create_embed(token, &project_id).await?;

    let config = api.config();
    Ok(ExtractionResult {
        preview_link: config.preview_link(&project_id),
        dataset_download_url: config.dataset_download_url(&assets.dataset_url),
        thumbnail_url: assets.thumbnail.as_deref().map(|t| config.thumbnail_url(t)),
        share_url: config.share_url(&share_id),
    })
}

/// Entry point used by every UI trigger: checks the session, records the
/// activity and runs the sequence.
#[derive(Clone)]
pub struct Extractor {
    store: Rc<dyn KeyValueStore>,
    api: Rc<ApiClient>,
}

impl PartialEq for Extractor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.store, &other.store) && Rc::ptr_eq(&self.api, &other.api)
    }
}

impl Extractor {
    pub fn new(store: Rc<dyn KeyValueStore>, api: Rc<ApiClient>) -> Self {
        Self { store, api }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// `now` is the activity timestamp in epoch milliseconds
    pub async fn extract(
        &self,
        action: ActivityAction,
        payload: Payload,
        now: f64,
    ) -> Result<ExtractionResult, WorkflowError> {
        let store = self.store.as_ref();

        let session = Session::load(store).await;
        let token = session
            .authorized_token()
            .ok_or(WorkflowError::AuthRequired)?;

        if UserProfile::load(store)
            .await
            .is_some_and(|profile| profile.out_of_credits())
        {
            return Err(WorkflowError::NoCredits);
        }

        let record = match &payload {
            Payload::Text(text) => Activity::for_text(text, now),
            Payload::Image { src } => Activity::for_image(action, src, now),
        };
        let activity_id = record.id.clone();
        activity::record_activity(store, record).await;

        let result = run_extraction(&self.api, token, &payload).await;

        let status = match &result {
            Ok(_) => ActivityStatus::Completed,
            Err(e) => {
                log::error!("Error extracting data: {}", e);
                ActivityStatus::Failed
            }
        };
        activity::finish_activity(store, &activity_id, status).await;

        result.map_err(WorkflowError::from)
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::activity::ActivityLog;
    use crate::settings::{ApiConfig, keys};
    use crate::storage::{self, MemoryStore};
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

    const TOKEN: &str = "tok-1";

    async fn logged_in_store() -> Rc<MemoryStore> {
        let store = Rc::new(MemoryStore::new());
        storage::set_value(store.as_ref(), keys::USER_TOKEN, TOKEN).await;
        storage::set_value(store.as_ref(), keys::IS_LOGGED_IN, &true).await;
        store
    }

    fn extractor_for(store: Rc<MemoryStore>, server: &MockServer) -> Extractor {
        let api = ApiClient::new(ApiConfig::new(&server.uri()).unwrap());
        Extractor::new(store, Rc::new(api))
    }

    async fn mount_project_and_embed(server: &MockServer, project_id: &str) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path(format!("/api/project/get/{}", project_id)))
            .and(matchers::header("Authorization", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"dataset": {"url": "datasets/d1.csv"}, "thumbnail": "thumbs/p.png"}
            })))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/embed/create"))
            .and(matchers::body_json(serde_json::json!({"id": project_id})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"shareId": "s1"})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_text_flow_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/snap/text"))
            .and(matchers::header("Authorization", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"projectId": "p1"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_project_and_embed(&server, "p1").await;

        let store = logged_in_store().await;
        let extractor = extractor_for(store.clone(), &server);
        let text = "one two three four five six seven eight nine ten";

        let result = extractor
            .extract(ActivityAction::Text, Payload::Text(text.to_string()), 1.0)
            .await
            .unwrap();

        let base = server.uri();
        assert_eq!(result.preview_link, format!("{}/ai/edit-data/p1", base));
        assert_eq!(result.dataset_download_url, format!("{}/api/datasets/d1.csv", base));
        assert_eq!(result.thumbnail_url, Some(format!("{}/api/thumbs/p.png", base)));
        assert_eq!(result.share_url, format!("{}/share/s1", base));

        let log = ActivityLog::load(store.as_ref()).await;
        assert_eq!(log.len(), 1);
        assert_eq!(log.activities[0].status, ActivityStatus::Completed);
        assert_eq!(log.activities[0].text.as_deref(), Some(text));
    }

    #[tokio::test]
    async fn test_image_flow_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/images/chart.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![137u8, 80, 78, 71]),
            )
            .expect(1)
            .mount(&server)
            .await;
        let descriptor = serde_json::json!({"file": "uploads/chart.png", "mime": "image/png"});
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/snap/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(descriptor.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/snap/charts"))
            .and(matchers::body_json(descriptor))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"projectId": "p2"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_project_and_embed(&server, "p2").await;

        let store = logged_in_store().await;
        let extractor = extractor_for(store.clone(), &server);
        let src = format!("{}/images/chart.png", server.uri());

        let result = extractor
            .extract(ActivityAction::Chart, Payload::Image { src: src.clone() }, 1.0)
            .await
            .unwrap();

        assert!(result.preview_link.ends_with("/ai/edit-data/p2"));
        let log = ActivityLog::load(store.as_ref()).await;
        assert_eq!(log.activities[0].action, ActivityAction::Chart);
        assert_eq!(log.activities[0].image_url.as_deref(), Some(src.as_str()));
    }

    #[tokio::test]
    async fn test_project_failure_is_all_or_nothing() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/api/snap/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"projectId": "p1"})))
            .mount(&server)
            .await;
        Mock::given(matchers::path("/api/project/get/p1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::path("/api/embed/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"shareId": "s1"})))
            .expect(0)
            .mount(&server)
            .await;

        let store = logged_in_store().await;
        let extractor = extractor_for(store.clone(), &server);

        let result = extractor
            .extract(ActivityAction::Text, Payload::Text("a b c d e f".to_string()), 1.0)
            .await;

        assert!(matches!(result, Err(WorkflowError::Api(ApiError::Status { status: 500, .. }))));
        let log = ActivityLog::load(store.as_ref()).await;
        assert_eq!(log.activities[0].status, ActivityStatus::Failed);
    }

    #[tokio::test]
    async fn test_rate_limited_upload_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/api/snap/text"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let store = logged_in_store().await;
        let extractor = extractor_for(store, &server);

        let err = extractor
            .extract(ActivityAction::Text, Payload::Text("a b c d e f".to_string()), 1.0)
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_requires_login() {
        let server = MockServer::start().await;
        Mock::given(matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Rc::new(MemoryStore::new());
        storage::set_value(store.as_ref(), keys::USER_TOKEN, TOKEN).await;
        let extractor = extractor_for(store.clone(), &server);

        let err = extractor
            .extract(ActivityAction::Text, Payload::Text("a b c".to_string()), 1.0)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::AuthRequired));
        assert!(ActivityLog::load(store.as_ref()).await.is_empty());
    }

    #[tokio::test]
    async fn test_no_credits_blocks_run() {
        let server = MockServer::start().await;
        Mock::given(matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = logged_in_store().await;
        let profile = UserProfile {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            credits: Some(0),
        };
        storage::set_value(store.as_ref(), keys::USER, &profile).await;
        let extractor = extractor_for(store, &server);

        let err = extractor
            .extract(ActivityAction::Extract, Payload::Image { src: "https://x/y.png".to_string() }, 1.0)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::NoCredits));
    }
}
