/// HTTP client for the PlotSet REST API

use crate::session::UserProfile;
use crate::settings::ApiConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const AUTH_CHECK: &str = "/api/user/auth-check";
const LOGIN: &str = "/api/user/login";
const SNAP_TEXT: &str = "/api/snap/text";
const SNAP_IMAGE: &str = "/api/snap/image";
const SNAP_CHARTS: &str = "/api/snap/charts";
const PROJECT: &str = "/api/project/get";
const EMBED_CREATE: &str = "/api/embed/create";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error calling {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("Could not build request for {endpoint}: {message}")]
    Request { endpoint: String, message: String },

    #[error("Rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("{field} missing from {endpoint} response")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    fn network(endpoint: &str, e: reqwest::Error) -> ApiError {
        ApiError::Network {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }
    }

    fn request(endpoint: &str, e: reqwest::Error) -> ApiError {
        ApiError::Request {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }
    }

    fn decode(endpoint: &str, e: impl std::fmt::Display) -> ApiError {
        ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }
    }

    fn missing(endpoint: &str, field: &'static str) -> ApiError {
        ApiError::MissingField {
            endpoint: endpoint.to_string(),
            field,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub remember: bool,
}

/// Only the token is guaranteed; everything else is read best-effort
#[derive(Debug, Clone, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub token: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl LoginUser {
    /// Profile fields present with the expected types, the rest left empty
    pub fn profile(&self) -> UserProfile {
        let text = |key: &str| {
            self.extra
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let credits = self.extra.get("credits").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f.floor() as i64))
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        });

        UserProfile {
            name: text("name"),
            email: text("email"),
            credits,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub results: bool,
    #[serde(default)]
    pub user: Option<LoginUser>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthCheckResponse {
    #[serde(default, rename = "isAuthenticated")]
    is_authenticated: bool,
}

/// Assets of a created project
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectAssets {
    pub dataset_url: String,
    pub thumbnail: Option<String>,
}

/// Image bytes fetched from a page image, ready for upload
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Ids come back as strings or numbers depending on the endpoint
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn image_file_name(src: &str) -> String {
    url::Url::parse(src)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "image.png".to_string())
}

pub struct ApiClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Map non-success statuses to errors, 429 separately
    async fn check(endpoint: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn json(endpoint: &str, response: Response) -> Result<Value, ApiError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::decode(endpoint, e))
    }

    /// `GET /api/user/auth-check`
    pub async fn auth_check(&self, token: &str) -> Result<bool, ApiError> {
        let response = self
            .client
            .get(self.config.endpoint(AUTH_CHECK))
            .header("Authorization", token)
            .send()
            .await
            .map_err(|e| ApiError::network(AUTH_CHECK, e))?;

        let body: AuthCheckResponse = response
            .json()
            .await
            .map_err(|e| ApiError::decode(AUTH_CHECK, e))?;
        Ok(body.is_authenticated)
    }

    /// `POST /api/user/login`. The body is read whatever the status.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.config.endpoint(LOGIN))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::network(LOGIN, e))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                endpoint: LOGIN.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::decode(LOGIN, e))
    }

    /// `POST /api/snap/text`, returning the project id
    pub async fn upload_text(&self, token: &str, text: &str) -> Result<String, ApiError> {
        let part = Part::bytes(text.as_bytes().to_vec())
            .file_name("content.txt")
            .mime_str("text/plain")
            .map_err(|e| ApiError::request(SNAP_TEXT, e))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.config.endpoint(SNAP_TEXT))
            .header("Authorization", token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::network(SNAP_TEXT, e))?;
        let body = Self::json(SNAP_TEXT, Self::check(SNAP_TEXT, response).await?).await?;

        id_string(&body["projectId"]).ok_or_else(|| ApiError::missing(SNAP_TEXT, "projectId"))
    }

    /// Download the bytes behind a page image
    pub async fn fetch_image(&self, src: &str) -> Result<ImageBlob, ApiError> {
        let response = self
            .client
            .get(src)
            .send()
            .await
            .map_err(|e| ApiError::network(src, e))?;
        let response = Self::check(src, response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(src, e))?;

        Ok(ImageBlob {
            bytes: bytes.to_vec(),
            content_type,
            file_name: image_file_name(src),
        })
    }

    /// `POST /api/snap/image`, returning the file descriptor verbatim
    pub async fn upload_image(&self, token: &str, image: ImageBlob) -> Result<Value, ApiError> {
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|e| ApiError::request(SNAP_IMAGE, e))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.config.endpoint(SNAP_IMAGE))
            .header("Authorization", token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::network(SNAP_IMAGE, e))?;

        Self::json(SNAP_IMAGE, Self::check(SNAP_IMAGE, response).await?).await
    }

    /// `POST /api/snap/charts` with the uploaded file descriptor
    pub async fn create_chart(&self, token: &str, descriptor: &Value) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.config.endpoint(SNAP_CHARTS))
            .header("Authorization", token)
            .json(descriptor)
            .send()
            .await
            .map_err(|e| ApiError::network(SNAP_CHARTS, e))?;
        let body = Self::json(SNAP_CHARTS, Self::check(SNAP_CHARTS, response).await?).await?;

        id_string(&body["projectId"]).ok_or_else(|| ApiError::missing(SNAP_CHARTS, "projectId"))
    }

    /// `GET /api/project/get/{id}`
    pub async fn project(&self, token: &str, project_id: &str) -> Result<ProjectAssets, ApiError> {
        let url = format!("{}/{}", self.config.endpoint(PROJECT), project_id);
        let response = self
            .client
            .get(url)
            .header("Authorization", token)
            .send()
            .await
            .map_err(|e| ApiError::network(PROJECT, e))?;
        let body = Self::json(PROJECT, Self::check(PROJECT, response).await?).await?;

        let data = &body["data"];
        let dataset_url = data["dataset"]["url"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::missing(PROJECT, "data.dataset.url"))?
            .to_string();
        let thumbnail = data["thumbnail"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(ProjectAssets {
            dataset_url,
            thumbnail,
        })
    }

    /// `POST /api/embed/create`, returning the share id
    pub async fn create_embed(&self, token: &str, project_id: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.config.endpoint(EMBED_CREATE))
            .header("Authorization", token)
            .json(&serde_json::json!({ "id": project_id }))
            .send()
            .await
            .map_err(|e| ApiError::network(EMBED_CREATE, e))?;
        let body = Self::json(EMBED_CREATE, Self::check(EMBED_CREATE, response).await?).await?;

        id_string(&body["shareId"]).ok_or_else(|| ApiError::missing(EMBED_CREATE, "shareId"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_string() {
        assert_eq!(id_string(&serde_json::json!("p1")), Some("p1".to_string()));
        assert_eq!(id_string(&serde_json::json!(42)), Some("42".to_string()));
        assert_eq!(id_string(&serde_json::json!("")), None);
        assert_eq!(id_string(&Value::Null), None);
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name("https://cdn.example.com/a/chart.jpg?w=200"), "chart.jpg");
        assert_eq!(image_file_name("https://cdn.example.com/"), "image.png");
        assert_eq!(image_file_name("data:image/png;base64,AAAA"), "image.png");
    }

    #[test]
    fn test_login_response_with_profile() {
        let json = r#"{"results": true, "user": {"token": "t-1", "name": "Ada Lovelace", "email": "ada@example.com", "credits": 12}}"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();

        let user = response.user.unwrap();
        assert!(response.results);
        assert_eq!(user.token, "t-1");
        assert_eq!(user.profile().name, "Ada Lovelace");
        assert_eq!(user.profile().credits, Some(12));
    }

    #[test]
    fn test_login_user_with_odd_profile_fields() {
        let json = r#"{"results": true, "user": {"token": "t-1", "name": null, "email": 7, "credits": "3"}}"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();

        let profile = response.user.unwrap().profile();
        assert_eq!(profile.name, "");
        assert_eq!(profile.email, "");
        assert_eq!(profile.credits, Some(3));

        let json = r#"{"results": true, "user": {"token": "t-2", "credits": {"left": 1}}}"#;
        let user = serde_json::from_str::<LoginResponse>(json).unwrap().user.unwrap();
        assert_eq!(user.token, "t-2");
        assert_eq!(user.profile().credits, None);
    }

    #[test]
    fn test_login_response_failure() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"results": false, "message": "Wrong password"}"#).unwrap();

        assert!(!response.results);
        assert!(response.user.is_none());
        assert_eq!(response.message.as_deref(), Some("Wrong password"));
    }

    #[test]
    fn test_rate_limited_flag() {
        let err = ApiError::RateLimited {
            endpoint: SNAP_TEXT.to_string(),
        };
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("Rate limited"));

        let err = ApiError::Status {
            endpoint: SNAP_TEXT.to_string(),
            status: 500,
            body: String::new(),
        };
        assert!(!err.is_rate_limited());
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod http_tests {
        use super::*;
        use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

        fn client_for(server: &MockServer) -> ApiClient {
            ApiClient::new(ApiConfig::new(&server.uri()).unwrap())
        }

        #[tokio::test]
        async fn test_auth_check_sends_raw_token() {
            let server = MockServer::start().await;
            Mock::given(matchers::method("GET"))
                .and(matchers::path("/api/user/auth-check"))
                .and(matchers::header("Authorization", "tok-123"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"isAuthenticated": true})),
                )
                .expect(1)
                .mount(&server)
                .await;

            let result = client_for(&server).auth_check("tok-123").await;
            assert!(result.unwrap());
        }

        #[tokio::test]
        async fn test_auth_check_invalid_json() {
            let server = MockServer::start().await;
            Mock::given(matchers::method("GET"))
                .and(matchers::path("/api/user/auth-check"))
                .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
                .mount(&server)
                .await;

            let result = client_for(&server).auth_check("tok").await;
            assert!(matches!(result, Err(ApiError::Decode { .. })));
        }

        #[tokio::test]
        async fn test_login_posts_credentials() {
            let server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .and(matchers::path("/api/user/login"))
                .and(matchers::body_json(serde_json::json!({
                    "email": "ada@example.com",
                    "password": "secret",
                    "remember": false
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "results": true,
                    "user": {"token": "t-9"}
                })))
                .expect(1)
                .mount(&server)
                .await;

            let request = LoginRequest {
                email: "ada@example.com".to_string(),
                password: "secret".to_string(),
                remember: false,
            };
            let response = client_for(&server).login(&request).await.unwrap();
            assert_eq!(response.user.unwrap().token, "t-9");
        }

        #[tokio::test]
        async fn test_upload_text_rate_limited() {
            let server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .and(matchers::path("/api/snap/text"))
                .respond_with(ResponseTemplate::new(429))
                .expect(1)
                .mount(&server)
                .await;

            let result = client_for(&server).upload_text("tok", "some words").await;
            assert!(matches!(result, Err(ApiError::RateLimited { .. })));
        }

        #[tokio::test]
        async fn test_upload_image_bad_content_type_is_request_error() {
            let server = MockServer::start().await;
            Mock::given(matchers::any())
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;
            let image = ImageBlob {
                bytes: vec![1, 2, 3],
                content_type: "not a mime".to_string(),
                file_name: "chart.png".to_string(),
            };

            let result = client_for(&server).upload_image("tok", image).await;
            assert!(matches!(result, Err(ApiError::Request { .. })));
        }

        #[tokio::test]
        async fn test_project_requires_dataset_url() {
            let server = MockServer::start().await;
            Mock::given(matchers::method("GET"))
                .and(matchers::path("/api/project/get/p1"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {"thumbnail": "t.png"}})),
                )
                .mount(&server)
                .await;

            let result = client_for(&server).project("tok", "p1").await;
            assert!(matches!(
                result,
                Err(ApiError::MissingField { field: "data.dataset.url", .. })
            ));
        }

        #[tokio::test]
        async fn test_create_chart_forwards_descriptor() {
            let server = MockServer::start().await;
            let descriptor = serde_json::json!({"fileName": "abc.png", "size": 10});
            Mock::given(matchers::method("POST"))
                .and(matchers::path("/api/snap/charts"))
                .and(matchers::body_json(descriptor.clone()))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"projectId": 77})))
                .expect(1)
                .mount(&server)
                .await;

            let id = client_for(&server).create_chart("tok", &descriptor).await.unwrap();
            assert_eq!(id, "77");
        }

        #[tokio::test]
        async fn test_server_error_keeps_status() {
            let server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .and(matchers::path("/api/embed/create"))
                .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
                .mount(&server)
                .await;

            match client_for(&server).create_embed("tok", "p1").await {
                Err(ApiError::Status { status, body, .. }) => {
                    assert_eq!(status, 500);
                    assert!(body.contains("Internal Server Error"));
                }
                other => panic!("Expected Status error, got {:?}", other),
            }
        }
    }
}
