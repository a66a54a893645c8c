use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use revisor_core::{
    is_jwt_expired_body, ConfirmDraftRequest, CreateRevisionRequest, CreateSiteRequest,
    PostCommentRequest, SessionState, UpdateProjectRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::recording::{RecordingLogger, RecordingMiddleware};

/// Number of likes requested from the likes endpoint; only the first page
/// is ever inspected.
pub const LIKES_PAGE_SIZE: u32 = 100;

/// Faults below the level of HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest_middleware::Error,
    },

    #[error("{operation}: failed to read response body: {source}")]
    Body {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: failed to encode request body: {source}")]
    Encode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation}: cannot build a request URL from base {base_url}")]
    InvalidUrl {
        operation: &'static str,
        base_url: String,
    },

    #[error("{operation}: malformed response: {source}")]
    Malformed {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Status and body of a completed platform call. Status codes are not
/// interpreted here; callers decide what counts as success.
#[derive(Debug, Clone)]
pub struct PlatformResponse {
    pub operation: &'static str,
    pub status: StatusCode,
    pub body: String,
}

impl PlatformResponse {
    pub fn is_jwt_expired(&self) -> bool {
        is_jwt_expired_body(self.status.as_u16(), &self.body)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PlatformError> {
        serde_json::from_str(&self.body).map_err(|source| PlatformError::Malformed {
            operation: self.operation,
            source,
        })
    }
}

/// Result of the root request used to refresh cookies.
#[derive(Debug, Clone)]
pub struct RootProbe {
    pub status: StatusCode,
    pub set_cookies: Vec<String>,
}

/// HTTP client for the platform's `/api/v1` endpoints.
#[derive(Clone)]
pub struct PlatformClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl PlatformClient {
    pub fn new(base_url: &str) -> Self {
        Self::new_with_recording(base_url, None)
    }

    pub fn new_with_recording(base_url: &str, recording_logger: Option<RecordingLogger>) -> Self {
        Self {
            client: create_platform_client(recording_logger),
            base_url: base_url.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base_url}/api/v1/{segments...}` with every segment percent-encoded.
    fn api_url(
        &self,
        operation: &'static str,
        segments: &[&str],
    ) -> Result<Url, PlatformError> {
        let invalid = || PlatformError::InvalidUrl {
            operation,
            base_url: self.base_url.clone(),
        };

        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn with_session(builder: RequestBuilder, session: &SessionState) -> RequestBuilder {
        match session.cookie_header() {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    fn with_json<T: Serialize>(
        operation: &'static str,
        builder: RequestBuilder,
        body: &T,
    ) -> Result<RequestBuilder, PlatformError> {
        let encoded = serde_json::to_string(body)
            .map_err(|source| PlatformError::Encode { operation, source })?;
        Ok(builder.header(CONTENT_TYPE, "application/json").body(encoded))
    }

    async fn send(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        session: &SessionState,
    ) -> Result<PlatformResponse, PlatformError> {
        let response = Self::with_session(builder, session)
            .send()
            .await
            .map_err(|source| PlatformError::Transport { operation, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| PlatformError::Body { operation, source })?;

        debug!("{} returned {}", operation, status);

        Ok(PlatformResponse {
            operation,
            status,
            body,
        })
    }

    pub async fn list_revisions(
        &self,
        session: &SessionState,
        project_id: &str,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "fetch revisions";
        let url = self.api_url(OPERATION, &["projects", project_id, "revisions"])?;
        self.send(OPERATION, self.client.get(url), session).await
    }

    pub async fn list_comments(
        &self,
        session: &SessionState,
        project_id: &str,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "fetch comments";
        let url = self.api_url(OPERATION, &["projects", project_id, "comments"])?;
        self.send(OPERATION, self.client.get(url), session).await
    }

    pub async fn list_replies(
        &self,
        session: &SessionState,
        project_id: &str,
        comment_id: &str,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "fetch replies";
        let url = self.api_url(
            OPERATION,
            &["projects", project_id, "comments", comment_id, "replies"],
        )?;
        self.send(OPERATION, self.client.get(url), session).await
    }

    pub async fn list_likes(
        &self,
        session: &SessionState,
        username: &str,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "fetch likes";
        let mut url = self.api_url(OPERATION, &["users", username, "likes"])?;
        url.query_pairs_mut()
            .append_pair("first", &LIKES_PAGE_SIZE.to_string());
        self.send(OPERATION, self.client.get(url), session).await
    }

    pub async fn post_comment(
        &self,
        session: &SessionState,
        project_id: &str,
        content: &str,
        parent_comment_id: &str,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "post reply";
        let url = self.api_url(OPERATION, &["projects", project_id, "comments"])?;
        let body = PostCommentRequest {
            content,
            parent_comment_id,
        };
        let builder = Self::with_json(OPERATION, self.client.post(url), &body)?;
        self.send(OPERATION, builder, session).await
    }

    pub async fn get_project(
        &self,
        session: &SessionState,
        project_id: &str,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "fetch project";
        let url = self.api_url(OPERATION, &["projects", project_id])?;
        self.send(OPERATION, self.client.get(url), session).await
    }

    pub async fn create_revision(
        &self,
        session: &SessionState,
        project_id: &str,
        parent_version: u64,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "create revision";
        let url = self.api_url(OPERATION, &["projects", project_id, "revisions"])?;
        let body = CreateRevisionRequest { parent_version };
        let builder = Self::with_json(OPERATION, self.client.post(url), &body)?;
        self.send(OPERATION, builder, session).await
    }

    pub async fn create_site(
        &self,
        session: &SessionState,
        request: &CreateSiteRequest,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "create site";
        let url = self.api_url(OPERATION, &["sites"])?;
        let builder = Self::with_json(OPERATION, self.client.post(url), request)?;
        self.send(OPERATION, builder, session).await
    }

    pub async fn confirm_draft(
        &self,
        session: &SessionState,
        project_id: &str,
        version: u64,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "confirm draft";
        let version = version.to_string();
        let url = self.api_url(
            OPERATION,
            &["projects", project_id, "revisions", version.as_str()],
        )?;
        let body = ConfirmDraftRequest { draft: false };
        let builder = Self::with_json(OPERATION, self.client.patch(url), &body)?;
        self.send(OPERATION, builder, session).await
    }

    pub async fn set_current_version(
        &self,
        session: &SessionState,
        project_id: &str,
        version: u64,
    ) -> Result<PlatformResponse, PlatformError> {
        const OPERATION: &str = "update current version";
        let url = self.api_url(OPERATION, &["projects", project_id])?;
        let body = UpdateProjectRequest {
            current_version: version,
        };
        let builder = Self::with_json(OPERATION, self.client.patch(url), &body)?;
        self.send(OPERATION, builder, session).await
    }

    /// Request the site root with the current cookies and collect every
    /// `Set-Cookie` header of the response.
    pub async fn probe_root(&self, session: &SessionState) -> Result<RootProbe, PlatformError> {
        const OPERATION: &str = "refresh cookies";
        let builder = Self::with_session(self.client.get(&self.base_url), session);
        let response = builder
            .send()
            .await
            .map_err(|source| PlatformError::Transport {
                operation: OPERATION,
                source,
            })?;

        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();

        Ok(RootProbe {
            status: response.status(),
            set_cookies,
        })
    }
}

pub fn create_platform_client(recording_logger: Option<RecordingLogger>) -> ClientWithMiddleware {
    use reqwest_middleware::ClientBuilder;

    let client = Client::builder()
        .user_agent(concat!("revisor/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to create HTTP client");

    let mut builder = ClientBuilder::new(client);

    if let Some(logger) = recording_logger {
        builder = builder.with(RecordingMiddleware::new(logger));
    }

    builder.build()
}
