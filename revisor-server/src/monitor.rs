//! One polling cycle over a project's comments.
//!
//! A cycle reads the latest revision and comment, checks the guards, and
//! when they all pass runs the revision pipeline and acknowledges the
//! comment. Guard stops are [`CycleOutcome`]s; faults are [`CycleError`]s.

use reqwest::StatusCode;
use revisor_core::{
    Comment, CommentsResponse, LikesResponse, RevisionResult, RevisionsResponse, SessionState,
};
use std::fmt;
use tracing::{info, warn};

use crate::config::Config;
use crate::pipeline::{PipelineError, RevisionPipeline, RevisionRequest};
use crate::platform::{PlatformClient, PlatformError, PlatformResponse};
use crate::session_refresh::SessionRefresher;

/// Texts of the automated replies. Every reply starts with the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTemplates {
    pub marker: String,
    pub confirmation: String,
    pub like_reminder: String,
}

impl ReplyTemplates {
    pub fn new(prefix: &str, create_revision: &str, require_likes: &str) -> Self {
        Self {
            marker: prefix.to_string(),
            confirmation: format!("{}{}", prefix, create_revision),
            like_reminder: format!("{}{}", prefix, require_likes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub project_id: String,
    pub model_id: String,
    pub additional_note: String,
    pub require_like_project: bool,
    pub replies: ReplyTemplates,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            project_id: config.project_id.clone(),
            model_id: config.model_id.clone(),
            additional_note: config.additional_note.clone(),
            require_like_project: config.require_like_project,
            replies: ReplyTemplates::new(
                &config.auto_response_prefix,
                &config.auto_response_create_revision,
                &config.auto_response_require_likes,
            ),
        }
    }
}

/// How a cycle ended when nothing went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NoRevisions,
    SiteNotReady { state: String },
    NoComments,
    AlreadyReplied { comment_id: String },
    LikeReminderPosted { comment_id: String, username: String },
    RevisionCreated(RevisionResult),
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRevisions => write!(f, "no revisions found"),
            Self::SiteNotReady { state } => write!(f, "site not ready (state: {})", state),
            Self::NoComments => write!(f, "no comments found"),
            Self::AlreadyReplied { comment_id } => {
                write!(f, "comment {} already has an automated reply", comment_id)
            }
            Self::LikeReminderPosted {
                comment_id,
                username,
            } => write!(
                f,
                "asked {} to like the project before handling comment {}",
                username, comment_id
            ),
            Self::RevisionCreated(result) => write!(
                f,
                "created revision {} (version {}, site {})",
                result.revision_id, result.version, result.site_id
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("{operation} failed with status {status}: {body}")]
    TransientHttp {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("session expired during {operation} (cookies refreshed: {refreshed})")]
    SessionExpired {
        operation: &'static str,
        refreshed: bool,
    },

    #[error("revision pipeline failed: {0}")]
    PipelineStepFailed(#[from] PipelineError),

    #[error("{operation}: malformed response: {detail}")]
    MalformedResponse {
        operation: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Transport(PlatformError),
}

impl From<PlatformError> for CycleError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Malformed { operation, source } => Self::MalformedResponse {
                operation,
                detail: source.to_string(),
            },
            other => Self::Transport(other),
        }
    }
}

pub struct ProjectMonitor {
    client: PlatformClient,
    refresher: SessionRefresher,
    settings: MonitorSettings,
}

impl ProjectMonitor {
    pub fn new(client: PlatformClient, refresher: SessionRefresher, settings: MonitorSettings) -> Self {
        Self {
            client,
            refresher,
            settings,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub async fn run_cycle(&self, session: &mut SessionState) -> Result<CycleOutcome, CycleError> {
        let project_id = self.settings.project_id.as_str();

        let response = self.client.list_revisions(session, project_id).await?;
        let revisions: RevisionsResponse = self.expect_ok(session, response).await?.decode()?;
        let Some(latest) = revisions.latest() else {
            info!("No revisions found for project {}", project_id);
            return Ok(CycleOutcome::NoRevisions);
        };

        if !latest.site.is_done() {
            info!("Site is still generating (state: {})", latest.site.state);
            return Ok(CycleOutcome::SiteNotReady {
                state: latest.site.state.clone(),
            });
        }

        let response = self.client.list_comments(session, project_id).await?;
        let comments: CommentsResponse = self.expect_ok(session, response).await?.decode()?;
        let Some(comment) = comments.first().cloned() else {
            info!("No comments found for project {}", project_id);
            return Ok(CycleOutcome::NoComments);
        };
        info!(
            "Latest comment {} by {}: {}",
            comment.id, comment.author.username, comment.raw_content
        );

        let response = self
            .client
            .list_replies(session, project_id, &comment.id)
            .await?;
        let replies: CommentsResponse = self.expect_ok(session, response).await?.decode()?;

        let owner_id = latest
            .project_revision
            .created_by
            .as_ref()
            .map(|user| user.id.as_str())
            .ok_or_else(|| CycleError::MalformedResponse {
                operation: "fetch revisions",
                detail: "latest revision has no created_by".to_string(),
            })?;
        let marker = self.settings.replies.marker.as_str();
        if replies
            .iter()
            .any(|reply| reply.author.id == owner_id && reply.raw_content.contains(marker))
        {
            info!("Comment {} already has an automated reply", comment.id);
            return Ok(CycleOutcome::AlreadyReplied {
                comment_id: comment.id,
            });
        }

        if self.settings.require_like_project && !self.author_liked_project(session, &comment).await? {
            info!(
                "{} has not liked project {}, posting reminder",
                comment.author.username, project_id
            );
            self.post_reply(session, &comment.id, &self.settings.replies.like_reminder)
                .await?;
            return Ok(CycleOutcome::LikeReminderPosted {
                comment_id: comment.id,
                username: comment.author.username,
            });
        }

        let prompt = format!("{}{}", comment.raw_content, self.settings.additional_note);
        let result = RevisionPipeline::new(&self.client)
            .create_revision(
                session,
                &RevisionRequest {
                    project_id,
                    prompt: &prompt,
                    model_id: &self.settings.model_id,
                },
            )
            .await?;

        self.post_reply(session, &comment.id, &self.settings.replies.confirmation)
            .await?;
        info!("Replied to comment {}", comment.id);

        Ok(CycleOutcome::RevisionCreated(result))
    }

    async fn author_liked_project(
        &self,
        session: &mut SessionState,
        comment: &Comment,
    ) -> Result<bool, CycleError> {
        let response = self
            .client
            .list_likes(session, &comment.author.username)
            .await?;
        let likes: LikesResponse = self.expect_ok(session, response).await?.decode()?;
        Ok(likes.includes_project(&self.settings.project_id))
    }

    /// Pass 200 responses through. An expired session is refreshed before
    /// the error is returned so the next cycle runs with the new cookies.
    async fn expect_ok(
        &self,
        session: &mut SessionState,
        response: PlatformResponse,
    ) -> Result<PlatformResponse, CycleError> {
        if response.status == StatusCode::OK {
            return Ok(response);
        }

        if response.is_jwt_expired() {
            warn!("Session expired during {}, refreshing cookies", response.operation);
            let refreshed = match self.refresher.refresh(session).await {
                Some(cookies) => {
                    session.apply(&cookies);
                    true
                }
                None => false,
            };
            return Err(CycleError::SessionExpired {
                operation: response.operation,
                refreshed,
            });
        }

        Err(CycleError::TransientHttp {
            operation: response.operation,
            status: response.status,
            body: response.body,
        })
    }

    async fn post_reply(
        &self,
        session: &SessionState,
        comment_id: &str,
        content: &str,
    ) -> Result<(), CycleError> {
        let response = self
            .client
            .post_comment(session, &self.settings.project_id, content, comment_id)
            .await?;

        match response.status {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => Err(CycleError::TransientHttp {
                operation: response.operation,
                status,
                body: response.body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineStep;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROJECT: &str = "p1";
    const REVISIONS: &str = "/api/v1/projects/p1/revisions";
    const COMMENTS: &str = "/api/v1/projects/p1/comments";
    const REPLIES: &str = "/api/v1/projects/p1/comments/c1/replies";
    const LIKES: &str = "/api/v1/users/alice/likes";

    fn settings(require_like_project: bool) -> MonitorSettings {
        MonitorSettings {
            project_id: PROJECT.to_string(),
            model_id: "gemini-flash".to_string(),
            additional_note: " Keep it safe.".to_string(),
            require_like_project,
            replies: ReplyTemplates::new("[bot] ", "Revision created!", "Please like the project first."),
        }
    }

    fn monitor(server: &MockServer, require_like_project: bool) -> ProjectMonitor {
        let client = PlatformClient::new(&server.uri());
        let refresher = SessionRefresher::new(client.clone(), None);
        ProjectMonitor::new(client, refresher, settings(require_like_project))
    }

    fn session() -> SessionState {
        SessionState::from_cookie_string("session=abc")
    }

    fn revisions_with_state(state: &str) -> Value {
        json!({
            "revisions": {"data": [{
                "project_revision": {
                    "id": "rev_7",
                    "version": 7,
                    "created_by": {"id": "owner", "username": "bob"}
                },
                "site": {"state": state}
            }]}
        })
    }

    fn comments(entries: Value) -> Value {
        json!({"comments": {"data": entries}})
    }

    fn alice_comment() -> Value {
        json!([{"comment": {
            "id": "c1",
            "raw_content": "add a button",
            "author": {"id": "u1", "username": "alice"}
        }}])
    }

    async fn mount_get(server: &MockServer, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Revisions ready, one comment from alice, the given replies.
    async fn mount_guards(server: &MockServer, replies: Value) {
        mount_get(server, REVISIONS, revisions_with_state("done")).await;
        mount_get(server, COMMENTS, comments(alice_comment())).await;
        mount_get(server, REPLIES, comments(replies)).await;
    }

    /// The pipeline's first request fails, which proves it was reached.
    async fn mount_failing_pipeline(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v1/projects/p1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_successful_pipeline(server: &MockServer) {
        mount_get(
            server,
            "/api/v1/projects/p1",
            json!({"project_revision": {"id": "rev_7", "version": 7}}),
        )
        .await;
        Mock::given(method("POST"))
            .and(path(REVISIONS))
            .and(body_json(json!({"parent_version": 7})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "project_revision": {"id": "rev_8", "version": 8}
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/sites"))
            .and(body_partial_json(json!({
                "project_version": 8,
                "generate": {"prompt": {"text": "add a button Keep it safe."}}
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/projects/p1/revisions/8"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/projects/p1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    async fn request_paths(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect()
    }

    #[test]
    fn test_reply_templates() {
        let replies = ReplyTemplates::new("[bot] ", "done", "like first");
        assert_eq!(replies.marker, "[bot] ");
        assert_eq!(replies.confirmation, "[bot] done");
        assert_eq!(replies.like_reminder, "[bot] like first");
    }

    #[tokio::test]
    async fn test_comment_becomes_revision_and_reply() {
        let server = MockServer::start().await;
        mount_guards(&server, json!([])).await;
        mount_successful_pipeline(&server).await;
        Mock::given(method("POST"))
            .and(path(COMMENTS))
            .and(body_json(json!({
                "content": "[bot] Revision created!",
                "parent_comment_id": "c1"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LIKES))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap();

        match outcome {
            CycleOutcome::RevisionCreated(result) => {
                assert!(result.success);
                assert_eq!(result.revision_id, "rev_8");
                assert_eq!(result.version, 8);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generating_site_stops_after_revisions() {
        let server = MockServer::start().await;
        mount_get(&server, REVISIONS, revisions_with_state("generating")).await;

        let outcome = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::SiteNotReady {
                state: "generating".to_string()
            }
        );
        assert_eq!(request_paths(&server).await, vec![format!("GET {}", REVISIONS)]);
    }

    #[tokio::test]
    async fn test_expired_session_refreshes_and_stops() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REVISIONS))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"name": "ResponseError", "cause": {"message": "JWT expired"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).append_header("set-cookie", "session=fresh; Path=/"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut session = session();
        let err = monitor(&server, false)
            .run_cycle(&mut session)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CycleError::SessionExpired {
                operation: "fetch revisions",
                refreshed: true
            }
        ));
        assert_eq!(session.get("session"), Some("fresh"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"name": "ResponseError", "cause": {"message": "JWT expired"}}
            })))
            .mount(&server)
            .await;
        mount_get(&server, REVISIONS, revisions_with_state("done")).await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut session = session();
        let err = monitor(&server, false)
            .run_cycle(&mut session)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CycleError::SessionExpired {
                operation: "fetch comments",
                refreshed: false
            }
        ));
        assert_eq!(session.get("session"), Some("abc"));
    }

    #[tokio::test]
    async fn test_other_401_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REVISIONS))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap_err();

        match err {
            CycleError::TransientHttp {
                operation,
                status,
                body,
            } => {
                assert_eq!(operation, "fetch revisions");
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "nope");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(request_paths(&server).await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_lists_stop_the_cycle() {
        let server = MockServer::start().await;
        mount_get(&server, REVISIONS, json!({"revisions": {"data": []}})).await;
        let outcome = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap();
        assert_eq!(outcome, CycleOutcome::NoRevisions);

        let server = MockServer::start().await;
        mount_get(&server, REVISIONS, revisions_with_state("done")).await;
        mount_get(&server, COMMENTS, comments(json!([]))).await;
        let outcome = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap();
        assert_eq!(outcome, CycleOutcome::NoComments);
    }

    #[tokio::test]
    async fn test_owner_reply_with_marker_suppresses() {
        let server = MockServer::start().await;
        mount_guards(
            &server,
            json!([{"comment": {
                "id": "r1",
                "raw_content": "[bot] Revision created!",
                "author": {"id": "owner", "username": "bob"}
            }}]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/projects/p1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::AlreadyReplied {
                comment_id: "c1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_marker_reply_from_someone_else_does_not_suppress() {
        let server = MockServer::start().await;
        mount_guards(
            &server,
            json!([
                {"comment": {
                    "id": "r1",
                    "raw_content": "[bot] Revision created!",
                    "author": {"id": "u2", "username": "mallory"}
                }},
                {"comment": {
                    "id": "r2",
                    "raw_content": "thanks",
                    "author": {"id": "owner", "username": "bob"}
                }}
            ]),
        )
        .await;
        mount_failing_pipeline(&server).await;

        let err = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap_err();

        match err {
            CycleError::PipelineStepFailed(inner) => {
                assert_eq!(inner.step(), Some(PipelineStep::FetchProject));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_comment_still_reaches_pipeline() {
        let server = MockServer::start().await;
        mount_get(&server, REVISIONS, revisions_with_state("done")).await;
        mount_get(
            &server,
            COMMENTS,
            comments(json!([{"comment": {
                "id": "c1",
                "raw_content": "   ",
                "author": {"id": "u1", "username": "alice"}
            }}])),
        )
        .await;
        mount_get(&server, REPLIES, comments(json!([]))).await;
        mount_failing_pipeline(&server).await;

        let client = PlatformClient::new(&server.uri());
        let refresher = SessionRefresher::new(client.clone(), None);
        let mut settings = settings(false);
        settings.additional_note = String::new();
        let monitor = ProjectMonitor::new(client, refresher, settings);

        let err = monitor.run_cycle(&mut session()).await.unwrap_err();

        match err {
            CycleError::PipelineStepFailed(inner) => {
                assert_eq!(inner.step(), Some(PipelineStep::FetchProject));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_like_gate_posts_reminder() {
        let server = MockServer::start().await;
        mount_guards(&server, json!([])).await;
        mount_get(
            &server,
            LIKES,
            json!({"likes": {"data": [{"project": {"id": "other"}}, {}]}}),
        )
        .await;
        Mock::given(method("POST"))
            .and(path(COMMENTS))
            .and(body_json(json!({
                "content": "[bot] Please like the project first.",
                "parent_comment_id": "c1"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/projects/p1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = monitor(&server, true)
            .run_cycle(&mut session())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::LikeReminderPosted {
                comment_id: "c1".to_string(),
                username: "alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_like_gate_passes_with_matching_like() {
        let server = MockServer::start().await;
        mount_guards(&server, json!([])).await;
        mount_get(
            &server,
            LIKES,
            json!({"likes": {"data": [{"project": {"id": "p1"}}]}}),
        )
        .await;
        mount_failing_pipeline(&server).await;

        let err = monitor(&server, true)
            .run_cycle(&mut session())
            .await
            .unwrap_err();

        assert!(matches!(err, CycleError::PipelineStepFailed(_)));
    }

    #[tokio::test]
    async fn test_malformed_comments() {
        let server = MockServer::start().await;
        mount_get(&server, REVISIONS, revisions_with_state("done")).await;
        mount_get(&server, COMMENTS, json!({"comments": {"data": [{"comment": {}}]}})).await;

        let err = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CycleError::MalformedResponse {
                operation: "fetch comments",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_confirmation_reply_is_reported() {
        let server = MockServer::start().await;
        mount_guards(&server, json!([])).await;
        mount_successful_pipeline(&server).await;
        Mock::given(method("POST"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = monitor(&server, false)
            .run_cycle(&mut session())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CycleError::TransientHttp {
                operation: "post reply",
                status: StatusCode::FORBIDDEN,
                ..
            }
        ));
    }
}
