//! Request and response schemas for the platform's `/api/v1` endpoints.
//!
//! Responses are decoded into these structs directly; a missing required
//! field is a decode error rather than a silent default.

use serde::{Deserialize, Serialize};

/// Paginated list wrapper used by every collection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRevision {
    pub id: String,
    pub version: u64,
    #[serde(default)]
    pub created_by: Option<UserRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteStatus {
    pub state: String,
}

impl SiteStatus {
    pub const DONE: &'static str = "done";

    pub fn is_done(&self) -> bool {
        self.state == Self::DONE
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevisionEntry {
    pub project_revision: ProjectRevision,
    pub site: SiteStatus,
}

/// `GET /api/v1/projects/{id}/revisions`, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct RevisionsResponse {
    pub revisions: Page<RevisionEntry>,
}

impl RevisionsResponse {
    pub fn latest(&self) -> Option<&RevisionEntry> {
        self.revisions.data.first()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: String,
    pub raw_content: String,
    pub author: UserRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentEntry {
    pub comment: Comment,
}

/// Shared by the comments and replies endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentsResponse {
    pub comments: Page<CommentEntry>,
}

impl CommentsResponse {
    pub fn first(&self) -> Option<&Comment> {
        self.comments.data.first().map(|entry| &entry.comment)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.comments.data.iter().map(|entry| &entry.comment)
    }
}

/// A single like. Some likes point at deleted or broken projects, so the
/// project is kept as raw JSON and inspected leniently.
#[derive(Debug, Clone, Deserialize)]
pub struct LikeEntry {
    #[serde(default)]
    pub project: Option<serde_json::Value>,
}

impl LikeEntry {
    pub fn project_id(&self) -> Option<&str> {
        self.project
            .as_ref()
            .and_then(|project| project.get("id"))
            .and_then(serde_json::Value::as_str)
    }
}

/// `GET /api/v1/users/{username}/likes`
#[derive(Debug, Clone, Deserialize)]
pub struct LikesResponse {
    pub likes: Page<LikeEntry>,
}

impl LikesResponse {
    pub fn includes_project(&self, project_id: &str) -> bool {
        self.likes
            .data
            .iter()
            .any(|like| like.project_id() == Some(project_id))
    }
}

/// Returned by `GET /api/v1/projects/{id}` and by revision creation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRevisionResponse {
    pub project_revision: ProjectRevision,
}

#[derive(Debug, Serialize)]
pub struct PostCommentRequest<'a> {
    pub content: &'a str,
    pub parent_comment_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateRevisionRequest {
    pub parent_version: u64,
}

#[derive(Debug, Serialize)]
pub struct ConfirmDraftRequest {
    pub draft: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateProjectRequest {
    pub current_version: u64,
}

/// Outcome of a completed revision pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionResult {
    pub success: bool,
    pub revision_id: String,
    pub version: u64,
    pub site_id: String,
}
