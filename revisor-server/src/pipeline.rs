//! The five-step remote transaction that publishes a new revision.
//!
//! Steps run strictly in order over the same session. The platform offers no
//! rollback, so a failure leaves earlier steps in place and the error names
//! the step that broke.

use reqwest::StatusCode;
use revisor_core::{
    generate_site_id, CreateSiteRequest, ProjectRevisionResponse, RevisionResult, SessionState,
};
use std::fmt;
use tracing::{error, info};

use crate::platform::{PlatformClient, PlatformError, PlatformResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    FetchProject,
    CreateRevision,
    CreateSite,
    ConfirmDraft,
    UpdateProject,
}

impl PipelineStep {
    pub fn expected_status(self) -> StatusCode {
        match self {
            Self::FetchProject => StatusCode::OK,
            Self::CreateRevision => StatusCode::CREATED,
            Self::CreateSite => StatusCode::CREATED,
            Self::ConfirmDraft => StatusCode::OK,
            Self::UpdateProject => StatusCode::OK,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchProject => "fetch project",
            Self::CreateRevision => "create revision",
            Self::CreateSite => "create site",
            Self::ConfirmDraft => "confirm draft",
            Self::UpdateProject => "update current version",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("revision request needs a non-empty {0}")]
    InvalidRequest(&'static str),

    #[error("{step} failed with status {status}, response: {body}")]
    UnexpectedStatus {
        step: PipelineStep,
        status: StatusCode,
        body: String,
    },

    #[error("{step} failed: {source}")]
    Platform {
        step: PipelineStep,
        #[source]
        source: PlatformError,
    },

    #[error("{step} reported version {actual}, expected {expected}")]
    VersionMismatch {
        step: PipelineStep,
        expected: u64,
        actual: u64,
    },
}

impl PipelineError {
    /// The step that failed, if the pipeline got as far as sending requests.
    pub fn step(&self) -> Option<PipelineStep> {
        match self {
            Self::InvalidRequest(_) => None,
            Self::UnexpectedStatus { step, .. }
            | Self::Platform { step, .. }
            | Self::VersionMismatch { step, .. } => Some(*step),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RevisionRequest<'a> {
    pub project_id: &'a str,
    pub prompt: &'a str,
    pub model_id: &'a str,
}

pub struct RevisionPipeline<'a> {
    client: &'a PlatformClient,
}

impl<'a> RevisionPipeline<'a> {
    pub fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    pub async fn create_revision(
        &self,
        session: &SessionState,
        request: &RevisionRequest<'_>,
    ) -> Result<RevisionResult, PipelineError> {
        if request.project_id.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("project id"));
        }

        let project_id = request.project_id;
        info!("Creating revision for project {}", project_id);

        // 1) Current version of the project
        let step = PipelineStep::FetchProject;
        let response = expect_status(step, self.client.get_project(session, project_id).await)?;
        let project: ProjectRevisionResponse = decode(step, &response)?;
        let parent_version = project.project_revision.version;
        info!("Current project version: {}", parent_version);

        // 2) New draft revision on top of it
        let step = PipelineStep::CreateRevision;
        let response = expect_status(
            step,
            self.client
                .create_revision(session, project_id, parent_version)
                .await,
        )?;
        let created: ProjectRevisionResponse = decode(step, &response)?;
        let revision_id = created.project_revision.id;
        let version = created.project_revision.version;
        info!("Created revision {} at version {}", revision_id, version);

        // 3) Generation job for the revision's site
        let step = PipelineStep::CreateSite;
        let site_id = generate_site_id();
        info!("Generated site id {}", site_id);
        let site_request = CreateSiteRequest::new(
            request.prompt,
            request.model_id,
            project_id,
            version,
            &revision_id,
            site_id.clone(),
        );
        let response = expect_status(
            step,
            self.client.create_site(session, &site_request).await,
        )?;
        check_echoed_version(step, &response, version)?;
        info!("Created draft site {}", site_id);

        // 4) Take the revision out of draft
        let step = PipelineStep::ConfirmDraft;
        let response = expect_status(
            step,
            self.client.confirm_draft(session, project_id, version).await,
        )?;
        check_echoed_version(step, &response, version)?;
        info!("Confirmed draft for version {}", version);

        // 5) Point the project at the new version
        let step = PipelineStep::UpdateProject;
        let response = expect_status(
            step,
            self.client
                .set_current_version(session, project_id, version)
                .await,
        )?;
        check_echoed_version(step, &response, version)?;
        info!("Updated project {} current version to {}", project_id, version);

        Ok(RevisionResult {
            success: true,
            revision_id,
            version,
            site_id,
        })
    }
}

fn expect_status(
    step: PipelineStep,
    result: Result<PlatformResponse, PlatformError>,
) -> Result<PlatformResponse, PipelineError> {
    let response = result.map_err(|source| {
        error!("Pipeline step '{}' failed: {}", step, source);
        PipelineError::Platform { step, source }
    })?;

    if response.status != step.expected_status() {
        error!(
            "Pipeline step '{}' failed: {} - {}",
            step, response.status, response.body
        );
        return Err(PipelineError::UnexpectedStatus {
            step,
            status: response.status,
            body: response.body,
        });
    }

    Ok(response)
}

fn decode<T: serde::de::DeserializeOwned>(
    step: PipelineStep,
    response: &PlatformResponse,
) -> Result<T, PipelineError> {
    response
        .decode()
        .map_err(|source| PipelineError::Platform { step, source })
}

/// Steps after revision creation may echo the revision back. When they do,
/// the version must be the one this run created.
fn check_echoed_version(
    step: PipelineStep,
    response: &PlatformResponse,
    expected: u64,
) -> Result<(), PipelineError> {
    let echoed = serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|body| {
            body.pointer("/project_revision/version")
                .and_then(serde_json::Value::as_u64)
        });

    match echoed {
        Some(actual) if actual != expected => {
            error!(
                "Pipeline step '{}' reported version {}, expected {}",
                step, actual, expected
            );
            Err(PipelineError::VersionMismatch {
                step,
                expected,
                actual,
            })
        }
        _ => Ok(()),
    }
}
