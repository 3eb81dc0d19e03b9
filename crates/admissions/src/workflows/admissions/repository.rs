use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, ApplicationLog, ApplicationStatus, ApplicationType,
    EnglishRequirement, LeadQuality, LogDraft, NewApplication, Program, ProgramId, StudentDocument,
    StudentId, StudentProfile, StudentTestScore, University, UniversityId,
};
use super::lifecycle::ReviewUpdate;
use super::reference::ApplicationReference;

/// Storage of applications and their audit trail.
///
/// Implementations must serialize reference allocation and keep every log write atomic
/// with the application save that caused it.
pub trait ApplicationRepository: Send + Sync {
    /// Allocates the next reference, stores the application and its first log entry together.
    fn create(
        &self,
        application: NewApplication,
        log: LogDraft,
    ) -> Result<Application, RepositoryError>;
    fn fetch(
        &self,
        reference: &ApplicationReference,
    ) -> Result<Option<Application>, RepositoryError>;
    /// Entries oldest first.
    fn logs(&self, application: &ApplicationId) -> Result<Vec<ApplicationLog>, RepositoryError>;
    /// Newest first.
    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError>;
    /// Saves a review, failing with `Conflict` if the status moved since it was planned.
    fn apply_review(&self, update: ReviewUpdate) -> Result<Application, RepositoryError>;
    fn set_lead_quality(
        &self,
        application: &ApplicationId,
        quality: LeadQuality,
    ) -> Result<Application, RepositoryError>;
    /// Removes a draft and its logs; `Conflict` if it is no longer a draft.
    fn delete_draft(&self, application: &ApplicationId) -> Result<(), RepositoryError>;
}

pub trait StudentRepository: Send + Sync {
    fn profile(&self, student: &StudentId) -> Result<Option<StudentProfile>, RepositoryError>;
    fn save_profile(&self, profile: StudentProfile) -> Result<(), RepositoryError>;
    /// Newest first.
    fn documents(&self, student: &StudentId) -> Result<Vec<StudentDocument>, RepositoryError>;
    /// Deletes every document of the same type for the student, then stores this one.
    fn replace_document(&self, document: StudentDocument) -> Result<(), RepositoryError>;
    fn add_document(&self, document: StudentDocument) -> Result<(), RepositoryError>;
    fn test_scores(&self, student: &StudentId)
        -> Result<Vec<StudentTestScore>, RepositoryError>;
    fn add_test_score(&self, score: StudentTestScore) -> Result<(), RepositoryError>;
    /// Scores whose expiry date is before `today`; deleted unless `dry_run`.
    fn purge_expired_scores(
        &self,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<Vec<StudentTestScore>, RepositoryError>;
}

/// Read access to universities and programs.
pub trait CatalogRepository: Send + Sync {
    fn university(&self, id: &UniversityId) -> Result<Option<University>, RepositoryError>;
    fn university_by_slug(&self, slug: &str) -> Result<Option<University>, RepositoryError>;
    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError>;
    fn program_by_slug(&self, slug: &str) -> Result<Option<Program>, RepositoryError>;
    fn active_programs(&self, university: &UniversityId) -> Result<Vec<Program>, RepositoryError>;
    fn english_requirements(
        &self,
        program: &ProgramId,
    ) -> Result<Vec<EnglishRequirement>, RepositoryError>;
}

/// Everything the workflow needs from the entity store.
pub trait EntityStore: ApplicationRepository + StudentRepository + CatalogRepository {}

impl<T> EntityStore for T where T: ApplicationRepository + StudentRepository + CatalogRepository {}

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub student: Option<StudentId>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub application_type: Option<ApplicationType>,
}

impl ApplicationFilter {
    pub fn matches(&self, application: &Application) -> bool {
        self.student.map_or(true, |id| id == application.student)
            && self.status.map_or(true, |status| status == application.status)
            && self
                .application_type
                .map_or(true, |kind| kind == application.application_type)
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
