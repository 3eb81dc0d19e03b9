use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Application, ApplicationLog, ApplicationStatus, ApplicationType, LeadQuality,
    NewApplication, ProgramId, StudentId, StudentTestScore, UniversityId,
};
use super::export::{applications_csv, ApplicationExport, ApplicationRow, ExportError};
use super::lifecycle::{self, Actor, ReviewDecision, TransitionError};
use super::reference::ApplicationReference;
use super::repository::{ApplicationFilter, EntityStore, RepositoryError};
use super::validation::FieldErrors;
use super::wizard::SessionError;
use crate::config::AdmissionsConfig;

/// Input for creating an application on a student's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub student: StudentId,
    pub university: UniversityId,
    pub program: ProgramId,
    pub application_type: ApplicationType,
    pub remarks: String,
    pub consent_given: bool,
    pub terms_accepted: bool,
    pub lead_quality: LeadQuality,
}

/// Application with its audit trail, as shown to its owner or to staff.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetail {
    pub application: Application,
    pub display_message: String,
    pub logs: Vec<ApplicationLog>,
}

/// Outcome of the expired test score sweep.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub dry_run: bool,
    pub today: NaiveDate,
    pub scores: Vec<StudentTestScore>,
}

/// Service owning application creation, review transitions and staff tooling.
pub struct ApplicationService<S> {
    store: Arc<S>,
    config: AdmissionsConfig,
}

impl<S> ApplicationService<S>
where
    S: EntityStore + 'static,
{
    pub fn new(store: Arc<S>, config: AdmissionsConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &AdmissionsConfig {
        &self.config
    }

    /// Creates a `pending` application and its "Application Submitted" log entry.
    pub fn submit(&self, request: SubmissionRequest) -> Result<Application, AdmissionsError> {
        self.create(request, ApplicationStatus::Pending)
    }

    /// Creates a `draft` the owner may later cancel.
    pub fn save_draft(&self, request: SubmissionRequest) -> Result<Application, AdmissionsError> {
        self.create(request, ApplicationStatus::Draft)
    }

    fn create(
        &self,
        request: SubmissionRequest,
        status: ApplicationStatus,
    ) -> Result<Application, AdmissionsError> {
        let program = self
            .store
            .program(&request.program)?
            .ok_or(AdmissionsError::NotFound("program"))?;
        let university = self
            .store
            .university(&request.university)?
            .ok_or(AdmissionsError::NotFound("university"))?;
        if program.university != university.id {
            return Err(AdmissionsError::Validation(FieldErrors::single(
                "program",
                "That program is not offered by the selected university.",
            )));
        }

        let log = match status {
            ApplicationStatus::Draft => lifecycle::draft_log(&program.name, &university.name),
            _ => lifecycle::submission_log(&program.name, &university.name),
        };

        let new_application = NewApplication {
            student: request.student,
            university: request.university,
            program: request.program,
            application_type: request.application_type,
            status,
            remarks: request.remarks,
            consent_given: request.consent_given,
            terms_accepted: request.terms_accepted,
            lead_quality: request.lead_quality,
        };

        let attempts = self.config.reference_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.store.create(new_application.clone(), log.clone()) {
                Ok(application) => {
                    info!(
                        reference = %application.reference,
                        status = %application.status,
                        lead_quality = application.lead_quality.as_str(),
                        "application created"
                    );
                    return Ok(application);
                }
                Err(RepositoryError::Conflict) if attempt < attempts => {
                    warn!(attempt, "reference allocation conflicted; retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn load(&self, reference: &ApplicationReference) -> Result<Application, AdmissionsError> {
        self.store
            .fetch(reference)?
            .ok_or(AdmissionsError::NotFound("application"))
    }

    fn require_staff(&self, actor: &Actor, action: &'static str) -> Result<(), AdmissionsError> {
        if actor.is_staff() {
            Ok(())
        } else {
            warn!(actor = %actor.label(), action, "staff-only action refused");
            Err(AdmissionsError::Forbidden(action))
        }
    }

    /// Staff review save. Writes one log entry when, and only when, the status changes.
    pub fn transition(
        &self,
        actor: &Actor,
        reference: &ApplicationReference,
        decision: ReviewDecision,
    ) -> Result<Application, AdmissionsError> {
        self.require_staff(actor, "change application status")?;
        let current = self.load(reference)?;
        let update = lifecycle::plan_review(&current, decision)?;
        let changed = update.log.is_some();
        let saved = self.store.apply_review(update)?;
        if changed {
            info!(
                reference = %saved.reference,
                from = %current.status,
                to = %saved.status,
                actor = %actor.label(),
                "application status changed"
            );
        }
        Ok(saved)
    }

    /// Owner-only removal of a draft application.
    pub fn cancel(
        &self,
        actor: &Actor,
        reference: &ApplicationReference,
    ) -> Result<(), AdmissionsError> {
        let application = self.load(reference)?;
        if !actor.owns(&application) {
            warn!(actor = %actor.label(), reference = %reference, "cancel refused");
            return Err(AdmissionsError::Forbidden("cancel this application"));
        }
        if application.status != ApplicationStatus::Draft {
            return Err(AdmissionsError::Precondition(format!(
                "only draft applications can be cancelled; this one is {}",
                application.status.label()
            )));
        }
        match self.store.delete_draft(&application.id) {
            Ok(()) => {
                info!(reference = %reference, "draft application cancelled");
                Ok(())
            }
            Err(RepositoryError::Conflict) => Err(AdmissionsError::Precondition(
                "the application was submitted while cancelling".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub fn detail(
        &self,
        actor: &Actor,
        reference: &ApplicationReference,
    ) -> Result<ApplicationDetail, AdmissionsError> {
        let application = self.load(reference)?;
        if !(actor.is_staff() || actor.owns(&application)) {
            return Err(AdmissionsError::Forbidden("view this application"));
        }
        let logs = self.store.logs(&application.id)?;
        Ok(ApplicationDetail {
            display_message: lifecycle::display_message(&application),
            application,
            logs,
        })
    }

    /// Students only ever see their own applications.
    pub fn list(
        &self,
        actor: &Actor,
        filter: ApplicationFilter,
    ) -> Result<Vec<Application>, AdmissionsError> {
        let filter = match actor {
            Actor::Staff { .. } => filter,
            Actor::Student { id } => ApplicationFilter {
                student: Some(*id),
                ..filter
            },
        };
        Ok(self.store.list(&filter)?)
    }

    /// Manual corrective action: drops the lead tier back to low.
    pub fn reset_lead_quality(
        &self,
        actor: &Actor,
        reference: &ApplicationReference,
    ) -> Result<Application, AdmissionsError> {
        self.require_staff(actor, "reset lead quality")?;
        let application = self.load(reference)?;
        let saved = self
            .store
            .set_lead_quality(&application.id, LeadQuality::Low)?;
        info!(reference = %reference, actor = %actor.label(), "lead quality reset to low");
        Ok(saved)
    }

    pub fn export(
        &self,
        actor: &Actor,
        reference: &ApplicationReference,
    ) -> Result<ApplicationExport, AdmissionsError> {
        self.require_staff(actor, "export applications")?;
        let application = self.load(reference)?;
        let student = self
            .store
            .profile(&application.student)?
            .ok_or(AdmissionsError::NotFound("student"))?;
        let university = self
            .store
            .university(&application.university)?
            .ok_or(AdmissionsError::NotFound("university"))?;
        let program = self
            .store
            .program(&application.program)?
            .ok_or(AdmissionsError::NotFound("program"))?;
        let documents = self.store.documents(&application.student)?;
        let test_scores = self.store.test_scores(&application.student)?;
        let logs = self.store.logs(&application.id)?;

        Ok(ApplicationExport {
            application,
            student,
            university,
            program,
            documents,
            test_scores,
            logs,
            generated_at: Utc::now(),
        })
    }

    pub fn export_csv(
        &self,
        actor: &Actor,
        filter: ApplicationFilter,
    ) -> Result<String, AdmissionsError> {
        self.require_staff(actor, "export applications")?;
        let applications = self.store.list(&filter)?;
        let mut rows = Vec::with_capacity(applications.len());
        for application in applications {
            let student = self
                .store
                .profile(&application.student)?
                .map(|profile| profile.username)
                .unwrap_or_default();
            let university = self
                .store
                .university(&application.university)?
                .map(|university| university.short_name)
                .unwrap_or_default();
            let program = self
                .store
                .program(&application.program)?
                .map(|program| program.name)
                .unwrap_or_default();
            rows.push(ApplicationRow {
                reference: application.reference.to_string(),
                student,
                university,
                program,
                application_type: application.application_type.as_str(),
                status: application.status.as_str(),
                lead_quality: application.lead_quality.as_str(),
                applied_on: application.applied_on,
            });
        }
        Ok(applications_csv(&rows)?)
    }

    /// Deletes test scores that expired before `today`.
    pub fn purge_expired_scores(
        &self,
        actor: &Actor,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<PurgeReport, AdmissionsError> {
        self.require_staff(actor, "purge expired test scores")?;
        let scores = self.store.purge_expired_scores(today, dry_run)?;
        info!(count = scores.len(), dry_run, %today, "expired test score sweep");
        Ok(PurgeReport {
            dry_run,
            today,
            scores,
        })
    }
}

/// Error raised by the admissions workflow.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionsError {
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("not permitted to {0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Precondition(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl From<FieldErrors> for AdmissionsError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}
