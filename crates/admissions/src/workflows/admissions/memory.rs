use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::domain::{
    Application, ApplicationId, ApplicationLog, ApplicationStatus, EnglishRequirement,
    LeadQuality, LogDraft, NewApplication, Program, ProgramId, StudentDocument, StudentId,
    StudentProfile, StudentTestScore, University, UniversityId,
};
use super::lifecycle::ReviewUpdate;
use super::reference::ApplicationReference;
use super::repository::{
    ApplicationFilter, ApplicationRepository, CatalogRepository, RepositoryError,
    StudentRepository,
};

#[derive(Default)]
struct StoreState {
    applications: Vec<Application>,
    logs: Vec<ApplicationLog>,
    students: HashMap<StudentId, StudentProfile>,
    documents: Vec<StudentDocument>,
    scores: Vec<StudentTestScore>,
    universities: Vec<University>,
    programs: Vec<Program>,
    requirements: Vec<EnglishRequirement>,
}

/// Process-local entity store.
///
/// A single mutex guards every table, so reference allocation and review saves are
/// serialized and each application write lands together with its log entry.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub fn insert_student(&self, profile: StudentProfile) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.students.contains_key(&profile.id) {
            return Err(RepositoryError::Conflict);
        }
        state.students.insert(profile.id, profile);
        Ok(())
    }

    pub fn insert_university(&self, university: University) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state
            .universities
            .iter()
            .any(|existing| existing.id == university.id || existing.slug == university.slug)
        {
            return Err(RepositoryError::Conflict);
        }
        state.universities.push(university);
        Ok(())
    }

    pub fn insert_program(&self, program: Program) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state
            .universities
            .iter()
            .any(|university| university.id == program.university)
        {
            return Err(RepositoryError::NotFound);
        }
        if state
            .programs
            .iter()
            .any(|existing| existing.id == program.id || existing.slug == program.slug)
        {
            return Err(RepositoryError::Conflict);
        }
        state.programs.push(program);
        Ok(())
    }

    pub fn insert_english_requirement(
        &self,
        requirement: EnglishRequirement,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state
            .programs
            .iter()
            .any(|program| program.id == requirement.program)
        {
            return Err(RepositoryError::NotFound);
        }
        state.requirements.push(requirement);
        Ok(())
    }
}

fn append_log(state: &mut StoreState, application: ApplicationId, draft: LogDraft) {
    state.logs.push(ApplicationLog {
        id: Uuid::new_v4(),
        application,
        timestamp: Utc::now(),
        event: draft.event,
        details: draft.details,
    });
}

impl ApplicationRepository for MemoryStore {
    fn create(
        &self,
        application: NewApplication,
        log: LogDraft,
    ) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;

        if !state.students.contains_key(&application.student) {
            return Err(RepositoryError::NotFound);
        }

        let reference = ApplicationReference::next_after(
            state
                .applications
                .iter()
                .map(|existing| existing.reference.as_str()),
        )
        .ok_or_else(|| RepositoryError::Unavailable("reference space exhausted".to_string()))?;

        if state
            .applications
            .iter()
            .any(|existing| existing.reference == reference)
        {
            return Err(RepositoryError::Conflict);
        }

        let now = Utc::now();
        let NewApplication {
            student,
            university,
            program,
            application_type,
            status,
            remarks,
            consent_given,
            terms_accepted,
            lead_quality,
        } = application;

        let record = Application {
            id: ApplicationId::new(),
            reference,
            student,
            university,
            program,
            application_type,
            status,
            applied_on: now.date_naive(),
            remarks,
            consent_given,
            terms_accepted,
            lead_quality,
            custom_status_message: None,
            created_at: now,
            updated_at: now,
        };

        state.applications.push(record.clone());
        append_log(&mut state, record.id, log);
        Ok(record)
    }

    fn fetch(
        &self,
        reference: &ApplicationReference,
    ) -> Result<Option<Application>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .applications
            .iter()
            .find(|application| &application.reference == reference)
            .cloned())
    }

    fn logs(&self, application: &ApplicationId) -> Result<Vec<ApplicationLog>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .logs
            .iter()
            .filter(|log| &log.application == application)
            .cloned()
            .collect())
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        let state = self.lock()?;
        let mut applications: Vec<Application> = state
            .applications
            .iter()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect();
        applications.sort_by(|a, b| {
            b.applied_on
                .cmp(&a.applied_on)
                .then_with(|| b.reference.cmp(&a.reference))
        });
        Ok(applications)
    }

    fn apply_review(&self, update: ReviewUpdate) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;
        let ReviewUpdate {
            application,
            expected_status,
            status,
            custom_status_message,
            log,
        } = update;

        let record = state
            .applications
            .iter_mut()
            .find(|record| record.id == application)
            .ok_or(RepositoryError::NotFound)?;

        if record.status != expected_status {
            return Err(RepositoryError::Conflict);
        }

        record.status = status;
        record.custom_status_message = custom_status_message;
        record.updated_at = Utc::now();
        let saved = record.clone();

        if let Some(draft) = log {
            append_log(&mut state, application, draft);
        }
        Ok(saved)
    }

    fn set_lead_quality(
        &self,
        application: &ApplicationId,
        quality: LeadQuality,
    ) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;
        let record = state
            .applications
            .iter_mut()
            .find(|record| &record.id == application)
            .ok_or(RepositoryError::NotFound)?;
        record.lead_quality = quality;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    fn delete_draft(&self, application: &ApplicationId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let position = state
            .applications
            .iter()
            .position(|record| &record.id == application)
            .ok_or(RepositoryError::NotFound)?;

        if state.applications[position].status != ApplicationStatus::Draft {
            return Err(RepositoryError::Conflict);
        }

        state.applications.remove(position);
        state.logs.retain(|log| &log.application != application);
        Ok(())
    }
}

impl StudentRepository for MemoryStore {
    fn profile(&self, student: &StudentId) -> Result<Option<StudentProfile>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.students.get(student).cloned())
    }

    fn save_profile(&self, profile: StudentProfile) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.students.get_mut(&profile.id) {
            Some(existing) => {
                *existing = profile;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn documents(&self, student: &StudentId) -> Result<Vec<StudentDocument>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .documents
            .iter()
            .rev()
            .filter(|document| &document.student == student)
            .cloned()
            .collect())
    }

    fn replace_document(&self, document: StudentDocument) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.documents.retain(|existing| {
            !(existing.student == document.student && existing.doc_type == document.doc_type)
        });
        state.documents.push(document);
        Ok(())
    }

    fn add_document(&self, document: StudentDocument) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.documents.push(document);
        Ok(())
    }

    fn test_scores(
        &self,
        student: &StudentId,
    ) -> Result<Vec<StudentTestScore>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .scores
            .iter()
            .filter(|score| &score.student == student)
            .cloned()
            .collect())
    }

    fn add_test_score(&self, score: StudentTestScore) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.scores.push(score);
        Ok(())
    }

    fn purge_expired_scores(
        &self,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<Vec<StudentTestScore>, RepositoryError> {
        let mut state = self.lock()?;
        let expired: Vec<StudentTestScore> = state
            .scores
            .iter()
            .filter(|score| !score.is_active(today))
            .cloned()
            .collect();
        if !dry_run {
            state.scores.retain(|score| score.is_active(today));
        }
        Ok(expired)
    }
}

impl CatalogRepository for MemoryStore {
    fn university(&self, id: &UniversityId) -> Result<Option<University>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .universities
            .iter()
            .find(|university| &university.id == id)
            .cloned())
    }

    fn university_by_slug(&self, slug: &str) -> Result<Option<University>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .universities
            .iter()
            .find(|university| university.slug == slug)
            .cloned())
    }

    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.programs.iter().find(|program| &program.id == id).cloned())
    }

    fn program_by_slug(&self, slug: &str) -> Result<Option<Program>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .programs
            .iter()
            .find(|program| program.slug == slug)
            .cloned())
    }

    fn active_programs(&self, university: &UniversityId) -> Result<Vec<Program>, RepositoryError> {
        let state = self.lock()?;
        let mut programs: Vec<Program> = state
            .programs
            .iter()
            .filter(|program| &program.university == university && program.is_active)
            .cloned()
            .collect();
        programs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(programs)
    }

    fn english_requirements(
        &self,
        program: &ProgramId,
    ) -> Result<Vec<EnglishRequirement>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .requirements
            .iter()
            .filter(|requirement| &requirement.program == program)
            .cloned()
            .collect())
    }
}
