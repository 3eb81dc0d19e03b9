use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use axum::Router;
use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use crate::config::AdmissionsConfig;
use crate::workflows::admissions::domain::{
    Application, ApplicationId, ApplicationLog, DeliveryType, EnglishRequirement, LeadQuality,
    LogDraft, NewApplication, Program, ProgramId, Score, StudentDocument, StudentId,
    StudentProfile, StudentTestScore, University, UniversityId,
};
use crate::workflows::admissions::lifecycle::{Actor, ReviewUpdate};
use crate::workflows::admissions::memory::MemoryStore;
use crate::workflows::admissions::reference::ApplicationReference;
use crate::workflows::admissions::repository::{
    ApplicationFilter, ApplicationRepository, CatalogRepository, RepositoryError,
    StudentRepository,
};
use crate::workflows::admissions::wizard::forms::PersonalForm;
use crate::workflows::admissions::wizard::{MemorySessionStore, WizardController};
use crate::workflows::admissions::{
    admissions_router, ApplicationService, PortalState, SubmissionRequest, TextSummary,
    STAFF_HEADER,
};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
}

pub(super) fn config() -> AdmissionsConfig {
    AdmissionsConfig::default()
}

pub(super) fn staff() -> Actor {
    Actor::staff("registrar")
}

pub(super) struct Catalog {
    pub(super) tud: University,
    pub(super) ufc: University,
    /// Master's at TUD with an IELTS requirement.
    pub(super) data_science: Program,
    /// Bachelor's at TUD without English requirement.
    pub(super) business: Program,
    /// Diploma at UFC without English requirement.
    pub(super) hospitality: Program,
    /// Inactive program at TUD.
    pub(super) archived: Program,
}

fn university(name: &str, short_name: &str, slug: &str) -> University {
    University {
        id: UniversityId::new(),
        name: name.to_string(),
        short_name: short_name.to_string(),
        slug: slug.to_string(),
    }
}

fn program(university: &University, name: &str, slug: &str, level: &str) -> Program {
    Program {
        id: ProgramId::new(),
        university: university.id,
        name: name.to_string(),
        slug: slug.to_string(),
        program_type: name.to_string(),
        level: level.to_string(),
        delivery: DeliveryType::OnCampus,
        duration: "2 years".to_string(),
        is_active: true,
    }
}

pub(super) fn seed_catalog(store: &MemoryStore) -> Catalog {
    let tud = university("Trikon University Dubai", "TUD", "trikon-university-dubai");
    let ufc = university("UAE Future College", "UFC", "uae-future-college");
    let data_science = program(&tud, "MSc Data Science", "msc-data-science", "Master's");
    let business = program(
        &tud,
        "BBA Business Administration",
        "bba-business-administration",
        "Bachelor's",
    );
    let hospitality = program(
        &ufc,
        "Diploma in Hospitality",
        "diploma-hospitality",
        "Diploma",
    );
    let mut archived = program(&tud, "BSc Archived", "bsc-archived", "Bachelor's");
    archived.is_active = false;

    store.insert_university(tud.clone()).expect("seed university");
    store.insert_university(ufc.clone()).expect("seed university");
    for entry in [&data_science, &business, &hospitality, &archived] {
        store.insert_program(entry.clone()).expect("seed program");
    }
    store
        .insert_english_requirement(EnglishRequirement {
            id: Uuid::new_v4(),
            program: data_science.id,
            ielts: Some(Score::from_tenths(65)),
            toefl: Some(Score::from_tenths(900)),
            pte: None,
        })
        .expect("seed requirement");

    Catalog {
        tud,
        ufc,
        data_science,
        business,
        hospitality,
        archived,
    }
}

/// Student with nothing on the profile beyond the account.
pub(super) fn register_student(store: &MemoryStore, username: &str) -> StudentProfile {
    let profile = StudentProfile::new(username, format!("{username}@example.com"));
    store.insert_student(profile.clone()).expect("seed student");
    profile
}

pub(super) fn personal_form(university: &University, program: &Program) -> PersonalForm {
    PersonalForm {
        university: Some(university.id.to_string()),
        program: Some(program.id.to_string()),
        phone: Some("0501234567".to_string()),
        gender: Some("male".to_string()),
        nationality: Some("UAE".to_string()),
        date_of_birth: Some("2000-01-01".to_string()),
        passport_number: Some("A1234567".to_string()),
        passport_expiry: Some("2030-01-01".to_string()),
        address: Some("Dubai".to_string()),
        remarks: Some("Interested in the January intake".to_string()),
        terms_accepted: true,
    }
}

pub(super) fn submission(
    student: StudentId,
    university: &University,
    program: &Program,
) -> SubmissionRequest {
    SubmissionRequest {
        student,
        university: university.id,
        program: program.id,
        application_type: program.application_type(),
        remarks: String::new(),
        consent_given: true,
        terms_accepted: true,
        lead_quality: LeadQuality::Medium,
    }
}

pub(super) struct Portal {
    pub(super) store: Arc<MemoryStore>,
    pub(super) sessions: Arc<MemorySessionStore>,
    pub(super) service: Arc<ApplicationService<MemoryStore>>,
    pub(super) wizard: Arc<WizardController<MemoryStore, MemorySessionStore>>,
    pub(super) catalog: Catalog,
}

impl Portal {
    pub(super) fn state(&self) -> PortalState<MemoryStore, MemorySessionStore> {
        PortalState {
            service: Arc::clone(&self.service),
            wizard: Arc::clone(&self.wizard),
            renderer: Arc::new(TextSummary::new(config().export_detail_width)),
        }
    }

    pub(super) fn router(&self) -> Router {
        admissions_router(self.state())
    }
}

pub(super) fn staff_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(STAFF_HEADER, HeaderValue::from_static("registrar"));
    headers
}

pub(super) fn build_portal() -> Portal {
    let store = Arc::new(MemoryStore::new());
    let catalog = seed_catalog(&store);
    let sessions = Arc::new(MemorySessionStore::new());
    let service = Arc::new(ApplicationService::new(Arc::clone(&store), config()));
    let wizard = Arc::new(WizardController::new(
        Arc::clone(&service),
        Arc::clone(&sessions),
    ));
    Portal {
        store,
        sessions,
        service,
        wizard,
        catalog,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

/// Memory store whose first `conflicts` creations report a reference collision.
pub(super) struct CollidingStore {
    pub(super) inner: MemoryStore,
    conflicts: AtomicU32,
}

impl CollidingStore {
    pub(super) fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            conflicts: AtomicU32::new(conflicts),
        }
    }
}

impl ApplicationRepository for CollidingStore {
    fn create(
        &self,
        application: NewApplication,
        log: LogDraft,
    ) -> Result<Application, RepositoryError> {
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Conflict);
        }
        self.inner.create(application, log)
    }

    fn fetch(
        &self,
        reference: &ApplicationReference,
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.fetch(reference)
    }

    fn logs(&self, application: &ApplicationId) -> Result<Vec<ApplicationLog>, RepositoryError> {
        self.inner.logs(application)
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        self.inner.list(filter)
    }

    fn apply_review(&self, update: ReviewUpdate) -> Result<Application, RepositoryError> {
        self.inner.apply_review(update)
    }

    fn set_lead_quality(
        &self,
        application: &ApplicationId,
        quality: LeadQuality,
    ) -> Result<Application, RepositoryError> {
        self.inner.set_lead_quality(application, quality)
    }

    fn delete_draft(&self, application: &ApplicationId) -> Result<(), RepositoryError> {
        self.inner.delete_draft(application)
    }
}

impl StudentRepository for CollidingStore {
    fn profile(&self, student: &StudentId) -> Result<Option<StudentProfile>, RepositoryError> {
        self.inner.profile(student)
    }

    fn save_profile(&self, profile: StudentProfile) -> Result<(), RepositoryError> {
        self.inner.save_profile(profile)
    }

    fn documents(&self, student: &StudentId) -> Result<Vec<StudentDocument>, RepositoryError> {
        self.inner.documents(student)
    }

    fn replace_document(&self, document: StudentDocument) -> Result<(), RepositoryError> {
        self.inner.replace_document(document)
    }

    fn add_document(&self, document: StudentDocument) -> Result<(), RepositoryError> {
        self.inner.add_document(document)
    }

    fn test_scores(
        &self,
        student: &StudentId,
    ) -> Result<Vec<StudentTestScore>, RepositoryError> {
        self.inner.test_scores(student)
    }

    fn add_test_score(&self, score: StudentTestScore) -> Result<(), RepositoryError> {
        self.inner.add_test_score(score)
    }

    fn purge_expired_scores(
        &self,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<Vec<StudentTestScore>, RepositoryError> {
        self.inner.purge_expired_scores(today, dry_run)
    }
}

impl CatalogRepository for CollidingStore {
    fn university(&self, id: &UniversityId) -> Result<Option<University>, RepositoryError> {
        self.inner.university(id)
    }

    fn university_by_slug(&self, slug: &str) -> Result<Option<University>, RepositoryError> {
        self.inner.university_by_slug(slug)
    }

    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError> {
        self.inner.program(id)
    }

    fn program_by_slug(&self, slug: &str) -> Result<Option<Program>, RepositoryError> {
        self.inner.program_by_slug(slug)
    }

    fn active_programs(&self, university: &UniversityId) -> Result<Vec<Program>, RepositoryError> {
        self.inner.active_programs(university)
    }

    fn english_requirements(
        &self,
        program: &ProgramId,
    ) -> Result<Vec<EnglishRequirement>, RepositoryError> {
        self.inner.english_requirements(program)
    }
}
