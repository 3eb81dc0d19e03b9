//! Student applications from wizard intake through staff review.

pub mod domain;
pub mod export;
pub mod lead_quality;
pub mod lifecycle;
pub mod memory;
pub mod reference;
pub mod repository;
pub mod router;
pub mod service;
pub(crate) mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApplicationLog, ApplicationStatus, ApplicationType,
    DeliveryType, DocumentId, DocumentType, EnglishRequirement, Gender, LeadQuality, LogDraft,
    NewApplication, Program, ProgramId, Score, StudentDocument, StudentId, StudentProfile,
    StudentTestScore, TestScoreId, TestType, University, UniversityId,
};
pub use export::{ApplicationExport, ExportError, SummaryRenderer, TextSummary};
pub use lead_quality::LeadSignals;
pub use lifecycle::{Actor, ReviewDecision, TransitionError};
pub use memory::MemoryStore;
pub use reference::ApplicationReference;
pub use repository::{
    ApplicationFilter, ApplicationRepository, CatalogRepository, EntityStore, RepositoryError,
    StudentRepository,
};
pub use router::{admissions_router, PortalState, STAFF_HEADER, STUDENT_HEADER};
pub use service::{
    AdmissionsError, ApplicationDetail, ApplicationService, PurgeReport, SubmissionRequest,
};
pub use validation::FieldErrors;
pub use wizard::{
    EntrySelectors, MemorySessionStore, SessionError, SessionStore, WizardAction,
    WizardController, WizardOutcome, WizardRequest, WizardView,
};
