//! Multi-step application wizard.
//!
//! Step 1 collects personal details and the program choice, step 2 takes document
//! uploads and step 3 (only for programs with an English requirement) takes proof of
//! English proficiency and consent. Progress lives in the session store until the final
//! step creates the application.

pub mod forms;
pub mod session;
pub mod state;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use self::forms::{
    DocumentUploads, FieldDescriptor, NewScore, PersonalForm, ProofInput, StepForm, UploadedFile,
};
use self::state::{Advance, CompletedWizard, DocumentStep, EnglishProof, EnglishStep, WizardEvent};
use super::domain::{
    Application, ApplicationType, DocumentId, DocumentType, Program, ProgramId, StudentDocument,
    StudentId, StudentProfile, StudentTestScore, TestScoreId, University,
};
use super::lead_quality::{self, LeadSignals};
use super::repository::{EntityStore, RepositoryError};
use super::service::{AdmissionsError, ApplicationService, SubmissionRequest};
use super::validation::FieldErrors;

pub use self::session::{MemorySessionStore, SessionError, SessionStore, WIZARD_SESSION_KEY};
pub use self::state::{PersonalStep, WizardState};

/// Catalog hints carried on the entry URL, as slugs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntrySelectors {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
}

impl EntrySelectors {
    fn is_empty(&self) -> bool {
        let blank = |slug: &Option<String>| slug.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.program) && blank(&self.university)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardAction {
    #[default]
    Next,
    Prev,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WizardRequest {
    #[serde(default)]
    pub action: WizardAction,
    #[serde(default)]
    pub form: Option<StepForm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramChoice {
    pub id: ProgramId,
    pub name: String,
    pub slug: String,
    pub level: String,
    pub application_type: ApplicationType,
}

impl From<&Program> for ProgramChoice {
    fn from(program: &Program) -> Self {
        Self {
            id: program.id,
            name: program.name.clone(),
            slug: program.slug.clone(),
            level: program.level.clone(),
            application_type: program.application_type(),
        }
    }
}

/// What the presentation layer needs to render the current step.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub step: u8,
    pub total_steps: u8,
    pub english_required: bool,
    pub fields: Vec<FieldDescriptor>,
    pub values: BTreeMap<String, String>,
    pub program_choices: Vec<ProgramChoice>,
    pub program_level: Option<String>,
    pub application_type: Option<ApplicationType>,
    pub existing_documents: Vec<StudentDocument>,
    pub valid_scores: Vec<StudentTestScore>,
    pub errors: FieldErrors,
}

#[derive(Debug, Clone)]
pub enum WizardOutcome {
    /// Moved to (or stayed on) a step.
    Step(WizardView),
    /// Input was invalid; the same step is shown again with field errors and nothing was stored.
    Rejected(WizardView),
    Submitted(Application),
}

/// Catalog entries resolved from entry selectors; unresolvable hints are dropped.
#[derive(Debug, Clone, Default)]
struct Selection {
    university: Option<University>,
    program: Option<Program>,
}

impl Selection {
    /// True when a selector points somewhere other than the stored step 1 choice.
    fn conflicts_with(&self, answers: &PersonalStep) -> bool {
        let program_changed = self
            .program
            .as_ref()
            .is_some_and(|program| program.id != answers.program);
        let university_changed = self
            .university
            .as_ref()
            .is_some_and(|university| university.id != answers.university);
        program_changed || university_changed
    }
}

pub struct WizardController<S, W> {
    service: Arc<ApplicationService<S>>,
    sessions: Arc<W>,
}

impl<S, W> WizardController<S, W>
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    pub fn new(service: Arc<ApplicationService<S>>, sessions: Arc<W>) -> Self {
        Self { service, sessions }
    }

    fn store(&self) -> &S {
        self.service.store().as_ref()
    }

    /// Renders the current step, restarting the wizard when the entry selectors name a
    /// different program or university than the one already chosen on step 1.
    pub fn view(
        &self,
        student: StudentId,
        selectors: &EntrySelectors,
        today: NaiveDate,
    ) -> Result<WizardView, AdmissionsError> {
        let profile = self.profile(&student)?;
        let mut state = self.load_state(&student)?;
        let selection = if selectors.is_empty() {
            Selection::default()
        } else {
            self.resolve(selectors)?
        };

        if state
            .personal()
            .is_some_and(|answers| selection.conflicts_with(answers))
        {
            self.sessions.remove(&student, WIZARD_SESSION_KEY)?;
            state = WizardState::start();
            info!(student = %student, "selection changed; wizard restarted");
        }

        self.save_state(&student, &state)?;
        self.build_view(&profile, &state, &selection, today, FieldErrors::new())
    }

    /// Handles one step post.
    pub fn submit(
        &self,
        student: StudentId,
        request: WizardRequest,
        today: NaiveDate,
    ) -> Result<WizardOutcome, AdmissionsError> {
        let profile = self.profile(&student)?;
        let state = self.load_state(&student)?;

        if request.action == WizardAction::Prev {
            let state = state.back();
            self.save_state(&student, &state)?;
            debug!(student = %student, step = state.step_number(), "wizard moved back");
            let view = self.build_view(
                &profile,
                &state,
                &Selection::default(),
                today,
                FieldErrors::new(),
            )?;
            return Ok(WizardOutcome::Step(view));
        }

        let step = state.step_number();
        let form = match request.form {
            Some(form) if form.step_number() == step => form,
            Some(_) => {
                let errors = FieldErrors::single(
                    "step",
                    format!("This form does not belong to step {step}. Reload the wizard."),
                );
                return self.reject(&profile, &state, today, errors, None);
            }
            None => {
                let errors = FieldErrors::single("step", format!("Submit the step {step} form."));
                return self.reject(&profile, &state, today, errors, None);
            }
        };

        let event = match form {
            StepForm::Personal(form) => {
                match forms::validate_personal(&form, &profile, self.store(), today)? {
                    Ok(answers) => {
                        self.backfill(&profile, &answers)?;
                        WizardEvent::PersonalCompleted(answers)
                    }
                    Err(errors) => {
                        return self.reject(&profile, &state, today, errors, Some(&form));
                    }
                }
            }
            StepForm::Documents(form) => match forms::validate_documents(&form) {
                Ok(uploads) => {
                    let program = state
                        .personal()
                        .map(|answers| answers.program)
                        .ok_or_else(|| {
                            AdmissionsError::Precondition("step 1 has not been completed".into())
                        })?;
                    let documents = self.store_documents(&student, uploads)?;
                    WizardEvent::DocumentsCompleted {
                        documents,
                        english_required: self.program_requires_english(&program)?,
                    }
                }
                Err(errors) => return self.reject(&profile, &state, today, errors, None),
            },
            StepForm::English(form) => {
                let scores = self.valid_scores(&student, today)?;
                let validity_days = self.service.config().score_validity_days;
                match forms::validate_english(&form, &scores, today, validity_days) {
                    Ok(input) => {
                        let proof = match input.proof {
                            ProofInput::None => None,
                            ProofInput::Existing(id) => Some(EnglishProof::Existing(id)),
                            ProofInput::New(score) => {
                                Some(EnglishProof::New(self.store_score(&student, score)?))
                            }
                        };
                        WizardEvent::EnglishCompleted(EnglishStep {
                            proof,
                            consent: input.consent,
                        })
                    }
                    Err(errors) => return self.reject(&profile, &state, today, errors, None),
                }
            }
        };

        let advance = state
            .apply(event)
            .map_err(|err| AdmissionsError::Precondition(err.to_string()))?;
        match advance {
            Advance::Step(next) => {
                self.save_state(&student, &next)?;
                debug!(
                    student = %student,
                    from = step,
                    to = next.step_number(),
                    "wizard step completed"
                );
                let profile = self.profile(&student)?;
                let view = self.build_view(
                    &profile,
                    &next,
                    &Selection::default(),
                    today,
                    FieldErrors::new(),
                )?;
                Ok(WizardOutcome::Step(view))
            }
            Advance::Ready(done) => self.finalize(&student, done),
        }
    }

    fn finalize(
        &self,
        student: &StudentId,
        done: CompletedWizard,
    ) -> Result<WizardOutcome, AdmissionsError> {
        let CompletedWizard {
            personal, english, ..
        } = done;

        let program_requires_english = self.program_requires_english(&personal.program)?;
        let signals = LeadSignals {
            has_documents: !self.store().documents(student)?.is_empty(),
            program_requires_english,
            has_english_proof: program_requires_english
                && english.as_ref().is_some_and(|step| step.proof.is_some()),
        };
        let quality = lead_quality::score(signals);

        let application = self.service.submit(SubmissionRequest {
            student: *student,
            university: personal.university,
            program: personal.program,
            application_type: personal.application_type,
            remarks: personal.remarks,
            consent_given: english.as_ref().is_some_and(|step| step.consent),
            terms_accepted: personal.terms_accepted,
            lead_quality: quality,
        })?;

        self.sessions.remove(student, WIZARD_SESSION_KEY)?;
        info!(
            student = %student,
            reference = %application.reference,
            lead_quality = quality.as_str(),
            "wizard submitted"
        );
        Ok(WizardOutcome::Submitted(application))
    }

    fn reject(
        &self,
        profile: &StudentProfile,
        state: &WizardState,
        today: NaiveDate,
        errors: FieldErrors,
        echo: Option<&PersonalForm>,
    ) -> Result<WizardOutcome, AdmissionsError> {
        let mut view = self.build_view(profile, state, &Selection::default(), today, errors)?;
        if let Some(form) = echo {
            echo_personal(&mut view, form);
        }
        Ok(WizardOutcome::Rejected(view))
    }

    fn profile(&self, student: &StudentId) -> Result<StudentProfile, AdmissionsError> {
        self.store()
            .profile(student)?
            .ok_or(AdmissionsError::NotFound("student"))
    }

    fn load_state(&self, student: &StudentId) -> Result<WizardState, AdmissionsError> {
        let Some(value) = self.sessions.get(student, WIZARD_SESSION_KEY)? else {
            return Ok(WizardState::start());
        };
        match serde_json::from_value(value) {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(student = %student, error = %err, "discarding unreadable wizard session");
                Ok(WizardState::start())
            }
        }
    }

    fn save_state(&self, student: &StudentId, state: &WizardState) -> Result<(), AdmissionsError> {
        let value = serde_json::to_value(state).map_err(SessionError::from)?;
        self.sessions.set(student, WIZARD_SESSION_KEY, value)?;
        Ok(())
    }

    fn resolve(&self, selectors: &EntrySelectors) -> Result<Selection, RepositoryError> {
        let store = self.store();
        let slug = |raw: &Option<String>| {
            raw.as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let mut program = None;
        if let Some(slug) = slug(&selectors.program) {
            program = store
                .program_by_slug(&slug)?
                .filter(|program| program.is_active);
            if program.is_none() {
                warn!(program = %slug, "ignoring unknown program selector");
            }
        }

        let mut university = None;
        if let Some(slug) = slug(&selectors.university) {
            university = store.university_by_slug(&slug)?;
            if university.is_none() {
                warn!(university = %slug, "ignoring unknown university selector");
            }
        }

        match (&university, &program) {
            (Some(university), Some(chosen)) if chosen.university != university.id => {
                warn!(
                    program = %chosen.slug,
                    university = %university.slug,
                    "ignoring program selector from another university"
                );
                program = None;
            }
            (None, Some(chosen)) => {
                university = store.university(&chosen.university)?;
            }
            _ => {}
        }

        Ok(Selection {
            university,
            program,
        })
    }

    fn program_requires_english(&self, program: &ProgramId) -> Result<bool, RepositoryError> {
        Ok(!self.store().english_requirements(program)?.is_empty())
    }

    fn valid_scores(
        &self,
        student: &StudentId,
        today: NaiveDate,
    ) -> Result<Vec<StudentTestScore>, RepositoryError> {
        let mut scores: Vec<StudentTestScore> = self
            .store()
            .test_scores(student)?
            .into_iter()
            .filter(|score| score.is_active(today))
            .collect();
        scores.sort_by(|a, b| b.test_date.cmp(&a.test_date));
        Ok(scores)
    }

    fn backfill(
        &self,
        profile: &StudentProfile,
        answers: &PersonalStep,
    ) -> Result<(), AdmissionsError> {
        let mut updated = profile.clone();
        if forms::backfill_profile(&mut updated, answers) {
            self.store().save_profile(updated)?;
            info!(student = %profile.id, "profile back-filled from wizard");
        }
        Ok(())
    }

    /// Passport and transcript replace earlier uploads of their type; other files are added.
    fn store_documents(
        &self,
        student: &StudentId,
        uploads: DocumentUploads,
    ) -> Result<DocumentStep, RepositoryError> {
        let DocumentUploads {
            passport,
            transcript,
            others,
        } = uploads;
        let mut uploaded = Vec::new();

        let singles = [
            (DocumentType::Passport, passport),
            (DocumentType::Transcript, transcript),
        ];
        for (doc_type, file) in singles {
            if let Some(file) = file {
                let document = new_document(student, doc_type, file);
                uploaded.push(document.id);
                self.store().replace_document(document)?;
            }
        }
        for file in others {
            let document = new_document(student, DocumentType::Other, file);
            uploaded.push(document.id);
            self.store().add_document(document)?;
        }

        Ok(DocumentStep { uploaded })
    }

    fn store_score(
        &self,
        student: &StudentId,
        score: NewScore,
    ) -> Result<TestScoreId, RepositoryError> {
        let record = StudentTestScore {
            id: TestScoreId::new(),
            student: *student,
            test_type: score.test_type,
            test_date: score.test_date,
            listening_score: score.listening_score,
            reading_score: score.reading_score,
            speaking_score: score.speaking_score,
            writing_score: score.writing_score,
            overall_score: score.overall_score,
            expiry_date: Some(score.expiry_date),
        };
        let id = record.id;
        self.store().add_test_score(record)?;
        info!(student = %student, score = %id, "test score recorded from wizard");
        Ok(id)
    }

    fn build_view(
        &self,
        profile: &StudentProfile,
        state: &WizardState,
        selection: &Selection,
        today: NaiveDate,
        errors: FieldErrors,
    ) -> Result<WizardView, AdmissionsError> {
        let store = self.store();
        let answers = state.personal();
        let step = state.step_number();

        let university_id = selection
            .university
            .as_ref()
            .map(|university| university.id)
            .or_else(|| answers.map(|answers| answers.university));
        let program = match &selection.program {
            Some(program) => Some(program.clone()),
            None => match answers {
                Some(answers) => store.program(&answers.program)?,
                None => None,
            },
        };

        let english_required = match &program {
            Some(program) => self.program_requires_english(&program.id)?,
            None => false,
        };
        let total_steps = if program.is_some() && !english_required {
            2
        } else {
            3
        };

        let mut view = WizardView {
            step,
            total_steps,
            english_required,
            fields: Vec::new(),
            values: BTreeMap::new(),
            program_choices: Vec::new(),
            program_level: program.as_ref().map(|program| program.level.clone()),
            application_type: program.as_ref().map(Program::application_type),
            existing_documents: Vec::new(),
            valid_scores: Vec::new(),
            errors,
        };

        match step {
            1 => {
                view.fields = forms::personal_fields(profile);
                view.values = personal_values(profile, answers);
                if let Some(university) = university_id {
                    view.values
                        .insert("university".to_string(), university.to_string());
                    view.program_choices = store
                        .active_programs(&university)?
                        .iter()
                        .map(ProgramChoice::from)
                        .collect();
                }
                if let Some(program) = &program {
                    view.values
                        .insert("program".to_string(), program.id.to_string());
                }
            }
            2 => {
                view.fields = forms::document_fields();
                view.existing_documents = store.documents(&profile.id)?;
            }
            _ => {
                view.fields = forms::english_fields();
                view.valid_scores = self.valid_scores(&profile.id, today)?;
                if let Some(english) = state.english() {
                    if let Some(proof) = english.proof {
                        view.values
                            .insert("existing_score".to_string(), proof.score().to_string());
                    }
                    view.values
                        .insert("consent".to_string(), english.consent.to_string());
                }
            }
        }

        Ok(view)
    }
}

fn new_document(student: &StudentId, doc_type: DocumentType, file: UploadedFile) -> StudentDocument {
    StudentDocument {
        id: DocumentId::new(),
        student: *student,
        doc_type,
        file_name: file.file_name,
        storage_key: file.storage_key,
        uploaded_at: Utc::now(),
    }
}

/// Step 1 prefill: populated profile values win, then earlier answers.
fn personal_values(
    profile: &StudentProfile,
    answers: Option<&PersonalStep>,
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    let mut put = |name: &str, from_profile: Option<String>, from_answers: Option<String>| {
        if let Some(value) = from_profile
            .filter(|value| !value.is_empty())
            .or(from_answers)
        {
            values.insert(name.to_string(), value);
        }
    };
    let text = |value: &str| Some(value.to_string());

    put(
        "phone",
        text(&profile.phone),
        answers.map(|a| a.phone.clone()),
    );
    put(
        "gender",
        profile.gender.map(|g| g.as_str().to_string()),
        answers.map(|a| a.gender.as_str().to_string()),
    );
    put(
        "nationality",
        text(&profile.nationality),
        answers.map(|a| a.nationality.clone()),
    );
    put(
        "date_of_birth",
        profile.date_of_birth.map(|d| d.to_string()),
        answers.map(|a| a.date_of_birth.to_string()),
    );
    put(
        "passport_number",
        text(&profile.passport_number),
        answers.map(|a| a.passport_number.clone()),
    );
    put(
        "passport_expiry",
        profile.passport_expiry.map(|d| d.to_string()),
        answers.map(|a| a.passport_expiry.to_string()),
    );
    put(
        "address",
        text(&profile.address),
        answers.map(|a| a.address.clone()),
    );
    put("remarks", None, answers.map(|a| a.remarks.clone()));
    if let Some(answers) = answers {
        values.insert(
            "terms_accepted".to_string(),
            answers.terms_accepted.to_string(),
        );
    }
    values
}

/// Shows rejected step 1 input back to the student, except on read-only fields.
fn echo_personal(view: &mut WizardView, form: &PersonalForm) {
    let read_only: Vec<&str> = view
        .fields
        .iter()
        .filter(|field| field.read_only)
        .map(|field| field.name)
        .collect();
    let submitted = [
        ("university", &form.university),
        ("program", &form.program),
        ("phone", &form.phone),
        ("gender", &form.gender),
        ("nationality", &form.nationality),
        ("date_of_birth", &form.date_of_birth),
        ("passport_number", &form.passport_number),
        ("passport_expiry", &form.passport_expiry),
        ("address", &form.address),
        ("remarks", &form.remarks),
    ];
    for (name, value) in submitted {
        if read_only.contains(&name) {
            continue;
        }
        if let Some(value) = value {
            view.values.insert(name.to_string(), value.clone());
        }
    }
    view.values
        .insert("terms_accepted".to_string(), form.terms_accepted.to_string());
}
