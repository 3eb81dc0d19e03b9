use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::state::PersonalStep;
use crate::workflows::admissions::domain::{
    Gender, Program, ProgramId, Score, StudentProfile, StudentTestScore, TestScoreId, TestType,
    University, UniversityId,
};
use crate::workflows::admissions::repository::{CatalogRepository, RepositoryError};
use crate::workflows::admissions::validation::{
    required_date, required_text, FieldErrors, INVALID_CHOICE, REQUIRED,
};

pub(crate) const DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

/// Raw input for one wizard step, tagged with the step it was rendered for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepForm {
    Personal(PersonalForm),
    Documents(DocumentForm),
    English(EnglishForm),
}

impl StepForm {
    pub fn step_number(&self) -> u8 {
        match self {
            StepForm::Personal(_) => 1,
            StepForm::Documents(_) => 2,
            StepForm::English(_) => 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalForm {
    pub university: Option<String>,
    pub program: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub passport_number: Option<String>,
    pub passport_expiry: Option<String>,
    pub address: Option<String>,
    pub remarks: Option<String>,
    pub terms_accepted: bool,
}

/// File already written to storage by the upload layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    pub storage_key: String,
}

impl UploadedFile {
    fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

/// Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentForm {
    pub passport: Option<UploadedFile>,
    pub transcript: Option<UploadedFile>,
    pub other_documents: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnglishForm {
    pub use_existing_score: bool,
    pub existing_score: Option<String>,
    pub test_type: Option<String>,
    pub test_date: Option<String>,
    pub listening_score: Option<String>,
    pub reading_score: Option<String>,
    pub speaking_score: Option<String>,
    pub writing_score: Option<String>,
    pub overall_score: Option<String>,
    pub consent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Choice,
    Text,
    LongText,
    Date,
    Checkbox,
    File,
    Files,
    Score,
}

/// Presentation hint for one field of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl FieldDescriptor {
    fn new(name: &'static str, label: &'static str, kind: FieldKind, required: bool) -> Self {
        Self {
            name,
            label,
            kind,
            required,
            read_only: false,
            constraint: None,
        }
    }

    fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

const PHONE_MAX: usize = 50;
const NATIONALITY_MAX: usize = 100;
const PASSPORT_MAX: usize = 50;
const ADDRESS_MAX: usize = 1000;
const REMARKS_MAX: usize = 2000;

type ProfileField = (&'static str, &'static str, FieldKind, Option<usize>, bool);

/// Profile-backed step 1 fields: name, label, kind, max length, populated on the profile.
fn profile_fields(profile: &StudentProfile) -> [ProfileField; 7] {
    [
        (
            "phone",
            "Phone Number",
            FieldKind::Text,
            Some(PHONE_MAX),
            !profile.phone.is_empty(),
        ),
        (
            "gender",
            "Gender",
            FieldKind::Choice,
            None,
            profile.gender.is_some(),
        ),
        (
            "nationality",
            "Nationality",
            FieldKind::Text,
            Some(NATIONALITY_MAX),
            !profile.nationality.is_empty(),
        ),
        (
            "date_of_birth",
            "Date of Birth",
            FieldKind::Date,
            None,
            profile.date_of_birth.is_some(),
        ),
        (
            "passport_number",
            "Passport Number",
            FieldKind::Text,
            Some(PASSPORT_MAX),
            !profile.passport_number.is_empty(),
        ),
        (
            "passport_expiry",
            "Passport Expiry",
            FieldKind::Date,
            None,
            profile.passport_expiry.is_some(),
        ),
        (
            "address",
            "Address",
            FieldKind::LongText,
            Some(ADDRESS_MAX),
            !profile.address.is_empty(),
        ),
    ]
}

pub fn personal_fields(profile: &StudentProfile) -> Vec<FieldDescriptor> {
    let mut fields = vec![
        FieldDescriptor::new("university", "University", FieldKind::Choice, true),
        FieldDescriptor::new("program", "Program", FieldKind::Choice, true)
            .constraint("active program of the selected university"),
    ];
    for (name, label, kind, max_len, populated) in profile_fields(profile) {
        let mut field = FieldDescriptor::new(name, label, kind, true).read_only(populated);
        if let Some(max_len) = max_len {
            field = field.constraint(format!("at most {max_len} characters"));
        }
        if kind == FieldKind::Choice {
            field = field.constraint("male, female or other");
        }
        fields.push(field);
    }
    fields.push(
        FieldDescriptor::new("remarks", "Remarks", FieldKind::LongText, false)
            .constraint(format!("at most {REMARKS_MAX} characters")),
    );
    fields.push(FieldDescriptor::new(
        "terms_accepted",
        "I accept the terms and conditions",
        FieldKind::Checkbox,
        true,
    ));
    fields
}

pub fn document_fields() -> Vec<FieldDescriptor> {
    let formats = format!("one of: {}", DOCUMENT_EXTENSIONS.join(", "));
    vec![
        FieldDescriptor::new("passport", "Passport Copy", FieldKind::File, false)
            .constraint(formats.clone()),
        FieldDescriptor::new("transcript", "Academic Transcript", FieldKind::File, false)
            .constraint(formats.clone()),
        FieldDescriptor::new("other_documents", "Other Documents", FieldKind::Files, false)
            .constraint(formats),
    ]
}

pub fn english_fields() -> Vec<FieldDescriptor> {
    let score = "non-negative, one decimal place, within the test's scale";
    vec![
        FieldDescriptor::new(
            "use_existing_score",
            "Use an existing test score",
            FieldKind::Checkbox,
            false,
        ),
        FieldDescriptor::new("existing_score", "Existing Score", FieldKind::Choice, false)
            .constraint("a still-valid score on your profile"),
        FieldDescriptor::new("test_type", "Test Type", FieldKind::Choice, false)
            .constraint("ielts, toefl, pte or other"),
        FieldDescriptor::new("test_date", "Test Date", FieldKind::Date, false)
            .constraint("not in the future"),
        FieldDescriptor::new("listening_score", "Listening", FieldKind::Score, false)
            .constraint(score),
        FieldDescriptor::new("reading_score", "Reading", FieldKind::Score, false)
            .constraint(score),
        FieldDescriptor::new("speaking_score", "Speaking", FieldKind::Score, false)
            .constraint(score),
        FieldDescriptor::new("writing_score", "Writing", FieldKind::Score, false)
            .constraint(score),
        FieldDescriptor::new("overall_score", "Overall", FieldKind::Score, false)
            .constraint(score),
        FieldDescriptor::new(
            "consent",
            "I consent to my data being shared with the university",
            FieldKind::Checkbox,
            true,
        ),
    ]
}

fn text_or_profile(
    errors: &mut FieldErrors,
    field: &str,
    stored: &str,
    raw: Option<&str>,
    max_len: usize,
) -> Option<String> {
    if stored.is_empty() {
        required_text(errors, field, raw, max_len)
    } else {
        Some(stored.to_string())
    }
}

fn date_or_profile(
    errors: &mut FieldErrors,
    field: &str,
    stored: Option<NaiveDate>,
    raw: Option<&str>,
) -> Option<NaiveDate> {
    stored.or_else(|| required_date(errors, field, raw))
}

fn lookup_university<C>(
    catalog: &C,
    errors: &mut FieldErrors,
    raw: Option<&str>,
) -> Result<Option<University>, RepositoryError>
where
    C: CatalogRepository + ?Sized,
{
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        errors.add("university", REQUIRED);
        return Ok(None);
    };
    let found = match UniversityId::parse(raw) {
        Some(id) => catalog.university(&id)?,
        None => None,
    };
    if found.is_none() {
        errors.add("university", INVALID_CHOICE);
    }
    Ok(found)
}

fn lookup_program<C>(
    catalog: &C,
    errors: &mut FieldErrors,
    raw: Option<&str>,
    university: Option<&University>,
) -> Result<Option<Program>, RepositoryError>
where
    C: CatalogRepository + ?Sized,
{
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        errors.add("program", REQUIRED);
        return Ok(None);
    };
    let found = match ProgramId::parse(raw) {
        Some(id) => catalog.program(&id)?,
        None => None,
    };
    let eligible = found.filter(|program| {
        program.is_active && university.map_or(true, |university| university.id == program.university)
    });
    if eligible.is_none() {
        errors.add("program", INVALID_CHOICE);
    }
    Ok(eligible)
}

/// Validates step 1. Fields the profile already holds are read-only: the profile
/// value is used and whatever was submitted for them is ignored.
pub fn validate_personal<C>(
    form: &PersonalForm,
    profile: &StudentProfile,
    catalog: &C,
    today: NaiveDate,
) -> Result<Result<PersonalStep, FieldErrors>, RepositoryError>
where
    C: CatalogRepository + ?Sized,
{
    let mut errors = FieldErrors::new();

    let university = lookup_university(catalog, &mut errors, form.university.as_deref())?;
    let program = lookup_program(
        catalog,
        &mut errors,
        form.program.as_deref(),
        university.as_ref(),
    )?;

    let phone = text_or_profile(
        &mut errors,
        "phone",
        &profile.phone,
        form.phone.as_deref(),
        PHONE_MAX,
    );
    let gender = match profile.gender {
        Some(gender) => Some(gender),
        None => match form.gender.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => {
                errors.add("gender", REQUIRED);
                None
            }
            Some(raw) => {
                let parsed = Gender::parse(raw);
                if parsed.is_none() {
                    errors.add("gender", INVALID_CHOICE);
                }
                parsed
            }
        },
    };
    let nationality = text_or_profile(
        &mut errors,
        "nationality",
        &profile.nationality,
        form.nationality.as_deref(),
        NATIONALITY_MAX,
    );
    let date_of_birth = date_or_profile(
        &mut errors,
        "date_of_birth",
        profile.date_of_birth,
        form.date_of_birth.as_deref(),
    );
    if profile.date_of_birth.is_none() && date_of_birth.is_some_and(|date| date >= today) {
        errors.add("date_of_birth", "Date of birth must be in the past.");
    }
    let passport_number = text_or_profile(
        &mut errors,
        "passport_number",
        &profile.passport_number,
        form.passport_number.as_deref(),
        PASSPORT_MAX,
    );
    let passport_expiry = date_or_profile(
        &mut errors,
        "passport_expiry",
        profile.passport_expiry,
        form.passport_expiry.as_deref(),
    );
    let address = text_or_profile(
        &mut errors,
        "address",
        &profile.address,
        form.address.as_deref(),
        ADDRESS_MAX,
    );

    let remarks = form.remarks.as_deref().unwrap_or_default().trim().to_string();
    if remarks.chars().count() > REMARKS_MAX {
        errors.add(
            "remarks",
            format!("Ensure this value has at most {REMARKS_MAX} characters."),
        );
    }

    if !form.terms_accepted {
        errors.add(
            "terms_accepted",
            "You must accept the terms and conditions to continue.",
        );
    }

    match (
        university,
        program,
        phone,
        gender,
        nationality,
        date_of_birth,
        passport_number,
        passport_expiry,
        address,
    ) {
        (
            Some(university),
            Some(program),
            Some(phone),
            Some(gender),
            Some(nationality),
            Some(date_of_birth),
            Some(passport_number),
            Some(passport_expiry),
            Some(address),
        ) if errors.is_empty() => Ok(Ok(PersonalStep {
            university: university.id,
            application_type: program.application_type(),
            program: program.id,
            phone,
            gender,
            nationality,
            date_of_birth,
            passport_number,
            passport_expiry,
            address,
            remarks,
            terms_accepted: form.terms_accepted,
        })),
        _ => Ok(Err(errors)),
    }
}

/// Fills empty profile fields from step 1 answers. Returns whether anything changed.
pub fn backfill_profile(profile: &mut StudentProfile, answers: &PersonalStep) -> bool {
    let mut changed = false;
    let mut fill_text = |slot: &mut String, value: &str| {
        if slot.is_empty() && !value.is_empty() {
            *slot = value.to_string();
            changed = true;
        }
    };
    fill_text(&mut profile.phone, &answers.phone);
    fill_text(&mut profile.nationality, &answers.nationality);
    fill_text(&mut profile.passport_number, &answers.passport_number);
    fill_text(&mut profile.address, &answers.address);

    if profile.gender.is_none() {
        profile.gender = Some(answers.gender);
        changed = true;
    }
    if profile.date_of_birth.is_none() {
        profile.date_of_birth = Some(answers.date_of_birth);
        changed = true;
    }
    if profile.passport_expiry.is_none() {
        profile.passport_expiry = Some(answers.passport_expiry);
        changed = true;
    }
    changed
}

/// Validated step 2 uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentUploads {
    pub passport: Option<UploadedFile>,
    pub transcript: Option<UploadedFile>,
    pub others: Vec<UploadedFile>,
}

fn check_file(errors: &mut FieldErrors, field: &str, file: &UploadedFile) {
    if file.file_name.trim().is_empty() || file.storage_key.trim().is_empty() {
        errors.add(field, "The submitted file is empty.");
        return;
    }
    let allowed = file
        .extension()
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()));
    if !allowed {
        errors.add(
            field,
            format!(
                "File extension of \"{}\" is not allowed. Allowed extensions are: {}.",
                file.file_name,
                DOCUMENT_EXTENSIONS.join(", ")
            ),
        );
    }
}

pub fn validate_documents(form: &DocumentForm) -> Result<DocumentUploads, FieldErrors> {
    let mut errors = FieldErrors::new();
    if let Some(file) = &form.passport {
        check_file(&mut errors, "passport", file);
    }
    if let Some(file) = &form.transcript {
        check_file(&mut errors, "transcript", file);
    }
    for file in &form.other_documents {
        check_file(&mut errors, "other_documents", file);
    }
    errors.finish(DocumentUploads {
        passport: form.passport.clone(),
        transcript: form.transcript.clone(),
        others: form.other_documents.clone(),
    })
}

/// New score entered on step 3, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScore {
    pub test_type: TestType,
    pub test_date: NaiveDate,
    pub listening_score: Option<Score>,
    pub reading_score: Option<Score>,
    pub speaking_score: Option<Score>,
    pub writing_score: Option<Score>,
    pub overall_score: Option<Score>,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofInput {
    None,
    Existing(TestScoreId),
    New(NewScore),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnglishInput {
    pub proof: ProofInput,
    pub consent: bool,
}

fn optional_score(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    test_type: Option<TestType>,
) -> Option<Score> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match Score::parse(raw) {
        Ok(score) => {
            if let Some(test_type) = test_type {
                if score.tenths() > test_type.max_tenths() {
                    errors.add(
                        field,
                        format!(
                            "Ensure this value is less than or equal to {}.",
                            Score::from_tenths(test_type.max_tenths())
                        ),
                    );
                    return None;
                }
            }
            Some(score)
        }
        Err(message) => {
            errors.add(field, message);
            None
        }
    }
}

/// Validates step 3. `valid_scores` are the student's still-active scores; a new
/// score expires `validity_days` after its test date.
pub fn validate_english(
    form: &EnglishForm,
    valid_scores: &[StudentTestScore],
    today: NaiveDate,
    validity_days: u32,
) -> Result<EnglishInput, FieldErrors> {
    let mut errors = FieldErrors::new();
    if !form.consent {
        errors.add(
            "consent",
            "You must give consent before submitting your application.",
        );
    }

    let has = |raw: &Option<String>| raw.as_deref().is_some_and(|v| !v.trim().is_empty());

    let proof = if form.use_existing_score {
        match form.existing_score.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => {
                errors.add("existing_score", REQUIRED);
                ProofInput::None
            }
            Some(raw) => {
                let chosen = TestScoreId::parse(raw)
                    .filter(|id| valid_scores.iter().any(|score| score.id == *id));
                match chosen {
                    Some(id) => ProofInput::Existing(id),
                    None => {
                        errors.add("existing_score", INVALID_CHOICE);
                        ProofInput::None
                    }
                }
            }
        }
    } else if has(&form.test_type) || has(&form.test_date) {
        let test_type = match form.test_type.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => {
                errors.add("test_type", REQUIRED);
                None
            }
            Some(raw) => {
                let parsed = TestType::parse(raw);
                if parsed.is_none() {
                    errors.add("test_type", INVALID_CHOICE);
                }
                parsed
            }
        };
        let test_date = required_date(&mut errors, "test_date", form.test_date.as_deref());
        let expiry_date = match test_date {
            Some(date) if date > today => {
                errors.add("test_date", "Test date cannot be in the future.");
                None
            }
            Some(date) => {
                let expiry = date.checked_add_days(Days::new(u64::from(validity_days)));
                match expiry {
                    Some(expiry) if expiry >= today => Some(expiry),
                    _ => {
                        errors.add("test_date", "This test score has already expired.");
                        None
                    }
                }
            }
            None => None,
        };

        let listening_score =
            optional_score(&mut errors, "listening_score", form.listening_score.as_deref(), test_type);
        let reading_score =
            optional_score(&mut errors, "reading_score", form.reading_score.as_deref(), test_type);
        let speaking_score =
            optional_score(&mut errors, "speaking_score", form.speaking_score.as_deref(), test_type);
        let writing_score =
            optional_score(&mut errors, "writing_score", form.writing_score.as_deref(), test_type);
        let overall_score =
            optional_score(&mut errors, "overall_score", form.overall_score.as_deref(), test_type);

        match (test_type, test_date, expiry_date) {
            (Some(test_type), Some(test_date), Some(expiry_date)) => ProofInput::New(NewScore {
                test_type,
                test_date,
                listening_score,
                reading_score,
                speaking_score,
                writing_score,
                overall_score,
                expiry_date,
            }),
            _ => ProofInput::None,
        }
    } else {
        ProofInput::None
    };

    errors.finish(EnglishInput {
        proof,
        consent: form.consent,
    })
}
