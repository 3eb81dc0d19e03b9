use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reference::ApplicationReference;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses an identifier carried as plain text in forms or session payloads.
            pub fn parse(raw: &str) -> Option<Self> {
                Uuid::parse_str(raw.trim()).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Internal identifier of an application, distinct from its human-facing reference.
    ApplicationId
);
entity_id!(StudentId);
entity_id!(UniversityId);
entity_id!(ProgramId);
entity_id!(DocumentId);
entity_id!(TestScoreId);

/// Study level the applicant is applying for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    Undergraduate,
    Postgraduate,
    Diploma,
}

impl ApplicationType {
    /// Maps a program level name onto the application type it implies.
    pub fn from_level_name(level: &str) -> Self {
        let level = level.to_ascii_lowercase();
        if level.contains("bachelor") {
            Self::Undergraduate
        } else if level.contains("master") || level.contains("phd") {
            Self::Postgraduate
        } else {
            Self::Diploma
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ApplicationType::Undergraduate => "undergraduate",
            ApplicationType::Postgraduate => "postgraduate",
            ApplicationType::Diploma => "diploma",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationType::Undergraduate => "Undergraduate",
            ApplicationType::Postgraduate => "Postgraduate",
            ApplicationType::Diploma => "Diploma",
        }
    }
}

/// Review status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Pending,
    UnderReview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "Draft",
            ApplicationStatus::Pending => "Pending Review",
            ApplicationStatus::UnderReview => "Under Review",
            ApplicationStatus::Accepted => "Accepted",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    /// Sentence shown to the student when staff leave no custom message.
    pub const fn default_message(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "Application saved as a draft and not yet submitted",
            ApplicationStatus::Pending => "Application is pending review",
            ApplicationStatus::UnderReview => {
                "Application is now under review by the admissions team"
            }
            ApplicationStatus::Accepted => "Congratulations! Your application has been accepted",
            ApplicationStatus::Rejected => {
                "Unfortunately, your application was not successful at this time"
            }
        }
    }

    /// Position in the forward-only review graph.
    pub(crate) const fn rank(self) -> u8 {
        match self {
            ApplicationStatus::Draft => 0,
            ApplicationStatus::Pending => 1,
            ApplicationStatus::UnderReview => 2,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected => 3,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse completeness tier used by staff to triage incoming applications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadQuality {
    High,
    Medium,
    #[default]
    Low,
}

impl LeadQuality {
    pub const fn as_str(self) -> &'static str {
        match self {
            LeadQuality::High => "high",
            LeadQuality::Medium => "medium",
            LeadQuality::Low => "low",
        }
    }
}

/// One student's bid for one program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub reference: ApplicationReference,
    pub student: StudentId,
    pub university: UniversityId,
    pub program: ProgramId,
    pub application_type: ApplicationType,
    pub status: ApplicationStatus,
    pub applied_on: NaiveDate,
    pub remarks: String,
    pub consent_given: bool,
    pub terms_accepted: bool,
    pub lead_quality: LeadQuality,
    pub custom_status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when an application is first stored; identity and timestamps are store-assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub student: StudentId,
    pub university: UniversityId,
    pub program: ProgramId,
    pub application_type: ApplicationType,
    pub status: ApplicationStatus,
    pub remarks: String,
    pub consent_given: bool,
    pub terms_accepted: bool,
    pub lead_quality: LeadQuality,
}

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationLog {
    pub id: Uuid,
    pub application: ApplicationId,
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub details: String,
}

/// Log entry content before the store stamps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDraft {
    pub event: String,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

/// Student account with the personal details collected during applications.
///
/// Empty strings and `None` mean "not provided yet"; the wizard back-fills those
/// and never overwrites a populated value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gender: Option<Gender>,
    pub nationality: String,
    pub date_of_birth: Option<NaiveDate>,
    pub passport_number: String,
    pub passport_expiry: Option<NaiveDate>,
    pub address: String,
}

impl StudentProfile {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: StudentId::new(),
            username: username.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: email.into(),
            phone: String::new(),
            gender: None,
            nationality: String::new(),
            date_of_birth: None,
            passport_number: String::new(),
            passport_expiry: None,
            address: String::new(),
        }
    }

    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    Transcript,
    Certificate,
    Recommendation,
    Other,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::Passport => "Passport",
            DocumentType::Transcript => "Academic Transcript",
            DocumentType::Certificate => "Certificate",
            DocumentType::Recommendation => "Letter of Recommendation",
            DocumentType::Other => "Other",
        }
    }

    /// Single-slot documents replace any earlier upload of the same type.
    pub const fn is_single_slot(self) -> bool {
        matches!(self, DocumentType::Passport | DocumentType::Transcript)
    }
}

/// Metadata of an uploaded file; the bytes live in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDocument {
    pub id: DocumentId,
    pub student: StudentId,
    pub doc_type: DocumentType,
    pub file_name: String,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Ielts,
    Toefl,
    Pte,
    Other,
}

impl TestType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ielts" => Some(Self::Ielts),
            "toefl" => Some(Self::Toefl),
            "pte" => Some(Self::Pte),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            TestType::Ielts => "IELTS",
            TestType::Toefl => "TOEFL",
            TestType::Pte => "PTE",
            TestType::Other => "Other",
        }
    }

    /// Highest attainable score, in tenths.
    pub const fn max_tenths(self) -> u16 {
        match self {
            TestType::Ielts => 90,
            TestType::Toefl => 1200,
            TestType::Pte => 900,
            TestType::Other => 9999,
        }
    }
}

/// Non-negative test score with at most one decimal place, stored in tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Score(u16);

impl Score {
    pub const fn from_tenths(tenths: u16) -> Self {
        Self(tenths)
    }

    pub const fn tenths(self) -> u16 {
        self.0
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (whole, fraction) = match raw.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (raw, ""),
        };

        let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !digits_only(whole) || !digits_only(fraction) {
            return Err("Enter a number.".to_string());
        }
        if fraction.len() > 1 {
            return Err("Ensure that there are no more than 1 decimal place.".to_string());
        }

        let whole: u16 = whole
            .parse()
            .map_err(|_| "Ensure this value is less than or equal to 999.9.".to_string())?;
        let tenth: u16 = fraction.parse().unwrap_or(0);
        whole
            .checked_mul(10)
            .and_then(|value| value.checked_add(tenth))
            .filter(|value| *value <= 9999)
            .map(Self)
            .ok_or_else(|| "Ensure this value is less than or equal to 999.9.".to_string())
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl TryFrom<String> for Score {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Score> for String {
    fn from(value: Score) -> Self {
        value.to_string()
    }
}

/// English proficiency result owned by a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentTestScore {
    pub id: TestScoreId,
    pub student: StudentId,
    pub test_type: TestType,
    pub test_date: NaiveDate,
    pub listening_score: Option<Score>,
    pub reading_score: Option<Score>,
    pub speaking_score: Option<Score>,
    pub writing_score: Option<Score>,
    pub overall_score: Option<Score>,
    pub expiry_date: Option<NaiveDate>,
}

impl StudentTestScore {
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.expiry_date.map_or(true, |expiry| expiry >= today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct University {
    pub id: UniversityId,
    pub name: String,
    pub short_name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    OnCampus,
    Online,
    Hybrid,
}

impl DeliveryType {
    pub const fn label(self) -> &'static str {
        match self {
            DeliveryType::OnCampus => "On Campus",
            DeliveryType::Online => "Online",
            DeliveryType::Hybrid => "Hybrid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub university: UniversityId,
    pub name: String,
    pub slug: String,
    /// Degree type within the level, e.g. "BSc Computer Science".
    pub program_type: String,
    /// Level name such as "Bachelor's", "Master's" or "Diploma".
    pub level: String,
    pub delivery: DeliveryType,
    pub duration: String,
    pub is_active: bool,
}

impl Program {
    pub fn application_type(&self) -> ApplicationType {
        ApplicationType::from_level_name(&self.level)
    }
}

/// Minimum English scores a program asks for. Any record means the program requires proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnglishRequirement {
    pub id: Uuid,
    pub program: ProgramId,
    pub ielts: Option<Score>,
    pub toefl: Option<Score>,
    pub pte: Option<Score>,
}
