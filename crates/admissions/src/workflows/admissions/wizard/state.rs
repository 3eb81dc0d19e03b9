//! Wizard progress as a tagged union.
//!
//! Each variant carries exactly the answers that must exist to stand on that step;
//! answers from later steps survive back navigation and are overwritten, never merged,
//! when their step is completed again.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::admissions::domain::{
    ApplicationType, DocumentId, Gender, ProgramId, TestScoreId, UniversityId,
};

/// Validated step 1 answers. Dates serialize as ISO strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalStep {
    pub university: UniversityId,
    pub program: ProgramId,
    pub application_type: ApplicationType,
    pub phone: String,
    pub gender: Gender,
    pub nationality: String,
    pub date_of_birth: NaiveDate,
    pub passport_number: String,
    pub passport_expiry: NaiveDate,
    pub address: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

/// Documents stored while completing step 2.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStep {
    #[serde(default)]
    pub uploaded: Vec<DocumentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "score", rename_all = "snake_case")]
pub enum EnglishProof {
    /// A still-valid score the student already had.
    Existing(TestScoreId),
    /// A score entered and persisted during step 3.
    New(TestScoreId),
}

impl EnglishProof {
    pub fn score(self) -> TestScoreId {
        match self {
            EnglishProof::Existing(id) | EnglishProof::New(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnglishStep {
    pub proof: Option<EnglishProof>,
    pub consent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum WizardState {
    Personal {
        #[serde(default)]
        personal: Option<PersonalStep>,
        #[serde(default)]
        documents: Option<DocumentStep>,
        #[serde(default)]
        english: Option<EnglishStep>,
    },
    Documents {
        personal: PersonalStep,
        #[serde(default)]
        documents: Option<DocumentStep>,
        #[serde(default)]
        english: Option<EnglishStep>,
    },
    English {
        personal: PersonalStep,
        documents: DocumentStep,
        #[serde(default)]
        english: Option<EnglishStep>,
    },
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    Back,
    PersonalCompleted(PersonalStep),
    DocumentsCompleted {
        documents: DocumentStep,
        english_required: bool,
    },
    EnglishCompleted(EnglishStep),
}

impl WizardEvent {
    fn name(&self) -> &'static str {
        match self {
            WizardEvent::Back => "back",
            WizardEvent::PersonalCompleted(_) => "personal_completed",
            WizardEvent::DocumentsCompleted { .. } => "documents_completed",
            WizardEvent::EnglishCompleted(_) => "english_completed",
        }
    }
}

/// Every answer needed to create the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedWizard {
    pub personal: PersonalStep,
    pub documents: DocumentStep,
    pub english: Option<EnglishStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Step(WizardState),
    Ready(CompletedWizard),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event `{event}` does not apply on step {step}")]
pub struct StepMismatch {
    pub step: u8,
    pub event: &'static str,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::start()
    }
}

impl WizardState {
    pub fn start() -> Self {
        WizardState::Personal {
            personal: None,
            documents: None,
            english: None,
        }
    }

    pub fn step_number(&self) -> u8 {
        match self {
            WizardState::Personal { .. } => 1,
            WizardState::Documents { .. } => 2,
            WizardState::English { .. } => 3,
        }
    }

    pub fn personal(&self) -> Option<&PersonalStep> {
        match self {
            WizardState::Personal { personal, .. } => personal.as_ref(),
            WizardState::Documents { personal, .. } | WizardState::English { personal, .. } => {
                Some(personal)
            }
        }
    }

    pub fn english(&self) -> Option<&EnglishStep> {
        match self {
            WizardState::Personal { english, .. }
            | WizardState::Documents { english, .. }
            | WizardState::English { english, .. } => english.as_ref(),
        }
    }

    /// One step back; answers already given are kept.
    pub fn back(self) -> Self {
        match self {
            state @ WizardState::Personal { .. } => state,
            WizardState::Documents {
                personal,
                documents,
                english,
            } => WizardState::Personal {
                personal: Some(personal),
                documents,
                english,
            },
            WizardState::English {
                personal,
                documents,
                english,
            } => WizardState::Documents {
                personal,
                documents: Some(documents),
                english,
            },
        }
    }

    pub fn apply(self, event: WizardEvent) -> Result<Advance, StepMismatch> {
        let step = self.step_number();
        let event_name = event.name();
        let next = match (self, event) {
            (state, WizardEvent::Back) => Advance::Step(state.back()),
            (
                WizardState::Personal {
                    documents, english, ..
                },
                WizardEvent::PersonalCompleted(personal),
            ) => Advance::Step(WizardState::Documents {
                personal,
                documents,
                english,
            }),
            (
                WizardState::Documents {
                    personal, english, ..
                },
                WizardEvent::DocumentsCompleted {
                    documents,
                    english_required,
                },
            ) => {
                if english_required {
                    Advance::Step(WizardState::English {
                        personal,
                        documents,
                        english,
                    })
                } else {
                    Advance::Ready(CompletedWizard {
                        personal,
                        documents,
                        english: None,
                    })
                }
            }
            (
                WizardState::English {
                    personal,
                    documents,
                    ..
                },
                WizardEvent::EnglishCompleted(english),
            ) => Advance::Ready(CompletedWizard {
                personal,
                documents,
                english: Some(english),
            }),
            _ => {
                return Err(StepMismatch {
                    step,
                    event: event_name,
                })
            }
        };
        Ok(next)
    }
}
