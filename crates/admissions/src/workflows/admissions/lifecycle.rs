//! Review lifecycle of an application.
//!
//! ```text
//! draft ──▶ pending ──▶ under_review ──▶ accepted
//!   │                                └─▶ rejected
//!   └──▶ (cancelled: the record is deleted by its owner)
//! ```
//!
//! Moves only go forward; `accepted` and `rejected` are terminal. Every save that
//! changes the status produces exactly one audit entry, written by the store in the
//! same critical section as the status itself.

use serde::{Deserialize, Serialize};

use super::domain::{Application, ApplicationId, ApplicationStatus, LogDraft, StudentId};

/// Caller identity with the capability it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    Student { id: StudentId },
    Staff { username: String },
}

impl Actor {
    pub fn student(id: StudentId) -> Self {
        Self::Student { id }
    }

    pub fn staff(username: impl Into<String>) -> Self {
        Self::Staff {
            username: username.into(),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::Staff { .. })
    }

    pub fn owns(&self, application: &Application) -> bool {
        matches!(self, Actor::Student { id } if *id == application.student)
    }

    pub fn label(&self) -> String {
        match self {
            Actor::Student { id } => format!("student:{id}"),
            Actor::Staff { username } => format!("staff:{username}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application is already {0}; no further status changes are allowed")]
    Terminal(ApplicationStatus),
}

/// Checks a status move against the forward-only graph. Same-status saves are allowed.
pub fn check_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<(), TransitionError> {
    if from == to {
        return Ok(());
    }
    if from.is_terminal() {
        return Err(TransitionError::Terminal(from));
    }
    if to.rank() <= from.rank() {
        return Err(TransitionError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Staff input for one review save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub status: ApplicationStatus,
    /// Replaces the stored override; blank clears it.
    #[serde(default)]
    pub custom_status_message: Option<String>,
}

/// Fully planned review save handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUpdate {
    pub application: ApplicationId,
    /// Status observed when the update was planned; the store refuses the save if it moved.
    pub expected_status: ApplicationStatus,
    pub status: ApplicationStatus,
    pub custom_status_message: Option<String>,
    pub log: Option<LogDraft>,
}

/// Plans a review save, attaching a log entry only when the status actually changes.
pub fn plan_review(
    current: &Application,
    decision: ReviewDecision,
) -> Result<ReviewUpdate, TransitionError> {
    check_transition(current.status, decision.status)?;

    let custom_status_message = normalize_message(decision.custom_status_message);
    let log = (current.status != decision.status).then(|| LogDraft {
        event: status_change_event(current.status, decision.status),
        details: message_for(decision.status, custom_status_message.as_deref()),
    });

    Ok(ReviewUpdate {
        application: current.id,
        expected_status: current.status,
        status: decision.status,
        custom_status_message,
        log,
    })
}

fn normalize_message(message: Option<String>) -> Option<String> {
    message
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// `Status Changed: Pending → Under_Review`
pub fn status_change_event(from: ApplicationStatus, to: ApplicationStatus) -> String {
    format!(
        "Status Changed: {} → {}",
        title_case(from.as_str()),
        title_case(to.as_str())
    )
}

/// Upper-cases every letter that follows a non-letter and lower-cases the rest.
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut previous_is_letter = false;
    for ch in raw.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

fn message_for(status: ApplicationStatus, custom: Option<&str>) -> String {
    match custom {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => status.default_message().to_string(),
    }
}

/// Text shown to the student for the application's current status.
pub fn display_message(application: &Application) -> String {
    message_for(
        application.status,
        application.custom_status_message.as_deref(),
    )
}

pub(crate) fn submission_log(program: &str, university: &str) -> LogDraft {
    LogDraft {
        event: "Application Submitted".to_string(),
        details: format!("Application submitted for {program} at {university}"),
    }
}

pub(crate) fn draft_log(program: &str, university: &str) -> LogDraft {
    LogDraft {
        event: "Draft Saved".to_string(),
        details: format!("Draft saved for {program} at {university}"),
    }
}
