use chrono::Utc;

use super::common::*;
use crate::workflows::admissions::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationType, LeadQuality, ProgramId,
    StudentId, UniversityId,
};
use crate::workflows::admissions::lifecycle::{
    check_transition, display_message, plan_review, status_change_event, title_case,
    ReviewDecision, TransitionError,
};
use crate::workflows::admissions::reference::ApplicationReference;

fn application(status: ApplicationStatus) -> Application {
    let now = Utc::now();
    Application {
        id: ApplicationId::new(),
        reference: ApplicationReference::first(),
        student: StudentId::new(),
        university: UniversityId::new(),
        program: ProgramId::new(),
        application_type: ApplicationType::Postgraduate,
        status,
        applied_on: today(),
        remarks: String::new(),
        consent_given: true,
        terms_accepted: true,
        lead_quality: LeadQuality::Low,
        custom_status_message: None,
        created_at: now,
        updated_at: now,
    }
}

fn decision(status: ApplicationStatus, message: Option<&str>) -> ReviewDecision {
    ReviewDecision {
        status,
        custom_status_message: message.map(str::to_string),
    }
}

#[test]
fn forward_moves_are_allowed_including_skips() {
    use ApplicationStatus::*;
    for (from, to) in [
        (Draft, Pending),
        (Pending, UnderReview),
        (UnderReview, Accepted),
        (UnderReview, Rejected),
        (Pending, Accepted),
        (Draft, Rejected),
    ] {
        assert_eq!(check_transition(from, to), Ok(()), "{from} -> {to}");
    }
}

#[test]
fn backward_moves_are_invalid() {
    use ApplicationStatus::*;
    assert_eq!(
        check_transition(UnderReview, Pending),
        Err(TransitionError::InvalidTransition {
            from: UnderReview,
            to: Pending
        })
    );
    assert!(check_transition(Pending, Draft).is_err());
}

#[test]
fn terminal_statuses_accept_no_further_changes() {
    use ApplicationStatus::*;
    assert_eq!(
        check_transition(Accepted, Rejected),
        Err(TransitionError::Terminal(Accepted))
    );
    assert_eq!(
        check_transition(Rejected, UnderReview),
        Err(TransitionError::Terminal(Rejected))
    );
    assert_eq!(check_transition(Accepted, Accepted), Ok(()));
}

#[test]
fn event_names_title_case_the_raw_status_keys() {
    assert_eq!(title_case("under_review"), "Under_Review");
    assert_eq!(title_case("pending"), "Pending");
    assert_eq!(
        status_change_event(ApplicationStatus::Pending, ApplicationStatus::UnderReview),
        "Status Changed: Pending → Under_Review"
    );
}

#[test]
fn status_change_plans_one_log_with_default_details() {
    let current = application(ApplicationStatus::Pending);
    let update = plan_review(&current, decision(ApplicationStatus::UnderReview, None))
        .expect("forward move");

    assert_eq!(update.expected_status, ApplicationStatus::Pending);
    let log = update.log.expect("status change is logged");
    assert_eq!(log.event, "Status Changed: Pending → Under_Review");
    assert_eq!(
        log.details,
        ApplicationStatus::UnderReview.default_message()
    );
}

#[test]
fn custom_message_becomes_the_log_details() {
    let current = application(ApplicationStatus::UnderReview);
    let update = plan_review(
        &current,
        decision(ApplicationStatus::Accepted, Some("  Welcome to the MSc cohort  ")),
    )
    .expect("forward move");

    assert_eq!(
        update.custom_status_message.as_deref(),
        Some("Welcome to the MSc cohort")
    );
    assert_eq!(
        update.log.map(|log| log.details).as_deref(),
        Some("Welcome to the MSc cohort")
    );
}

#[test]
fn same_status_save_plans_no_log_but_keeps_the_message() {
    let current = application(ApplicationStatus::UnderReview);
    let update = plan_review(
        &current,
        decision(ApplicationStatus::UnderReview, Some("Interview booked")),
    )
    .expect("same status is allowed");

    assert!(update.log.is_none());
    assert_eq!(
        update.custom_status_message.as_deref(),
        Some("Interview booked")
    );
}

#[test]
fn blank_message_clears_the_override() {
    let mut current = application(ApplicationStatus::UnderReview);
    current.custom_status_message = Some("Interview booked".to_string());
    let update = plan_review(&current, decision(ApplicationStatus::UnderReview, Some("   ")))
        .expect("same status is allowed");
    assert_eq!(update.custom_status_message, None);
}

#[test]
fn display_message_prefers_the_custom_override() {
    let mut current = application(ApplicationStatus::Rejected);
    assert_eq!(
        display_message(&current),
        ApplicationStatus::Rejected.default_message()
    );

    current.custom_status_message = Some("Please reapply next intake".to_string());
    assert_eq!(display_message(&current), "Please reapply next intake");
    assert_eq!(display_message(&current), display_message(&current));
}
