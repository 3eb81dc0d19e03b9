use std::collections::HashSet;
use std::sync::Arc;

use admissions::config::AdmissionsConfig;
use admissions::workflows::admissions::wizard::forms::{
    DocumentForm, EnglishForm, PersonalForm, StepForm, UploadedFile,
};
use admissions::workflows::admissions::{
    Actor, AdmissionsError, ApplicationFilter, ApplicationRepository, ApplicationService,
    ApplicationStatus, DeliveryType, EnglishRequirement, EntrySelectors, LeadQuality,
    MemorySessionStore, MemoryStore, Program, ProgramId, ReviewDecision, Score, StudentProfile,
    StudentRepository, SubmissionRequest, University, UniversityId, WizardAction,
    WizardController, WizardOutcome, WizardRequest,
};
use chrono::NaiveDate;
use uuid::Uuid;

struct Campus {
    university: University,
    open_program: Program,
    english_program: Program,
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
}

fn seeded_store() -> (Arc<MemoryStore>, Campus) {
    let store = Arc::new(MemoryStore::new());
    let university = University {
        id: UniversityId::new(),
        name: "Trikon University Dubai".to_string(),
        short_name: "TUD".to_string(),
        slug: "trikon-university-dubai".to_string(),
    };
    let program = |name: &str, slug: &str, level: &str| Program {
        id: ProgramId::new(),
        university: university.id,
        name: name.to_string(),
        slug: slug.to_string(),
        program_type: name.to_string(),
        level: level.to_string(),
        delivery: DeliveryType::Hybrid,
        duration: "3 years".to_string(),
        is_active: true,
    };
    let open_program = program("BSc Computer Science", "bsc-computer-science", "Bachelor's");
    let english_program = program("MBA", "mba", "Master's");

    store
        .insert_university(university.clone())
        .expect("seed university");
    store
        .insert_program(open_program.clone())
        .expect("seed program");
    store
        .insert_program(english_program.clone())
        .expect("seed program");
    store
        .insert_english_requirement(EnglishRequirement {
            id: Uuid::new_v4(),
            program: english_program.id,
            ielts: Some(Score::from_tenths(60)),
            toefl: None,
            pte: Some(Score::from_tenths(500)),
        })
        .expect("seed requirement");

    (
        store,
        Campus {
            university,
            open_program,
            english_program,
        },
    )
}

fn student(store: &MemoryStore, username: &str) -> StudentProfile {
    let profile = StudentProfile::new(username, format!("{username}@example.com"));
    store.insert_student(profile.clone()).expect("seed student");
    profile
}

fn request(profile: &StudentProfile, campus: &Campus) -> SubmissionRequest {
    SubmissionRequest {
        student: profile.id,
        university: campus.university.id,
        program: campus.open_program.id,
        application_type: campus.open_program.application_type(),
        remarks: String::new(),
        consent_given: false,
        terms_accepted: true,
        lead_quality: LeadQuality::Low,
    }
}

fn step(form: StepForm) -> WizardRequest {
    WizardRequest {
        action: WizardAction::Next,
        form: Some(form),
    }
}

#[test]
fn concurrent_submissions_get_unique_references() {
    let (store, campus) = seeded_store();
    let service = Arc::new(ApplicationService::new(
        Arc::clone(&store),
        AdmissionsConfig::default(),
    ));
    let students: Vec<StudentProfile> = (0..8)
        .map(|index| student(&store, &format!("applicant{index}")))
        .collect();

    let references: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = students
            .iter()
            .map(|profile| {
                let service = Arc::clone(&service);
                let request = request(profile, &campus);
                scope.spawn(move || {
                    (0..5)
                        .map(|_| {
                            service
                                .submit(request.clone())
                                .expect("submission succeeds")
                                .reference
                                .to_string()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("worker finished"))
            .collect()
    });

    let unique: HashSet<&String> = references.iter().collect();
    assert_eq!(references.len(), 40);
    assert_eq!(unique.len(), 40);
    let mut sorted = references.clone();
    sorted.sort();
    assert_eq!(sorted.first().map(String::as_str), Some("000001"));
    assert_eq!(sorted.last().map(String::as_str), Some("000040"));
}

#[test]
fn wizard_run_backfills_profile_and_submits_with_english_proof() {
    let (store, campus) = seeded_store();
    let service = Arc::new(ApplicationService::new(
        Arc::clone(&store),
        AdmissionsConfig::default(),
    ));
    let wizard = WizardController::new(Arc::clone(&service), Arc::new(MemorySessionStore::new()));
    let profile = student(&store, "layla");

    let view = wizard
        .view(
            profile.id,
            &EntrySelectors {
                program: Some("mba".to_string()),
                university: None,
            },
            today(),
        )
        .expect("entry view");
    assert_eq!(view.step, 1);
    assert!(view.english_required);
    assert_eq!(view.program_level.as_deref(), Some("Master's"));

    let personal = PersonalForm {
        university: Some(campus.university.id.to_string()),
        program: Some(campus.english_program.id.to_string()),
        phone: Some("0501234567".to_string()),
        gender: Some("female".to_string()),
        nationality: Some("UAE".to_string()),
        date_of_birth: Some("1999-05-17".to_string()),
        passport_number: Some("P7654321".to_string()),
        passport_expiry: Some("2031-05-17".to_string()),
        address: Some("Dubai".to_string()),
        remarks: None,
        terms_accepted: true,
    };
    wizard
        .submit(profile.id, step(StepForm::Personal(personal)), today())
        .expect("step 1");

    let refreshed = store
        .profile(&profile.id)
        .expect("profile read")
        .expect("profile exists");
    assert_eq!(refreshed.phone, "0501234567");
    assert_eq!(refreshed.passport_number, "P7654321");
    assert_eq!(refreshed.address, "Dubai");

    wizard
        .submit(
            profile.id,
            step(StepForm::Documents(DocumentForm {
                transcript: Some(UploadedFile {
                    file_name: "transcript.PDF".to_string(),
                    storage_key: "uploads/transcript.pdf".to_string(),
                }),
                ..DocumentForm::default()
            })),
            today(),
        )
        .expect("step 2");

    let outcome = wizard
        .submit(
            profile.id,
            step(StepForm::English(EnglishForm {
                test_type: Some("pte".to_string()),
                test_date: Some("2026-01-10".to_string()),
                overall_score: Some("58".to_string()),
                consent: true,
                ..EnglishForm::default()
            })),
            today(),
        )
        .expect("step 3");
    let application = match outcome {
        WizardOutcome::Submitted(application) => application,
        other => panic!("expected submission, got {other:?}"),
    };

    assert_eq!(application.reference.as_str(), "000001");
    assert_eq!(application.lead_quality, LeadQuality::High);
    assert!(application.consent_given);
    assert_eq!(application.program, campus.english_program.id);
    assert_eq!(store.test_scores(&profile.id).expect("scores").len(), 1);
}

#[test]
fn review_saves_only_log_real_status_changes() {
    let (store, campus) = seeded_store();
    let service = ApplicationService::new(Arc::clone(&store), AdmissionsConfig::default());
    let profile = student(&store, "layla");
    let staff = Actor::staff("admissions-officer");
    let application = service
        .submit(request(&profile, &campus))
        .expect("submitted");

    for message in ["Received", "", "Awaiting transcript"] {
        service
            .transition(
                &staff,
                &application.reference,
                ReviewDecision {
                    status: ApplicationStatus::Pending,
                    custom_status_message: Some(message.to_string()),
                },
            )
            .expect("same-status save");
    }
    assert_eq!(store.logs(&application.id).expect("logs").len(), 1);

    service
        .transition(
            &staff,
            &application.reference,
            ReviewDecision {
                status: ApplicationStatus::Rejected,
                custom_status_message: None,
            },
        )
        .expect("rejection");
    let detail = service
        .detail(&Actor::student(profile.id), &application.reference)
        .expect("detail");
    assert_eq!(detail.logs.len(), 2);
    assert_eq!(detail.logs[1].event, "Status Changed: Pending → Rejected");
    assert_eq!(
        detail.logs[1].details,
        ApplicationStatus::Rejected.default_message()
    );
    assert_eq!(detail.display_message, detail.logs[1].details);
}

#[test]
fn submitted_applications_cannot_be_cancelled() {
    let (store, campus) = seeded_store();
    let service = ApplicationService::new(Arc::clone(&store), AdmissionsConfig::default());
    let profile = student(&store, "layla");
    let application = service
        .submit(request(&profile, &campus))
        .expect("submitted");

    let err = service
        .cancel(&Actor::student(profile.id), &application.reference)
        .expect_err("pending is not cancellable");
    assert!(matches!(err, AdmissionsError::Precondition(_)));

    let listed = service
        .list(&Actor::student(profile.id), ApplicationFilter::default())
        .expect("list");
    assert_eq!(listed.len(), 1);
}
