use crate::infra::{seed_catalog, seed_student};
use admissions::config::AdmissionsConfig;
use admissions::error::AppError;
use admissions::workflows::admissions::wizard::forms::{
    DocumentForm, EnglishForm, PersonalForm, StepForm, UploadedFile,
};
use admissions::workflows::admissions::{
    Actor, AdmissionsError, Application, ApplicationService, ApplicationStatus, EntrySelectors,
    MemorySessionStore, MemoryStore, ReviewDecision, Score, StudentId, StudentRepository,
    StudentTestScore, SummaryRenderer, TestScoreId, TestType, TextSummary, WizardAction,
    WizardController, WizardOutcome, WizardRequest,
};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date the scripted run treats as today (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

type Wizard = WizardController<MemoryStore, MemorySessionStore>;

fn next(form: StepForm) -> WizardRequest {
    WizardRequest {
        action: WizardAction::Next,
        form: Some(form),
    }
}

fn upload(file_name: &str) -> UploadedFile {
    UploadedFile {
        file_name: file_name.to_string(),
        storage_key: format!("demo/{file_name}"),
    }
}

/// Posts one step, treating a validation rejection as a demo failure.
fn post_step(
    wizard: &Wizard,
    student: StudentId,
    form: StepForm,
    today: NaiveDate,
) -> Result<WizardOutcome, AdmissionsError> {
    match wizard.submit(student, next(form), today)? {
        WizardOutcome::Rejected(view) => Err(AdmissionsError::Validation(view.errors)),
        outcome => Ok(outcome),
    }
}

fn print_outcome(label: &str, outcome: &WizardOutcome) {
    match outcome {
        WizardOutcome::Step(view) | WizardOutcome::Rejected(view) => println!(
            "- {label}: now on step {} of {}",
            view.step, view.total_steps
        ),
        WizardOutcome::Submitted(application) => println!(
            "- {label}: submitted application #{} ({})",
            application.reference,
            application.status.label()
        ),
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let store = Arc::new(MemoryStore::new());
    let catalog = seed_catalog(&store).map_err(AdmissionsError::from)?;
    let student = seed_student(&store, "layla.haddad", "Layla", "Haddad")
        .map_err(AdmissionsError::from)?;

    let service = Arc::new(ApplicationService::new(
        Arc::clone(&store),
        AdmissionsConfig::default(),
    ));
    let wizard = WizardController::new(Arc::clone(&service), Arc::new(MemorySessionStore::new()));

    println!("Admissions portal demo ({today})");
    println!(
        "Applicant {} applying to {} at {}",
        student.full_name(),
        catalog.english_program.name,
        catalog.flagship.name
    );

    let view = wizard.view(
        student.id,
        &EntrySelectors {
            program: Some(catalog.english_program.slug.clone()),
            university: None,
        },
        today,
    )?;
    println!(
        "- entry: step {} of {} (English proof required: {})",
        view.step,
        view.total_steps,
        if view.english_required { "yes" } else { "no" }
    );

    let personal = PersonalForm {
        university: Some(catalog.flagship.id.to_string()),
        program: Some(catalog.english_program.id.to_string()),
        phone: Some("+971 50 123 4567".to_string()),
        gender: Some("female".to_string()),
        nationality: Some("Jordanian".to_string()),
        date_of_birth: Some("1998-04-12".to_string()),
        passport_number: Some("N0483921".to_string()),
        passport_expiry: Some("2031-09-30".to_string()),
        address: Some("Al Barsha, Dubai".to_string()),
        remarks: Some("Applying for the September intake.".to_string()),
        terms_accepted: true,
    };
    let outcome = post_step(&wizard, student.id, StepForm::Personal(personal), today)?;
    print_outcome("personal details", &outcome);

    let documents = DocumentForm {
        passport: Some(upload("passport.pdf")),
        transcript: Some(upload("bachelor-transcript.pdf")),
        other_documents: vec![upload("recommendation.jpg")],
    };
    let outcome = post_step(&wizard, student.id, StepForm::Documents(documents), today)?;
    print_outcome("documents", &outcome);

    let english = EnglishForm {
        test_type: Some("ielts".to_string()),
        test_date: Some((today - Duration::days(60)).to_string()),
        listening_score: Some("7.5".to_string()),
        reading_score: Some("7.0".to_string()),
        speaking_score: Some("6.5".to_string()),
        writing_score: Some("6.5".to_string()),
        overall_score: Some("7.0".to_string()),
        consent: true,
        ..EnglishForm::default()
    };
    let outcome = post_step(&wizard, student.id, StepForm::English(english), today)?;
    print_outcome("english proficiency", &outcome);

    let application = match outcome {
        WizardOutcome::Submitted(application) => application,
        _ => {
            return Err(AdmissionsError::Precondition(
                "the scripted wizard run did not reach submission".to_string(),
            )
            .into())
        }
    };
    println!(
        "- lead quality: {}",
        application.lead_quality.as_str().to_uppercase()
    );

    review(&service, &application)?;
    purge(&service, &student.id, today)?;

    let export = service.export(&Actor::staff("registrar"), &application.reference)?;
    let renderer = TextSummary::new(service.config().export_detail_width);
    println!("\n{}", renderer.render(&export));
    Ok(())
}

fn review(
    service: &ApplicationService<MemoryStore>,
    application: &Application,
) -> Result<(), AdmissionsError> {
    let staff = Actor::staff("registrar");
    println!("\nStaff review");
    for (status, message) in [
        (ApplicationStatus::UnderReview, None),
        (
            ApplicationStatus::Accepted,
            Some("Welcome to the MSc Data Science cohort. Your offer letter follows by email."),
        ),
    ] {
        let saved = service.transition(
            &staff,
            &application.reference,
            ReviewDecision {
                status,
                custom_status_message: message.map(str::to_string),
            },
        )?;
        println!("- status is now {}", saved.status.label());
    }

    let detail = service.detail(&staff, &application.reference)?;
    println!("- student sees: {}", detail.display_message);
    println!("- audit entries: {}", detail.logs.len());
    Ok(())
}

fn purge(
    service: &ApplicationService<MemoryStore>,
    student: &StudentId,
    today: NaiveDate,
) -> Result<(), AdmissionsError> {
    service.store().add_test_score(StudentTestScore {
        id: TestScoreId::new(),
        student: *student,
        test_type: TestType::Toefl,
        test_date: today - Duration::days(900),
        listening_score: None,
        reading_score: None,
        speaking_score: None,
        writing_score: None,
        overall_score: Some(Score::from_tenths(950)),
        expiry_date: Some(today - Duration::days(170)),
    })?;

    let staff = Actor::staff("registrar");
    let preview = service.purge_expired_scores(&staff, today, true)?;
    let report = service.purge_expired_scores(&staff, today, false)?;
    println!(
        "\nExpired score sweep: {} found in dry run, {} removed",
        preview.scores.len(),
        report.scores.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_run_completes_for_a_fixed_date() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        run_demo(DemoArgs { today: Some(today) }).expect("demo completes");
    }
}
