use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::domain::{
    Application, ApplicationLog, Program, StudentDocument, StudentProfile, StudentTestScore,
    University,
};

/// Read-only snapshot of one application and everything related to it.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationExport {
    pub application: Application,
    pub student: StudentProfile,
    pub university: University,
    pub program: Program,
    pub documents: Vec<StudentDocument>,
    pub test_scores: Vec<StudentTestScore>,
    /// Oldest first.
    pub logs: Vec<ApplicationLog>,
    pub generated_at: DateTime<Utc>,
}

/// Turns an export snapshot into a document for staff.
pub trait SummaryRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn render(&self, export: &ApplicationExport) -> String;
}

/// Plain-text summary laid out in the same sections as the printed application form.
#[derive(Debug, Clone)]
pub struct TextSummary {
    detail_width: usize,
}

impl TextSummary {
    pub fn new(detail_width: usize) -> Self {
        Self {
            detail_width: detail_width.max(1),
        }
    }
}

fn long_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Cuts `text` to `width` characters, marking the cut with `...`.
pub(crate) fn truncate_detail(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let cut: String = text.chars().take(width).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}\n{}", "-".repeat(title.len()));
}

fn row(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "{label:<18}{value}");
}

impl SummaryRenderer for TextSummary {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn render(&self, export: &ApplicationExport) -> String {
        let ApplicationExport {
            application,
            student,
            university,
            program,
            documents,
            test_scores,
            logs,
            generated_at,
        } = export;

        let mut out = String::new();
        let _ = writeln!(out, "APPLICATION FORM");
        let _ = writeln!(
            out,
            "Application ID: #{} | Status: {}",
            application.reference,
            application.status.label()
        );
        let _ = writeln!(out, "Submitted On: {}", long_date(application.applied_on));

        section(&mut out, "STUDENT INFORMATION");
        row(&mut out, "Full Name", &student.full_name());
        row(&mut out, "Email", or_na(&student.email));
        row(&mut out, "Phone", or_na(&student.phone));
        let dob = student.date_of_birth.map(long_date).unwrap_or_default();
        row(&mut out, "Date of Birth", or_na(&dob));
        row(
            &mut out,
            "Gender",
            student.gender.map(|gender| gender.label()).unwrap_or("N/A"),
        );
        row(&mut out, "Nationality", or_na(&student.nationality));
        row(&mut out, "Passport Number", or_na(&student.passport_number));
        let expiry = student.passport_expiry.map(long_date).unwrap_or_default();
        row(&mut out, "Passport Expiry", or_na(&expiry));

        section(&mut out, "PROGRAM INFORMATION");
        row(&mut out, "University", &university.name);
        row(&mut out, "Program", &program.name);
        row(&mut out, "Program Type", or_na(&program.program_type));
        row(&mut out, "Program Level", or_na(&program.level));
        row(&mut out, "Delivery Type", program.delivery.label());
        row(&mut out, "Duration", or_na(&program.duration));
        row(
            &mut out,
            "Application Type",
            application.application_type.label(),
        );

        section(&mut out, "DOCUMENTS SUBMITTED");
        if documents.is_empty() {
            let _ = writeln!(out, "No documents uploaded.");
        }
        for document in documents {
            let _ = writeln!(
                out,
                "- {} | {} | {}",
                document.doc_type.label(),
                document.file_name,
                long_date(document.uploaded_at.date_naive())
            );
        }

        section(&mut out, "ENGLISH PROFICIENCY");
        if test_scores.is_empty() {
            let _ = writeln!(out, "No test scores on file.");
        }
        for score in test_scores {
            let overall = score
                .overall_score
                .map(|value| value.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            let expiry = score
                .expiry_date
                .map(long_date)
                .unwrap_or_else(|| "no expiry".to_string());
            let _ = writeln!(
                out,
                "- {} | overall {} | taken {} | valid until {}",
                score.test_type.label(),
                overall,
                long_date(score.test_date),
                expiry
            );
        }

        section(&mut out, "APPLICATION TIMELINE");
        for log in logs {
            let _ = writeln!(
                out,
                "- {} | {} | {}",
                log.timestamp.format("%b %d, %Y %H:%M"),
                log.event,
                truncate_detail(&log.details, self.detail_width)
            );
        }

        if !application.remarks.trim().is_empty() {
            section(&mut out, "REMARKS");
            let _ = writeln!(out, "{}", application.remarks);
        }

        let _ = writeln!(
            out,
            "\nGenerated on {}",
            generated_at.format("%B %d, %Y at %H:%M")
        );
        out
    }
}

/// One line of the staff application listing.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationRow {
    pub reference: String,
    pub student: String,
    pub university: String,
    pub program: String,
    pub application_type: &'static str,
    pub status: &'static str,
    pub lead_quality: &'static str,
    pub applied_on: NaiveDate,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("export buffer error: {0}")]
    Buffer(String),
}

pub fn applications_csv(rows: &[ApplicationRow]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    if rows.is_empty() {
        writer.write_record([
            "reference",
            "student",
            "university",
            "program",
            "application_type",
            "status",
            "lead_quality",
            "applied_on",
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Buffer(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ExportError::Buffer(err.to_string()))
}
