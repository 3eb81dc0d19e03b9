use admissions::workflows::admissions::{
    DeliveryType, EnglishRequirement, MemoryStore, Program, ProgramId, RepositoryError, Score,
    StudentProfile, University, UniversityId,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Catalog entries the demo refers to by name.
pub(crate) struct SeededCatalog {
    pub(crate) flagship: University,
    pub(crate) open_program: Program,
    pub(crate) english_program: Program,
}

struct ProgramSeed {
    name: &'static str,
    slug: &'static str,
    program_type: &'static str,
    level: &'static str,
    delivery: DeliveryType,
    duration: &'static str,
    /// IELTS / TOEFL / PTE minimums in tenths; `None` means no requirement record.
    english: Option<(u16, u16, u16)>,
}

const TUD_PROGRAMS: [ProgramSeed; 3] = [
    ProgramSeed {
        name: "BSc Computer Science",
        slug: "bsc-computer-science",
        program_type: "Bachelor of Science",
        level: "Bachelor's",
        delivery: DeliveryType::OnCampus,
        duration: "4 years",
        english: None,
    },
    ProgramSeed {
        name: "MSc Data Science",
        slug: "msc-data-science",
        program_type: "Master of Science",
        level: "Master's",
        delivery: DeliveryType::Hybrid,
        duration: "18 months",
        english: Some((65, 900, 580)),
    },
    ProgramSeed {
        name: "Executive MBA",
        slug: "executive-mba",
        program_type: "Master of Business Administration",
        level: "Master's",
        delivery: DeliveryType::Online,
        duration: "2 years",
        english: Some((60, 800, 500)),
    },
];

const UFC_PROGRAMS: [ProgramSeed; 1] = [ProgramSeed {
    name: "Diploma in Hospitality Management",
    slug: "diploma-hospitality-management",
    program_type: "Diploma",
    level: "Diploma",
    delivery: DeliveryType::OnCampus,
    duration: "1 year",
    english: None,
}];

fn seed_university(
    store: &MemoryStore,
    name: &str,
    short_name: &str,
    slug: &str,
    programs: &[ProgramSeed],
) -> Result<(University, Vec<Program>), RepositoryError> {
    let university = University {
        id: UniversityId::new(),
        name: name.to_string(),
        short_name: short_name.to_string(),
        slug: slug.to_string(),
    };
    store.insert_university(university.clone())?;

    let mut seeded = Vec::with_capacity(programs.len());
    for seed in programs {
        let program = Program {
            id: ProgramId::new(),
            university: university.id,
            name: seed.name.to_string(),
            slug: seed.slug.to_string(),
            program_type: seed.program_type.to_string(),
            level: seed.level.to_string(),
            delivery: seed.delivery,
            duration: seed.duration.to_string(),
            is_active: true,
        };
        store.insert_program(program.clone())?;
        if let Some((ielts, toefl, pte)) = seed.english {
            store.insert_english_requirement(EnglishRequirement {
                id: Uuid::new_v4(),
                program: program.id,
                ielts: Some(Score::from_tenths(ielts)),
                toefl: Some(Score::from_tenths(toefl)),
                pte: Some(Score::from_tenths(pte)),
            })?;
        }
        seeded.push(program);
    }
    Ok((university, seeded))
}

pub(crate) fn seed_catalog(store: &MemoryStore) -> Result<SeededCatalog, RepositoryError> {
    let (flagship, programs) = seed_university(
        store,
        "Trikon University Dubai",
        "TUD",
        "trikon-university-dubai",
        &TUD_PROGRAMS,
    )?;
    seed_university(
        store,
        "UAE Future College",
        "UFC",
        "uae-future-college",
        &UFC_PROGRAMS,
    )?;

    let find = |slug: &str| {
        programs
            .iter()
            .find(|program| program.slug == slug)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    };
    Ok(SeededCatalog {
        open_program: find("bsc-computer-science")?,
        english_program: find("msc-data-science")?,
        flagship,
    })
}

/// Student account to drive the wizard against a fresh in-memory store.
pub(crate) fn seed_student(
    store: &MemoryStore,
    username: &str,
    first_name: &str,
    last_name: &str,
) -> Result<StudentProfile, RepositoryError> {
    let mut profile = StudentProfile::new(username, format!("{username}@students.example"));
    profile.first_name = first_name.to_string();
    profile.last_name = last_name.to_string();
    store.insert_student(profile.clone())?;
    Ok(profile)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
