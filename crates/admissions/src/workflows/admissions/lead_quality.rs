use serde::{Deserialize, Serialize};

use super::domain::LeadQuality;

/// Completeness facts gathered when the wizard submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeadSignals {
    /// The student holds at least one uploaded document of any type.
    pub has_documents: bool,
    /// The target program has at least one English requirement record.
    pub program_requires_english: bool,
    /// A test score was supplied or referenced in the English step.
    pub has_english_proof: bool,
}

/// First matching rule wins.
pub fn score(signals: LeadSignals) -> LeadQuality {
    let LeadSignals {
        has_documents,
        program_requires_english,
        has_english_proof,
    } = signals;

    if has_documents && (has_english_proof || !program_requires_english) {
        LeadQuality::High
    } else if has_documents || has_english_proof {
        LeadQuality::Medium
    } else {
        LeadQuality::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(docs: bool, requires: bool, proof: bool) -> LeadSignals {
        LeadSignals {
            has_documents: docs,
            program_requires_english: requires,
            has_english_proof: proof,
        }
    }

    #[test]
    fn documents_without_english_requirement_are_high() {
        assert_eq!(score(signals(true, false, false)), LeadQuality::High);
    }

    #[test]
    fn documents_with_required_proof_are_high() {
        assert_eq!(score(signals(true, true, true)), LeadQuality::High);
    }

    #[test]
    fn documents_missing_required_proof_are_medium() {
        assert_eq!(score(signals(true, true, false)), LeadQuality::Medium);
    }

    #[test]
    fn proof_without_documents_is_medium() {
        assert_eq!(score(signals(false, true, true)), LeadQuality::Medium);
    }

    #[test]
    fn nothing_supplied_is_low() {
        assert_eq!(score(signals(false, false, false)), LeadQuality::Low);
        assert_eq!(score(signals(false, true, false)), LeadQuality::Low);
    }
}
