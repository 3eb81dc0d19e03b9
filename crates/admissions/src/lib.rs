//! University admissions portal core: application review lifecycle, lead-quality
//! triage and the multi-step application wizard.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
