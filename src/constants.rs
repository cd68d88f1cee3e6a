//! # Constants
//!
//! Naming conventions, report layout and defaults of the shielding
//! application.

// ============================================================================
// TRACKING CONVENTIONS
// ============================================================================

/// Track id of the primary particle
pub const PRIMARY_TRACK_ID: i32 = 1;

/// Sentinel for "no track seen yet in this event" (never a real track id)
pub const NO_TRACK: i32 = 0;

/// Particle names recorded row by row in the ntuples
pub const NEUTRON: &str = "neutron";
pub const GAMMA: &str = "gamma";

// ============================================================================
// SENSITIVE DETECTOR REPORT
// ============================================================================

/// Name of the sensitive detector on the shield face
pub const DEFAULT_DETECTOR_NAME: &str = "SD1";

/// Header prefix of the particle count report
pub const REPORT_HEADER: &str = "PARTICLE COUNT OF";

/// Suffix of report files: `<id>_ListOfGeneratedParticles in <detector>.txt`
pub const REPORT_FILE_STEM: &str = "_ListOfGeneratedParticles in";

/// Field widths of a report line
pub const REPORT_NAME_WIDTH: usize = 15;
pub const REPORT_COUNT_WIDTH: usize = 10;

/// Upper bound on file-name probes before giving up
pub const MAX_REPORT_PROBES: u32 = 100_000;

// ============================================================================
// RUN REPORT
// ============================================================================

pub const PROCESS_NAME_WIDTH: usize = 20;
pub const PROCESS_COUNT_WIDTH: usize = 7;
pub const SPECIES_NAME_WIDTH: usize = 13;
pub const SPECIES_COUNT_WIDTH: usize = 7;

// ============================================================================
// OUTPUT DEFAULTS
// ============================================================================

pub const DEFAULT_OUTPUT_FOLDER: &str = "output";
pub const DEFAULT_LIST_FOLDER: &str = "ListOfGeneratedParticles";
pub const DEFAULT_NTUPLE_STEM: &str = "Shielding";
pub const SUMMARY_FILE_NAME: &str = "run_summary.json";
