//! # SHIELDSIM-RS
//!
//! Run statistics and sensitive-detector bookkeeping for shielding Monte
//! Carlo simulations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          SHIELDSIM-RS                                       │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  source     : events from the transport toolkit (synthetic / JSONL replay)  │
//! │  detector   : SD1 hit counter, secondary dedup, particle list report        │
//! │  ntuple     : neutron / gamma hit rows, CSV output                          │
//! │  run        : per-worker run accumulator, merge, end-of-run summary         │
//! │  statistics : running moments and per-species energy statistics             │
//! │  registry   : run-wide ion id registry (thread-safe)                        │
//! │  simulator  : lifecycle driver over a worker pool                           │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transport physics, geometry and the toolkit's threading are external;
//! this crate only sees the lifecycle callbacks.

pub mod constants;
pub mod units;
pub mod types;
pub mod error;
pub mod config;
pub mod statistics;
pub mod registry;
pub mod ntuple;
pub mod detector;
pub mod run;
pub mod source;
pub mod simulator;

#[cfg(test)]
mod property_tests;

// Re-exports
pub use config::{OutputConfig, SimulationConfig};
pub use detector::{HitCounter, ReportFile, WorkerSignal};
pub use error::{Result, ShieldError};
pub use ntuple::{HitRow, NtupleBook, NtupleChannel, NtupleSink};
pub use registry::IonRegistry;
pub use run::{RunAccumulator, RunSummary};
pub use simulator::{RunManager, RunOutcome};
pub use source::{EventRecord, EventSource, JsonLinesSource, SyntheticSource};
pub use statistics::{Moments, ParticleStats, ParticleStatsMap};
pub use types::{PrimarySource, StepPoint, Vec3};

/// SHIELDSIM version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Information about the crate
pub fn info() -> String {
    format!(
        "SHIELDSIM-RS v{}\n\
         Shielding Monte Carlo run statistics\n\
         Run accumulation, secondary counting, ntuple output",
        VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info() {
        let info = info();
        assert!(info.contains("SHIELDSIM"));
        assert!(info.contains(VERSION));
    }
}
