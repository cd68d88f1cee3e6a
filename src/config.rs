//! # Configuration
//!
//! Run and output configuration injected into the accumulators and the
//! sensitive detector.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Result, ShieldError};
use crate::types::PrimarySource;

/// Where reports and ntuples are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Top-level output folder
    pub folder_name: String,
    /// Sub-folder holding the particle count reports
    pub list_folder: String,
    /// File stem of the ntuple CSV files
    pub ntuple_stem: String,
    /// Also persist the end-of-run summary as JSON
    pub write_summary_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder_name: DEFAULT_OUTPUT_FOLDER.to_string(),
            list_folder: DEFAULT_LIST_FOLDER.to_string(),
            ntuple_stem: DEFAULT_NTUPLE_STEM.to_string(),
            write_summary_json: false,
        }
    }
}

impl OutputConfig {
    /// Output folder rooted at `folder_name`
    pub fn with_folder(folder_name: impl Into<String>) -> Self {
        Self {
            folder_name: folder_name.into(),
            ..Self::default()
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.folder_name)
    }

    /// `<folder_name>/<list_folder>`
    pub fn list_dir(&self) -> PathBuf {
        self.output_dir().join(&self.list_folder)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir().join(SUMMARY_FILE_NAME)
    }
}

/// Simulation run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Worker threads
    pub n_threads: usize,
    /// Events across all workers
    pub n_events: u64,
    /// Primary particle name
    pub primary_particle: String,
    /// Primary kinetic energy (MeV)
    pub primary_energy: f64,
    /// RNG seed; worker `i` uses `seed + i`, wrapping at `u64::MAX`
    pub seed: u64,
    /// Sensitive detector name
    pub detector_name: String,
    pub output: OutputConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_threads: 4,
            n_events: 10_000,
            primary_particle: NEUTRON.to_string(),
            primary_energy: 14.1,
            seed: 12345,
            detector_name: DEFAULT_DETECTOR_NAME.to_string(),
            output: OutputConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.n_threads == 0 {
            return Err(ShieldError::config("n_threads must be at least 1"));
        }
        if !(self.primary_energy > 0.0) {
            return Err(ShieldError::config(format!(
                "primary_energy must be positive, got {}",
                self.primary_energy
            )));
        }
        if self.primary_particle.trim().is_empty() {
            return Err(ShieldError::config("primary_particle is empty"));
        }
        if self.detector_name.trim().is_empty() {
            return Err(ShieldError::config("detector_name is empty"));
        }
        if self.output.folder_name.trim().is_empty() {
            return Err(ShieldError::config("output folder_name is empty"));
        }
        Ok(())
    }

    pub fn primary(&self) -> PrimarySource {
        PrimarySource::new(self.primary_particle.clone(), self.primary_energy)
    }

    /// Seed of the synthetic source on `worker`
    pub fn worker_seed(&self, worker: usize) -> u64 {
        self.seed.wrapping_add(worker as u64)
    }
}
