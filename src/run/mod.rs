//! # Run Accumulator
//!
//! Per-worker aggregation of a run: process calls, produced particles,
//! particles leaving the target, energy deposit and energy flow. Each worker
//! owns one accumulator; at end of run the workers are merged into a master
//! whose [`RunAccumulator::end_of_run`] produces the final [`RunSummary`].
//!
//! ## Per-event statistics
//!
//! ```text
//! mean      = Σx / N
//! std error = sqrt((Σx²/N - mean²) / N)     (radicand clamped at 0)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::constants::*;
use crate::error::Result;
use crate::registry::IonRegistry;
use crate::statistics::{Moments, ParticleStatsMap};
use crate::types::PrimarySource;
use crate::units::{best_energy, best_time};

/// Run-level accumulator of one worker (or the master)
#[derive(Debug, Clone)]
pub struct RunAccumulator {
    primary: Option<PrimarySource>,
    n_events: u64,
    process_counter: BTreeMap<String, u64>,
    /// Particles created in the target
    produced: ParticleStatsMap,
    /// Particles leaving the target
    flux: ParticleStatsMap,
    energy_deposit: Moments,
    energy_flow: Moments,
    ions: Arc<IonRegistry>,
}

impl RunAccumulator {
    /// Accumulator sharing the run's ion registry
    pub fn new(ions: Arc<IonRegistry>) -> Self {
        Self {
            primary: None,
            n_events: 0,
            process_counter: BTreeMap::new(),
            produced: ParticleStatsMap::new(),
            flux: ParticleStatsMap::new(),
            energy_deposit: Moments::new(),
            energy_flow: Moments::new(),
            ions,
        }
    }

    /// Record the particle gun; repeated calls overwrite with the same values
    pub fn set_primary(&mut self, particle: impl Into<String>, energy: f64) {
        self.primary = Some(PrimarySource::new(particle, energy));
    }

    pub fn primary(&self) -> Option<&PrimarySource> {
        self.primary.as_ref()
    }

    /// Count one invocation of a physics process
    pub fn count_process(&mut self, process: &str) {
        *self.process_counter.entry(process.to_string()).or_insert(0) += 1;
    }

    /// Record a particle created in the target
    pub fn record_particle_produced(&mut self, name: &str, ekin: f64, mean_life: Option<f64>) {
        debug_assert!(ekin >= 0.0, "negative kinetic energy {} for {}", ekin, name);
        self.produced.record(name, ekin, mean_life);
    }

    /// Record a particle leaving the target
    pub fn record_particle_flux(&mut self, name: &str, ekin: f64) {
        debug_assert!(ekin >= 0.0, "negative kinetic energy {} for {}", ekin, name);
        self.flux.record(name, ekin, None);
    }

    /// Score the energy deposited in one event
    pub fn add_energy_deposit(&mut self, edep: f64) {
        self.energy_deposit.add(edep);
    }

    /// Score the energy leaving the target in one event
    pub fn add_energy_flow(&mut self, eflow: f64) {
        self.energy_flow.add(eflow);
    }

    pub fn end_of_event(&mut self) {
        self.n_events += 1;
    }

    /// Run-wide id of an ion species
    pub fn ion_id(&self, name: &str) -> u32 {
        self.ions.id_for(name)
    }

    pub fn ions(&self) -> &Arc<IonRegistry> {
        &self.ions
    }

    pub fn n_events(&self) -> u64 {
        self.n_events
    }

    pub fn process_counts(&self) -> &BTreeMap<String, u64> {
        &self.process_counter
    }

    pub fn produced(&self) -> &ParticleStatsMap {
        &self.produced
    }

    pub fn flux(&self) -> &ParticleStatsMap {
        &self.flux
    }

    pub fn energy_deposit(&self) -> &Moments {
        &self.energy_deposit
    }

    pub fn energy_flow(&self) -> &Moments {
        &self.energy_flow
    }

    /// Fold a worker's accumulator into this one
    pub fn merge(&mut self, other: &RunAccumulator) {
        if self.primary.is_none() {
            self.primary = other.primary.clone();
        }
        self.n_events += other.n_events;

        for (process, count) in &other.process_counter {
            *self.process_counter.entry(process.clone()).or_insert(0) += count;
        }

        self.produced.merge(&other.produced);
        self.flux.merge(&other.flux);
        self.energy_deposit.merge(&other.energy_deposit);
        self.energy_flow.merge(&other.energy_flow);
    }

    /// Derived statistics of the whole run
    pub fn end_of_run(&self) -> RunSummary {
        let n = self.n_events;

        let processes = self
            .process_counter
            .iter()
            .map(|(name, &count)| ProcessCount {
                name: name.clone(),
                count,
            })
            .collect();

        let produced = self
            .produced
            .iter()
            .map(|(name, stats)| SpeciesSummary {
                name: name.to_string(),
                count: stats.count,
                mean_energy: stats.mean_energy,
                min_energy: stats.min_energy,
                max_energy: stats.max_energy,
                mean_life: stats.mean_life,
                energy_flow_per_event: None,
            })
            .collect();

        let emerging = self
            .flux
            .iter()
            .map(|(name, stats)| SpeciesSummary {
                name: name.to_string(),
                count: stats.count,
                mean_energy: stats.mean_energy,
                min_energy: stats.min_energy,
                max_energy: stats.max_energy,
                mean_life: None,
                energy_flow_per_event: Some(if n > 0 {
                    stats.total_energy() / n as f64
                } else {
                    0.0
                }),
            })
            .collect();

        let summary = RunSummary {
            primary: self.primary.clone(),
            n_events: n,
            processes,
            energy_deposit: MeanWithError {
                mean: self.energy_deposit.mean_over(n),
                std_error: self.energy_deposit.std_error_over(n),
            },
            energy_flow: MeanWithError {
                mean: self.energy_flow.mean_over(n),
                std_error: self.energy_flow.std_error_over(n),
            },
            produced,
            emerging,
            ions: self.ions.snapshot(),
        };

        log::info!(
            "End of run: {} events, {} secondaries produced, {} ion species",
            n,
            self.produced.total_count(),
            summary.ions.len()
        );
        summary
    }
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

/// Invocation count of one process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessCount {
    pub name: String,
    pub count: u64,
}

/// Per-event mean and its standard error (MeV)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeanWithError {
    pub mean: f64,
    pub std_error: f64,
}

/// One row of a species table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesSummary {
    pub name: String,
    pub count: u64,
    pub mean_energy: f64,
    pub min_energy: f64,
    pub max_energy: f64,
    /// Mean life (ns), produced particles only
    pub mean_life: Option<f64>,
    /// Energy carried out per event (MeV), emerging particles only
    pub energy_flow_per_event: Option<f64>,
}

/// End-of-run report of the master accumulator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub primary: Option<PrimarySource>,
    pub n_events: u64,
    pub processes: Vec<ProcessCount>,
    pub energy_deposit: MeanWithError,
    pub energy_flow: MeanWithError,
    pub produced: Vec<SpeciesSummary>,
    pub emerging: Vec<SpeciesSummary>,
    /// Ion species seen during the run, by id
    pub ions: Vec<(String, u32)>,
}

impl RunSummary {
    pub fn process(&self, name: &str) -> Option<u64> {
        self.processes.iter().find(|p| p.name == name).map(|p| p.count)
    }

    pub fn produced_species(&self, name: &str) -> Option<&SpeciesSummary> {
        self.produced.iter().find(|s| s.name == name)
    }

    pub fn emerging_species(&self, name: &str) -> Option<&SpeciesSummary> {
        self.emerging.iter().find(|s| s.name == name)
    }

    /// Persist as pretty JSON
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "======================== run summary ========================")?;
        match &self.primary {
            Some(primary) => writeln!(f, " The run is {} {}", self.n_events, primary)?,
            None => writeln!(f, " The run is {} events", self.n_events)?,
        }

        writeln!(f)?;
        writeln!(f, " Process calls frequency :")?;
        for p in &self.processes {
            writeln!(
                f,
                "   {:>nw$}= {:>cw$}",
                p.name,
                p.count,
                nw = PROCESS_NAME_WIDTH,
                cw = PROCESS_COUNT_WIDTH
            )?;
        }

        writeln!(f)?;
        writeln!(
            f,
            " Mean energy deposit per event = {};  std error = {}",
            best_energy(self.energy_deposit.mean),
            best_energy(self.energy_deposit.std_error)
        )?;
        writeln!(
            f,
            " Mean energy flow per event    = {};  std error = {}",
            best_energy(self.energy_flow.mean),
            best_energy(self.energy_flow.std_error)
        )?;

        writeln!(f)?;
        writeln!(f, " List of generated particles:")?;
        for s in &self.produced {
            write!(f, "{}", species_line(s))?;
            match s.mean_life {
                Some(life) => writeln!(f, "\tmean life = {}", best_time(life))?,
                None => writeln!(f, "\tstable")?,
            }
        }

        writeln!(f)?;
        writeln!(f, " List of particles emerging from the target:")?;
        for s in &self.emerging {
            writeln!(
                f,
                "{}\tEflow/event = {}",
                species_line(s),
                best_energy(s.energy_flow_per_event.unwrap_or(0.0))
            )?;
        }

        if !self.ions.is_empty() {
            writeln!(f)?;
            writeln!(f, " Ion ids:")?;
            for (name, id) in &self.ions {
                writeln!(f, "   {:>nw$}: {}", name, id, nw = SPECIES_NAME_WIDTH)?;
            }
        }

        write!(f, "=============================================================")
    }
}

fn species_line(s: &SpeciesSummary) -> String {
    format!(
        "  {:>nw$}: {:>cw$}  Emean = {:>10}\t( {} --> {})",
        s.name,
        s.count,
        best_energy(s.mean_energy),
        best_energy(s.min_energy),
        best_energy(s.max_energy),
        nw = SPECIES_NAME_WIDTH,
        cw = SPECIES_COUNT_WIDTH
    )
}
