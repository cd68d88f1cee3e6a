//! # Simulator Module
//!
//! Lifecycle driver standing in for the hosting toolkit's run manager.
//!
//! ```text
//! run begin      → one RunAccumulator + HitCounter + NtupleBook per worker,
//!                  set_primary
//! per event      → on_event_start, on_step for each boundary step,
//!                  process/particle/energy scoring, end_of_event
//! workers joined → sequential merge into the master (never concurrent),
//!                  WorkerJoined to each worker's hit counter
//! run end        → master end_of_run, AllWorkersFinished to the merged
//!                  hit counter (report file), ntuple CSVs
//! ```
//!
//! Workers run on a rayon pool; the ion registry is the only state they
//! share.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::SimulationConfig;
use crate::detector::{HitCounter, ReportFile, WorkerSignal};
use crate::error::Result;
use crate::ntuple::NtupleBook;
use crate::registry::IonRegistry;
use crate::run::{RunAccumulator, RunSummary};
use crate::source::{EventRecord, EventSource, JsonLinesSource, SyntheticSource};

/// State owned by one worker for the duration of a run
#[derive(Debug)]
pub struct WorkerState {
    pub worker_id: usize,
    pub run: RunAccumulator,
    pub hits: HitCounter,
    pub ntuples: NtupleBook,
}

impl WorkerState {
    fn new(worker_id: usize, config: &SimulationConfig, ions: Arc<IonRegistry>) -> Self {
        let mut run = RunAccumulator::new(ions);
        run.set_primary(config.primary_particle.clone(), config.primary_energy);
        Self {
            worker_id,
            run,
            hits: HitCounter::new(config.detector_name.clone()),
            ntuples: NtupleBook::new(),
        }
    }

    /// Feed one event through the detector and the accumulator
    pub fn process_event(&mut self, event: &EventRecord) {
        self.hits.on_event_start();
        for step in &event.steps {
            self.hits.on_step(step, &mut self.ntuples);
        }

        for process in &event.processes {
            self.run.count_process(process);
        }
        for secondary in &event.produced {
            self.run
                .record_particle_produced(&secondary.name, secondary.ekin, secondary.mean_life);
            if secondary.is_ion {
                self.run.ion_id(&secondary.name);
            }
        }
        for particle in &event.emerging {
            self.run.record_particle_flux(&particle.name, particle.ekin);
        }

        self.run.add_energy_deposit(event.energy_deposit);
        self.run.add_energy_flow(event.energy_flow);
        self.run.end_of_event();
    }
}

/// Result of a complete run
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// Merged secondary counts of the sensitive detector
    pub particle_counts: BTreeMap<String, u64>,
    /// Particle list file, `None` if it could not be written
    pub report_file: Option<ReportFile>,
    pub ntuple_files: Vec<PathBuf>,
    pub ntuple_rows: usize,
    pub summary_file: Option<PathBuf>,
    /// Wall-clock time (s)
    pub elapsed: f64,
}

/// Multithreaded run driver
pub struct RunManager {
    pub config: SimulationConfig,
}

impl RunManager {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Events handled by `worker`; the remainder goes to the first workers
    pub fn events_for_worker(&self, worker: usize) -> u64 {
        let n_threads = self.config.n_threads as u64;
        let base = self.config.n_events / n_threads;
        let extra = self.config.n_events % n_threads;
        base + u64::from((worker as u64) < extra)
    }

    /// Run with the synthetic shielding source
    pub fn run_synthetic(&self) -> Result<RunOutcome> {
        let primary = self.config.primary();
        log::info!(
            "Synthetic source: {} events of {}",
            self.config.n_events,
            primary
        );
        self.run(|worker, n_events| {
            Ok(SyntheticSource::new(
                primary.clone(),
                self.config.worker_seed(worker),
                n_events,
            ))
        })
    }

    /// Replay an `events.jsonl` file, records dealt round-robin to workers
    pub fn replay(&self, path: &Path) -> Result<RunOutcome> {
        let n_threads = self.config.n_threads;
        log::info!("Replaying events from {}", path.display());
        self.run(|worker, _| Ok(JsonLinesSource::open(path)?.with_stride(worker, n_threads)))
    }

    /// Run all workers on events from `factory(worker_id, n_events)`
    pub fn run<S, F>(&self, factory: F) -> Result<RunOutcome>
    where
        S: EventSource,
        F: Fn(usize, u64) -> Result<S> + Sync,
    {
        let config = &self.config;
        let start = Instant::now();
        let ions = Arc::new(IonRegistry::default());

        log::info!(
            "### Run start: {} on {} worker(s)",
            config.primary(),
            config.n_threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.n_threads)
            .thread_name(|i| format!("shield-worker-{}", i))
            .build()?;

        let workers: Vec<WorkerState> = pool.install(|| {
            (0..config.n_threads)
                .into_par_iter()
                .map(|worker_id| -> Result<WorkerState> {
                    let mut source = factory(worker_id, self.events_for_worker(worker_id))?;
                    let mut state = WorkerState::new(worker_id, config, Arc::clone(&ions));
                    while let Some(event) = source.next_event()? {
                        state.process_event(&event);
                    }
                    log::debug!(
                        "Worker {} finished {} events",
                        worker_id,
                        state.run.n_events()
                    );
                    Ok(state)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        // Master accumulation, one worker at a time
        let mut master = WorkerState::new(usize::MAX, config, Arc::clone(&ions));
        for worker in &workers {
            master.run.merge(&worker.run);
            master.hits.merge(&worker.hits);
            master.ntuples.merge(&worker.ntuples);
            worker
                .hits
                .on_worker_thread_finish(WorkerSignal::WorkerJoined, &config.output)?;
            log::debug!("Merged worker {}", worker.worker_id);
        }

        let summary = master.run.end_of_run();

        let report_file = match master
            .hits
            .on_worker_thread_finish(WorkerSignal::AllWorkersFinished, &config.output)
        {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Particle list of {} not written: {}", master.hits.name(), e);
                None
            }
        };

        let ntuple_files = match master
            .ntuples
            .write_csv(&config.output.output_dir(), &config.output.ntuple_stem)
        {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Ntuples not written: {}", e);
                Vec::new()
            }
        };

        let summary_file = if config.output.write_summary_json {
            let path = config.output.summary_path();
            match summary.write_json(&path) {
                Ok(()) => Some(path),
                Err(e) => {
                    log::warn!("Run summary not written to {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        let elapsed = start.elapsed().as_secs_f64();
        log::info!("### Run end: {} events in {:.3} s", summary.n_events, elapsed);

        Ok(RunOutcome {
            summary,
            particle_counts: master.hits.species_count().clone(),
            report_file,
            ntuple_files,
            ntuple_rows: master.ntuples.total_rows(),
            summary_file,
            elapsed,
        })
    }
}
