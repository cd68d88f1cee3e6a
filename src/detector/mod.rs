//! # Sensitive Detector
//!
//! Hit counting on the shield face. The hosting framework calls
//! [`HitCounter::on_step`] for every step crossing the sensitive volume:
//!
//! 1. Secondaries (track id > 1) are counted per species, once per track and
//!    event.
//! 2. Every neutron or gamma step is written as a row to its ntuple,
//!    without deduplication.
//!
//! The per-species tally lives for the whole worker. When the run manager
//! signals that all workers have finished, the merged tally is printed and
//! written to `<folder>/<list_folder>/<id>_ListOfGeneratedParticles in <SD>.txt`,
//! where `<id>` starts at the process id and is probed upward until free.

use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::OutputConfig;
use crate::constants::*;
use crate::error::{Result, ShieldError};
use crate::ntuple::{HitRow, NtupleChannel, NtupleSink};
use crate::types::StepPoint;
use crate::units::{CM, MEV, NS};

/// Teardown signal delivered to a worker's hit counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSignal {
    /// This worker joined; others may still be running
    WorkerJoined,
    /// Every worker has joined; flush the report
    AllWorkersFinished,
}

/// Report file written at teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub path: PathBuf,
    /// Numeric prefix of the file name
    pub id: u32,
}

/// Secondary particle counter of one sensitive detector
#[derive(Debug, Clone)]
pub struct HitCounter {
    name: String,
    last_track_id: i32,
    counted_tracks: HashSet<i32>,
    species_count: BTreeMap<String, u64>,
}

impl HitCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_track_id: NO_TRACK,
            counted_tracks: HashSet::new(),
            species_count: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_track_id(&self) -> i32 {
        self.last_track_id
    }

    /// Forget the tracks of the previous event
    pub fn on_event_start(&mut self) {
        self.last_track_id = NO_TRACK;
        self.counted_tracks.clear();
    }

    /// Process one step crossing the sensitive volume
    pub fn on_step<S: NtupleSink + ?Sized>(&mut self, step: &StepPoint, sink: &mut S) {
        if step.is_secondary()
            && step.track_id != self.last_track_id
            && self.counted_tracks.insert(step.track_id)
        {
            *self.species_count.entry(step.particle.clone()).or_insert(0) += 1;
        }
        self.last_track_id = step.track_id;

        if let Some(channel) = NtupleChannel::from_particle_name(&step.particle) {
            sink.add_row(
                channel,
                HitRow {
                    ekin: step.kinetic_energy / MEV,
                    x: step.local_position.x / CM,
                    y: step.local_position.y / CM,
                    time: step.global_time / NS,
                },
            );
        }
    }

    /// Count of `particle` secondaries seen so far
    pub fn count(&self, particle: &str) -> u64 {
        self.species_count.get(particle).copied().unwrap_or(0)
    }

    pub fn species_count(&self) -> &BTreeMap<String, u64> {
        &self.species_count
    }

    pub fn total(&self) -> u64 {
        self.species_count.values().sum()
    }

    /// Add the tally of another worker's counter
    pub fn merge(&mut self, other: &HitCounter) {
        for (name, count) in &other.species_count {
            *self.species_count.entry(name.clone()).or_insert(0) += count;
        }
    }

    /// Formatted particle count report
    pub fn report(&self) -> String {
        let mut s = format!("{} {}\n", REPORT_HEADER, self.name);
        for (name, count) in &self.species_count {
            s.push_str(&format!(
                "  {:>nw$}: {:>cw$}\n",
                name,
                count,
                nw = REPORT_NAME_WIDTH,
                cw = REPORT_COUNT_WIDTH
            ));
        }
        s
    }

    /// Teardown hook; only `AllWorkersFinished` prints and persists the report
    pub fn on_worker_thread_finish(
        &self,
        signal: WorkerSignal,
        output: &OutputConfig,
    ) -> Result<Option<ReportFile>> {
        if signal != WorkerSignal::AllWorkersFinished {
            return Ok(None);
        }

        let report = self.report();
        log::info!("\n{}", report.trim_end());

        let dir = output.list_dir();
        std::fs::create_dir_all(&dir)?;

        let (mut file, report_file) = create_unique_report(&dir, &self.name, std::process::id())?;
        file.write_all(report.as_bytes())?;
        file.flush()?;

        log::info!(
            "Particle list of {} secondaries written to {}",
            self.total(),
            report_file.path.display()
        );
        Ok(Some(report_file))
    }
}

/// `<id>_ListOfGeneratedParticles in <detector>.txt`
pub fn report_file_name(id: u32, detector: &str) -> String {
    format!("{}{} {}.txt", id, REPORT_FILE_STEM, detector)
}

/// Create a report file that did not exist before, probing ids upward from
/// `start`. Existing names are skipped by a cheap existence check first; the
/// create itself is exclusive, so a name taken in between is skipped too.
pub fn create_unique_report(dir: &Path, detector: &str, start: u32) -> Result<(File, ReportFile)> {
    for offset in 0..MAX_REPORT_PROBES {
        let Some(id) = start.checked_add(offset) else {
            break;
        };
        let path = dir.join(report_file_name(id, detector));
        if path.exists() {
            continue;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, ReportFile { path, id })),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(ShieldError::ReportNameExhausted {
        start,
        probes: MAX_REPORT_PROBES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntuple::NtupleBook;
    use crate::types::Vec3;
    use tempfile::TempDir;

    fn step(track_id: i32, particle: &str) -> StepPoint {
        StepPoint::new(track_id, particle, 2.0, Vec3::new(10.0, -20.0, 0.0), 5.0)
    }

    #[test]
    fn test_dedup_sequence() {
        let mut sd = HitCounter::new("SD1");
        let mut book = NtupleBook::new();
        sd.on_event_start();

        for id in [1, 2, 2, 3, 1, 3] {
            sd.on_step(&step(id, "e-"), &mut book);
        }

        assert_eq!(sd.count("e-"), 2);
        assert_eq!(sd.last_track_id(), 3);
    }

    #[test]
    fn test_primary_never_counted() {
        let mut sd = HitCounter::new("SD1");
        let mut book = NtupleBook::new();
        sd.on_step(&step(1, "neutron"), &mut book);
        sd.on_step(&step(1, "neutron"), &mut book);

        assert_eq!(sd.total(), 0);
        // rows are still written for every neutron step
        assert_eq!(book.len(NtupleChannel::Neutron), 2);
    }

    #[test]
    fn test_event_reset_allows_same_id_again() {
        let mut sd = HitCounter::new("SD1");
        let mut book = NtupleBook::new();

        sd.on_event_start();
        sd.on_step(&step(2, "gamma"), &mut book);
        sd.on_event_start();
        assert_eq!(sd.last_track_id(), NO_TRACK);
        sd.on_step(&step(2, "gamma"), &mut book);

        assert_eq!(sd.count("gamma"), 2);
    }

    #[test]
    fn test_rows_in_output_units() {
        let mut sd = HitCounter::new("SD1");
        let mut book = NtupleBook::new();
        sd.on_step(&step(4, "gamma"), &mut book);
        sd.on_step(&step(4, "gamma"), &mut book);
        sd.on_step(&step(5, "proton"), &mut book);

        let rows = book.rows(NtupleChannel::Gamma);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ekin, 2.0);
        assert_eq!(rows[0].x, 1.0);
        assert_eq!(rows[0].y, -2.0);
        assert_eq!(rows[0].time, 5.0);
        assert_eq!(book.len(NtupleChannel::Neutron), 0);
        assert_eq!(sd.count("gamma"), 1);
        assert_eq!(sd.count("proton"), 1);
    }

    #[test]
    fn test_report_format() {
        let mut sd = HitCounter::new("SD1");
        let mut book = NtupleBook::new();
        sd.on_step(&step(2, "neutron"), &mut book);
        sd.on_step(&step(3, "e-"), &mut book);
        sd.on_step(&step(4, "e-"), &mut book);

        let report = sd.report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "PARTICLE COUNT OF SD1");
        assert_eq!(lines[1], format!("  {:>15}: {:>10}", "e-", 2));
        assert_eq!(lines[2], format!("  {:>15}: {:>10}", "neutron", 1));
    }

    #[test]
    fn test_merge_sums_tallies() {
        let mut book = NtupleBook::new();
        let mut a = HitCounter::new("SD1");
        a.on_step(&step(2, "gamma"), &mut book);
        let mut b = HitCounter::new("SD1");
        b.on_step(&step(2, "gamma"), &mut book);
        b.on_step(&step(3, "alpha"), &mut book);

        a.merge(&b);
        assert_eq!(a.count("gamma"), 2);
        assert_eq!(a.count("alpha"), 1);
    }

    #[test]
    fn test_worker_joined_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let output = OutputConfig::with_folder(tmp.path().join("out").to_string_lossy());
        let sd = HitCounter::new("SD1");

        let written = sd
            .on_worker_thread_finish(WorkerSignal::WorkerJoined, &output)
            .unwrap();
        assert!(written.is_none());
        assert!(!output.list_dir().exists());
    }

    #[test]
    fn test_empty_report_still_written() {
        let tmp = TempDir::new().unwrap();
        let output = OutputConfig::with_folder(tmp.path().join("out").to_string_lossy());
        let sd = HitCounter::new("SD1");

        let report = sd
            .on_worker_thread_finish(WorkerSignal::AllWorkersFinished, &output)
            .unwrap()
            .unwrap();
        let content = std::fs::read_to_string(&report.path).unwrap();
        assert_eq!(content, "PARTICLE COUNT OF SD1\n");
        assert_eq!(report.id, std::process::id());
    }

    #[test]
    fn test_report_name_probing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        std::fs::write(dir.join(report_file_name(100, "SD1")), "taken").unwrap();

        let (_, first) = create_unique_report(dir, "SD1", 100).unwrap();
        assert_eq!(first.id, 101);

        let ids: Vec<u32> = (0..3)
            .map(|_| create_unique_report(dir, "SD1", 100).unwrap().1.id)
            .collect();
        assert_eq!(ids, vec![102, 103, 104]);

        // the pre-existing file was not overwritten
        let taken = std::fs::read_to_string(dir.join(report_file_name(100, "SD1"))).unwrap();
        assert_eq!(taken, "taken");
    }

    #[test]
    fn test_report_names_exhausted() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        for id in [u32::MAX - 1, u32::MAX] {
            std::fs::write(dir.join(report_file_name(id, "SD1")), "taken").unwrap();
        }

        let err = create_unique_report(dir, "SD1", u32::MAX - 1).unwrap_err();
        assert!(matches!(
            err,
            ShieldError::ReportNameExhausted {
                start,
                probes: MAX_REPORT_PROBES,
            } if start == u32::MAX - 1
        ));
    }

    #[test]
    fn test_sequential_flushes_do_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let output = OutputConfig::with_folder(tmp.path().to_string_lossy());
        let mut book = NtupleBook::new();

        let mut paths = HashSet::new();
        for n in 0..3 {
            let mut sd = HitCounter::new("SD1");
            for id in 2..(2 + n) {
                sd.on_step(&step(id, "gamma"), &mut book);
            }
            let report = sd
                .on_worker_thread_finish(WorkerSignal::AllWorkersFinished, &output)
                .unwrap()
                .unwrap();
            paths.insert(report.path);
        }
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name(4242, "SD1"),
            "4242_ListOfGeneratedParticles in SD1.txt"
        );
    }
}
