//! # Event Sources
//!
//! Per-event records handed to the run manager. The transport itself is
//! external: an [`EventSource`] stands in for the toolkit and yields, per
//! event, the boundary steps seen by the sensitive detector and the
//! quantities the run accumulator scores.
//!
//! - [`SyntheticSource`]: seeded toy shielding model (not physics), used to
//!   drive the statistics layer end to end.
//! - [`JsonLinesSource`]: replays `events.jsonl` files captured with
//!   [`EventWriter`], one [`EventRecord`] per line.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Result, ShieldError};
use crate::types::{PrimarySource, StepPoint, Vec3};
use crate::units::{NS, S};

// ============================================================================
// EVENT RECORD
// ============================================================================

/// Particle created in the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryRecord {
    pub name: String,
    /// Kinetic energy at creation (MeV)
    pub ekin: f64,
    /// Mean life (ns); absent for stable particles
    #[serde(default)]
    pub mean_life: Option<f64>,
    /// Ions get a run-wide id
    #[serde(default)]
    pub is_ion: bool,
}

/// Particle leaving the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxRecord {
    pub name: String,
    /// Kinetic energy at exit (MeV)
    pub ekin: f64,
}

/// Everything the statistics layer sees of one event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    /// Steps crossing the sensitive volume, in transport order
    pub steps: Vec<StepPoint>,
    /// Names of the processes invoked
    pub processes: Vec<String>,
    pub produced: Vec<SecondaryRecord>,
    pub emerging: Vec<FluxRecord>,
    /// Energy deposited in the target (MeV)
    pub energy_deposit: f64,
    /// Energy leaving the target (MeV)
    pub energy_flow: f64,
}

/// Producer of events for one worker
pub trait EventSource {
    /// Next event, or `None` when the source is exhausted
    fn next_event(&mut self) -> Result<Option<EventRecord>>;
}

// ============================================================================
// SYNTHETIC SOURCE
// ============================================================================

/// Neutron mean life (ns)
const NEUTRON_MEAN_LIFE: f64 = 878.4 * S;

/// Secondary species table: (name, weight, mean energy fraction, process, ion)
const SECONDARIES: [(&str, f64, f64, &str, bool); 7] = [
    (GAMMA, 0.40, 0.15, "nCapture", false),
    (NEUTRON, 0.25, 0.30, "neutronInelastic", false),
    ("e-", 0.15, 0.05, "compt", false),
    ("proton", 0.08, 0.20, "hadElastic", false),
    ("alpha", 0.05, 0.10, "neutronInelastic", false),
    ("Li7", 0.04, 0.05, "neutronInelastic", true),
    ("C12", 0.03, 0.02, "hadElastic", true),
];

/// Half-width of the detector face (mm)
const DETECTOR_HALF_WIDTH: f64 = 50.0;

/// Seeded toy model of a primary crossing a shield slab
pub struct SyntheticSource {
    primary: PrimarySource,
    rng: StdRng,
    remaining: u64,
    /// Probability that the primary reaches the detector
    pub transmission: f64,
    /// Probability that a secondary reaches the detector
    pub escape_probability: f64,
    /// Upper bound on secondaries per event
    pub max_secondaries: u32,
}

impl SyntheticSource {
    pub fn new(primary: PrimarySource, seed: u64, n_events: u64) -> Self {
        Self {
            primary,
            rng: StdRng::seed_from_u64(seed),
            remaining: n_events,
            transmission: 0.3,
            escape_probability: 0.5,
            max_secondaries: 4,
        }
    }

    fn sample_species(&mut self) -> (&'static str, f64, &'static str, bool) {
        let total: f64 = SECONDARIES.iter().map(|s| s.1).sum();
        let mut pick = self.rng.gen::<f64>() * total;
        for &(name, weight, fraction, process, is_ion) in &SECONDARIES {
            if pick < weight {
                return (name, fraction, process, is_ion);
            }
            pick -= weight;
        }
        let (name, _, fraction, process, is_ion) = SECONDARIES[0];
        (name, fraction, process, is_ion)
    }

    /// Exponential sample with the given mean, capped at `max`
    fn exponential(&mut self, mean: f64, max: f64) -> f64 {
        let u: f64 = self.rng.gen();
        (-mean * (1.0 - u).ln()).min(max)
    }

    fn detector_point(&mut self) -> Vec3 {
        Vec3::new(
            self.rng.gen_range(-DETECTOR_HALF_WIDTH..DETECTOR_HALF_WIDTH),
            self.rng.gen_range(-DETECTOR_HALF_WIDTH..DETECTOR_HALF_WIDTH),
            0.0,
        )
    }

    /// Consecutive boundary steps of one track
    fn push_steps(&mut self, event: &mut EventRecord, track_id: i32, name: &str, ekin: f64) {
        let n_steps = self.rng.gen_range(1..=3);
        let mut time = self.exponential(5.0 * NS, 1.0e3 * NS);
        let mut energy = ekin;
        for _ in 0..n_steps {
            let position = self.detector_point();
            event
                .steps
                .push(StepPoint::new(track_id, name, energy, position, time));
            energy *= self.rng.gen_range(0.8..1.0);
            time += self.rng.gen_range(0.01..0.5) * NS;
        }
    }

    fn generate(&mut self) -> EventRecord {
        let e0 = self.primary.energy;
        let mut event = EventRecord::default();

        let n_secondaries = self.rng.gen_range(0..=self.max_secondaries);
        let mut escaped_energy = 0.0;

        for i in 0..n_secondaries {
            let track_id = PRIMARY_TRACK_ID + 1 + i as i32;
            let (name, fraction, process, is_ion) = self.sample_species();
            let ekin = self.exponential(fraction * e0, e0);
            let mean_life = if name == NEUTRON { Some(NEUTRON_MEAN_LIFE) } else { None };

            event.processes.push(process.to_string());
            event.produced.push(SecondaryRecord {
                name: name.to_string(),
                ekin,
                mean_life,
                is_ion,
            });

            if self.rng.gen_bool(self.escape_probability) {
                let exit_energy = ekin * self.rng.gen_range(0.5..1.0);
                event.emerging.push(FluxRecord {
                    name: name.to_string(),
                    ekin: exit_energy,
                });
                escaped_energy += exit_energy;
                self.push_steps(&mut event, track_id, name, exit_energy);
            }
        }

        if self.rng.gen_bool(self.transmission) {
            let exit_energy = e0 * self.rng.gen_range(0.1..1.0);
            event.processes.push("hadElastic".to_string());
            event.emerging.push(FluxRecord {
                name: self.primary.particle.clone(),
                ekin: exit_energy,
            });
            escaped_energy += exit_energy;
            // the primary reaches the detector before its secondaries
            let mut primary_steps = EventRecord::default();
            let particle = self.primary.particle.clone();
            self.push_steps(&mut primary_steps, PRIMARY_TRACK_ID, &particle, exit_energy);
            primary_steps.steps.append(&mut event.steps);
            event.steps = primary_steps.steps;
        }

        event.energy_flow = escaped_energy;
        event.energy_deposit = (e0 - escaped_energy).max(0.0);
        event
    }
}

impl EventSource for SyntheticSource {
    fn next_event(&mut self) -> Result<Option<EventRecord>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(self.generate()))
    }
}

// ============================================================================
// JSONL REPLAY
// ============================================================================

/// Replays an `events.jsonl` file
///
/// With a stride, worker `offset` of `stride` workers takes records
/// `offset, offset + stride, ...` so several workers can share one file.
pub struct JsonLinesSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    record_index: usize,
    offset: usize,
    stride: usize,
}

impl JsonLinesSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            record_index: 0,
            offset: 0,
            stride: 1,
        })
    }

    /// Restrict to every `stride`-th record starting at `offset`
    pub fn with_stride(mut self, offset: usize, stride: usize) -> Self {
        self.stride = stride.max(1);
        self.offset = offset % self.stride;
        self
    }
}

impl EventSource for JsonLinesSource {
    fn next_event(&mut self) -> Result<Option<EventRecord>> {
        for line in self.lines.by_ref() {
            let line = line?;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let index = self.record_index;
            self.record_index += 1;
            if index % self.stride != self.offset {
                continue;
            }

            let line_no = self.line_no;
            let record = serde_json::from_str(&line)
                .map_err(|e| ShieldError::parse(line_no, e.to_string()))?;
            return Ok(Some(record));
        }
        Ok(None)
    }
}

/// Streaming writer for `events.jsonl`
pub struct EventWriter {
    writer: BufWriter<File>,
}

impl EventWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Write a single event (JSONL format)
    pub fn write_event(&mut self, event: &EventRecord) -> Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(seed: u64, n: u64) -> SyntheticSource {
        SyntheticSource::new(PrimarySource::new("neutron", 14.1), seed, n)
    }

    #[test]
    fn test_synthetic_event_count() {
        let mut src = source(42, 5);
        let mut n = 0;
        while src.next_event().unwrap().is_some() {
            n += 1;
        }
        assert_eq!(n, 5);
    }

    #[test]
    fn test_synthetic_reproducible() {
        let mut a = source(7, 20);
        let mut b = source(7, 20);
        for _ in 0..20 {
            assert_eq!(a.next_event().unwrap(), b.next_event().unwrap());
        }
    }

    #[test]
    fn test_synthetic_event_consistency() {
        let mut src = source(3, 200);
        while let Some(event) = src.next_event().unwrap() {
            assert!(event.energy_deposit >= 0.0);
            assert!(event.energy_flow >= 0.0);
            let flow: f64 = event.emerging.iter().map(|f| f.ekin).sum();
            assert!((flow - event.energy_flow).abs() < 1e-9);

            for p in &event.produced {
                assert!(p.ekin >= 0.0 && p.ekin <= 14.1);
            }

            // steps of one track are contiguous
            let mut finished = std::collections::HashSet::new();
            let mut current = None;
            for s in &event.steps {
                if current != Some(s.track_id) {
                    if let Some(prev) = current {
                        finished.insert(prev);
                    }
                    assert!(!finished.contains(&s.track_id));
                    current = Some(s.track_id);
                }
            }
        }
    }

    #[test]
    fn test_jsonl_roundtrip_with_stride() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");

        let mut src = source(11, 6);
        let mut written = Vec::new();
        {
            let mut writer = EventWriter::new(&path).unwrap();
            while let Some(event) = src.next_event().unwrap() {
                writer.write_event(&event).unwrap();
                written.push(event);
            }
            writer.flush().unwrap();
        }

        let mut all = JsonLinesSource::open(&path).unwrap();
        let mut read = Vec::new();
        while let Some(event) = all.next_event().unwrap() {
            read.push(event);
        }
        assert_eq!(read.len(), 6);
        assert_eq!(read[0].steps.len(), written[0].steps.len());

        let mut odd = JsonLinesSource::open(&path).unwrap().with_stride(1, 2);
        let mut n = 0;
        while odd.next_event().unwrap().is_some() {
            n += 1;
        }
        assert_eq!(n, 3);
    }

    #[test]
    fn test_jsonl_blank_and_partial_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        std::fs::write(&path, "\n{\"energy_deposit\": 1.5}\n\n{\"steps\": [}\n").unwrap();

        let mut src = JsonLinesSource::open(&path).unwrap();
        let first = src.next_event().unwrap().unwrap();
        assert_eq!(first.energy_deposit, 1.5);
        assert!(first.steps.is_empty());

        match src.next_event() {
            Err(ShieldError::Parse { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
