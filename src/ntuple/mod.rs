//! # Ntuples
//!
//! Row-oriented output of the sensitive detector. Two ntuples are booked,
//! one per recorded species, each with four double columns:
//!
//! | column | unit |
//! |--------|------|
//! | `Ekin` | MeV  |
//! | `x`    | cm   |
//! | `y`    | cm   |
//! | `time` | ns   |
//!
//! Every worker fills its own [`NtupleBook`]; the run manager appends worker
//! rows into the master book and writes one CSV file per ntuple.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{GAMMA, NEUTRON};
use crate::error::Result;

/// Column names shared by both ntuples
pub const COLUMNS: [&str; 4] = ["Ekin", "x", "y", "time"];

/// Ntuple a hit row is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NtupleChannel {
    Neutron,
    Gamma,
}

impl NtupleChannel {
    pub const ALL: [NtupleChannel; 2] = [NtupleChannel::Neutron, NtupleChannel::Gamma];

    /// Ntuple id as booked by the run action
    pub fn id(&self) -> usize {
        match self {
            NtupleChannel::Neutron => 1,
            NtupleChannel::Gamma => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NtupleChannel::Neutron => "Neutron",
            NtupleChannel::Gamma => "Gamma",
        }
    }

    /// Channel of a recorded species, `None` for everything else
    pub fn from_particle_name(name: &str) -> Option<Self> {
        match name {
            NEUTRON => Some(NtupleChannel::Neutron),
            GAMMA => Some(NtupleChannel::Gamma),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        self.id() - 1
    }
}

impl std::fmt::Display for NtupleChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One hit already converted to output units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRow {
    /// Kinetic energy (MeV)
    pub ekin: f64,
    /// Local x (cm)
    pub x: f64,
    /// Local y (cm)
    pub y: f64,
    /// Global time (ns)
    pub time: f64,
}

impl HitRow {
    fn values(&self) -> [f64; 4] {
        [self.ekin, self.x, self.y, self.time]
    }
}

/// Destination of per-step hit rows
pub trait NtupleSink {
    fn add_row(&mut self, channel: NtupleChannel, row: HitRow);
}

/// In-memory ntuple storage of one worker (or the merged master)
#[derive(Debug, Clone, Default)]
pub struct NtupleBook {
    rows: [Vec<HitRow>; 2],
}

impl NtupleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, channel: NtupleChannel) -> &[HitRow] {
        &self.rows[channel.index()]
    }

    pub fn len(&self, channel: NtupleChannel) -> usize {
        self.rows[channel.index()].len()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Append the rows of another book
    pub fn merge(&mut self, other: &NtupleBook) {
        for channel in NtupleChannel::ALL {
            self.rows[channel.index()].extend_from_slice(other.rows(channel));
        }
    }

    /// Path of the CSV file of `channel`
    pub fn csv_path(dir: &Path, stem: &str, channel: NtupleChannel) -> PathBuf {
        dir.join(format!("{}_nt_{}.csv", stem, channel.name()))
    }

    /// Write one CSV per ntuple into `dir`; returns the written paths
    pub fn write_csv(&self, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(NtupleChannel::ALL.len());
        for channel in NtupleChannel::ALL {
            let path = Self::csv_path(dir, stem, channel);
            let mut writer = BufWriter::new(File::create(&path)?);

            writeln!(writer, "#title {}", channel.name())?;
            writeln!(writer, "#separator 44")?;
            for column in COLUMNS {
                writeln!(writer, "#column double {}", column)?;
            }
            for row in self.rows(channel) {
                let line: Vec<String> = row.values().iter().map(|v| v.to_string()).collect();
                writeln!(writer, "{}", line.join(","))?;
            }
            writer.flush()?;

            log::debug!(
                "Wrote {} rows of ntuple {} to {}",
                self.len(channel),
                channel,
                path.display()
            );
            written.push(path);
        }
        Ok(written)
    }
}

impl NtupleSink for NtupleBook {
    fn add_row(&mut self, channel: NtupleChannel, row: HitRow) {
        self.rows[channel.index()].push(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(ekin: f64) -> HitRow {
        HitRow {
            ekin,
            x: 1.5,
            y: -2.0,
            time: 3.25,
        }
    }

    #[test]
    fn test_channel_mapping() {
        assert_eq!(NtupleChannel::from_particle_name("neutron"), Some(NtupleChannel::Neutron));
        assert_eq!(NtupleChannel::from_particle_name("gamma"), Some(NtupleChannel::Gamma));
        assert_eq!(NtupleChannel::from_particle_name("e-"), None);
        assert_eq!(NtupleChannel::Neutron.id(), 1);
        assert_eq!(NtupleChannel::Gamma.id(), 2);
    }

    #[test]
    fn test_book_merge_appends() {
        let mut master = NtupleBook::new();
        master.add_row(NtupleChannel::Neutron, row(1.0));

        let mut worker = NtupleBook::new();
        worker.add_row(NtupleChannel::Neutron, row(2.0));
        worker.add_row(NtupleChannel::Gamma, row(0.5));

        master.merge(&worker);
        assert_eq!(master.len(NtupleChannel::Neutron), 2);
        assert_eq!(master.len(NtupleChannel::Gamma), 1);
        assert_eq!(master.total_rows(), 3);
        assert_eq!(master.rows(NtupleChannel::Neutron)[1].ekin, 2.0);
    }

    #[test]
    fn test_write_csv() {
        let tmp = TempDir::new().unwrap();
        let mut book = NtupleBook::new();
        book.add_row(NtupleChannel::Gamma, row(0.5));

        let paths = book.write_csv(tmp.path(), "Shielding").unwrap();
        assert_eq!(paths.len(), 2);

        let gamma = std::fs::read_to_string(&paths[1]).unwrap();
        assert!(gamma.starts_with("#title Gamma\n"));
        assert!(gamma.contains("#column double Ekin\n"));
        assert!(gamma.ends_with("0.5,1.5,-2,3.25\n"));

        let neutron = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(neutron.lines().filter(|l| !l.starts_with('#')).count(), 0);
        assert!(paths[0].ends_with("Shielding_nt_Neutron.csv"));
    }
}
