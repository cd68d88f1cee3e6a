//! # Running Statistics
//!
//! Accumulators that never store raw samples:
//!
//! - [`Moments`]: sum and sum of squares of per-event scores, giving the
//!   mean and its standard error at end of run.
//! - [`ParticleStats`]: count, incremental mean and extrema of the kinetic
//!   energy of one particle species.
//! - [`ParticleStatsMap`]: species name → [`ParticleStats`]. The run keeps
//!   two of these (produced particles and particles leaving the target).
//!
//! All three merge: worker accumulators are folded into the master at end
//! of run, and merging is commutative and associative up to rounding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// MOMENTS
// ============================================================================

/// Sum and sum of squares of a per-event score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    /// Number of scores
    pub n: u64,
    pub sum: f64,
    /// Squared scores for variance
    pub sum2: f64,
}

impl Moments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one event
    pub fn add(&mut self, value: f64) {
        self.n += 1;
        self.sum += value;
        self.sum2 += value * value;
    }

    pub fn merge(&mut self, other: &Moments) {
        self.n += other.n;
        self.sum += other.sum;
        self.sum2 += other.sum2;
    }

    /// Mean per score (0 when empty)
    pub fn mean(&self) -> f64 {
        self.mean_over(self.n)
    }

    /// Mean over an explicit number of events
    pub fn mean_over(&self, n_events: u64) -> f64 {
        if n_events == 0 {
            return 0.0;
        }
        self.sum / n_events as f64
    }

    /// Root mean square deviation over `n_events`, clamped at zero
    pub fn rms_over(&self, n_events: u64) -> f64 {
        if n_events == 0 {
            return 0.0;
        }
        let n = n_events as f64;
        let mean = self.sum / n;
        let variance = self.sum2 / n - mean * mean;
        variance.max(0.0).sqrt()
    }

    /// Standard error of the mean over `n_events`:
    /// `sqrt((sum2/n - (sum/n)^2) / n)`
    pub fn std_error_over(&self, n_events: u64) -> f64 {
        if n_events == 0 {
            return 0.0;
        }
        self.rms_over(n_events) / (n_events as f64).sqrt()
    }

    pub fn std_error(&self) -> f64 {
        self.std_error_over(self.n)
    }
}

// ============================================================================
// PARTICLE STATISTICS
// ============================================================================

/// Energy statistics of one particle species
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleStats {
    pub count: u64,
    /// Mean kinetic energy (MeV)
    pub mean_energy: f64,
    /// Minimum kinetic energy (MeV)
    pub min_energy: f64,
    /// Maximum kinetic energy (MeV)
    pub max_energy: f64,
    /// Mean life (ns); `None` when not recorded or stable
    pub mean_life: Option<f64>,
}

impl ParticleStats {
    /// Statistics after the first sample
    pub fn first(energy: f64, mean_life: Option<f64>) -> Self {
        Self {
            count: 1,
            mean_energy: energy,
            min_energy: energy,
            max_energy: energy,
            mean_life,
        }
    }

    /// Add one sample; the mean uses `mean += (x - mean) / n`
    pub fn record(&mut self, energy: f64) {
        self.count += 1;
        self.mean_energy += (energy - self.mean_energy) / self.count as f64;
        self.min_energy = self.min_energy.min(energy);
        self.max_energy = self.max_energy.max(energy);
    }

    /// Fold another partial result into this one
    pub fn merge(&mut self, other: &ParticleStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let total = self.count + other.count;
        let w_self = self.count as f64 / total as f64;
        let w_other = other.count as f64 / total as f64;
        self.mean_energy = w_self * self.mean_energy + w_other * other.mean_energy;
        self.count = total;
        self.min_energy = self.min_energy.min(other.min_energy);
        self.max_energy = self.max_energy.max(other.max_energy);
        if self.mean_life.is_none() {
            self.mean_life = other.mean_life;
        }
    }

    /// Sum of recorded energies (MeV)
    pub fn total_energy(&self) -> f64 {
        self.mean_energy * self.count as f64
    }
}

/// Species name → energy statistics, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleStatsMap {
    entries: BTreeMap<String, ParticleStats>,
}

impl ParticleStatsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one particle; the mean life is kept from the first record
    pub fn record(&mut self, name: &str, energy: f64, mean_life: Option<f64>) {
        match self.entries.get_mut(name) {
            Some(stats) => {
                stats.record(energy);
                if stats.mean_life.is_none() {
                    stats.mean_life = mean_life;
                }
            }
            None => {
                self.entries
                    .insert(name.to_string(), ParticleStats::first(energy, mean_life));
            }
        }
    }

    pub fn merge(&mut self, other: &ParticleStatsMap) {
        for (name, stats) in &other.entries {
            match self.entries.get_mut(name) {
                Some(existing) => existing.merge(stats),
                None => {
                    self.entries.insert(name.clone(), *stats);
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParticleStats> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParticleStats)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Particles recorded over all species
    pub fn total_count(&self) -> u64 {
        self.entries.values().map(|s| s.count).sum()
    }
}
