//! # Core Types
//!
//! Fundamental types shared by the accumulators, the sensitive detector and
//! the event sources.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::units;

// ============================================================================
// VECTOR TYPES (3D)
// ============================================================================

/// 3D vector for positions and directions (mm)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create new vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

// ============================================================================
// PRIMARY SOURCE
// ============================================================================

/// Particle gun configuration of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimarySource {
    /// Particle name (e.g. "neutron")
    pub particle: String,
    /// Kinetic energy (MeV)
    pub energy: f64,
}

impl PrimarySource {
    pub fn new(particle: impl Into<String>, energy: f64) -> Self {
        Self {
            particle: particle.into(),
            energy,
        }
    }
}

impl fmt::Display for PrimarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.particle, units::best_energy(self.energy))
    }
}

// ============================================================================
// STEP POINT
// ============================================================================

/// Pre-step point of a step crossing a sensitive volume
///
/// Positions are already transformed into the local frame of the touched
/// volume. Track ids follow the toolkit convention: the primary is 1,
/// secondaries are numbered from 2 upward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPoint {
    pub track_id: i32,
    pub particle: String,
    /// Kinetic energy (MeV)
    pub kinetic_energy: f64,
    /// Local position (mm)
    pub local_position: Vec3,
    /// Global time (ns)
    pub global_time: f64,
}

impl StepPoint {
    pub fn new(
        track_id: i32,
        particle: impl Into<String>,
        kinetic_energy: f64,
        local_position: Vec3,
        global_time: f64,
    ) -> Self {
        Self {
            track_id,
            particle: particle.into(),
            kinetic_energy,
            local_position,
            global_time,
        }
    }

    /// Secondaries carry track ids above the primary's
    pub fn is_secondary(&self) -> bool {
        self.track_id > crate::constants::PRIMARY_TRACK_ID
    }
}
