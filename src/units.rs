//! # Units
//!
//! Internal unit system of the transport toolkit: energies in MeV, lengths
//! in mm, times in ns. Values handed to the statistics layer are expected in
//! these units; divide by a unit constant to express a value in that unit.

// ============================================================================
// ENERGY
// ============================================================================

pub const MEV: f64 = 1.0;
pub const EV: f64 = 1.0e-6 * MEV;
pub const KEV: f64 = 1.0e-3 * MEV;
pub const GEV: f64 = 1.0e3 * MEV;
pub const TEV: f64 = 1.0e6 * MEV;

// ============================================================================
// LENGTH
// ============================================================================

pub const MM: f64 = 1.0;
pub const UM: f64 = 1.0e-3 * MM;
pub const CM: f64 = 10.0 * MM;
pub const M: f64 = 1.0e3 * MM;

// ============================================================================
// TIME
// ============================================================================

pub const NS: f64 = 1.0;
pub const PS: f64 = 1.0e-3 * NS;
pub const US: f64 = 1.0e3 * NS;
pub const MS: f64 = 1.0e6 * NS;
pub const S: f64 = 1.0e9 * NS;
pub const YEAR: f64 = 365.25 * 86_400.0 * S;

const ENERGY_UNITS: [(f64, &str); 5] = [
    (EV, "eV"),
    (KEV, "keV"),
    (MEV, "MeV"),
    (GEV, "GeV"),
    (TEV, "TeV"),
];

const TIME_UNITS: [(f64, &str); 6] = [
    (PS, "ps"),
    (NS, "ns"),
    (US, "us"),
    (MS, "ms"),
    (S, "s"),
    (YEAR, "y"),
];

/// Format an energy with the largest unit keeping the magnitude >= 1
pub fn best_energy(value: f64) -> String {
    best_unit(value, &ENERGY_UNITS)
}

/// Format a time with the largest unit keeping the magnitude >= 1
pub fn best_time(value: f64) -> String {
    best_unit(value, &TIME_UNITS)
}

/// Pick a unit from an ascending table; values below the smallest unit keep it
fn best_unit(value: f64, table: &[(f64, &str)]) -> String {
    let magnitude = value.abs();
    let mut chosen = table[0];
    for &(unit, name) in table {
        if magnitude >= unit {
            chosen = (unit, name);
        }
    }
    format!("{} {}", trim_number(value / chosen.0), chosen.1)
}

fn trim_number(v: f64) -> String {
    let s = format!("{:.4}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
