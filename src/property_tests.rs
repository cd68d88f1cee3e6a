//! Property-based tests for the statistics layer.
//!
//! Uses proptest to check invariants across randomly generated inputs.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::sync::Arc;

    use crate::detector::HitCounter;
    use crate::ntuple::NtupleBook;
    use crate::registry::IonRegistry;
    use crate::run::RunAccumulator;
    use crate::statistics::{Moments, ParticleStatsMap};
    use crate::types::{StepPoint, Vec3};

    fn energies() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.0f64..100.0, 1..60)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
    }

    proptest! {
        #[test]
        fn mean_and_extrema_match_direct_computation(values in energies()) {
            let mut map = ParticleStatsMap::new();
            for &v in &values {
                map.record("gamma", v, None);
            }
            let stats = map.get("gamma").unwrap();

            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            prop_assert_eq!(stats.count, values.len() as u64);
            prop_assert!(close(stats.mean_energy, mean));
            prop_assert_eq!(stats.min_energy, min);
            prop_assert_eq!(stats.max_energy, max);
        }

        #[test]
        fn order_does_not_change_statistics(values in energies()) {
            let mut forward = ParticleStatsMap::new();
            let mut backward = ParticleStatsMap::new();
            for &v in &values {
                forward.record("e-", v, None);
            }
            for &v in values.iter().rev() {
                backward.record("e-", v, None);
            }
            let f = forward.get("e-").unwrap();
            let b = backward.get("e-").unwrap();

            prop_assert_eq!(f.count, b.count);
            prop_assert!(close(f.mean_energy, b.mean_energy));
            prop_assert_eq!(f.min_energy, b.min_energy);
            prop_assert_eq!(f.max_energy, b.max_energy);
        }

        #[test]
        fn merge_equals_pooled(a in energies(), b in energies()) {
            let ions = Arc::new(IonRegistry::default());
            let mut left = RunAccumulator::new(Arc::clone(&ions));
            let mut right = RunAccumulator::new(Arc::clone(&ions));
            let mut pooled = RunAccumulator::new(Arc::clone(&ions));

            for &v in &a {
                left.record_particle_produced("neutron", v, None);
                left.add_energy_deposit(v);
                pooled.record_particle_produced("neutron", v, None);
                pooled.add_energy_deposit(v);
            }
            for &v in &b {
                right.record_particle_produced("neutron", v, None);
                right.add_energy_deposit(v);
                pooled.record_particle_produced("neutron", v, None);
                pooled.add_energy_deposit(v);
            }

            let mut master = RunAccumulator::new(ions);
            master.merge(&left);
            master.merge(&right);

            let merged = master.produced().get("neutron").unwrap();
            let direct = pooled.produced().get("neutron").unwrap();
            prop_assert_eq!(merged.count, direct.count);
            prop_assert!(close(merged.mean_energy, direct.mean_energy));
            prop_assert_eq!(merged.min_energy, direct.min_energy);
            prop_assert_eq!(merged.max_energy, direct.max_energy);
            prop_assert!(close(master.energy_deposit().sum, pooled.energy_deposit().sum));
            prop_assert!(close(master.energy_deposit().sum2, pooled.energy_deposit().sum2));
        }

        #[test]
        fn merge_is_commutative(a in energies(), b in energies()) {
            let mut ab = ParticleStatsMap::new();
            let mut ba = ParticleStatsMap::new();
            let mut left = ParticleStatsMap::new();
            let mut right = ParticleStatsMap::new();
            for &v in &a { left.record("alpha", v, None); }
            for &v in &b { right.record("alpha", v, None); }

            ab.merge(&left);
            ab.merge(&right);
            ba.merge(&right);
            ba.merge(&left);

            let x = ab.get("alpha").unwrap();
            let y = ba.get("alpha").unwrap();
            prop_assert_eq!(x.count, y.count);
            prop_assert!(close(x.mean_energy, y.mean_energy));
        }

        #[test]
        fn std_error_never_nan(values in prop::collection::vec(-1.0e3f64..1.0e3, 0..40)) {
            let mut m = Moments::new();
            for &v in &values {
                m.add(v);
            }
            prop_assert!(m.std_error() >= 0.0);
            prop_assert!(!m.mean().is_nan());
        }

        #[test]
        fn dedup_counts_each_secondary_once(ids in prop::collection::vec(1i32..8, 0..50)) {
            let mut sd = HitCounter::new("SD1");
            let mut book = NtupleBook::new();
            sd.on_event_start();
            for &id in &ids {
                sd.on_step(&StepPoint::new(id, "proton", 1.0, Vec3::default(), 0.0), &mut book);
            }

            let distinct: std::collections::HashSet<i32> =
                ids.iter().copied().filter(|&id| id > 1).collect();
            prop_assert_eq!(sd.count("proton"), distinct.len() as u64);
        }
    }
}
