use crate::config::Policy;
use crate::types::{MatchResult, SnapshotSet};

/// Devices that are both allowed by the policy and have at least
/// `threshold_mb` free, in snapshot order.
pub fn evaluate(snapshots: &SnapshotSet, policy: &Policy) -> MatchResult {
    MatchResult::new(
        snapshots
            .devices
            .iter()
            .filter(|d| d.free_memory_mb >= policy.threshold_mb && policy.allows(d.index))
            .map(|d| d.index)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preemption;
    use crate::types::DeviceSnapshot;

    fn snapshot(devices: &[(u32, f64)]) -> SnapshotSet {
        SnapshotSet::new(
            devices
                .iter()
                .map(|&(i, free)| DeviceSnapshot::new(i, free, format!("[{i}] gpu")))
                .collect(),
        )
    }

    fn policy(threshold: f64, allowed: &[u32]) -> Policy {
        Policy::new(threshold, allowed.iter().copied(), false, Preemption::Disabled)
    }

    #[test]
    fn threshold_is_inclusive() {
        let snap = snapshot(&[(0, 6000.0), (1, 4000.0), (2, 5000.0), (3, 0.0)]);
        let m = evaluate(&snap, &policy(5000.0, &[0, 1, 2, 3]));
        assert_eq!(m.devices(), &[0, 2]);
    }

    #[test]
    fn disallowed_devices_excluded() {
        let snap = snapshot(&[(0, 9000.0), (1, 9000.0), (2, 9000.0)]);
        let m = evaluate(&snap, &policy(100.0, &[2, 0]));
        // snapshot order, not allow-list order
        assert_eq!(m.devices(), &[0, 2]);
    }

    #[test]
    fn empty_snapshot_yields_empty_match() {
        let m = evaluate(&snapshot(&[]), &policy(1.0, &[0, 1]));
        assert!(m.is_empty());
    }

    #[test]
    fn empty_allow_list_matches_nothing() {
        let m = evaluate(&snapshot(&[(0, 80_000.0)]), &policy(1.0, &[]));
        assert!(m.is_empty());
    }

    #[test]
    fn evaluation_is_repeatable() {
        let snap = snapshot(&[(4, 20_000.0), (5, 10.0), (6, 30_000.0)]);
        let p = policy(10_000.0, &[4, 5, 6, 7]);
        assert_eq!(evaluate(&snap, &p), evaluate(&snap, &p));
    }

    #[test]
    fn match_is_sound_and_complete() {
        let snap = snapshot(&[
            (0, 100.0),
            (1, 7000.0),
            (2, 7000.0),
            (3, 6999.9),
            (4, 12_000.0),
            (5, 7000.0),
        ]);
        let p = policy(7000.0, &[1, 3, 4, 9]);
        let m = evaluate(&snap, &p);

        for idx in m.devices() {
            assert!(p.allows(*idx));
            let dev = snap.devices.iter().find(|d| d.index == *idx).unwrap();
            assert!(dev.free_memory_mb >= p.threshold_mb);
        }
        for dev in &snap.devices {
            let qualifies = p.allows(dev.index) && dev.free_memory_mb >= p.threshold_mb;
            let count = m.devices().iter().filter(|i| **i == dev.index).count();
            assert_eq!(count, usize::from(qualifies));
        }
        assert_eq!(m.devices(), &[1, 4]);
    }
}
