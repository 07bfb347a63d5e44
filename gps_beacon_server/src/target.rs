// Shared target-waypoint state.
//
// `TargetRegistry` is the only state shared between threads: the operator
// console writes it, and every client session reads it once per send. The
// whole `TargetWaypoint` sits behind one `RwLock` and is replaced wholesale,
// so a reader sees either the old waypoint or the new one, never a mix.
//
// The registry is a cheap-to-clone handle; clones share the same waypoint.
// Changes are logged at debug level; the console already tells the operator.
// A poisoned lock is recovered rather than propagated. The guarded value is
// `Copy` and only ever assigned whole, so it is always consistent.

use std::sync::{Arc, RwLock};

use gps_beacon_protocol::TargetWaypoint;
use log::debug;

#[derive(Clone, Debug, Default)]
pub struct TargetRegistry {
    current: Arc<RwLock<TargetWaypoint>>,
}

impl TargetRegistry {
    /// A registry with no target set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the target. Coordinates are accepted as-is, without range checks.
    pub fn set(&self, latitude: f64, longitude: f64, altitude: f64) {
        let waypoint = TargetWaypoint::at(latitude, longitude, altitude);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = waypoint;
        debug!("Target location set to: Lat={latitude}, Lon={longitude}, Alt={altitude}");
    }

    /// Remove the target.
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = TargetWaypoint::unset();
        debug!("Target location cleared");
    }

    /// Copy of the current target.
    pub fn snapshot(&self) -> TargetWaypoint {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn starts_unset() {
        let snapshot = TargetRegistry::new().snapshot();
        assert!(!snapshot.is_set());
        assert_eq!(snapshot.latitude(), None);
        assert_eq!(snapshot.longitude(), None);
    }

    #[test]
    fn set_then_snapshot_returns_exact_values() {
        let registry = TargetRegistry::new();
        registry.set(63.41, 10.5, 12.0);
        assert_eq!(registry.snapshot(), TargetWaypoint::at(63.41, 10.5, 12.0));

        registry.set(-91.0, 200.0, -5.0);
        assert_eq!(registry.snapshot(), TargetWaypoint::at(-91.0, 200.0, -5.0));
    }

    #[test]
    fn clear_resets_to_absent_coordinates() {
        let registry = TargetRegistry::new();
        registry.set(1.0, 2.0, 3.0);
        registry.clear();
        let snapshot = registry.snapshot();
        assert!(!snapshot.is_set());
        assert_eq!(snapshot.latitude(), None);
        assert_eq!(snapshot.longitude(), None);
        assert_eq!(snapshot.altitude(), 0.0);
    }

    #[test]
    fn clones_share_state() {
        let registry = TargetRegistry::new();
        let other = registry.clone();
        other.set(5.0, 6.0, 0.0);
        assert_eq!(registry.snapshot(), TargetWaypoint::at(5.0, 6.0, 0.0));
    }

    #[test]
    fn concurrent_access_never_tears() {
        // Writers always store lat == lon == alt, so any snapshot with
        // differing fields would be a torn read.
        let registry = TargetRegistry::new();
        let mut handles = Vec::new();

        for writer in 0..4u32 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                for i in 0..2_000u32 {
                    let v = f64::from(writer * 10_000 + i);
                    if i % 7 == 0 {
                        registry.clear();
                    } else {
                        registry.set(v, v, v);
                    }
                }
            }));
        }

        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..5_000 {
                    let snapshot = registry.snapshot();
                    if snapshot.is_set() {
                        let lat = snapshot.latitude().unwrap();
                        assert_eq!(snapshot.longitude(), Some(lat));
                        assert_eq!(snapshot.altitude(), lat);
                    } else {
                        assert_eq!(snapshot, TargetWaypoint::unset());
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
