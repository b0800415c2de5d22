//! Latest-value store shared between ingress handlers and the publish cycle.
//!
//! The landmark set and the vehicle pose are guarded independently, so each
//! update and each read of one entity is atomic with respect to other
//! updates of that entity.  No lock ever spans both: a [`snapshot`] may pair
//! a fresh pose with stale landmarks (or vice versa), which the publish cycle
//! tolerates.
//!
//! [`snapshot`]: PerceptionState::snapshot

use std::sync::{PoisonError, RwLock};

use conesim_types::{LandmarkSet, VehiclePose};

/// Most recently observed landmarks and vehicle pose.
///
/// Starts out as an empty landmark set and the zero pose.  Share it behind an
/// `Arc`.
#[derive(Debug, Default)]
pub struct PerceptionState {
    landmarks: RwLock<LandmarkSet>,
    pose: RwLock<VehiclePose>,
}

impl PerceptionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored landmark set wholesale.
    pub fn update_landmarks(&self, set: LandmarkSet) {
        *self.landmarks.write().unwrap_or_else(PoisonError::into_inner) = set;
    }

    /// Replace the stored pose.
    pub fn update_pose(&self, pose: VehiclePose) {
        *self.pose.write().unwrap_or_else(PoisonError::into_inner) = pose;
    }

    /// Copy of the current landmark set and pose.
    pub fn snapshot(&self) -> (LandmarkSet, VehiclePose) {
        let landmarks = self
            .landmarks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let pose = *self.pose.read().unwrap_or_else(PoisonError::into_inner);
        (landmarks, pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conesim_types::{Header, Landmark, LandmarkColour};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fresh_state_is_empty_and_zeroed() {
        let state = PerceptionState::new();
        let (landmarks, pose) = state.snapshot();
        assert!(landmarks.is_empty());
        assert_eq!(pose, VehiclePose::default());
    }

    #[test]
    fn landmark_update_replaces_previous_set() {
        let state = PerceptionState::new();
        state.update_landmarks(LandmarkSet::new(
            Header::default(),
            vec![
                Landmark::new(1.0, 0.0, LandmarkColour::Blue),
                Landmark::new(2.0, 0.0, LandmarkColour::Blue),
            ],
        ));
        state.update_landmarks(LandmarkSet::new(
            Header::default(),
            vec![Landmark::new(9.0, 9.0, LandmarkColour::Yellow)],
        ));
        let (landmarks, _) = state.snapshot();
        assert_eq!(landmarks.landmarks, vec![Landmark::new(9.0, 9.0, LandmarkColour::Yellow)]);
    }

    #[test]
    fn pose_and_landmarks_update_independently() {
        let state = PerceptionState::new();
        state.update_pose(VehiclePose::new(1.0, 2.0, 0.5));
        let (landmarks, pose) = state.snapshot();
        assert!(landmarks.is_empty());
        assert_eq!(pose, VehiclePose::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn concurrent_writers_never_tear_a_pose() {
        let state = Arc::new(PerceptionState::new());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    let v = i as f64;
                    for _ in 0..1_000 {
                        state.update_pose(VehiclePose::new(v, v, v));
                    }
                })
            })
            .collect();

        for _ in 0..1_000 {
            let (_, pose) = state.snapshot();
            assert!(pose.x == pose.y && pose.y == pose.yaw, "torn pose: {pose:?}");
        }
        for w in writers {
            w.join().unwrap();
        }
    }
}
