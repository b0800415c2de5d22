//! Field-of-view and range cropping.
//!
//! Emulates what a forward-facing sensor would see: a landmark is visible
//! when its bearing in the vehicle frame lies inside a symmetric angular
//! window and it is within range.
//!
//! Range is measured with the **L1 (taxicab) norm** of the vehicle-local
//! offset, not the Euclidean norm.  Downstream consumers have been tuned
//! against this behaviour, so it is kept; whether it should become Euclidean
//! is an open product question.
//!
//! The crop decision is made in the local frame, but the landmarks in the
//! returned set keep their original world-frame coordinates.

use conesim_types::{LandmarkSet, VehiclePose};

use crate::geometry::{Vec2, world_to_local};

/// Default full field-of-view width (degrees).
pub const DEFAULT_FOV_DEG: f64 = 110.0;

/// Default maximum L1 range (metres).
pub const DEFAULT_MAX_DISTANCE: f64 = 12.0;

/// Sensor footprint used by [`crop_to_fov`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    /// Full angular width, symmetric about the vehicle heading (radians).
    pub fov_rad: f64,
    /// Maximum L1 distance from the vehicle.
    pub max_distance: f64,
}

impl FieldOfView {
    pub fn new(fov_rad: f64, max_distance: f64) -> Self {
        Self {
            fov_rad,
            max_distance,
        }
    }

    pub fn from_degrees(fov_deg: f64, max_distance: f64) -> Self {
        Self::new(fov_deg.to_radians(), max_distance)
    }

    /// Is a point, already expressed in the vehicle frame, visible?
    ///
    /// Both bounds are inclusive.
    pub fn contains_local(&self, local: Vec2) -> bool {
        let half = self.fov_rad / 2.0;
        let theta = local.bearing();
        theta >= -half && theta <= half && local.l1_norm() <= self.max_distance
    }
}

impl Default for FieldOfView {
    fn default() -> Self {
        Self::from_degrees(DEFAULT_FOV_DEG, DEFAULT_MAX_DISTANCE)
    }
}

/// Return the landmarks of `landmarks` visible from `pose` under `fov`.
///
/// Relative order, colours, world coordinates and the header are preserved.
pub fn crop_to_fov(landmarks: &LandmarkSet, pose: &VehiclePose, fov: &FieldOfView) -> LandmarkSet {
    let visible = landmarks
        .landmarks
        .iter()
        .filter(|lm| fov.contains_local(world_to_local(Vec2::new(lm.x, lm.y), pose)))
        .copied()
        .collect();
    LandmarkSet::new(landmarks.header.clone(), visible)
}
