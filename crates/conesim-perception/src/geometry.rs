//! Planar frame geometry.
//!
//! Converts points between the world frame and the vehicle-local frame (x
//! forward, y left) and extracts a heading from a ROS orientation quaternion.
//!
//! # Example
//!
//! ```rust
//! use conesim_perception::geometry::{world_to_local, Vec2};
//! use conesim_types::VehiclePose;
//!
//! // Car at (1, 1) facing +Y; a cone 2 m north of it is 2 m straight ahead.
//! let pose = VehiclePose::new(1.0, 1.0, std::f64::consts::FRAC_PI_2);
//! let local = world_to_local(Vec2::new(1.0, 3.0), &pose);
//! assert!((local.x - 2.0).abs() < 1e-9);
//! assert!(local.y.abs() < 1e-9);
//! ```

use std::f64::consts::FRAC_PI_2;

use conesim_types::{Quaternion, VehiclePose};
use tracing::warn;

/// Tolerance (radians) on the middle Euler angle below which the
/// decomposition is treated as gimbal-locked.
const GIMBAL_LOCK_EPS: f64 = 1e-7;

// ────────────────────────────────────────────────────────────────────────────
// Vec2
// ────────────────────────────────────────────────────────────────────────────

/// A 2-D point or vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }

    /// Rotate counter-clockwise by `angle` radians.
    pub fn rotate(self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(c * self.x - s * self.y, s * self.x + c * self.y)
    }

    /// Taxicab length `|x| + |y|`.
    pub fn l1_norm(self) -> f64 {
        self.x.abs() + self.y.abs()
    }

    /// Bearing of the vector, `atan2(y, x)`, in `(-π, π]`.
    ///
    /// The zero vector (of either sign) has bearing `0.0`.
    pub fn bearing(self) -> f64 {
        if self.x == 0.0 && self.y == 0.0 {
            return 0.0;
        }
        self.y.atan2(self.x)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frame transforms
// ────────────────────────────────────────────────────────────────────────────

/// Express a world-frame `point` in the frame of a vehicle at `pose`.
///
/// Translates by `-pose.position`, then rotates by `-pose.yaw`.
pub fn world_to_local(point: Vec2, pose: &VehiclePose) -> Vec2 {
    let d = point.sub(Vec2::new(pose.x, pose.y));
    let (s, c) = pose.yaw.sin_cos();
    Vec2::new(c * d.x + s * d.y, -s * d.x + c * d.y)
}

/// Inverse of [`world_to_local`].
pub fn local_to_world(local: Vec2, pose: &VehiclePose) -> Vec2 {
    local.rotate(pose.yaw).add(Vec2::new(pose.x, pose.y))
}

// ────────────────────────────────────────────────────────────────────────────
// Orientation
// ────────────────────────────────────────────────────────────────────────────

/// Heading (radians) of an orientation quaternion.
///
/// The quaternion is decomposed into intrinsic X-Y-Z Euler angles and the
/// third (Z) angle is returned.  When the middle angle sits at ±π/2 the
/// decomposition is not unique and the heading is reported as `0.0`.
///
/// The input is normalised but not otherwise validated: a zero quaternion
/// yields `NaN`.
pub fn heading_from_orientation(q: &Quaternion) -> f64 {
    let norm = (q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w).sqrt();
    let (x, y, z, w) = (q.x / norm, q.y / norm, q.z / norm, q.w / norm);

    // Entries of R = Rx(a)·Ry(b)·Rz(c) needed for b and c.
    let r00 = 1.0 - 2.0 * (y * y + z * z);
    let r01 = 2.0 * (x * y - w * z);
    let r02 = 2.0 * (x * z + w * y);

    let pitch = r02.clamp(-1.0, 1.0).asin();
    if (pitch.abs() - FRAC_PI_2).abs() <= GIMBAL_LOCK_EPS {
        warn!(pitch, "gimbal lock in orientation; heading set to zero");
        return 0.0;
    }
    (-r01).atan2(r00)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4, PI};

    const TOL: f64 = 1e-9;

    // ── Vec2 ────────────────────────────────────────────────────────────────

    #[test]
    fn rotate_quarter_turn_maps_x_to_y() {
        let r = Vec2::new(1.0, 0.0).rotate(FRAC_PI_2);
        assert!(r.x.abs() < TOL);
        assert!((r.y - 1.0).abs() < TOL);
    }

    #[test]
    fn zero_vector_bearing_is_zero_regardless_of_sign() {
        assert_eq!(Vec2::new(0.0, 0.0).bearing(), 0.0);
        assert_eq!(Vec2::new(-0.0, 0.0).bearing(), 0.0);
        assert_eq!(Vec2::new(-0.0, -0.0).bearing(), 0.0);
    }

    #[test]
    fn l1_norm_sums_absolute_components() {
        assert!((Vec2::new(-3.0, 4.0).l1_norm() - 7.0).abs() < TOL);
        assert_eq!(Vec2::default().l1_norm(), 0.0);
    }

    // ── world_to_local ──────────────────────────────────────────────────────

    #[test]
    fn identity_pose_leaves_point_unchanged() {
        let p = Vec2::new(5.0, -2.0);
        let l = world_to_local(p, &VehiclePose::default());
        assert_eq!(l, p);
    }

    #[test]
    fn translation_only() {
        let pose = VehiclePose::new(10.0, 5.0, 0.0);
        let l = world_to_local(Vec2::new(12.0, 4.0), &pose);
        assert!((l.x - 2.0).abs() < TOL);
        assert!((l.y + 1.0).abs() < TOL);
    }

    #[test]
    fn point_behind_rotated_vehicle_has_negative_x() {
        // Facing -X; a point at +X is behind.
        let pose = VehiclePose::new(0.0, 0.0, PI);
        let l = world_to_local(Vec2::new(3.0, 0.0), &pose);
        assert!((l.x + 3.0).abs() < TOL, "x={}", l.x);
        assert!(l.y.abs() < TOL);
    }

    #[test]
    fn point_to_the_left_has_positive_y() {
        let pose = VehiclePose::new(1.0, 2.0, FRAC_PI_4);
        // 1 m along the vehicle's left axis.
        let left = Vec2::new(1.0 - FRAC_1_SQRT_2, 2.0 + FRAC_1_SQRT_2);
        let l = world_to_local(left, &pose);
        assert!(l.x.abs() < TOL, "x={}", l.x);
        assert!((l.y - 1.0).abs() < TOL, "y={}", l.y);
    }

    #[test]
    fn world_local_round_trip() {
        let poses = [
            VehiclePose::new(0.0, 0.0, 0.0),
            VehiclePose::new(3.5, -7.25, 1.2),
            VehiclePose::new(-100.0, 42.0, -2.9),
            VehiclePose::new(0.1, 0.1, PI),
            VehiclePose::new(1e3, -1e3, 13.0),
        ];
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(5.0, 0.0),
            Vec2::new(-12.5, 3.0),
            Vec2::new(1e3, 1e3),
        ];
        for pose in &poses {
            for &p in &points {
                let back = local_to_world(world_to_local(p, pose), pose);
                assert!((back.x - p.x).abs() < 1e-6, "pose={pose:?} p={p:?} back={back:?}");
                assert!((back.y - p.y).abs() < 1e-6, "pose={pose:?} p={p:?} back={back:?}");
            }
        }
    }

    // ── heading_from_orientation ────────────────────────────────────────────

    #[test]
    fn identity_quaternion_has_zero_heading() {
        assert_eq!(heading_from_orientation(&Quaternion::identity()), 0.0);
    }

    #[test]
    fn pure_yaw_quaternion_recovers_yaw() {
        for yaw in [0.3, -0.3, 1.5, -2.0, 3.0] {
            let h = heading_from_orientation(&Quaternion::from_yaw(yaw));
            assert!((h - yaw).abs() < TOL, "yaw={yaw} h={h}");
        }
    }

    #[test]
    fn unnormalised_quaternion_is_scaled_first() {
        let q = Quaternion::from_yaw(0.7);
        let scaled = Quaternion::new(q.x * 3.0, q.y * 3.0, q.z * 3.0, q.w * 3.0);
        assert!((heading_from_orientation(&scaled) - 0.7).abs() < TOL);
    }

    #[test]
    fn roll_does_not_change_heading_of_flat_quaternion() {
        // Intrinsic X then Z: q = qx(roll) * qz(yaw).
        let (roll, yaw) = (0.2_f64, 0.9_f64);
        let (sr, cr) = (roll / 2.0).sin_cos();
        let (sy, cy) = (yaw / 2.0).sin_cos();
        let q = Quaternion::new(sr * cy, -sr * sy, cr * sy, cr * cy);
        assert!((heading_from_orientation(&q) - yaw).abs() < TOL);
    }

    #[test]
    fn gimbal_lock_reports_zero_heading() {
        // 90° pitch about Y.
        let q = Quaternion::new(0.0, FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2);
        assert_eq!(heading_from_orientation(&q), 0.0);
    }

    #[test]
    fn zero_quaternion_propagates_nan() {
        let q = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert!(heading_from_orientation(&q).is_nan());
    }
}
