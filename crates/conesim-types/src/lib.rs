//! `conesim-types` – shared message and domain types.
//!
//! Two families of types live here:
//!
//! * **Wire messages** mirroring the simulator's ROS 2 interfaces
//!   ([`ConeArrayWithCovariance`], [`CarState`] and the `std_msgs` /
//!   `geometry_msgs` pieces they are built from).  Field names match the ROS
//!   definitions so the rosbridge JSON deserialises directly.
//! * **Internal representation** used by the perception pipeline
//!   ([`Landmark`], [`LandmarkSet`], [`VehiclePose`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// std_msgs / geometry_msgs
// ────────────────────────────────────────────────────────────────────────────

/// `builtin_interfaces/Time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

/// `std_msgs/Header`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

/// `geometry_msgs/Point`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// `geometry_msgs/Quaternion` in ROS field order (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Pure rotation of `yaw` radians about +Z.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self::new(0.0, 0.0, half.sin(), half.cos())
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// `geometry_msgs/Pose`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// `geometry_msgs/PoseWithCovariance`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseWithCovariance {
    pub pose: Pose,
    /// Row-major 6x6 covariance.  Carried but never interpreted.
    pub covariance: Vec<f64>,
}

// ────────────────────────────────────────────────────────────────────────────
// eufs_msgs
// ────────────────────────────────────────────────────────────────────────────

/// `eufs_msgs/ConeWithCovariance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConeWithCovariance {
    pub point: Point,
    /// Row-major 2x2 position covariance.
    pub covariance: [f64; 4],
}

impl ConeWithCovariance {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            point: Point::new(x, y, 0.0),
            covariance: [0.0; 4],
        }
    }
}

/// `eufs_msgs/ConeArrayWithCovariance` – cones segregated into one list per
/// colour class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConeArrayWithCovariance {
    pub header: Header,
    pub blue_cones: Vec<ConeWithCovariance>,
    pub yellow_cones: Vec<ConeWithCovariance>,
    pub orange_cones: Vec<ConeWithCovariance>,
    pub big_orange_cones: Vec<ConeWithCovariance>,
    pub unknown_color_cones: Vec<ConeWithCovariance>,
}

impl ConeArrayWithCovariance {
    /// Total number of cones across all five colour lists.
    pub fn len(&self) -> usize {
        self.blue_cones.len()
            + self.yellow_cones.len()
            + self.orange_cones.len()
            + self.big_orange_cones.len()
            + self.unknown_color_cones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `eufs_msgs/CarState`.  Only the pose is consumed; the remaining fields of
/// the ROS message are ignored on deserialisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarState {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: PoseWithCovariance,
}

// ────────────────────────────────────────────────────────────────────────────
// Internal landmark representation
// ────────────────────────────────────────────────────────────────────────────

/// Colour class of a cone landmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandmarkColour {
    Blue,
    Yellow,
    Orange,
    LargeOrange,
    #[default]
    Unknown,
}

impl LandmarkColour {
    /// Decode a numeric colour code.  Codes outside `0..=3` are `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => LandmarkColour::Blue,
            1 => LandmarkColour::Yellow,
            2 => LandmarkColour::Orange,
            3 => LandmarkColour::LargeOrange,
            _ => LandmarkColour::Unknown,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            LandmarkColour::Blue => 0,
            LandmarkColour::Yellow => 1,
            LandmarkColour::Orange => 2,
            LandmarkColour::LargeOrange => 3,
            LandmarkColour::Unknown => 4,
        }
    }
}

/// A single cone: planar position plus colour class.
///
/// Whether `x`/`y` are world or vehicle-local coordinates depends on where
/// the value came from; the two are never mixed within one [`LandmarkSet`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub colour: LandmarkColour,
}

impl Landmark {
    pub fn new(x: f64, y: f64, colour: LandmarkColour) -> Self {
        Self { x, y, colour }
    }
}

/// An ordered set of landmarks plus the header of the message it came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub header: Header,
    pub landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(header: Header, landmarks: Vec<Landmark>) -> Self {
        Self { header, landmarks }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// Planar vehicle pose in the world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehiclePose {
    pub x: f64,
    pub y: f64,
    /// Heading, counter-clockwise from +X (radians).
    pub yaw: f64,
}

impl VehiclePose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Event bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "conesim-middleware::ros2/ground_truth/track"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Ground-truth cone positions from the simulator.
    GroundTruthCones(ConeArrayWithCovariance),
    /// Ground-truth vehicle state from the simulator.
    GroundTruthState(CarState),
    /// The FOV-cropped cone estimate produced by the perception node.
    SimulatedPerception(ConeArrayWithCovariance),
}

/// Workspace-wide error type.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Parsing Error: {0}")]
    Parsing(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Storage Error: {0}")]
    Storage(String),
}
