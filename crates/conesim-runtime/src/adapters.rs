//! Conversion between the simulator's message schema and the internal
//! landmark representation.
//!
//! * **Ingress** – [`landmarks_from_cones`] flattens the five colour lists of
//!   a [`ConeArrayWithCovariance`] into one [`LandmarkSet`] (blue, yellow,
//!   orange, big orange, unknown – always in that order), and
//!   [`pose_from_car_state`] reduces a [`CarState`] to a planar
//!   [`VehiclePose`].  [`IngressAdapter`] applies both to a shared
//!   [`PerceptionState`].
//! * **Egress** – [`cones_from_landmarks`] sorts landmarks back into colour
//!   lists.

use std::sync::Arc;

use conesim_perception::PerceptionState;
use conesim_perception::geometry::heading_from_orientation;
use conesim_types::{
    CarState, ConeArrayWithCovariance, ConeWithCovariance, Event, EventPayload, Landmark,
    LandmarkColour, LandmarkSet, VehiclePose,
};
use tracing::{debug, info};

// ─────────────────────────────────────────────────────────────────────────────
// Pure conversions
// ─────────────────────────────────────────────────────────────────────────────

/// Flatten a colour-segregated cone message into an ordered [`LandmarkSet`].
pub fn landmarks_from_cones(msg: &ConeArrayWithCovariance) -> LandmarkSet {
    let groups = [
        (&msg.blue_cones, LandmarkColour::Blue),
        (&msg.yellow_cones, LandmarkColour::Yellow),
        (&msg.orange_cones, LandmarkColour::Orange),
        (&msg.big_orange_cones, LandmarkColour::LargeOrange),
        (&msg.unknown_color_cones, LandmarkColour::Unknown),
    ];
    let landmarks = groups
        .into_iter()
        .flat_map(|(cones, colour)| {
            cones
                .iter()
                .map(move |c| Landmark::new(c.point.x, c.point.y, colour))
        })
        .collect();
    LandmarkSet::new(msg.header.clone(), landmarks)
}

/// Sort a [`LandmarkSet`] back into the five colour lists.
///
/// Covariances are zeroed; only the planar position is carried.
pub fn cones_from_landmarks(set: &LandmarkSet) -> ConeArrayWithCovariance {
    let mut msg = ConeArrayWithCovariance {
        header: set.header.clone(),
        ..ConeArrayWithCovariance::default()
    };
    for lm in &set.landmarks {
        let cone = ConeWithCovariance::at(lm.x, lm.y);
        match lm.colour {
            LandmarkColour::Blue => msg.blue_cones.push(cone),
            LandmarkColour::Yellow => msg.yellow_cones.push(cone),
            LandmarkColour::Orange => msg.orange_cones.push(cone),
            LandmarkColour::LargeOrange => msg.big_orange_cones.push(cone),
            LandmarkColour::Unknown => msg.unknown_color_cones.push(cone),
        }
    }
    msg
}

/// Planar pose of the car: world x/y and heading from the orientation.
pub fn pose_from_car_state(msg: &CarState) -> VehiclePose {
    let pose = &msg.pose.pose;
    VehiclePose::new(
        pose.position.x,
        pose.position.y,
        heading_from_orientation(&pose.orientation),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// IngressAdapter
// ─────────────────────────────────────────────────────────────────────────────

/// Applies inbound simulator messages to a shared [`PerceptionState`].
#[derive(Clone)]
pub struct IngressAdapter {
    state: Arc<PerceptionState>,
}

impl IngressAdapter {
    pub fn new(state: Arc<PerceptionState>) -> Self {
        Self { state }
    }

    /// Replace the stored landmarks with the contents of `msg`.
    pub fn on_ground_truth_cones(&self, msg: &ConeArrayWithCovariance) {
        info!(blue = msg.blue_cones.len(), total = msg.len(), "got ground-truth cones");
        self.state.update_landmarks(landmarks_from_cones(msg));
    }

    /// Replace the stored pose with the pose in `msg`.
    pub fn on_ground_truth_state(&self, msg: &CarState) {
        let pose = pose_from_car_state(msg);
        info!(x = pose.x, y = pose.y, yaw = pose.yaw, "got car state");
        self.state.update_pose(pose);
    }

    /// Dispatch a bus event to the matching handler.
    ///
    /// Events that carry no ground truth are ignored.
    pub fn handle_event(&self, event: &Event) {
        match &event.payload {
            EventPayload::GroundTruthCones(msg) => self.on_ground_truth_cones(msg),
            EventPayload::GroundTruthState(msg) => self.on_ground_truth_state(msg),
            EventPayload::SimulatedPerception(_) => {
                debug!(source = %event.source, "ingress ignoring perception output");
            }
        }
    }
}
