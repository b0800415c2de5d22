//! `conesim-perception` – simulated perception geometry.
//!
//! Turns ground-truth cone positions into what a forward-facing sensor on the
//! car would plausibly report.
//!
//! # Modules
//!
//! - [`geometry`] – world↔vehicle frame transforms and quaternion heading
//!   extraction.
//! - [`visibility`] – [`FieldOfView`][visibility::FieldOfView] and
//!   [`crop_to_fov`][visibility::crop_to_fov]: keep only the landmarks inside
//!   the sensor's angular window and range.
//! - [`state`] – [`PerceptionState`][state::PerceptionState]: latest landmark
//!   set and pose, shared between ingress and the publish cycle.

pub mod geometry;
pub mod state;
pub mod visibility;

pub use state::PerceptionState;
pub use visibility::{FieldOfView, crop_to_fov};
