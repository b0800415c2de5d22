//! `conesim-runtime` – the simulated perception node.
//!
//! # Modules
//!
//! - [`perception_node`] – [`PerceptionNode`][perception_node::PerceptionNode]:
//!   ingress tasks plus the fixed-rate publish cycle that crops ground truth
//!   to the sensor's field of view.
//! - [`adapters`] – conversion between the simulator's colour-segregated cone
//!   messages and the internal [`LandmarkSet`][conesim_types::LandmarkSet],
//!   and [`IngressAdapter`][adapters::IngressAdapter], which applies inbound
//!   messages to the shared state.
//! - [`recorder`] – [`SessionRecorder`][recorder::SessionRecorder]: writes
//!   all bus traffic into a session database for later integrity checks.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod adapters;
pub mod perception_node;
pub mod recorder;
pub mod telemetry;

pub use adapters::{IngressAdapter, cones_from_landmarks, landmarks_from_cones, pose_from_car_state};
pub use perception_node::{PerceptionNode, PerceptionNodeConfig};
pub use recorder::SessionRecorder;
pub use telemetry::{TracerProviderGuard, init_tracing};
