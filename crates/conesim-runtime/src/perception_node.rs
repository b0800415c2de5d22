//! [`PerceptionNode`] – the simulated perception publish cycle.
//!
//! The node wires three independent activities around one shared
//! [`PerceptionState`]:
//!
//! 1. **Cone ingress** – a task consuming [`Topic::GroundTruthTrack`] that
//!    replaces the stored landmark set on every message.
//! 2. **Pose ingress** – a task consuming [`Topic::GroundTruthState`] that
//!    replaces the stored pose on every message.
//! 3. **Publish cycle** – a fixed-rate timer.  Every tick takes a snapshot,
//!    crops it to the sensor's field of view and publishes the result on
//!    [`Topic::SimulatedPerception`].
//!
//! The publish cycle never waits for input: it fires at the configured rate
//! on whatever state is current, including the initial empty set and zero
//! pose, and emits exactly one message per tick.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use conesim_middleware::{EventBus, Topic};
//! use conesim_runtime::perception_node::{PerceptionNode, PerceptionNodeConfig};
//!
//! let bus = Arc::new(EventBus::default());
//! let node = PerceptionNode::new(PerceptionNodeConfig::default(), bus).unwrap();
//! let out = node.tick().unwrap();
//! assert!(out.is_empty());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use conesim_middleware::{EventBus, Topic};
use conesim_perception::{FieldOfView, PerceptionState, crop_to_fov};
use conesim_types::{ConeArrayWithCovariance, Event, EventPayload, SimError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{IngressAdapter, cones_from_landmarks};

/// Default publish rate (Hz).
pub const DEFAULT_UPDATE_HZ: f64 = 10.0;

const SOURCE: &str = "conesim-runtime::perception";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`PerceptionNode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceptionNodeConfig {
    /// Publish rate of the output topic (Hz).
    pub update_hz: f64,
    /// Sensor footprint used to crop the ground truth.
    pub fov: FieldOfView,
}

impl PerceptionNodeConfig {
    /// Timer period derived from [`update_hz`](Self::update_hz).
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.update_hz)
    }

    fn validate(&self) -> Result<(), SimError> {
        if !(self.update_hz.is_finite() && self.update_hz > 0.0) {
            return Err(SimError::Config(format!(
                "update_hz must be a positive number, got {}",
                self.update_hz
            )));
        }
        match Duration::try_from_secs_f64(1.0 / self.update_hz) {
            Ok(period) if !period.is_zero() => {}
            _ => {
                return Err(SimError::Config(format!(
                    "update_hz {} gives no usable timer period",
                    self.update_hz
                )));
            }
        }
        if !(self.fov.max_distance > 0.0) {
            return Err(SimError::Config(format!(
                "max_distance must be positive, got {}",
                self.fov.max_distance
            )));
        }
        Ok(())
    }
}

impl Default for PerceptionNodeConfig {
    fn default() -> Self {
        Self {
            update_hz: DEFAULT_UPDATE_HZ,
            fov: FieldOfView::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PerceptionNode
// ─────────────────────────────────────────────────────────────────────────────

/// Re-publishes ground truth restricted to a sensor-realistic field of view.
pub struct PerceptionNode {
    config: PerceptionNodeConfig,
    state: Arc<PerceptionState>,
    bus: Arc<EventBus>,
    ticks: AtomicU64,
}

impl PerceptionNode {
    /// Build a node with a fresh (empty) [`PerceptionState`].
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] for a non-positive rate or range.
    pub fn new(config: PerceptionNodeConfig, bus: Arc<EventBus>) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            config,
            state: Arc::new(PerceptionState::new()),
            bus,
            ticks: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &PerceptionNodeConfig {
        &self.config
    }

    /// Handle to the shared state.
    pub fn state(&self) -> Arc<PerceptionState> {
        Arc::clone(&self.state)
    }

    /// An ingress adapter writing into this node's state.
    pub fn ingress(&self) -> IngressAdapter {
        IngressAdapter::new(self.state())
    }

    /// Number of publish cycles completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Run one publish cycle and return the message that was emitted.
    #[instrument(skip(self), level = "debug")]
    pub fn tick(&self) -> Result<ConeArrayWithCovariance, SimError> {
        let (landmarks, pose) = self.state.snapshot();
        let visible = crop_to_fov(&landmarks, &pose, &self.config.fov);
        let msg = cones_from_landmarks(&visible);
        self.ticks.fetch_add(1, Ordering::Relaxed);

        debug!(
            input = landmarks.len(),
            visible = visible.len(),
            x = pose.x,
            y = pose.y,
            yaw = pose.yaw,
            "publishing simulated perception"
        );
        let event = Event::new(SOURCE, EventPayload::SimulatedPerception(msg.clone()));
        self.bus.publish_to(Topic::SimulatedPerception, event)?;
        Ok(msg)
    }

    /// Subscribe to both ground-truth topics and spawn one ingress task per
    /// topic.
    ///
    /// Subscriptions are taken before this returns, so nothing published
    /// afterwards is missed.  The tasks end when the bus closes or when the
    /// returned handles are aborted.
    pub fn spawn_ingress(&self) -> Vec<JoinHandle<()>> {
        [Topic::GroundTruthTrack, Topic::GroundTruthState]
            .into_iter()
            .map(|topic| {
                let mut rx = self.bus.subscribe_to(topic);
                let adapter = self.ingress();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv_latest().await {
                        adapter.handle_event(&event);
                    }
                    debug!(?topic, "ingress task finished: bus closed");
                })
            })
            .collect()
    }

    /// Drive the node until `shutdown` flips to `true` (or its sender is
    /// dropped).
    ///
    /// Returns the number of publish cycles run.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let ingress = self.spawn_ingress();

        let period = self.config.period();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            period_ms = period.as_millis() as u64,
            fov_deg = self.config.fov.fov_rad.to_degrees(),
            max_distance = self.config.fov.max_distance,
            "simulated perception node running"
        );

        let start = self.ticks();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        warn!(error = %e, "failed to publish simulated perception");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        for handle in ingress {
            handle.abort();
        }
        let ran = self.ticks() - start;
        info!(ticks = ran, "simulated perception node stopped");
        ran
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
