//! Session recording.
//!
//! [`SessionRecorder`] subscribes to every bus topic and appends each message,
//! JSON-encoded, to the matching stream of a session database.  The result
//! is exactly what `integrity-check` verifies.
//!
//! | Topic | Stream |
//! |---|---|
//! | [`Topic::GroundTruthTrack`] | `ground_truth_cones` |
//! | [`Topic::GroundTruthState`] | `ground_truth_state` |
//! | [`Topic::SimulatedPerception`] | `simulated_perception` |

use std::path::Path;

use conesim_dataset::{DatasetError, SessionDatabase};
use conesim_middleware::{EventBus, Topic, TopicReceiver};
use conesim_types::{Event, EventPayload, SimError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Session stream a topic is recorded into.
pub fn stream_for(topic: Topic) -> &'static str {
    match topic {
        Topic::GroundTruthTrack => "ground_truth_cones",
        Topic::GroundTruthState => "ground_truth_state",
        Topic::SimulatedPerception => "simulated_perception",
    }
}

fn storage_err(e: DatasetError) -> SimError {
    SimError::Storage(e.to_string())
}

/// Writes bus traffic into a [`SessionDatabase`].
pub struct SessionRecorder {
    db: SessionDatabase,
}

impl SessionRecorder {
    /// Wrap `db`, creating all three stream tables up front so that a
    /// session with no traffic on some topic shows up as empty rather than
    /// missing.
    pub fn new(db: SessionDatabase) -> Result<Self, SimError> {
        for topic in Topic::ALL {
            db.ensure_stream(stream_for(topic)).map_err(storage_err)?;
        }
        Ok(Self { db })
    }

    /// Create (or append to) the session file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SimError> {
        Self::new(SessionDatabase::create(path).map_err(storage_err)?)
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Append one event to the stream of `topic`.
    ///
    /// The row timestamp is the event time in nanoseconds since the epoch;
    /// the row data is the bare message as JSON.
    pub fn record_event(&self, topic: Topic, event: &Event) -> Result<(), SimError> {
        let data = match &event.payload {
            EventPayload::GroundTruthCones(msg) | EventPayload::SimulatedPerception(msg) => {
                serde_json::to_vec(msg)
            }
            EventPayload::GroundTruthState(msg) => serde_json::to_vec(msg),
        }
        .map_err(|e| SimError::Serialization(e.to_string()))?;
        let timestamp = event.timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.db
            .record(stream_for(topic), timestamp, &data)
            .map_err(storage_err)
    }

    /// Subscribe to every topic of `bus` and record until `shutdown` flips
    /// to `true` (or its sender is dropped).
    ///
    /// Events already queued when shutdown is signalled are still written.
    /// The task returns the number of rows written.
    pub fn spawn(self, bus: &EventBus, mut shutdown: watch::Receiver<bool>) -> JoinHandle<u64> {
        let mut receivers: [TopicReceiver; 3] = Topic::ALL.map(|t| bus.subscribe_to(t));
        info!(path = %self.path().display(), "recording session");

        tokio::spawn(async move {
            let mut written = 0u64;
            loop {
                let [track, state, output] = &mut receivers;
                let next = tokio::select! {
                    Some(e) = track.recv_latest() => Some((Topic::GroundTruthTrack, e)),
                    Some(e) = state.recv_latest() => Some((Topic::GroundTruthState, e)),
                    Some(e) = output.recv_latest() => Some((Topic::SimulatedPerception, e)),
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            None
                        } else {
                            continue;
                        }
                    }
                    else => None,
                };
                match next {
                    Some((topic, event)) => written += self.write(topic, &event),
                    None => break,
                }
            }

            for rx in &mut receivers {
                while let Some(event) = rx.try_recv() {
                    written += self.write(rx.topic(), &event);
                }
            }
            info!(rows = written, "session recording stopped");
            written
        })
    }

    fn write(&self, topic: Topic, event: &Event) -> u64 {
        match self.record_event(topic, event) {
            Ok(()) => {
                debug!(?topic, "recorded");
                1
            }
            Err(e) => {
                warn!(?topic, error = %e, "failed to record event");
                0
            }
        }
    }
}
