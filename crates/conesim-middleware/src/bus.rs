//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Default ROS name | Traffic |
//! |---|---|---|
//! | [`Topic::GroundTruthTrack`] | `/ground_truth/track` | Simulator cone positions |
//! | [`Topic::GroundTruthState`] | `/ground_truth/state` | Simulator car state |
//! | [`Topic::SimulatedPerception`] | `/ugrdv/perception/epsrc_cones` | FOV-cropped cones |

use conesim_types::{Event, SimError};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Ground-truth cone map from the simulator.
    GroundTruthTrack,
    /// Ground-truth vehicle state from the simulator.
    GroundTruthState,
    /// Output of the simulated perception node.
    SimulatedPerception,
}

impl Topic {
    pub const ALL: [Topic; 3] = [
        Topic::GroundTruthTrack,
        Topic::GroundTruthState,
        Topic::SimulatedPerception,
    ];

    /// ROS topic name used when none is configured.
    pub fn default_ros_name(self) -> &'static str {
        match self {
            Topic::GroundTruthTrack => "/ground_truth/track",
            Topic::GroundTruthState => "/ground_truth/state",
            Topic::SimulatedPerception => "/ugrdv/perception/epsrc_cones",
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    ground_truth_track: broadcast::Sender<Event>,
    ground_truth_state: broadcast::Sender<Event>,
    simulated_perception: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (ground_truth_track, _) = broadcast::channel(capacity);
        let (ground_truth_state, _) = broadcast::channel(capacity);
        let (simulated_perception, _) = broadcast::channel(capacity);
        Self {
            ground_truth_track,
            ground_truth_state,
            simulated_perception,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when no subscribers are currently listening on the
    /// topic (this is a normal condition, not an error).
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, SimError> {
        let sender = self.topic_sender(topic);
        if sender.receiver_count() == 0 {
            trace!(?topic, "no subscribers; event dropped");
            return Ok(0);
        }
        sender
            .send(event)
            .map_err(|e| SimError::Channel(format!("event bus send error on {topic:?}: {e}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::GroundTruthTrack => &self.ground_truth_track,
            Topic::GroundTruthState => &self.ground_truth_state,
            Topic::SimulatedPerception => &self.simulated_perception,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Wait for the next event, skipping over lag notifications.
    ///
    /// Returns `None` once the bus is closed.  Only the most recent value on
    /// a topic matters to latest-value consumers, so dropped events are
    /// logged and otherwise ignored.
    pub async fn recv_latest(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conesim_types::{CarState, ConeArrayWithCovariance, ConeWithCovariance, EventPayload};

    fn make_event(source: &str) -> Event {
        Event::new(source, EventPayload::GroundTruthState(CarState::default()))
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        let delivered = bus
            .publish_to(Topic::SimulatedPerception, make_event("test"))
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[test]
    fn default_ros_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            Topic::ALL.iter().map(|t| t.default_ros_name()).collect();
        assert_eq!(names.len(), Topic::ALL.len());
    }

    fn cone_map(blue: usize) -> Event {
        let msg = ConeArrayWithCovariance {
            blue_cones: (0..blue).map(|i| ConeWithCovariance::at(i as f64, 1.5)).collect(),
            ..ConeArrayWithCovariance::default()
        };
        Event::new("sim::track", EventPayload::GroundTruthCones(msg))
    }

    fn blue_count(event: &Event) -> Option<usize> {
        match &event.payload {
            EventPayload::GroundTruthCones(msg) | EventPayload::SimulatedPerception(msg) => {
                Some(msg.blue_cones.len())
            }
            EventPayload::GroundTruthState(_) => None,
        }
    }

    /// Every bridge client gets its own copy of each perception frame.
    #[tokio::test]
    async fn perception_output_reaches_every_client() {
        let bus = EventBus::default();
        let mut client_a = bus.subscribe_to(Topic::SimulatedPerception);
        let mut client_b = bus.subscribe_to(Topic::SimulatedPerception);
        assert_eq!(bus.subscriber_count(Topic::SimulatedPerception), 2);

        let msg = ConeArrayWithCovariance {
            yellow_cones: vec![ConeWithCovariance::at(4.0, -1.5)],
            ..ConeArrayWithCovariance::default()
        };
        let frame = Event::new("perception", EventPayload::SimulatedPerception(msg.clone()));
        assert_eq!(bus.publish_to(Topic::SimulatedPerception, frame).unwrap(), 2);

        for client in [&mut client_a, &mut client_b] {
            match client.recv().await.unwrap().payload {
                EventPayload::SimulatedPerception(got) => assert_eq!(got, msg),
                other => panic!("unexpected payload: {other:?}"),
            }
        }
    }

    #[test]
    fn car_state_stays_off_the_track_channel() {
        let bus = EventBus::default();
        let mut track = bus.subscribe_to(Topic::GroundTruthTrack);
        let mut state = bus.subscribe_to(Topic::GroundTruthState);

        bus.publish_to(Topic::GroundTruthState, make_event("sim::state")).unwrap();

        assert!(track.try_recv().is_none());
        let got = state.try_recv().expect("state event queued");
        assert_eq!(got.source, "sim::state");
        assert_eq!(blue_count(&got), None);
    }

    /// A subscriber that falls behind a burst of cone maps learns how many it
    /// missed, then resumes at the oldest map still buffered.
    #[tokio::test]
    async fn cone_map_burst_reports_dropped_count() {
        let bus = EventBus::new(8);
        let mut slow = bus.subscribe_to(Topic::GroundTruthTrack);

        for blue in 0..50 {
            bus.publish_to(Topic::GroundTruthTrack, cone_map(blue)).unwrap();
        }

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(42))
        ));
        let resumed = slow.recv().await.unwrap();
        assert_eq!(blue_count(&resumed), Some(42));
    }

    #[tokio::test]
    async fn recv_latest_skips_lag_and_returns_newest_events() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe_to(Topic::GroundTruthTrack);

        let mut last = None;
        for _ in 0..20 {
            let event = make_event("flood::track");
            last = Some(event.id);
            bus.publish_to(Topic::GroundTruthTrack, event).unwrap();
        }

        let mut newest = None;
        while let Some(event) = sub.try_recv() {
            newest = Some(event.id);
        }
        assert_eq!(newest, last);

        bus.publish_to(Topic::GroundTruthTrack, make_event("after")).unwrap();
        let event = sub.recv_latest().await.expect("bus is open");
        assert_eq!(event.source, "after");
    }

    #[tokio::test]
    async fn recv_latest_returns_none_when_bus_dropped() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_to(Topic::GroundTruthState);
        drop(bus);
        assert!(sub.recv_latest().await.is_none());
    }
}
