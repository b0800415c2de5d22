//! rosbridge-compatible WebSocket bridge.
//!
//! This module provides [`Ros2Bridge`], which:
//!
//! 1. **Ingests** rosbridge `publish` frames for the simulator's ground-truth
//!    topics, deserialises the `msg` body into the typed ROS message and
//!    publishes it onto the internal [`EventBus`].
//!
//! 2. **Serves** every [`Topic::SimulatedPerception`] event back to connected
//!    clients as a rosbridge `publish` frame, so a `rosbridge_server` relay
//!    (or any client speaking the same JSON) can forward it into ROS 2.
//!
//! Frame shape, both directions:
//!
//! ```text
//! {"op": "publish", "topic": "/ground_truth/track", "msg": { ... }}
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use conesim_types::{CarState, ConeArrayWithCovariance, Event, EventPayload, SimError};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::bus::{EventBus, Topic};

/// ROS topic names the bridge maps onto bus [`Topic`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicNames {
    pub ground_truth_track: String,
    pub ground_truth_state: String,
    pub simulated_perception: String,
}

impl TopicNames {
    /// The bus topic a ROS topic name maps to, if any.
    pub fn topic_for(&self, ros_name: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| self.name_of(*t) == ros_name)
    }

    /// The ROS topic name of a bus topic.
    pub fn name_of(&self, topic: Topic) -> &str {
        match topic {
            Topic::GroundTruthTrack => &self.ground_truth_track,
            Topic::GroundTruthState => &self.ground_truth_state,
            Topic::SimulatedPerception => &self.simulated_perception,
        }
    }
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            ground_truth_track: Topic::GroundTruthTrack.default_ros_name().to_string(),
            ground_truth_state: Topic::GroundTruthState.default_ros_name().to_string(),
            simulated_perception: Topic::SimulatedPerception.default_ros_name().to_string(),
        }
    }
}

/// Bridge between rosbridge WebSocket clients and the internal [`EventBus`].
#[derive(Clone)]
pub struct Ros2Bridge {
    bus: Arc<EventBus>,
    topics: TopicNames,
}

impl Ros2Bridge {
    /// Create a new bridge backed by `bus` using the default topic names.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_topics(bus, TopicNames::default())
    }

    pub fn with_topics(bus: Arc<EventBus>, topics: TopicNames) -> Self {
        Self { bus, topics }
    }

    pub fn topics(&self) -> &TopicNames {
        &self.topics
    }

    // -----------------------------------------------------------------------
    // ROS2 ingest helpers
    // -----------------------------------------------------------------------

    /// Publish a ground-truth cone map onto [`Topic::GroundTruthTrack`].
    pub fn ingest_ground_truth_track(&self, msg: ConeArrayWithCovariance) -> Result<usize, SimError> {
        let event = Event::new(
            "conesim-middleware::ros2/ground_truth/track",
            EventPayload::GroundTruthCones(msg),
        );
        self.bus.publish_to(Topic::GroundTruthTrack, event)
    }

    /// Publish a ground-truth car state onto [`Topic::GroundTruthState`].
    pub fn ingest_ground_truth_state(&self, msg: CarState) -> Result<usize, SimError> {
        let event = Event::new(
            "conesim-middleware::ros2/ground_truth/state",
            EventPayload::GroundTruthState(msg),
        );
        self.bus.publish_to(Topic::GroundTruthState, event)
    }

    /// Parse one rosbridge text frame and route it onto the bus.
    ///
    /// Returns the bus topic the frame was routed to, `Ok(None)` for frames
    /// the bridge does not handle (other ops, unknown or outbound topics),
    /// and an error for frames that are not valid JSON or whose `msg` does
    /// not match the topic's message type.
    pub fn handle_incoming_ws_message(&self, text: &str) -> Result<Option<Topic>, SimError> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SimError::Parsing(format!("rosbridge frame is not JSON: {e}")))?;

        let op = json.get("op").and_then(|o| o.as_str()).unwrap_or("");
        if op != "publish" {
            debug!(op, "ignoring non-publish rosbridge op");
            return Ok(None);
        }
        let name = json.get("topic").and_then(|t| t.as_str()).unwrap_or("");
        let msg = json.get("msg").cloned().unwrap_or(serde_json::Value::Null);

        match self.topics.topic_for(name) {
            Some(Topic::GroundTruthTrack) => {
                let cones: ConeArrayWithCovariance = serde_json::from_value(msg)
                    .map_err(|e| SimError::Parsing(format!("{name}: {e}")))?;
                self.ingest_ground_truth_track(cones)?;
                Ok(Some(Topic::GroundTruthTrack))
            }
            Some(Topic::GroundTruthState) => {
                let state: CarState = serde_json::from_value(msg)
                    .map_err(|e| SimError::Parsing(format!("{name}: {e}")))?;
                self.ingest_ground_truth_state(state)?;
                Ok(Some(Topic::GroundTruthState))
            }
            Some(Topic::SimulatedPerception) | None => {
                debug!(topic = name, "ignoring publish on unhandled topic");
                Ok(None)
            }
        }
    }

    /// Render an outbound bus event as a rosbridge `publish` frame.
    ///
    /// Only [`EventPayload::SimulatedPerception`] events are forwarded.
    pub fn outbound_frame(&self, event: &Event) -> Result<Option<String>, SimError> {
        let EventPayload::SimulatedPerception(cones) = &event.payload else {
            return Ok(None);
        };
        let msg = serde_json::to_value(cones).map_err(|e| SimError::Serialization(e.to_string()))?;
        let frame = json!({
            "op": "publish",
            "topic": self.topics.name_of(Topic::SimulatedPerception),
            "msg": msg,
        });
        Ok(Some(frame.to_string()))
    }

    // -----------------------------------------------------------------------
    // WebSocket server
    // -----------------------------------------------------------------------

    /// Start a WebSocket server on `addr`.
    ///
    /// The server runs until it encounters a fatal bind error.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Channel`] if the TCP listener cannot be bound.
    pub async fn run_ws_server(self, addr: SocketAddr) -> Result<(), SimError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SimError::Channel(format!("ws bind error on {addr}: {e}")))?;
        info!(%addr, "rosbridge WebSocket server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bridge = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = bridge.handle_ws_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "ws client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "ws accept error");
                }
            }
        }
    }

    async fn handle_ws_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), SimError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| SimError::Channel(format!("ws handshake from {peer}: {e}")))?;
        info!(peer = %peer, "rosbridge client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut rx = self.bus.subscribe_to(Topic::SimulatedPerception);

        loop {
            tokio::select! {
                // Forward perception output to the client.
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if let Some(frame) = self.outbound_frame(&event)? {
                                if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(peer = %peer, lagged_by = n, "ws client lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                // Route ground-truth frames from the client onto the bus.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.handle_incoming_ws_message(text.as_str()) {
                                warn!(peer = %peer, error = %e, "dropping rosbridge frame");
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        info!(peer = %peer, "rosbridge client disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    fn make_bridge() -> (Arc<EventBus>, Ros2Bridge) {
        let bus = Arc::new(EventBus::default());
        let bridge = Ros2Bridge::new(Arc::clone(&bus));
        (bus, bridge)
    }

    #[tokio::test]
    async fn track_frame_is_routed_to_ground_truth_track() {
        let (bus, bridge) = make_bridge();
        let mut rx = bus.subscribe_to(Topic::GroundTruthTrack);

        let frame = r#"{"op":"publish","topic":"/ground_truth/track","msg":{
            "header":{"stamp":{"sec":3,"nanosec":0},"frame_id":"map"},
            "blue_cones":[{"point":{"x":5.0,"y":0.0,"z":0.0}}]
        }}"#;
        let routed = bridge.handle_incoming_ws_message(frame).unwrap();
        assert_eq!(routed, Some(Topic::GroundTruthTrack));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source, "conesim-middleware::ros2/ground_truth/track");
        let EventPayload::GroundTruthCones(cones) = event.payload else {
            panic!("expected GroundTruthCones");
        };
        assert_eq!(cones.header.stamp.sec, 3);
        assert_eq!(cones.blue_cones.len(), 1);
    }

    #[tokio::test]
    async fn state_frame_is_routed_to_ground_truth_state() {
        let (bus, bridge) = make_bridge();
        let mut rx = bus.subscribe_to(Topic::GroundTruthState);

        let frame = r#"{"op":"publish","topic":"/ground_truth/state","msg":{
            "pose":{"pose":{"position":{"x":1.5,"y":-2.0,"z":0.0},
                            "orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}}
        }}"#;
        assert_eq!(
            bridge.handle_incoming_ws_message(frame).unwrap(),
            Some(Topic::GroundTruthState)
        );

        let event = rx.recv().await.unwrap();
        let EventPayload::GroundTruthState(state) = event.payload else {
            panic!("expected GroundTruthState");
        };
        assert_eq!(state.pose.pose.position.x, 1.5);
    }

    #[test]
    fn garbage_frame_is_a_parsing_error() {
        let (_bus, bridge) = make_bridge();
        let err = bridge.handle_incoming_ws_message("not json").unwrap_err();
        assert!(matches!(err, SimError::Parsing(_)));
    }

    #[test]
    fn mistyped_msg_is_a_parsing_error() {
        let (_bus, bridge) = make_bridge();
        let frame = r#"{"op":"publish","topic":"/ground_truth/track","msg":{"blue_cones":"nope"}}"#;
        assert!(matches!(
            bridge.handle_incoming_ws_message(frame),
            Err(SimError::Parsing(_))
        ));
    }

    #[tokio::test]
    async fn unknown_topic_and_other_ops_are_ignored() {
        let (bus, bridge) = make_bridge();
        let mut track = bus.subscribe_to(Topic::GroundTruthTrack);
        let mut state = bus.subscribe_to(Topic::GroundTruthState);

        assert_eq!(
            bridge
                .handle_incoming_ws_message(r#"{"op":"subscribe","topic":"/ground_truth/track"}"#)
                .unwrap(),
            None
        );
        assert_eq!(
            bridge
                .handle_incoming_ws_message(r#"{"op":"publish","topic":"/unknown","msg":{}}"#)
                .unwrap(),
            None
        );
        // Clients cannot inject perception output.
        assert_eq!(
            bridge
                .handle_incoming_ws_message(
                    r#"{"op":"publish","topic":"/ugrdv/perception/epsrc_cones","msg":{}}"#
                )
                .unwrap(),
            None
        );
        assert!(track.try_recv().is_none());
        assert!(state.try_recv().is_none());
    }

    #[test]
    fn custom_topic_names_are_honoured() {
        let bus = Arc::new(EventBus::default());
        let topics = TopicNames {
            ground_truth_track: "/sim/cones".to_string(),
            ..TopicNames::default()
        };
        let bridge = Ros2Bridge::with_topics(bus, topics);
        assert_eq!(bridge.topics().topic_for("/sim/cones"), Some(Topic::GroundTruthTrack));
        assert_eq!(bridge.topics().topic_for("/ground_truth/track"), None);
    }

    #[test]
    fn outbound_frame_wraps_perception_output() {
        let (_bus, bridge) = make_bridge();
        let mut cones = ConeArrayWithCovariance::default();
        cones.yellow_cones.push(conesim_types::ConeWithCovariance::at(2.0, 1.0));
        let event = Event::new("conesim-runtime::perception", EventPayload::SimulatedPerception(cones));

        let frame = bridge.outbound_frame(&event).unwrap().expect("frame");
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["op"], "publish");
        assert_eq!(json["topic"], "/ugrdv/perception/epsrc_cones");
        assert_eq!(json["msg"]["yellow_cones"][0]["point"]["x"], 2.0);
    }

    #[test]
    fn outbound_frame_skips_ground_truth_events() {
        let (_bus, bridge) = make_bridge();
        let event = Event::new("x", EventPayload::GroundTruthState(CarState::default()));
        assert!(bridge.outbound_frame(&event).unwrap().is_none());
    }
}
