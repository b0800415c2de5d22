//! `conesim-middleware` – message routing.
//!
//! Routes asynchronous data between the simulator, the perception node and
//! external clients without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`ros2_bridge`] – rosbridge-compatible WebSocket bridge that carries the
//!   ground-truth and perception topics in and out of the process as JSON.

pub mod bus;
pub mod ros2_bridge;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use ros2_bridge::{Ros2Bridge, TopicNames};
