//! Node configuration – reads `~/.conesim/config.toml`.
//!
//! Every field is optional in the file; missing fields take the defaults
//! below.  A missing file means "all defaults".
//!
//! ```toml
//! update_hz = 10.0
//! fov_deg = 110.0
//! max_distance = 12.0
//! bridge_host = "0.0.0.0"
//! bridge_port = 9090
//! integrity_streams = ["ground_truth_cones", "ground_truth_state", "simulated_perception"]
//!
//! [topics]
//! ground_truth_track = "/ground_truth/track"
//! ground_truth_state = "/ground_truth/state"
//! simulated_perception = "/ugrdv/perception/epsrc_cones"
//! ```

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use conesim_dataset::DEFAULT_STREAMS;
use conesim_middleware::{Topic, TopicNames};
use conesim_perception::FieldOfView;
use conesim_perception::visibility::{DEFAULT_FOV_DEG, DEFAULT_MAX_DISTANCE};
use conesim_runtime::PerceptionNodeConfig;
use conesim_runtime::perception_node::DEFAULT_UPDATE_HZ;
use conesim_types::SimError;
use serde::{Deserialize, Serialize};

/// ROS topic names, as written in the `[topics]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub ground_truth_track: String,
    pub ground_truth_state: String,
    pub simulated_perception: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            ground_truth_track: Topic::GroundTruthTrack.default_ros_name().to_string(),
            ground_truth_state: Topic::GroundTruthState.default_ros_name().to_string(),
            simulated_perception: Topic::SimulatedPerception.default_ros_name().to_string(),
        }
    }
}

/// Persisted configuration stored in `~/.conesim/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output publish rate (Hz).
    pub update_hz: f64,
    /// Full horizontal field of view (degrees).
    pub fov_deg: f64,
    /// Maximum L1 range (metres).
    pub max_distance: f64,
    /// Interface the rosbridge WebSocket server binds to.
    pub bridge_host: String,
    pub bridge_port: u16,
    pub topics: TopicConfig,
    /// Streams `integrity-check` expects in every session.
    pub integrity_streams: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_hz: DEFAULT_UPDATE_HZ,
            fov_deg: DEFAULT_FOV_DEG,
            max_distance: DEFAULT_MAX_DISTANCE,
            bridge_host: "0.0.0.0".to_string(),
            bridge_port: 9090,
            topics: TopicConfig::default(),
            integrity_streams: DEFAULT_STREAMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Settings for [`PerceptionNode`](conesim_runtime::PerceptionNode).
    pub fn to_node_config(&self) -> PerceptionNodeConfig {
        PerceptionNodeConfig {
            update_hz: self.update_hz,
            fov: FieldOfView::from_degrees(self.fov_deg, self.max_distance),
        }
    }

    pub fn topic_names(&self) -> TopicNames {
        TopicNames {
            ground_truth_track: self.topics.ground_truth_track.clone(),
            ground_truth_state: self.topics.ground_truth_state.clone(),
            simulated_perception: self.topics.simulated_perception.clone(),
        }
    }

    /// Socket address of the rosbridge server.
    pub fn bridge_addr(&self) -> Result<SocketAddr, SimError> {
        let ip: IpAddr = self
            .bridge_host
            .parse()
            .map_err(|e| SimError::Config(format!("invalid bridge_host `{}`: {e}", self.bridge_host)))?;
        Ok(SocketAddr::new(ip, self.bridge_port))
    }
}

/// Return the path to `~/.conesim/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".conesim").join("config.toml")
}

/// Load the config from disk (or defaults if absent) and apply env overrides.
pub fn load() -> Result<Config, SimError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the config file at `path`.  Returns `None` if it does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, SimError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| SimError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| SimError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `CONESIM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CONESIM_UPDATE_HZ` | `update_hz` |
/// | `CONESIM_FOV_DEG` | `fov_deg` |
/// | `CONESIM_MAX_DISTANCE` | `max_distance` |
/// | `CONESIM_BRIDGE_PORT` | `bridge_port` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(v) = env_parsed::<f64>("CONESIM_UPDATE_HZ") {
        cfg.update_hz = v;
    }
    if let Some(v) = env_parsed::<f64>("CONESIM_FOV_DEG") {
        cfg.fov_deg = v;
    }
    if let Some(v) = env_parsed::<f64>("CONESIM_MAX_DISTANCE") {
        cfg.max_distance = v;
    }
    if let Some(v) = env_parsed::<u16>("CONESIM_BRIDGE_PORT") {
        cfg.bridge_port = v;
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
