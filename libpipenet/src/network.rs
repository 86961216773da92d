use fxhash::{FxHashMap, FxHashSet};
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::constants::{
    ABSORBING_COUNTING_TYPE, PIPE_PREFIX, RING_RECEIVER_TYPE, SINK_PREFIX, SPHERE_RECEIVER_TYPE,
};
use super::error::NetworkError;

/// Render the canonical name of the pipe at a slot
pub fn pipe_name(slot: usize) -> String {
    format!("{PIPE_PREFIX}{slot}")
}

/// Render the name of the n-th sink (1-based)
pub fn sink_name(number: usize) -> String {
    format!("{SINK_PREFIX}{number}")
}

/// Parse the slot back out of a pipe name of the form `pipeN`
pub fn parse_pipe_name(name: &str) -> Option<usize> {
    name.strip_prefix(PIPE_PREFIX)?.parse().ok()
}

/// A particle source at a fixed point inside a pipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    pub z: f64,
    pub r: f64,
    pub theta: f64,
    pub emitter_pattern: String,
    pub emitter_pattern_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverKind {
    #[serde(rename = "Ring type with thickness")]
    Ring,
    #[serde(rename = "Sphere type")]
    Sphere,
}

impl ReceiverKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ring => RING_RECEIVER_TYPE,
            Self::Sphere => SPHERE_RECEIVER_TYPE,
        }
    }
}

/// A detector inside (sphere) or at the end of (ring) a pipe.
///
/// Only the fields relevant to the receiver's shape are set; the rest are skipped when
/// written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    #[serde(rename = "type")]
    pub kind: ReceiverKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theta: Option<f64>,
    #[serde(
        rename = "countingType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub counting_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
}

impl Receiver {
    /// An absorbing ring receiver of the given thickness
    pub fn ring(index: usize, z: f64, thickness: f64) -> Self {
        Self {
            kind: ReceiverKind::Ring,
            name: Self::display_name(index, ReceiverKind::Ring),
            radius: None,
            z,
            r: None,
            theta: None,
            counting_type: Some(ABSORBING_COUNTING_TYPE),
            thickness: Some(thickness),
        }
    }

    pub fn sphere(index: usize, z: f64, r: f64, theta: f64, radius: f64) -> Self {
        Self {
            kind: ReceiverKind::Sphere,
            name: Self::display_name(index, ReceiverKind::Sphere),
            radius: Some(radius),
            z,
            r: Some(r),
            theta: Some(theta),
            counting_type: None,
            thickness: None,
        }
    }

    /// Receiver names carry the 1-based global index and the type tag, e.g. `#3-Sphere type`
    pub fn display_name(index: usize, kind: ReceiverKind) -> String {
        format!("#{index}-{}", kind.tag())
    }
}

/// A cylindrical pipe segment, identified by its slot
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pub slot: usize,
    pub length: f64,
    pub radius: f64,
    pub depth: usize,
    pub flow: f64,
    pub left_connections: Vec<String>,
    pub right_connections: Vec<String>,
    pub emitters: Vec<Emitter>,
    pub receivers: Vec<Receiver>,
}

impl Pipe {
    pub fn new(slot: usize, depth: usize, length: f64, radius: f64) -> Self {
        Self {
            slot,
            length,
            radius,
            depth,
            flow: 0.0,
            left_connections: vec![],
            right_connections: vec![],
            emitters: vec![],
            receivers: vec![],
        }
    }

    pub fn name(&self) -> String {
        pipe_name(self.slot)
    }

    pub fn is_root(&self) -> bool {
        self.left_connections.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sink {
    pub name: String,
    pub left_connections: Vec<String>,
}

// The on-disk shape of a pipe. particle_count is always written as 0; the simulator
// reads emitters for particles.
#[derive(Debug, Serialize, Deserialize)]
struct PipeEntry {
    length: f64,
    radius: f64,
    #[serde(default)]
    particle_count: u64,
    #[serde(default)]
    left_connections: Vec<String>,
    #[serde(default)]
    right_connections: Vec<String>,
    #[serde(default)]
    flow: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    emitters: Vec<Emitter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    receivers: Vec<Receiver>,
}

impl From<&Pipe> for PipeEntry {
    fn from(pipe: &Pipe) -> Self {
        Self {
            length: pipe.length,
            radius: pipe.radius,
            particle_count: 0,
            left_connections: pipe.left_connections.clone(),
            right_connections: pipe.right_connections.clone(),
            flow: pipe.flow,
            emitters: pipe.emitters.clone(),
            receivers: pipe.receivers.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SinkEntry {
    #[serde(default)]
    left_connections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NetworkDocument {
    pipes: serde_yaml::Mapping,
    #[serde(default)]
    sinks: serde_yaml::Mapping,
    #[serde(default)]
    flow: f64,
}

/// The full generated network: pipes in slot order, sinks, and the global flow.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pipes: Vec<Pipe>,
    sinks: Vec<Sink>,
    flow: f64,
    positions: FxHashMap<String, usize>,
    receiver_counter: usize,
}

impl Network {
    pub fn new(flow: f64) -> Self {
        Self {
            flow,
            ..Default::default()
        }
    }

    /// Append a pipe, returning its position
    pub fn add_pipe(&mut self, pipe: Pipe) -> usize {
        let position = self.pipes.len();
        self.positions.insert(pipe.name(), position);
        self.pipes.push(pipe);
        position
    }

    /// Link parent and child (by position) with a left/right connection pair
    pub fn connect(&mut self, parent: usize, child: usize) {
        let parent_name = self.pipes[parent].name();
        let child_name = self.pipes[child].name();
        self.pipes[child].left_connections.push(parent_name);
        self.pipes[parent].right_connections.push(child_name);
    }

    /// Append a sink after the pipe at `position`, returning the sink name
    pub fn add_sink(&mut self, position: usize) -> String {
        let name = sink_name(self.sinks.len() + 1);
        let pipe = &mut self.pipes[position];
        pipe.right_connections.push(name.clone());
        self.sinks.push(Sink {
            name: name.clone(),
            left_connections: vec![pipe.name()],
        });
        name
    }

    /// Next 1-based receiver index. Numbering is global across the network.
    pub fn next_receiver_index(&mut self) -> usize {
        self.receiver_counter += 1;
        self.receiver_counter
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn pipes_mut(&mut self) -> &mut [Pipe] {
        &mut self.pipes
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    pub fn flow(&self) -> f64 {
        self.flow
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn pipe(&self, name: &str) -> Option<&Pipe> {
        self.position_of(name).map(|p| &self.pipes[p])
    }

    /// Position of the root pipe, the one pipe without a left connection
    pub fn root_position(&self) -> Option<usize> {
        self.pipes.iter().position(|p| p.is_root())
    }

    /// Positions of the pipes connected to the right of the pipe at `position`, skipping sinks
    pub fn child_positions(&self, position: usize) -> Vec<usize> {
        self.pipes[position]
            .right_connections
            .iter()
            .filter_map(|name| self.position_of(name))
            .collect()
    }

    pub fn receiver_count(&self) -> usize {
        self.pipes.iter().map(|p| p.receivers.len()).sum()
    }

    pub fn emitter_count(&self) -> usize {
        self.pipes.iter().map(|p| p.emitters.len()).sum()
    }

    /// Reorder the pipes by slot, keeping the name index consistent
    pub fn sort_by_slot(&mut self) {
        self.pipes.sort_by_key(|p| p.slot);
        self.positions = self
            .pipes
            .iter()
            .enumerate()
            .map(|(pos, p)| (p.name(), pos))
            .collect();
    }

    /// Set every pipe's depth by breadth-first traversal from the root
    pub fn assign_depths(&mut self) -> Result<(), NetworkError> {
        let root = self.root_position().ok_or(NetworkError::Empty)?;
        self.pipes[root].depth = 0;
        let mut queue = VecDeque::from([root]);
        let mut visited = FxHashSet::default();
        visited.insert(root);
        while let Some(parent) = queue.pop_front() {
            let depth = self.pipes[parent].depth + 1;
            for child in self.child_positions(parent) {
                if !visited.insert(child) {
                    return Err(NetworkError::NotATree(format!(
                        "{} is reachable twice",
                        self.pipes[child].name()
                    )));
                }
                self.pipes[child].depth = depth;
                queue.push_back(child);
            }
        }
        Ok(())
    }

    /// Check the tree invariants: one root, one parent per non-root pipe with matching
    /// connections on both sides, unique slots, every pipe reachable from the root, and
    /// leaves terminated by at most one sink.
    pub fn validate_tree(&self) -> Result<(), NetworkError> {
        let root = self.root_position().ok_or(NetworkError::Empty)?;
        let sink_names: FxHashSet<&str> = self.sinks.iter().map(|s| s.name.as_str()).collect();
        let mut slots = FxHashSet::default();
        for pipe in self.pipes.iter() {
            let name = pipe.name();
            if !slots.insert(pipe.slot) {
                return Err(NetworkError::NotATree(format!("slot {} is reused", pipe.slot)));
            }
            match pipe.left_connections.as_slice() {
                [] if pipe.slot != self.pipes[root].slot => {
                    return Err(NetworkError::NotATree(format!("{name} is a second root")));
                }
                [] => (),
                [parent] => {
                    let parent_pipe = self
                        .pipe(parent)
                        .ok_or_else(|| NetworkError::MissingPipe(parent.clone()))?;
                    if !parent_pipe.right_connections.contains(&name) {
                        return Err(NetworkError::NotATree(format!(
                            "{parent} does not list {name} as a child"
                        )));
                    }
                }
                _ => {
                    return Err(NetworkError::NotATree(format!(
                        "{name} has more than one parent"
                    )));
                }
            }
            let n_sinks = pipe
                .right_connections
                .iter()
                .filter(|c| sink_names.contains(c.as_str()))
                .count();
            if n_sinks > 0 && pipe.right_connections.len() != 1 {
                return Err(NetworkError::NotATree(format!(
                    "{name} mixes a sink with other connections"
                )));
            }
            for child in pipe.right_connections.iter() {
                if !sink_names.contains(child.as_str()) && self.pipe(child).is_none() {
                    return Err(NetworkError::MissingPipe(child.clone()));
                }
            }
        }

        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([root]);
        visited.insert(root);
        while let Some(parent) = queue.pop_front() {
            for child in self.child_positions(parent) {
                if !visited.insert(child) {
                    return Err(NetworkError::NotATree(format!(
                        "{} is reachable twice",
                        self.pipes[child].name()
                    )));
                }
                queue.push_back(child);
            }
        }
        if visited.len() != self.pipes.len() {
            return Err(NetworkError::NotATree(format!(
                "{} pipes are unreachable from the root",
                self.pipes.len() - visited.len()
            )));
        }
        Ok(())
    }

    pub fn to_yaml_string(&self) -> Result<String, NetworkError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load a network document written by this generator. Depths are recomputed from the
    /// connections. Pipes must be named `pipeN`; any other name is `BadPipeName`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, NetworkError> {
        let document: NetworkDocument = serde_yaml::from_str(yaml)?;
        let mut network = Network::new(document.flow);
        for (key, value) in document.pipes {
            let name = key.as_str().unwrap_or_default().to_string();
            let slot = parse_pipe_name(&name).ok_or(NetworkError::BadPipeName(name))?;
            let entry: PipeEntry = serde_yaml::from_value(value)?;
            let mut pipe = Pipe::new(slot, 0, entry.length, entry.radius);
            pipe.flow = entry.flow;
            pipe.left_connections = entry.left_connections;
            pipe.right_connections = entry.right_connections;
            pipe.emitters = entry.emitters;
            pipe.receivers = entry.receivers;
            network.add_pipe(pipe);
        }
        for (key, value) in document.sinks {
            let entry: SinkEntry = serde_yaml::from_value(value)?;
            network.sinks.push(Sink {
                name: key.as_str().unwrap_or_default().to_string(),
                left_connections: entry.left_connections,
            });
        }
        network.receiver_counter = network.receiver_count();
        network.assign_depths()?;
        Ok(network)
    }
}

struct PipeMap<'a>(&'a [Pipe]);

impl Serialize for PipeMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for pipe in self.0 {
            map.serialize_entry(&pipe.name(), &PipeEntry::from(pipe))?;
        }
        map.end()
    }
}

struct SinkMap<'a>(&'a [Sink]);

impl Serialize for SinkMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for sink in self.0 {
            map.serialize_entry(
                &sink.name,
                &SinkEntry {
                    left_connections: sink.left_connections.clone(),
                },
            )?;
        }
        map.end()
    }
}

// Written by hand so pipes keep slot order instead of whatever order a map type picks
impl Serialize for Network {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut document = serializer.serialize_struct("Network", 3)?;
        document.serialize_field("pipes", &PipeMap(&self.pipes))?;
        document.serialize_field("sinks", &SinkMap(&self.sinks))?;
        document.serialize_field("flow", &self.flow)?;
        document.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_pipe_network() -> Network {
        let mut network = Network::new(0.0002);
        let root = network.add_pipe(Pipe::new(0, 0, 0.003, 0.0002));
        let left = network.add_pipe(Pipe::new(1, 1, 0.004, 0.0003));
        let right = network.add_pipe(Pipe::new(2, 1, 0.002, 0.0001));
        network.connect(root, left);
        network.connect(root, right);
        network
    }

    #[test]
    fn test_names() {
        assert_eq!(pipe_name(12), "pipe12");
        assert_eq!(sink_name(3), "sink3");
        assert_eq!(parse_pipe_name("pipe597"), Some(597));
        assert_eq!(parse_pipe_name("sink1"), None);
        assert_eq!(
            Receiver::display_name(4, ReceiverKind::Ring),
            "#4-Ring type with thickness"
        );
    }

    #[test]
    fn test_connect_and_sinks() {
        let mut network = three_pipe_network();
        assert_eq!(network.child_positions(0), vec![1, 2]);
        assert_eq!(network.pipes()[1].left_connections, vec!["pipe0"]);
        let sink = network.add_sink(1);
        assert_eq!(sink, "sink1");
        assert_eq!(network.pipes()[1].right_connections, vec!["sink1"]);
        assert_eq!(network.sinks()[0].left_connections, vec!["pipe1"]);
        assert!(network.validate_tree().is_ok());
    }

    #[test]
    fn test_receiver_numbering_is_global() {
        let mut network = three_pipe_network();
        assert_eq!(network.next_receiver_index(), 1);
        assert_eq!(network.next_receiver_index(), 2);
    }

    #[test]
    fn test_validate_rejects_second_parent() {
        let mut network = three_pipe_network();
        network.pipes_mut()[2].left_connections.push(String::from("pipe1"));
        assert!(matches!(
            network.validate_tree(),
            Err(NetworkError::NotATree(_))
        ));
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let mut network = three_pipe_network();
        let extra = network.add_pipe(Pipe::new(5, 2, 0.003, 0.0002));
        let other = network.add_pipe(Pipe::new(6, 2, 0.003, 0.0002));
        network.connect(extra, other);
        network.connect(other, extra);
        assert!(network.validate_tree().is_err());
    }

    #[test]
    fn test_yaml_round_trip_keeps_order() {
        let mut network = three_pipe_network();
        let index = network.next_receiver_index();
        network.pipes_mut()[2]
            .receivers
            .push(Receiver::ring(index, 0.0015, 0.0005));
        network.add_sink(1);
        network.add_sink(2);
        let yaml = network.to_yaml_string().unwrap();
        let pipe0 = yaml.find("pipe0:").unwrap();
        let pipe1 = yaml.find("pipe1:").unwrap();
        let pipe2 = yaml.find("pipe2:").unwrap();
        assert!(pipe0 < pipe1 && pipe1 < pipe2);
        assert!(yaml.contains("countingType: 0"));
        assert!(yaml.contains("particle_count: 0"));
        assert!(!yaml.contains("emitters"));

        let loaded = Network::from_yaml_str(&yaml).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.sinks().len(), 2);
        assert_eq!(loaded.pipes()[1].depth, 1);
        assert_eq!(loaded.pipes()[2].receivers, network.pipes()[2].receivers);
        assert!(loaded.validate_tree().is_ok());
    }

    #[test]
    fn test_rejects_foreign_pipe_names() {
        let yaml = three_pipe_network()
            .to_yaml_string()
            .unwrap()
            .replace("pipe2:", "segment2:");
        assert!(matches!(
            Network::from_yaml_str(&yaml),
            Err(NetworkError::BadPipeName(name)) if name == "segment2"
        ));
    }
}
