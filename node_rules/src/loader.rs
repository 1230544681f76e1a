//! JSON descriptor loading.
//!
//! Unknown enum strings fall back to a per-field default. Incomplete entries are
//! skipped with a warning instead of failing the whole document.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::entities::{NodeId, NodeSpec, NodeState, NodeType, RelationSpec, Vec3};
use crate::mechanics::{CapabilityConfig, CapabilityKind, CapabilitySpec, RelationType};

/// Errors raised while loading a descriptor document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("descriptor root must be a JSON object")]
    NotAnObject,

    #[error("descriptor contains no valid nodes")]
    NoNodes,

    #[error("failed to read descriptor file: {0}")]
    Io(#[from] std::io::Error),
}

/// Node and relation specs read from one descriptor document.
#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    pub nodes: Vec<NodeSpec>,
    pub relations: Vec<RelationSpec>,
}

/// Parse a `{ "nodes": [...], "relations": [...] }` document.
///
/// Fails when the JSON is malformed or no node survives validation.
pub fn load_descriptors(json: &str) -> Result<Descriptors, LoadError> {
    let root: Value = serde_json::from_str(json)?;
    let root = root.as_object().ok_or(LoadError::NotAnObject)?;

    let mut descriptors = Descriptors::default();

    for value in array_field(root, "nodes") {
        let Some(object) = value.as_object() else {
            continue;
        };
        match parse_node(object) {
            Some(spec) => {
                debug!(node = %spec.id, "parsed node descriptor");
                descriptors.nodes.push(spec);
            }
            None => warn!("skipping node descriptor without id or name"),
        }
    }

    for value in array_field(root, "relations") {
        let Some(object) = value.as_object() else {
            continue;
        };
        match parse_relation(object) {
            Some(relation) => {
                debug!(source = %relation.source, target = %relation.target, "parsed relation descriptor");
                descriptors.relations.push(relation);
            }
            None => warn!("skipping relation descriptor without source or target"),
        }
    }

    if descriptors.nodes.is_empty() {
        return Err(LoadError::NoNodes);
    }
    Ok(descriptors)
}

/// Read and parse a descriptor file.
pub fn load_descriptor_file(path: impl AsRef<std::path::Path>) -> Result<Descriptors, LoadError> {
    let json = std::fs::read_to_string(path)?;
    load_descriptors(&json)
}

fn array_field<'a>(object: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter())
        .into_iter()
        .flatten()
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> &'a str {
    object.get(key).and_then(Value::as_str).unwrap_or("")
}

fn parse_node(object: &Map<String, Value>) -> Option<NodeSpec> {
    let id = string_field(object, "id");
    let name = string_field(object, "name");
    if id.is_empty() || name.is_empty() {
        return None;
    }

    let node_type = NodeType::parse_lenient(string_field(object, "type"));
    let mut spec = NodeSpec::new(NodeId::from(id), name, node_type)
        .with_state(NodeState::parse_lenient(string_field(object, "state")));

    if let Some(location) = object
        .get("transform")
        .and_then(|t| t.get("location"))
        .and_then(Value::as_object)
    {
        spec = spec.with_position(parse_location(location));
    }

    for value in array_field(object, "capabilities") {
        let Some(capability) = value.as_object() else {
            continue;
        };
        match parse_capability(capability) {
            Some(capability) => spec = spec.with_capability(capability),
            None => warn!(node = id, "skipping capability with unknown type"),
        }
    }

    Some(spec)
}

fn parse_location(object: &Map<String, Value>) -> Vec3 {
    let axis = |key: &str| object.get(key).and_then(Value::as_f64).unwrap_or(0.0) as f32;
    Vec3::new(axis("x"), axis("y"), axis("z"))
}

fn parse_relation(object: &Map<String, Value>) -> Option<RelationSpec> {
    let source = string_field(object, "source_id");
    let target = string_field(object, "target_id");
    if source.is_empty() || target.is_empty() {
        return None;
    }

    let relation = RelationType::parse_lenient(string_field(object, "relation_type"));
    let weight = object.get("weight").and_then(Value::as_f64).unwrap_or(1.0) as f32;
    let bidirectional = object
        .get("bidirectional")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Some(
        RelationSpec::new(source, target, relation)
            .with_weight(weight)
            .with_bidirectional(bidirectional),
    )
}

fn parse_capability(object: &Map<String, Value>) -> Option<CapabilitySpec> {
    let kind = CapabilityKind::parse(string_field(object, "type"))?;
    let config = match object.get("config") {
        Some(config) if config.is_object() => parse_capability_config(kind, config.clone()),
        _ => CapabilityConfig::default_for(kind),
    };
    Some(CapabilitySpec::new(config))
}

fn parse_capability_config(kind: CapabilityKind, config: Value) -> CapabilityConfig {
    let parsed = match kind {
        CapabilityKind::Spatial => serde_json::from_value(config).map(CapabilityConfig::Spatial),
        CapabilityKind::State => serde_json::from_value(config).map(CapabilityConfig::State),
        CapabilityKind::Interactive => {
            serde_json::from_value(config).map(CapabilityConfig::Interactive)
        }
        CapabilityKind::Narrative => {
            serde_json::from_value(config).map(CapabilityConfig::Narrative)
        }
        CapabilityKind::System => serde_json::from_value(config).map(CapabilityConfig::System),
        CapabilityKind::Numerical => {
            serde_json::from_value(config).map(CapabilityConfig::Numerical)
        }
    };

    parsed.unwrap_or_else(|err| {
        warn!(kind = kind.key(), error = %err, "invalid capability config, using defaults");
        CapabilityConfig::default_for(kind)
    })
}
