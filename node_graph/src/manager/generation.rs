//! Queued node and connection generation.
//!
//! Specs are queued up front and drained one node spec and one relation spec
//! per generation tick, so a large batch spreads over several ticks.

use node_rules::{Descriptors, NodeId, NodeSpec, RelationSpec};
use tracing::{debug, info, warn};

use super::GraphManager;

/// What one generation step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub created_node: Option<NodeId>,
    pub created_connection: bool,
    /// The node spec was dropped because the active scene is full.
    pub dropped_node: Option<NodeId>,
    /// The relation spec went back on the queue because an endpoint is missing.
    pub requeued_relation: bool,
}

impl GenerationReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

impl GraphManager {
    pub fn queue_node_generation(&mut self, spec: NodeSpec) {
        debug!(node = %spec.id, "node generation queued");
        self.node_queue.push_back(spec);
    }

    pub fn queue_connection_generation(&mut self, spec: RelationSpec) {
        debug!(source = %spec.source, target = %spec.target, "connection generation queued");
        self.relation_queue.push_back(spec);
    }

    /// Queue everything a descriptor file described.
    pub fn queue_descriptors(&mut self, descriptors: Descriptors) {
        info!(
            nodes = descriptors.nodes.len(),
            relations = descriptors.relations.len(),
            "descriptors queued"
        );
        self.node_queue.extend(descriptors.nodes);
        self.relation_queue.extend(descriptors.relations);
    }

    pub fn pending_node_generations(&self) -> usize {
        self.node_queue.len()
    }

    pub fn pending_connection_generations(&self) -> usize {
        self.relation_queue.len()
    }

    pub fn clear_generation_queues(&mut self) {
        self.node_queue.clear();
        self.relation_queue.clear();
    }

    /// Run one generation step.
    pub fn process_generation_queue(&mut self) -> GenerationReport {
        let mut report = GenerationReport::default();

        if let Some(spec) = self.node_queue.pop_front() {
            self.generate_node(spec, &mut report);
        }

        if let Some(spec) = self.relation_queue.pop_front() {
            let ready = self.nodes.contains_key(spec.source.as_str())
                && self.nodes.contains_key(spec.target.as_str());
            if ready {
                report.created_connection = self.create_connection(&spec).is_ok();
            } else {
                debug!(source = %spec.source, target = %spec.target, "endpoint missing, requeueing relation");
                self.relation_queue.push_back(spec);
                report.requeued_relation = true;
            }
        }

        report
    }

    fn generate_node(&mut self, spec: NodeSpec, report: &mut GenerationReport) {
        if let Some(scene) = self.active_scene.clone() {
            let population = self.scene_children(&scene).len();
            if population >= self.config.max_nodes_per_scene {
                warn!(node = %spec.id, scene = %scene, population, "active scene is full, dropping node");
                report.dropped_node = Some(spec.id);
                return;
            }
        }

        let node = match self.spawn_node(spec.class, &spec) {
            Ok(node) => node,
            Err(err) => {
                warn!(node = %spec.id, error = %err, "failed to generate node");
                return;
            }
        };
        let id = match self.register_node(node) {
            Ok(id) => id,
            Err(err) => {
                warn!(node = %spec.id, error = %err, "failed to register generated node");
                return;
            }
        };

        if let Some(scene) = self.active_scene.clone() {
            if let Err(err) = self.add_node_to_scene(&scene, &id) {
                warn!(node = %id, error = %err, "failed to add generated node to scene");
            }
        }

        for relation in &spec.relations {
            // Relations naming the new node as target keep their source;
            // any other relation starts at the new node.
            let mut relation = relation.clone();
            if relation.target != id {
                relation.source = id.clone();
            }
            if let Err(err) = self.create_connection(&relation) {
                debug!(node = %id, error = %err, "skipped bundled relation");
            }
        }

        report.created_node = Some(id);
    }
}
