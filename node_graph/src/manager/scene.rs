//! Scene membership and the active scene.

use node_rules::{NodeId, NodeState};
use std::time::Duration;
use tracing::{debug, info};

use super::{GraphManager, ScheduledTask, TimerId};
use crate::error::{GraphError, GraphResult};
use crate::events::GraphEvent;

impl GraphManager {
    /// The scene currently in play.
    pub fn active_scene(&self) -> Option<&NodeId> {
        self.active_scene.as_ref()
    }

    /// Switch the active scene, or clear it with `None`.
    ///
    /// The old scene's active children go inactive; the new scene becomes
    /// active and wakes its inactive children.
    pub fn set_active_scene(&mut self, scene: Option<&str>) -> GraphResult<()> {
        let next = match scene {
            Some(id) => Some(self.require_scene(id)?),
            None => None,
        };
        if next == self.active_scene {
            return Ok(());
        }

        let previous = self.active_scene.take();
        if let Some(previous) = &previous {
            self.deactivate_scene(previous);
        }
        self.active_scene = next.clone();
        if let Some(next) = &next {
            self.activate_scene(next);
        }

        let description = match next.as_ref().and_then(|id| self.nodes.get(id.as_str())) {
            Some(scene) => format!("Scene changed to {}", scene.name()),
            None => "Scene cleared".to_string(),
        };
        info!(?previous, current = ?next, "active scene changed");
        self.emit(GraphEvent::SceneChanged {
            previous,
            current: next,
        });
        self.emit(GraphEvent::SystemStateChanged { description });
        Ok(())
    }

    /// Switch to `scene` once `delay` has elapsed on the manager clock.
    pub fn transition_to_scene(&mut self, scene: &str, delay: Duration) -> GraphResult<TimerId> {
        let scene = self.require_scene(scene)?;
        debug!(scene = %scene, ?delay, "scene transition scheduled");
        self.scheduler
            .schedule(delay, ScheduledTask::SceneTransition { scene })
            .ok_or(GraphError::InvalidDelay(delay.as_secs_f32()))
    }

    /// Make `child` part of `scene`. Returns false if it already was.
    pub fn add_node_to_scene(&mut self, scene: &str, child: &str) -> GraphResult<bool> {
        let scene_id = self.require_scene(scene)?;
        let Some(child_id) = self.nodes.get(child).map(|n| n.id().clone()) else {
            return Err(GraphError::NodeNotFound(child.into()));
        };
        if scene_id == child_id {
            return Err(GraphError::SelfLoop(child_id));
        }

        let Some(data) = self.nodes.get_mut(scene).and_then(|n| n.scene_mut()) else {
            return Err(GraphError::NotAScene(scene_id));
        };
        if !data.add_child(child_id.clone()) {
            return Ok(false);
        }
        let wake = data.is_active_scene();

        debug!(scene = %scene_id, child = %child_id, "node added to scene");
        if wake && self.nodes.get(child).map(|n| n.state()) == Some(NodeState::Inactive) {
            self.set_node_state(child, NodeState::Active);
        }
        Ok(true)
    }

    pub fn remove_node_from_scene(&mut self, scene: &str, child: &str) -> bool {
        self.nodes
            .get_mut(scene)
            .and_then(|n| n.scene_mut())
            .is_some_and(|data| data.remove_child(child))
    }

    /// Children of `scene`; empty if it is not a scene.
    pub fn scene_children(&self, scene: &str) -> Vec<NodeId> {
        self.nodes
            .get(scene)
            .and_then(|n| n.scene())
            .map(|data| data.children().to_vec())
            .unwrap_or_default()
    }

    /// Scenes listing `child` among their children.
    pub fn scenes_containing(&self, child: &str) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| {
                n.scene()
                    .is_some_and(|data| data.children().iter().any(|c| c.as_str() == child))
            })
            .map(|n| n.id().clone())
            .collect()
    }

    fn require_scene(&self, id: &str) -> GraphResult<NodeId> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.into()))?;
        if node.scene().is_none() {
            return Err(GraphError::NotAScene(node.id().clone()));
        }
        Ok(node.id().clone())
    }

    fn activate_scene(&mut self, scene: &NodeId) {
        if let Some(data) = self.nodes.get_mut(scene).and_then(|n| n.scene_mut()) {
            data.set_active_scene(true);
        }
        self.set_node_state(scene, NodeState::Active);

        for child in self.scene_children(scene) {
            if self.nodes.get(&child).map(|n| n.state()) == Some(NodeState::Inactive) {
                self.set_node_state(&child, NodeState::Active);
            }
        }
    }

    fn deactivate_scene(&mut self, scene: &NodeId) {
        if let Some(data) = self.nodes.get_mut(scene).and_then(|n| n.scene_mut()) {
            data.set_active_scene(false);
        }

        for child in self.scene_children(scene) {
            if self.nodes.get(&child).map(|n| n.state()) == Some(NodeState::Active) {
                self.set_node_state(&child, NodeState::Inactive);
            }
        }
    }
}
