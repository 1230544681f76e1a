//! End-to-end behaviour of the graph manager.

use node_graph::{EventRecorder, GraphEvent, GraphManager};
use node_rules::{
    load_descriptors, CapabilityConfig, CapabilitySpec, GraphConfig, InteractionData,
    InteractionKind, NarrativeConfig, NodeClass, NodeId, NodeSpec, NodeState, NodeType,
    RelationSpec, RelationType, Tag, Vec3,
};
use std::collections::HashSet;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn manager() -> GraphManager {
    init_tracing();
    GraphManager::new(GraphConfig {
        spawn_seed: Some(1),
        ..Default::default()
    })
}

fn add(manager: &mut GraphManager, id: &str, node_type: NodeType, state: NodeState) -> NodeId {
    let spec = NodeSpec::new(id, id, node_type)
        .with_state(state)
        .with_position(Vec3::ZERO);
    manager.create_node(spec.class, &spec).unwrap().id().clone()
}

fn state_of(manager: &GraphManager, id: &str) -> NodeState {
    manager.get_node(id).unwrap().state()
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn completed_prerequisite_does_not_refire_but_fresh_completion_unlocks() {
    let mut manager = manager();
    add(&mut manager, "a", NodeType::Item, NodeState::Locked);
    add(&mut manager, "b", NodeType::Item, NodeState::Completed);
    manager
        .create_connection_between("b", "a", RelationType::Prerequisite)
        .unwrap();

    assert!(!manager.set_node_state("b", NodeState::Completed));
    assert_eq!(state_of(&manager, "a"), NodeState::Locked);

    add(&mut manager, "c", NodeType::Item, NodeState::Locked);
    add(&mut manager, "d", NodeType::Item, NodeState::Active);
    manager
        .create_connection_between("d", "c", RelationType::Prerequisite)
        .unwrap();

    assert!(manager.set_node_state("d", NodeState::Completed));
    assert_eq!(state_of(&manager, "c"), NodeState::Active);
}

#[test]
fn tag_lookup_returns_each_tagged_node_once() {
    let mut manager = manager();
    for i in 0..5 {
        let spec = NodeSpec::new(format!("tree{}", i), "Tree", NodeType::Item).with_tag("forest");
        manager.create_node(spec.class, &spec).unwrap();
    }
    add(&mut manager, "rock", NodeType::Item, NodeState::Inactive);

    let found: Vec<&str> = manager
        .nodes_by_tag(&Tag::new("forest"))
        .into_iter()
        .map(|n| n.id().as_str())
        .collect();
    let unique: HashSet<&str> = found.iter().copied().collect();

    assert_eq!(found.len(), 5);
    assert_eq!(unique.len(), 5);
    assert!(!unique.contains("rock"));
}

#[test]
fn full_scene_drops_generated_node() {
    let mut manager = GraphManager::new(GraphConfig {
        max_nodes_per_scene: 2,
        ..Default::default()
    });
    add(&mut manager, "room", NodeType::Scene, NodeState::Inactive);
    add(&mut manager, "x", NodeType::Item, NodeState::Inactive);
    add(&mut manager, "y", NodeType::Item, NodeState::Inactive);
    manager.add_node_to_scene("room", "x").unwrap();
    manager.add_node_to_scene("room", "y").unwrap();
    manager.set_active_scene(Some("room")).unwrap();

    manager.queue_node_generation(NodeSpec::new("z", "Z", NodeType::Item));
    let report = manager.process_generation_queue();

    assert_eq!(report.dropped_node, Some(NodeId::from("z")));
    assert!(manager.get_node("z").is_none());
    assert_eq!(manager.scene_children("room").len(), 2);
    assert_eq!(manager.pending_node_generations(), 0);
}

#[test]
fn relation_to_missing_node_is_retried() {
    let mut manager = manager();
    add(&mut manager, "source", NodeType::Item, NodeState::Inactive);
    manager.queue_connection_generation(RelationSpec::new("source", "later", RelationType::Trigger));

    let report = manager.process_generation_queue();
    assert!(report.requeued_relation);
    assert_eq!(manager.pending_connection_generations(), 1);
    assert_eq!(manager.connection_count(), 0);

    add(&mut manager, "later", NodeType::Item, NodeState::Inactive);
    let report = manager.process_generation_queue();
    assert!(report.created_connection);
    assert!(manager.get_connection("source", "later").is_some());
}

#[test]
fn mutual_connection_forwards_interaction_both_ways() {
    let mut manager = manager();
    let recorder = EventRecorder::new();
    manager.subscribe(recorder.observer());
    add(&mut manager, "x", NodeType::Trigger, NodeState::Inactive);
    add(&mut manager, "y", NodeType::Trigger, NodeState::Inactive);

    let id = manager
        .create_connection(&RelationSpec::new("x", "y", RelationType::Mutual).with_bidirectional(false))
        .unwrap();
    assert!(manager.connection(&id).unwrap().is_bidirectional());

    let reached = |recorder: &EventRecorder, node: &str| {
        recorder.count(|e| matches!(e, GraphEvent::NodeInteracted { node: n, .. } if n.as_str() == node))
    };

    assert!(manager.propagate_interaction(&id, "x", &InteractionData::default()));
    assert_eq!(reached(&recorder, "y"), 1);

    assert!(manager.propagate_interaction(&id, "y", &InteractionData::default()));
    assert_eq!(reached(&recorder, "x"), 1);
}

// =============================================================================
// PATHS
// =============================================================================

#[test]
fn find_path_edge_cases() {
    let mut manager = manager();
    add(&mut manager, "a", NodeType::Item, NodeState::Inactive);
    add(&mut manager, "b", NodeType::Item, NodeState::Inactive);
    add(&mut manager, "island", NodeType::Item, NodeState::Inactive);
    manager
        .create_connection_between("a", "b", RelationType::Sequence)
        .unwrap();

    assert!(manager.find_path("a", "a").is_empty());
    assert!(manager.find_path("a", "island").is_empty());
    assert_eq!(
        manager.find_path("a", "b"),
        vec![NodeId::from("a"), NodeId::from("b")]
    );
}

// =============================================================================
// WORKFLOWS
// =============================================================================

#[test]
fn puzzle_chain_from_descriptors() {
    let mut manager = manager();
    let descriptors = load_descriptors(
        r#"{
            "nodes": [
                {"id": "hall", "name": "Hall", "type": "scene", "state": "inactive"},
                {"id": "key", "name": "Key", "type": "item", "state": "active"},
                {"id": "door", "name": "Door", "type": "item", "state": "locked"},
                {"id": "vault", "name": "Vault", "type": "item", "state": "locked"}
            ],
            "relations": [
                {"source_id": "key", "target_id": "door", "relation_type": "dependency"},
                {"source_id": "door", "target_id": "vault", "relation_type": "sequence"}
            ]
        }"#,
    )
    .unwrap();
    manager.queue_descriptors(descriptors);

    // Four node ticks; relations are created alongside.
    manager.advance(Duration::from_millis(400));
    assert_eq!(manager.node_count(), 4);
    assert_eq!(manager.connection_count(), 2);
    assert_eq!(manager.get_node("hall").unwrap().class(), NodeClass::Scene);

    manager.interact("key", InteractionData::new(InteractionKind::Click));
    assert_eq!(state_of(&manager, "key"), NodeState::Completed);
    assert_eq!(state_of(&manager, "door"), NodeState::Active);

    manager.interact("door", InteractionData::new(InteractionKind::Click));
    assert_eq!(state_of(&manager, "door"), NodeState::Completed);
    assert_eq!(state_of(&manager, "vault"), NodeState::Active);
}

#[test]
fn narrative_capability_reveals_clues_and_events() {
    let mut manager = manager();
    let recorder = EventRecorder::new();
    manager.subscribe(recorder.observer());

    let narrative = NarrativeConfig {
        available_clues: vec!["A draft from the fireplace.".into()],
        triggerable_event_ids: vec!["secret_passage".into()],
        ..Default::default()
    };
    let spec = NodeSpec::new("diary", "Diary", NodeType::Item)
        .with_state(NodeState::Active)
        .with_position(Vec3::ZERO)
        .with_capability(CapabilitySpec::new(CapabilityConfig::Narrative(narrative)));
    manager.create_node(spec.class, &spec).unwrap();

    manager.interact("diary", InteractionData::default());

    assert_eq!(
        recorder.count(|e| matches!(e, GraphEvent::CapabilityMessage { .. })),
        1
    );
    assert_eq!(state_of(&manager, "diary"), NodeState::Active);

    // Clues exhausted: the next use raises the one-shot event.
    manager.interact("diary", InteractionData::default());
    assert!(recorder.events().iter().any(|e| matches!(
        e,
        GraphEvent::StoryTriggered { event_ids, .. } if event_ids == &vec!["secret_passage".to_string()]
    )));
    assert!(manager
        .get_node("diary")
        .unwrap()
        .trigger_event_ids()
        .contains(&"secret_passage".to_string()));
}

#[test]
fn unregistering_node_cancels_its_delayed_propagation() {
    let mut manager = manager();
    add(&mut manager, "a", NodeType::Item, NodeState::Inactive);
    add(&mut manager, "b", NodeType::Item, NodeState::Inactive);
    manager
        .create_connection(&RelationSpec::new("a", "b", RelationType::Trigger).with_activation_delay(1.0))
        .unwrap();

    manager.set_node_state("a", NodeState::Active);
    assert_eq!(manager.pending_timers(), 1);

    manager.unregister_node("a");
    assert_eq!(manager.pending_timers(), 0);

    manager.advance(Duration::from_secs(2));
    assert_eq!(state_of(&manager, "b"), NodeState::Inactive);
}

#[test]
fn observers_can_unsubscribe() {
    let mut manager = manager();
    let recorder = EventRecorder::new();
    let id = manager.subscribe(recorder.observer());

    add(&mut manager, "a", NodeType::Item, NodeState::Inactive);
    assert!(manager.unsubscribe(id));
    add(&mut manager, "b", NodeType::Item, NodeState::Inactive);

    assert_eq!(
        recorder.events(),
        vec![GraphEvent::NodeRegistered { node: "a".into() }]
    );
}

#[test]
fn config_from_toml_drives_manager() {
    let config = GraphConfig::from_toml_str(
        r#"
        max_nodes_per_scene = 3
        generation_interval_ms = 50
        spawn_seed = 9
        "#,
    )
    .unwrap();
    let mut manager = GraphManager::new(config);
    manager.queue_node_generation(NodeSpec::new("a", "A", NodeType::Item));

    manager.advance(Duration::from_millis(50));
    assert!(manager.get_node("a").is_some());
}
