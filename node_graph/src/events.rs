//! Notifications emitted by the graph manager.
//!
//! Observers subscribe explicitly and receive every event synchronously, in
//! subscription order, right after the change that caused it.

use node_rules::{ConnectionId, InteractionData, NodeId, NodeState, Vec3};
use std::cell::RefCell;
use std::rc::Rc;

/// Something that happened in the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeRegistered {
        node: NodeId,
    },
    NodeUnregistered {
        node: NodeId,
    },
    NodeStateChanged {
        node: NodeId,
        old: NodeState,
        new: NodeState,
    },
    NodeInteracted {
        node: NodeId,
        interaction: InteractionData,
    },
    StoryTriggered {
        node: NodeId,
        fragment: String,
        event_ids: Vec<String>,
    },
    ConnectionCreated {
        connection: ConnectionId,
    },
    ConnectionRemoved {
        connection: ConnectionId,
    },
    ConnectionActivated {
        connection: ConnectionId,
    },
    ConnectionDeactivated {
        connection: ConnectionId,
    },
    ConnectionPulsed {
        connection: ConnectionId,
    },
    /// Text produced by a capability (dialogue, observations, clues).
    CapabilityMessage {
        node: NodeId,
        capability: String,
        message: String,
    },
    /// A spatial capability moved the interacting instigator.
    InstigatorTeleported {
        node: NodeId,
        instigator: String,
        destination: Vec3,
    },
    SceneChanged {
        previous: Option<NodeId>,
        current: Option<NodeId>,
    },
    SystemStateChanged {
        description: String,
    },
}

impl GraphEvent {
    /// The node this event is primarily about, if any.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            GraphEvent::NodeRegistered { node }
            | GraphEvent::NodeUnregistered { node }
            | GraphEvent::NodeStateChanged { node, .. }
            | GraphEvent::NodeInteracted { node, .. }
            | GraphEvent::StoryTriggered { node, .. }
            | GraphEvent::CapabilityMessage { node, .. }
            | GraphEvent::InstigatorTeleported { node, .. } => Some(node),
            _ => None,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&GraphEvent)>;

/// Ordered list of observers.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<(ObserverId, Observer)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&GraphEvent) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn emit(&mut self, event: GraphEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// An observer that stores every event it sees.
///
/// Clones share the same buffer, so one clone can be subscribed while another
/// is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<GraphEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A closure suitable for [`EventBus::subscribe`].
    pub fn observer(&self) -> impl FnMut(&GraphEvent) + 'static {
        let events = Rc::clone(&self.events);
        move |event| events.borrow_mut().push(event.clone())
    }

    /// A copy of everything recorded so far.
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.borrow().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<GraphEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&GraphEvent) -> bool,
    {
        self.events.borrow().iter().filter(|e| predicate(e)).count()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}
