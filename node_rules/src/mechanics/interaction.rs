//! Interaction and emotion data passed into nodes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entities::Vec3;

/// How the player interacted with a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InteractionKind {
    #[default]
    Click,
    Hold,
    Drag,
    Hover,
    MultiTouch,
    Gesture,
}

/// A single interaction with a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InteractionData {
    pub kind: InteractionKind,
    /// Who interacted, if known.
    pub instigator: Option<String>,
    /// Where the instigator stood, used by range validation.
    pub instigator_position: Option<Vec3>,
    /// Where the interaction landed.
    pub location: Vec3,
    /// Seconds the interaction lasted (holds, drags).
    pub duration: f32,
    /// Free-form annotations, including propagation provenance.
    pub context: IndexMap<String, String>,
}

impl InteractionData {
    pub fn new(kind: InteractionKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_instigator(mut self, instigator: impl Into<String>, position: Vec3) -> Self {
        self.instigator = Some(instigator.into());
        self.instigator_position = Some(position);
        self
    }

    pub fn at(mut self, location: Vec3) -> Self {
        self.location = location;
        self
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = seconds.max(0.0);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }
}

/// Basic emotions attached to narrative nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EmotionType {
    #[default]
    Neutral,
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Trust,
    Anticipation,
}

/// Emotional colouring of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionData {
    pub primary: EmotionType,
    pub secondary: EmotionType,
    /// Intensity from 0.0 to 1.0.
    pub intensity: f32,
    /// How much the secondary emotion blends in, 0.0 to 1.0.
    pub blend_factor: f32,
}

impl Default for EmotionData {
    fn default() -> Self {
        Self {
            primary: EmotionType::Neutral,
            secondary: EmotionType::Neutral,
            intensity: 0.5,
            blend_factor: 0.0,
        }
    }
}

impl EmotionData {
    pub fn new(primary: EmotionType, intensity: f32) -> Self {
        Self {
            primary,
            intensity: intensity.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    pub fn with_secondary(mut self, secondary: EmotionType, blend_factor: f32) -> Self {
        self.secondary = secondary;
        self.blend_factor = blend_factor.clamp(0.0, 1.0);
        self
    }
}
