//! Simulation entities
//!
//! Every simulated object is an [`Entity`]: a physics handle plus the visual
//! state the renderer needs. Kinds are a closed set.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::physics::BodyHandle;
use crate::config::Rgb;

/// Unique within a run; allocated in creation order and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity kinds across all scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Ball,
    Grain,
    Spark,
    Pizza,
    WreckingBall,
    Planet,
    StaticStructure,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Ball => "ball",
            EntityKind::Grain => "grain",
            EntityKind::Spark => "spark",
            EntityKind::Pizza => "pizza",
            EntityKind::WreckingBall => "wrecking_ball",
            EntityKind::Planet => "planet",
            EntityKind::StaticStructure => "structure",
        }
    }
}

/// Removal is a one-way walk through these states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Alive,
    PendingRemoval,
    Removed,
}

/// Drawable outline of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VisualShape {
    Circle { radius: f32 },
    /// Segment endpoints relative to the entity position
    Line { a: Vec2, b: Vec2, width: f32 },
    /// Square sprite of the given side length
    Sprite { size: f32 },
}

/// Opaque sprite identifier, resolved by the renderer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteRef(pub String);

/// What the renderer sees of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualState {
    pub position: Vec2,
    pub rotation: f32,
    pub color: Rgb,
    pub shape: VisualShape,
    pub sprite: Option<SpriteRef>,
}

impl VisualState {
    pub fn circle(position: Vec2, radius: f32, color: Rgb) -> Self {
        Self {
            position,
            rotation: 0.0,
            color,
            shape: VisualShape::Circle { radius },
            sprite: None,
        }
    }
}

/// A simulated object, owned by the entity pool
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub(crate) handle: BodyHandle,
    pub visual: VisualState,
    pub(crate) lifecycle: Lifecycle,
    pub age_ticks: u64,
    /// Ticks this entity lives before it removes itself (sparks)
    pub lifespan: Option<u32>,
    /// Size at spawn; the visual radius may shrink from here
    pub initial_radius: f32,
}

impl Entity {
    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_alive(&self) -> bool {
        self.lifecycle == Lifecycle::Alive
    }

    /// Visual radius for circles, half the size for sprites
    pub fn radius(&self) -> f32 {
        match self.visual.shape {
            VisualShape::Circle { radius } => radius,
            VisualShape::Sprite { size } => size * 0.5,
            VisualShape::Line { width, .. } => width * 0.5,
        }
    }
}
