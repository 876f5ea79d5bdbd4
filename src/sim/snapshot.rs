//! Frame snapshots
//!
//! A [`Frame`] is everything an external renderer needs for one tick: the
//! ordered list of drawable primitives plus background and HUD data. It is
//! rebuilt from scratch every tick and never references live state.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::clock::ClockState;
use super::entity::{EntityId, EntityKind, SpriteRef, VisualShape};
use super::pool::EntityPool;
use crate::config::Rgb;

/// Position and orientation of a primitive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
}

/// One drawable item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPrimitive {
    pub entity: EntityId,
    pub kind: EntityKind,
    pub shape: VisualShape,
    pub transform: Transform,
    pub color: Rgb,
    pub sprite: Option<SpriteRef>,
}

/// Solid color with an optional full-screen image on top
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub color: Rgb,
    pub sprite: Option<SpriteRef>,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            color: Rgb::BLACK,
            sprite: None,
        }
    }
}

/// Values a renderer may show as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hud {
    pub caption: Option<String>,
    /// Alive entities, static structure excluded
    pub live_entities: usize,
    pub paused: bool,
    pub finished: bool,
    /// Operator-adjustable rates by name
    pub rates: Vec<(String, f32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub tick: u64,
    pub clock_state: ClockState,
    pub background: Background,
    pub hud: Hud,
    pub primitives: Vec<RenderPrimitive>,
}

impl Frame {
    pub fn find(&self, id: EntityId) -> Option<&RenderPrimitive> {
        self.primitives.iter().find(|p| p.entity == id)
    }
}

/// Builds render lists from the entity pool
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshotBuilder {
    background: Background,
    caption: Option<String>,
}

impl FrameSnapshotBuilder {
    pub fn new(background: Background, caption: Option<String>) -> Self {
        Self {
            background,
            caption,
        }
    }

    /// Alive entities only, in creation order
    pub fn build(&self, pool: &EntityPool) -> Vec<RenderPrimitive> {
        pool.alive()
            .map(|e| RenderPrimitive {
                entity: e.id,
                kind: e.kind,
                shape: e.visual.shape,
                transform: Transform {
                    position: e.visual.position,
                    rotation: e.visual.rotation,
                },
                color: e.visual.color,
                sprite: e.visual.sprite.clone(),
            })
            .collect()
    }

    pub fn frame<'a>(
        &self,
        pool: &EntityPool,
        tick: u64,
        clock_state: ClockState,
        rates: impl Iterator<Item = (&'a str, f32)>,
    ) -> Frame {
        let primitives = self.build(pool);
        let live_entities = primitives
            .iter()
            .filter(|p| p.kind != EntityKind::StaticStructure)
            .count();
        Frame {
            tick,
            clock_state,
            background: self.background.clone(),
            hud: Hud {
                caption: self.caption.clone(),
                live_entities,
                paused: clock_state == ClockState::Paused,
                finished: clock_state == ClockState::Finished,
                rates: rates.map(|(name, v)| (name.to_string(), v)).collect(),
            },
            primitives,
        }
    }
}
