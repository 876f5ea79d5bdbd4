//! Instance buffer packing
//!
//! One [`InstanceRaw`] per render primitive, laid out for a single instanced
//! quad draw: the shader picks the shape from `shape_kind` and samples the
//! sprite layer when `sprite_index` is non-zero.

use bytemuck::{Pod, Zeroable};

use crate::sim::entity::{SpriteRef, VisualShape};
use crate::sim::snapshot::{Frame, RenderPrimitive};

pub const SHAPE_CIRCLE: u32 = 0;
pub const SHAPE_LINE: u32 = 1;
pub const SHAPE_SPRITE: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceRaw {
    pub position: [f32; 2], // offset 0, quad center
    pub size: [f32; 2],     // offset 8, full extent before rotation
    pub rotation: f32,      // offset 16
    pub shape_kind: u32,    // offset 20
    pub sprite_index: u32,  // offset 24, 0 = untextured
    _pad: u32,              // offset 28, align color to 16 bytes
    pub color: [f32; 4],    // offset 32
}

impl InstanceRaw {
    pub fn from_primitive(p: &RenderPrimitive, sprite_index: u32) -> Self {
        let t = p.transform;
        let (position, size, rotation, shape_kind) = match p.shape {
            VisualShape::Circle { radius } => (t.position, [2.0 * radius; 2], t.rotation, SHAPE_CIRCLE),
            VisualShape::Line { a, b, width } => {
                // Lines become a rotated quad spanning both end caps
                let d = b - a;
                let mid = t.position + (a + b) * 0.5;
                (mid, [d.length() + 2.0 * width, 2.0 * width], t.rotation + d.to_angle(), SHAPE_LINE)
            }
            VisualShape::Sprite { size } => (t.position, [size; 2], t.rotation, SHAPE_SPRITE),
        };
        Self {
            position: position.to_array(),
            size,
            rotation,
            shape_kind,
            sprite_index,
            _pad: 0,
            color: p.color.to_rgba(),
        }
    }
}

/// Sprite ids in first-seen order; index 0 is reserved for "no sprite"
#[derive(Debug, Clone, Default)]
pub struct SpriteTable {
    names: Vec<SpriteRef>,
}

impl SpriteTable {
    pub fn index_of(&mut self, sprite: Option<&SpriteRef>) -> u32 {
        let Some(sprite) = sprite else {
            return 0;
        };
        let slot = match self.names.iter().position(|s| s == sprite) {
            Some(i) => i,
            None => {
                self.names.push(sprite.clone());
                self.names.len() - 1
            }
        };
        slot as u32 + 1
    }

    /// Sprites in index order (index 1 first)
    pub fn names(&self) -> &[SpriteRef] {
        &self.names
    }
}

/// Pack a frame's primitives, keeping draw order
pub fn pack_frame(frame: &Frame, sprites: &mut SpriteTable) -> Vec<InstanceRaw> {
    frame
        .primitives
        .iter()
        .map(|p| InstanceRaw::from_primitive(p, sprites.index_of(p.sprite.as_ref())))
        .collect()
}

/// Bytes to upload for an instance buffer
pub fn instances_bytes(instances: &[InstanceRaw]) -> &[u8] {
    bytemuck::cast_slice(instances)
}

/// Clear color for the frame background
pub fn clear_color(frame: &Frame) -> [f32; 4] {
    frame.background.color.to_rgba()
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::config::Rgb;
    use crate::sim::clock::ClockState;
    use crate::sim::entity::{EntityId, EntityKind};
    use crate::sim::snapshot::{Background, Hud, Transform};

    fn primitive(id: u32, shape: VisualShape, sprite: Option<&str>) -> RenderPrimitive {
        RenderPrimitive {
            entity: EntityId(id),
            kind: EntityKind::Ball,
            shape,
            transform: Transform {
                position: Vec2::new(10.0, 20.0),
                rotation: 0.0,
            },
            color: Rgb(255, 0, 0),
            sprite: sprite.map(|s| SpriteRef(s.to_string())),
        }
    }

    fn frame(primitives: Vec<RenderPrimitive>) -> Frame {
        Frame {
            tick: 0,
            clock_state: ClockState::Running,
            background: Background::default(),
            hud: Hud {
                caption: None,
                live_entities: primitives.len(),
                paused: false,
                finished: false,
                rates: Vec::new(),
            },
            primitives,
        }
    }

    #[test]
    fn test_layout_is_48_bytes() {
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 48);
        assert_eq!(std::mem::offset_of!(InstanceRaw, color), 32);
    }

    #[test]
    fn test_circle_instance() {
        let raw = InstanceRaw::from_primitive(&primitive(1, VisualShape::Circle { radius: 5.0 }, None), 0);
        assert_eq!(raw.position, [10.0, 20.0]);
        assert_eq!(raw.size, [10.0, 10.0]);
        assert_eq!(raw.shape_kind, SHAPE_CIRCLE);
        assert_eq!(raw.color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_line_instance_centered_and_rotated() {
        let line = VisualShape::Line {
            a: Vec2::ZERO,
            b: Vec2::new(0.0, 30.0),
            width: 2.0,
        };
        let raw = InstanceRaw::from_primitive(&primitive(1, line, None), 0);
        assert_eq!(raw.position, [10.0, 35.0]);
        assert_eq!(raw.size, [34.0, 4.0]);
        assert!((raw.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_sprites_share_indices() {
        let sprite = VisualShape::Sprite { size: 40.0 };
        let f = frame(vec![
            primitive(1, sprite, Some("pizza")),
            primitive(2, VisualShape::Circle { radius: 1.0 }, None),
            primitive(3, sprite, Some("calzone")),
            primitive(4, sprite, Some("pizza")),
        ]);
        let mut table = SpriteTable::default();
        let packed = pack_frame(&f, &mut table);
        let indices: Vec<u32> = packed.iter().map(|i| i.sprite_index).collect();
        assert_eq!(indices, vec![1, 0, 2, 1]);
        assert_eq!(table.names().len(), 2);
        assert_eq!(instances_bytes(&packed).len(), 4 * 48);
    }
}
