//! Entity pool and emitters
//!
//! The pool owns every live entity and the sources that emit new ones. It is
//! the only place that registers or releases entity bodies in the physics
//! world, so an entity's handle is released exactly once, during `sweep`.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId, EntityKind, Lifecycle, SpriteRef, VisualShape, VisualState};
use super::physics::{BodySpec, BodyType, Participant, PhysicsWorld, Shape};
use crate::config::Rgb;
use crate::error::{Result, SimError};

/// How a spawned entity gets its color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColorRule {
    Fixed(Rgb),
    /// Uniform random RGB from the run's RNG
    Random,
}

/// Everything needed to spawn one kind of entity at a given position
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTemplate {
    pub kind: EntityKind,
    pub body_type: BodyType,
    pub radius: f32,
    pub mass: f32,
    pub moment: Option<f32>,
    pub elasticity: f32,
    pub friction: f32,
    pub gravity_scale: f32,
    pub collides: bool,
    pub color: ColorRule,
    /// Draw as a sprite of this size instead of a circle
    pub sprite: Option<(SpriteRef, f32)>,
    pub lifespan: Option<u32>,
}

impl EntityTemplate {
    /// Dynamic circle with the given kind and material
    pub fn circle(kind: EntityKind, radius: f32, mass: f32) -> Self {
        Self {
            kind,
            body_type: BodyType::Dynamic,
            radius,
            mass,
            moment: None,
            elasticity: 0.0,
            friction: 0.0,
            gravity_scale: 1.0,
            collides: true,
            color: ColorRule::Random,
            sprite: None,
            lifespan: None,
        }
    }

    pub fn with_material(mut self, elasticity: f32, friction: f32) -> Self {
        self.elasticity = elasticity;
        self.friction = friction;
        self
    }

    pub fn with_color(mut self, color: ColorRule) -> Self {
        self.color = color;
        self
    }

    pub fn with_moment(mut self, moment: f32) -> Self {
        self.moment = Some(moment);
        self
    }

    pub fn with_lifespan(mut self, ticks: u32) -> Self {
        self.lifespan = Some(ticks);
        self
    }

    pub fn with_sprite(mut self, sprite: SpriteRef, size: f32) -> Self {
        self.sprite = Some((sprite, size));
        self
    }

    pub fn kinematic(mut self) -> Self {
        self.body_type = BodyType::Kinematic;
        self.gravity_scale = 0.0;
        self
    }

    pub fn without_collisions(mut self) -> Self {
        self.collides = false;
        self
    }
}

/// Horizontal spread applied to a source's emission point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Jitter {
    None,
    /// Either `-d` or `+d`, chosen at random
    Nudge(f32),
    /// Uniform in `[-d, d)`
    Span(f32),
}

/// Periodic emitter
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub position: Vec2,
    pub emission_interval_ticks: u64,
    pub next_emission_tick: u64,
    pub template: EntityTemplate,
    pub jitter: Jitter,
    pub velocity: Vec2,
}

impl Source {
    pub fn new(position: Vec2, emission_interval_ticks: u64, template: EntityTemplate) -> Self {
        Self {
            position,
            emission_interval_ticks: emission_interval_ticks.max(1),
            next_emission_tick: 0,
            template,
            jitter: Jitter::None,
            velocity: Vec2::ZERO,
        }
    }

    pub fn starting_at(mut self, tick: u64) -> Self {
        self.next_emission_tick = tick;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn kind_to_spawn(&self) -> EntityKind {
        self.template.kind
    }
}

/// Which screen edges cull entities that cross them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitEdges {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl ExitEdges {
    pub const NONE: ExitEdges = ExitEdges {
        top: false,
        bottom: false,
        left: false,
        right: false,
    };
    pub const BOTTOM: ExitEdges = ExitEdges {
        bottom: true,
        ..ExitEdges::NONE
    };
    pub const SIDES_AND_BOTTOM: ExitEdges = ExitEdges {
        bottom: true,
        left: true,
        right: true,
        top: false,
    };
}

/// Culling region: the screen grown by a margin on the enabled edges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub size: Vec2,
    pub margin: f32,
    pub edges: ExitEdges,
}

impl Bounds {
    pub fn is_outside(&self, p: Vec2) -> bool {
        (self.edges.bottom && p.y > self.size.y + self.margin)
            || (self.edges.top && p.y < -self.margin)
            || (self.edges.left && p.x < -self.margin)
            || (self.edges.right && p.x > self.size.x + self.margin)
    }
}

/// Result of one emission pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitReport {
    pub spawned: Vec<EntityId>,
    /// Emissions dropped because the pool was full
    pub skipped: u32,
}

/// Owns all live entities and sources of one run
#[derive(Debug, Clone)]
pub struct EntityPool {
    entities: BTreeMap<EntityId, Entity>,
    sources: Vec<Source>,
    generating: bool,
    max_entities: usize,
    bounds: Bounds,
    rng: Pcg32,
    next_id: u32,
    spawned_total: u64,
    removed_total: u64,
}

impl EntityPool {
    pub fn new(max_entities: usize, bounds: Bounds, seed: u64) -> Self {
        Self {
            entities: BTreeMap::new(),
            sources: Vec::new(),
            generating: true,
            max_entities,
            bounds,
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
            spawned_total: 0,
            removed_total: 0,
        }
    }

    /// Run RNG (seeded from the config; the only randomness in a run)
    pub fn rng(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn set_exit_edges(&mut self, edges: ExitEdges) {
        self.bounds.edges = edges;
    }

    pub fn max_entities(&self) -> usize {
        self.max_entities
    }

    /// Entities not yet removed (alive or pending)
    pub fn live_count(&self) -> usize {
        self.entities.len()
    }

    pub fn alive_count(&self) -> usize {
        self.entities.values().filter(|e| e.is_alive()).count()
    }

    pub fn count_kind(&self, kind: EntityKind) -> usize {
        self.entities
            .values()
            .filter(|e| e.is_alive() && e.kind == kind)
            .count()
    }

    pub fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    pub fn removed_total(&self) -> u64 {
        self.removed_total
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        self.entities.get(&id).map(|e| e.kind)
    }

    /// All unremoved entities in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Alive entities in creation order
    pub fn alive(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_alive())
    }

    pub fn ids_of(&self, kind: EntityKind) -> Vec<EntityId> {
        self.alive().filter(|e| e.kind == kind).map(|e| e.id).collect()
    }

    /// Spawn from a template
    pub fn spawn(
        &mut self,
        world: &mut PhysicsWorld,
        template: &EntityTemplate,
        position: Vec2,
        velocity: Vec2,
    ) -> Result<EntityId> {
        let mut spec = BodySpec::dynamic(Shape::Circle {
            radius: template.radius,
        });
        spec.body_type = template.body_type;
        spec.moment = template.moment;
        let spec = spec
            .with_position(position)
            .with_velocity(velocity)
            .with_mass(template.mass)
            .with_material(template.elasticity, template.friction)
            .with_gravity_scale(template.gravity_scale)
            .with_collisions(template.collides);

        let color = match template.color {
            ColorRule::Fixed(rgb) => rgb,
            ColorRule::Random => random_color(&mut self.rng),
        };
        let mut visual = VisualState::circle(position, template.radius, color);
        if let Some((sprite, size)) = &template.sprite {
            visual.shape = VisualShape::Sprite { size: *size };
            visual.sprite = Some(sprite.clone());
        }
        self.insert(world, template.kind, spec, visual, template.lifespan)
    }

    /// Spawn an entity from an explicit body description
    pub fn insert(
        &mut self,
        world: &mut PhysicsWorld,
        kind: EntityKind,
        spec: BodySpec,
        visual: VisualState,
        lifespan: Option<u32>,
    ) -> Result<EntityId> {
        if self.entities.len() >= self.max_entities {
            return Err(SimError::CapacityExceeded {
                kind,
                limit: self.max_entities,
            });
        }
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let handle = world.register(spec.with_owner(Participant::Entity(id)));
        let initial_radius = match spec.shape {
            Shape::Circle { radius } => radius,
            Shape::Segment { radius, .. } => radius,
        };
        self.entities.insert(
            id,
            Entity {
                id,
                kind,
                handle,
                visual,
                lifecycle: Lifecycle::Alive,
                age_ticks: 0,
                lifespan,
                initial_radius,
            },
        );
        self.spawned_total += 1;
        Ok(id)
    }

    /// Static line that is drawn and collides
    pub fn spawn_structure_line(
        &mut self,
        world: &mut PhysicsWorld,
        a: Vec2,
        b: Vec2,
        width: f32,
        color: Rgb,
    ) -> Result<EntityId> {
        let spec = BodySpec::fixed(Shape::Segment {
            a: Vec2::ZERO,
            b: b - a,
            radius: width,
        })
        .with_position(a);
        let visual = VisualState {
            position: a,
            rotation: 0.0,
            color,
            shape: VisualShape::Line {
                a: Vec2::ZERO,
                b: b - a,
                width,
            },
            sprite: None,
        };
        self.insert(world, EntityKind::StaticStructure, spec, visual, None)
    }

    /// Flag an entity for removal at the next sweep
    ///
    /// Returns `false` when it was already pending. Repeated calls are harmless.
    pub fn mark_for_removal(&mut self, id: EntityId) -> Result<bool> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SimError::UnknownEntity(id))?;
        if entity.lifecycle == Lifecycle::Alive {
            entity.lifecycle = Lifecycle::PendingRemoval;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn set_velocity(&self, world: &mut PhysicsWorld, id: EntityId, velocity: Vec2) -> Result<()> {
        let entity = self.entities.get(&id).ok_or(SimError::UnknownEntity(id))?;
        world.set_velocity(entity.handle, velocity)
    }

    /// Move an entity, body and visual together
    pub fn set_position(&mut self, world: &mut PhysicsWorld, id: EntityId, position: Vec2) -> Result<()> {
        let entity = self.entities.get_mut(&id).ok_or(SimError::UnknownEntity(id))?;
        world.set_position(entity.handle, position)?;
        entity.visual.position = position;
        Ok(())
    }

    pub fn set_rotation(&mut self, world: &mut PhysicsWorld, id: EntityId, rotation: f32) -> Result<()> {
        let entity = self.entities.get_mut(&id).ok_or(SimError::UnknownEntity(id))?;
        world.set_rotation(entity.handle, rotation)?;
        entity.visual.rotation = rotation;
        Ok(())
    }

    pub fn add_source(&mut self, source: Source) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Permanently stop all sources for this run
    pub fn stop_generating(&mut self) {
        if self.generating {
            log::info!("Sources stopped ({} live entities)", self.entities.len());
        }
        self.generating = false;
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Fire every source that is due at `tick`
    ///
    /// A full pool skips the beat; the source still waits a whole interval.
    pub fn emit_sources(&mut self, world: &mut PhysicsWorld, tick: u64) -> EmitReport {
        let mut report = EmitReport::default();
        if !self.generating {
            return report;
        }
        for i in 0..self.sources.len() {
            if tick < self.sources[i].next_emission_tick {
                continue;
            }
            let source = &mut self.sources[i];
            source.next_emission_tick = tick + source.emission_interval_ticks;
            let (template, base, jitter, velocity) = (
                source.template.clone(),
                source.position,
                source.jitter,
                source.velocity,
            );
            let dx = match jitter {
                Jitter::None => 0.0,
                Jitter::Nudge(d) => {
                    if self.rng.random_bool(0.5) { d } else { -d }
                }
                Jitter::Span(d) if d > 0.0 => self.rng.random_range(-d..d),
                Jitter::Span(_) => 0.0,
            };
            match self.spawn(world, &template, base + Vec2::new(dx, 0.0), velocity) {
                Ok(id) => report.spawned.push(id),
                Err(SimError::CapacityExceeded { kind, limit }) => {
                    log::debug!("Source skipped {kind:?} emission at tick {tick}: pool full ({limit})");
                    report.skipped += 1;
                }
                Err(e) => {
                    log::debug!("Source emission failed at tick {tick}: {e}");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    /// Copy positions and rotations from the physics world
    pub fn sync_from(&mut self, world: &PhysicsWorld) -> Result<()> {
        for entity in self.entities.values_mut() {
            let body = world.body(entity.handle)?;
            entity.visual.position = body.position;
            entity.visual.rotation = body.rotation;
        }
        Ok(())
    }

    /// One tick older, for every alive entity
    pub fn age_entities(&mut self) {
        for entity in self.entities.values_mut().filter(|e| e.is_alive()) {
            entity.age_ticks += 1;
        }
    }

    /// Shrink entities that have a lifespan
    ///
    /// The radius is `initial * left / lifespan` in whole pixels; entities
    /// that reach zero are flagged for removal and returned.
    pub fn shrink_by_lifespan(&mut self, world: &mut PhysicsWorld) -> Result<Vec<EntityId>> {
        let mut expired = Vec::new();
        for entity in self.entities.values_mut().filter(|e| e.is_alive()) {
            let Some(lifespan) = entity.lifespan.filter(|l| *l > 0) else {
                continue;
            };
            let left = u64::from(lifespan).saturating_sub(entity.age_ticks);
            let initial = entity.initial_radius.round().max(0.0) as u64;
            let radius = (initial * left / u64::from(lifespan)) as f32;
            if radius <= 0.0 {
                entity.lifecycle = Lifecycle::PendingRemoval;
                expired.push(entity.id);
                continue;
            }
            if let VisualShape::Circle { radius: r } = &mut entity.visual.shape {
                *r = radius;
            }
            world.set_circle_radius(entity.handle, radius)?;
        }
        Ok(expired)
    }

    /// Finalize removals
    ///
    /// Alive entities past the exit edges are flagged first, then every
    /// pending entity has its body released and is evicted. Running it twice
    /// in a row removes nothing the second time.
    pub fn sweep(&mut self, world: &mut PhysicsWorld) -> Result<Vec<EntityId>> {
        let bounds = self.bounds;
        for entity in self.entities.values_mut() {
            if entity.lifecycle == Lifecycle::Alive
                && entity.kind != EntityKind::StaticStructure
                && bounds.is_outside(entity.visual.position)
            {
                entity.lifecycle = Lifecycle::PendingRemoval;
            }
        }

        let pending: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.lifecycle == Lifecycle::PendingRemoval)
            .map(|e| e.id)
            .collect();

        for id in &pending {
            let Some(handle) = self.entities.get(id).map(|e| e.handle) else {
                continue;
            };
            // Body first, so a failed release leaves the entity pending
            world.release(handle)?;
            if let Some(mut entity) = self.entities.remove(id) {
                entity.lifecycle = Lifecycle::Removed;
                self.removed_total += 1;
                log::trace!("Removed {:?} {}", entity.kind, entity.id);
            }
        }
        Ok(pending)
    }
}

/// Uniform random color in [0, 255) per channel
pub fn random_color(rng: &mut Pcg32) -> Rgb {
    Rgb(
        rng.random_range(0..255),
        rng.random_range(0..255),
        rng.random_range(0..255),
    )
}
