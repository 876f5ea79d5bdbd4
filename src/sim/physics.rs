//! Physics world
//!
//! Thin domain layer over a rapier2d pipeline. Bodies are registered from a
//! [`BodySpec`] and addressed by [`BodyHandle`]; each body carries its owner
//! in its user data so contacts come back as domain [`CollisionEvent`]s.
//! Contacts are not delivered through callbacks; they are buffered during
//! `advance` and drained afterwards.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use glam::Vec2;
use rapier2d::geometry::CollisionEvent as ContactEvent;
use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use crate::consts::PHYSICS_LENGTH_UNIT;
use crate::error::{Result, SimError};

fn to_na(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

fn from_na(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// Reference to a registered body and its collider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

/// How a body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    /// Affected by gravity and contacts
    Dynamic,
    /// Moves with its own velocity, pushes dynamic bodies, ignores forces
    Kinematic,
    /// Never moves
    Static,
}

impl BodyType {
    fn to_rapier(self) -> RigidBodyType {
        match self {
            BodyType::Dynamic => RigidBodyType::Dynamic,
            BodyType::Kinematic => RigidBodyType::KinematicVelocityBased,
            BodyType::Static => RigidBodyType::Fixed,
        }
    }

    fn from_rapier(body_type: RigidBodyType) -> Self {
        match body_type {
            RigidBodyType::Dynamic => BodyType::Dynamic,
            RigidBodyType::Fixed => BodyType::Static,
            RigidBodyType::KinematicPositionBased | RigidBodyType::KinematicVelocityBased => BodyType::Kinematic,
        }
    }
}

/// Collision shape, in coordinates local to the body position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    /// Thick segment; endpoints are offsets from the body position
    Segment { a: Vec2, b: Vec2, radius: f32 },
}

impl Shape {
    fn collider(&self) -> ColliderBuilder {
        match *self {
            Shape::Circle { radius } => ColliderBuilder::ball(radius),
            Shape::Segment { a, b, radius } => {
                ColliderBuilder::capsule_from_endpoints(point![a.x, a.y], point![b.x, b.y], radius)
            }
        }
    }

    /// Solid disc for circles, thin rod for segments
    fn default_moment(&self, mass: f32) -> f32 {
        match *self {
            Shape::Circle { radius } => 0.5 * mass * radius * radius,
            Shape::Segment { a, b, .. } => mass * (b - a).length_squared() / 12.0,
        }
    }
}

/// Who a body belongs to, reported back in collision events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Participant {
    Entity(EntityId),
    /// Screen walls and other anonymous static geometry
    Boundary,
}

impl Participant {
    fn to_user_data(self) -> u128 {
        match self {
            Participant::Boundary => 0,
            Participant::Entity(id) => u128::from(id.0) + 1,
        }
    }

    fn from_user_data(data: u128) -> Self {
        match data {
            0 => Participant::Boundary,
            n => Participant::Entity(EntityId((n - 1) as u32)),
        }
    }
}

/// Description of a body before registration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySpec {
    pub body_type: BodyType,
    pub shape: Shape,
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    pub angular_velocity: f32,
    pub mass: f32,
    /// Moment of inertia; a solid disc is assumed when `None`
    pub moment: Option<f32>,
    pub elasticity: f32,
    pub friction: f32,
    pub gravity_scale: f32,
    /// Bodies that do not collide are still integrated
    pub collides: bool,
    pub owner: Participant,
}

impl BodySpec {
    fn base(body_type: BodyType, shape: Shape) -> Self {
        Self {
            body_type,
            shape,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            angular_velocity: 0.0,
            mass: 1.0,
            moment: None,
            elasticity: 0.0,
            friction: 0.0,
            gravity_scale: 1.0,
            collides: true,
            owner: Participant::Boundary,
        }
    }

    pub fn dynamic(shape: Shape) -> Self {
        Self::base(BodyType::Dynamic, shape)
    }

    pub fn kinematic(shape: Shape) -> Self {
        Self {
            gravity_scale: 0.0,
            ..Self::base(BodyType::Kinematic, shape)
        }
    }

    pub fn fixed(shape: Shape) -> Self {
        Self {
            gravity_scale: 0.0,
            ..Self::base(BodyType::Static, shape)
        }
    }

    pub fn with_position(mut self, pos: Vec2) -> Self {
        self.position = pos;
        self
    }

    pub fn with_velocity(mut self, vel: Vec2) -> Self {
        self.velocity = vel;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_moment(mut self, moment: f32) -> Self {
        self.moment = Some(moment);
        self
    }

    pub fn with_material(mut self, elasticity: f32, friction: f32) -> Self {
        self.elasticity = elasticity;
        self.friction = friction;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_collisions(mut self, collides: bool) -> Self {
        self.collides = collides;
        self
    }

    pub fn with_owner(mut self, owner: Participant) -> Self {
        self.owner = owner;
        self
    }
}

/// Read-only copy of a body's current state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub body_type: BodyType,
    pub shape: Shape,
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    pub angular_velocity: f32,
    pub owner: Participant,
}

/// A contact that started during the last step, expressed in domain terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Always an entity
    pub entity_a: EntityId,
    /// Another entity or the boundary
    pub b: Participant,
    pub contact_point: Vec2,
    /// Total impulse applied along the contact normals this step
    pub normal_impulse: f32,
}

/// Buffers rapier's contact-start events during a step
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<ContactEvent>>,
}

impl ContactCollector {
    fn take(&self) -> Vec<ContactEvent> {
        std::mem::take(&mut *self.started.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: ContactEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if event.started() {
            self.started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Owns every body of one run
pub struct PhysicsWorld {
    gravity: Vec2,
    fixed_step: f32,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    collector: ContactCollector,
    /// Registered shapes, kept in domain form for `body`
    shapes: HashMap<BodyHandle, Shape>,
    steps: u64,
    events: Vec<CollisionEvent>,
}

impl PhysicsWorld {
    /// Create an empty world; `fixed_step` is the only step size `advance` accepts
    pub fn new(gravity: Vec2, fixed_step: f32) -> Self {
        let mut params = IntegrationParameters::default();
        params.dt = fixed_step;
        params.length_unit = PHYSICS_LENGTH_UNIT;
        Self {
            gravity,
            fixed_step,
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            collector: ContactCollector::default(),
            shapes: HashMap::new(),
            steps: 0,
            events: Vec::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    /// Replace the global gravity vector
    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    /// Number of completed steps
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Number of registered bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Add a body with one collider
    ///
    /// Mass and moment are set explicitly; colliders carry no density.
    /// Elasticity and friction of a contact are the products of both sides.
    pub fn register(&mut self, spec: BodySpec) -> BodyHandle {
        let mut builder = RigidBodyBuilder::new(spec.body_type.to_rapier())
            .translation(to_na(spec.position))
            .rotation(spec.rotation)
            .linvel(to_na(spec.velocity))
            .angvel(spec.angular_velocity)
            .gravity_scale(spec.gravity_scale)
            .can_sleep(false)
            .user_data(spec.owner.to_user_data());
        if spec.body_type == BodyType::Dynamic {
            let moment = spec.moment.unwrap_or_else(|| spec.shape.default_moment(spec.mass));
            builder = builder
                .ccd_enabled(true)
                .additional_mass_properties(MassProperties::new(point![0.0, 0.0], spec.mass, moment));
        }
        let body = self.bodies.insert(builder.build());

        let mut collider = spec
            .shape
            .collider()
            .density(0.0)
            .restitution(spec.elasticity)
            .restitution_combine_rule(CoefficientCombineRule::Multiply)
            .friction(spec.friction)
            .friction_combine_rule(CoefficientCombineRule::Multiply)
            .active_events(ActiveEvents::COLLISION_EVENTS);
        if !spec.collides {
            collider = collider.collision_groups(InteractionGroups::none());
        }
        let collider = self
            .colliders
            .insert_with_parent(collider.build(), body, &mut self.bodies);

        let handle = BodyHandle { body, collider };
        self.shapes.insert(handle, spec.shape);
        handle
    }

    /// Remove a body and its collider; the handle is invalid afterwards
    pub fn release(&mut self, handle: BodyHandle) -> Result<()> {
        self.bodies
            .remove(
                handle.body,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .ok_or(SimError::InvalidHandle(handle))?;
        self.shapes.remove(&handle);
        Ok(())
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.body)
    }

    pub fn body(&self, handle: BodyHandle) -> Result<BodyState> {
        let rb = self.bodies.get(handle.body).ok_or(SimError::InvalidHandle(handle))?;
        let shape = *self.shapes.get(&handle).ok_or(SimError::InvalidHandle(handle))?;
        Ok(BodyState {
            body_type: BodyType::from_rapier(rb.body_type()),
            shape,
            position: from_na(rb.translation()),
            velocity: from_na(rb.linvel()),
            rotation: rb.rotation().angle(),
            angular_velocity: rb.angvel(),
            owner: Participant::from_user_data(rb.user_data),
        })
    }

    fn rigid_body_mut(&mut self, handle: BodyHandle) -> Result<&mut RigidBody> {
        self.bodies
            .get_mut(handle.body)
            .ok_or(SimError::InvalidHandle(handle))
    }

    pub fn set_position(&mut self, handle: BodyHandle, position: Vec2) -> Result<()> {
        self.rigid_body_mut(handle)?.set_translation(to_na(position), true);
        Ok(())
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec2) -> Result<()> {
        self.rigid_body_mut(handle)?.set_linvel(to_na(velocity), true);
        Ok(())
    }

    pub fn set_rotation(&mut self, handle: BodyHandle, rotation: f32) -> Result<()> {
        self.rigid_body_mut(handle)?
            .set_rotation(Rotation::new(rotation), true);
        Ok(())
    }

    /// Resize a circle body; mass and moment are kept
    pub fn set_circle_radius(&mut self, handle: BodyHandle, radius: f32) -> Result<()> {
        let collider = self
            .colliders
            .get_mut(handle.collider)
            .ok_or(SimError::InvalidHandle(handle))?;
        collider.set_shape(SharedShape::ball(radius));
        self.shapes.insert(handle, Shape::Circle { radius });
        Ok(())
    }

    /// Advance exactly one fixed step
    ///
    /// Any collision events not drained since the previous step are discarded.
    pub fn advance(&mut self, step: f32) -> Result<()> {
        if step != self.fixed_step {
            return Err(SimError::StepMismatch {
                expected: self.fixed_step,
                got: step,
            });
        }
        self.events.clear();

        self.pipeline.step(
            &to_na(self.gravity),
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &self.collector,
        );

        for event in self.collector.take() {
            if let ContactEvent::Started(c1, c2, _) = event {
                if let Some(e) = self.domain_event(c1, c2) {
                    self.events.push(e);
                }
            }
        }
        self.steps += 1;
        Ok(())
    }

    /// Take this step's collision events
    ///
    /// The iterator borrows the world, so it cannot outlive the next `advance`.
    pub fn drain_collision_events(&mut self) -> std::vec::Drain<'_, CollisionEvent> {
        self.events.drain(..)
    }

    fn owner_of(&self, collider: ColliderHandle) -> Option<Participant> {
        let parent = self.colliders.get(collider)?.parent()?;
        let rb = self.bodies.get(parent)?;
        Some(Participant::from_user_data(rb.user_data))
    }

    /// Boundary-boundary contacts are dropped; an entity always comes first
    fn domain_event(&self, c1: ColliderHandle, c2: ColliderHandle) -> Option<CollisionEvent> {
        let (entity_a, b) = match (self.owner_of(c1)?, self.owner_of(c2)?) {
            (Participant::Entity(id), other) => (id, other),
            (Participant::Boundary, Participant::Entity(id)) => (id, Participant::Boundary),
            (Participant::Boundary, Participant::Boundary) => return None,
        };

        let mut point = None;
        let mut normal_impulse = 0.0;
        if let Some(pair) = self.narrow_phase.contact_pair(c1, c2) {
            for manifold in &pair.manifolds {
                normal_impulse += manifold.points.iter().map(|p| p.data.impulse).sum::<Real>();
                if point.is_none() {
                    point = manifold
                        .data
                        .solver_contacts
                        .first()
                        .map(|c| Vec2::new(c.point.x, c.point.y));
                }
            }
        }
        let contact_point = point.unwrap_or_else(|| {
            let center = |c: ColliderHandle| {
                self.colliders
                    .get(c)
                    .map(|col| from_na(col.translation()))
                    .unwrap_or_default()
            };
            (center(c1) + center(c2)) * 0.5
        });

        Some(CollisionEvent {
            entity_a,
            b,
            contact_point,
            normal_impulse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn ball(pos: Vec2, id: u32) -> BodySpec {
        BodySpec::dynamic(Shape::Circle { radius: 5.0 })
            .with_position(pos)
            .with_mass(1.0)
            .with_owner(Participant::Entity(EntityId(id)))
    }

    #[test]
    fn test_release_invalidates_handle() {
        let mut world = PhysicsWorld::new(Vec2::ZERO, DT);
        let h = world.register(ball(Vec2::ZERO, 1));
        assert!(world.contains(h));
        world.release(h).unwrap();
        assert!(matches!(world.release(h), Err(SimError::InvalidHandle(_))));
        assert!(matches!(world.body(h), Err(SimError::InvalidHandle(_))));

        // Slot reuse must not resurrect the stale handle
        let h2 = world.register(ball(Vec2::ONE, 2));
        assert_ne!(h, h2);
        assert!(world.body(h).is_err());
        assert_eq!(world.body(h2).unwrap().position, Vec2::ONE);
        assert_eq!(world.body(h2).unwrap().owner, Participant::Entity(EntityId(2)));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_variable_step_rejected() {
        let mut world = PhysicsWorld::new(Vec2::ZERO, DT);
        assert!(matches!(
            world.advance(1.0 / 30.0),
            Err(SimError::StepMismatch { .. })
        ));
        assert!(world.advance(DT).is_ok());
        assert_eq!(world.steps(), 1);
    }

    #[test]
    fn test_gravity_accelerates_dynamic_only() {
        let mut world = PhysicsWorld::new(Vec2::new(0.0, 600.0), DT);
        let dynamic = world.register(ball(Vec2::ZERO, 1));
        let kinematic = world.register(
            BodySpec::kinematic(Shape::Circle { radius: 5.0 })
                .with_position(Vec2::new(100.0, 0.0))
                .with_velocity(Vec2::new(60.0, 0.0)),
        );
        world.advance(DT).unwrap();
        assert!((world.body(dynamic).unwrap().velocity.y - 10.0).abs() < 1e-3);
        let k = world.body(kinematic).unwrap();
        assert_eq!(k.body_type, BodyType::Kinematic);
        assert_eq!(k.velocity, Vec2::new(60.0, 0.0));
        assert!((k.position.x - 101.0).abs() < 1e-3);
    }

    #[test]
    fn test_ball_rests_on_floor_and_reports_boundary() {
        let mut world = PhysicsWorld::new(Vec2::new(0.0, 500.0), DT);
        world.register(BodySpec::fixed(Shape::Segment {
            a: Vec2::new(0.0, 100.0),
            b: Vec2::new(200.0, 100.0),
            radius: 4.0,
        }));
        let h = world.register(ball(Vec2::new(50.0, 80.0), 7));
        let mut saw_floor = false;
        for _ in 0..240 {
            world.advance(DT).unwrap();
            saw_floor |= world
                .drain_collision_events()
                .any(|e| e.entity_a == EntityId(7) && e.b == Participant::Boundary);
        }
        let body = world.body(h).unwrap();
        assert!(saw_floor);
        // Ball radius 5 + wall radius 4 above y = 100
        assert!(body.position.y < 92.0 && body.position.y > 89.0, "y = {}", body.position.y);
        assert!(body.velocity.y.abs() < 1.0);
    }

    #[test]
    fn test_elastic_head_on_exchange() {
        let mut world = PhysicsWorld::new(Vec2::ZERO, DT);
        let a = world.register(
            ball(Vec2::new(0.0, 0.0), 1)
                .with_velocity(Vec2::new(120.0, 0.0))
                .with_material(1.0, 0.0),
        );
        let b = world.register(
            ball(Vec2::new(11.0, 0.0), 2)
                .with_velocity(Vec2::new(-120.0, 0.0))
                .with_material(1.0, 0.0),
        );
        let mut started = 0;
        for _ in 0..10 {
            world.advance(DT).unwrap();
            started += world.drain_collision_events().count();
        }
        let va = world.body(a).unwrap().velocity.x;
        let vb = world.body(b).unwrap().velocity.x;
        assert!(va < -100.0, "va = {va}");
        assert!(vb > 100.0, "vb = {vb}");
        assert!(started >= 1);
    }

    #[test]
    fn test_non_colliding_bodies_pass_through() {
        let mut world = PhysicsWorld::new(Vec2::ZERO, DT);
        world.register(ball(Vec2::ZERO, 1).with_collisions(false));
        world.register(ball(Vec2::new(1.0, 0.0), 2));
        for _ in 0..3 {
            world.advance(DT).unwrap();
            assert_eq!(world.drain_collision_events().count(), 0);
        }
    }

    #[test]
    fn test_drain_empties_events() {
        let mut world = PhysicsWorld::new(Vec2::ZERO, DT);
        world.register(ball(Vec2::ZERO, 1));
        world.register(ball(Vec2::new(3.0, 0.0), 2));
        world.advance(DT).unwrap();
        let events: Vec<_> = world.drain_collision_events().collect();
        assert_eq!(events.len(), 1);
        let ids = [events[0].entity_a, match events[0].b {
            Participant::Entity(id) => id,
            Participant::Boundary => panic!("expected an entity"),
        }];
        assert!(ids.contains(&EntityId(1)) && ids.contains(&EntityId(2)));
        assert_eq!(world.drain_collision_events().count(), 0);
    }

    #[test]
    fn test_set_circle_radius_updates_shape() {
        let mut world = PhysicsWorld::new(Vec2::ZERO, DT);
        let h = world.register(ball(Vec2::ZERO, 1));
        world.set_circle_radius(h, 2.0).unwrap();
        assert_eq!(world.body(h).unwrap().shape, Shape::Circle { radius: 2.0 });
        world.release(h).unwrap();
        assert!(world.set_circle_radius(h, 1.0).is_err());
    }

    #[test]
    fn test_participant_user_data_round_trip() {
        for p in [Participant::Boundary, Participant::Entity(EntityId(0)), Participant::Entity(EntityId(41))] {
            assert_eq!(Participant::from_user_data(p.to_user_data()), p);
        }
    }
}
