//! Deterministic simulation module
//!
//! The engine shared by every scenario. This module must stay deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (one `Pcg32` per run, owned by the pool)
//! - Stable iteration order (by entity id and body slot)
//! - No rendering or platform dependencies

pub mod clock;
pub mod entity;
pub mod input;
pub mod physics;
pub mod pool;
pub mod router;
pub mod snapshot;
pub mod tick;

pub use clock::{ClockState, SimulationClock};
pub use entity::{Entity, EntityId, EntityKind, Lifecycle, SpriteRef, VisualShape, VisualState};
pub use input::{Action, InputBindings, InputEvent, InputModulator, Key, RateParam};
pub use physics::{BodyHandle, BodySpec, BodyState, BodyType, CollisionEvent, Participant, PhysicsWorld, Shape};
pub use pool::{EntityPool, EntityTemplate, ExitEdges, Source};
pub use router::{CollisionRouter, Mutation, Side};
pub use snapshot::{Frame, FrameSnapshotBuilder, RenderPrimitive};
pub use tick::{Simulation, TickReport};
