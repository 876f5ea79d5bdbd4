//! Demo scenarios
//!
//! Each demo is a small instantiation of the shared engine: it bootstraps the
//! world, declares its input bindings, collision rules and exit edges, and
//! hooks into the tick before and after the physics step. The set of demos is
//! closed, so dispatch is a plain enum match.

pub mod colorful_flooding;
pub mod pizza_rain;
pub mod rebound_collisions;
pub mod sand_clock;
pub mod shooting_star;
pub mod solar_system;
pub mod wrecking_ball;

use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigSnapshot, Rgb};
use crate::consts::WALL_RADIUS;
use crate::error::{ConfigError, Result, SimError};
use crate::sim::clock::SimulationClock;
use crate::sim::entity::EntityId;
use crate::sim::input::{Action, InputBindings, RateParam};
use crate::sim::physics::{BodyHandle, BodySpec, PhysicsWorld, Shape};
use crate::sim::pool::{EntityPool, EntityTemplate, ExitEdges};
use crate::sim::router::CollisionRouter;
use crate::sim::snapshot::Background;

/// Expected type of a structural config value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Number,
    Positive,
    /// Whole number >= 1
    Count,
    Text,
    List,
}

impl KeyType {
    pub fn describe(&self) -> &'static str {
        match self {
            KeyType::Number => "a number",
            KeyType::Positive => "a positive number",
            KeyType::Count => "a whole number >= 1",
            KeyType::Text => "a string",
            KeyType::List => "a list of numbers",
        }
    }
}

/// The available demos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    ColorfulFlooding,
    PizzaRain,
    ReboundCollisions,
    SandClock,
    ShootingStar,
    SolarSystem,
    WreckingBall,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 7] = [
        ScenarioKind::ColorfulFlooding,
        ScenarioKind::PizzaRain,
        ScenarioKind::ReboundCollisions,
        ScenarioKind::SandClock,
        ScenarioKind::ShootingStar,
        ScenarioKind::SolarSystem,
        ScenarioKind::WreckingBall,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::ColorfulFlooding => "colorful_flooding",
            ScenarioKind::PizzaRain => "pizza_rain",
            ScenarioKind::ReboundCollisions => "rebound_collisions",
            ScenarioKind::SandClock => "sand_clock",
            ScenarioKind::ShootingStar => "shooting_star",
            ScenarioKind::SolarSystem => "solar_system",
            ScenarioKind::WreckingBall => "wrecking_ball",
        }
    }

    /// Structural keys checked at load time
    pub fn required_keys(&self) -> &'static [(&'static str, KeyType)] {
        match self {
            ScenarioKind::ColorfulFlooding => colorful_flooding::REQUIRED_KEYS,
            ScenarioKind::PizzaRain => pizza_rain::REQUIRED_KEYS,
            ScenarioKind::ReboundCollisions => rebound_collisions::REQUIRED_KEYS,
            ScenarioKind::SandClock => sand_clock::REQUIRED_KEYS,
            ScenarioKind::ShootingStar => shooting_star::REQUIRED_KEYS,
            ScenarioKind::SolarSystem => solar_system::REQUIRED_KEYS,
            ScenarioKind::WreckingBall => wrecking_ball::REQUIRED_KEYS,
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ConfigError::UnknownScenario(s.to_string()))
    }
}

/// Cross-field checks that a per-key type check cannot express
pub fn validate(config: &ConfigSnapshot) -> Result<(), ConfigError> {
    match config.scenario() {
        ScenarioKind::ColorfulFlooding => Ok(()),
        ScenarioKind::PizzaRain => pizza_rain::validate(config),
        ScenarioKind::ReboundCollisions => rebound_collisions::validate(config),
        ScenarioKind::SandClock => sand_clock::validate(config),
        ScenarioKind::ShootingStar => shooting_star::validate(config),
        ScenarioKind::SolarSystem => solar_system::validate(config),
        ScenarioKind::WreckingBall => wrecking_ball::validate(config),
    }
}

/// `min <= max` for a pair of structural numbers
pub(crate) fn ordered_pair(config: &ConfigSnapshot, min: &str, max: &str) -> Result<(), ConfigError> {
    let (lo, hi) = (config.require_number(min)?, config.require_number(max)?);
    if lo > hi {
        return Err(ConfigError::invalid(max, format!("must be >= {min} ({lo}), got {hi}")));
    }
    Ok(())
}

/// Fixed wiring a scenario hands to the simulation
#[derive(Debug, Clone)]
pub struct Setup {
    pub router: CollisionRouter,
    pub bindings: InputBindings,
    pub rates: Vec<(&'static str, RateParam)>,
    pub exit_edges: ExitEdges,
    pub background: Background,
}

impl Setup {
    pub fn new(bindings: InputBindings, exit_edges: ExitEdges, background: Background) -> Self {
        Self {
            router: CollisionRouter::new(),
            bindings,
            rates: Vec::new(),
            exit_edges,
            background,
        }
    }

    pub fn with_router(mut self, router: CollisionRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_rate(mut self, name: &'static str, param: RateParam) -> Self {
        self.rates.push((name, param));
        self
    }
}

/// Mutable view of a run handed to scenario hooks
pub struct Ctx<'a> {
    pub config: &'a ConfigSnapshot,
    pub world: &'a mut PhysicsWorld,
    pub pool: &'a mut EntityPool,
    pub clock: &'a mut SimulationClock,
    pub pointer: Option<Vec2>,
    pub streaming: bool,
    /// Current operator rates, by name
    pub rates: &'a [(&'static str, f32)],
    /// Operator-triggered spawns refused this tick
    pub rejected_spawns: u32,
}

impl Ctx<'_> {
    pub fn rate(&self, name: &str) -> Option<f32> {
        self.rates.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    /// Spawn on behalf of the operator
    ///
    /// A full pool is reported (warn + counter) instead of failing the tick.
    pub fn spawn_requested(
        &mut self,
        template: &EntityTemplate,
        position: Vec2,
        velocity: Vec2,
    ) -> Result<Option<EntityId>> {
        match self.pool.spawn(self.world, template, position, velocity) {
            Ok(id) => Ok(Some(id)),
            Err(SimError::CapacityExceeded { kind, limit }) => {
                log::warn!("Spawn of {kind:?} rejected: {limit} entities already live");
                self.rejected_spawns += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Screen-edge walls, top, right, bottom, left
pub(crate) fn boundary_walls(world: &mut PhysicsWorld, size: Vec2, elasticity: f32, friction: f32) -> [BodyHandle; 4] {
    let corners = [Vec2::ZERO, Vec2::new(size.x, 0.0), size, Vec2::new(0.0, size.y)];
    std::array::from_fn(|i| {
        let (a, b) = (corners[i], corners[(i + 1) % 4]);
        world.register(
            BodySpec::fixed(Shape::Segment { a, b, radius: WALL_RADIUS }).with_material(elasticity, friction),
        )
    })
}

/// Integer-style `randrange(lo, hi)`: uniform in `[lo, hi)`, or `lo` when empty
pub(crate) fn rand_range(rng: &mut impl Rng, lo: f64, hi: f64) -> f32 {
    if hi > lo { rng.random_range(lo..hi) as f32 } else { lo as f32 }
}

/// Palette color by name, or a random one
pub(crate) fn palette_or_random(config: &ConfigSnapshot, name: &str, rng: &mut impl Rng) -> Rgb {
    config.color(name).unwrap_or_else(|| {
        Rgb(
            rng.random_range(0..255),
            rng.random_range(0..255),
            rng.random_range(0..255),
        )
    })
}

pub(crate) fn background(config: &ConfigSnapshot) -> Background {
    Background {
        color: config.color_or("background", Rgb::BLACK),
        sprite: None,
    }
}

/// Per-run scenario state
#[derive(Debug, Clone)]
pub enum Scenario {
    ColorfulFlooding(colorful_flooding::ColorfulFlooding),
    PizzaRain(pizza_rain::PizzaRain),
    ReboundCollisions(rebound_collisions::ReboundCollisions),
    SandClock(sand_clock::SandClock),
    ShootingStar(shooting_star::ShootingStar),
    SolarSystem(solar_system::SolarSystem),
    WreckingBall(wrecking_ball::WreckingBall),
}

impl Scenario {
    /// Populate a fresh world for the configured scenario
    pub fn bootstrap(
        config: &ConfigSnapshot,
        world: &mut PhysicsWorld,
        pool: &mut EntityPool,
    ) -> Result<(Self, Setup)> {
        Ok(match config.scenario() {
            ScenarioKind::ColorfulFlooding => {
                let (s, setup) = colorful_flooding::ColorfulFlooding::bootstrap(config, world, pool)?;
                (Scenario::ColorfulFlooding(s), setup)
            }
            ScenarioKind::PizzaRain => {
                let (s, setup) = pizza_rain::PizzaRain::bootstrap(config, world, pool)?;
                (Scenario::PizzaRain(s), setup)
            }
            ScenarioKind::ReboundCollisions => {
                let (s, setup) = rebound_collisions::ReboundCollisions::bootstrap(config, world, pool)?;
                (Scenario::ReboundCollisions(s), setup)
            }
            ScenarioKind::SandClock => {
                let (s, setup) = sand_clock::SandClock::bootstrap(config, world, pool)?;
                (Scenario::SandClock(s), setup)
            }
            ScenarioKind::ShootingStar => {
                let (s, setup) = shooting_star::ShootingStar::bootstrap(config, world, pool)?;
                (Scenario::ShootingStar(s), setup)
            }
            ScenarioKind::SolarSystem => {
                let (s, setup) = solar_system::SolarSystem::bootstrap(config, world, pool)?;
                (Scenario::SolarSystem(s), setup)
            }
            ScenarioKind::WreckingBall => {
                let (s, setup) = wrecking_ball::WreckingBall::bootstrap(config, world, pool)?;
                (Scenario::WreckingBall(s), setup)
            }
        })
    }

    pub fn kind(&self) -> ScenarioKind {
        match self {
            Scenario::ColorfulFlooding(_) => ScenarioKind::ColorfulFlooding,
            Scenario::PizzaRain(_) => ScenarioKind::PizzaRain,
            Scenario::ReboundCollisions(_) => ScenarioKind::ReboundCollisions,
            Scenario::SandClock(_) => ScenarioKind::SandClock,
            Scenario::ShootingStar(_) => ScenarioKind::ShootingStar,
            Scenario::SolarSystem(_) => ScenarioKind::SolarSystem,
            Scenario::WreckingBall(_) => ScenarioKind::WreckingBall,
        }
    }

    /// React to a scenario-level action (pause, restart and quit are handled by the caller)
    pub fn on_action(&mut self, action: Action, ctx: &mut Ctx<'_>) -> Result<()> {
        match self {
            Scenario::ColorfulFlooding(s) => s.on_action(action, ctx),
            Scenario::ReboundCollisions(s) => s.on_action(action, ctx),
            Scenario::SandClock(s) => s.on_action(action, ctx),
            Scenario::PizzaRain(_)
            | Scenario::ShootingStar(_)
            | Scenario::SolarSystem(_)
            | Scenario::WreckingBall(_) => Ok(()),
        }
    }

    /// Spawn rules and kinematic driving, before the physics step
    pub fn before_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<()> {
        match self {
            Scenario::PizzaRain(s) => s.before_physics(ctx),
            Scenario::ShootingStar(s) => s.before_physics(ctx),
            Scenario::SolarSystem(s) => s.before_physics(ctx),
            Scenario::WreckingBall(s) => s.before_physics(ctx),
            Scenario::ColorfulFlooding(_) | Scenario::ReboundCollisions(_) | Scenario::SandClock(_) => Ok(()),
        }
    }

    /// Post-step fixups, before the sweep
    pub fn after_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<()> {
        match self {
            Scenario::PizzaRain(s) => s.after_physics(ctx),
            _ => Ok(()),
        }
    }

    /// Termination predicate, checked after each tick
    pub fn is_finished(&self, pool: &EntityPool) -> bool {
        match self {
            Scenario::ColorfulFlooding(s) => s.is_finished(pool),
            _ => false,
        }
    }
}
