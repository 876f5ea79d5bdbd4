//! Shooting star
//!
//! Holding a pointer button streams short-lived sparks at the pointer. Each
//! spark falls under gravity and shrinks with its remaining lifespan.

use glam::Vec2;
use rand::Rng;

use super::{Ctx, KeyType, Setup, background, ordered_pair};
use crate::config::ConfigSnapshot;
use crate::error::{ConfigError, Result};
use crate::sim::entity::EntityKind;
use crate::sim::input::{Action, InputBindings};
use crate::sim::physics::PhysicsWorld;
use crate::sim::pool::{ColorRule, EntityPool, EntityTemplate, ExitEdges};

pub const REQUIRED_KEYS: &[(&str, KeyType)] = &[
    ("new_sparks_per_time_step", KeyType::Count),
    ("min_radius", KeyType::Count),
    ("max_radius", KeyType::Count),
    ("min_lifespan", KeyType::Count),
    ("max_lifespan", KeyType::Count),
];

const SPARK_MASS: f32 = 10.0;
const SPARK_MOMENT: f32 = 10.0;

pub fn validate(config: &ConfigSnapshot) -> Result<(), ConfigError> {
    ordered_pair(config, "min_radius", "max_radius")?;
    ordered_pair(config, "min_lifespan", "max_lifespan")
}

#[derive(Debug, Clone)]
pub struct ShootingStar {
    per_tick: u32,
    radius: (u32, u32),
    lifespan: (u32, u32),
}

impl ShootingStar {
    pub fn bootstrap(
        config: &ConfigSnapshot,
        _world: &mut PhysicsWorld,
        _pool: &mut EntityPool,
    ) -> Result<(Self, Setup)> {
        let n = |k: &str| config.require_number(k).map(|v| v as u32);
        let scenario = Self {
            per_tick: n("new_sparks_per_time_step")?,
            radius: (n("min_radius")?, n("max_radius")?),
            lifespan: (n("min_lifespan")?, n("max_lifespan")?),
        };
        let bindings = InputBindings::new()
            .on_button_down(Action::BeginStream)
            .on_button_up(Action::EndStream);
        Ok((scenario, Setup::new(bindings, ExitEdges::BOTTOM, background(config))))
    }

    /// Emit this tick's sparks while the button is held
    pub fn before_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<()> {
        let Some(pointer) = ctx.pointer.filter(|_| ctx.streaming) else {
            return Ok(());
        };
        for _ in 0..self.per_tick {
            let rng = ctx.pool.rng();
            let radius = int_in(rng, self.radius);
            let lifespan = int_in(rng, self.lifespan).max(1);
            // Nudge sideways so a still pointer does not stack sparks in a column
            let dx = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
            let template = EntityTemplate::circle(EntityKind::Spark, radius as f32, SPARK_MASS)
                .with_moment(SPARK_MOMENT)
                .with_lifespan(lifespan)
                .with_color(ColorRule::Random);
            if ctx
                .spawn_requested(&template, pointer + Vec2::new(dx, 0.0), Vec2::ZERO)?
                .is_none()
            {
                break;
            }
        }
        Ok(())
    }
}

/// `randrange(lo, hi)` over whole numbers; `lo` when the range is empty
fn int_in(rng: &mut impl Rng, (lo, hi): (u32, u32)) -> u32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioKind;
    use crate::sim::input::InputEvent;
    use crate::sim::Simulation;

    fn config() -> ConfigSnapshot {
        ConfigSnapshot::builder(ScenarioKind::ShootingStar)
            .gravity(Vec2::new(0.0, 300.0))
            .number("new_sparks_per_time_step", 3.0)
            .number("min_radius", 4.0)
            .number("max_radius", 8.0)
            .number("min_lifespan", 5.0)
            .number("max_lifespan", 10.0)
            .seed(5)
            .build()
            .unwrap()
    }

    #[test]
    fn test_no_sparks_without_button() {
        let mut sim = Simulation::new(config()).unwrap();
        sim.tick([InputEvent::PointerMoved { x: 400.0, y: 200.0 }]).unwrap();
        assert_eq!(sim.pool().live_count(), 0);
    }

    #[test]
    fn test_stream_spawns_near_pointer() {
        let mut sim = Simulation::new(config()).unwrap();
        sim.tick([InputEvent::PointerMoved { x: 400.0, y: 200.0 }, InputEvent::ButtonDown(1)])
            .unwrap();
        assert_eq!(sim.pool().spawned_total(), 3);
        sim.tick([]).unwrap();
        assert_eq!(sim.pool().spawned_total(), 6);
        sim.tick([InputEvent::ButtonUp(1)]).unwrap();
        sim.tick([]).unwrap();
        assert_eq!(sim.pool().spawned_total(), 6);
    }

    #[test]
    fn test_sparks_shrink_and_vanish() {
        let mut sim = Simulation::new(config()).unwrap();
        sim.tick([InputEvent::PointerMoved { x: 400.0, y: 200.0 }, InputEvent::ButtonDown(1)])
            .unwrap();
        sim.tick([InputEvent::ButtonUp(1)]).unwrap();
        for e in sim.pool().alive() {
            assert!(e.radius() < e.initial_radius);
        }
        // Longest lifespan is 9 ticks
        for _ in 0..10 {
            sim.tick([]).unwrap();
        }
        assert_eq!(sim.pool().live_count(), 0);
        assert!(sim.frame().primitives.is_empty());
    }
}
