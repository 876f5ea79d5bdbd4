//! Rebound collisions
//!
//! Frictionless, perfectly elastic balls in a closed box with no gravity.
//! Every click adds a ball with random mass, size and velocity at the pointer.

use glam::Vec2;
use rand::Rng;

use super::{Ctx, KeyType, Setup, background, boundary_walls, ordered_pair, rand_range};
use crate::config::ConfigSnapshot;
use crate::error::{ConfigError, Result};
use crate::sim::entity::{EntityId, EntityKind};
use crate::sim::input::{Action, InputBindings};
use crate::sim::physics::PhysicsWorld;
use crate::sim::pool::{ColorRule, EntityPool, EntityTemplate, ExitEdges};

pub const REQUIRED_KEYS: &[(&str, KeyType)] = &[
    ("min_mass", KeyType::Positive),
    ("max_mass", KeyType::Positive),
    ("min_radius", KeyType::Positive),
    ("max_radius", KeyType::Positive),
    ("min_velocity_x", KeyType::Number),
    ("max_velocity_x", KeyType::Number),
    ("min_velocity_y", KeyType::Number),
    ("max_velocity_y", KeyType::Number),
];

pub fn validate(config: &ConfigSnapshot) -> Result<(), ConfigError> {
    ordered_pair(config, "min_mass", "max_mass")?;
    ordered_pair(config, "min_radius", "max_radius")?;
    ordered_pair(config, "min_velocity_x", "max_velocity_x")?;
    ordered_pair(config, "min_velocity_y", "max_velocity_y")?;
    if config.number("min_moment").is_some() || config.number("max_moment").is_some() {
        ordered_pair(config, "min_moment", "max_moment")?;
        if config.require_number("min_moment")? <= 0.0 {
            return Err(ConfigError::invalid("min_moment", "must be > 0"));
        }
    }
    Ok(())
}

/// Every edge culls, in case a fast ball tunnels through a wall
const ALL_EDGES: ExitEdges = ExitEdges {
    top: true,
    bottom: true,
    left: true,
    right: true,
};

#[derive(Debug, Clone)]
pub struct ReboundCollisions {
    spawned_by_click: u32,
}

impl ReboundCollisions {
    pub fn bootstrap(
        config: &ConfigSnapshot,
        world: &mut PhysicsWorld,
        pool: &mut EntityPool,
    ) -> Result<(Self, Setup)> {
        if world.gravity() != Vec2::ZERO {
            log::debug!("Gravity {:?} ignored; rebound collisions run weightless", world.gravity());
        }
        world.set_gravity(Vec2::ZERO);
        boundary_walls(world, config.screen_size(), 1.0, 0.0);

        let (template, velocity) = random_ball(config, pool);
        pool.spawn(world, &template, config.screen_center().floor(), velocity)?;

        let setup = Setup::new(
            InputBindings::new().on_button_down(Action::SpawnAtPointer),
            ALL_EDGES,
            background(config),
        );
        Ok((Self { spawned_by_click: 0 }, setup))
    }

    pub fn on_action(&mut self, action: Action, ctx: &mut Ctx<'_>) -> Result<()> {
        if action != Action::SpawnAtPointer {
            return Ok(());
        }
        let Some(pointer) = ctx.pointer else {
            log::debug!("Click without a pointer position ignored");
            return Ok(());
        };
        let (template, velocity) = random_ball(ctx.config, ctx.pool);
        if let Some(id) = ctx.spawn_requested(&template, pointer, velocity)? {
            self.spawned_by_click += 1;
            log::trace!("Ball {id} added at {pointer:?}");
        }
        Ok(())
    }

    pub fn spawned_by_click(&self) -> u32 {
        self.spawned_by_click
    }

    pub fn balls(pool: &EntityPool) -> Vec<EntityId> {
        pool.ids_of(EntityKind::Ball)
    }
}

fn random_ball(config: &ConfigSnapshot, pool: &mut EntityPool) -> (EntityTemplate, Vec2) {
    let n = |k: &str| config.number(k).unwrap_or(0.0);
    let rng = pool.rng();
    let mass = rand_range(rng, n("min_mass"), n("max_mass"));
    let moment = config
        .number("min_moment")
        .map(|_| rand_range(rng, n("min_moment"), n("max_moment")));
    let radius = rand_range(rng, n("min_radius"), n("max_radius"));
    // Ranges are magnitudes; each axis gets its own random direction
    let mut component = |lo: &str, hi: &str| {
        let magnitude = rand_range(rng, n(lo), n(hi));
        if rng.random_bool(0.5) { magnitude } else { -magnitude }
    };
    let vx = component("min_velocity_x", "max_velocity_x");
    let vy = component("min_velocity_y", "max_velocity_y");
    let velocity = Vec2::new(vx, vy);

    let mut template = EntityTemplate::circle(EntityKind::Ball, radius, mass)
        .with_material(1.0, 0.0)
        .with_color(ColorRule::Random);
    if let Some(moment) = moment {
        template = template.with_moment(moment);
    }
    (template, velocity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, ScenarioKind};
    use crate::sim::input::InputEvent;
    use crate::sim::pool::Bounds;
    use crate::sim::Simulation;

    fn builder() -> crate::config::ConfigBuilder {
        ConfigSnapshot::builder(ScenarioKind::ReboundCollisions)
            .gravity(Vec2::new(0.0, 900.0))
            .number("min_mass", 5.0)
            .number("max_mass", 20.0)
            .number("min_radius", 10.0)
            .number("max_radius", 30.0)
            .number("min_velocity_x", 50.0)
            .number("max_velocity_x", 200.0)
            .number("min_velocity_y", 50.0)
            .number("max_velocity_y", 200.0)
    }

    #[test]
    fn test_starts_with_one_centered_ball() {
        let sim = Simulation::new(builder().build().unwrap()).unwrap();
        let balls = ReboundCollisions::balls(sim.pool());
        assert_eq!(balls.len(), 1);
        assert_eq!(sim.pool().get(balls[0]).unwrap().visual.position, Vec2::new(400.0, 300.0));
        assert_eq!(sim.world().gravity(), Vec2::ZERO);
    }

    #[test]
    fn test_click_spawns_at_pointer() {
        let mut sim = Simulation::new(builder().build().unwrap()).unwrap();
        sim.tick([InputEvent::PointerMoved { x: 100.0, y: 150.0 }, InputEvent::ButtonDown(1)])
            .unwrap();
        assert_eq!(sim.pool().count_kind(EntityKind::Ball), 2);
        assert_eq!(sim.frame().hud.live_entities, 2);
        match sim.scenario() {
            Scenario::ReboundCollisions(s) => assert_eq!(s.spawned_by_click(), 1),
            other => panic!("unexpected scenario {:?}", other.kind()),
        }
    }

    #[test]
    fn test_click_rejected_when_full_is_reported() {
        // 4 walls are not entities; one ball fills the pool
        let mut sim = Simulation::new(builder().max_entities(1).build().unwrap()).unwrap();
        let report = sim
            .tick([InputEvent::PointerMoved { x: 100.0, y: 150.0 }, InputEvent::ButtonDown(1)])
            .unwrap();
        assert_eq!(report.rejected_spawns, 1);
        assert_eq!(sim.pool().count_kind(EntityKind::Ball), 1);
    }

    #[test]
    fn test_balls_stay_inside_box() {
        let config = builder()
            .seed(4)
            .number("min_mass", 10.0)
            .number("max_mass", 12.0)
            .number("min_velocity_x", 20.0)
            .number("max_velocity_x", 100.0)
            .number("min_velocity_y", 20.0)
            .number("max_velocity_y", 100.0)
            .build()
            .unwrap();
        let mut sim = Simulation::new(config).unwrap();
        let clicks = [(200.0, 200.0), (600.0, 400.0), (300.0, 450.0)];
        for (x, y) in clicks {
            sim.tick([InputEvent::PointerMoved { x, y }, InputEvent::ButtonDown(1)])
                .unwrap();
        }
        for _ in 0..600 {
            sim.tick([]).unwrap();
        }
        assert_eq!(sim.pool().count_kind(EntityKind::Ball), 4);
        for e in sim.pool().alive() {
            let p = e.visual.position;
            assert!(p.x > -10.0 && p.x < 810.0 && p.y > -10.0 && p.y < 610.0, "{p:?}");
        }
    }

    #[test]
    fn test_velocity_direction_random_per_axis() {
        let config = builder().build().unwrap();
        let bounds = Bounds {
            size: config.screen_size(),
            margin: 0.0,
            edges: ALL_EDGES,
        };
        let mut pool = EntityPool::new(config.max_entities(), bounds, config.seed());
        let velocities: Vec<Vec2> = (0..64).map(|_| random_ball(&config, &mut pool).1).collect();
        for v in &velocities {
            assert!((50.0..=200.0).contains(&v.x.abs()), "{v:?}");
            assert!((50.0..=200.0).contains(&v.y.abs()), "{v:?}");
        }
        assert!(velocities.iter().any(|v| v.x > 0.0));
        assert!(velocities.iter().any(|v| v.x < 0.0));
        assert!(velocities.iter().any(|v| v.y > 0.0));
        assert!(velocities.iter().any(|v| v.y < 0.0));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = builder().number("min_mass", 50.0).build().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
