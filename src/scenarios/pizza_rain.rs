//! Pizza rain
//!
//! Kinematic pizza sprites fall at an adjustable speed, wrap back to the top
//! and turn a quarter every few ticks. No physics contacts are involved; the
//! arrow keys change the fall speed and rotation period, even while paused.

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;
use rand::Rng;

use super::{Ctx, KeyType, Setup, background};
use crate::config::{ConfigSnapshot, Rgb};
use crate::error::{ConfigError, Result};
use crate::normalize_angle;
use crate::sim::entity::{EntityId, EntityKind, SpriteRef};
use crate::sim::input::{Action, InputBindings, Key, RateParam};
use crate::sim::physics::PhysicsWorld;
use crate::sim::pool::{ColorRule, EntityPool, EntityTemplate, ExitEdges};

pub const REQUIRED_KEYS: &[(&str, KeyType)] = &[
    ("number_of_pizzas", KeyType::Count),
    ("vertical_speed", KeyType::Positive),
    ("vertical_speed_incr", KeyType::Positive),
    ("rotation_every", KeyType::Count),
    ("rotation_every_incr", KeyType::Count),
    ("diameter", KeyType::Positive),
];

pub const VERTICAL_SPEED: &str = "vertical_speed";
pub const ROTATION_EVERY: &str = "rotation_every";

const DEFAULT_MAX_VERTICAL_SPEED: f64 = 50.0;
const DEFAULT_MAX_ROTATION_EVERY: f64 = 600.0;
const DEFAULT_SPRITE: &str = "pizza";
/// Placement retries per pizza before accepting an overlap
const PLACEMENT_ATTEMPTS: u32 = 1000;

pub fn validate(config: &ConfigSnapshot) -> Result<(), ConfigError> {
    let diameter = config.require_number("diameter")?;
    if diameter >= f64::from(config.screen_width().min(config.screen_height())) {
        return Err(ConfigError::invalid("diameter", "must be smaller than the screen"));
    }
    let max_speed = config.number_or("max_vertical_speed", DEFAULT_MAX_VERTICAL_SPEED);
    if max_speed < 1.0 {
        return Err(ConfigError::invalid("max_vertical_speed", "must be >= 1"));
    }
    let max_every = config.number_or("max_rotation_every", DEFAULT_MAX_ROTATION_EVERY);
    if max_every < 1.0 {
        return Err(ConfigError::invalid("max_rotation_every", "must be >= 1"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PizzaRain {
    pizzas: Vec<EntityId>,
    diameter: f32,
    /// Ticks since the last quarter turn
    since_rotation: u64,
    last_rotation_every: u64,
}

impl PizzaRain {
    pub fn bootstrap(
        config: &ConfigSnapshot,
        world: &mut PhysicsWorld,
        pool: &mut EntityPool,
    ) -> Result<(Self, Setup)> {
        let count = config.require_number("number_of_pizzas")? as usize;
        let diameter = config.require_number("diameter")? as f32;
        let sprites: Vec<SpriteRef> = config
            .text("sprites")
            .unwrap_or(DEFAULT_SPRITE)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| SpriteRef(s.to_string()))
            .collect();
        let sprites = if sprites.is_empty() {
            vec![SpriteRef(DEFAULT_SPRITE.to_string())]
        } else {
            sprites
        };

        let size = config.screen_size();
        let mut placed: Vec<Vec2> = Vec::with_capacity(count);
        let mut pizzas = Vec::with_capacity(count);
        for _ in 0..count {
            let rng = pool.rng();
            let sprite = sprites[rng.random_range(0..sprites.len())].clone();
            let mut pos = random_point(rng, size);
            for _ in 0..PLACEMENT_ATTEMPTS {
                if placed.iter().all(|p| !squares_overlap(*p, pos, diameter)) {
                    break;
                }
                pos = random_point(rng, size);
            }
            placed.push(pos);

            let template = EntityTemplate::circle(EntityKind::Pizza, diameter * 0.5, 1.0)
                .kinematic()
                .without_collisions()
                .with_color(ColorRule::Fixed(Rgb::WHITE))
                .with_sprite(sprite, diameter);
            pizzas.push(pool.spawn(world, &template, pos, Vec2::ZERO)?);
        }

        let speed = config.require_number(VERTICAL_SPEED)? as f32;
        let speed_incr = config.require_number("vertical_speed_incr")? as f32;
        let every = config.require_number(ROTATION_EVERY)? as f32;
        let every_incr = config.require_number("rotation_every_incr")? as f32;
        let max_speed = config.number_or("max_vertical_speed", DEFAULT_MAX_VERTICAL_SPEED) as f32;
        let max_every = config.number_or("max_rotation_every", DEFAULT_MAX_ROTATION_EVERY) as f32;

        let bindings = InputBindings::new()
            .on_key(Key::Space, Action::TogglePause)
            .on_key(Key::Up, Action::Adjust { param: VERTICAL_SPEED, delta: -speed_incr })
            .on_key(Key::Down, Action::Adjust { param: VERTICAL_SPEED, delta: speed_incr })
            .on_key(Key::Right, Action::Adjust { param: ROTATION_EVERY, delta: -every_incr })
            .on_key(Key::Left, Action::Adjust { param: ROTATION_EVERY, delta: every_incr })
            .adjust_while_paused(true);
        let setup = Setup::new(bindings, ExitEdges::NONE, background(config))
            .with_rate(VERTICAL_SPEED, RateParam::new(speed, 1.0, max_speed))
            .with_rate(ROTATION_EVERY, RateParam::new(every, 1.0, max_every));

        Ok((
            Self {
                pizzas,
                diameter,
                since_rotation: 0,
                last_rotation_every: every as u64,
            },
            setup,
        ))
    }

    /// Drive the fall and the quarter turns
    pub fn before_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<()> {
        let speed = ctx.rate(VERTICAL_SPEED).unwrap_or(1.0);
        let every = ctx.rate(ROTATION_EVERY).unwrap_or(1.0).max(1.0) as u64;
        // A changed period restarts the count so the next turn is one tick away
        if every != self.last_rotation_every {
            self.last_rotation_every = every;
            self.since_rotation = every - 1;
        }

        self.since_rotation += 1;
        let turn = self.since_rotation >= every;
        if turn {
            self.since_rotation = 0;
        }

        let velocity = Vec2::new(0.0, speed / ctx.world.fixed_step());
        for &id in &self.pizzas {
            ctx.pool.set_velocity(ctx.world, id, velocity)?;
            if turn {
                let rotation = ctx.pool.get(id).map_or(0.0, |e| e.visual.rotation);
                // Counterclockwise on a y-down screen
                ctx.pool
                    .set_rotation(ctx.world, id, normalize_angle(rotation - FRAC_PI_2))?;
            }
        }
        Ok(())
    }

    /// Wrap pizzas that left through the bottom back above the top
    pub fn after_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<()> {
        let half = self.diameter * 0.5;
        let height = ctx.config.screen_height();
        for &id in &self.pizzas {
            let Some(pos) = ctx.pool.get(id).map(|e| e.visual.position) else {
                continue;
            };
            if pos.y - half > height {
                ctx.pool.set_position(ctx.world, id, Vec2::new(pos.x, -half))?;
            }
        }
        Ok(())
    }

    pub fn pizzas(&self) -> &[EntityId] {
        &self.pizzas
    }
}

fn random_point(rng: &mut impl Rng, size: Vec2) -> Vec2 {
    Vec2::new(
        rng.random_range(0..size.x as u32) as f32,
        rng.random_range(0..size.y as u32) as f32,
    )
}

/// Axis-aligned sprite squares of side `d` centered at `a` and `b`
fn squares_overlap(a: Vec2, b: Vec2, d: f32) -> bool {
    (a.x - b.x).abs() < d && (a.y - b.y).abs() < d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioKind;
    use crate::sim::clock::ClockState;
    use crate::sim::input::InputEvent;
    use crate::sim::Simulation;

    fn config() -> ConfigSnapshot {
        ConfigSnapshot::builder(ScenarioKind::PizzaRain)
            .number("number_of_pizzas", 5.0)
            .number("vertical_speed", 3.0)
            .number("vertical_speed_incr", 1.0)
            .number("rotation_every", 4.0)
            .number("rotation_every_incr", 2.0)
            .number("diameter", 60.0)
            .number("max_vertical_speed", 6.0)
            .text("sprites", "margherita, pepperoni")
            .build()
            .unwrap()
    }

    #[test]
    fn test_pizzas_do_not_overlap() {
        let sim = Simulation::new(config()).unwrap();
        let positions: Vec<Vec2> = sim.pool().alive().map(|e| e.visual.position).collect();
        assert_eq!(positions.len(), 5);
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(!squares_overlap(*a, *b, 60.0));
            }
        }
        for e in sim.pool().alive() {
            let sprite = e.visual.sprite.as_ref().unwrap();
            assert!(sprite.0 == "margherita" || sprite.0 == "pepperoni");
        }
    }

    #[test]
    fn test_random_point_on_single_pixel_screen() {
        use rand::SeedableRng;
        let mut rng = rand_pcg::Pcg32::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(random_point(&mut rng, Vec2::ONE), Vec2::ZERO);
        }
    }

    #[test]
    fn test_pizzas_fall_at_vertical_speed() {
        let mut sim = Simulation::new(config()).unwrap();
        let id = sim.pool().ids_of(EntityKind::Pizza)[0];
        let y0 = sim.pool().get(id).unwrap().visual.position.y;
        sim.tick([]).unwrap();
        let y1 = sim.pool().get(id).unwrap().visual.position.y;
        // Either moved by 3 px or wrapped to the top
        assert!((y1 - y0 - 3.0).abs() < 1e-3 || y1 < y0);
    }

    #[test]
    fn test_quarter_turn_period() {
        let mut sim = Simulation::new(config()).unwrap();
        let id = sim.pool().ids_of(EntityKind::Pizza)[0];
        for _ in 0..3 {
            sim.tick([]).unwrap();
        }
        assert_eq!(sim.pool().get(id).unwrap().visual.rotation, 0.0);
        sim.tick([]).unwrap();
        assert!((sim.pool().get(id).unwrap().visual.rotation + FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_speed_keys_clamped_and_work_while_paused() {
        let mut sim = Simulation::new(config()).unwrap();
        sim.tick([InputEvent::KeyDown(Key::Space)]).unwrap();
        assert_eq!(sim.clock().state(), ClockState::Paused);
        sim.tick([InputEvent::KeyDown(Key::Down); 10]).unwrap();
        assert_eq!(sim.modulator().rate(VERTICAL_SPEED), Some(6.0));
        sim.tick([InputEvent::KeyDown(Key::Up); 10]).unwrap();
        assert_eq!(sim.modulator().rate(VERTICAL_SPEED), Some(1.0));
        assert_eq!(sim.clock().state(), ClockState::Paused);
    }

    #[test]
    fn test_wraps_to_top() {
        let mut sim = Simulation::new(config()).unwrap();
        for _ in 0..300 {
            sim.tick([]).unwrap();
        }
        for e in sim.pool().alive() {
            assert!(e.visual.position.y - 30.0 <= 600.0);
            assert!(e.visual.position.y >= -30.0);
        }
        assert_eq!(sim.pool().count_kind(EntityKind::Pizza), 5);
    }
}
