//! Wrecking ball
//!
//! A kinematic ball bounces around the screen while small balls rain from
//! above it. The wrecking ball is never deflected; small balls bounce off it
//! or, with `wreck_destroys`, shatter into short-lived debris.

use std::f32::consts::PI;

use glam::Vec2;
use rand::Rng;

use super::{Ctx, KeyType, Setup, background, ordered_pair};
use crate::config::{ConfigSnapshot, Rgb};
use crate::error::{ConfigError, Result};
use crate::sim::entity::{EntityId, EntityKind};
use crate::sim::input::InputBindings;
use crate::sim::physics::PhysicsWorld;
use crate::sim::pool::{ColorRule, EntityPool, EntityTemplate, ExitEdges, Jitter, Source};
use crate::sim::router::{CollisionRouter, Hit, Mutation, Side, rules};

pub const REQUIRED_KEYS: &[(&str, KeyType)] = &[
    ("wrecking_ball_radius", KeyType::Positive),
    ("min_velocity_x", KeyType::Number),
    ("max_velocity_x", KeyType::Number),
    ("min_velocity_y", KeyType::Number),
    ("max_velocity_y", KeyType::Number),
    ("small_ball_radius", KeyType::Positive),
    ("small_ball_mass", KeyType::Positive),
];

const WRECKING_BALL_FALLBACK: Rgb = Rgb(90, 90, 90);
const DEBRIS_PIECES: u32 = 3;
const DEBRIS_RADIUS: f32 = 3.0;
const DEBRIS_MASS: f32 = 1.0;
const DEBRIS_LIFESPAN: u32 = 20;
const DEBRIS_SPEED: f32 = 120.0;

pub fn validate(config: &ConfigSnapshot) -> Result<(), ConfigError> {
    ordered_pair(config, "min_velocity_x", "max_velocity_x")?;
    ordered_pair(config, "min_velocity_y", "max_velocity_y")?;
    let radius = config.require_number("wrecking_ball_radius")?;
    if 2.0 * radius >= f64::from(config.screen_width().min(config.screen_height())) {
        return Err(ConfigError::invalid("wrecking_ball_radius", "ball must fit on the screen"));
    }
    match config.number("wreck_destroys") {
        Some(v) if v != 0.0 && v != 1.0 => Err(ConfigError::invalid("wreck_destroys", format!("must be 0 or 1, got {v}"))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct WreckingBall {
    ball: EntityId,
    radius: f32,
    screen: Vec2,
}

impl WreckingBall {
    pub fn bootstrap(
        config: &ConfigSnapshot,
        world: &mut PhysicsWorld,
        pool: &mut EntityPool,
    ) -> Result<(Self, Setup)> {
        let size = config.screen_size();
        let radius = config.require_number("wrecking_ball_radius")? as f32;
        let velocity = {
            let rng = pool.rng();
            let mut component = |lo: &str, hi: &str| -> f32 {
                let (lo, hi) = (config.number_or(lo, 0.0), config.number_or(hi, 0.0));
                let magnitude = (if hi > lo { rng.random_range(lo..hi) } else { lo }) as f32;
                if rng.random_bool(0.5) { magnitude } else { -magnitude }
            };
            let vx = component("min_velocity_x", "max_velocity_x");
            let vy = component("min_velocity_y", "max_velocity_y");
            Vec2::new(vx, vy)
        };
        let template = EntityTemplate::circle(EntityKind::WreckingBall, radius, 1.0)
            .kinematic()
            .with_material(1.0, 0.0)
            .with_color(ColorRule::Fixed(config.color_or("wrecking_ball", WRECKING_BALL_FALLBACK)));
        let ball = pool.spawn(world, &template, config.screen_center().floor(), velocity)?;

        let d = config.defaults();
        let small = EntityTemplate::circle(
            EntityKind::Ball,
            config.require_number("small_ball_radius")? as f32,
            config.require_number("small_ball_mass")? as f32,
        )
        .with_material(d.elasticity, d.friction)
        .with_moment(1.0)
        .with_color(ColorRule::Random);
        // Uniform x across the width, a quarter screen above the top
        let half = (size.x * 0.5).floor();
        pool.add_source(
            Source::new(Vec2::new(half, -(size.y / 4.0).floor()), 1, small).with_jitter(Jitter::Span(half)),
        );

        let mut setup = Setup::new(InputBindings::new(), ExitEdges::SIDES_AND_BOTTOM, background(config));
        if config.number("wreck_destroys") == Some(1.0) {
            setup = setup.with_router(CollisionRouter::new().with_rule(
                Side::Kind(EntityKind::WreckingBall),
                Side::Kind(EntityKind::Ball),
                shatter,
            ));
        }
        log::info!("Wrecking ball launched at {velocity:?}");
        Ok((Self { ball, radius, screen: size }, setup))
    }

    /// Keep the wrecking ball on screen
    pub fn before_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<()> {
        let Some(entity) = ctx.pool.get(self.ball) else {
            return Ok(());
        };
        let p = entity.visual.position;
        let mut v = ctx.world.body(entity.handle())?.velocity;
        let r = self.radius;
        // Point the velocity back inside rather than flipping it, so a ball
        // that is still past an edge next tick does not turn around again
        if p.x - r < 0.0 {
            v.x = v.x.abs();
        } else if p.x + r > self.screen.x {
            v.x = -v.x.abs();
        }
        if p.y - r < 0.0 {
            v.y = v.y.abs();
        } else if p.y + r > self.screen.y {
            v.y = -v.y.abs();
        }
        ctx.pool.set_velocity(ctx.world, self.ball, v)
    }

    pub fn ball(&self) -> EntityId {
        self.ball
    }
}

/// Destroy the small ball and scatter debris from the contact point
fn shatter(hit: &Hit<'_>, out: &mut Vec<Mutation>) {
    let Some(ball) = hit.second else {
        return;
    };
    rules::remove_second(hit, out);
    let template = EntityTemplate::circle(EntityKind::Spark, DEBRIS_RADIUS, DEBRIS_MASS)
        .without_collisions()
        .with_lifespan(DEBRIS_LIFESPAN)
        .with_color(ColorRule::Fixed(ball.visual.color));
    for k in 0..DEBRIS_PIECES {
        // Fan upward, away from the floor
        let angle = -PI * (k as f32 + 1.0) / (DEBRIS_PIECES as f32 + 1.0);
        out.push(Mutation::Spawn {
            template: template.clone(),
            position: hit.point,
            velocity: Vec2::from_angle(angle) * DEBRIS_SPEED,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, ScenarioKind};
    use crate::sim::Simulation;

    fn builder() -> crate::config::ConfigBuilder {
        ConfigSnapshot::builder(ScenarioKind::WreckingBall)
            .gravity(Vec2::new(0.0, 600.0))
            .number("wrecking_ball_radius", 60.0)
            .number("min_velocity_x", 150.0)
            .number("max_velocity_x", 300.0)
            .number("min_velocity_y", 150.0)
            .number("max_velocity_y", 300.0)
            .number("small_ball_radius", 6.0)
            .number("small_ball_mass", 1.0)
            .seed(21)
    }

    fn ball_id(sim: &Simulation) -> EntityId {
        match sim.scenario() {
            Scenario::WreckingBall(s) => s.ball(),
            other => panic!("unexpected scenario {:?}", other.kind()),
        }
    }

    #[test]
    fn test_one_small_ball_per_tick() {
        let mut sim = Simulation::new(builder().build().unwrap()).unwrap();
        for _ in 0..10 {
            sim.tick([]).unwrap();
        }
        assert_eq!(sim.pool().count_kind(EntityKind::Ball), 10);
        for e in sim.pool().alive().filter(|e| e.kind == EntityKind::Ball) {
            assert!(e.visual.position.y < 0.0);
        }
    }

    #[test]
    fn test_wrecking_ball_stays_on_screen() {
        let mut sim = Simulation::new(builder().build().unwrap()).unwrap();
        let id = ball_id(&sim);
        for _ in 0..1200 {
            sim.tick([]).unwrap();
            let p = sim.pool().get(id).unwrap().visual.position;
            // At most one tick of travel past an edge
            assert!(p.x > 60.0 - 6.0 && p.x < 740.0 + 6.0, "{p:?}");
            assert!(p.y > 60.0 - 6.0 && p.y < 540.0 + 6.0, "{p:?}");
        }
    }

    #[test]
    fn test_fallen_balls_are_culled() {
        let mut sim = Simulation::new(builder().build().unwrap()).unwrap();
        for _ in 0..600 {
            sim.tick([]).unwrap();
        }
        // Balls reach the bottom well within ten seconds, so the count plateaus
        assert!(sim.pool().removed_total() > 0);
        assert!(sim.pool().count_kind(EntityKind::Ball) < 600);
    }

    #[test]
    fn test_shatter_rule_only_when_enabled() {
        let plain = Simulation::new(builder().build().unwrap()).unwrap();
        assert!(plain.pool().get(ball_id(&plain)).is_some());
        let mut sim = Simulation::new(builder().number("wreck_destroys", 1.0).build().unwrap()).unwrap();
        let mut sparks_seen = false;
        for _ in 0..600 {
            sim.tick([]).unwrap();
            sparks_seen |= sim.pool().count_kind(EntityKind::Spark) > 0;
        }
        assert!(sparks_seen);
        assert!(sim.pool().get(ball_id(&sim)).unwrap().is_alive());
    }

    #[test]
    fn test_shatter_removes_ball_and_fans_debris_upward() {
        let mut sim = Simulation::new(builder().build().unwrap()).unwrap();
        sim.tick([]).unwrap();
        let wreck = sim.pool().get(ball_id(&sim)).unwrap();
        let small = sim.pool().alive().find(|e| e.kind == EntityKind::Ball).unwrap();
        let hit = Hit {
            first: wreck,
            second: Some(small),
            point: Vec2::new(10.0, 20.0),
            normal_impulse: 1.0,
        };
        let mut out = Vec::new();
        shatter(&hit, &mut out);
        assert_eq!(out.len(), 1 + DEBRIS_PIECES as usize);
        assert_eq!(out[0], Mutation::MarkForRemoval(small.id));
        for m in &out[1..] {
            match m {
                Mutation::Spawn { position, velocity, .. } => {
                    assert_eq!(*position, hit.point);
                    assert!(velocity.y < 0.0, "{velocity:?}");
                }
                other => panic!("unexpected mutation {other:?}"),
            }
        }
    }

    #[test]
    fn test_bad_wreck_flag_rejected() {
        let err = builder().number("wreck_destroys", 2.0).build().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
