//! Solar system
//!
//! A static sun at the screen center and planets on circular orbits. Planets
//! are kinematic and never touch anything; each tick they advance by
//! `atan(step)` radians around the center with the orbit radius held fixed.

use glam::Vec2;
use rand::Rng;

use super::{Ctx, KeyType, Setup, background, palette_or_random};
use crate::config::{ConfigSnapshot, Rgb};
use crate::error::{ConfigError, Result};
use crate::rotate_about;
use crate::sim::entity::{EntityId, EntityKind, SpriteRef, VisualState};
use crate::sim::input::InputBindings;
use crate::sim::physics::{BodySpec, PhysicsWorld, Shape};
use crate::sim::pool::{ColorRule, EntityPool, EntityTemplate, ExitEdges};

pub const REQUIRED_KEYS: &[(&str, KeyType)] = &[
    ("n_planets", KeyType::Count),
    ("sun_radius", KeyType::Positive),
    ("intra_planets_distance", KeyType::Number),
    ("planets_radius", KeyType::List),
    ("planets_translation_steps", KeyType::List),
];

const SUN_FALLBACK: Rgb = Rgb(255, 200, 0);

pub fn validate(config: &ConfigSnapshot) -> Result<(), ConfigError> {
    let n = config.require_number("n_planets")? as usize;
    for key in ["planets_radius", "planets_translation_steps"] {
        let len = config.list(key).map_or(0, <[f64]>::len);
        if len < n {
            return Err(ConfigError::invalid(
                key,
                format!("needs {n} entries for n_planets, got {len}"),
            ));
        }
    }
    if let Some(r) = config
        .list("planets_radius")
        .and_then(|radii| radii[..n].iter().find(|r| **r <= 0.0))
    {
        return Err(ConfigError::invalid("planets_radius", format!("must be > 0, got {r}")));
    }
    Ok(())
}

/// Circular path of one planet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    pub planet: EntityId,
    pub radius: f32,
    /// Current angle from the +x axis, y down
    pub angle: f32,
    /// Signed angle per tick
    pub angular_step: f32,
}

impl Orbit {
    fn position(&self, center: Vec2) -> Vec2 {
        rotate_about(center + Vec2::X * self.radius, center, self.angle)
    }
}

#[derive(Debug, Clone)]
pub struct SolarSystem {
    sun: EntityId,
    center: Vec2,
    orbits: Vec<Orbit>,
}

impl SolarSystem {
    pub fn bootstrap(
        config: &ConfigSnapshot,
        world: &mut PhysicsWorld,
        pool: &mut EntityPool,
    ) -> Result<(Self, Setup)> {
        let center = config.screen_center().floor();
        let sun_radius = config.require_number("sun_radius")? as f32;
        let gap = config.require_number("intra_planets_distance")? as f32;
        let n = config.require_number("n_planets")? as usize;
        let radii = config.list("planets_radius").unwrap_or_default();
        let steps = config.list("planets_translation_steps").unwrap_or_default();

        let sun_color = config.color_or("sun", SUN_FALLBACK);
        let sun = pool.insert(
            world,
            EntityKind::StaticStructure,
            BodySpec::fixed(Shape::Circle { radius: sun_radius })
                .with_position(center)
                .with_collisions(false),
            VisualState::circle(center, sun_radius, sun_color),
            None,
        )?;

        let mut orbits = Vec::with_capacity(n);
        let mut next_y = center.y - sun_radius - gap;
        for (i, (&radius, &step)) in radii.iter().zip(steps).take(n).enumerate() {
            let radius = radius as f32;
            next_y -= radius;
            let position = Vec2::new(center.x, next_y);
            next_y -= radius + gap;

            let color = palette_or_random(config, &format!("planet_{i}"), pool.rng());
            let clockwise = pool.rng().random_bool(0.5);
            let template = EntityTemplate::circle(EntityKind::Planet, radius, 1.0)
                .kinematic()
                .without_collisions()
                .with_color(ColorRule::Fixed(color));
            let planet = pool.spawn(world, &template, position, Vec2::ZERO)?;

            let turn = (step as f32).atan();
            orbits.push(Orbit {
                planet,
                radius: center.y - position.y,
                angle: (position - center).to_angle(),
                // Clockwise on screen is a growing angle when y points down
                angular_step: if clockwise { turn } else { -turn },
            });
        }
        log::info!("Solar system with {} planets around a sun of radius {sun_radius}", orbits.len());

        let mut bg = background(config);
        bg.sprite = config.text("background_sprite").map(|s| SpriteRef(s.to_string()));
        let setup = Setup::new(InputBindings::new(), ExitEdges::NONE, bg);
        Ok((Self { sun, center, orbits }, setup))
    }

    /// Move every planet one step along its orbit
    pub fn before_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<()> {
        for orbit in &mut self.orbits {
            orbit.angle = crate::normalize_angle(orbit.angle + orbit.angular_step);
            ctx.pool
                .set_position(ctx.world, orbit.planet, orbit.position(self.center))?;
        }
        Ok(())
    }

    pub fn sun(&self) -> EntityId {
        self.sun
    }

    pub fn orbits(&self) -> &[Orbit] {
        &self.orbits
    }
}
