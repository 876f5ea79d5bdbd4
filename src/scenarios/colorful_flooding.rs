//! Colorful flooding
//!
//! Evenly spaced sources pour colored balls into a closed box. Space stops
//! the sources and drops the floor; the run ends when the last ball is gone.

use glam::Vec2;

use super::{Ctx, KeyType, Setup, background, boundary_walls};
use crate::config::ConfigSnapshot;
use crate::error::Result;
use crate::sim::entity::EntityKind;
use crate::sim::input::{Action, InputBindings, Key};
use crate::sim::physics::{BodyHandle, PhysicsWorld};
use crate::sim::pool::{ColorRule, EntityPool, EntityTemplate, ExitEdges, Jitter, Source};

pub const REQUIRED_KEYS: &[(&str, KeyType)] = &[
    ("n_sources", KeyType::Count),
    ("create_balls_every", KeyType::Count),
];

#[derive(Debug, Clone)]
pub struct ColorfulFlooding {
    /// Present until the operator stops the flood
    floor: Option<BodyHandle>,
}

impl ColorfulFlooding {
    pub fn bootstrap(
        config: &ConfigSnapshot,
        world: &mut PhysicsWorld,
        pool: &mut EntityPool,
    ) -> Result<(Self, Setup)> {
        let size = config.screen_size();
        let [_, _, floor, _] = boundary_walls(world, size, 1.0, 1.0);

        let n = config.require_number("n_sources")? as u32;
        let every = config.require_number("create_balls_every")? as u64;
        let d = config.defaults();
        let template = EntityTemplate::circle(EntityKind::Ball, d.radius, d.mass)
            .with_material(d.elasticity, d.friction)
            .with_moment(1.0)
            .with_color(ColorRule::Random);

        let y = (size.y / 5.0).floor();
        let spacing = (size.x / (n + 1) as f32).floor();
        for k in 1..=n {
            let source = Source::new(Vec2::new(k as f32 * spacing, y), every, template.clone())
                .with_jitter(Jitter::Nudge(1.0));
            pool.add_source(source);
        }
        log::info!("Flooding from {n} sources every {every} ticks");

        let setup = Setup::new(
            InputBindings::new().on_key(Key::Space, Action::StopGenerating),
            ExitEdges::BOTTOM,
            background(config),
        );
        Ok((Self { floor: Some(floor) }, setup))
    }

    pub fn on_action(&mut self, action: Action, ctx: &mut Ctx<'_>) -> Result<()> {
        if action == Action::StopGenerating {
            ctx.pool.stop_generating();
            if let Some(floor) = self.floor.take() {
                ctx.world.release(floor)?;
                log::info!("Floor removed; {} balls draining", ctx.pool.count_kind(EntityKind::Ball));
            }
        }
        Ok(())
    }

    pub fn is_finished(&self, pool: &EntityPool) -> bool {
        !pool.is_generating() && pool.count_kind(EntityKind::Ball) == 0
    }

    pub fn has_floor(&self) -> bool {
        self.floor.is_some()
    }
}
