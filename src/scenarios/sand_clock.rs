//! Sand clock
//!
//! An hourglass of six static segments with grains starting in the upper
//! bulb. Space tips the clock over by mirroring every grain about the neck;
//! R asks for a fresh run.

use glam::Vec2;
use rand::Rng;

use super::{Ctx, KeyType, Setup, background};
use crate::config::{ConfigSnapshot, Rgb};
use crate::error::{ConfigError, Result};
use crate::mirror_y;
use crate::sim::entity::{EntityId, EntityKind};
use crate::sim::input::{Action, InputBindings, Key};
use crate::sim::physics::PhysicsWorld;
use crate::sim::pool::{ColorRule, EntityPool, EntityTemplate, ExitEdges};

pub const REQUIRED_KEYS: &[(&str, KeyType)] = &[
    ("n_sand_grains", KeyType::Count),
    ("structure_width", KeyType::Positive),
    ("structure_height", KeyType::Positive),
    ("neck_width", KeyType::Positive),
    ("line_width", KeyType::Positive),
    ("sand_grain_color_type", KeyType::Text),
];

pub const DESERT_YELLOW: Rgb = Rgb(255, 200, 0);
const STRUCTURE_SEGMENTS: usize = 6;
/// Grains start this far from the outer wall and the neck
const WALL_CLEARANCE: f32 = 30.0;
const NECK_CLEARANCE: f32 = 15.0;
const LID_CLEARANCE: f32 = 5.0;

pub fn validate(config: &ConfigSnapshot) -> Result<(), ConfigError> {
    match config.text("sand_grain_color_type") {
        Some("random" | "yellow") => {}
        other => {
            return Err(ConfigError::invalid(
                "sand_grain_color_type",
                format!("must be 'random' or 'yellow', got {other:?}"),
            ));
        }
    }
    let width = config.require_number("structure_width")?;
    let height = config.require_number("structure_height")?;
    if config.require_number("neck_width")? >= width {
        return Err(ConfigError::invalid("neck_width", "must be narrower than the structure"));
    }
    if width > f64::from(config.screen_width()) || height > f64::from(config.screen_height()) {
        return Err(ConfigError::invalid("structure_width", "structure must fit on screen"));
    }
    let grains = config.require_number("n_sand_grains")? as usize;
    if grains + STRUCTURE_SEGMENTS > config.max_entities() {
        return Err(ConfigError::invalid(
            "n_sand_grains",
            format!("{grains} grains do not fit in max_entities {}", config.max_entities()),
        ));
    }
    if let Some(scale) = config.number("tip_time_scale") {
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(ConfigError::invalid("tip_time_scale", "must be > 0"));
        }
    }
    Ok(())
}

/// Hourglass outline around the neck center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hourglass {
    pub center: Vec2,
    pub top_left: Vec2,
    pub top_right: Vec2,
    pub neck_left: Vec2,
    pub neck_right: Vec2,
    pub bottom_left: Vec2,
    pub bottom_right: Vec2,
}

impl Hourglass {
    pub fn new(center: Vec2, width: f32, height: f32, neck_width: f32) -> Self {
        let (hw, hh, hn) = ((width / 2.0).floor(), (height / 2.0).floor(), (neck_width / 2.0).floor());
        Self {
            center,
            top_left: center + Vec2::new(-hw, -hh),
            top_right: center + Vec2::new(hw, -hh),
            neck_left: center + Vec2::new(-hn, 0.0),
            neck_right: center + Vec2::new(hn, 0.0),
            bottom_left: center + Vec2::new(-hw, hh),
            bottom_right: center + Vec2::new(hw, hh),
        }
    }

    /// The six outline segments, clockwise from the lid
    pub fn segments(&self) -> [(Vec2, Vec2); STRUCTURE_SEGMENTS] {
        [
            (self.top_left, self.top_right),
            (self.top_right, self.neck_right),
            (self.neck_right, self.bottom_right),
            (self.bottom_right, self.bottom_left),
            (self.bottom_left, self.neck_left),
            (self.neck_left, self.top_left),
        ]
    }

    /// Random start point inside the upper bulb
    ///
    /// Picks a point under the left diagonal (lid corner to neck center),
    /// then flips it to the right half on a coin toss.
    pub fn random_upper_point(&self, rng: &mut impl Rng) -> Vec2 {
        let (tl, c) = (self.top_left, self.center);
        let slope = (tl.y - c.y) / (tl.x - c.x);
        let intercept = tl.y - slope * tl.x;

        let x = uniform_int(rng, tl.x + WALL_CLEARANCE, c.x - NECK_CLEARANCE);
        let y_max = (slope * x + intercept).trunc();
        let y = uniform_int(rng, tl.y + LID_CLEARANCE, y_max - LID_CLEARANCE);
        let x = if rng.random::<f32>() > 0.5 { 2.0 * c.x - x } else { x };
        Vec2::new(x, y)
    }
}

/// Whole number in `[lo, hi)`, or `lo` when the range is empty
fn uniform_int(rng: &mut impl Rng, lo: f32, hi: f32) -> f32 {
    let (lo, hi) = (lo.floor() as i64, hi.floor() as i64);
    if hi > lo { rng.random_range(lo..hi) as f32 } else { lo as f32 }
}

#[derive(Debug, Clone)]
pub struct SandClock {
    hourglass: Hourglass,
    tips: u32,
    slow_motion: Option<(f32, u32)>,
}

impl SandClock {
    pub fn bootstrap(
        config: &ConfigSnapshot,
        world: &mut PhysicsWorld,
        pool: &mut EntityPool,
    ) -> Result<(Self, Setup)> {
        let hourglass = Hourglass::new(
            config.screen_center().floor(),
            config.require_number("structure_width")? as f32,
            config.require_number("structure_height")? as f32,
            config.require_number("neck_width")? as f32,
        );
        let line_width = config.require_number("line_width")? as f32;
        let line_color = config.color_or("line", Rgb::WHITE);
        for (a, b) in hourglass.segments() {
            pool.spawn_structure_line(world, a, b, line_width, line_color)?;
        }

        let d = config.defaults();
        let radius = config.number_or("sand_grain_radius", f64::from(d.radius)) as f32;
        let mass = config.number_or("sand_grain_mass", f64::from(d.mass)) as f32;
        let color = match config.text("sand_grain_color_type") {
            Some("yellow") => ColorRule::Fixed(DESERT_YELLOW),
            _ => ColorRule::Random,
        };
        let template = EntityTemplate::circle(EntityKind::Grain, radius, mass)
            .with_material(d.elasticity, d.friction)
            .with_moment(1.0)
            .with_color(color);

        let grains = config.require_number("n_sand_grains")? as usize;
        for _ in 0..grains {
            let pos = hourglass.random_upper_point(pool.rng());
            pool.spawn(world, &template, pos, Vec2::ZERO)?;
        }
        log::info!("Hourglass filled with {grains} grains");

        let slow_motion = match (config.number("tip_time_scale"), config.number("tip_slow_motion_ticks")) {
            (Some(scale), Some(ticks)) if ticks >= 1.0 => Some((scale as f32, ticks as u32)),
            _ => None,
        };

        let bindings = InputBindings::new()
            .on_key(Key::Space, Action::TipOver)
            .on_key(Key::R, Action::Restart);
        let setup = Setup::new(bindings, ExitEdges::BOTTOM, background(config));
        Ok((
            Self {
                hourglass,
                tips: 0,
                slow_motion,
            },
            setup,
        ))
    }

    pub fn on_action(&mut self, action: Action, ctx: &mut Ctx<'_>) -> Result<()> {
        if action != Action::TipOver {
            return Ok(());
        }
        let neck_y = self.hourglass.center.y;
        for id in ctx.pool.ids_of(EntityKind::Grain) {
            let Some(pos) = ctx.pool.get(id).map(|e| e.visual.position) else {
                continue;
            };
            ctx.pool.set_position(ctx.world, id, mirror_y(pos, neck_y))?;
        }
        self.tips += 1;
        if let Some((scale, ticks)) = self.slow_motion {
            ctx.clock.set_time_scale(scale, ticks);
        }
        log::info!("Sand clock tipped over ({} times)", self.tips);
        Ok(())
    }

    pub fn hourglass(&self) -> &Hourglass {
        &self.hourglass
    }

    pub fn tips(&self) -> u32 {
        self.tips
    }

    pub fn grains(pool: &EntityPool) -> Vec<EntityId> {
        pool.ids_of(EntityKind::Grain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, ScenarioKind};
    use crate::sim::input::InputEvent;
    use crate::sim::Simulation;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn builder() -> crate::config::ConfigBuilder {
        ConfigSnapshot::builder(ScenarioKind::SandClock)
            .gravity(Vec2::new(0.0, 400.0))
            .number("n_sand_grains", 40.0)
            .number("structure_width", 300.0)
            .number("structure_height", 400.0)
            .number("neck_width", 20.0)
            .number("line_width", 3.0)
            .number("sand_grain_radius", 4.0)
            .text("sand_grain_color_type", "yellow")
    }

    fn upper_bulb_contains(h: &Hourglass, p: Vec2) -> bool {
        p.y < h.center.y && p.y > h.top_left.y && p.x > h.top_left.x && p.x < h.top_right.x
    }

    #[test]
    fn test_random_points_in_upper_bulb() {
        let h = Hourglass::new(Vec2::new(400.0, 300.0), 300.0, 400.0, 20.0);
        let mut rng = Pcg32::seed_from_u64(8);
        for _ in 0..200 {
            let p = h.random_upper_point(&mut rng);
            assert!(upper_bulb_contains(&h, p), "{p:?}");
        }
    }

    #[test]
    fn test_bootstrap_structure_and_grains() {
        let sim = Simulation::new(builder().build().unwrap()).unwrap();
        assert_eq!(sim.pool().count_kind(EntityKind::StaticStructure), 6);
        assert_eq!(sim.pool().count_kind(EntityKind::Grain), 40);
        assert!(sim.pool().alive().filter(|e| e.kind == EntityKind::Grain).all(|e| e.visual.color == DESERT_YELLOW));
    }

    #[test]
    fn test_tip_mirrors_grains_about_neck() {
        let mut sim = Simulation::new(builder().build().unwrap()).unwrap();
        let before: Vec<Vec2> = SandClock::grains(sim.pool())
            .iter()
            .map(|id| sim.pool().get(*id).unwrap().visual.position)
            .collect();
        // One physics step runs after the flip; allow for a little settling
        sim.tick([InputEvent::KeyDown(Key::Space)]).unwrap();
        let after: Vec<Vec2> = SandClock::grains(sim.pool())
            .iter()
            .map(|id| sim.pool().get(*id).unwrap().visual.position)
            .collect();
        for (b, a) in before.iter().zip(&after) {
            assert!(a.y > 310.0, "grain should be in the lower bulb: {a:?}");
            assert!((a.x - b.x).abs() < 10.0);
        }
        match sim.scenario() {
            Scenario::SandClock(s) => assert_eq!(s.tips(), 1),
            other => panic!("unexpected scenario {:?}", other.kind()),
        }
    }

    #[test]
    fn test_tip_enters_slow_motion() {
        let config = builder()
            .number("tip_time_scale", 0.25)
            .number("tip_slow_motion_ticks", 30.0)
            .build()
            .unwrap();
        let mut sim = Simulation::new(config).unwrap();
        sim.tick([InputEvent::KeyDown(Key::Space)]).unwrap();
        assert_eq!(sim.clock().time_scale(), 0.25);
    }

    #[test]
    fn test_restart_key_requests_restart() {
        let mut sim = Simulation::new(builder().build().unwrap()).unwrap();
        for _ in 0..20 {
            sim.tick([]).unwrap();
        }
        let report = sim.tick([InputEvent::KeyDown(Key::R)]).unwrap();
        assert!(report.restart_requested);
        sim.restart().unwrap();
        assert_eq!(sim.clock().tick(), 0);
        assert_eq!(sim.pool().count_kind(EntityKind::Grain), 40);
    }

    #[test]
    fn test_bad_color_type_rejected() {
        let err = builder().text("sand_grain_color_type", "blue").build().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_grains_must_fit_pool() {
        let err = builder().max_entities(20).build().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
