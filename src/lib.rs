//! Sim Gallery - configurable 2D physics demos on one fixed-step engine
//!
//! Core modules:
//! - `config`: Validated, immutable run configuration (YAML/JSON files)
//! - `sim`: Deterministic simulation (physics world, entities, collisions, clock, input)
//! - `scenarios`: The individual demos built on top of `sim`
//! - `renderer`: GPU hand-off of the per-frame render list

pub mod config;
pub mod error;
pub mod renderer;
pub mod scenarios;
pub mod sim;

pub use config::{ConfigSnapshot, ParamValue, Rgb};
pub use error::{ConfigError, Result, SimError};
pub use scenarios::ScenarioKind;
pub use sim::{Frame, InputEvent, Key, Simulation, TickReport};

use glam::Vec2;

/// Engine configuration constants
pub mod consts {
    /// Default fixed simulation timestep (60 Hz)
    pub const DEFAULT_STEP: f32 = 1.0 / 60.0;
    /// Maximum substeps per rendered frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest frame delta accepted by the accumulator (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Default distance past the screen edge before an entity is culled
    pub const DEFAULT_BOUNDARY_MARGIN: f32 = 50.0;
    /// Default cap on concurrently live entities
    pub const DEFAULT_MAX_ENTITIES: usize = 4096;

    /// Thickness of the invisible screen walls
    pub const WALL_RADIUS: f32 = 4.0;

    /// Typical body size in pixels; scales the physics engine's contact tolerances
    pub const PHYSICS_LENGTH_UNIT: f32 = 10.0;
}

/// Rotate a vector around `center` by `angle` radians
#[inline]
pub fn rotate_about(p: Vec2, center: Vec2, angle: f32) -> Vec2 {
    center + Vec2::from_angle(angle).rotate(p - center)
}

/// Mirror a point vertically about the horizontal line `y = axis_y`
#[inline]
pub fn mirror_y(p: Vec2, axis_y: f32) -> Vec2 {
    Vec2::new(p.x, 2.0 * axis_y - p.y)
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_about_quarter_turn() {
        let p = rotate_about(Vec2::new(2.0, 1.0), Vec2::new(1.0, 1.0), std::f32::consts::FRAC_PI_2);
        assert!((p.x - 1.0).abs() < 1e-5);
        assert!((p.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_mirror_y() {
        assert_eq!(mirror_y(Vec2::new(3.0, 10.0), 50.0), Vec2::new(3.0, 90.0));
    }

    #[test]
    fn test_normalize_angle_wraps() {
        let a = normalize_angle(3.0 * std::f32::consts::PI);
        assert!((a + std::f32::consts::PI).abs() < 1e-5);
    }
}
