//! Run configuration
//!
//! Each demo is driven by a human-editable YAML (or JSON) file. The file is
//! parsed into a [`RawConfig`], validated once, and frozen into a
//! [`ConfigSnapshot`]. A new run needs a new snapshot.

use std::collections::BTreeMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_BOUNDARY_MARGIN, DEFAULT_MAX_ENTITIES, DEFAULT_STEP};
use crate::error::ConfigError;
use crate::scenarios::{self, KeyType, ScenarioKind};

/// 8-bit RGB color, written as `[r, g, b]` in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Normalized RGBA for GPU upload
    pub fn to_rgba(self) -> [f32; 4] {
        [
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
            1.0,
        ]
    }
}

/// A scenario-specific structural parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    List(Vec<f64>),
}

/// Material and size defaults for dynamically spawned entities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityDefaults {
    pub mass: f32,
    pub radius: f32,
    #[serde(default = "default_elasticity")]
    pub elasticity: f32,
    #[serde(default = "default_friction")]
    pub friction: f32,
}

fn default_elasticity() -> f32 {
    0.5
}

fn default_friction() -> f32 {
    0.5
}

impl Default for EntityDefaults {
    fn default() -> Self {
        Self {
            mass: 10.0,
            radius: 8.0,
            elasticity: default_elasticity(),
            friction: default_friction(),
        }
    }
}

/// Gravity that follows the pointer, relative to a reference point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerGravity {
    /// Magnitude of the resulting gravity vector (px/s²)
    pub strength: f32,
    /// Reference point; screen center when omitted
    #[serde(default)]
    pub reference: Option<Vec2>,
}

fn default_step() -> f32 {
    DEFAULT_STEP
}

fn default_max_entities() -> usize {
    DEFAULT_MAX_ENTITIES
}

fn default_margin() -> f32 {
    DEFAULT_BOUNDARY_MARGIN
}

/// Configuration exactly as written in the file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    pub scenario: String,
    pub screen_width: f32,
    pub screen_height: f32,
    /// Window caption template (HUD text is drawn by the external renderer)
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub gravity: Vec2,
    #[serde(default = "default_step")]
    pub fixed_step_seconds: f32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_max_entities")]
    pub max_entities: usize,
    #[serde(default = "default_margin")]
    pub boundary_margin: f32,
    #[serde(default)]
    pub entity_defaults: EntityDefaults,
    #[serde(default)]
    pub structural: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub palette: BTreeMap<String, Rgb>,
    #[serde(default)]
    pub pointer_gravity: Option<PointerGravity>,
}

/// Legacy `- config: {...}` wrapped file layout
#[derive(Debug, Deserialize)]
struct WrappedConfig {
    config: RawConfig,
}

impl WrappedConfig {
    fn first(list: Vec<WrappedConfig>) -> Result<RawConfig, ConfigError> {
        list.into_iter()
            .next()
            .map(|w| w.config)
            .ok_or_else(|| ConfigError::invalid("config", "empty config list"))
    }
}

/// Immutable, validated parameters for one simulation run
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    scenario: ScenarioKind,
    screen: Vec2,
    caption: Option<String>,
    gravity: Vec2,
    fixed_step: f32,
    seed: u64,
    max_entities: usize,
    boundary_margin: f32,
    defaults: EntityDefaults,
    structural: BTreeMap<String, ParamValue>,
    palette: BTreeMap<String, Rgb>,
    pointer_gravity: Option<PointerGravity>,
}

impl ConfigSnapshot {
    /// Load and validate a config file (`.yml`, `.yaml` or `.json`)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&text)?,
            Some("json") => Self::from_json_str(&text)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        log::info!(
            "Loaded {} config from {}",
            snapshot.scenario.name(),
            path.display()
        );
        Ok(snapshot)
    }

    /// Plain mapping or the wrapped list layout; the document's shape picks
    /// the schema so field errors keep their location
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
        let raw = if doc.is_sequence() {
            WrappedConfig::first(serde_yaml::from_str(text)?)?
        } else {
            serde_yaml::from_str::<RawConfig>(text)?
        };
        Self::from_raw(raw)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let doc: serde_json::Value = serde_json::from_str(text)?;
        let raw = if doc.is_array() {
            WrappedConfig::first(serde_json::from_str(text)?)?
        } else {
            serde_json::from_str::<RawConfig>(text)?
        };
        Self::from_raw(raw)
    }

    /// Programmatic construction (tests, tools)
    pub fn builder(scenario: ScenarioKind) -> ConfigBuilder {
        ConfigBuilder::new(scenario)
    }

    /// Validate a raw config and freeze it
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let scenario: ScenarioKind = raw.scenario.parse()?;

        screen_dimension("screen_width", raw.screen_width)?;
        screen_dimension("screen_height", raw.screen_height)?;
        positive("fixed_step_seconds", raw.fixed_step_seconds)?;
        positive("entity_defaults.mass", raw.entity_defaults.mass)?;
        positive("entity_defaults.radius", raw.entity_defaults.radius)?;
        unit_interval("entity_defaults.elasticity", raw.entity_defaults.elasticity)?;
        unit_interval("entity_defaults.friction", raw.entity_defaults.friction)?;
        if !raw.gravity.is_finite() {
            return Err(ConfigError::invalid("gravity", "must be finite"));
        }
        if !raw.boundary_margin.is_finite() || raw.boundary_margin < 0.0 {
            return Err(ConfigError::invalid("boundary_margin", "must be >= 0"));
        }
        if raw.max_entities == 0 {
            return Err(ConfigError::invalid("max_entities", "must be > 0"));
        }
        if let Some(pg) = raw.pointer_gravity {
            if !pg.strength.is_finite() || pg.strength < 0.0 {
                return Err(ConfigError::invalid("pointer_gravity.strength", "must be >= 0"));
            }
        }

        for &(key, ty) in scenario.required_keys() {
            let value = raw.structural.get(key).ok_or_else(|| ConfigError::MissingKey {
                scenario: scenario.name().to_string(),
                key: key.to_string(),
            })?;
            check_type(key, value, ty)?;
        }

        let snapshot = Self {
            scenario,
            screen: Vec2::new(raw.screen_width, raw.screen_height),
            caption: raw.caption,
            gravity: raw.gravity,
            fixed_step: raw.fixed_step_seconds,
            seed: raw.seed,
            max_entities: raw.max_entities,
            boundary_margin: raw.boundary_margin,
            defaults: raw.entity_defaults,
            structural: raw.structural,
            palette: raw.palette,
            pointer_gravity: raw.pointer_gravity,
        };
        scenarios::validate(&snapshot)?;
        Ok(snapshot)
    }

    /// Same configuration with a different seed (used on restart)
    pub fn with_seed(&self, seed: u64) -> Self {
        let mut next = self.clone();
        next.seed = seed;
        next
    }

    pub fn scenario(&self) -> ScenarioKind {
        self.scenario
    }

    pub fn screen_width(&self) -> f32 {
        self.screen.x
    }

    pub fn screen_height(&self) -> f32 {
        self.screen.y
    }

    pub fn screen_size(&self) -> Vec2 {
        self.screen
    }

    pub fn screen_center(&self) -> Vec2 {
        self.screen * 0.5
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn max_entities(&self) -> usize {
        self.max_entities
    }

    pub fn boundary_margin(&self) -> f32 {
        self.boundary_margin
    }

    pub fn defaults(&self) -> &EntityDefaults {
        &self.defaults
    }

    pub fn pointer_gravity(&self) -> Option<PointerGravity> {
        self.pointer_gravity
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.structural.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.structural.get(key) {
            Some(ParamValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    /// Read a numeric key that validation guarantees is present
    pub fn require_number(&self, key: &str) -> Result<f64, ConfigError> {
        self.number(key).ok_or_else(|| ConfigError::WrongType {
            key: key.to_string(),
            expected: "a number",
        })
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.structural.get(key) {
            Some(ParamValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[f64]> {
        match self.structural.get(key) {
            Some(ParamValue::List(v)) => Some(v),
            _ => None,
        }
    }

    pub fn color(&self, name: &str) -> Option<Rgb> {
        self.palette.get(name).copied()
    }

    pub fn color_or(&self, name: &str, fallback: Rgb) -> Rgb {
        self.color(name).unwrap_or(fallback)
    }
}

fn positive(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be > 0, got {value}")))
    }
}

/// At least one whole pixel
fn screen_dimension(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be >= 1, got {value}")))
    }
}

fn unit_interval(field: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be within [0, 1], got {value}")))
    }
}

fn check_type(key: &str, value: &ParamValue, ty: KeyType) -> Result<(), ConfigError> {
    let ok = match (ty, value) {
        (KeyType::Number, ParamValue::Number(n)) => n.is_finite(),
        (KeyType::Positive, ParamValue::Number(n)) => n.is_finite() && *n > 0.0,
        (KeyType::Count, ParamValue::Number(n)) => *n >= 1.0 && n.fract() == 0.0,
        (KeyType::Text, ParamValue::Text(_)) => true,
        (KeyType::List, ParamValue::List(v)) => v.iter().all(|n| n.is_finite()),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ConfigError::WrongType {
            key: key.to_string(),
            expected: ty.describe(),
        })
    }
}

/// Builder for validated snapshots without a config file
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    fn new(scenario: ScenarioKind) -> Self {
        Self {
            raw: RawConfig {
                scenario: scenario.name().to_string(),
                screen_width: 800.0,
                screen_height: 600.0,
                caption: None,
                gravity: Vec2::ZERO,
                fixed_step_seconds: DEFAULT_STEP,
                seed: 0,
                max_entities: DEFAULT_MAX_ENTITIES,
                boundary_margin: DEFAULT_BOUNDARY_MARGIN,
                entity_defaults: EntityDefaults::default(),
                structural: BTreeMap::new(),
                palette: BTreeMap::new(),
                pointer_gravity: None,
            },
        }
    }

    pub fn screen(mut self, width: f32, height: f32) -> Self {
        self.raw.screen_width = width;
        self.raw.screen_height = height;
        self
    }

    pub fn gravity(mut self, gravity: Vec2) -> Self {
        self.raw.gravity = gravity;
        self
    }

    pub fn fixed_step(mut self, step: f32) -> Self {
        self.raw.fixed_step_seconds = step;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.raw.seed = seed;
        self
    }

    pub fn max_entities(mut self, max: usize) -> Self {
        self.raw.max_entities = max;
        self
    }

    pub fn boundary_margin(mut self, margin: f32) -> Self {
        self.raw.boundary_margin = margin;
        self
    }

    pub fn defaults(mut self, defaults: EntityDefaults) -> Self {
        self.raw.entity_defaults = defaults;
        self
    }

    pub fn number(mut self, key: &str, value: f64) -> Self {
        self.raw
            .structural
            .insert(key.to_string(), ParamValue::Number(value));
        self
    }

    pub fn text(mut self, key: &str, value: &str) -> Self {
        self.raw
            .structural
            .insert(key.to_string(), ParamValue::Text(value.to_string()));
        self
    }

    pub fn list(mut self, key: &str, values: &[f64]) -> Self {
        self.raw
            .structural
            .insert(key.to_string(), ParamValue::List(values.to_vec()));
        self
    }

    pub fn color(mut self, name: &str, rgb: Rgb) -> Self {
        self.raw.palette.insert(name.to_string(), rgb);
        self
    }

    pub fn pointer_gravity(mut self, strength: f32) -> Self {
        self.raw.pointer_gravity = Some(PointerGravity {
            strength,
            reference: None,
        });
        self
    }

    pub fn build(self) -> Result<ConfigSnapshot, ConfigError> {
        ConfigSnapshot::from_raw(self.raw)
    }
}
