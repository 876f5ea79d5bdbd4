//! Input modulation
//!
//! Input arrives already dispatched by the platform as [`InputEvent`]s. Each
//! scenario binds events to [`Action`]s; the modulator turns one tick's events
//! into parameter changes (gravity, clamped rates) and a list of actions for
//! the simulation to carry out.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::PointerGravity;

/// Keys the demos react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Space,
    Up,
    Down,
    Left,
    Right,
    R,
    Escape,
    /// Any other key, by platform code
    Other(u32),
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "space" => Ok(Key::Space),
            "up" => Ok(Key::Up),
            "down" => Ok(Key::Down),
            "left" => Ok(Key::Left),
            "right" => Ok(Key::Right),
            "r" => Ok(Key::R),
            "escape" | "esc" => Ok(Key::Escape),
            other => other
                .parse::<u32>()
                .map(Key::Other)
                .map_err(|_| format!("unknown key '{s}'")),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Space => write!(f, "space"),
            Key::Up => write!(f, "up"),
            Key::Down => write!(f, "down"),
            Key::Left => write!(f, "left"),
            Key::Right => write!(f, "right"),
            Key::R => write!(f, "r"),
            Key::Escape => write!(f, "escape"),
            Key::Other(code) => write!(f, "{code}"),
        }
    }
}

/// One platform input event, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerMoved { x: f32, y: f32 },
    ButtonDown(u8),
    ButtonUp(u8),
    KeyDown(Key),
    KeyUp(Key),
}

/// What a bound event asks for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    TogglePause,
    /// Step a named rate parameter by `delta` (clamped)
    Adjust { param: &'static str, delta: f32 },
    StopGenerating,
    TipOver,
    Restart,
    SpawnAtPointer,
    BeginStream,
    EndStream,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    KeyDown(Key),
    KeyUp(Key),
    /// Any pointer button
    ButtonDown,
    ButtonUp,
}

impl Trigger {
    fn matches(&self, event: &InputEvent) -> bool {
        match (self, event) {
            (Trigger::KeyDown(k), InputEvent::KeyDown(e)) => k == e,
            (Trigger::KeyUp(k), InputEvent::KeyUp(e)) => k == e,
            (Trigger::ButtonDown, InputEvent::ButtonDown(_)) => true,
            (Trigger::ButtonUp, InputEvent::ButtonUp(_)) => true,
            _ => false,
        }
    }
}

/// Event-to-action table for one scenario
#[derive(Debug, Clone)]
pub struct InputBindings {
    bindings: Vec<(Trigger, Action)>,
    /// Rate adjustments still apply while paused
    adjust_while_paused: bool,
}

impl Default for InputBindings {
    /// Escape quits in every scenario
    fn default() -> Self {
        Self {
            bindings: vec![(Trigger::KeyDown(Key::Escape), Action::Quit)],
            adjust_while_paused: false,
        }
    }
}

impl InputBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key(mut self, key: Key, action: Action) -> Self {
        self.bindings.push((Trigger::KeyDown(key), action));
        self
    }

    pub fn on_key_up(mut self, key: Key, action: Action) -> Self {
        self.bindings.push((Trigger::KeyUp(key), action));
        self
    }

    pub fn on_button_down(mut self, action: Action) -> Self {
        self.bindings.push((Trigger::ButtonDown, action));
        self
    }

    pub fn on_button_up(mut self, action: Action) -> Self {
        self.bindings.push((Trigger::ButtonUp, action));
        self
    }

    pub fn adjust_while_paused(mut self, allowed: bool) -> Self {
        self.adjust_while_paused = allowed;
        self
    }

    /// First action bound to the event, if any
    pub fn lookup(&self, event: &InputEvent) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(trigger, _)| trigger.matches(event))
            .map(|(_, action)| *action)
    }
}

/// A scalar the operator can step up and down within a range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateParam {
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

impl RateParam {
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            value: value.clamp(min, max),
            min,
            max,
        }
    }

    fn step(&mut self, delta: f32) {
        self.value = (self.value + delta).clamp(self.min, self.max);
    }
}

/// Result of applying one tick's input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputOutcome {
    /// New global gravity, if the pointer moved under pointer gravity
    pub gravity: Option<Vec2>,
    /// Actions for the simulation or scenario, in event order
    pub actions: Vec<Action>,
    /// Rate parameters that changed this tick
    pub adjusted: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct InputModulator {
    bindings: InputBindings,
    pointer_gravity: Option<(PointerGravity, Vec2)>,
    pointer: Option<Vec2>,
    streaming: bool,
    rates: BTreeMap<&'static str, RateParam>,
}

impl InputModulator {
    /// `center` is the reference point used when pointer gravity has none
    pub fn new(bindings: InputBindings, pointer_gravity: Option<PointerGravity>, center: Vec2) -> Self {
        Self {
            bindings,
            pointer_gravity: pointer_gravity.map(|pg| (pg, pg.reference.unwrap_or(center))),
            pointer: None,
            streaming: false,
            rates: BTreeMap::new(),
        }
    }

    pub fn with_rate(mut self, name: &'static str, param: RateParam) -> Self {
        self.rates.insert(name, param);
        self
    }

    pub fn rate(&self, name: &str) -> Option<f32> {
        self.rates.get(name).map(|r| r.value)
    }

    pub fn rates(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.rates.iter().map(|(name, r)| (*name, r.value))
    }

    /// Last known pointer position
    pub fn pointer(&self) -> Option<Vec2> {
        self.pointer
    }

    /// Whether a stream (button held) is active
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Apply one tick's events in order
    ///
    /// Each event changes at most one thing. Later events win over earlier
    /// ones for the same parameter. Unbound events are ignored.
    pub fn apply<I>(&mut self, events: I, paused: bool) -> InputOutcome
    where
        I: IntoIterator<Item = InputEvent>,
    {
        let mut outcome = InputOutcome::default();
        for event in events {
            if let InputEvent::PointerMoved { x, y } = event {
                let pointer = Vec2::new(x, y);
                self.pointer = Some(pointer);
                if let Some((pg, reference)) = self.pointer_gravity {
                    outcome.gravity = Some((pointer - reference).normalize_or_zero() * pg.strength);
                }
                continue;
            }

            let Some(action) = self.bindings.lookup(&event) else {
                continue;
            };
            match action {
                Action::Adjust { param, delta } => {
                    if paused && !self.bindings.adjust_while_paused {
                        continue;
                    }
                    if let Some(rate) = self.rates.get_mut(param) {
                        rate.step(delta);
                        if !outcome.adjusted.contains(&param) {
                            outcome.adjusted.push(param);
                        }
                        log::debug!("{param} -> {}", rate.value);
                    }
                }
                Action::BeginStream => {
                    self.streaming = true;
                    outcome.actions.push(action);
                }
                Action::EndStream => {
                    self.streaming = false;
                    outcome.actions.push(action);
                }
                _ => outcome.actions.push(action),
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pizza_bindings() -> InputBindings {
        InputBindings::new()
            .on_key(Key::Space, Action::TogglePause)
            .on_key(Key::Up, Action::Adjust { param: "speed", delta: -1.0 })
            .on_key(Key::Down, Action::Adjust { param: "speed", delta: 1.0 })
            .adjust_while_paused(true)
    }

    fn modulator() -> InputModulator {
        InputModulator::new(pizza_bindings(), None, Vec2::new(400.0, 300.0))
            .with_rate("speed", RateParam::new(3.0, 1.0, 5.0))
    }

    #[test]
    fn test_key_parse() {
        assert_eq!("Space".parse::<Key>().unwrap(), Key::Space);
        assert_eq!("esc".parse::<Key>().unwrap(), Key::Escape);
        assert_eq!("42".parse::<Key>().unwrap(), Key::Other(42));
        assert!("nope".parse::<Key>().is_err());
    }

    #[test]
    fn test_rate_is_clamped() {
        let mut m = modulator();
        let downs = std::iter::repeat_n(InputEvent::KeyDown(Key::Down), 10);
        let outcome = m.apply(downs, false);
        assert_eq!(m.rate("speed"), Some(5.0));
        assert_eq!(outcome.adjusted, vec!["speed"]);
        m.apply(std::iter::repeat_n(InputEvent::KeyDown(Key::Up), 10), false);
        assert_eq!(m.rate("speed"), Some(1.0));
    }

    #[test]
    fn test_unknown_events_ignored() {
        let mut m = modulator();
        let outcome = m.apply(
            [
                InputEvent::KeyDown(Key::Other(7)),
                InputEvent::KeyUp(Key::Space),
                InputEvent::ButtonDown(1),
            ],
            false,
        );
        assert_eq!(outcome, InputOutcome::default());
        assert_eq!(m.rate("speed"), Some(3.0));
    }

    #[test]
    fn test_pause_passes_through_and_adjust_allowed_while_paused() {
        let mut m = modulator();
        let outcome = m.apply(
            [InputEvent::KeyDown(Key::Space), InputEvent::KeyDown(Key::Down)],
            true,
        );
        assert_eq!(outcome.actions, vec![Action::TogglePause]);
        assert_eq!(m.rate("speed"), Some(4.0));
    }

    #[test]
    fn test_adjust_blocked_while_paused_by_default() {
        let bindings = InputBindings::new().on_key(Key::Up, Action::Adjust { param: "speed", delta: 1.0 });
        let mut m = InputModulator::new(bindings, None, Vec2::ZERO)
            .with_rate("speed", RateParam::new(1.0, 1.0, 9.0));
        m.apply([InputEvent::KeyDown(Key::Up)], true);
        assert_eq!(m.rate("speed"), Some(1.0));
    }

    #[test]
    fn test_pointer_gravity_last_write_wins() {
        let pg = PointerGravity {
            strength: 500.0,
            reference: None,
        };
        let mut m = InputModulator::new(InputBindings::new(), Some(pg), Vec2::new(400.0, 300.0));
        let outcome = m.apply(
            [
                InputEvent::PointerMoved { x: 0.0, y: 300.0 },
                InputEvent::PointerMoved { x: 400.0, y: 600.0 },
            ],
            false,
        );
        assert_eq!(outcome.gravity, Some(Vec2::new(0.0, 500.0)));
        assert_eq!(m.pointer(), Some(Vec2::new(400.0, 600.0)));
    }

    #[test]
    fn test_stream_state() {
        let bindings = InputBindings::new()
            .on_button_down(Action::BeginStream)
            .on_button_up(Action::EndStream);
        let mut m = InputModulator::new(bindings, None, Vec2::ZERO);
        m.apply([InputEvent::ButtonDown(1)], false);
        assert!(m.is_streaming());
        m.apply([InputEvent::ButtonUp(1)], false);
        assert!(!m.is_streaming());
    }

    proptest! {
        #[test]
        fn prop_rate_stays_in_range(ups in proptest::collection::vec(any::<bool>(), 0..64)) {
            let mut m = modulator();
            let events: Vec<_> = ups
                .iter()
                .map(|up| InputEvent::KeyDown(if *up { Key::Up } else { Key::Down }))
                .collect();
            m.apply(events, false);
            let speed = m.rate("speed").unwrap();
            prop_assert!((1.0..=5.0).contains(&speed));
        }
    }
}
