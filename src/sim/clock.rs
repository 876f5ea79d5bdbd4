//! Simulation clock
//!
//! Owns the run state machine and converts variable frame time into a whole
//! number of fixed ticks. Physics never sees the frame time.

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_FRAME_DT, MAX_SUBSTEPS};

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockState {
    Running,
    Paused,
    /// Terminal; only a fresh run leaves it
    Finished,
}

#[derive(Debug, Clone)]
pub struct SimulationClock {
    state: ClockState,
    fixed_step: f32,
    tick: u64,
    accumulator: f32,
    time_scale: f32,
    /// Ticks left before the time scale returns to 1
    scaled_ticks_left: u32,
}

impl SimulationClock {
    pub fn new(fixed_step: f32) -> Self {
        Self {
            state: ClockState::Running,
            fixed_step,
            tick: 0,
            accumulator: 0.0,
            time_scale: 1.0,
            scaled_ticks_left: 0,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == ClockState::Paused
    }

    pub fn is_finished(&self) -> bool {
        self.state == ClockState::Finished
    }

    /// Index of the next tick to simulate
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    /// Simulated seconds so far
    pub fn elapsed(&self) -> f64 {
        self.tick as f64 * f64::from(self.fixed_step)
    }

    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
            self.accumulator = 0.0;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ClockState::Paused {
            self.state = ClockState::Running;
        }
    }

    /// Flip between running and paused; no effect once finished
    pub fn toggle_pause(&mut self) -> ClockState {
        match self.state {
            ClockState::Running => self.pause(),
            ClockState::Paused => self.resume(),
            ClockState::Finished => {}
        }
        self.state
    }

    pub fn finish(&mut self) {
        if self.state != ClockState::Finished {
            log::info!("Run finished at tick {}", self.tick);
        }
        self.state = ClockState::Finished;
        self.accumulator = 0.0;
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Scale frame time for the next `ticks` ticks (slow motion when < 1)
    pub fn set_time_scale(&mut self, scale: f32, ticks: u32) {
        if ticks == 0 || scale <= 0.0 || !scale.is_finite() {
            self.time_scale = 1.0;
            self.scaled_ticks_left = 0;
            return;
        }
        self.time_scale = scale;
        self.scaled_ticks_left = ticks;
    }

    /// Count one completed tick
    pub fn complete_tick(&mut self) {
        self.tick += 1;
        if self.scaled_ticks_left > 0 {
            self.scaled_ticks_left -= 1;
            if self.scaled_ticks_left == 0 {
                self.time_scale = 1.0;
            }
        }
    }

    /// Feed one frame's wall time and return how many ticks are due
    ///
    /// Frame time is clamped to `MAX_FRAME_DT` and at most `MAX_SUBSTEPS` ticks
    /// run per frame; leftover backlog is dropped so a stall never snowballs.
    pub fn accumulate(&mut self, frame_dt: f32) -> u32 {
        if self.state != ClockState::Running || !frame_dt.is_finite() {
            return 0;
        }
        self.accumulator += frame_dt.clamp(0.0, MAX_FRAME_DT) * self.time_scale;

        let mut due = 0;
        while self.accumulator >= self.fixed_step && due < MAX_SUBSTEPS {
            self.accumulator -= self.fixed_step;
            due += 1;
        }
        if due == MAX_SUBSTEPS && self.accumulator >= self.fixed_step {
            log::debug!("Dropping {:.3}s of simulation backlog", self.accumulator);
            self.accumulator = 0.0;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_pause_toggle() {
        let mut clock = SimulationClock::new(DT);
        assert_eq!(clock.state(), ClockState::Running);
        assert_eq!(clock.toggle_pause(), ClockState::Paused);
        assert_eq!(clock.toggle_pause(), ClockState::Running);
    }

    #[test]
    fn test_finished_is_terminal() {
        let mut clock = SimulationClock::new(DT);
        clock.finish();
        assert_eq!(clock.toggle_pause(), ClockState::Finished);
        clock.resume();
        assert!(clock.is_finished());
        assert_eq!(clock.accumulate(1.0), 0);
    }

    #[test]
    fn test_accumulator_emits_whole_ticks() {
        let mut clock = SimulationClock::new(0.01);
        assert_eq!(clock.accumulate(0.025), 2);
        // 0.005 carried over
        assert_eq!(clock.accumulate(0.006), 1);
        assert_eq!(clock.accumulate(0.0), 0);
    }

    #[test]
    fn test_paused_clock_accumulates_nothing() {
        let mut clock = SimulationClock::new(DT);
        clock.pause();
        assert_eq!(clock.accumulate(0.06), 0);
        clock.resume();
        assert_eq!(clock.accumulate(0.06), 3);
    }

    #[test]
    fn test_long_frame_is_capped() {
        let mut clock = SimulationClock::new(0.001);
        assert_eq!(clock.accumulate(10.0), MAX_SUBSTEPS);
        // Backlog was dropped
        assert!(clock.accumulate(0.0) <= 1);
    }

    #[test]
    fn test_time_scale_expires() {
        let mut clock = SimulationClock::new(0.01);
        clock.set_time_scale(0.5, 2);
        assert_eq!(clock.accumulate(0.025), 1);
        clock.complete_tick();
        clock.complete_tick();
        assert_eq!(clock.time_scale(), 1.0);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.accumulate(0.0251), 2);
    }
}
