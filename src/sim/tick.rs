//! Fixed timestep simulation tick
//!
//! [`Simulation`] owns every component of one run and advances it in a fixed
//! order: input, sources, scenario hooks, physics, sync, collision routing,
//! sweep, clock, snapshot. Given the same config, seed and input script, the
//! sequence of frames is identical.

use super::clock::{ClockState, SimulationClock};
use super::entity::EntityId;
use super::input::{Action, InputEvent, InputModulator};
use super::physics::{CollisionEvent, PhysicsWorld};
use super::pool::{Bounds, EntityPool, ExitEdges};
use super::router::CollisionRouter;
use super::snapshot::{Frame, FrameSnapshotBuilder};
use crate::config::ConfigSnapshot;
use crate::error::{Result, SimError};
use crate::scenarios::{Ctx, Scenario};

/// What happened during one call to [`Simulation::tick`]
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Index of the tick this report describes
    pub tick: u64,
    pub clock_state: ClockState,
    /// Entities created this tick (sources, scenario, collision rules)
    pub spawned: Vec<EntityId>,
    /// Entities evicted by this tick's sweep
    pub removed: Vec<EntityId>,
    /// Contacts reported by the physics step
    pub collisions: usize,
    /// Operator-requested spawns refused for capacity
    pub rejected_spawns: u32,
    /// Source beats skipped for capacity
    pub skipped_emissions: u32,
    pub restart_requested: bool,
    pub quit_requested: bool,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            clock_state: ClockState::Running,
            spawned: Vec::new(),
            removed: Vec::new(),
            collisions: 0,
            rejected_spawns: 0,
            skipped_emissions: 0,
            restart_requested: false,
            quit_requested: false,
        }
    }
}

/// Everything that is rebuilt on restart
struct Run {
    world: PhysicsWorld,
    pool: EntityPool,
    clock: SimulationClock,
    modulator: InputModulator,
    scenario: Scenario,
    router: CollisionRouter,
    snapshots: FrameSnapshotBuilder,
}

impl Run {
    fn frame(&self) -> Frame {
        self.snapshots
            .frame(&self.pool, self.clock.tick(), self.clock.state(), self.modulator.rates())
    }

    fn assemble(config: &ConfigSnapshot) -> Result<Self> {
        let mut world = PhysicsWorld::new(config.gravity(), config.fixed_step());
        let bounds = Bounds {
            size: config.screen_size(),
            margin: config.boundary_margin(),
            edges: ExitEdges::NONE,
        };
        let mut pool = EntityPool::new(config.max_entities(), bounds, config.seed());
        let (scenario, setup) = Scenario::bootstrap(config, &mut world, &mut pool)?;
        pool.set_exit_edges(setup.exit_edges);

        let mut modulator =
            InputModulator::new(setup.bindings, config.pointer_gravity(), config.screen_center());
        for (name, rate) in setup.rates {
            modulator = modulator.with_rate(name, rate);
        }

        Ok(Self {
            world,
            pool,
            clock: SimulationClock::new(config.fixed_step()),
            modulator,
            scenario,
            router: setup.router,
            snapshots: FrameSnapshotBuilder::new(setup.background, config.caption().map(str::to_owned)),
        })
    }
}

/// One simulation run and its latest frame
pub struct Simulation {
    config: ConfigSnapshot,
    run: Run,
    frame: Frame,
    /// Events waiting for the next tick when a frame was too short to run one
    pending: Vec<InputEvent>,
    restarts: u64,
}

impl Simulation {
    pub fn new(config: ConfigSnapshot) -> Result<Self> {
        let run = Run::assemble(&config)?;
        let frame = run.frame();
        log::info!(
            "Started {} (seed {}, {} entities, {} bodies)",
            config.scenario(),
            config.seed(),
            run.pool.live_count(),
            run.world.body_count()
        );
        Ok(Self {
            config,
            run,
            frame,
            pending: Vec::new(),
            restarts: 0,
        })
    }

    /// Rebuild the run from the stored config
    ///
    /// Each restart reseeds with `seed + n`, so layouts differ between runs
    /// but a scripted session still replays exactly.
    pub fn restart(&mut self) -> Result<()> {
        self.restarts += 1;
        let config = self.config.with_seed(self.config.seed().wrapping_add(self.restarts));
        self.run = Run::assemble(&config)?;
        self.pending.clear();
        self.refresh_frame();
        log::info!("Restarted {} (restart {})", self.config.scenario(), self.restarts);
        Ok(())
    }

    /// Advance by one fixed step
    ///
    /// While paused the input is still applied (pause toggles, paused rate
    /// adjustments) and the frame is rebuilt, but nothing moves and the tick
    /// counter stays put. A finished run refuses to tick.
    pub fn tick<I>(&mut self, events: I) -> Result<TickReport>
    where
        I: IntoIterator<Item = InputEvent>,
    {
        if self.run.clock.is_finished() {
            return Err(SimError::RunFinished);
        }
        let mut report = TickReport::new(self.run.clock.tick());

        let outcome = self.run.modulator.apply(events, self.run.clock.is_paused());
        if let Some(gravity) = outcome.gravity {
            self.run.world.set_gravity(gravity);
        }
        let rates: Vec<(&'static str, f32)> = self.run.modulator.rates().collect();
        let mut ctx = Ctx {
            config: &self.config,
            world: &mut self.run.world,
            pool: &mut self.run.pool,
            clock: &mut self.run.clock,
            pointer: self.run.modulator.pointer(),
            streaming: self.run.modulator.is_streaming(),
            rates: &rates,
            rejected_spawns: 0,
        };

        for action in outcome.actions {
            match action {
                Action::TogglePause => {
                    let state = ctx.clock.toggle_pause();
                    log::info!("Clock {state:?} at tick {}", ctx.clock.tick());
                }
                Action::Restart => report.restart_requested = true,
                Action::Quit => report.quit_requested = true,
                other if ctx.clock.is_running() => self.run.scenario.on_action(other, &mut ctx)?,
                other => log::trace!("{other:?} ignored while paused"),
            }
        }

        if ctx.clock.is_running() {
            let emitted = ctx.pool.emit_sources(ctx.world, ctx.clock.tick());
            report.spawned.extend(emitted.spawned);
            report.skipped_emissions = emitted.skipped;

            self.run.scenario.before_physics(&mut ctx)?;
            ctx.world.advance(ctx.config.fixed_step())?;

            ctx.pool.sync_from(ctx.world)?;
            ctx.pool.age_entities();
            let expired = ctx.pool.shrink_by_lifespan(ctx.world)?;

            let events: Vec<CollisionEvent> = ctx.world.drain_collision_events().collect();
            report.collisions = events.len();
            let routed = self.run.router.process(events, ctx.pool, ctx.world)?;
            report.spawned.extend(routed.spawned);

            self.run.scenario.after_physics(&mut ctx)?;
            report.rejected_spawns = ctx.rejected_spawns;

            report.removed = self.run.pool.sweep(&mut self.run.world)?;
            self.run.clock.complete_tick();
            if self.run.scenario.is_finished(&self.run.pool) {
                self.run.clock.finish();
            }
            log::trace!(
                "Tick {}: +{} -{} ({} expired, {} contacts, {} routed)",
                report.tick,
                report.spawned.len(),
                report.removed.len(),
                expired.len(),
                report.collisions,
                routed.routed
            );
        } else {
            report.rejected_spawns = ctx.rejected_spawns;
        }

        report.clock_state = self.run.clock.state();
        self.refresh_frame();
        Ok(report)
    }

    /// Feed one rendered frame's wall time and run the ticks it pays for
    ///
    /// Events go to the first tick run. A frame too short for any tick keeps
    /// them for the next one. While paused a single non-advancing tick runs so
    /// the operator can still unpause.
    pub fn step_frame<I>(&mut self, frame_dt: f32, events: I) -> Result<Vec<TickReport>>
    where
        I: IntoIterator<Item = InputEvent>,
    {
        if self.run.clock.is_finished() {
            return Err(SimError::RunFinished);
        }
        self.pending.extend(events);
        if !self.run.clock.is_running() {
            let events = std::mem::take(&mut self.pending);
            return Ok(vec![self.tick(events)?]);
        }

        let due = self.run.clock.accumulate(frame_dt);
        let mut reports = Vec::with_capacity(due as usize);
        for _ in 0..due {
            let events = std::mem::take(&mut self.pending);
            let report = self.tick(events)?;
            let stop = report.clock_state != ClockState::Running || report.restart_requested;
            reports.push(report);
            if stop {
                break;
            }
        }
        Ok(reports)
    }

    fn refresh_frame(&mut self) {
        self.frame = self.run.frame();
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.run.world
    }

    pub fn pool(&self) -> &EntityPool {
        &self.run.pool
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.run.clock
    }

    pub fn modulator(&self) -> &InputModulator {
        &self.run.modulator
    }

    pub fn scenario(&self) -> &Scenario {
        &self.run.scenario
    }

    /// Snapshot of the last completed tick
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}
