//! Sim Gallery entry point
//!
//! Headless native runner: loads one scenario config, drives it through the
//! frame accumulator with an optional scripted input, and logs progress.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use sim_gallery::renderer::{SpriteTable, instances_bytes, pack_frame};
use sim_gallery::{ConfigSnapshot, InputEvent, Key, Simulation, TickReport};

#[derive(Parser, Debug)]
#[command(name = "sim-gallery", version, about = "Run a physics demo headless from its config file")]
struct Opts {
    /// Scenario config (.yml, .yaml or .json)
    config: PathBuf,
    /// Frames to run
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Wall time per frame in seconds (defaults to the config's fixed step)
    #[arg(long)]
    frame_dt: Option<f32>,
    /// Press a key on a frame, e.g. `120:space`
    #[arg(long = "press", value_parser = parse_press)]
    presses: Vec<(u64, Key)>,
    /// Click at a screen position on a frame, e.g. `30:400,200`
    #[arg(long = "click", value_parser = parse_click)]
    clicks: Vec<(u64, f32, f32)>,
    /// Print the last frame as JSON on stdout
    #[arg(long)]
    dump_frame: bool,
}

fn parse_press(s: &str) -> Result<(u64, Key), String> {
    let (frame, key) = s.split_once(':').ok_or("expected FRAME:KEY")?;
    let frame = frame.parse().map_err(|e| format!("bad frame '{frame}': {e}"))?;
    Ok((frame, key.parse()?))
}

fn parse_click(s: &str) -> Result<(u64, f32, f32), String> {
    let (frame, pos) = s.split_once(':').ok_or("expected FRAME:X,Y")?;
    let (x, y) = pos.split_once(',').ok_or("expected FRAME:X,Y")?;
    let frame = frame.parse().map_err(|e| format!("bad frame '{frame}': {e}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x '{x}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y '{y}': {e}"))?;
    Ok((frame, x, y))
}

/// Scripted input for one frame, presses first, then clicks
fn events_for(opts: &Opts, frame: u64) -> Vec<InputEvent> {
    let mut events: Vec<InputEvent> = opts
        .presses
        .iter()
        .filter(|(f, _)| *f == frame)
        .map(|(_, key)| InputEvent::KeyDown(*key))
        .collect();
    for &(f, x, y) in &opts.clicks {
        if f == frame {
            events.push(InputEvent::PointerMoved { x, y });
            events.push(InputEvent::ButtonDown(1));
        } else if f + 1 == frame {
            events.push(InputEvent::ButtonUp(1));
        }
    }
    events
}

#[derive(Debug, Default)]
struct Totals {
    spawned: usize,
    removed: usize,
    rejected: u32,
    skipped: u32,
}

impl Totals {
    fn add(&mut self, report: &TickReport) {
        self.spawned += report.spawned.len();
        self.removed += report.removed.len();
        self.rejected += report.rejected_spawns;
        self.skipped += report.skipped_emissions;
    }
}

fn run(opts: &Opts) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigSnapshot::load(&opts.config)?;
    let step = config.fixed_step();
    let frame_dt = opts.frame_dt.unwrap_or(step);
    let ticks_per_second = (1.0 / step).round().max(1.0) as u64;
    let mut sim = Simulation::new(config)?;
    let mut totals = Totals::default();
    let mut sprites = SpriteTable::default();
    let mut last_summary = 0;

    for frame in 0..opts.ticks {
        if sim.clock().is_finished() {
            log::info!("Run finished at tick {}", sim.clock().tick());
            break;
        }
        let reports = sim.step_frame(frame_dt, events_for(opts, frame))?;
        reports.iter().for_each(|r| totals.add(r));

        if reports.iter().any(|r| r.quit_requested) {
            log::info!("Quit requested on frame {frame}");
            break;
        }
        if reports.iter().any(|r| r.restart_requested) {
            sim.restart()?;
            last_summary = 0;
            continue;
        }

        let second = sim.clock().tick() / ticks_per_second;
        if second > last_summary {
            last_summary = second;
            let f = sim.frame();
            let instances = pack_frame(f, &mut sprites);
            log::info!(
                "t={second}s tick={} live={} spawned={} removed={} rejected={} skipped={} state={:?}",
                f.tick,
                f.hud.live_entities,
                totals.spawned,
                totals.removed,
                totals.rejected,
                totals.skipped,
                f.clock_state
            );
            log::debug!("Instance buffer: {} bytes, {} sprites", instances_bytes(&instances).len(), sprites.names().len());
        }
    }

    if opts.dump_frame {
        println!("{}", serde_json::to_string_pretty(sim.frame())?);
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> ExitCode {
    env_logger::init();
    let opts = Opts::parse();
    log::info!("Sim Gallery (native) starting with {}", opts.config.display());
    if let Err(e) = run(&opts) {
        log::error!("{e}");
        eprintln!("Error: {e}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Headless runner is native only
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_press() {
        assert_eq!(parse_press("12:space").unwrap(), (12, Key::Space));
        assert!(parse_press("space").is_err());
        assert!(parse_press("x:space").is_err());
    }

    #[test]
    fn test_parse_click() {
        assert_eq!(parse_click("3:400,200.5").unwrap(), (3, 400.0, 200.5));
        assert!(parse_click("3:400").is_err());
    }

    #[test]
    fn test_click_releases_next_frame() {
        let opts = Opts::parse_from(["sim-gallery", "cfg.yml", "--click", "5:10,20", "--press", "5:r"]);
        assert_eq!(
            events_for(&opts, 5),
            vec![
                InputEvent::KeyDown(Key::R),
                InputEvent::PointerMoved { x: 10.0, y: 20.0 },
                InputEvent::ButtonDown(1),
            ]
        );
        assert_eq!(events_for(&opts, 6), vec![InputEvent::ButtonUp(1)]);
        assert!(events_for(&opts, 7).is_empty());
    }
}
