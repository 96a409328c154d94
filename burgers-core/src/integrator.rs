//! Adaptive time stepping.
//!
//! Each step picks `dt` from the advective and viscous limits, shortens it
//! to land exactly on the next output time or the end of the run, and then
//! advances `u` with the three-stage low-storage Runge-Kutta scheme of
//! Williamson (1980). The Nyquist mode is removed after every stage.
//!
//! The forcing is redrawn whenever the clock crosses a multiple of
//! `max_step`, independent of the adaptive step.

use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::mode::{self, Mode};
use crate::output::{OutputSink, Snapshot};
use crate::params::SimulationParams;
use crate::plan_cache::{CacheLookup, PlanCache, PlanKey, PlanSet};
use crate::transform::Planner;

pub const RK_A: [f64; 3] = [0.0, -5.0 / 9.0, -153.0 / 128.0];
pub const RK_B: [f64; 3] = [1.0 / 3.0, 15.0 / 16.0, 8.0 / 15.0];
/// Stage start times as fractions of `dt`.
pub const RK_NODES: [f64; 4] = [0.0, 1.0 / 3.0, 3.0 / 4.0, 1.0];

/// Diffusive stability bound, `dt <= VISCOUS_LIMIT dx^2 / nu`.
pub const VISCOUS_LIMIT: f64 = 0.2;
/// Steps shorter than this end the run.
pub const MIN_STEP: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepControl {
    pub cfl: f64,
    pub dx: f64,
    pub viscosity: f64,
    pub max_step: f64,
}

impl StepControl {
    /// Largest stable step for a field whose peak speed is `max_speed`.
    pub fn trial_step(&self, max_speed: f64) -> f64 {
        let mut dt = self.max_step;
        if max_speed > 0.0 {
            dt = dt.min(self.cfl * self.dx / max_speed);
        }
        if self.viscosity > 0.0 {
            dt = dt.min(VISCOUS_LIMIT * self.dx * self.dx / self.viscosity);
        }
        dt
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Advanced { dt: f64, saved: bool },
    Finished,
    /// The step needed to make progress fell below [`MIN_STEP`].
    Stalled { dt: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub time: f64,
    /// Output times written, the initial state included.
    pub saves: usize,
    pub stalled: bool,
}

/// Output, print and noise schedules kept as integer counters so that
/// event times are exact multiples of their interval.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Clock {
    t: f64,
    save_index: usize,
    print_index: u64,
    noise_index: u64,
}

impl Clock {
    fn next_save(&self, interval: f64) -> f64 {
        (self.save_index + 1) as f64 * interval
    }

    fn next_print(&self, interval: f64) -> f64 {
        (self.print_index + 1) as f64 * interval
    }
}

pub struct Simulation {
    params: SimulationParams,
    mode: Box<dyn Mode>,
    rng: ChaCha8Rng,
    control: StepControl,
    clock: Clock,
    /// Slack when comparing the clock against event times. Never below
    /// [`MIN_STEP`], so a gap left by rounding is absorbed into the step
    /// that would otherwise fall just short of the event.
    tolerance: f64,
    u: Vec<f64>,
    q: Vec<f64>,
    rhs: Vec<f64>,
    snapshot: Snapshot,
    steps: u64,
    saves: usize,
}

impl Simulation {
    /// Builds the mode selected by `params`, consulting `cache` for
    /// transform plans and storing them back on a miss.
    pub fn new(params: SimulationParams, rng: ChaCha8Rng, cache: &mut dyn PlanCache) -> Result<Simulation> {
        params.validate()?;

        let key = PlanKey::from_params(&params);
        let mut planner = Planner::new(params.plan);
        let hit = match cache.try_load(&key) {
            CacheLookup::Hit(plans) => {
                debug!(lengths = ?plans.lengths, "reusing cached transform plans");
                for n in plans.lengths {
                    planner.warm(n);
                }
                true
            }
            CacheLookup::Miss(reason) => {
                debug!(%reason, "transform plan cache miss");
                false
            }
        };

        let mode = mode::build(&params, &mut planner)?;

        if !hit {
            let plans = PlanSet {
                lengths: planner.lengths().to_vec(),
            };
            if cache.save(&key, &plans) {
                debug!(lengths = ?plans.lengths, "stored transform plans");
            } else {
                debug!("transform plans not stored");
            }
        }
        info!(
            planning = params.plan.effort.as_str(),
            threads = params.plan.threads,
            "transforms ready"
        );

        Ok(Simulation::from_mode(params, mode, rng))
    }

    /// Wraps an already built mode. `params` must have been validated.
    pub fn from_mode(params: SimulationParams, mut mode: Box<dyn Mode>, mut rng: ChaCha8Rng) -> Simulation {
        let nx = mode.grid_size();
        let control = StepControl {
            cfl: params.cfl,
            dx: mode.grid().dx(),
            viscosity: params.viscosity,
            max_step: params.max_step,
        };
        mode.compute_noise(&mut rng);

        Simulation {
            tolerance: MIN_STEP.max(1e-9 * params.max_step),
            params,
            mode,
            rng,
            control,
            clock: Clock {
                t: 0.0,
                save_index: 0,
                print_index: 0,
                noise_index: 0,
            },
            u: vec![0.0; nx],
            q: vec![0.0; nx],
            rhs: vec![0.0; nx],
            snapshot: Snapshot::new(),
            steps: 0,
            saves: 0,
        }
    }

    // ---- Accessors ----

    pub fn u(&self) -> &[f64] {
        &self.u
    }

    pub fn time(&self) -> f64 {
        self.clock.t
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn mode(&self) -> &dyn Mode {
        self.mode.as_ref()
    }

    pub fn control(&self) -> &StepControl {
        &self.control
    }

    pub fn is_finished(&self) -> bool {
        self.clock.t >= self.params.duration - self.tolerance
    }

    // ---- Driving ----

    /// Declares the fields and writes the initial state as output 0.
    pub fn start(&mut self, sink: &mut dyn OutputSink) {
        if let Err(err) = sink.register(&self.mode.field_specs()) {
            warn!(%err, "output sink rejected field registration");
        }
        self.emit(sink, 0, 0.0, true);
    }

    /// Advances one adaptive step, saving to `sink` if it lands on an
    /// output time.
    pub fn step(&mut self, sink: &mut dyn OutputSink) -> StepOutcome {
        if self.is_finished() {
            return StepOutcome::Finished;
        }

        let max_speed = self.u.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let mut dt = self.control.trial_step(max_speed);

        let t = self.clock.t;
        let next_save = self.clock.next_save(self.params.save_interval);
        let mut landing = None;
        if t + dt >= next_save - self.tolerance {
            dt = next_save - t;
            landing = Some(next_save);
        }
        if t + dt >= self.params.duration - self.tolerance {
            dt = self.params.duration - t;
            landing = Some(self.params.duration);
        }
        if dt < MIN_STEP {
            warn!(t, dt, "time step collapsed; stopping");
            return StepOutcome::Stalled { dt };
        }

        for s in 0..3 {
            let stage_dt = dt * (RK_NODES[s + 1] - RK_NODES[s]);
            self.mode.compute_rhs(&self.u, stage_dt, &mut self.rhs);
            for ((q, u), &r) in self.q.iter_mut().zip(self.u.iter_mut()).zip(&self.rhs) {
                *q = RK_A[s] * *q + r;
                *u += RK_B[s] * dt * *q;
            }
            self.mode.zero_nyquist(&mut self.u);
        }

        self.clock.t = landing.unwrap_or(t + dt);
        self.steps += 1;
        trace!(step = self.steps, t = self.clock.t, dt, "step");

        let t = self.clock.t;
        let refreshes = ((t + self.tolerance) / self.params.max_step).floor() as u64;
        if refreshes > self.clock.noise_index {
            self.clock.noise_index = refreshes;
            self.mode.compute_noise(&mut self.rng);
        }

        let mut saved = false;
        if t >= next_save - self.tolerance {
            self.clock.save_index += 1;
            let index = self.clock.save_index;
            self.emit(sink, index, index as f64 * self.params.save_interval, false);
            saved = true;
        }

        if t >= self.clock.next_print(self.params.print_interval) - self.tolerance {
            self.clock.print_index = ((t + self.tolerance) / self.params.print_interval).floor() as u64;
            info!(
                mode = self.mode.name(),
                "running for time {:.4} of {:.4}",
                t,
                self.params.duration
            );
        }

        StepOutcome::Advanced { dt, saved }
    }

    /// Runs to the end (or until the step collapses) and closes `sink`.
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> RunSummary {
        info!(
            mode = self.mode.name(),
            nx = self.mode.grid_size(),
            duration = self.params.duration,
            "starting run"
        );
        self.start(sink);

        let mut stalled = false;
        loop {
            match self.step(sink) {
                StepOutcome::Advanced { .. } => {}
                StepOutcome::Finished => break,
                StepOutcome::Stalled { .. } => {
                    stalled = true;
                    break;
                }
            }
        }

        if let Err(err) = sink.close() {
            warn!(%err, "failed to close output sink");
        }
        info!(steps = self.steps, t = self.clock.t, saves = self.saves, "run complete");

        RunSummary {
            steps: self.steps,
            time: self.clock.t,
            saves: self.saves,
            stalled,
        }
    }

    fn emit(&mut self, sink: &mut dyn OutputSink, index: usize, time: f64, initial: bool) {
        self.mode.save_diagnostics(&self.u, &mut self.snapshot);
        match sink.save(&self.snapshot, index, time, initial) {
            Ok(()) => self.saves += 1,
            Err(err) => warn!(%err, index, time, "output sink failed to save"),
        }
    }
}
