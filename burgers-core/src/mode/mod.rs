//! Resolution-specific halves of the solver.
//!
//! A [`Mode`] decides the grid, how the forcing is produced, and which terms
//! make up the right-hand side. The integrator only sees this trait and
//! picks one implementation at construction.

mod dns;
mod les;

pub use dns::DnsMode;
pub use les::LesMode;

use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::grid::Grid;
use crate::output::{FieldSpec, Snapshot};
use crate::params::{SimMode, SimulationParams};
use crate::spectral::SpectralWorkspace;
use crate::transform::Planner;

pub trait Mode {
    fn name(&self) -> &'static str;

    fn grid(&self) -> &Grid;

    fn grid_size(&self) -> usize {
        self.grid().nx()
    }

    /// Plans the spectral workspace this mode runs on.
    fn build_workspace(params: &SimulationParams, planner: &mut Planner) -> Result<SpectralWorkspace>
    where
        Self: Sized;

    /// Redraws the forcing.
    fn compute_noise(&mut self, rng: &mut ChaCha8Rng);

    /// `rhs = du/dt` at `u` for the current forcing. `stage_dt` is the time
    /// any prognostic closure state advances during this stage.
    fn compute_rhs(&mut self, u: &[f64], stage_dt: f64, rhs: &mut [f64]);

    fn zero_nyquist(&mut self, u: &mut [f64]);

    fn field_specs(&self) -> Vec<FieldSpec>;

    fn save_diagnostics(&mut self, u: &[f64], snapshot: &mut Snapshot);
}

pub fn build(params: &SimulationParams, planner: &mut Planner) -> Result<Box<dyn Mode>> {
    Ok(match params.mode {
        SimMode::Dns => Box::new(DnsMode::new(params, planner)?),
        SimMode::Les => Box::new(LesMode::new(params, planner)?),
    })
}

/// Population variance.
pub(crate) fn variance(u: &[f64]) -> f64 {
    if u.is_empty() {
        return 0.0;
    }
    let n = u.len() as f64;
    let m = u.iter().sum::<f64>() / n;
    u.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n
}
