use tracing::info;

use super::{Closure, ClosureInput, ClosureKind, ClosureOutput, TkeBudget};
use crate::grid::Grid;
use crate::spectral::{DerivativeOrder, SpectralWorkspace};

pub const EDDY_VISCOSITY_COEFFICIENT: f64 = 0.10;
pub const DISSIPATION_COEFFICIENT: f64 = 0.70;

/// Deardorff 1.5-order closure.
///
/// Carries a prognostic subgrid energy `k` (owned by the caller) and sets
/// the eddy viscosity from it, `nu_t = c1 dx sqrt(k)`. Each call reads the
/// current `k` for the stress, then steps
///
/// ```text
/// dk/dt = -d(k u)/dx + 2 nu_t S^2 + d(2 nu_t dk/dx)/dx - ce k^1.5 / dx
/// ```
///
/// forward by `dt` with explicit Euler and clips the result at zero.
#[derive(Debug, Clone)]
pub struct Deardorff {
    dx: f64,
    eddy_viscosity: Vec<f64>,
    flux: Vec<f64>,
    advection: Vec<f64>,
    gradient: Vec<f64>,
    diffusion: Vec<f64>,
}

impl Deardorff {
    pub fn new(grid: &Grid) -> Deardorff {
        info!(
            c1 = EDDY_VISCOSITY_COEFFICIENT,
            ce = DISSIPATION_COEFFICIENT,
            "using Deardorff TKE closure"
        );
        let nx = grid.nx();
        Deardorff {
            dx: grid.dx(),
            eddy_viscosity: vec![0.0; nx],
            flux: vec![0.0; nx],
            advection: vec![0.0; nx],
            gradient: vec![0.0; nx],
            diffusion: vec![0.0; nx],
        }
    }
}

impl Closure for Deardorff {
    fn kind(&self) -> ClosureKind {
        ClosureKind::Deardorff
    }

    fn compute(
        &mut self,
        input: ClosureInput<'_>,
        tke: &mut [f64],
        ops: &mut SpectralWorkspace,
        out: &mut ClosureOutput,
    ) {
        let ClosureInput { u, dudx, dt } = input;
        let c1dx = EDDY_VISCOSITY_COEFFICIENT * self.dx;

        for (nu, &k) in self.eddy_viscosity.iter_mut().zip(tke.iter()) {
            *nu = c1dx * k.max(0.0).sqrt();
        }
        for ((t, &nu), &s) in out.stress.iter_mut().zip(&self.eddy_viscosity).zip(dudx) {
            *t = -2.0 * nu * s;
        }

        // -d(k u)/dx
        for ((f, &k), &v) in self.flux.iter_mut().zip(tke.iter()).zip(u) {
            *f = k * v;
        }
        ops.derivative(&self.flux, DerivativeOrder::First, &mut self.advection);

        // d(2 nu_t dk/dx)/dx
        ops.derivative(tke, DerivativeOrder::First, &mut self.gradient);
        for (g, &nu) in self.gradient.iter_mut().zip(&self.eddy_viscosity) {
            *g *= 2.0 * nu;
        }
        ops.derivative(&self.gradient, DerivativeOrder::First, &mut self.diffusion);

        let n = tke.len().max(1) as f64;
        let mut budget = TkeBudget::default();
        for i in 0..tke.len() {
            let k = tke[i].max(0.0);
            let production = 2.0 * self.eddy_viscosity[i] * dudx[i] * dudx[i];
            let dissipation = DISSIPATION_COEFFICIENT * k.powf(1.5) / self.dx;
            let tendency = -self.advection[i] + production + self.diffusion[i] - dissipation;

            budget.production += production;
            budget.diffusion += self.diffusion[i];
            budget.dissipation += dissipation;

            tke[i] = (tke[i] + dt * tendency).max(0.0);
        }
        budget.production /= n;
        budget.diffusion /= n;
        budget.dissipation /= n;

        out.coefficient = EDDY_VISCOSITY_COEFFICIENT;
        out.budget = Some(budget);
    }
}
