use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::{Mode, variance};
use crate::error::Result;
use crate::grid::Grid;
use crate::noise::ColoredNoise;
use crate::output::{FieldSpec, Snapshot};
use crate::params::SimulationParams;
use crate::spectral::{DerivativeOrder, DerivativeSet, SpectralWorkspace};
use crate::transform::Planner;

const ORDERS: [DerivativeOrder; 2] = [DerivativeOrder::Second, DerivativeOrder::Squared];
const ORDERS_HYPER: [DerivativeOrder; 3] = [
    DerivativeOrder::Second,
    DerivativeOrder::Squared,
    DerivativeOrder::Fourth,
];

/// Fully resolved run: forcing drawn on the solution grid, no closure.
pub struct DnsMode {
    grid: Grid,
    ops: SpectralWorkspace,
    noise: ColoredNoise,
    forcing: Vec<f64>,
    derivatives: DerivativeSet,
    viscosity: f64,
    hyperviscosity: Option<f64>,
    amplitude: f64,
}

impl DnsMode {
    pub fn new(params: &SimulationParams, planner: &mut Planner) -> Result<DnsMode> {
        let ops = Self::build_workspace(params, planner)?;
        let grid = *ops.grid();
        let nx = grid.nx();
        let noise = ColoredNoise::new(nx, params.noise_exponent, planner);
        let hyperviscosity = params.hyperviscosity.then(|| grid.dx().powi(4));

        info!(nx, dx = grid.dx(), hyperviscosity = params.hyperviscosity, "running in DNS mode");

        Ok(DnsMode {
            grid,
            ops,
            noise,
            forcing: vec![0.0; nx],
            derivatives: DerivativeSet::new(nx),
            viscosity: params.viscosity,
            hyperviscosity,
            amplitude: params.forcing_amplitude(),
        })
    }

    pub fn forcing(&self) -> &[f64] {
        &self.forcing
    }
}

impl Mode for DnsMode {
    fn name(&self) -> &'static str {
        "DNS"
    }

    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn build_workspace(params: &SimulationParams, planner: &mut Planner) -> Result<SpectralWorkspace> {
        let grid = params.dns_grid()?;
        SpectralWorkspace::new(grid, grid.nx(), planner)
    }

    fn compute_noise(&mut self, rng: &mut ChaCha8Rng) {
        self.noise.compute_noise(rng, &mut self.forcing);
    }

    fn compute_rhs(&mut self, u: &[f64], _stage_dt: f64, rhs: &mut [f64]) {
        let orders: &[DerivativeOrder] = if self.hyperviscosity.is_some() {
            &ORDERS_HYPER
        } else {
            &ORDERS
        };
        self.ops.derivatives(u, orders, &mut self.derivatives);

        let d = &self.derivatives;
        for i in 0..rhs.len() {
            rhs[i] = self.viscosity * d.second[i] - 0.5 * d.squared[i] + self.amplitude * self.forcing[i];
        }
        if let Some(nu4) = self.hyperviscosity {
            for (r, &d4) in rhs.iter_mut().zip(&d.fourth) {
                *r -= nu4 * d4;
            }
        }
    }

    fn zero_nyquist(&mut self, u: &mut [f64]) {
        self.ops.zero_nyquist(u);
    }

    fn field_specs(&self) -> Vec<FieldSpec> {
        let nx = self.grid.nx();
        vec![
            FieldSpec::fixed("x", nx, "distance", "m"),
            FieldSpec::profile("u", nx, "velocity", "m s-1"),
            FieldSpec::scalar("tke", "turbulence kinetic energy", "m2 s-2"),
        ]
    }

    fn save_diagnostics(&mut self, u: &[f64], snapshot: &mut Snapshot) {
        if snapshot.get("x").is_none() {
            snapshot.set("x", &self.grid.coordinates());
        }
        snapshot.set("u", u);
        snapshot.set_scalar("tke", variance(u));
    }
}
