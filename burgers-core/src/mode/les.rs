use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::{Mode, variance};
use crate::closure::{self, Closure, ClosureInput, ClosureOutput, mean};
use crate::error::Result;
use crate::grid::Grid;
use crate::noise::ColoredNoise;
use crate::output::{FieldSpec, Snapshot};
use crate::params::SimulationParams;
use crate::spectral::{DerivativeOrder, DerivativeSet, SpectralWorkspace};
use crate::transform::Planner;

const ORDERS: [DerivativeOrder; 4] = [
    DerivativeOrder::First,
    DerivativeOrder::Second,
    DerivativeOrder::Third,
    DerivativeOrder::Squared,
];
const ORDERS_HYPER: [DerivativeOrder; 5] = [
    DerivativeOrder::First,
    DerivativeOrder::Second,
    DerivativeOrder::Third,
    DerivativeOrder::Squared,
    DerivativeOrder::Fourth,
];
const DIAGNOSTIC_ORDERS: [DerivativeOrder; 2] = [DerivativeOrder::First, DerivativeOrder::Second];

/// Filtered run on the coarse grid.
///
/// The forcing is drawn at DNS resolution and projected down, so a DNS and
/// an LES run with the same seed see the same large-scale forcing.
pub struct LesMode {
    grid: Grid,
    ops: SpectralWorkspace,
    noise: ColoredNoise,
    fine_noise: Vec<f64>,
    forcing: Vec<f64>,
    /// Derivatives of the state the closure last saw, paired with
    /// `closure_out` in the subgrid budgets.
    derivatives: DerivativeSet,
    diagnostics: DerivativeSet,
    closure: Box<dyn Closure>,
    closure_out: ClosureOutput,
    /// Subgrid energy; empty unless the closure is prognostic.
    tke_sgs: Vec<f64>,
    stress_gradient: Vec<f64>,
    viscosity: f64,
    hyperviscosity: Option<f64>,
    amplitude: f64,
}

impl LesMode {
    pub fn new(params: &SimulationParams, planner: &mut Planner) -> Result<LesMode> {
        let mut ops = Self::build_workspace(params, planner)?;
        let grid = *ops.grid();
        let nx = grid.nx();
        let fine_nx = ops.fine_nx();
        let noise = ColoredNoise::new(fine_nx, params.noise_exponent, planner);
        let hyperviscosity = params.hyperviscosity.then(|| grid.dx().powi(4));

        info!(
            nx,
            nx_dns = fine_nx,
            closure = params.closure.as_str(),
            hyperviscosity = params.hyperviscosity,
            "running in LES mode"
        );

        let mut closure = closure::build(params.closure, &grid);
        let mut closure_out = ClosureOutput::new(nx);
        let mut tke_sgs = if params.closure.has_tke() {
            vec![1.0; nx]
        } else {
            Vec::new()
        };

        // Prime the closure outputs so the initial snapshot is complete.
        // With dt = 0 the subgrid energy is left as is.
        let zeros = vec![0.0; nx];
        closure.compute(
            ClosureInput {
                u: &zeros,
                dudx: &zeros,
                dt: 0.0,
            },
            &mut tke_sgs,
            &mut ops,
            &mut closure_out,
        );

        Ok(LesMode {
            grid,
            ops,
            noise,
            fine_noise: vec![0.0; fine_nx],
            forcing: vec![0.0; nx],
            derivatives: DerivativeSet::new(nx),
            diagnostics: DerivativeSet::new(nx),
            closure,
            closure_out,
            tke_sgs,
            stress_gradient: vec![0.0; nx],
            viscosity: params.viscosity,
            hyperviscosity,
            amplitude: params.forcing_amplitude(),
        })
    }

    // ---- Accessors ----

    pub fn forcing(&self) -> &[f64] {
        &self.forcing
    }

    pub fn tke_sgs(&self) -> &[f64] {
        &self.tke_sgs
    }

    pub fn coefficient(&self) -> f64 {
        self.closure_out.coefficient
    }

    /// Domain-mean subgrid energy, zero without a prognostic closure.
    pub fn mean_tke_sgs(&self) -> f64 {
        mean(&self.tke_sgs)
    }
}

impl Mode for LesMode {
    fn name(&self) -> &'static str {
        "LES"
    }

    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn build_workspace(params: &SimulationParams, planner: &mut Planner) -> Result<SpectralWorkspace> {
        let grid = params.les_grid()?;
        SpectralWorkspace::new(grid, params.nx_dns, planner)
    }

    fn compute_noise(&mut self, rng: &mut ChaCha8Rng) {
        self.noise.compute_noise(rng, &mut self.fine_noise);
        self.ops.downscale(&self.fine_noise, &mut self.forcing);
    }

    fn compute_rhs(&mut self, u: &[f64], stage_dt: f64, rhs: &mut [f64]) {
        let orders: &[DerivativeOrder] = if self.hyperviscosity.is_some() {
            &ORDERS_HYPER
        } else {
            &ORDERS
        };
        self.ops.derivatives(u, orders, &mut self.derivatives);

        self.closure.compute(
            ClosureInput {
                u,
                dudx: &self.derivatives.first,
                dt: stage_dt,
            },
            &mut self.tke_sgs,
            &mut self.ops,
            &mut self.closure_out,
        );
        self.ops.derivative(
            &self.closure_out.stress,
            DerivativeOrder::First,
            &mut self.stress_gradient,
        );

        let d = &self.derivatives;
        for i in 0..rhs.len() {
            rhs[i] = self.viscosity * d.second[i] - 0.5 * d.squared[i]
                + self.amplitude * self.forcing[i]
                - 0.5 * self.stress_gradient[i];
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
        let mut specs = vec![
            FieldSpec::fixed("x", nx, "distance", "m"),
            FieldSpec::profile("u", nx, "velocity", "m s-1"),
            FieldSpec::scalar("tke", "turbulence kinetic energy", "m2 s-2"),
            FieldSpec::scalar("C_sgs", "subgrid model coefficient", "1"),
            FieldSpec::scalar("diss_sgs", "subgrid dissipation", "m2 s-3"),
            FieldSpec::scalar("diss_mol", "molecular dissipation", "m2 s-3"),
            FieldSpec::scalar("ens_prod", "enstrophy production", "s-3"),
            FieldSpec::scalar("ens_diss_sgs", "subgrid enstrophy dissipation", "s-3"),
            FieldSpec::scalar("ens_diss_mol", "molecular enstrophy dissipation", "s-3"),
        ];
        if self.closure.kind().has_tke() {
            specs.extend([
                FieldSpec::profile("tke_sgs", nx, "subgrid turbulence kinetic energy", "m2 s-2"),
                FieldSpec::scalar("tke_sgs_prod", "subgrid energy production", "m2 s-3"),
                FieldSpec::scalar("tke_sgs_diff", "subgrid energy diffusion", "m2 s-3"),
                FieldSpec::scalar("tke_sgs_diss", "subgrid energy dissipation", "m2 s-3"),
            ]);
        }
        specs
    }

    fn save_diagnostics(&mut self, u: &[f64], snapshot: &mut Snapshot) {
        self.ops.derivatives(u, &DIAGNOSTIC_ORDERS, &mut self.diagnostics);
        let d = &self.diagnostics;
        let closed = &self.derivatives;
        let tau = &self.closure_out.stress;
        let nu = self.viscosity;
        let n = u.len().max(1) as f64;

        let mut diss_sgs = 0.0;
        let mut diss_mol = 0.0;
        let mut ens_prod = 0.0;
        let mut ens_diss_sgs = 0.0;
        let mut ens_diss_mol = 0.0;
        for i in 0..u.len() {
            let s = d.first[i];
            diss_sgs -= tau[i] * closed.first[i];
            diss_mol += nu * s * s;
            ens_prod += s * s * s;
            ens_diss_sgs -= tau[i] * closed.third[i];
            ens_diss_mol += nu * d.second[i] * d.second[i];
        }

        if snapshot.get("x").is_none() {
            snapshot.set("x", &self.grid.coordinates());
        }
        snapshot.set("u", u);
        snapshot.set_scalar("tke", variance(u));
        snapshot.set_scalar("C_sgs", self.closure_out.coefficient);
        snapshot.set_scalar("diss_sgs", diss_sgs / n);
        snapshot.set_scalar("diss_mol", diss_mol / n);
        snapshot.set_scalar("ens_prod", ens_prod / n);
        snapshot.set_scalar("ens_diss_sgs", ens_diss_sgs / n);
        snapshot.set_scalar("ens_diss_mol", ens_diss_mol / n);

        if self.closure.kind().has_tke() {
            let budget = self.closure_out.budget.unwrap_or_default();
            snapshot.set("tke_sgs", &self.tke_sgs);
            snapshot.set_scalar("tke_sgs_prod", budget.production);
            snapshot.set_scalar("tke_sgs_diff", budget.diffusion);
            snapshot.set_scalar("tke_sgs_diss", budget.dissipation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::ClosureKind;
    use crate::params::SimMode;
    use crate::transform::PlanSettings;
    use rand::SeedableRng;

    fn les(closure: ClosureKind) -> LesMode {
        let params = SimulationParams {
            mode: SimMode::Les,
            closure,
            ..Default::default()
        };
        let mut planner = Planner::new(PlanSettings::default());
        LesMode::new(&params, &mut planner).unwrap()
    }

    #[test]
    fn deardorff_starts_with_unit_energy() {
        let m = les(ClosureKind::Deardorff);
        assert_eq!(m.tke_sgs().len(), 32);
        assert!(m.tke_sgs().iter().all(|&k| k == 1.0));
        assert_eq!(m.coefficient(), 0.10);
        assert_eq!(m.field_specs().len(), 13);

        let m = les(ClosureKind::DynamicSmagorinsky);
        assert!(m.tke_sgs().is_empty());
        assert_eq!(m.mean_tke_sgs(), 0.0);
        assert_eq!(m.field_specs().len(), 9);
    }

    #[test]
    fn forcing_is_downscaled_to_the_les_grid() {
        let mut m = les(ClosureKind::None);
        m.compute_noise(&mut ChaCha8Rng::seed_from_u64(2));
        assert_eq!(m.forcing().len(), 32);
        assert!(m.forcing().iter().any(|f| *f != 0.0));
        let mean = m.forcing().iter().sum::<f64>() / 32.0;
        assert!(mean.abs() < 1e-12);
    }

    #[test]
    fn unclosed_les_matches_dns_operator() {
        let mut m = les(ClosureKind::None);
        let x = m.grid().coordinates();
        let u: Vec<f64> = x.iter().map(|x| 0.1 * x.sin()).collect();
        let mut rhs = vec![0.0; 32];
        m.compute_rhs(&u, 0.0, &mut rhs);
        for ((r, v), x) in rhs.iter().zip(&u).zip(&x) {
            let expected = -0.01 * v - 0.005 * (2.0 * x).sin();
            assert!((r - expected).abs() < 1e-8);
        }
    }

    #[test]
    fn snapshot_holds_every_declared_field() {
        for kind in ClosureKind::ALL {
            let mut m = les(kind);
            let u: Vec<f64> = m.grid().coordinates().iter().map(|x| x.sin()).collect();
            let mut rhs = vec![0.0; 32];
            m.compute_rhs(&u, 1e-4, &mut rhs);
            let mut snap = Snapshot::new();
            m.save_diagnostics(&u, &mut snap);
            for spec in m.field_specs() {
                let values = snap.get(spec.name).unwrap_or_else(|| panic!("{} missing", spec.name));
                assert_eq!(values.len(), spec.len);
                assert!(values.iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn subgrid_budgets_use_the_state_the_stress_came_from() {
        let mut m = les(ClosureKind::ConstantSmagorinsky);
        let x = m.grid().coordinates();
        let u: Vec<f64> = x.iter().map(|x| x.sin()).collect();
        let mut rhs = vec![0.0; 32];
        m.compute_rhs(&u, 1e-4, &mut rhs);

        // d/dx sin = cos, d3/dx3 sin = -cos
        let n = x.len() as f64;
        let tau = &m.closure_out.stress;
        let diss: f64 = -tau.iter().zip(&x).map(|(t, x)| t * x.cos()).sum::<f64>() / n;
        let ens: f64 = tau.iter().zip(&x).map(|(t, x)| t * x.cos()).sum::<f64>() / n;
        assert!(diss > 0.0);

        // Saving a different state must not change the pairing.
        let mut snap = Snapshot::new();
        m.save_diagnostics(&[0.0; 32], &mut snap);
        assert!((snap.scalar("diss_sgs").unwrap() - diss).abs() < 1e-10);
        assert!((snap.scalar("ens_diss_sgs").unwrap() - ens).abs() < 1e-10);
        assert_eq!(snap.scalar("diss_mol"), Some(0.0));
    }
}
