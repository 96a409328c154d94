use tracing::info;

use super::{
    Closure, ClosureInput, ClosureKind, ClosureOutput, TEST_FILTER_RATIO,
    least_squares_coefficient, leonard_stress,
};
use crate::grid::Grid;
use crate::spectral::SpectralWorkspace;

pub const SMAGORINSKY_CONSTANT: f64 = 0.16;

/// `tau = -2 (Cs dx)^2 |S| S` with a fixed `Cs`.
#[derive(Debug, Clone)]
pub struct ConstantSmagorinsky {
    dx: f64,
}

impl ConstantSmagorinsky {
    pub fn new(grid: &Grid) -> ConstantSmagorinsky {
        info!(cs = SMAGORINSKY_CONSTANT, "using constant Smagorinsky closure");
        ConstantSmagorinsky { dx: grid.dx() }
    }
}

impl Closure for ConstantSmagorinsky {
    fn kind(&self) -> ClosureKind {
        ClosureKind::ConstantSmagorinsky
    }

    fn compute(
        &mut self,
        input: ClosureInput<'_>,
        _tke: &mut [f64],
        ops: &mut SpectralWorkspace,
        out: &mut ClosureOutput,
    ) {
        ops.dealias_abs_product(input.dudx, &mut out.stress);
        let scale = -2.0 * SMAGORINSKY_CONSTANT.powi(2) * self.dx.powi(2);
        for t in out.stress.iter_mut() {
            *t *= scale;
        }
        out.coefficient = SMAGORINSKY_CONSTANT;
        out.budget = None;
    }
}

/// Smagorinsky with `Cs^2` fitted each call by the Germano identity.
#[derive(Debug, Clone)]
pub struct DynamicSmagorinsky {
    dx: f64,
    filtered_u: Vec<f64>,
    filtered_s: Vec<f64>,
    leonard: Vec<f64>,
    model: Vec<f64>,
    scratch: Vec<f64>,
}

impl DynamicSmagorinsky {
    pub fn new(grid: &Grid) -> DynamicSmagorinsky {
        info!(test_filter = TEST_FILTER_RATIO, "using dynamic Smagorinsky closure");
        let nx = grid.nx();
        DynamicSmagorinsky {
            dx: grid.dx(),
            filtered_u: vec![0.0; nx],
            filtered_s: vec![0.0; nx],
            leonard: vec![0.0; nx],
            model: vec![0.0; nx],
            scratch: vec![0.0; nx],
        }
    }
}

impl Closure for DynamicSmagorinsky {
    fn kind(&self) -> ClosureKind {
        ClosureKind::DynamicSmagorinsky
    }

    fn compute(
        &mut self,
        input: ClosureInput<'_>,
        _tke: &mut [f64],
        ops: &mut SpectralWorkspace,
        out: &mut ClosureOutput,
    ) {
        let dudx = input.dudx;
        leonard_stress(
            input.u,
            ops,
            &mut self.filtered_u,
            &mut self.scratch,
            &mut self.leonard,
        );

        // M = dx^2 (r^2 |cut(S)| cut(S) - cut(|S| S))
        ops.cutoff(dudx, TEST_FILTER_RATIO, &mut self.filtered_s);
        for (s, &d) in self.scratch.iter_mut().zip(dudx) {
            *s = d.abs() * d;
        }
        ops.cutoff(&self.scratch, TEST_FILTER_RATIO, &mut self.model);
        let r2 = (TEST_FILTER_RATIO * TEST_FILTER_RATIO) as f64;
        let dx2 = self.dx * self.dx;
        for (m, &sf) in self.model.iter_mut().zip(&self.filtered_s) {
            *m = dx2 * (r2 * sf.abs() * sf - *m);
        }

        let cs2 = least_squares_coefficient(&self.leonard, &self.model);

        ops.dealias_abs_product(dudx, &mut out.stress);
        for t in out.stress.iter_mut() {
            *t *= -2.0 * cs2 * dx2;
        }
        out.coefficient = cs2.sqrt();
        out.budget = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::{DerivativeOrder, DerivativeSet};
    use crate::transform::{PlanSettings, Planner};

    fn setup(nx: usize) -> (Grid, SpectralWorkspace) {
        let grid = Grid::periodic(nx).unwrap();
        let mut planner = Planner::new(PlanSettings::default());
        let ops = SpectralWorkspace::new(grid, nx, &mut planner).unwrap();
        (grid, ops)
    }

    fn rough_field(grid: &Grid) -> Vec<f64> {
        grid.coordinates()
            .iter()
            .map(|&x| x.sin() + 0.5 * (7.0 * x).sin() + 0.3 * (13.0 * x + 0.4).cos())
            .collect()
    }

    #[test]
    fn constant_coefficient_is_fixed() {
        let (grid, mut ops) = setup(64);
        let u = rough_field(&grid);
        let mut d = DerivativeSet::new(64);
        ops.derivatives(&u, &[DerivativeOrder::First], &mut d);

        let mut closure = ConstantSmagorinsky::new(&grid);
        let mut out = ClosureOutput::new(64);
        closure.compute(
            ClosureInput { u: &u, dudx: &d.first, dt: 0.0 },
            &mut [],
            &mut ops,
            &mut out,
        );
        assert_eq!(out.coefficient, 0.16);
        // Purely dissipative: <tau S> <= 0
        let work: f64 = out.stress.iter().zip(&d.first).map(|(t, s)| t * s).sum();
        assert!(work <= 0.0);
    }

    #[test]
    fn dynamic_coefficient_is_non_negative_and_consistent() {
        let (grid, mut ops) = setup(64);
        let u = rough_field(&grid);
        let mut d = DerivativeSet::new(64);
        ops.derivatives(&u, &[DerivativeOrder::First], &mut d);

        let mut closure = DynamicSmagorinsky::new(&grid);
        let mut out = ClosureOutput::new(64);
        closure.compute(
            ClosureInput { u: &u, dudx: &d.first, dt: 0.0 },
            &mut [],
            &mut ops,
            &mut out,
        );
        assert!(out.coefficient >= 0.0);
        assert!(out.coefficient.is_finite());
        if out.coefficient == 0.0 {
            assert!(out.stress.iter().all(|t| *t == 0.0));
        }
    }
}
