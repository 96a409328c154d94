use tracing::info;

use super::{
    Closure, ClosureInput, ClosureKind, ClosureOutput, TEST_FILTER_RATIO,
    least_squares_coefficient, leonard_stress,
};
use crate::grid::Grid;
use crate::spectral::SpectralWorkspace;

const EXPONENT: f64 = 4.0 / 3.0;

/// Dynamic Wong-Lilly closure: `tau = -2 C dx^(4/3) S`, linear in the
/// gradient, with `C` from the test-filtered field.
#[derive(Debug, Clone)]
pub struct WongLilly {
    dx_scaled: f64,
    filtered_u: Vec<f64>,
    leonard: Vec<f64>,
    model: Vec<f64>,
    scratch: Vec<f64>,
}

impl WongLilly {
    pub fn new(grid: &Grid) -> WongLilly {
        info!("using dynamic Wong-Lilly closure");
        let nx = grid.nx();
        WongLilly {
            dx_scaled: grid.dx().powf(EXPONENT),
            filtered_u: vec![0.0; nx],
            leonard: vec![0.0; nx],
            model: vec![0.0; nx],
            scratch: vec![0.0; nx],
        }
    }
}

impl Closure for WongLilly {
    fn kind(&self) -> ClosureKind {
        ClosureKind::WongLilly
    }

    fn compute(
        &mut self,
        input: ClosureInput<'_>,
        _tke: &mut [f64],
        ops: &mut SpectralWorkspace,
        out: &mut ClosureOutput,
    ) {
        leonard_stress(
            input.u,
            ops,
            &mut self.filtered_u,
            &mut self.scratch,
            &mut self.leonard,
        );

        ops.cutoff(input.dudx, TEST_FILTER_RATIO, &mut self.model);
        let factor = self.dx_scaled * (1.0 - (TEST_FILTER_RATIO as f64).powf(EXPONENT));
        for m in self.model.iter_mut() {
            *m *= factor;
        }

        let c = least_squares_coefficient(&self.leonard, &self.model);

        for (t, &s) in out.stress.iter_mut().zip(input.dudx) {
            *t = -2.0 * c * self.dx_scaled * s;
        }
        out.coefficient = c;
        out.budget = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::{DerivativeOrder, DerivativeSet};
    use crate::transform::{PlanSettings, Planner};

    #[test]
    fn stress_is_linear_in_gradient() {
        let grid = Grid::periodic(64).unwrap();
        let mut planner = Planner::new(PlanSettings::default());
        let mut ops = SpectralWorkspace::new(grid, 64, &mut planner).unwrap();
        let u: Vec<f64> = grid
            .coordinates()
            .iter()
            .map(|&x| x.sin() + 0.4 * (11.0 * x).cos() - 0.2 * (18.0 * x).sin())
            .collect();
        let mut d = DerivativeSet::new(64);
        ops.derivatives(&u, &[DerivativeOrder::First], &mut d);

        let mut closure = WongLilly::new(&grid);
        let mut out = ClosureOutput::new(64);
        closure.compute(
            ClosureInput { u: &u, dudx: &d.first, dt: 0.0 },
            &mut [],
            &mut ops,
            &mut out,
        );

        assert!(out.coefficient >= 0.0);
        let expected = -2.0 * out.coefficient * grid.dx().powf(4.0 / 3.0);
        for (t, s) in out.stress.iter().zip(&d.first) {
            assert!((t - expected * s).abs() < 1e-12);
        }
    }
}
