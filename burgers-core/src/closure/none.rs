use super::{Closure, ClosureInput, ClosureKind, ClosureOutput};
use crate::spectral::SpectralWorkspace;

/// Unclosed LES: no subgrid stress at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClosure;

impl Closure for NoClosure {
    fn kind(&self) -> ClosureKind {
        ClosureKind::None
    }

    fn compute(
        &mut self,
        _input: ClosureInput<'_>,
        _tke: &mut [f64],
        _ops: &mut SpectralWorkspace,
        out: &mut ClosureOutput,
    ) {
        out.stress.fill(0.0);
        out.coefficient = 0.0;
        out.budget = None;
    }
}
