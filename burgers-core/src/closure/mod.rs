//! Subgrid stress closures for the filtered equation.
//!
//! Every closure turns the resolved velocity and its gradient into a stress
//! field `tau`; the LES right-hand side then subtracts `0.5 * dtau/dx`.
//! Closures are picked by numeric id through [`ClosureKind`], and each kind
//! maps to exactly one constructor in [`ClosureKind::constructor`].

mod deardorff;
mod none;
mod smagorinsky;
mod wong_lilly;

pub use deardorff::Deardorff;
pub use none::NoClosure;
pub use smagorinsky::{ConstantSmagorinsky, DynamicSmagorinsky};
pub use wong_lilly::WongLilly;

use crate::error::{BurgersError, Result};
use crate::grid::Grid;
use crate::spectral::SpectralWorkspace;

/// Explicit test-filter width used by the dynamic procedures.
pub const TEST_FILTER_RATIO: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureKind {
    None,
    ConstantSmagorinsky,
    DynamicSmagorinsky,
    WongLilly,
    Deardorff,
}

impl ClosureKind {
    pub const ALL: [ClosureKind; 5] = [
        ClosureKind::None,
        ClosureKind::ConstantSmagorinsky,
        ClosureKind::DynamicSmagorinsky,
        ClosureKind::WongLilly,
        ClosureKind::Deardorff,
    ];

    pub fn from_id(id: u8) -> Result<ClosureKind> {
        ClosureKind::ALL
            .get(id as usize)
            .copied()
            .ok_or(BurgersError::UnknownClosure(id))
    }

    pub fn id(&self) -> u8 {
        match self {
            ClosureKind::None => 0,
            ClosureKind::ConstantSmagorinsky => 1,
            ClosureKind::DynamicSmagorinsky => 2,
            ClosureKind::WongLilly => 3,
            ClosureKind::Deardorff => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClosureKind::None => "none",
            ClosureKind::ConstantSmagorinsky => "constant-smagorinsky",
            ClosureKind::DynamicSmagorinsky => "dynamic-smagorinsky",
            ClosureKind::WongLilly => "dynamic-wong-lilly",
            ClosureKind::Deardorff => "deardorff-tke",
        }
    }

    /// Whether the closure carries a prognostic subgrid energy field.
    pub fn has_tke(&self) -> bool {
        matches!(self, ClosureKind::Deardorff)
    }

    pub fn constructor(&self) -> Constructor {
        match self {
            ClosureKind::None => make_none,
            ClosureKind::ConstantSmagorinsky => make_constant_smagorinsky,
            ClosureKind::DynamicSmagorinsky => make_dynamic_smagorinsky,
            ClosureKind::WongLilly => make_wong_lilly,
            ClosureKind::Deardorff => make_deardorff,
        }
    }
}

pub type Constructor = fn(&Grid) -> Box<dyn Closure>;

fn make_none(_grid: &Grid) -> Box<dyn Closure> {
    Box::new(NoClosure)
}

fn make_constant_smagorinsky(grid: &Grid) -> Box<dyn Closure> {
    Box::new(ConstantSmagorinsky::new(grid))
}

fn make_dynamic_smagorinsky(grid: &Grid) -> Box<dyn Closure> {
    Box::new(DynamicSmagorinsky::new(grid))
}

fn make_wong_lilly(grid: &Grid) -> Box<dyn Closure> {
    Box::new(WongLilly::new(grid))
}

fn make_deardorff(grid: &Grid) -> Box<dyn Closure> {
    Box::new(Deardorff::new(grid))
}

pub fn build(kind: ClosureKind, grid: &Grid) -> Box<dyn Closure> {
    (kind.constructor())(grid)
}

pub fn build_from_id(id: u8, grid: &Grid) -> Result<Box<dyn Closure>> {
    Ok(build(ClosureKind::from_id(id)?, grid))
}

/// Resolved state handed to a closure.
#[derive(Debug, Clone, Copy)]
pub struct ClosureInput<'a> {
    pub u: &'a [f64],
    pub dudx: &'a [f64],
    /// Time over which prognostic closures advance their own state.
    pub dt: f64,
}

/// Domain-mean terms of the subgrid energy equation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TkeBudget {
    pub production: f64,
    pub diffusion: f64,
    pub dissipation: f64,
}

#[derive(Debug, Clone)]
pub struct ClosureOutput {
    pub stress: Vec<f64>,
    pub coefficient: f64,
    pub budget: Option<TkeBudget>,
}

impl ClosureOutput {
    pub fn new(nx: usize) -> ClosureOutput {
        ClosureOutput {
            stress: vec![0.0; nx],
            coefficient: 0.0,
            budget: None,
        }
    }
}

pub trait Closure {
    fn kind(&self) -> ClosureKind;

    /// Writes the stress and coefficient into `out`.
    ///
    /// `tke` is the subgrid energy field for closures with
    /// [`ClosureKind::has_tke`]; others ignore it and it may be empty.
    fn compute(
        &mut self,
        input: ClosureInput<'_>,
        tke: &mut [f64],
        ops: &mut SpectralWorkspace,
        out: &mut ClosureOutput,
    );
}

pub(crate) fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// `max(0, 0.5 <LM> / <MM>)`, zero when `M` vanishes identically.
pub(crate) fn least_squares_coefficient(l: &[f64], m: &[f64]) -> f64 {
    let n = l.len().max(1) as f64;
    let lm = l.iter().zip(m).map(|(a, b)| a * b).sum::<f64>() / n;
    let mm = m.iter().map(|b| b * b).sum::<f64>() / n;
    if mm == 0.0 {
        return 0.0;
    }
    (0.5 * lm / mm).max(0.0)
}

/// Resolved Leonard stress `cut(u^2) - cut(u)^2` under the test filter.
///
/// `filtered` receives `cut(u)` and `scratch` is clobbered.
pub(crate) fn leonard_stress(
    u: &[f64],
    ops: &mut SpectralWorkspace,
    filtered: &mut [f64],
    scratch: &mut [f64],
    out: &mut [f64],
) {
    ops.cutoff(u, TEST_FILTER_RATIO, filtered);
    for (s, &v) in scratch.iter_mut().zip(u) {
        *s = v * v;
    }
    ops.cutoff(scratch, TEST_FILTER_RATIO, out);
    for (l, &f) in out.iter_mut().zip(filtered.iter()) {
        *l -= f * f;
    }
}
