//! Fourier-collocation operators on a periodic grid.
//!
//! One [`SpectralWorkspace`] serves one simulation. It owns every transform
//! the operators need (the base grid, the 2x and 3/2 padded grids and, for
//! LES, the fine grid the noise lives on), all planned at construction.
//!
//! Aliasing: every operator overwrites the workspace's transform buffers, so
//! nothing borrowed from the workspace survives the next call. Results are
//! copied into caller-owned slices. Inputs are never written.

use num_complex::Complex64;

use crate::error::Result;
use crate::grid::Grid;
use crate::transform::{Planner, Transform};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivativeOrder {
    First,
    Second,
    Third,
    /// Used by hyperviscosity.
    Fourth,
    /// Dealiased `d(u^2)/dx`.
    Squared,
}

impl DerivativeOrder {
    pub fn key(&self) -> &'static str {
        match self {
            DerivativeOrder::First => "1",
            DerivativeOrder::Second => "2",
            DerivativeOrder::Third => "3",
            DerivativeOrder::Fourth => "4",
            DerivativeOrder::Squared => "sq",
        }
    }

    fn power(&self) -> u32 {
        match self {
            DerivativeOrder::First | DerivativeOrder::Squared => 1,
            DerivativeOrder::Second => 2,
            DerivativeOrder::Third => 3,
            DerivativeOrder::Fourth => 4,
        }
    }
}

/// Caller-owned derivative arrays, one per order.
///
/// An entry keeps its values until the next request for the same order.
#[derive(Debug, Clone)]
pub struct DerivativeSet {
    pub first: Vec<f64>,
    pub second: Vec<f64>,
    pub third: Vec<f64>,
    pub fourth: Vec<f64>,
    pub squared: Vec<f64>,
}

impl DerivativeSet {
    pub fn new(nx: usize) -> DerivativeSet {
        DerivativeSet {
            first: vec![0.0; nx],
            second: vec![0.0; nx],
            third: vec![0.0; nx],
            fourth: vec![0.0; nx],
            squared: vec![0.0; nx],
        }
    }

    pub fn get(&self, order: DerivativeOrder) -> &[f64] {
        match order {
            DerivativeOrder::First => &self.first,
            DerivativeOrder::Second => &self.second,
            DerivativeOrder::Third => &self.third,
            DerivativeOrder::Fourth => &self.fourth,
            DerivativeOrder::Squared => &self.squared,
        }
    }

    fn get_mut(&mut self, order: DerivativeOrder) -> &mut [f64] {
        match order {
            DerivativeOrder::First => &mut self.first,
            DerivativeOrder::Second => &mut self.second,
            DerivativeOrder::Third => &mut self.third,
            DerivativeOrder::Fourth => &mut self.fourth,
            DerivativeOrder::Squared => &mut self.squared,
        }
    }
}

/// `(i k)^p` for the physical wavenumber `k`.
fn spectral_factor(k: f64, power: u32) -> Complex64 {
    match power % 4 {
        0 => Complex64::new(k.powi(power as i32), 0.0),
        1 => Complex64::new(0.0, k.powi(power as i32)),
        2 => Complex64::new(-k.powi(power as i32), 0.0),
        _ => Complex64::new(0.0, -k.powi(power as i32)),
    }
}

pub struct SpectralWorkspace {
    grid: Grid,
    ratio: usize,
    base: Transform,
    padded: Transform,
    three_halves: Transform,
    fine: Transform,
    u_hat: Vec<Complex64>,
    product: Vec<f64>,
    wavenumbers: Vec<f64>,
}

impl SpectralWorkspace {
    /// Workspace for `grid`. `fine_nx` is the resolution fields are
    /// downscaled from; pass `grid.nx()` when nothing is downscaled.
    pub fn new(grid: Grid, fine_nx: usize, planner: &mut Planner) -> Result<SpectralWorkspace> {
        let nx = grid.nx();
        let ratio = grid.refinement(fine_nx)?;
        let half = grid.nyquist();
        let scale = grid.wavenumber_scale();

        // k[nx/2] is treated as zero so odd derivatives stay real.
        let wavenumbers = (0..=half)
            .map(|k| if k == half { 0.0 } else { k as f64 * scale })
            .collect();

        Ok(SpectralWorkspace {
            grid,
            ratio,
            base: Transform::new(nx, planner),
            padded: Transform::new(2 * nx, planner),
            three_halves: Transform::new(3 * nx / 2, planner),
            fine: Transform::new(fine_nx, planner),
            u_hat: vec![ZERO; half + 1],
            product: vec![0.0; 3 * nx / 2],
            wavenumbers,
        })
    }

    // ---- Accessors ----

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn nx(&self) -> usize {
        self.grid.nx()
    }

    /// Fine-to-coarse point ratio used by [`downscale`](Self::downscale).
    pub fn ratio(&self) -> usize {
        self.ratio
    }

    pub fn fine_nx(&self) -> usize {
        self.fine.len()
    }

    /// Nyquist coefficient left in the base spectrum by the last operator.
    pub fn nyquist_coefficient(&self) -> Complex64 {
        self.base.spectrum[self.grid.nyquist()]
    }

    // ---- Operators ----

    /// Computes each requested derivative of `u` into `out`.
    pub fn derivatives(&mut self, u: &[f64], orders: &[DerivativeOrder], out: &mut DerivativeSet) {
        self.base.real.copy_from_slice(u);
        self.base.forward();
        self.u_hat.copy_from_slice(&self.base.spectrum);

        for &order in orders {
            match order {
                DerivativeOrder::Squared => self.squared_spectrum(),
                _ => {
                    let power = order.power();
                    for ((s, &c), &k) in self
                        .base
                        .spectrum
                        .iter_mut()
                        .zip(&self.u_hat)
                        .zip(&self.wavenumbers)
                    {
                        *s = c * spectral_factor(k, power);
                    }
                }
            }
            self.base.inverse();
            out.get_mut(order).copy_from_slice(&self.base.real);
        }
    }

    /// Single derivative of `x` into `out`.
    pub fn derivative(&mut self, x: &[f64], order: DerivativeOrder, out: &mut [f64]) {
        self.base.real.copy_from_slice(x);
        self.base.forward();
        let power = order.power();
        if order == DerivativeOrder::Squared {
            self.u_hat.copy_from_slice(&self.base.spectrum);
            self.squared_spectrum();
        } else {
            for (s, &k) in self.base.spectrum.iter_mut().zip(&self.wavenumbers) {
                *s *= spectral_factor(k, power);
            }
        }
        self.base.inverse();
        out.copy_from_slice(&self.base.real);
    }

    /// Fills the base spectrum with `ik * F[u^2]`, the square taken on the
    /// doubled grid.
    fn squared_spectrum(&mut self) {
        let half = self.grid.nyquist();

        // Pad to 2nx; the factor 2 keeps physical amplitudes after the
        // longer inverse. The Nyquist coefficient is dropped.
        self.padded.spectrum.fill(ZERO);
        for (p, &c) in self.padded.spectrum[..half].iter_mut().zip(&self.u_hat) {
            *p = c * 2.0;
        }
        self.padded.inverse();
        for x in self.padded.real.iter_mut() {
            *x *= *x;
        }
        self.padded.forward();

        for k in 0..half {
            let c = self.padded.spectrum[k] * 0.5;
            self.base.spectrum[k] = c * spectral_factor(self.wavenumbers[k], 1);
        }
        self.base.spectrum[half] = ZERO;
    }

    /// `|x| * x` under the 3/2 rule.
    pub fn dealias_abs_product(&mut self, x: &[f64], out: &mut [f64]) {
        let half = self.grid.nyquist();

        self.base.real.copy_from_slice(x);
        self.pad_three_halves();
        self.product.copy_from_slice(&self.three_halves.real);

        for (b, &v) in self.base.real.iter_mut().zip(x) {
            *b = v.abs();
        }
        self.pad_three_halves();

        for (p, &a) in self.three_halves.real.iter_mut().zip(&self.product) {
            *p *= a;
        }
        self.three_halves.forward();

        for k in 0..half {
            self.base.spectrum[k] = self.three_halves.spectrum[k] / 1.5;
        }
        self.base.spectrum[half] = ZERO;
        self.base.inverse();
        out.copy_from_slice(&self.base.real);
    }

    /// Transforms `base.real` and inverts it on the 3nx/2 grid.
    fn pad_three_halves(&mut self) {
        let half = self.grid.nyquist();
        self.base.forward();
        self.three_halves.spectrum.fill(ZERO);
        for (p, &c) in self.three_halves.spectrum[..half]
            .iter_mut()
            .zip(&self.base.spectrum)
        {
            *p = c * 1.5;
        }
        self.three_halves.inverse();
    }

    /// Sharp spectral filter keeping modes below `nx / (2 * ratio)`.
    pub fn cutoff(&mut self, x: &[f64], ratio: usize, out: &mut [f64]) {
        let keep = self.grid.nx() / (2 * ratio.max(1));

        self.base.real.copy_from_slice(x);
        self.base.forward();
        for c in self.base.spectrum.iter_mut().skip(keep) {
            *c = ZERO;
        }
        self.base.inverse();
        out.copy_from_slice(&self.base.real);
    }

    /// Projects a fine-grid field onto this grid, keeping the modes the
    /// coarse grid resolves below its Nyquist.
    pub fn downscale(&mut self, x_fine: &[f64], out: &mut [f64]) {
        let half = self.grid.nyquist();
        let scale = 1.0 / self.ratio as f64;

        self.fine.real.copy_from_slice(x_fine);
        self.fine.forward();
        for k in 0..half {
            self.base.spectrum[k] = self.fine.spectrum[k] * scale;
        }
        self.base.spectrum[half] = ZERO;
        self.base.inverse();
        out.copy_from_slice(&self.base.real);
    }

    /// Removes the Nyquist mode from `u` in place.
    pub fn zero_nyquist(&mut self, u: &mut [f64]) {
        let half = self.grid.nyquist();
        self.base.real.copy_from_slice(u);
        self.base.forward();
        self.base.spectrum[half] = ZERO;
        self.base.inverse();
        u.copy_from_slice(&self.base.real);
    }
}
