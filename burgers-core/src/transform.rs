//! Real-to-complex transforms on owned buffers.
//!
//! A [`Transform`] is planned once for a fixed length and then reused for the
//! whole run. Callers write into [`Transform::real`] (or
//! [`Transform::spectrum`]) and call [`Transform::forward`] (or
//! [`Transform::inverse`]); nothing is allocated per call.
//!
//! Conventions: `forward` is unnormalised, `inverse` divides by `n`, so the
//! pair round-trips. The half spectrum holds modes `0..=n/2`.

use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner, FftPlannerScalar};
use tracing::debug;

/// How hard the planner works before settling on an algorithm.
///
/// Names follow the usual FFT planning levels so existing namelists keep
/// working. `Estimate` uses the portable scalar planner; every other level
/// lets rustfft pick SIMD kernels for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanEffort {
    Estimate,
    #[default]
    Measure,
    Patient,
    Exhaustive,
}

impl PlanEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanEffort::Estimate => "estimate",
            PlanEffort::Measure => "measure",
            PlanEffort::Patient => "patient",
            PlanEffort::Exhaustive => "exhaustive",
        }
    }

    /// Accepts `measure`, `MEASURE` and `FFTW_MEASURE` alike.
    pub fn parse(name: &str) -> Option<PlanEffort> {
        let lower = name.trim().to_ascii_lowercase();
        let bare = lower.strip_prefix("fftw_").unwrap_or(&lower);
        match bare {
            "estimate" => Some(PlanEffort::Estimate),
            "measure" => Some(PlanEffort::Measure),
            "patient" => Some(PlanEffort::Patient),
            "exhaustive" => Some(PlanEffort::Exhaustive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSettings {
    pub effort: PlanEffort,
    /// Requested worker count. Transforms run on the calling thread, so this
    /// never changes results; it only takes part in plan-cache keys.
    pub threads: usize,
}

impl Default for PlanSettings {
    fn default() -> Self {
        PlanSettings {
            effort: PlanEffort::default(),
            threads: 1,
        }
    }
}

enum Backend {
    Scalar(FftPlannerScalar<f64>),
    Auto(FftPlanner<f64>),
}

/// Shared planner; remembers every length it has produced plans for.
pub struct Planner {
    backend: Backend,
    settings: PlanSettings,
    lengths: Vec<usize>,
}

impl Planner {
    pub fn new(settings: PlanSettings) -> Planner {
        let backend = match settings.effort {
            PlanEffort::Estimate => Backend::Scalar(FftPlannerScalar::new()),
            _ => Backend::Auto(FftPlanner::new()),
        };
        Planner {
            backend,
            settings,
            lengths: Vec::new(),
        }
    }

    pub fn settings(&self) -> PlanSettings {
        self.settings
    }

    /// Plans both directions for `n` up front.
    pub fn warm(&mut self, n: usize) {
        let _ = self.plan(n);
    }

    /// Sorted, de-duplicated lengths planned so far.
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    fn plan(&mut self, n: usize) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
        if let Err(pos) = self.lengths.binary_search(&n) {
            debug!(n, effort = self.settings.effort.as_str(), "planning transform");
            self.lengths.insert(pos, n);
        }
        match &mut self.backend {
            Backend::Scalar(p) => (p.plan_fft_forward(n), p.plan_fft_inverse(n)),
            Backend::Auto(p) => (p.plan_fft_forward(n), p.plan_fft_inverse(n)),
        }
    }
}

pub struct Transform {
    n: usize,
    forward_plan: Arc<dyn Fft<f64>>,
    inverse_plan: Arc<dyn Fft<f64>>,
    work: Vec<Complex64>,
    scratch: Vec<Complex64>,
    /// Physical-space values, `n` points.
    pub real: Vec<f64>,
    /// Fourier coefficients, `n/2 + 1` modes.
    pub spectrum: Vec<Complex64>,
}

impl Transform {
    pub fn new(n: usize, planner: &mut Planner) -> Transform {
        let (forward_plan, inverse_plan) = planner.plan(n);
        let scratch_len = forward_plan
            .get_inplace_scratch_len()
            .max(inverse_plan.get_inplace_scratch_len());

        Transform {
            n,
            forward_plan,
            inverse_plan,
            work: vec![Complex64::new(0.0, 0.0); n],
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
            real: vec![0.0; n],
            spectrum: vec![Complex64::new(0.0, 0.0); n / 2 + 1],
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn modes(&self) -> usize {
        self.spectrum.len()
    }

    /// `real` -> `spectrum`.
    pub fn forward(&mut self) {
        for (w, &x) in self.work.iter_mut().zip(&self.real) {
            *w = Complex64::new(x, 0.0);
        }
        self.forward_plan
            .process_with_scratch(&mut self.work, &mut self.scratch);

        let modes = self.spectrum.len();
        self.spectrum.copy_from_slice(&self.work[..modes]);
    }

    /// `spectrum` -> `real`, normalised by `1/n`.
    ///
    /// The imaginary parts of the DC mode and, for even `n`, the Nyquist mode
    /// are ignored, as for any real-valued inverse.
    pub fn inverse(&mut self) {
        let n = self.n;
        let half = n / 2;

        self.work[..=half].copy_from_slice(&self.spectrum);
        self.work[0].im = 0.0;
        if n % 2 == 0 {
            self.work[half].im = 0.0;
        }
        for k in 1..n.div_ceil(2) {
            self.work[n - k] = self.spectrum[k].conj();
        }

        self.inverse_plan
            .process_with_scratch(&mut self.work, &mut self.scratch);

        let norm = 1.0 / n as f64;
        for (x, w) in self.real.iter_mut().zip(&self.work) {
            *x = w.re * norm;
        }
    }
}
