use rand::Rng;
use rand_distr::StandardNormal;

use crate::transform::{Planner, Transform};

/// Fractional-Brownian forcing with a `k^(-alpha)` power spectrum.
pub struct ColoredNoise {
    transform: Transform,
    /// `k^(-alpha/2)` per mode, with `k = 1` standing in at DC.
    coloring: Vec<f64>,
}

impl ColoredNoise {
    pub fn new(n: usize, alpha: f64, planner: &mut Planner) -> ColoredNoise {
        let transform = Transform::new(n, planner);
        let coloring = (0..transform.modes())
            .map(|k| {
                let k = if k == 0 { 1.0 } else { k as f64 };
                k.powf(-0.5 * alpha)
            })
            .collect();

        ColoredNoise {
            transform,
            coloring,
        }
    }

    pub fn len(&self) -> usize {
        self.transform.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transform.is_empty()
    }

    /// Draws one realization into `out` (length `n`).
    pub fn compute_noise<R: Rng + ?Sized>(&mut self, rng: &mut R, out: &mut [f64]) {
        let n = self.transform.len();
        let amplitude = (n as f64).sqrt();

        for x in self.transform.real.iter_mut() {
            let z: f64 = rng.sample(StandardNormal);
            *x = amplitude * z;
        }
        self.transform.forward();

        let nyquist = n / 2;
        for (k, (c, &w)) in self
            .transform
            .spectrum
            .iter_mut()
            .zip(&self.coloring)
            .enumerate()
        {
            if k == 0 || k == nyquist {
                c.re = 0.0;
                c.im = 0.0;
            } else {
                *c *= w;
            }
        }
        self.transform.inverse();
        out.copy_from_slice(&self.transform.real);
    }
}
