use std::f64::consts::PI;

use crate::error::{BurgersError, Result};

/// Uniform periodic grid on `[0, length)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    nx: usize,
    length: f64,
    dx: f64,
}

impl Grid {
    pub fn new(nx: usize, length: f64) -> Result<Grid> {
        if nx == 0 {
            return Err(BurgersError::GridSize(nx));
        }
        if nx % 2 != 0 {
            return Err(BurgersError::OddGrid(nx));
        }
        if !(length.is_finite() && length > 0.0) {
            return Err(BurgersError::invalid(
                "length",
                format!("domain length must be positive and finite, got {length}"),
            ));
        }

        Ok(Grid {
            nx,
            length,
            dx: length / nx as f64,
        })
    }

    /// Grid on the canonical `2π` domain.
    pub fn periodic(nx: usize) -> Result<Grid> {
        Grid::new(nx, 2.0 * PI)
    }

    // ---- Accessors ----

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn nyquist(&self) -> usize {
        self.nx / 2
    }

    /// Factor turning an integer mode index into a physical wavenumber.
    pub fn wavenumber_scale(&self) -> f64 {
        2.0 * PI / (self.nx as f64 * self.dx)
    }

    pub fn coordinates(&self) -> Vec<f64> {
        (0..self.nx).map(|i| i as f64 * self.dx).collect()
    }

    /// How many points of `fine` fall on one point of `self`.
    pub fn refinement(&self, fine: usize) -> Result<usize> {
        if fine < self.nx || fine % self.nx != 0 {
            return Err(BurgersError::GridRatio {
                fine,
                coarse: self.nx,
            });
        }
        Ok(fine / self.nx)
    }
}
