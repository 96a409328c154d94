//! Configuration errors raised while building a simulation.
//!
//! Everything here is detected once, at construction. Stepping itself never
//! fails: a degenerate step size ends the run through
//! [`StepOutcome::Stalled`](crate::integrator::StepOutcome) instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BurgersError {
    #[error("grid size must be positive, got {0}")]
    GridSize(usize),

    #[error("grid size must be even, got {0}")]
    OddGrid(usize),

    #[error("fine grid ({fine} points) is not an integer multiple of the coarse grid ({coarse} points)")]
    GridRatio { fine: usize, coarse: usize },

    #[error("unknown subgrid closure id {0} (valid ids: 0-4)")]
    UnknownClosure(u8),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl BurgersError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        BurgersError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BurgersError>;
