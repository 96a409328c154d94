use std::f64::consts::PI;

use crate::closure::ClosureKind;
use crate::error::{BurgersError, Result};
use crate::grid::Grid;
use crate::transform::PlanSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimMode {
    #[default]
    Dns,
    Les,
}

impl SimMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimMode::Dns => "dns",
            SimMode::Les => "les",
        }
    }

    pub fn parse(name: &str) -> Option<SimMode> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dns" => Some(SimMode::Dns),
            "les" => Some(SimMode::Les),
            _ => None,
        }
    }
}

/// Validated scalar inputs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub mode: SimMode,
    pub domain_length: f64,
    pub nx_dns: usize,
    pub nx_les: usize,
    pub viscosity: f64,
    pub closure: ClosureKind,
    /// Spectral slope of the forcing.
    pub noise_exponent: f64,
    pub noise_amplitude: f64,
    pub cfl: f64,
    /// Largest step, also the noise refresh interval.
    pub max_step: f64,
    pub duration: f64,
    pub save_interval: f64,
    pub print_interval: f64,
    pub hyperviscosity: bool,
    pub plan: PlanSettings,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            mode: SimMode::Dns,
            domain_length: 2.0 * PI,
            nx_dns: 64,
            nx_les: 32,
            viscosity: 0.01,
            closure: ClosureKind::ConstantSmagorinsky,
            noise_exponent: 0.75,
            noise_amplitude: 0.1,
            cfl: 0.4,
            max_step: 1e-3,
            duration: 0.01,
            save_interval: 0.005,
            print_interval: 0.005,
            hyperviscosity: false,
            plan: PlanSettings::default(),
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BurgersError::invalid(name, format!("must be positive and finite, got {value}")))
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<()> {
        positive("domain_length", self.domain_length)?;
        positive("viscosity", self.viscosity)?;
        positive("cfl", self.cfl)?;
        positive("max_step", self.max_step)?;
        positive("duration", self.duration)?;
        positive("save_interval", self.save_interval)?;
        positive("print_interval", self.print_interval)?;

        if !(self.noise_amplitude.is_finite() && self.noise_amplitude >= 0.0) {
            return Err(BurgersError::invalid(
                "noise_amplitude",
                format!("must be non-negative, got {}", self.noise_amplitude),
            ));
        }
        if !self.noise_exponent.is_finite() {
            return Err(BurgersError::invalid("noise_exponent", "must be finite"));
        }
        if self.plan.threads == 0 {
            return Err(BurgersError::invalid("threads", "need at least one worker"));
        }

        let dns = self.dns_grid()?;
        if self.mode == SimMode::Les {
            self.les_grid()?.refinement(dns.nx())?;
        }
        Ok(())
    }

    pub fn dns_grid(&self) -> Result<Grid> {
        Grid::new(self.nx_dns, self.domain_length)
    }

    pub fn les_grid(&self) -> Result<Grid> {
        Grid::new(self.nx_les, self.domain_length)
    }

    /// Prefactor on the unit noise so the injected variance per unit time
    /// does not depend on how often the noise is redrawn.
    pub fn forcing_amplitude(&self) -> f64 {
        (2.0 * self.noise_amplitude / self.max_step).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let p = SimulationParams::default();
        p.validate().unwrap();
        assert!((p.forcing_amplitude() - (200.0f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_scalars() {
        let mut p = SimulationParams { cfl: 0.0, ..Default::default() };
        assert!(matches!(p.validate(), Err(BurgersError::InvalidParameter { name: "cfl", .. })));
        p.cfl = 0.4;
        p.duration = f64::INFINITY;
        assert!(p.validate().is_err());
        p.duration = 1.0;
        p.plan.threads = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn les_grid_must_divide_dns_grid() {
        let p = SimulationParams {
            mode: SimMode::Les,
            nx_dns: 96,
            nx_les: 64,
            ..Default::default()
        };
        assert_eq!(p.validate(), Err(BurgersError::GridRatio { fine: 96, coarse: 64 }));
        // DNS ignores the LES grid ratio
        let p = SimulationParams { mode: SimMode::Dns, ..p };
        p.validate().unwrap();
    }

    #[test]
    fn mode_names() {
        assert_eq!(SimMode::parse("LES"), Some(SimMode::Les));
        assert_eq!(SimMode::parse("rans"), None);
        assert_eq!(SimMode::Dns.as_str(), "dns");
    }
}
