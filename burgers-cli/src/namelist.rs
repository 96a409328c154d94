//! JSON namelist: the run configuration read from disk.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use burgers_core::{BurgersError, ClosureKind, PlanEffort, PlanSettings, SimMode, SimulationParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NamelistError {
    #[error("cannot read namelist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed namelist: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for `{key}` ({value}): {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("unknown mode `{0}` (expected `dns` or `les`)")]
    UnknownMode(String),

    #[error(transparent)]
    Config(#[from] BurgersError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namelist {
    pub time: TimeSection,
    pub grid: GridSection,
    pub physics: PhysicsSection,
    pub output: OutputSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub transform: TransformSection,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSection {
    pub duration: f64,
    pub cfl: f64,
    pub max_step: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSection {
    #[serde(default = "default_length")]
    pub length: f64,
    pub dns: Points,
    pub les: Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Points {
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsSection {
    pub noise: NoiseSection,
    pub viscosity: f64,
    pub subgrid_model: u8,
    #[serde(default)]
    pub hyperviscosity: HyperviscositySection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSection {
    pub exponent: f64,
    pub amplitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HyperviscositySection {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    pub interval_save: f64,
    pub interval_print: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: default_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSection {
    #[serde(default = "default_planning")]
    pub planning: String,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for TransformSection {
    fn default() -> Self {
        TransformSection {
            planning: default_planning(),
            threads: default_threads(),
        }
    }
}

fn default_length() -> f64 {
    2.0 * PI
}

fn default_level() -> String {
    "info".to_string()
}

fn default_planning() -> String {
    PlanEffort::default().as_str().to_string()
}

fn default_threads() -> usize {
    1
}

fn require_even(key: &'static str, value: usize) -> Result<(), NamelistError> {
    if value > 0 && value % 2 == 0 {
        Ok(())
    } else {
        Err(NamelistError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "must be a positive even number of points",
        })
    }
}

impl Namelist {
    pub fn load(path: &Path) -> Result<Namelist, NamelistError> {
        let text = fs::read_to_string(path).map_err(|source| NamelistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Namelist::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Namelist, NamelistError> {
        let namelist: Namelist = serde_json::from_str(text)?;
        namelist.validate()?;
        Ok(namelist)
    }

    /// Checks the keys that only make sense in the file layout. Physical
    /// ranges are left to [`SimulationParams::validate`] in `to_params`.
    pub fn validate(&self) -> Result<(), NamelistError> {
        require_even("grid.dns.points", self.grid.dns.points)?;
        require_even("grid.les.points", self.grid.les.points)?;

        if self.grid.dns.points % self.grid.les.points != 0 {
            return Err(NamelistError::InvalidValue {
                key: "grid.dns.points",
                value: self.grid.dns.points.to_string(),
                reason: "must be a multiple of grid.les.points",
            });
        }
        if ClosureKind::from_id(self.physics.subgrid_model).is_err() {
            return Err(NamelistError::InvalidValue {
                key: "physics.subgrid_model",
                value: self.physics.subgrid_model.to_string(),
                reason: "must be one of 0-4",
            });
        }
        if PlanEffort::parse(&self.transform.planning).is_none() {
            return Err(NamelistError::InvalidValue {
                key: "transform.planning",
                value: self.transform.planning.clone(),
                reason: "expected estimate, measure, patient or exhaustive",
            });
        }
        Ok(())
    }

    pub fn to_params(&self, mode: SimMode) -> Result<SimulationParams, NamelistError> {
        self.validate()?;
        let effort = PlanEffort::parse(&self.transform.planning).unwrap_or_default();

        let params = SimulationParams {
            mode,
            domain_length: self.grid.length,
            nx_dns: self.grid.dns.points,
            nx_les: self.grid.les.points,
            viscosity: self.physics.viscosity,
            closure: ClosureKind::from_id(self.physics.subgrid_model)?,
            noise_exponent: self.physics.noise.exponent,
            noise_amplitude: self.physics.noise.amplitude,
            cfl: self.time.cfl,
            max_step: self.time.max_step,
            duration: self.time.duration,
            save_interval: self.output.interval_save,
            print_interval: self.output.interval_print,
            hyperviscosity: self.physics.hyperviscosity.enabled,
            plan: PlanSettings {
                effort,
                threads: self.transform.threads,
            },
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "time":    { "duration": 0.5, "cfl": 0.4, "max_step": 1e-3 },
        "grid":    { "dns": { "points": 256 }, "les": { "points": 64 } },
        "physics": { "noise": { "exponent": 0.75, "amplitude": 1e-6 },
                     "viscosity": 1e-5, "subgrid_model": 4 },
        "output":  { "interval_save": 0.1, "interval_print": 0.05 }
    }"#;

    #[test]
    fn optional_sections_take_defaults() {
        let nl = Namelist::parse(SAMPLE).unwrap();
        assert_eq!(nl.grid.length, 2.0 * PI);
        assert_eq!(nl.logging.level, "info");
        assert_eq!(nl.transform.threads, 1);
        assert_eq!(nl.seed, None);
        assert!(!nl.physics.hyperviscosity.enabled);

        let params = nl.to_params(SimMode::Les).unwrap();
        assert_eq!(params.closure, ClosureKind::Deardorff);
        assert_eq!(params.nx_les, 64);
        assert_eq!(params.plan.effort, PlanEffort::Measure);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut nl = Namelist::parse(SAMPLE).unwrap();
        nl.physics.subgrid_model = 7;
        let err = nl.validate().unwrap_err();
        assert!(err.to_string().contains("physics.subgrid_model"));

        let mut nl = Namelist::parse(SAMPLE).unwrap();
        nl.grid.les.points = 96;
        assert!(matches!(
            nl.validate(),
            Err(NamelistError::InvalidValue { key: "grid.dns.points", .. })
        ));

        let mut nl = Namelist::parse(SAMPLE).unwrap();
        nl.transform.planning = "FFTW_WISDOM_ONLY".into();
        assert!(nl.validate().is_err());

        let mut nl = Namelist::parse(SAMPLE).unwrap();
        nl.time.cfl = -0.1;
        nl.validate().unwrap();
        assert!(matches!(
            nl.to_params(SimMode::Dns),
            Err(NamelistError::Config(BurgersError::InvalidParameter { name: "cfl", .. }))
        ));

        let mut nl = Namelist::parse(SAMPLE).unwrap();
        nl.transform.threads = 0;
        assert!(matches!(
            nl.to_params(SimMode::Les),
            Err(NamelistError::Config(BurgersError::InvalidParameter { name: "threads", .. }))
        ));
    }

    #[test]
    fn legacy_planning_names_are_accepted() {
        let mut nl = Namelist::parse(SAMPLE).unwrap();
        nl.transform.planning = "FFTW_ESTIMATE".into();
        let params = nl.to_params(SimMode::Dns).unwrap();
        assert_eq!(params.plan.effort, PlanEffort::Estimate);
    }

    #[test]
    fn missing_section_is_a_parse_error() {
        let err = Namelist::parse(r#"{ "time": { "duration": 1.0, "cfl": 0.4, "max_step": 1e-3 } }"#).unwrap_err();
        assert!(matches!(err, NamelistError::Parse(_)));
    }

    #[test]
    fn missing_file_names_the_path() {
        let path = std::env::temp_dir().join("burgers-no-such-namelist.json");
        let err = Namelist::load(&path).unwrap_err();
        assert!(err.to_string().contains("burgers-no-such-namelist.json"));
    }
}
