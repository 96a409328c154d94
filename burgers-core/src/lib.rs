pub mod closure;
pub mod error;
pub mod grid;
pub mod integrator;
pub mod mode;
pub mod noise;
pub mod output;
pub mod params;
pub mod plan_cache;
pub mod spectral;
pub mod transform;

pub use closure::{Closure, ClosureKind};
pub use error::{BurgersError, Result};
pub use grid::Grid;
pub use integrator::{RunSummary, Simulation, StepOutcome};
pub use mode::{DnsMode, LesMode, Mode};
pub use output::{FieldKind, FieldSpec, MemorySink, OutputSink, SinkError, Snapshot};
pub use params::{SimMode, SimulationParams};
pub use plan_cache::{CacheLookup, MemoryPlanCache, NoPlanCache, PlanCache, PlanKey, PlanSet};
pub use spectral::{DerivativeOrder, DerivativeSet, SpectralWorkspace};
pub use transform::{PlanEffort, PlanSettings};
