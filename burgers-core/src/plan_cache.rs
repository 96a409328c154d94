//! Reuse of transform planning across runs.
//!
//! A cache entry is valid only for the exact configuration that produced
//! it. Every outcome, including a failed save, leaves the run unaffected.

use std::fmt;

use crate::params::SimulationParams;
use crate::transform::PlanEffort;

/// Configuration a set of plans was made for.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanKey {
    pub nx_dns: usize,
    pub nx_les: usize,
    pub noise_exponent: f64,
    pub effort: PlanEffort,
    pub threads: usize,
}

impl PlanKey {
    pub fn from_params(params: &SimulationParams) -> PlanKey {
        PlanKey {
            nx_dns: params.nx_dns,
            nx_les: params.nx_les,
            noise_exponent: params.noise_exponent,
            effort: params.plan.effort,
            threads: params.plan.threads,
        }
    }

    /// Human-readable list of the keys that differ from `other`, or `None`
    /// when everything matches.
    pub fn mismatch(&self, other: &PlanKey) -> Option<String> {
        let mut changed = Vec::new();
        if self.nx_dns != other.nx_dns {
            changed.push(format!("nx_dns {} -> {}", other.nx_dns, self.nx_dns));
        }
        if self.nx_les != other.nx_les {
            changed.push(format!("nx_les {} -> {}", other.nx_les, self.nx_les));
        }
        if self.noise_exponent != other.noise_exponent {
            changed.push(format!(
                "noise_exponent {} -> {}",
                other.noise_exponent, self.noise_exponent
            ));
        }
        if self.effort != other.effort {
            changed.push(format!(
                "planning {} -> {}",
                other.effort.as_str(),
                self.effort.as_str()
            ));
        }
        if self.threads != other.threads {
            changed.push(format!("threads {} -> {}", other.threads, self.threads));
        }
        if changed.is_empty() {
            None
        } else {
            Some(format!("configuration changed: {}", changed.join(", ")))
        }
    }
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nx_dns={} nx_les={} noise_exponent={} planning={} threads={}",
            self.nx_dns,
            self.nx_les,
            self.noise_exponent,
            self.effort.as_str(),
            self.threads
        )
    }
}

/// Transform lengths that were planned under a [`PlanKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSet {
    pub lengths: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(PlanSet),
    Miss(String),
}

pub trait PlanCache {
    fn try_load(&mut self, key: &PlanKey) -> CacheLookup;

    /// Returns whether the plans were stored.
    fn save(&mut self, key: &PlanKey, plans: &PlanSet) -> bool;
}

/// Never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlanCache;

impl PlanCache for NoPlanCache {
    fn try_load(&mut self, _key: &PlanKey) -> CacheLookup {
        CacheLookup::Miss("plan cache disabled".to_string())
    }

    fn save(&mut self, _key: &PlanKey, _plans: &PlanSet) -> bool {
        false
    }
}

/// Single-entry in-process cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlanCache {
    entry: Option<(PlanKey, PlanSet)>,
}

impl MemoryPlanCache {
    pub fn new() -> MemoryPlanCache {
        MemoryPlanCache::default()
    }
}

impl PlanCache for MemoryPlanCache {
    fn try_load(&mut self, key: &PlanKey) -> CacheLookup {
        match &self.entry {
            None => CacheLookup::Miss("no cached plans".to_string()),
            Some((stored, plans)) => match key.mismatch(stored) {
                None => CacheLookup::Hit(plans.clone()),
                Some(reason) => CacheLookup::Miss(reason),
            },
        }
    }

    fn save(&mut self, key: &PlanKey, plans: &PlanSet) -> bool {
        self.entry = Some((key.clone(), plans.clone()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_lists_every_changed_key() {
        let a = PlanKey::from_params(&SimulationParams::default());
        let mut b = a.clone();
        assert_eq!(a.mismatch(&b), None);

        b.nx_dns = 128;
        b.threads = 4;
        let reason = a.mismatch(&b).unwrap();
        assert!(reason.contains("nx_dns 128 -> 64"));
        assert!(reason.contains("threads 4 -> 1"));
        assert!(!reason.contains("planning"));
    }

    #[test]
    fn memory_cache_hits_only_on_equal_keys() {
        let key = PlanKey::from_params(&SimulationParams::default());
        let mut cache = MemoryPlanCache::new();
        assert!(matches!(cache.try_load(&key), CacheLookup::Miss(_)));

        let plans = PlanSet { lengths: vec![32, 64, 96, 128] };
        assert!(cache.save(&key, &plans));
        assert_eq!(cache.try_load(&key), CacheLookup::Hit(plans));

        let other = PlanKey { effort: PlanEffort::Patient, ..key };
        assert!(matches!(cache.try_load(&other), CacheLookup::Miss(r) if r.contains("planning")));
    }

    #[test]
    fn disabled_cache_always_misses() {
        let key = PlanKey::from_params(&SimulationParams::default());
        let mut cache = NoPlanCache;
        assert!(!cache.save(&key, &PlanSet::default()));
        assert!(matches!(cache.try_load(&key), CacheLookup::Miss(_)));
    }
}
