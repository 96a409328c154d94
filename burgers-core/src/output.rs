//! Where diagnostics go.
//!
//! The integrator hands each output-time [`Snapshot`] to an [`OutputSink`].
//! Sinks own their failures: the integrator logs an error and keeps going.

use std::collections::BTreeMap;
use std::error::Error;

pub type SinkError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Written once, with the initial snapshot.
    Static,
    TimeSeries,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// 1 for scalars, `nx` for profiles.
    pub len: usize,
    pub long_name: &'static str,
    pub units: &'static str,
}

impl FieldSpec {
    pub const fn profile(name: &'static str, len: usize, long_name: &'static str, units: &'static str) -> FieldSpec {
        FieldSpec {
            name,
            kind: FieldKind::TimeSeries,
            len,
            long_name,
            units,
        }
    }

    pub const fn scalar(name: &'static str, long_name: &'static str, units: &'static str) -> FieldSpec {
        FieldSpec {
            name,
            kind: FieldKind::TimeSeries,
            len: 1,
            long_name,
            units,
        }
    }

    pub const fn fixed(name: &'static str, len: usize, long_name: &'static str, units: &'static str) -> FieldSpec {
        FieldSpec {
            name,
            kind: FieldKind::Static,
            len,
            long_name,
            units,
        }
    }
}

/// Named field values at one output time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    fields: BTreeMap<&'static str, Vec<f64>>,
}

impl Snapshot {
    pub fn new() -> Snapshot {
        Snapshot::default()
    }

    /// Overwrites `name`, reusing its storage.
    pub fn set(&mut self, name: &'static str, values: &[f64]) {
        let slot = self.fields.entry(name).or_default();
        slot.clear();
        slot.extend_from_slice(values);
    }

    pub fn set_scalar(&mut self, name: &'static str, value: f64) {
        self.set(name, &[value]);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.first().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[f64])> + '_ {
        self.fields.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub trait OutputSink {
    /// Declares every field before the first save.
    fn register(&mut self, fields: &[FieldSpec]) -> Result<(), SinkError>;

    /// `index` counts output times, 0 being the initial state.
    fn save(&mut self, snapshot: &Snapshot, index: usize, time: f64, initial: bool) -> Result<(), SinkError>;

    fn close(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedSnapshot {
    pub index: usize,
    pub time: f64,
    pub initial: bool,
    pub snapshot: Snapshot,
}

/// Keeps every save in memory. Handy for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub fields: Vec<FieldSpec>,
    pub saves: Vec<SavedSnapshot>,
    pub closed: bool,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn times(&self) -> Vec<f64> {
        self.saves.iter().map(|s| s.time).collect()
    }
}

impl OutputSink for MemorySink {
    fn register(&mut self, fields: &[FieldSpec]) -> Result<(), SinkError> {
        self.fields = fields.to_vec();
        Ok(())
    }

    fn save(&mut self, snapshot: &Snapshot, index: usize, time: f64, initial: bool) -> Result<(), SinkError> {
        if self.closed {
            return Err("save after close".into());
        }
        self.saves.push(SavedSnapshot {
            index,
            time,
            initial,
            snapshot: snapshot.clone(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_overwrites_in_place() {
        let mut s = Snapshot::new();
        s.set("u", &[1.0, 2.0, 3.0]);
        s.set("u", &[4.0]);
        s.set_scalar("tke", 0.5);
        assert_eq!(s.get("u"), Some(&[4.0][..]));
        assert_eq!(s.scalar("tke"), Some(0.5));
        assert_eq!(s.get("missing"), None);
        let names: Vec<_> = s.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["tke", "u"]);
    }

    #[test]
    fn memory_sink_refuses_saves_after_close() {
        let mut sink = MemorySink::new();
        sink.register(&[FieldSpec::scalar("tke", "energy", "m2 s-2")]).unwrap();
        sink.save(&Snapshot::new(), 0, 0.0, true).unwrap();
        sink.close().unwrap();
        assert!(sink.save(&Snapshot::new(), 1, 0.1, false).is_err());
        assert_eq!(sink.times(), vec![0.0]);
    }
}
