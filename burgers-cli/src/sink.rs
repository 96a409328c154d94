//! JSON-lines output: one document per line.
//!
//! The first line lists the registered fields; every save then writes a
//! snapshot line. Static fields only appear in the initial snapshot.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use burgers_core::{FieldKind, FieldSpec, OutputSink, SinkError, Snapshot};
use serde::Serialize;

pub const DEFAULT_SYNC_INTERVAL: usize = 100;

#[derive(Serialize)]
struct FieldRow<'a> {
    name: &'a str,
    kind: &'static str,
    len: usize,
    long_name: &'a str,
    units: &'a str,
}

#[derive(Serialize)]
struct HeaderRow<'a> {
    kind: &'static str,
    fields: Vec<FieldRow<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Value<'a> {
    Scalar(f64),
    Profile(&'a [f64]),
}

#[derive(Serialize)]
struct SnapshotRow<'a> {
    kind: &'static str,
    index: usize,
    time: f64,
    initial: bool,
    fields: BTreeMap<&'a str, Value<'a>>,
}

pub struct JsonLinesSink<W: Write> {
    writer: W,
    fields: Vec<FieldSpec>,
    sync_interval: usize,
    pending: usize,
    closed: bool,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(JsonLinesSink::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink {
            writer,
            fields: Vec::new(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            pending: 0,
            closed: false,
        }
    }

    /// Flush after this many saves (at least 1).
    pub fn with_sync_interval(mut self, saves: usize) -> Self {
        self.sync_interval = saves.max(1);
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_row<T: Serialize>(&mut self, row: &T) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> OutputSink for JsonLinesSink<W> {
    fn register(&mut self, fields: &[FieldSpec]) -> Result<(), SinkError> {
        self.fields = fields.to_vec();
        let header = HeaderRow {
            kind: "fields",
            fields: fields
                .iter()
                .map(|f| FieldRow {
                    name: f.name,
                    kind: match f.kind {
                        FieldKind::Static => "static",
                        FieldKind::TimeSeries => "time",
                    },
                    len: f.len,
                    long_name: f.long_name,
                    units: f.units,
                })
                .collect(),
        };
        self.write_row(&header)
    }

    fn save(&mut self, snapshot: &Snapshot, index: usize, time: f64, initial: bool) -> Result<(), SinkError> {
        if self.closed {
            return Err("output already closed".into());
        }

        let mut fields = BTreeMap::new();
        for spec in &self.fields {
            if spec.kind == FieldKind::Static && !initial {
                continue;
            }
            let Some(values) = snapshot.get(spec.name) else {
                return Err(format!("snapshot is missing field `{}`", spec.name).into());
            };
            let value = if spec.len == 1 && values.len() == 1 {
                Value::Scalar(values[0])
            } else {
                Value::Profile(values)
            };
            fields.insert(spec.name, value);
        }

        let row = SnapshotRow {
            kind: "snapshot",
            index,
            time,
            initial,
            fields,
        };
        self.write_row(&row)?;

        self.pending += 1;
        if self.pending >= self.sync_interval {
            self.writer.flush()?;
            self.pending = 0;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as Json;

    fn specs() -> Vec<FieldSpec> {
        vec![
            FieldSpec::fixed("x", 2, "distance", "m"),
            FieldSpec::profile("u", 2, "velocity", "m s-1"),
            FieldSpec::scalar("tke", "turbulence kinetic energy", "m2 s-2"),
        ]
    }

    fn snapshot(u: f64) -> Snapshot {
        let mut s = Snapshot::new();
        s.set("x", &[0.0, 3.0]);
        s.set("u", &[u, -u]);
        s.set_scalar("tke", u * u);
        s
    }

    fn lines(bytes: &[u8]) -> Vec<Json> {
        std::str::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn writes_header_then_snapshots() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.register(&specs()).unwrap();
        sink.save(&snapshot(1.0), 0, 0.0, true).unwrap();
        sink.save(&snapshot(2.0), 1, 0.5, false).unwrap();
        sink.close().unwrap();

        let rows = lines(sink.get_ref());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["kind"], "fields");
        assert_eq!(rows[0]["fields"][0]["kind"], "static");

        assert_eq!(rows[1]["initial"], true);
        assert_eq!(rows[1]["fields"]["x"], serde_json::json!([0.0, 3.0]));
        assert_eq!(rows[1]["fields"]["tke"], 1.0);

        assert_eq!(rows[2]["index"], 1);
        assert_eq!(rows[2]["time"], 0.5);
        assert!(rows[2]["fields"].get("x").is_none());
        assert_eq!(rows[2]["fields"]["u"], serde_json::json!([2.0, -2.0]));
    }

    #[test]
    fn missing_field_is_reported() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.register(&specs()).unwrap();
        let err = sink.save(&Snapshot::new(), 0, 0.0, true).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }

    struct CountingWriter {
        data: Vec<u8>,
        flushes: usize,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn flushes_on_interval_and_close() {
        let writer = CountingWriter { data: Vec::new(), flushes: 0 };
        let mut sink = JsonLinesSink::new(writer).with_sync_interval(2);
        sink.register(&specs()).unwrap();
        for i in 0..5 {
            sink.save(&snapshot(i as f64), i, i as f64, i == 0).unwrap();
        }
        assert_eq!(sink.get_ref().flushes, 2);
        sink.close().unwrap();
        assert_eq!(sink.get_ref().flushes, 3);
        assert!(sink.save(&snapshot(0.0), 9, 9.0, false).is_err());
        assert!(!sink.into_inner().data.is_empty());
    }
}
