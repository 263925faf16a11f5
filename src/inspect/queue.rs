//! Unicast queue status traces.
//!
//! `QU` events look like
//!
//! ```text
//! {asn 00.00001a2b ...} QU as 3 1 x 1a2b x 4 2 1 0
//! ```
//!
//! with the operation at token 1, the unicast flag at token 3, the hex ASN at
//! token 5 and four queue lengths at tokens 7 to 10.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use log::{debug, info};

use super::asn_event_contents;
use crate::analysis::error::ParseError;
use crate::analysis::types::Asn;
use crate::utils::lines::open_log;

/// Default slotframe length of the unicast schedule
pub const DEFAULT_SLOTFRAME_LEN: i64 = 17;

const TABLE_HEADER: &str = "asn\tsuc\tglb\tuc\tbc\teb";

/// Queue operation of a `QU` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOp {
    /// Added to a shared queue
    AddShared,
    /// Added on the first fallback path
    AddFirstFallback,
    /// Added on the second fallback path
    AddSecondFallback,
    Free,
}

impl QueueOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "as" => Some(QueueOp::AddShared),
            "af1" => Some(QueueOp::AddFirstFallback),
            "af2" => Some(QueueOp::AddSecondFallback),
            "f" => Some(QueueOp::Free),
            _ => None,
        }
    }

    /// Label written in the `suc` column
    pub fn label(&self) -> &'static str {
        match self {
            QueueOp::AddShared => "s",
            QueueOp::AddFirstFallback => "f1",
            QueueOp::AddSecondFallback => "f2",
            QueueOp::Free => "f",
        }
    }

    pub fn is_add(&self) -> bool {
        !matches!(self, QueueOp::Free)
    }
}

/// One unicast queue event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEvent {
    pub asn: Asn,
    pub op: QueueOp,
    /// Global, unicast, broadcast and beacon queue lengths as printed
    pub lengths: [String; 4],
}

impl QueueEvent {
    /// Parse a unicast `QU` event; other lines yield `None`.
    pub fn from_line(line: &str) -> Result<Option<Self>, ParseError> {
        let Some(contents) = asn_event_contents(line) else {
            return Ok(None);
        };
        if contents.first() != Some(&"QU") || contents.get(3) != Some(&"1") {
            return Ok(None);
        }
        let Some(op) = contents.get(1).and_then(|t| QueueOp::from_token(t)) else {
            return Ok(None);
        };
        let token = |index: usize| {
            contents.get(index).copied().ok_or_else(|| ParseError::MissingCompanion {
                key: "QU".to_string(),
                companion: format!("token {}", index),
            })
        };

        let raw_asn = token(5)?;
        let asn = Asn::from_str_radix(raw_asn, 16).map_err(|_| ParseError::InvalidValue {
            key: "asn".to_string(),
            value: raw_asn.to_string(),
        })?;
        let lengths = [
            token(7)?.to_string(),
            token(8)?.to_string(),
            token(9)?.to_string(),
            token(10)?.to_string(),
        ];
        Ok(Some(Self { asn, op, lengths }))
    }

    fn row(&self) -> String {
        format!("{}\t{}\t{}", self.asn, self.op.label(), self.lengths.join("\t"))
    }
}

/// Read every unicast queue event of a log, in log order.
pub fn queue_events(path: &Path) -> Result<Vec<QueueEvent>> {
    let mut events = Vec::new();
    for item in open_log(path)? {
        let (line_number, text) =
            item.with_context(|| format!("Failed to read log file: {}", path.display()))?;
        if let Some(event) = QueueEvent::from_line(&text)
            .with_context(|| format!("{}:{}", path.display(), line_number))?
        {
            events.push(event);
        }
    }
    debug!("{} queue events in {}", events.len(), path.display());
    Ok(events)
}

/// Events per slotframe, with empty slotframes between busy ones filled with 0.
///
/// Slotframes must appear in ascending order; an event from an earlier
/// slotframe than the current one is skipped.
pub fn slotframe_counts(asns: impl IntoIterator<Item = Asn>, slotframe_len: i64) -> Vec<(i64, u64)> {
    let mut counts = Vec::new();
    let mut current: Option<(i64, u64)> = None;
    for asn in asns {
        let frame = asn.div_euclid(slotframe_len);
        match current {
            Some((cur, n)) if cur == frame => current = Some((cur, n + 1)),
            Some((cur, _)) if frame < cur => debug!("Skipping out-of-order slotframe {}", frame),
            Some((cur, n)) => {
                counts.push((cur, n));
                counts.extend((cur + 1..frame).map(|empty| (empty, 0)));
                current = Some((frame, 1));
            }
            None => current = Some((frame, 1)),
        }
    }
    counts.extend(current);
    counts
}

/// Paths of the files written by [`write_queue_reports`]
#[derive(Debug, Clone)]
pub struct QueueReportPaths {
    pub all: PathBuf,
    pub add: PathBuf,
    pub free: PathBuf,
    pub add_summary: PathBuf,
    pub free_summary: PathBuf,
}

impl QueueReportPaths {
    pub fn new(dir: &Path, iteration: &str, id: &str) -> Self {
        let name = |kind: &str| dir.join(format!("queue-{}-{}-{}.txt", kind, iteration, id));
        Self {
            all: name("all"),
            add: name("add"),
            free: name("free"),
            add_summary: name("add-summary"),
            free_summary: name("free-summary"),
        }
    }
}

fn write_table(path: &Path, header: &str, rows: impl IntoIterator<Item = String>) -> Result<()> {
    let mut content = String::from(header);
    content.push('\n');
    for row in rows {
        content.push_str(&row);
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write the event tables and per-slotframe summaries.
pub fn write_queue_reports(events: &[QueueEvent], paths: &QueueReportPaths, slotframe_len: i64) -> Result<()> {
    let adds: Vec<&QueueEvent> = events.iter().filter(|e| e.op.is_add()).collect();
    let frees: Vec<&QueueEvent> = events.iter().filter(|e| !e.op.is_add()).collect();

    write_table(&paths.all, TABLE_HEADER, events.iter().map(QueueEvent::row))?;
    write_table(&paths.add, TABLE_HEADER, adds.iter().map(|e| e.row()))?;
    write_table(&paths.free, TABLE_HEADER, frees.iter().map(|e| e.row()))?;

    let summary_rows = |counts: Vec<(i64, u64)>| {
        counts
            .into_iter()
            .map(|(frame, n)| format!("{}\t{}", frame, n))
            .collect::<Vec<_>>()
    };
    write_table(
        &paths.add_summary,
        "asfn\tadd",
        summary_rows(slotframe_counts(adds.iter().map(|e| e.asn), slotframe_len)),
    )?;
    write_table(
        &paths.free_summary,
        "asfn\tfree",
        summary_rows(slotframe_counts(frees.iter().map(|e| e.asn), slotframe_len)),
    )?;

    info!(
        "Wrote {} additions and {} frees to {}",
        adds.len(),
        frees.len(),
        paths.all.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_events_only() {
        let event = QueueEvent::from_line("[INFO: TSCH] {asn 00.1} QU af1 3 1 x 2a x 4 2 1 0")
            .unwrap()
            .unwrap();
        assert_eq!(event.asn, 42);
        assert_eq!(event.op, QueueOp::AddFirstFallback);
        assert_eq!(event.row(), "42\tf1\t4\t2\t1\t0");

        assert!(QueueEvent::from_line("[INFO: TSCH] {asn 00.1} QU as 3 0 x 2a x 4 2 1 0")
            .unwrap()
            .is_none());
        assert!(QueueEvent::from_line("[INFO: TSCH] {asn 00.1} QU as 3 1 x 2a")
            .is_err());
    }

    #[test]
    fn test_slotframe_counts_fill_gaps_and_flush_last() {
        let counts = slotframe_counts([0, 5, 16, 17, 60, 61], 17);
        assert_eq!(counts, vec![(0, 3), (1, 1), (2, 0), (3, 2)]);
        assert!(slotframe_counts([], 17).is_empty());
    }

    #[test]
    fn test_out_of_order_slotframe_skipped() {
        assert_eq!(slotframe_counts([40, 3, 41], 17), vec![(2, 2)]);
    }

    #[test]
    fn test_reports_written() {
        let dir = tempfile::tempdir().unwrap();
        let paths = QueueReportPaths::new(dir.path(), "1", "3");
        let events = vec![
            QueueEvent {
                asn: 3,
                op: QueueOp::AddShared,
                lengths: ["1".into(), "1".into(), "0".into(), "0".into()],
            },
            QueueEvent {
                asn: 20,
                op: QueueOp::Free,
                lengths: ["0".into(), "0".into(), "0".into(), "0".into()],
            },
        ];
        write_queue_reports(&events, &paths, DEFAULT_SLOTFRAME_LEN).unwrap();

        let all = fs::read_to_string(&paths.all).unwrap();
        assert_eq!(all, "asn\tsuc\tglb\tuc\tbc\teb\n3\ts\t1\t1\t0\t0\n20\tf\t0\t0\t0\t0\n");
        let free_summary = fs::read_to_string(&paths.free_summary).unwrap();
        assert_eq!(free_summary, "asfn\tfree\n1\t1\n");
        assert!(paths.add_summary.ends_with("queue-add-summary-1-3.txt"));
    }
}
