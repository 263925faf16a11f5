//! Per-length transmission timing inside a single TSCH slot.
//!
//! A node prints a result line when a transmission ends and, right after it,
//! a fixed train of timing lines:
//!
//! ```text
//! {asn ...} reg t_r 64 1 0
//! {asn ...} reg t_c 1203 1840
//! {asn ...} reg t_1 10 20 30 40
//! ...
//! ```
//!
//! The result line selects a frame length row; the lines that follow fill
//! its columns. Rows cover lengths up to [`MAX_FRAME_LEN`] and unrecorded
//! cells print as `0`.

use std::collections::VecDeque;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::debug;

use super::asn_event_contents;
use crate::analysis::error::ParseError;
use crate::utils::lines::open_log;

pub const MAX_FRAME_LEN: usize = 125;

/// Largest packet train the timing layouts cover
pub const MAX_TIMING_PACKETS: usize = 6;

/// Which slot operation is timed
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TimingMode {
    /// Single-frame slots (`reg t_r`); the first sample of each length is a warm-up
    Regular,
    /// Packet trains of the EP scheduler (`ep t_r`)
    Ep,
    /// Single-frame timing followed by the UPA train it triggered
    Upa,
}

impl TimingMode {
    pub fn min_len(&self) -> usize {
        match self {
            TimingMode::Regular => 40,
            TimingMode::Ep => 46,
            TimingMode::Upa => 59,
        }
    }

    /// Number of timing columns for a train of `packets` frames.
    pub fn columns(&self, packets: usize) -> usize {
        match self {
            TimingMode::Regular => 18,
            TimingMode::Ep => 4 * packets + 9,
            TimingMode::Upa => 4 * packets + 38,
        }
    }
}

/// One line of a timing train
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// Copy `(column, token)` cells when the line starts with `tag`.
    Fill {
        tag: &'static [&'static str],
        cells: Vec<(usize, usize)>,
    },
    /// Keep recording only when the line reports a complete, uniform train.
    Train { len: usize, packets: usize },
}

impl Step {
    fn fill(tag: &'static [&'static str], cells: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Step::Fill {
            tag,
            cells: cells.into_iter().collect(),
        }
    }

    /// Four columns from `first_column` filled by tokens 2 to 5
    fn quad(tag: &'static [&'static str], first_column: usize) -> Self {
        Self::fill(tag, (0..4).map(|k| (first_column + k, 2 + k)))
    }
}

fn layout(mode: TimingMode, len: usize, packets: usize) -> VecDeque<Step> {
    let mut steps = VecDeque::new();
    match mode {
        TimingMode::Regular => {
            steps.push_back(Step::fill(&[], [(0, 2), (1, 3)]));
            steps.extend((0..4).map(|k| Step::quad(&[], 2 + 4 * k)));
        }
        TimingMode::Ep => {
            steps.push_back(Step::fill(&[], [(0, 2), (1, 3)]));
            steps.extend((0..=packets).map(|k| Step::quad(&[], 2 + 4 * k)));
            let tail = 4 * packets + 6;
            steps.push_back(Step::fill(&[], (0..3).map(|k| (tail + k, 2 + k))));
        }
        TimingMode::Upa => {
            steps.push_back(Step::fill(&["reg", "t_c"], [(0, 2), (1, 3)]));
            steps.push_back(Step::quad(&["reg", "t_1"], 2));
            steps.push_back(Step::fill(&["reg", "t_2"], [(6, 2), (13, 3), (14, 4), (15, 5)]));
            steps.push_back(Step::quad(&["reg", "t_3"], 16));
            steps.push_back(Step::quad(&["reg", "t_4"], 20));
            steps.push_back(Step::fill(&["t_c"], (0..6).map(|k| (7 + k, 1 + k))));
            steps.push_back(Step::Train { len, packets });
            steps.push_back(Step::fill(&["upa", "t_h"], [(24, 2), (25, 3), (26, 3)]));
            steps.push_back(Step::fill(&["upa", "t_b"], [(27, 2), (28, 3)]));
            steps.extend((0..packets).map(|k| Step::quad(&["upa"], 29 + 4 * k)));
            let tail = 4 * packets + 29;
            steps.push_back(Step::quad(&["upa", "t_a"], tail));
            steps.push_back(Step::fill(&["upa", "t_e"], (0..3).map(|k| (tail + 4 + k, 2 + k))));
            steps.push_back(Step::fill(&["asap", "c_e"], [(tail + 7, 2), (tail + 8, 3)]));
        }
    }
    steps
}

fn token<'a>(contents: &[&'a str], index: usize, key: &str) -> Result<&'a str, ParseError> {
    contents
        .get(index)
        .copied()
        .ok_or_else(|| ParseError::MissingCompanion {
            key: key.to_string(),
            companion: format!("token {}", index),
        })
}

pub(crate) fn int_token(contents: &[&str], index: usize, key: &str) -> Result<i64, ParseError> {
    let raw = token(contents, index, key)?;
    raw.parse().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// Frame length row of a trigger line, `None` when out of range.
pub(crate) fn len_row(contents: &[&str], min_len: usize, key: &str) -> Result<Option<usize>, ParseError> {
    let len = int_token(contents, 2, key)?;
    Ok(usize::try_from(len)
        .ok()
        .filter(|len| (min_len..=MAX_FRAME_LEN).contains(len)))
}

/// Train currently being read after a trigger line
#[derive(Debug)]
struct Recording {
    row: usize,
    steps: VecDeque<Step>,
    cells: Vec<String>,
}

/// Timing cells per frame length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingTable {
    pub min_len: usize,
    pub columns: usize,
    /// One entry per length from `min_len` to [`MAX_FRAME_LEN`]
    pub rows: Vec<Option<Vec<String>>>,
}

impl TimingTable {
    fn new(min_len: usize, columns: usize) -> Self {
        Self {
            min_len,
            columns,
            rows: vec![None; MAX_FRAME_LEN - min_len + 1],
        }
    }

    pub fn row(&self, len: usize) -> Option<&[String]> {
        let index = len.checked_sub(self.min_len)?;
        self.rows.get(index)?.as_deref()
    }

    /// Printed rows: the length followed by every column joined by `separator`.
    pub fn lines(&self, separator: &str) -> Vec<String> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let mut cells = vec![(index + self.min_len).to_string()];
                match row {
                    Some(values) => cells.extend(values.iter().cloned()),
                    None => cells.extend(std::iter::repeat("0".to_string()).take(self.columns)),
                }
                cells.join(separator)
            })
            .collect()
    }
}

/// Line-by-line assembler of a [`TimingTable`].
#[derive(Debug)]
pub struct TimingScan {
    mode: TimingMode,
    packets: usize,
    table: TimingTable,
    /// Regular mode: lengths whose warm-up sample was seen.
    /// UPA mode: lengths whose train was claimed.
    seen: Vec<bool>,
    recording: Option<Recording>,
}

impl TimingScan {
    /// `packets` is the train length to record; regular mode ignores it.
    pub fn new(mode: TimingMode, packets: usize) -> Self {
        let table = TimingTable::new(mode.min_len(), mode.columns(packets));
        let seen = vec![false; table.rows.len()];
        Self {
            mode,
            packets,
            table,
            seen,
            recording: None,
        }
    }

    pub fn apply_line(&mut self, line: &str) -> Result<(), ParseError> {
        match self.recording.take() {
            Some(recording) => self.continue_recording(recording, line),
            None => {
                self.recording = self.trigger(line)?;
                Ok(())
            }
        }
    }

    pub fn finish(self) -> TimingTable {
        if let Some(recording) = &self.recording {
            debug!(
                "Log ended inside the timing train of length {}",
                recording.row + self.table.min_len
            );
        }
        self.table
    }

    fn trigger(&mut self, line: &str) -> Result<Option<Recording>, ParseError> {
        let Some(contents) = asn_event_contents(line) else {
            return Ok(None);
        };
        let tag = match self.mode {
            TimingMode::Regular | TimingMode::Upa => "reg",
            TimingMode::Ep => "ep",
        };
        if contents.first() != Some(&tag) || contents.get(1) != Some(&"t_r") {
            return Ok(None);
        }
        let Some(len) = len_row(&contents, self.table.min_len, "t_r")? else {
            return Ok(None);
        };
        let row = len - self.table.min_len;

        let start = match self.mode {
            TimingMode::Regular => {
                let acked = int_token(&contents, 3, "t_r")? == 1 && int_token(&contents, 4, "t_r")? == 0;
                if acked && !self.seen[row] {
                    self.seen[row] = true;
                    false
                } else {
                    acked && self.table.rows[row].is_none()
                }
            }
            TimingMode::Ep => {
                self.is_full_train(&contents)? && self.table.rows[row].is_none()
            }
            TimingMode::Upa => {
                int_token(&contents, 3, "t_r")? == 1 && int_token(&contents, 4, "t_r")? == 0
            }
        };
        if !start {
            return Ok(None);
        }
        Ok(Some(Recording {
            row,
            steps: layout(self.mode, len, self.packets),
            cells: vec!["0".to_string(); self.table.columns],
        }))
    }

    /// Uniform lengths with every frame acknowledged, of the recorded train size.
    fn is_full_train(&self, contents: &[&str]) -> Result<bool, ParseError> {
        let same_len = int_token(contents, 3, "t_r")?;
        let tx_count = int_token(contents, 4, "t_r")?;
        let tx_ok = int_token(contents, 5, "t_r")?;
        Ok(same_len == 1 && tx_count == tx_ok && usize::try_from(tx_ok).ok() == Some(self.packets))
    }

    fn continue_recording(&mut self, mut recording: Recording, line: &str) -> Result<(), ParseError> {
        let Some(step) = recording.steps.pop_front() else {
            return Ok(());
        };
        let contents = asn_event_contents(line);
        match step {
            Step::Fill { tag, cells } => {
                if let Some(contents) = contents.filter(|c| c.starts_with(tag)) {
                    for (column, index) in cells {
                        recording.cells[column] = token(&contents, index, "timing")?.to_string();
                    }
                }
            }
            Step::Train { len, packets } => {
                let Some(contents) = contents else {
                    return Ok(());
                };
                if !contents.starts_with(&["upa", "t_r"])
                    || int_token(&contents, 2, "t_r")? != len as i64
                    || !self.is_full_train(&contents)?
                    || self.seen[recording.row]
                {
                    return Ok(());
                }
                debug!("Recording {}-frame train of length {}", packets, len);
                self.seen[recording.row] = true;
            }
        }

        if recording.steps.is_empty() {
            self.table.rows[recording.row] = Some(recording.cells);
        } else {
            self.recording = Some(recording);
        }
        Ok(())
    }
}

/// Scan one node log into a timing table.
pub fn slot_timing(path: &Path, mode: TimingMode, packets: usize) -> Result<TimingTable> {
    let mut scan = TimingScan::new(mode, packets);
    for item in open_log(path)? {
        let (line_number, text) =
            item.with_context(|| format!("Failed to read log file: {}", path.display()))?;
        scan.apply_line(&text)
            .with_context(|| format!("{}:{}", path.display(), line_number))?;
    }
    let table = scan.finish();
    debug!(
        "{} of {} lengths timed in {}",
        table.rows.iter().filter(|r| r.is_some()).count(),
        table.rows.len(),
        path.display()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(contents: &str) -> String {
        format!("[INFO: TSCH] {{asn 00.1}} {}", contents)
    }

    fn feed(scan: &mut TimingScan, lines: &[&str]) {
        for line in lines {
            scan.apply_line(&event(line)).unwrap();
        }
    }

    const REGULAR_TRAIN: [&str; 5] = [
        "reg t_c 11 12",
        "reg t_1 1 2 3 4",
        "reg t_2 5 6 7 8",
        "reg t_3 9 10 11 12",
        "reg t_4 13 14 15 16",
    ];

    #[test]
    fn test_regular_skips_warm_up_sample() {
        let mut scan = TimingScan::new(TimingMode::Regular, 1);
        feed(&mut scan, &["reg t_r 64 1 0", "reg t_c 99 99"]);
        feed(&mut scan, &["reg t_r 64 1 0"]);
        feed(&mut scan, &REGULAR_TRAIN);
        feed(&mut scan, &["reg t_r 64 1 0", "reg t_c 77 77"]);
        let table = scan.finish();

        let row = table.row(64).unwrap();
        assert_eq!(row.len(), 18);
        assert_eq!(row[..3], ["11", "12", "1"]);
        assert_eq!(row[17], "16");
        assert!(table.row(65).is_none());
    }

    #[test]
    fn test_regular_ignores_unacked_and_short_frames() {
        let mut scan = TimingScan::new(TimingMode::Regular, 1);
        feed(&mut scan, &["reg t_r 64 1 1", "reg t_r 64 0 0", "reg t_r 30 1 0", "reg t_r 30 1 0"]);
        feed(&mut scan, &REGULAR_TRAIN);
        assert!(scan.finish().rows.iter().all(Option::is_none));
    }

    #[test]
    fn test_ep_train_fills_per_packet_columns() {
        let mut scan = TimingScan::new(TimingMode::Ep, 2);
        feed(
            &mut scan,
            &[
                "ep t_r 50 1 2 2",
                "ep t_c 1 2",
                "ep t_p 3 4 5 6",
                "ep t_p 7 8 9 10",
                "ep t_a 11 12 13 14",
                "ep t_e 15 16 17",
                "ep t_r 50 1 2 2",
                "ep t_c 90 90",
            ],
        );
        let table = scan.finish();
        assert_eq!(table.columns, 17);

        let row = table.row(50).unwrap();
        let expected: Vec<String> = (1..=17).map(|v| v.to_string()).collect();
        assert_eq!(row, expected.as_slice());
    }

    #[test]
    fn test_ep_wrong_train_size_not_recorded() {
        let mut scan = TimingScan::new(TimingMode::Ep, 2);
        feed(&mut scan, &["ep t_r 50 1 3 3", "ep t_r 50 0 2 2", "ep t_r 50 1 2 1"]);
        assert!(scan.finish().row(50).is_none());
    }

    #[test]
    fn test_non_event_lookahead_line_consumes_a_step() {
        let mut scan = TimingScan::new(TimingMode::Ep, 1);
        feed(&mut scan, &["ep t_r 46 1 1 1"]);
        scan.apply_line("[INFO: TSCH] scheduling").unwrap();
        feed(&mut scan, &["ep t_p 3 4 5 6", "ep t_a 7 8 9 10", "ep t_e 11 12 13"]);
        let row = scan.finish().row(46).unwrap().to_vec();
        assert_eq!(row[..6], ["0", "0", "3", "4", "5", "6"]);
        assert_eq!(row[12], "13");
    }

    #[test]
    fn test_upa_breakdown_gated_by_train_result() {
        let mut scan = TimingScan::new(TimingMode::Upa, 1);
        let reg = [
            "reg t_r 60 1 0",
            "reg t_c 1 2",
            "reg t_1 3 4 5 6",
            "reg t_2 7 14 15 16",
            "reg t_3 17 18 19 20",
            "reg t_4 21 22 23 24",
            "t_c 8 9 10 11 12 13",
        ];
        feed(&mut scan, &reg);
        feed(&mut scan, &["upa t_r 60 1 2 2"]);
        assert!(scan.table.row(60).is_none());

        feed(&mut scan, &reg);
        feed(
            &mut scan,
            &[
                "upa t_r 60 1 1 1",
                "upa t_h 25 26",
                "upa t_b 28 29",
                "upa t_p 30 31 32 33",
                "upa t_a 34 35 36 37",
                "upa t_e 38 39 40",
                "asap c_e 41 42",
            ],
        );
        let table = scan.finish();
        let row = table.row(60).unwrap();
        assert_eq!(row.len(), 42);
        assert_eq!(row[..3], ["1", "2", "3"]);
        assert_eq!(row[6..9], ["7", "8", "9"]);
        assert_eq!(row[13], "14");
        assert_eq!(row[24..27], ["25", "26", "26"]);
        assert_eq!(row[41], "42");
    }

    #[test]
    fn test_missing_timing_token_is_error() {
        let mut scan = TimingScan::new(TimingMode::Ep, 1);
        feed(&mut scan, &["ep t_r 46 1 1 1"]);
        assert!(scan.apply_line(&event("ep t_c 1")).is_err());
    }

    #[test]
    fn test_lines_pad_unrecorded_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log-1-3.txt");
        let mut content = String::new();
        for line in ["reg t_r 125 1 0", "reg t_r 125 1 0"].iter().chain(REGULAR_TRAIN.iter()) {
            content.push_str(&event(line));
            content.push('\n');
        }
        std::fs::write(&path, content).unwrap();

        let table = slot_timing(&path, TimingMode::Regular, 1).unwrap();
        let lines = table.lines(" \t");
        assert_eq!(lines.len(), 86);
        assert!(lines[0].starts_with("40 \t0 \t0 \t"));
        assert!(lines[85].starts_with("125 \t11 \t12 \t1 \t"));
        assert!(lines[85].ends_with(" \t16"));
    }
}
