//! Slots spent per packet train, by frame length and train size.
//!
//! Train results look like
//!
//! ```text
//! {asn ...} upa result ucsf tx 64 1 3 3 2 x 2
//! ```
//!
//! with the frame length at token 4, the uniform-length flag at 5, frames
//! sent and acknowledged at 6 and 7, slots used at 8 and slots expected at 10.

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::debug;

use super::asn_event_contents;
use super::slot_timing::{int_token, MAX_FRAME_LEN};
use crate::analysis::error::ParseError;
use crate::utils::lines::open_log;
use crate::utils::rounding::{format_float, round_to};

/// Scheduler whose train results are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EfficiencyMode {
    /// `ep result ucsf tx`; the first train of each size is kept
    Ep,
    /// `upa result ucsf|bcsf tx`; the train using most slots is kept
    Upa,
}

impl EfficiencyMode {
    pub fn min_len(&self) -> usize {
        match self {
            EfficiencyMode::Ep => 46,
            EfficiencyMode::Upa => 59,
        }
    }

    /// Largest train size tracked
    pub fn max_packets(&self) -> usize {
        match self {
            EfficiencyMode::Ep => 14,
            EfficiencyMode::Upa => 16,
        }
    }

    fn accepts(&self, contents: &[&str]) -> bool {
        let frame_set = match self {
            EfficiencyMode::Ep => contents.first() == Some(&"ep") && contents.get(2) == Some(&"ucsf"),
            EfficiencyMode::Upa => {
                contents.first() == Some(&"upa")
                    && matches!(contents.get(2), Some(&"ucsf") | Some(&"bcsf"))
            }
        };
        frame_set && contents.get(1) == Some(&"result") && contents.get(3) == Some(&"tx")
    }
}

/// Slots of one recorded train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainSlots {
    pub slots: i64,
    pub expected: i64,
    /// A later train of the same length and size needed more slots
    pub boundary: bool,
}

/// A complete, uniform train result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainResult {
    pub len: usize,
    pub packets: usize,
    pub slots: i64,
    pub expected: Option<i64>,
}

impl TrainResult {
    /// Parse a train result; other lines and partial trains yield `None`.
    pub fn from_line(line: &str, mode: EfficiencyMode) -> Result<Option<Self>, ParseError> {
        let Some(contents) = asn_event_contents(line) else {
            return Ok(None);
        };
        if !mode.accepts(&contents) {
            return Ok(None);
        }
        let len = int_token(&contents, 4, "result")?;
        let same_len = int_token(&contents, 5, "result")?;
        let tx_count = int_token(&contents, 6, "result")?;
        let tx_ok = int_token(&contents, 7, "result")?;
        if same_len != 1 || tx_count != tx_ok {
            return Ok(None);
        }
        let slots = int_token(&contents, 8, "result")?;
        let expected = match mode {
            EfficiencyMode::Ep => None,
            EfficiencyMode::Upa => Some(int_token(&contents, 10, "result")?),
        };
        let (Ok(len), Ok(packets)) = (usize::try_from(len), usize::try_from(tx_count)) else {
            return Ok(None);
        };
        Ok(Some(Self {
            len,
            packets,
            slots,
            expected,
        }))
    }
}

/// Recorded trains indexed by frame length, then train size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EfficiencyTable {
    pub mode: EfficiencyMode,
    pub rows: Vec<Vec<Option<TrainSlots>>>,
}

impl EfficiencyTable {
    pub fn new(mode: EfficiencyMode) -> Self {
        Self {
            mode,
            rows: vec![vec![None; mode.max_packets()]; MAX_FRAME_LEN - mode.min_len() + 1],
        }
    }

    pub fn get(&self, len: usize, packets: usize) -> Option<TrainSlots> {
        let row = self.rows.get(len.checked_sub(self.mode.min_len())?)?;
        *row.get(packets.checked_sub(1)?)?
    }

    pub fn record(&mut self, result: &TrainResult) {
        let min_len = self.mode.min_len();
        if !(min_len..=MAX_FRAME_LEN).contains(&result.len)
            || !(1..=self.mode.max_packets()).contains(&result.packets)
        {
            debug!("Train of {} frames of length {} out of range", result.packets, result.len);
            return;
        }
        let keep_largest = self.mode == EfficiencyMode::Upa;
        let fresh = TrainSlots {
            slots: result.slots,
            expected: result.expected.unwrap_or_default(),
            boundary: false,
        };
        let cell = &mut self.rows[result.len - min_len][result.packets - 1];
        match cell.as_mut() {
            None => *cell = Some(fresh),
            Some(kept) if keep_largest && kept.slots < fresh.slots => {
                *kept = TrainSlots {
                    boundary: true,
                    ..fresh
                }
            }
            Some(_) => {}
        }
    }

    fn section(&self, separator: &str, cell: impl Fn(usize, Option<TrainSlots>) -> String) -> Vec<String> {
        let min_len = self.mode.min_len();
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let mut cells = vec![(index + min_len).to_string()];
                cells.extend(row.iter().enumerate().map(|(j, slots)| cell(j + 1, *slots)));
                cells.join(separator)
            })
            .collect()
    }

    /// Slots used, `0` where no train was seen
    pub fn slot_lines(&self, separator: &str) -> Vec<String> {
        self.section(separator, |_, s| s.map_or(0, |s| s.slots).to_string())
    }

    /// Titled sections: presence, boundaries, expected slots, slots and utility.
    pub fn report_lines(&self, separator: &str) -> Vec<String> {
        let flag = |on: bool| if on { "1" } else { "0" }.to_string();
        let mut lines = Vec::new();
        let mut push = |title: &str, rows: Vec<String>| {
            lines.push(title.to_string());
            lines.extend(rows);
            lines.push(String::new());
        };
        push("updated", self.section(separator, |_, s| flag(s.is_some())));
        push("boundaries", self.section(separator, |_, s| flag(s.is_some_and(|s| s.boundary))));
        push(
            "num of expected slots",
            self.section(separator, |_, s| s.map_or(0, |s| s.expected).to_string()),
        );
        push("num of slots", self.slot_lines(separator));
        push(
            "slot utility",
            self.section(separator, |packets, s| match s {
                Some(s) => utility(packets, s.slots),
                None => "N/A".to_string(),
            })
            .into_iter()
            .map(|row| insert_after_first(&row, separator, "1"))
            .collect(),
        );
        lines
    }
}

/// Frames delivered per slot, counting the slot that opened the train.
fn utility(packets: usize, slots: i64) -> String {
    format_float(round_to((packets + 1) as f64 / (slots + 1) as f64, 2))
}

fn insert_after_first(row: &str, separator: &str, cell: &str) -> String {
    match row.split_once(separator) {
        Some((first, rest)) => format!("{first}{separator}{cell}{separator}{rest}"),
        None => format!("{row}{separator}{cell}"),
    }
}

/// Scan one node log into an efficiency table.
pub fn slot_efficiency(path: &Path, mode: EfficiencyMode) -> Result<EfficiencyTable> {
    let mut table = EfficiencyTable::new(mode);
    for item in open_log(path)? {
        let (line_number, text) =
            item.with_context(|| format!("Failed to read log file: {}", path.display()))?;
        if let Some(result) = TrainResult::from_line(&text, mode)
            .with_context(|| format!("{}:{}", path.display(), line_number))?
        {
            table.record(&result);
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(mode: EfficiencyMode, contents: &str) -> Option<TrainResult> {
        TrainResult::from_line(&format!("[INFO: TSCH] {{asn 00.1}} {}", contents), mode).unwrap()
    }

    #[test]
    fn test_complete_uniform_trains_only() {
        let train = result(EfficiencyMode::Upa, "upa result bcsf tx 64 1 3 3 2 x 5").unwrap();
        assert_eq!((train.len, train.packets, train.slots), (64, 3, 2));
        assert_eq!(train.expected, Some(5));

        assert!(result(EfficiencyMode::Upa, "upa result ucsf tx 64 0 3 3 2 x 5").is_none());
        assert!(result(EfficiencyMode::Upa, "upa result ucsf tx 64 1 3 2 2 x 5").is_none());
        assert!(result(EfficiencyMode::Ep, "ep result bcsf tx 64 1 3 3 2").is_none());
        assert!(result(EfficiencyMode::Ep, "upa result ucsf tx 64 1 3 3 2 x 5").is_none());
        assert_eq!(result(EfficiencyMode::Ep, "ep result ucsf tx 64 1 3 3 2").unwrap().expected, None);
        let truncated = "[INFO: TSCH] {asn 00.1} upa result ucsf tx 64 1 3 3 2";
        assert!(TrainResult::from_line(truncated, EfficiencyMode::Upa).is_err());
    }

    #[test]
    fn test_ep_keeps_first_train() {
        let mut table = EfficiencyTable::new(EfficiencyMode::Ep);
        table.record(&result(EfficiencyMode::Ep, "ep result ucsf tx 50 1 2 2 3").unwrap());
        table.record(&result(EfficiencyMode::Ep, "ep result ucsf tx 50 1 2 2 7").unwrap());
        table.record(&result(EfficiencyMode::Ep, "ep result ucsf tx 20 1 2 2 7").unwrap());
        table.record(&result(EfficiencyMode::Ep, "ep result ucsf tx 50 1 15 15 7").unwrap());

        assert_eq!(table.get(50, 2).unwrap().slots, 3);
        let lines = table.slot_lines(" \t");
        assert_eq!(lines.len(), 80);
        assert_eq!(lines[4], "50 \t0 \t3 \t0 \t0 \t0 \t0 \t0 \t0 \t0 \t0 \t0 \t0 \t0 \t0");
    }

    #[test]
    fn test_upa_keeps_largest_and_marks_boundary() {
        let mut table = EfficiencyTable::new(EfficiencyMode::Upa);
        table.record(&result(EfficiencyMode::Upa, "upa result ucsf tx 60 1 1 1 1 x 1").unwrap());
        table.record(&result(EfficiencyMode::Upa, "upa result ucsf tx 60 1 2 2 2 x 2").unwrap());
        table.record(&result(EfficiencyMode::Upa, "upa result ucsf tx 60 1 2 2 1 x 1").unwrap());
        table.record(&result(EfficiencyMode::Upa, "upa result ucsf tx 60 1 2 2 4 x 3").unwrap());

        let kept = table.get(60, 2).unwrap();
        assert_eq!(kept, TrainSlots { slots: 4, expected: 3, boundary: true });
        assert!(!table.get(60, 1).unwrap().boundary);

        let lines = table.report_lines("\t");
        let utility_at = lines.iter().position(|l| l == "slot utility").unwrap();
        let row: Vec<&str> = lines[utility_at + 2].split('\t').collect();
        assert_eq!(row[..5], ["60", "1", "1.0", "0.6", "N/A"]);
        assert_eq!(row.len(), 18);
        assert_eq!(lines[0], "updated");
        assert!(lines[2].starts_with("60\t1\t1\t0\t"));
        assert!(lines.contains(&"boundaries".to_string()));
    }
}
