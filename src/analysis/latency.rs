//! Slot-epoch aware latency accounting.
//!
//! Transmit and receive times are absolute slot numbers. When slot-length
//! adaptation is active the slot duration changes over the run, so an
//! interval is integrated piecewise over the epochs it spans.

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::{debug, info};

use super::error::ParseError;
use super::line::{self, KvLine, SLA_TAG, SLOT_TIMING_MARKER, UPA_MARKER};
use super::types::{Asn, DetectedFlags};
use crate::utils::lines::open_log;
use crate::utils::rounding::round_half_even;

/// Slot number at which the first adaptive epoch starts
const FIRST_EPOCH_ASN: Asn = 1;

/// Ordered `(start_asn, slot_ms)` breakpoints
#[derive(Debug, Clone, PartialEq)]
pub struct SlotEpochs {
    breakpoints: Vec<(Asn, f64)>,
}

impl SlotEpochs {
    /// A single epoch covering every slot.
    pub fn fixed(slot_ms: f64) -> Self {
        Self {
            breakpoints: vec![(Asn::MIN, slot_ms)],
        }
    }

    /// Epochs from unordered breakpoints. An empty list falls back to `default_ms`.
    pub fn from_breakpoints(mut breakpoints: Vec<(Asn, f64)>, default_ms: f64) -> Self {
        if breakpoints.is_empty() {
            return Self::fixed(default_ms);
        }
        breakpoints.sort_by_key(|(start, _)| *start);
        Self { breakpoints }
    }

    pub fn breakpoints(&self) -> &[(Asn, f64)] {
        &self.breakpoints
    }

    /// Index of the epoch containing `asn`; slots before the first breakpoint
    /// belong to the first epoch.
    pub fn epoch_of(&self, asn: Asn) -> usize {
        self.breakpoints
            .partition_point(|(start, _)| *start <= asn)
            .saturating_sub(1)
    }

    /// Milliseconds elapsed between slot `t` and slot `r`.
    pub fn elapsed_ms(&self, t: Asn, r: Asn) -> f64 {
        if r < t {
            return -self.elapsed_ms(r, t);
        }
        let first = self.epoch_of(t);
        let last = self.epoch_of(r);
        let duration = |i: usize| self.breakpoints[i].1;
        let start = |i: usize| self.breakpoints[i].0;

        if first == last {
            return (r - t) as f64 * duration(first);
        }

        let mut elapsed = (start(first + 1) - t) as f64 * duration(first);
        for i in first + 1..last {
            elapsed += (start(i + 1) - start(i)) as f64 * duration(i);
        }
        elapsed + (r - start(last)) as f64 * duration(last)
    }
}

/// One receive event carrying its transmit and receive slots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    pub transmit: Asn,
    pub receive: Asn,
    pub hops: i64,
}

impl LatencySample {
    /// Read `<t_marker> <hex> <r_marker> <hex> hops <n>` from a metric line.
    pub fn from_line(
        kv: &KvLine<'_>,
        key: &str,
        t_marker: &str,
        r_marker: &str,
    ) -> Result<Self, ParseError> {
        let transmit = hex_attribute(kv, key, t_marker)?;
        let receive = hex_attribute(kv, key, r_marker)?;
        let raw_hops = attribute(kv, key, "hops")?;
        let hops: i64 = raw_hops.parse().map_err(|_| ParseError::InvalidValue {
            key: "hops".to_string(),
            value: raw_hops.to_string(),
        })?;
        if hops <= 0 {
            return Err(ParseError::InvalidHops { hops });
        }
        Ok(Self {
            transmit,
            receive,
            hops,
        })
    }

    /// Per-hop latency in milliseconds.
    pub fn per_hop_ms(&self, epochs: &SlotEpochs) -> f64 {
        epochs.elapsed_ms(self.transmit, self.receive) / self.hops as f64
    }

    /// Per-hop latency in slots, rounded half to even.
    pub fn per_hop_slots(&self) -> i64 {
        round_half_even((self.receive - self.transmit) as f64 / self.hops as f64)
    }
}

pub(crate) fn attribute<'a>(
    kv: &KvLine<'a>,
    key: &str,
    marker: &str,
) -> Result<&'a str, ParseError> {
    kv.after(marker).ok_or_else(|| ParseError::MissingCompanion {
        key: key.to_string(),
        companion: marker.to_string(),
    })
}

fn hex_attribute(kv: &KvLine<'_>, key: &str, marker: &str) -> Result<Asn, ParseError> {
    let raw = attribute(kv, key, marker)?;
    Asn::from_str_radix(raw, 16).map_err(|_| ParseError::InvalidValue {
        key: marker.to_string(),
        value: raw.to_string(),
    })
}

/// Slot length in milliseconds announced by an `HK-T` line.
///
/// The length is the third-from-last body token in microseconds; `0` means
/// no measurement.
pub fn slot_length_ms(raw_line: &str) -> Result<Option<f64>, ParseError> {
    if line::last_token(raw_line) != SLOT_TIMING_MARKER {
        return Ok(None);
    }
    let Some(body) = line::body(raw_line) else {
        return Ok(None);
    };
    let tokens: Vec<&str> = body.split(' ').collect();
    let Some(raw) = tokens.len().checked_sub(3).map(|i| tokens[i]) else {
        return Ok(None);
    };
    if raw == "0" {
        return Ok(None);
    }
    let micros: f64 = raw.parse().map_err(|_| ParseError::InvalidValue {
        key: "slot_len".to_string(),
        value: raw.to_string(),
    })?;
    Ok(Some(micros / 1000.0))
}

/// Features and slot epochs found in a pre-pass over the root log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlScan {
    pub flags: DetectedFlags,
    pub breakpoints: Vec<(Asn, f64)>,
}

impl ControlScan {
    /// Inspect one root log line.
    pub fn observe(&mut self, raw_line: &str) -> Result<(), ParseError> {
        if line::last_token(raw_line) == UPA_MARKER {
            self.flags.upa = true;
        }
        let Some(kv) = KvLine::tagged(raw_line, SLA_TAG) else {
            return Ok(());
        };
        self.flags.sla = true;

        if kv.first() != Some("det") || kv.token(1) != Some("c_ref_bc") {
            return Ok(());
        }
        let current = attribute(&kv, "det", "c_ts")?;
        let next = attribute(&kv, "det", "n_ts")?;
        if current == next {
            return Ok(());
        }
        let start = hex_attribute(&kv, "det", "t_asn")?;
        let next_us: f64 = next.parse().map_err(|_| ParseError::InvalidValue {
            key: "n_ts".to_string(),
            value: next.to_string(),
        })?;
        self.breakpoints.push((start, next_us / 1000.0));
        Ok(())
    }

    /// Slot epochs to use for latency conversion.
    pub fn epochs(&self, default_slot_ms: f64) -> SlotEpochs {
        if !self.flags.sla {
            return SlotEpochs::fixed(default_slot_ms);
        }
        let mut breakpoints = vec![(FIRST_EPOCH_ASN, default_slot_ms)];
        breakpoints.extend(self.breakpoints.iter().copied());
        SlotEpochs::from_breakpoints(breakpoints, default_slot_ms)
    }
}

/// Run the control pre-pass over a root log file.
pub fn scan_control(path: &Path) -> Result<ControlScan> {
    info!("Scanning control lines: {}", path.display());
    let mut scan = ControlScan::default();
    for item in open_log(path)? {
        let (line_number, text) =
            item.with_context(|| format!("Failed to read log file: {}", path.display()))?;
        scan.observe(&text)
            .with_context(|| format!("{}:{}", path.display(), line_number))?;
    }
    debug!(
        "SLA {} with {} epoch changes, UPA {}",
        scan.flags.sla,
        scan.breakpoints.len(),
        scan.flags.upa
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_epoch_elapsed() {
        let epochs = SlotEpochs::from_breakpoints(vec![(100, 5.0), (0, 10.0)], 10.0);
        assert_eq!(epochs.elapsed_ms(90, 110), 150.0);

        let sample = LatencySample {
            transmit: 90,
            receive: 110,
            hops: 2,
        };
        assert_eq!(sample.per_hop_ms(&epochs), 75.0);
        assert_eq!(sample.per_hop_slots(), 10);
    }

    #[test]
    fn test_fully_spanned_epochs() {
        let epochs = SlotEpochs::from_breakpoints(vec![(0, 10.0), (100, 5.0), (200, 20.0)], 10.0);
        // 10 slots at 10ms, 100 at 5ms, 5 at 20ms
        assert_eq!(epochs.elapsed_ms(90, 205), 100.0 + 500.0 + 100.0);
        assert_eq!(epochs.elapsed_ms(120, 130), 50.0);
    }

    #[test]
    fn test_fixed_epoch() {
        let epochs = SlotEpochs::fixed(10.0);
        assert_eq!(epochs.elapsed_ms(0x19f, 0x1a2), 30.0);
        assert_eq!(epochs.epoch_of(-5), 0);
    }

    #[test]
    fn test_counter_before_first_breakpoint_uses_first_epoch() {
        let epochs = SlotEpochs::from_breakpoints(vec![(1, 10.0), (50, 15.0)], 10.0);
        assert_eq!(epochs.epoch_of(0), 0);
        assert_eq!(epochs.elapsed_ms(0, 1), 10.0);
    }

    #[test]
    fn test_sample_from_line() {
        let line = "[HK-P: App] rx_up 5 | from 3 a_seq 5 len 20 lt_up_r 1a2 lt_up_t 19f hops 2";
        let kv = KvLine::tagged(line, line::METRIC_TAG).unwrap();
        let sample = LatencySample::from_line(&kv, "rx_up", "lt_up_t", "lt_up_r").unwrap();
        assert_eq!(sample.transmit, 0x19f);
        assert_eq!(sample.receive, 0x1a2);
        assert_eq!(sample.hops, 2);
        assert_eq!(sample.per_hop_ms(&SlotEpochs::fixed(10.0)), 15.0);
        assert_eq!(sample.per_hop_slots(), 2);
    }

    #[test]
    fn test_zero_hops_rejected() {
        let kv = KvLine::tagged("[HK-P: App] rx_down 1 | lt_down_t 1 lt_down_r 2 hops 0", line::METRIC_TAG)
            .unwrap();
        assert!(matches!(
            LatencySample::from_line(&kv, "rx_down", "lt_down_t", "lt_down_r"),
            Err(ParseError::InvalidHops { hops: 0 })
        ));
    }

    #[test]
    fn test_control_scan_builds_epochs() {
        let mut scan = ControlScan::default();
        scan.observe("[HK-S: SLA] det c_ref_bc 3 c_ts 10000 n_ts 15000 t_asn 64")
            .unwrap();
        scan.observe("[HK-S: SLA] det c_ref_bc 3 c_ts 15000 n_ts 15000 t_asn 80")
            .unwrap();
        scan.observe("[INFO: UPA] cell used HK-U").unwrap();

        assert!(scan.flags.sla);
        assert!(scan.flags.upa);
        let epochs = scan.epochs(10.0);
        assert_eq!(epochs.breakpoints(), &[(1, 10.0), (100, 15.0)]);
    }

    #[test]
    fn test_without_sla_lines_epochs_are_fixed() {
        let scan = ControlScan::default();
        assert_eq!(scan.epochs(10.0), SlotEpochs::fixed(10.0));
    }

    #[test]
    fn test_slot_length_line() {
        assert_eq!(
            slot_length_ms("[INFO: TSCH] ts 15000 x HK-T").unwrap(),
            Some(15.0)
        );
        assert_eq!(slot_length_ms("[INFO: TSCH] ts 0 x HK-T").unwrap(), None);
        assert_eq!(slot_length_ms("[INFO: TSCH] nothing").unwrap(), None);
    }
}
