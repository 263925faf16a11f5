//! Log parsing for RPL/TSCH node logs.
//!
//! The root log is scanned first: it carries the root's own counters plus
//! per-link counters that belong to other nodes. Non-root logs are then
//! scanned in parallel, each worker owning a copy of the rows the root scan
//! attributed to its node, and merged back in registry order.

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::{debug, info, trace};
use rayon::prelude::*;

use super::error::ParseError;
use super::keys::{MetricKey, Vocabulary};
use super::latency::{self, scan_control, ControlScan, LatencySample, SlotEpochs};
use super::line::KvLine;
use super::types::*;
use crate::config::EvalConfig;
use crate::registry::{link_local_fragment, NodeRegistry};
use crate::utils::lines::open_log;
use crate::utils::naming::LogNaming;

/// Read-only state shared by every scan of a run
pub struct ScanContext<'a> {
    pub variant: Variant,
    pub vocabulary: Vocabulary,
    pub registry: &'a NodeRegistry,
    pub epochs: &'a SlotEpochs,
}

impl<'a> ScanContext<'a> {
    pub fn new(variant: Variant, registry: &'a NodeRegistry, epochs: &'a SlotEpochs) -> Self {
        Self {
            variant,
            vocabulary: variant.vocabulary(),
            registry,
            epochs,
        }
    }
}

/// Destination of the rows a scan writes
pub trait RecordSink {
    fn node_mut(&mut self, index: usize) -> Result<&mut NodeRecord, ParseError>;
}

impl RecordSink for Vec<NodeRecord> {
    fn node_mut(&mut self, index: usize) -> Result<&mut NodeRecord, ParseError> {
        let rows = self.len();
        self.get_mut(index)
            .ok_or(ParseError::RowOutOfRange { index, rows })
    }
}

/// Sink holding the record of a single non-root node.
///
/// Any other row is refused: non-root lines never carry counters for
/// other nodes.
pub struct OwnRecord<'r> {
    pub index: usize,
    pub record: &'r mut NodeRecord,
}

impl RecordSink for OwnRecord<'_> {
    fn node_mut(&mut self, index: usize) -> Result<&mut NodeRecord, ParseError> {
        if index != self.index {
            return Err(ParseError::ForeignRow {
                index,
                owner: self.index,
            });
        }
        Ok(self.record)
    }
}

/// Scanning state of one node's log
#[derive(Debug, Clone)]
pub struct NodeScan {
    pub node_index: usize,
    pub phase: usize,
    pub max_phase: usize,
    last_sequence: i64,
}

impl NodeScan {
    pub fn new(node_index: usize) -> Self {
        Self {
            node_index,
            phase: 0,
            max_phase: 0,
            last_sequence: 0,
        }
    }

    fn is_root(&self) -> bool {
        self.node_index == 0
    }

    /// Apply one log line to the sink.
    pub fn apply_line<S: RecordSink>(
        &mut self,
        ctx: &ScanContext<'_>,
        raw_line: &str,
        sink: &mut S,
    ) -> Result<(), ParseError> {
        if ctx.variant.tracks_slot_timing() {
            if let Some(ms) = latency::slot_length_ms(raw_line)? {
                let slot_length = &mut sink.node_mut(self.node_index)?.phases[self.phase].slot_length;
                slot_length.count += 1;
                slot_length.sum_ms += ms;
            }
        }

        let Some(kv) = KvLine::parse(raw_line, ctx.variant.line_format()) else {
            return Ok(());
        };

        for (token, raw_value) in kv.pairs() {
            let Some(key) = MetricKey::from_token(token) else {
                trace!("Ignoring unknown key {:?}", token);
                continue;
            };
            if !ctx.vocabulary.contains(key) {
                trace!("Ignoring key {} outside the {} vocabulary", token, ctx.variant);
                continue;
            }
            let value = self.decode(ctx, key, raw_value)?;

            if let Some(target) = ctx.variant.transition(key, value) {
                self.enter_phase(ctx, target, sink)?;
            }

            let row_index = match ctx.variant.attribution(key) {
                Some(companion) if self.is_root() => resolve_companion(ctx, &kv, key, companion)?,
                _ => self.node_index,
            };
            sink.node_mut(row_index)?.phases[self.phase]
                .metrics
                .set(key, value);

            if ctx.variant.continuity_key(self.is_root()) == Some(key) {
                if value.saturating_sub(self.last_sequence) > 1 {
                    sink.node_mut(self.node_index)?.phases[self.phase]
                        .metrics
                        .set(MetricKey::LoggingDisrupted, 1);
                }
                self.last_sequence = value;
            }
        }

        if ctx.variant.latency_mode() == LatencyMode::SlotEvents {
            self.record_latency(ctx, &kv, sink)?;
        }
        Ok(())
    }

    fn decode(&self, ctx: &ScanContext<'_>, key: MetricKey, raw: &str) -> Result<i64, ParseError> {
        if ctx.variant.is_address_valued(key) {
            if raw == "0" {
                return Ok(0);
            }
            let index = ctx.registry.index_of_address(raw)?;
            return Ok(i64::from(ctx.registry.node(index).id));
        }
        raw.parse().map_err(|_| ParseError::InvalidValue {
            key: key.as_str().to_string(),
            value: raw.to_string(),
        })
    }

    fn enter_phase<S: RecordSink>(
        &mut self,
        ctx: &ScanContext<'_>,
        target: usize,
        sink: &mut S,
    ) -> Result<(), ParseError> {
        sink.node_mut(self.node_index)?
            .carry_forward(ctx.variant.carried_keys(), target);
        debug!(
            "Node index {} enters the {} period",
            self.node_index,
            ctx.variant.phases()[target].label()
        );
        self.phase = target;
        self.max_phase = self.max_phase.max(target);
        self.last_sequence = 0;
        Ok(())
    }

    fn record_latency<S: RecordSink>(
        &self,
        ctx: &ScanContext<'_>,
        kv: &KvLine<'_>,
        sink: &mut S,
    ) -> Result<(), ParseError> {
        let (row_index, direction, sample) = match (self.is_root(), kv.first()) {
            (true, Some("rx_up")) => {
                let index = resolve_companion(ctx, kv, MetricKey::RxUp, Companion::IdAfter("from"))?;
                let sample = LatencySample::from_line(kv, "rx_up", "lt_up_t", "lt_up_r")?;
                (index, Direction::Up, sample)
            }
            (false, Some("rx_down")) => {
                let sample = LatencySample::from_line(kv, "rx_down", "lt_down_t", "lt_down_r")?;
                (self.node_index, Direction::Down, sample)
            }
            _ => return Ok(()),
        };
        sink.node_mut(row_index)?.phases[self.phase].latency.record(
            direction,
            sample.per_hop_ms(ctx.epochs),
            sample.per_hop_slots(),
        );
        Ok(())
    }
}

/// Registry index named by the companion token of a redirected key.
fn resolve_companion(
    ctx: &ScanContext<'_>,
    kv: &KvLine<'_>,
    key: MetricKey,
    companion: Companion,
) -> Result<usize, ParseError> {
    match companion {
        Companion::IdAfter(marker) => {
            let raw = latency::attribute(kv, key.as_str(), marker)?;
            let id = raw.parse().map_err(|_| ParseError::InvalidValue {
                key: marker.to_string(),
                value: raw.to_string(),
            })?;
            ctx.registry.index_of_id(id)
        }
        Companion::AddressAt(position) => {
            let address = kv.token(position).ok_or_else(|| ParseError::MissingCompanion {
                key: key.as_str().to_string(),
                companion: format!("address at token {}", position),
            })?;
            ctx.registry.index_of_address(address)
        }
    }
}

/// Scan one node's log file into `sink`, returning the highest phase reached.
pub fn scan_log<S: RecordSink>(
    ctx: &ScanContext<'_>,
    path: &Path,
    node_index: usize,
    sink: &mut S,
) -> Result<usize> {
    let mut scan = NodeScan::new(node_index);
    let mut lines = 0usize;
    for item in open_log(path)? {
        let (line_number, text) =
            item.with_context(|| format!("Failed to read log file: {}", path.display()))?;
        scan.apply_line(ctx, &text, sink)
            .with_context(|| format!("{}:{}", path.display(), line_number))?;
        lines += 1;
    }
    debug!(
        "Scanned {} lines of {}, reached phase {}",
        lines,
        path.display(),
        scan.max_phase
    );
    Ok(scan.max_phase)
}

/// Learn missing link-local addresses from each node's boot lines.
pub fn learn_addresses(registry: &mut NodeRegistry, naming: &LogNaming) -> Result<()> {
    let missing: Vec<(usize, NodeId)> = registry
        .iter()
        .filter(|(_, node)| node.address.is_none())
        .map(|(index, node)| (index, node.id))
        .collect();

    let learned: Vec<(usize, Option<String>)> = missing
        .par_iter()
        .map(|(index, id)| -> Result<(usize, Option<String>)> {
            let path = naming.path(*id);
            for item in open_log(&path)? {
                let (_, text) =
                    item.with_context(|| format!("Failed to read log file: {}", path.display()))?;
                if let Some(address) = link_local_fragment(&text) {
                    return Ok((*index, Some(address)));
                }
            }
            Ok((*index, None))
        })
        .collect::<Result<Vec<_>>>()?;

    for (index, address) in learned {
        match address {
            Some(address) => registry.set_address(index, address),
            None => debug!("No link-local address found for node index {}", index),
        }
    }
    Ok(())
}

/// Parse every node log of a run into phase tables.
pub fn parse_all_logs(
    config: &EvalConfig,
    registry: &NodeRegistry,
    naming: &LogNaming,
) -> Result<PhaseTables> {
    let variant = config.variant;
    let root_path = naming.path(registry.root().id);

    let control = if variant.tracks_slot_timing() {
        scan_control(&root_path)?
    } else {
        ControlScan::default()
    };
    let epochs = control.epochs(config.default_slot_len_ms);
    let ctx = ScanContext::new(variant, registry, &epochs);

    let mut tables = PhaseTables::new(variant, registry.len());
    tables.flags = control.flags;

    info!("Parsing root log: {}", root_path.display());
    tables.root_phase = scan_log(&ctx, &root_path, 0, &mut tables.nodes)?;

    let seeds: Vec<(usize, NodeRecord)> = registry
        .non_root()
        .map(|(index, _)| (index, tables.nodes[index].clone()))
        .collect();

    info!("Parsing {} non-root logs", seeds.len());
    let scanned: Vec<(usize, NodeRecord)> = seeds
        .into_par_iter()
        .map(|(index, mut record)| -> Result<(usize, NodeRecord)> {
            let path = naming.path(registry.node(index).id);
            debug!("Parsing {}", path.display());
            let mut sink = OwnRecord {
                index,
                record: &mut record,
            };
            scan_log(&ctx, &path, index, &mut sink)?;
            Ok((index, record))
        })
        .collect::<Result<Vec<_>>>()?;

    for (index, record) in scanned {
        tables.nodes[index] = record;
    }

    info!(
        "Parsed {} nodes, root reached the {} period",
        registry.len(),
        variant.phases()[tables.root_phase].label()
    );
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::with_root(1, Some("aa".to_string()));
        registry.add_non_root(2, Some("bb".to_string()));
        registry.add_non_root(5, Some("cc".to_string()));
        registry
    }

    fn run(variant: Variant, node_index: usize, lines: &[&str], tables: &mut Vec<NodeRecord>) -> NodeScan {
        let registry = registry();
        let epochs = SlotEpochs::fixed(10.0);
        let ctx = ScanContext::new(variant, &registry, &epochs);
        let mut scan = NodeScan::new(node_index);
        for line in lines {
            scan.apply_line(&ctx, line, tables).unwrap();
        }
        scan
    }

    fn empty(variant: Variant) -> Vec<NodeRecord> {
        PhaseTables::new(variant, 3).nodes
    }

    #[test]
    fn test_root_attributes_link_counters_to_sender() {
        let mut nodes = empty(Variant::Hk);
        run(
            Variant::Hk,
            0,
            &[
                "[HK-P: App] rx_up 7 | from 5 hops 1",
                "[HK-P: App] lt_up_sum 140 | from 5",
                "[HK-P: App] tx_down 3 | to 2",
                "[HK-P: App] ps 1 lastP 0 |",
            ],
            &mut nodes,
        );

        assert_eq!(nodes[2].phases[0].metrics.get(MetricKey::RxUp), 7);
        assert_eq!(nodes[2].phases[0].metrics.get(MetricKey::LtUpSum), 140);
        assert_eq!(nodes[1].phases[0].metrics.get(MetricKey::TxDown), 3);
        assert_eq!(nodes[0].phases[0].metrics.get(MetricKey::RxUp), 0);
        assert_eq!(nodes[0].phases[0].metrics.get(MetricKey::Ps), 1);
    }

    #[test]
    fn test_sentinel_carries_parent_and_records_itself() {
        let mut nodes = empty(Variant::Hk);
        let scan = run(
            Variant::Hk,
            1,
            &[
                "[HK-P: App] tx_up 4 lastP 5 ps 2 |",
                "[HK-P: App] reset_log 1 tx_up 0 |",
                "[HK-P: App] tx_up 3 |",
            ],
            &mut nodes,
        );

        assert_eq!(scan.max_phase, 1);
        let bootstrap = &nodes[1].phases[0].metrics;
        let data = &nodes[1].phases[1].metrics;
        assert_eq!(bootstrap.get(MetricKey::TxUp), 4);
        assert_eq!(data.get(MetricKey::LastP), 5);
        assert_eq!(data.get(MetricKey::Ps), 0);
        assert_eq!(data.get(MetricKey::ResetLog), 1);
        assert_eq!(data.get(MetricKey::TxUp), 3);
    }

    #[test]
    fn test_unknown_and_foreign_keys_are_ignored() {
        let mut nodes = empty(Variant::HkV6);
        run(
            Variant::HkV6,
            1,
            &["[HK-P: App] bogus x lt_up_sum 9 tx_up 2 |"],
            &mut nodes,
        );
        let row = &nodes[1].phases[0].metrics;
        assert_eq!(row.get(MetricKey::LtUpSum), 0);
        assert_eq!(row.get(MetricKey::TxUp), 2);
    }

    #[test]
    fn test_unknown_sender_is_an_error() {
        let registry = registry();
        let epochs = SlotEpochs::fixed(10.0);
        let ctx = ScanContext::new(Variant::Hk, &registry, &epochs);
        let mut nodes = empty(Variant::Hk);
        let mut scan = NodeScan::new(0);

        let err = scan
            .apply_line(&ctx, "[HK-P: App] rx_up 1 | from 9", &mut nodes)
            .unwrap_err();
        assert!(matches!(err, ParseError::UnknownNodeId { id: 9 }));

        let err = scan
            .apply_line(&ctx, "[HK-P: App] rx_up 1 |", &mut nodes)
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingCompanion { .. }));

        let err = scan
            .apply_line(&ctx, "[HK-P: App] tx_up x1 |", &mut nodes)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn test_v6_phases_and_continuity() {
        let mut nodes = empty(Variant::HkV6);
        let scan = run(
            Variant::HkV6,
            1,
            &[
                "[HK-P: App] opku 1 lastP 1 tx_up 1 |",
                "[HK-P: App] reset_eval 0 |",
                "[HK-P: App] tx_up 1 |",
                "[HK-P: App] reset_eval 1 |",
                "[HK-P: App] tx_up 1 |",
                "[HK-P: App] tx_up 3 |",
            ],
            &mut nodes,
        );

        assert_eq!(scan.max_phase, 2);
        let traffic = &nodes[1].phases[1].metrics;
        let data = &nodes[1].phases[2].metrics;
        assert_eq!(traffic.get(MetricKey::Opku), 1);
        assert_eq!(traffic.get(MetricKey::LoggingDisrupted), 0);
        assert_eq!(data.get(MetricKey::Opku), 1);
        assert_eq!(data.get(MetricKey::LastP), 1);
        assert_eq!(data.get(MetricKey::ResetEval), 1);
        assert_eq!(data.get(MetricKey::LoggingDisrupted), 1);
    }

    #[test]
    fn test_v6_latency_events() {
        let mut nodes = empty(Variant::HkV6);
        run(
            Variant::HkV6,
            0,
            &["[HK-P: App] rx_up 1 | from 2 lt_up_t 10 lt_up_r 14 hops 2"],
            &mut nodes,
        );
        run(
            Variant::HkV6,
            2,
            &["[HK-P: App] rx_down 1 | lt_down_t 0 lt_down_r 3 hops 1"],
            &mut nodes,
        );

        let up = &nodes[1].phases[0].latency;
        assert_eq!(up.up_count, 1);
        assert_eq!(up.up_sum_ms, 20.0);
        assert_eq!(up.max_up_slots, 2);
        let down = &nodes[2].phases[0].latency;
        assert_eq!(down.down_count, 1);
        assert_eq!(down.down_sum_ms, 30.0);
    }

    #[test]
    fn test_hckim_records_by_address() {
        let mut nodes = empty(Variant::Hckim);
        run(
            Variant::Hckim,
            0,
            &[
                "[INFO: App] HCK rxu 12 x 5 cc",
                "[INFO: App] HCK txd 4 x 2 bb",
                "[INFO: App] HCK dc 31 x 1 aa",
            ],
            &mut nodes,
        );
        run(Variant::Hckim, 1, &["[INFO: App] HCK lastP cc x 2 bb"], &mut nodes);

        assert_eq!(nodes[2].phases[0].metrics.get(MetricKey::Rxu), 12);
        assert_eq!(nodes[1].phases[0].metrics.get(MetricKey::Txd), 4);
        assert_eq!(nodes[0].phases[0].metrics.get(MetricKey::Dc), 31);
        assert_eq!(nodes[1].phases[0].metrics.get(MetricKey::LastP), 5);
    }

    #[test]
    fn test_slot_length_lines_follow_node_phase() {
        let mut nodes = empty(Variant::HkV6);
        run(
            Variant::HkV6,
            1,
            &[
                "[INFO: TSCH] ts 10000 x HK-T",
                "[HK-P: App] reset_eval 0 |",
                "[INFO: TSCH] ts 15000 x HK-T",
                "[INFO: TSCH] ts 20000 x HK-T",
            ],
            &mut nodes,
        );
        assert_eq!(nodes[1].phases[0].slot_length.count, 1);
        assert_eq!(nodes[1].phases[1].slot_length.count, 2);
        assert_eq!(nodes[1].phases[1].slot_length.sum_ms, 35.0);
    }

    #[test]
    fn test_sentinel_mid_line_switches_phase_for_latency() {
        let mut nodes = empty(Variant::HkV6);
        let scan = run(
            Variant::HkV6,
            2,
            &["[HK-P: App] rx_down 1 reset_eval 0 | lt_down_t 0 lt_down_r 3 hops 1"],
            &mut nodes,
        );

        assert_eq!(scan.phase, 1);
        assert_eq!(nodes[2].phases[0].metrics.get(MetricKey::RxDown), 1);
        assert_eq!(nodes[2].phases[0].latency.down_count, 0);
        assert_eq!(nodes[2].phases[1].metrics.get(MetricKey::ResetEval), 0);
        assert_eq!(nodes[2].phases[1].latency.down_count, 1);
    }

    #[test]
    fn test_own_record_refuses_other_rows() {
        let mut record = empty(Variant::Hk).remove(1);
        let mut sink = OwnRecord {
            index: 1,
            record: &mut record,
        };
        assert!(sink.node_mut(1).is_ok());
        let err = sink.node_mut(2).unwrap_err();
        assert!(matches!(err, ParseError::ForeignRow { index: 2, owner: 1 }));

        let mut nodes = empty(Variant::Hk);
        let err = nodes.node_mut(3).unwrap_err();
        assert!(matches!(err, ParseError::RowOutOfRange { index: 3, rows: 3 }));
    }

    #[test]
    fn test_scan_into_mismatched_sink_is_an_error() {
        let registry = registry();
        let epochs = SlotEpochs::fixed(10.0);
        let ctx = ScanContext::new(Variant::HkV6, &registry, &epochs);
        let mut record = empty(Variant::HkV6).remove(1);
        let mut sink = OwnRecord {
            index: 1,
            record: &mut record,
        };
        let mut scan = NodeScan::new(2);

        let err = scan
            .apply_line(&ctx, "[HK-P: App] tx_up 1 |", &mut sink)
            .unwrap_err();
        assert!(matches!(err, ParseError::ForeignRow { index: 2, owner: 1 }));
    }

    #[test]
    fn test_continuity_gap_at_extreme_counters() {
        let mut nodes = empty(Variant::HkV6);
        run(
            Variant::HkV6,
            1,
            &[
                "[HK-P: App] reset_eval 0 |",
                "[HK-P: App] tx_up -9223372036854775808 |",
                "[HK-P: App] tx_up 9223372036854775807 |",
            ],
            &mut nodes,
        );
        let traffic = &nodes[1].phases[1].metrics;
        assert_eq!(traffic.get(MetricKey::TxUp), i64::MAX);
        assert_eq!(traffic.get(MetricKey::LoggingDisrupted), 1);

        let mut nodes = empty(Variant::HkV6);
        run(
            Variant::HkV6,
            1,
            &[
                "[HK-P: App] reset_eval 0 |",
                "[HK-P: App] tx_up 9223372036854775807 |",
                "[HK-P: App] tx_up -9223372036854775808 |",
            ],
            &mut nodes,
        );
        assert_eq!(nodes[1].phases[1].metrics.get(MetricKey::TxUp), i64::MIN);
    }
}
