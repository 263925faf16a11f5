//! Core data types for phase-segmented log evaluation.

use serde::{Deserialize, Serialize};

use super::keys::{MetricKey, Vocabulary};

/// Node identifier as printed by the firmware
pub type NodeId = u32;

/// Absolute slot number (TSCH ASN)
pub type Asn = i64;

/// Log format family being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// `[HK-P` lines split into bootstrap and data periods by `reset_log`
    Hk,
    /// `[HK-P` lines split into topology, traffic and data periods by `reset_eval`
    HkV6,
    /// Single-pair `HCK` records attributed by link-local address
    Hckim,
}

/// Temporal regime a metric row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Bootstrap,
    TopologyOptimization,
    TrafficOptimization,
    Data,
}

impl Phase {
    /// Capitalized title used in report headers
    pub fn title(&self) -> &'static str {
        match self {
            Phase::Bootstrap => "Bootstrap",
            Phase::TopologyOptimization => "Topology optimization",
            Phase::TrafficOptimization => "Traffic optimization",
            Phase::Data => "Data",
        }
    }

    /// Lowercase label used in "still in" notices
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Bootstrap => "bootstrap",
            Phase::TopologyOptimization => "topology optimization",
            Phase::TrafficOptimization => "traffic optimization",
            Phase::Data => "data",
        }
    }
}

/// Where the companion token of a redirected key points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Companion {
    /// Decimal node id following the given marker token
    IdAfter(&'static str),
    /// Link-local address at a fixed token position
    AddressAt(usize),
}

/// How a variant derives latency figures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMode {
    /// Firmware-side running sums divided by receive counts
    CounterSums,
    /// Per-event slot deltas converted through slot epochs
    SlotEvents,
    None,
}

/// Shape of the lines carrying metric updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// `[HK-P: ...] key val key val ... |`
    TaggedPairs,
    /// `... ] HCK key val x addr`
    HckRecord,
}

impl Variant {
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            Variant::Hk => &[Phase::Bootstrap, Phase::Data],
            Variant::HkV6 => &[
                Phase::TopologyOptimization,
                Phase::TrafficOptimization,
                Phase::Data,
            ],
            Variant::Hckim => &[Phase::Data],
        }
    }

    pub fn line_format(&self) -> LineFormat {
        match self {
            Variant::Hk | Variant::HkV6 => LineFormat::TaggedPairs,
            Variant::Hckim => LineFormat::HckRecord,
        }
    }

    pub fn vocabulary(&self) -> Vocabulary {
        match self {
            Variant::Hk => Vocabulary::hk(),
            Variant::HkV6 => Vocabulary::hk_v6(),
            Variant::Hckim => Vocabulary::hckim(),
        }
    }

    /// Phase index a sentinel pair switches to, if the pair is a sentinel.
    pub fn transition(&self, key: MetricKey, value: i64) -> Option<usize> {
        match (self, key, value) {
            (Variant::Hk, MetricKey::ResetLog, _) => Some(1),
            (Variant::HkV6, MetricKey::ResetEval, 0) => Some(1),
            (Variant::HkV6, MetricKey::ResetEval, 1) => Some(2),
            _ => None,
        }
    }

    /// Keys whose last value survives a phase transition.
    pub fn carried_keys(&self) -> &'static [MetricKey] {
        match self {
            Variant::Hk => &[MetricKey::LastP],
            Variant::HkV6 => &[MetricKey::LastP, MetricKey::Opku],
            Variant::Hckim => &[],
        }
    }

    /// Companion token for keys the root records on behalf of another node.
    pub fn attribution(&self, key: MetricKey) -> Option<Companion> {
        match (self, key) {
            (Variant::Hk, MetricKey::RxUp | MetricKey::LtUpSum) => Some(Companion::IdAfter("from")),
            (Variant::Hk, MetricKey::TxDown) => Some(Companion::IdAfter("to")),
            (Variant::HkV6, MetricKey::RxUp) => Some(Companion::IdAfter("from")),
            (Variant::HkV6, MetricKey::TxDown) => Some(Companion::IdAfter("to")),
            (Variant::Hckim, MetricKey::Rxu | MetricKey::Txd) => Some(Companion::AddressAt(5)),
            _ => None,
        }
    }

    /// Sequence counter checked for gaps while scanning a node's log.
    pub fn continuity_key(&self, is_root: bool) -> Option<MetricKey> {
        match (self, is_root) {
            (Variant::HkV6, true) => Some(MetricKey::TxDown),
            (Variant::HkV6, false) => Some(MetricKey::TxUp),
            _ => None,
        }
    }

    /// Whether a key's raw value is a parent address rather than a number.
    pub fn is_address_valued(&self, key: MetricKey) -> bool {
        matches!((self, key), (Variant::Hckim, MetricKey::LastP))
    }

    pub fn latency_mode(&self) -> LatencyMode {
        match self {
            Variant::Hk => LatencyMode::CounterSums,
            Variant::HkV6 => LatencyMode::SlotEvents,
            Variant::Hckim => LatencyMode::None,
        }
    }

    /// Whether SLA, UPA and `HK-T` slot-length lines are interpreted.
    pub fn tracks_slot_timing(&self) -> bool {
        matches!(self, Variant::HkV6)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Variant::Hk => "hk",
            Variant::HkV6 => "hk-v6",
            Variant::Hckim => "hckim",
        };
        f.write_str(name)
    }
}

/// Raw metric values of one node in one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRow {
    values: Vec<i64>,
}

impl Default for MetricRow {
    fn default() -> Self {
        Self {
            values: vec![0; MetricKey::COUNT],
        }
    }
}

impl MetricRow {
    pub fn get(&self, key: MetricKey) -> i64 {
        self.values[key.slot()]
    }

    pub fn set(&mut self, key: MetricKey, value: i64) {
        self.values[key.slot()] = value;
    }

    /// Float view of a counter for ratio computations
    pub fn as_f64(&self, key: MetricKey) -> f64 {
        self.get(key) as f64
    }

    pub fn sum(&self, keys: &[MetricKey]) -> f64 {
        keys.iter().map(|k| self.as_f64(*k)).sum()
    }
}

/// Per-hop latency accumulators of one node in one phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyRow {
    pub up_count: u64,
    pub up_sum_ms: f64,
    pub down_count: u64,
    pub down_sum_ms: f64,
    pub max_up_slots: i64,
    pub max_down_slots: i64,
}

/// Direction of a latency sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl LatencyRow {
    /// Add one per-hop sample.
    pub fn record(&mut self, direction: Direction, per_hop_ms: f64, per_hop_slots: i64) {
        let (count, sum, max) = match direction {
            Direction::Up => (&mut self.up_count, &mut self.up_sum_ms, &mut self.max_up_slots),
            Direction::Down => (
                &mut self.down_count,
                &mut self.down_sum_ms,
                &mut self.max_down_slots,
            ),
        };
        *count += 1;
        *sum += per_hop_ms;
        if per_hop_slots > *max {
            *max = per_hop_slots;
        }
    }
}

/// Observed slot lengths of one node in one phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotLengthRow {
    pub count: u64,
    pub sum_ms: f64,
}

/// Everything accumulated for one node during one phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseRecord {
    pub metrics: MetricRow,
    pub latency: LatencyRow,
    pub slot_length: SlotLengthRow,
}

/// One phase record per phase of the variant, for one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub phases: Vec<PhaseRecord>,
}

impl NodeRecord {
    pub fn new(phase_count: usize) -> Self {
        Self {
            phases: vec![PhaseRecord::default(); phase_count],
        }
    }

    /// Copy carried keys from the phase preceding `target` into `target`.
    pub fn carry_forward(&mut self, keys: &[MetricKey], target: usize) {
        if target == 0 || target >= self.phases.len() {
            return;
        }
        for key in keys {
            let value = self.phases[target - 1].metrics.get(*key);
            self.phases[target].metrics.set(*key, value);
        }
    }
}

/// Records of every node, indexed by registry position
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTables {
    pub variant: Variant,
    pub nodes: Vec<NodeRecord>,
    /// Highest phase index the root reached
    pub root_phase: usize,
    /// Flags detected in the root log
    pub flags: DetectedFlags,
}

impl PhaseTables {
    pub fn new(variant: Variant, node_count: usize) -> Self {
        let phase_count = variant.phases().len();
        Self {
            variant,
            nodes: vec![NodeRecord::new(phase_count); node_count],
            root_phase: 0,
            flags: DetectedFlags::default(),
        }
    }

    pub fn record(&self, node: usize, phase: usize) -> &PhaseRecord {
        &self.nodes[node].phases[phase]
    }

    /// Whether the root reached the last phase of the variant.
    pub fn root_finished(&self) -> bool {
        self.root_phase + 1 >= self.variant.phases().len()
    }
}

/// Features detected from the root log rather than configured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectedFlags {
    pub sla: bool,
    pub upa: bool,
}

/// A derived statistic, or the marker for an undefined ratio
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Int(i64),
    Float(f64),
    Text(String),
    NotApplicable,
}

impl ResultValue {
    pub fn is_applicable(&self) -> bool {
        !matches!(self, ResultValue::NotApplicable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_per_variant() {
        assert_eq!(Variant::Hk.transition(MetricKey::ResetLog, 7), Some(1));
        assert_eq!(Variant::HkV6.transition(MetricKey::ResetEval, 0), Some(1));
        assert_eq!(Variant::HkV6.transition(MetricKey::ResetEval, 1), Some(2));
        assert_eq!(Variant::HkV6.transition(MetricKey::ResetEval, 2), None);
        assert_eq!(Variant::HkV6.transition(MetricKey::ResetLog, 1), None);
        assert_eq!(Variant::Hckim.transition(MetricKey::ResetLog, 1), None);
    }

    #[test]
    fn test_carry_forward_copies_previous_phase_only() {
        let mut record = NodeRecord::new(3);
        record.phases[0].metrics.set(MetricKey::LastP, 4);
        record.phases[0].metrics.set(MetricKey::TxUp, 9);
        record.phases[1].metrics.set(MetricKey::LastP, 6);

        record.carry_forward(&[MetricKey::LastP], 2);
        assert_eq!(record.phases[2].metrics.get(MetricKey::LastP), 6);

        record.carry_forward(&[MetricKey::LastP], 1);
        assert_eq!(record.phases[1].metrics.get(MetricKey::LastP), 4);
        assert_eq!(record.phases[1].metrics.get(MetricKey::TxUp), 0);
    }

    #[test]
    fn test_latency_row_tracks_maximum() {
        let mut row = LatencyRow::default();
        row.record(Direction::Up, 12.5, 3);
        row.record(Direction::Up, 7.5, 1);
        row.record(Direction::Down, 20.0, 5);

        assert_eq!(row.up_count, 2);
        assert_eq!(row.up_sum_ms, 20.0);
        assert_eq!(row.max_up_slots, 3);
        assert_eq!(row.down_count, 1);
        assert_eq!(row.max_down_slots, 5);
    }

    #[test]
    fn test_root_finished() {
        let mut tables = PhaseTables::new(Variant::HkV6, 2);
        assert!(!tables.root_finished());
        tables.root_phase = 2;
        assert!(tables.root_finished());
        assert!(PhaseTables::new(Variant::Hckim, 1).root_finished());
    }
}
