//! Derived per-node statistics.
//!
//! Every variant has a closed, ordered list of result columns. A column is
//! either a raw counter shown under a short header or a formula over the
//! phase record. Ratios whose denominator is zero are `NotApplicable`.

use super::keys::MetricKey as K;
use super::types::*;
use crate::registry::{NodeRegistry, RegisteredNode};
use crate::utils::rounding::{round_half_even, round_to};

/// One column of a result table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultColumn {
    Id,
    Addr,
    Boot,
    BootP,
    /// Raw counter under the given header
    Raw(&'static str, K),
    UPdr,
    DPdr,
    Pdr,
    ULt,
    DLt,
    Lt,
    MuLt,
    MdLt,
    AHopD,
    AStn,
    Ipqr,
    Iplr,
    Iuqr,
    Iulr,
    LinkE,
    DutyCycle,
    TsL,
    Utc,
    Uts,
    Utr,
    Uto,
    Utu,
    Urc,
    Urs,
    Urr,
    Uro,
    Uru,
    Uu,
    Scr,
    Ctor,
    Cror,
    Utor,
    Uror,
    Ptor,
    Pror,
    Btor,
    Bror,
    Otor,
    Oror,
    Etor,
    Eror,
    /// Successful share of unused-cell attempts: header, ok counter, attempt counter
    Efficiency(&'static str, K, K),
}

use ResultColumn::*;

impl ResultColumn {
    /// Table header
    pub fn name(&self) -> &'static str {
        match self {
            Id => "id",
            Addr => "addr",
            Boot => "boot",
            BootP => "bootP",
            Raw(name, _) | Efficiency(name, _, _) => *name,
            UPdr => "uPdr",
            DPdr => "dPdr",
            Pdr => "pdr",
            ULt => "uLT",
            DLt => "dLT",
            Lt => "LT",
            MuLt => "MuLT",
            MdLt => "MdLT",
            AHopD => "aHopD",
            AStn => "aSTN",
            Ipqr => "IPQR",
            Iplr => "IPLR",
            Iuqr => "IUQR",
            Iulr => "IULR",
            LinkE => "linkE",
            DutyCycle => "dc",
            TsL => "ts_l",
            Utc => "UTC",
            Uts => "UTS",
            Utr => "UTR",
            Uto => "UTO",
            Utu => "UTU",
            Urc => "URC",
            Urs => "URS",
            Urr => "URR",
            Uro => "URO",
            Uru => "URU",
            Uu => "UU",
            Scr => "SCR",
            Ctor => "CTOR",
            Cror => "CROR",
            Utor => "UTOR",
            Uror => "UROR",
            Ptor => "PTOR",
            Pror => "PROR",
            Btor => "BTOR",
            Bror => "BROR",
            Otor => "OTOR",
            Oror => "OROR",
            Etor => "ETOR",
            Eror => "EROR",
        }
    }
}

const TRAFFIC: &[ResultColumn] = &[
    Raw("tx_up", K::TxUp),
    Raw("rx_up", K::RxUp),
    UPdr,
    Raw("tx_dw", K::TxDown),
    Raw("rx_dw", K::RxDown),
    DPdr,
    Pdr,
    ULt,
    DLt,
    Lt,
];

const IP_QUEUE: &[ResultColumn] = &[
    Raw("IPQL", K::IpQloss),
    Ipqr,
    Raw("IPLL", K::IpUcNoack),
    Iplr,
    Raw("IUQL", K::IpUdpQloss),
    Iuqr,
    Raw("IULL", K::IpUcUdpNoack),
    Iulr,
];

const UPA_TOTALS: &[ResultColumn] = &[Uts, Utr, Uto, Utu, Urs, Urr, Uro, Uru, Uu];

const CELL_OPERATIONS: &[ResultColumn] = &[
    Scr,
    Ctor,
    Cror,
    Utor,
    Uror,
    Ptor,
    Pror,
    Btor,
    Bror,
    Otor,
    Oror,
    Etor,
    Eror,
    Raw("CETR", K::BcUpaTxRs),
    Raw("CERR", K::BcUpaRxRs),
    Raw("UETR", K::UcUpaTxRs),
    Raw("UERR", K::UcUpaRxRs),
    Raw("PETR", K::PpUpaTxRs),
    Raw("PERR", K::PpUpaRxRs),
    Raw("CETO", K::BcUpaTxOk),
    Raw("CERO", K::BcUpaRxOk),
    Raw("UETO", K::UcUpaTxOk),
    Raw("UERO", K::UcUpaRxOk),
    Raw("PETO", K::PpUpaTxOk),
    Raw("PERO", K::PpUpaRxOk),
    Efficiency("CETE", K::BcUpaTxOk, K::BcUpaTxTs),
    Efficiency("CERE", K::BcUpaRxOk, K::BcUpaRxTs),
    Efficiency("UETE", K::UcUpaTxOk, K::UcUpaTxTs),
    Efficiency("UERE", K::UcUpaRxOk, K::UcUpaRxTs),
    Efficiency("PETE", K::PpUpaTxOk, K::PpUpaTxTs),
    Efficiency("PERE", K::PpUpaRxOk, K::PpUpaRxTs),
];

const HCKIM_COLUMNS: &[ResultColumn] = &[
    Id,
    Addr,
    Raw("txu", K::Txu),
    Raw("rxu", K::Rxu),
    Raw("txd", K::Txd),
    Raw("rxd", K::Rxd),
    Raw("dis_o", K::DisO),
    Raw("dio_o", K::DioO),
    Raw("dao_o", K::DaoO),
    Raw("daoA_o", K::DaoAO),
    Raw("ps", K::Ps),
    Raw("lastP", K::LastP),
    Raw("child", K::Child),
    Raw("fwo", K::Fwo),
    Raw("qloss", K::Qloss),
    Raw("enq", K::Enq),
    Raw("EBql", K::EbQl),
    Raw("EBenq", K::EbEnqCount),
    Raw("noack", K::Noack),
    Raw("ok", K::Ok),
    Raw("dc", K::Dc),
];

/// Ordered result columns of a variant and the index where the extended block starts
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub columns: Vec<ResultColumn>,
    pub split: usize,
}

impl ColumnLayout {
    pub fn for_variant(variant: Variant) -> Self {
        let mut columns = Vec::new();
        let split;
        match variant {
            Variant::Hk => {
                columns.extend([Id, Boot]);
                columns.extend_from_slice(TRAFFIC);
                columns.extend([
                    Raw("lastP", K::LastP),
                    Raw("ps", K::Ps),
                    Raw("hopD", K::HopDNow),
                    AHopD,
                    Raw("STN", K::SubtreeNow),
                    AStn,
                ]);
                columns.extend_from_slice(IP_QUEUE);
                columns.extend([
                    Raw("InQL", K::InputFull),
                    LinkE,
                    Raw("leave", K::Leaving),
                    DutyCycle,
                ]);
                columns.extend_from_slice(UPA_TOTALS);
                split = columns.len();
                columns.extend_from_slice(CELL_OPERATIONS);
            }
            Variant::HkV6 => {
                columns.extend([Id, BootP, Raw("bootQ", K::RsQ), Raw("opku", K::Opku)]);
                columns.extend_from_slice(TRAFFIC);
                columns.extend([
                    MuLt,
                    MdLt,
                    Raw("lastP", K::LastP),
                    Raw("ps", K::Ps),
                    AHopD,
                    AStn,
                ]);
                columns.extend_from_slice(IP_QUEUE);
                columns.extend([LinkE, Raw("leave", K::Leaving), DutyCycle]);
                split = columns.len();
                columns.extend([
                    Raw("as_ts", K::AssoTs),
                    Raw("sch_eb", K::SchEb),
                    Raw("sch_bc", K::SchBc),
                    Raw("sch_uc", K::SchUc),
                    TsL,
                    Utc,
                ]);
                columns.extend_from_slice(&UPA_TOTALS[..4]);
                columns.push(Urc);
                columns.extend_from_slice(&UPA_TOTALS[4..]);
                columns.extend_from_slice(CELL_OPERATIONS);
            }
            Variant::Hckim => {
                columns.extend_from_slice(HCKIM_COLUMNS);
                split = columns.len();
            }
        }
        Self { columns, split }
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(ResultColumn::name).collect()
    }

    pub fn core(&self) -> &[ResultColumn] {
        &self.columns[..self.split]
    }

    pub fn extended(&self) -> &[ResultColumn] {
        &self.columns[self.split..]
    }
}

/// Derived values of one node in one phase
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub node_id: NodeId,
    pub values: Vec<ResultValue>,
}

/// All node rows of one phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseResult {
    pub phase: Phase,
    pub rows: Vec<ResultRow>,
}

/// Derived tables of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub variant: Variant,
    pub layout: ColumnLayout,
    pub phases: Vec<PhaseResult>,
    pub root_phase: usize,
}

impl Evaluation {
    pub fn root_finished(&self) -> bool {
        self.root_phase + 1 >= self.phases.len()
    }
}

/// Compute every result column for every node and phase.
pub fn evaluate(tables: &PhaseTables, registry: &NodeRegistry) -> Evaluation {
    let variant = tables.variant;
    let layout = ColumnLayout::for_variant(variant);

    let phases = variant
        .phases()
        .iter()
        .enumerate()
        .map(|(phase_index, phase)| PhaseResult {
            phase: *phase,
            rows: registry
                .iter()
                .map(|(index, node)| {
                    let cell = Cell {
                        variant,
                        is_root: index == 0,
                        node,
                        record: tables.record(index, phase_index),
                    };
                    ResultRow {
                        node_id: node.id,
                        values: layout.columns.iter().map(|c| cell.value(*c)).collect(),
                    }
                })
                .collect(),
        })
        .collect();

    Evaluation {
        variant,
        layout,
        phases,
        root_phase: tables.root_phase,
    }
}

struct Cell<'a> {
    variant: Variant,
    is_root: bool,
    node: &'a RegisteredNode,
    record: &'a PhaseRecord,
}

const UPA_TX_SCHEDULED: &[K] = &[K::SchBcUpaTx, K::SchUcUpaTx, K::SchPpUpaTx];
const UPA_RX_SCHEDULED: &[K] = &[K::SchBcUpaRx, K::SchUcUpaRx, K::SchPpUpaRx];

const ALL_SCHEDULED: &[K] = &[
    K::SchEb,
    K::SchBc,
    K::SchUc,
    K::SchPpTx,
    K::SchPpRx,
    K::SchOdpTx,
    K::SchOdpRx,
    K::SchBcBstTx,
    K::SchBcBstRx,
    K::SchUcBstTx,
    K::SchUcBstRx,
    K::SchPpBstTx,
    K::SchPpBstRx,
    K::BcUpaTxTs,
    K::BcUpaRxTs,
    K::UcUpaTxTs,
    K::UcUpaRxTs,
    K::PpUpaTxTs,
    K::PpUpaRxTs,
];

/// `num / den * scale` rounded to `digits`, or not applicable on a zero denominator.
fn ratio(num: f64, den: f64, scale: f64, digits: usize) -> ResultValue {
    if den == 0.0 {
        return ResultValue::NotApplicable;
    }
    ResultValue::Float(round_to(num / den * scale, digits))
}

fn percent(num: f64, den: f64) -> ResultValue {
    ratio(num, den, 100.0, 2)
}

/// Share of `part` in `part + rest`, in percent
fn share(part: f64, rest: f64) -> ResultValue {
    percent(part, rest + part)
}

fn mean(sum: f64, count: u64, digits: usize) -> ResultValue {
    if count == 0 {
        return ResultValue::NotApplicable;
    }
    ResultValue::Float(round_to(sum / count as f64, digits))
}

impl Cell<'_> {
    fn m(&self, key: K) -> f64 {
        self.record.metrics.as_f64(key)
    }

    fn sum(&self, keys: &[K]) -> f64 {
        self.record.metrics.sum(keys)
    }

    /// Scheduled unused-cell slots plus the per-kind counters in `extra`
    fn upa_total(&self, scheduled: &[K], extra: [K; 3]) -> f64 {
        self.sum(scheduled) + self.sum(&extra)
    }

    fn uts(&self) -> f64 {
        self.upa_total(UPA_TX_SCHEDULED, [K::BcUpaTxTs, K::UcUpaTxTs, K::PpUpaTxTs])
    }

    fn uto(&self) -> f64 {
        self.upa_total(UPA_TX_SCHEDULED, [K::BcUpaTxOk, K::UcUpaTxOk, K::PpUpaTxOk])
    }

    fn urs(&self) -> f64 {
        self.upa_total(UPA_RX_SCHEDULED, [K::BcUpaRxTs, K::UcUpaRxTs, K::PpUpaRxTs])
    }

    fn uro(&self) -> f64 {
        self.upa_total(UPA_RX_SCHEDULED, [K::BcUpaRxOk, K::UcUpaRxOk, K::PpUpaRxOk])
    }

    /// Delivery ratio; undefined for the root, which only sinks traffic.
    fn delivery(&self, rx: f64, tx: f64) -> ResultValue {
        if self.is_root {
            return ResultValue::NotApplicable;
        }
        percent(rx, tx)
    }

    /// Average latency from firmware running sums
    fn counter_latency(&self, sum: f64, received: f64) -> ResultValue {
        if received == 0.0 {
            return ResultValue::NotApplicable;
        }
        ResultValue::Int(round_half_even(sum / received))
    }

    fn value(&self, column: ResultColumn) -> ResultValue {
        let metrics = &self.record.metrics;
        let latency = &self.record.latency;
        let slot_events = self.variant.latency_mode() == LatencyMode::SlotEvents;

        match column {
            Id => ResultValue::Int(i64::from(self.node.id)),
            Addr => ResultValue::Text(self.node.address.clone().unwrap_or_else(|| "0".to_string())),
            Boot => {
                let booted = metrics.get(K::ResetLog) == 1
                    && metrics.get(K::RsQExceptEb) == 0
                    && metrics.get(K::RsOpku) == 1;
                ResultValue::Int(i64::from(booted))
            }
            BootP => ResultValue::Int(i64::from(metrics.get(K::RsOpku) == 1)),
            Raw(_, key) => ResultValue::Int(metrics.get(key)),

            UPdr => self.delivery(self.m(K::RxUp), self.m(K::TxUp)),
            DPdr => self.delivery(self.m(K::RxDown), self.m(K::TxDown)),
            Pdr => self.delivery(
                self.sum(&[K::RxUp, K::RxDown]),
                self.sum(&[K::TxUp, K::TxDown]),
            ),

            ULt if slot_events => mean(latency.up_sum_ms, latency.up_count, 1),
            DLt if slot_events => mean(latency.down_sum_ms, latency.down_count, 1),
            Lt if slot_events => mean(
                latency.up_sum_ms + latency.down_sum_ms,
                latency.up_count + latency.down_count,
                1,
            ),
            ULt => self.counter_latency(self.m(K::LtUpSum), self.m(K::RxUp)),
            DLt => self.counter_latency(self.m(K::LtDownSum), self.m(K::RxDown)),
            Lt => self.counter_latency(
                self.sum(&[K::LtUpSum, K::LtDownSum]),
                self.sum(&[K::RxUp, K::RxDown]),
            ),
            MuLt => ResultValue::Int(latency.max_up_slots),
            MdLt => ResultValue::Int(latency.max_down_slots),

            AHopD => ratio(self.m(K::HopDSum), self.m(K::HopDCnt), 1.0, 2),
            AStn => ratio(self.m(K::SubtreeSum), self.m(K::SubtreeCnt), 1.0, 2),

            Ipqr => share(self.m(K::IpQloss), self.m(K::IpEnq)),
            Iplr => share(self.m(K::IpUcNoack), self.m(K::IpUcOk)),
            Iuqr => share(self.m(K::IpUdpQloss), self.m(K::IpUdpEnq)),
            Iulr => share(self.m(K::IpUcUdpNoack), self.m(K::IpUcUdpOk)),

            LinkE => ratio(
                self.sum(&[K::KaTx, K::IpUcTx]),
                self.sum(&[K::KaOk, K::IpUcOk]),
                1.0,
                2,
            ),
            DutyCycle => {
                let count = self.m(K::DcCount);
                if count == 0.0 {
                    return ResultValue::NotApplicable;
                }
                ResultValue::Float(round_to(self.m(K::DcTotalSum) / count / 100.0, 2))
            }
            TsL => mean(self.record.slot_length.sum_ms, self.record.slot_length.count, 2),

            Utc => ResultValue::Int(self.sum(UPA_TX_SCHEDULED) as i64),
            Uts => ResultValue::Int(self.uts() as i64),
            Utr => ResultValue::Int(
                self.upa_total(UPA_TX_SCHEDULED, [K::BcUpaTxRs, K::UcUpaTxRs, K::PpUpaTxRs]) as i64,
            ),
            Uto => ResultValue::Int(self.uto() as i64),
            Utu => ratio(self.uto(), self.uts(), 1.0, 2),
            Urc => ResultValue::Int(self.sum(UPA_RX_SCHEDULED) as i64),
            Urs => ResultValue::Int(self.urs() as i64),
            Urr => ResultValue::Int(
                self.upa_total(UPA_RX_SCHEDULED, [K::BcUpaRxRs, K::UcUpaRxRs, K::PpUpaRxRs]) as i64,
            ),
            Uro => ResultValue::Int(self.uro() as i64),
            Uru => ratio(self.uro(), self.urs(), 1.0, 2),
            Uu => ratio(self.uto() + self.uro(), self.uts() + self.urs(), 1.0, 2),

            Scr => percent(self.sum(ALL_SCHEDULED), self.m(K::AssoTs)),
            Ctor => percent(self.m(K::BcTxOp), self.m(K::SchBc)),
            Cror => percent(self.m(K::BcRxOp), self.m(K::SchBc)),
            Utor => percent(self.m(K::UcTxOp), self.m(K::SchUc)),
            Uror => percent(self.m(K::UcRxOp), self.m(K::SchUc)),
            Ptor => percent(self.m(K::PpTxOp), self.m(K::SchPpTx)),
            Pror => percent(self.m(K::PpRxOp), self.m(K::SchPpRx)),
            Btor => share(
                self.sum(&[K::UcBstTxOp, K::PpBstTxOp]),
                self.sum(&[K::UcTxOp, K::PpTxOp]),
            ),
            Bror => share(
                self.sum(&[K::UcBstRxOp, K::PpBstRxOp]),
                self.sum(&[K::UcRxOp, K::PpRxOp]),
            ),
            Otor => share(self.m(K::OdpTxOp), self.sum(&[K::UcTxOp, K::PpTxOp])),
            Oror => share(self.m(K::OdpRxOp), self.sum(&[K::UcRxOp, K::PpRxOp])),
            Etor => share(
                self.sum(&[K::UcUpaTxRs, K::PpUpaTxRs]),
                self.sum(&[K::UcTxOp, K::PpTxOp]),
            ),
            Eror => share(
                self.sum(&[K::UcUpaRxRs, K::PpUpaRxRs]),
                self.sum(&[K::UcRxOp, K::PpRxOp]),
            ),
            Efficiency(_, ok, attempts) => ratio(self.m(ok), self.m(attempts), 1.0, 2),
        }
    }
}
