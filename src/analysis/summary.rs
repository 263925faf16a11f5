//! Run configuration echoed by the root and health checks over the data period.

use serde::Serialize;

use super::keys::MetricKey as K;
use super::types::{PhaseTables, Variant};

/// Firmware configuration and run health of an `hk-v6` evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvalSummary {
    pub fixed_topology: i64,
    pub lite_log: i64,
    pub traffic_load: i64,
    pub down_traffic_load: i64,
    pub app_payload_len: i64,
    pub slot_len: i64,
    pub ucsf_period: i64,
    pub with_upa: bool,
    pub with_sla: bool,
    pub sla_k: i64,
    pub with_dbt: i64,
    pub with_a3: i64,
    pub a3_max_zone: i64,
    /// No non-root node skipped a sequence number during the data period
    pub continuity: bool,
    /// Every non-root node ended the data period with a preferred parent
    pub boot_parent: bool,
    /// No non-root node needed more than one association attempt
    pub boot_queue: bool,
}

impl EvalSummary {
    /// Summarize a run. Only `hk-v6` runs carry the configuration echo.
    pub fn from_tables(tables: &PhaseTables) -> Option<Self> {
        if tables.variant != Variant::HkV6 {
            return None;
        }
        let config = &tables.record(0, 0).metrics;
        let data = tables.variant.phases().len() - 1;

        let non_root = tables.nodes.iter().skip(1).map(|n| &n.phases[data].metrics);
        let (mut continuity, mut boot_parent, mut boot_queue) = (true, true, true);
        for metrics in non_root {
            continuity &= metrics.get(K::LoggingDisrupted) != 1;
            boot_parent &= metrics.get(K::Opku) != 0;
            boot_queue &= metrics.get(K::RsQ) <= 1;
        }

        Some(Self {
            fixed_topology: config.get(K::FixedTopology),
            lite_log: config.get(K::LiteLog),
            traffic_load: config.get(K::TrafficLoad),
            down_traffic_load: config.get(K::DownTrafficLoad),
            app_payload_len: config.get(K::AppPayloadLen),
            slot_len: config.get(K::SlotLen),
            ucsf_period: config.get(K::UcsfPeriod),
            with_upa: tables.flags.upa,
            with_sla: tables.flags.sla,
            sla_k: config.get(K::SlaK),
            with_dbt: config.get(K::WithDbt),
            with_a3: config.get(K::WithA3),
            a3_max_zone: config.get(K::A3MaxZone),
            continuity,
            boot_parent,
            boot_queue,
        })
    }

    /// `NAME: value` lines as printed and written to the summary file.
    pub fn lines(&self) -> Vec<String> {
        let flag = |b: bool| i64::from(b);
        vec![
            format!("FIXED_TOPOLOGY: {}", self.fixed_topology),
            format!("LITE_LOG: {}", self.lite_log),
            format!("TRAFFIC_LOAD: {}", self.traffic_load),
            format!("DOWN_TRAFFIC_LOAD: {}", self.down_traffic_load),
            format!("APP_PAYLOAD_LEN: {}", self.app_payload_len),
            format!("SLOT_LEN: {}", self.slot_len),
            format!("UCSF_PERIOD: {}", self.ucsf_period),
            format!("WITH_UPA: {}", flag(self.with_upa)),
            format!("WITH_SLA: {} (k: {})", flag(self.with_sla), self.sla_k),
            format!("WITH_DBT: {}", self.with_dbt),
            format!("WITH_A3: {} (max zone: {})", self.with_a3, self.a3_max_zone),
            format!("Continuity: {}", flag(self.continuity)),
            format!("BootP: {}", flag(self.boot_parent)),
            format!("BootQ: {}", flag(self.boot_queue)),
        ]
    }
}
