//! Closed vocabulary of metric keys found in node logs.
//!
//! Every key any supported log format can carry is a `MetricKey` variant with a
//! fixed storage slot. Each evaluation variant then selects the subset it
//! recognizes through a [`Vocabulary`] mask.

macro_rules! metric_keys {
    ($($variant:ident => $token:literal),+ $(,)?) => {
        /// A raw counter or state value carried by a log line.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MetricKey {
            $($variant),+
        }

        impl MetricKey {
            /// All keys, in slot order.
            pub const ALL: &'static [MetricKey] = &[$(MetricKey::$variant),+];

            /// Number of storage slots in a metric row.
            pub const COUNT: usize = Self::ALL.len();

            /// The token used for this key in log lines.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(MetricKey::$variant => $token),+
                }
            }

            /// Resolve a log token to a key.
            pub fn from_token(token: &str) -> Option<Self> {
                match token {
                    $($token => Some(MetricKey::$variant),)+
                    _ => None,
                }
            }

            /// Storage slot of this key within a metric row.
            pub fn slot(self) -> usize {
                self as usize
            }
        }
    };
}

metric_keys! {
    // Phase control and evaluation configuration
    ResetLog => "reset_log",
    ResetEval => "reset_eval",
    LoggingDisrupted => "logging_disrupted",
    FixedTopology => "fixed_topology",
    LiteLog => "lite_log",
    TrafficLoad => "traffic_load",
    DownTrafficLoad => "down_traffic_load",
    AppPayloadLen => "app_payload_len",
    SlotLen => "slot_len",
    UcsfPeriod => "ucsf_period",
    WithUpa => "with_upa",
    WithSla => "with_sla",
    SlaK => "sla_k",
    WithDbt => "with_dbt",
    WithA3 => "with_a3",
    A3MaxZone => "a3_max_zone",

    // Bootstrap state
    RsQExceptEb => "rs_q_except_eb",
    RsOpku => "rs_opku",
    RsQ => "rs_q",
    Opku => "opku",

    // Application traffic
    TxUp => "tx_up",
    RxUp => "rx_up",
    LtUpSum => "lt_up_sum",
    TxDown => "tx_down",
    RxDown => "rx_down",
    LtDownSum => "lt_down_sum",

    // Forwarding and IP unicast
    FwdOk => "fwd_ok",
    FwdNoNexthop => "fwd_no_nexthop",
    FwdErr => "fwd_err",
    IpUcTx => "ip_uc_tx",
    IpUcOk => "ip_uc_ok",
    IpUcNoack => "ip_uc_noack",
    IpUcErr => "ip_uc_err",
    IpUcIcmp6Tx => "ip_uc_icmp6_tx",
    IpUcIcmp6Ok => "ip_uc_icmp6_ok",
    IpUcIcmp6Noack => "ip_uc_icmp6_noack",
    IpUcIcmp6Err => "ip_uc_icmp6_err",
    IpUcUdpTx => "ip_uc_udp_tx",
    IpUcUdpOk => "ip_uc_udp_ok",
    IpUcUdpNoack => "ip_uc_udp_noack",
    IpUcUdpErr => "ip_uc_udp_err",

    // Association
    Asso => "asso",
    AssoTs => "asso_ts",
    Leaving => "leaving",
    LeaveTime => "leave_time",

    // Enhanced beacons and keep-alives
    EbQloss => "eb_qloss",
    EbEnq => "eb_enq",
    EbOk => "eb_ok",
    EbNoack => "eb_noack",
    EbErr => "eb_err",
    KaSend => "ka_send",
    KaQloss => "ka_qloss",
    KaEnq => "ka_enq",
    KaTx => "ka_tx",
    KaOk => "ka_ok",
    KaNoack => "ka_noack",
    KaErr => "ka_err",

    // IP queueing
    IpQloss => "ip_qloss",
    IpEnq => "ip_enq",
    IpOk => "ip_ok",
    IpNoack => "ip_noack",
    IpErr => "ip_err",
    IpIcmp6Qloss => "ip_icmp6_qloss",
    IpIcmp6Enq => "ip_icmp6_enq",
    IpIcmp6Ok => "ip_icmp6_ok",
    IpIcmp6Noack => "ip_icmp6_noack",
    IpIcmp6Err => "ip_icmp6_err",
    IpUdpQloss => "ip_udp_qloss",
    IpUdpEnq => "ip_udp_enq",
    IpUdpOk => "ip_udp_ok",
    IpUdpNoack => "ip_udp_noack",
    IpUdpErr => "ip_udp_err",

    // Input queue
    InputFull => "input_full",
    InputAvail => "input_avail",
    DequeuedFull => "dequeued_full",
    DequeuedAvail => "dequeued_avail",
    EDrop => "e_drop",

    // Scheduled cells
    SchEb => "sch_eb",
    SchBc => "sch_bc",
    SchUc => "sch_uc",
    SchPpTx => "sch_pp_tx",
    SchPpRx => "sch_pp_rx",
    SchOdpTx => "sch_odp_tx",
    SchOdpRx => "sch_odp_rx",
    SchBcBstTx => "sch_bc_bst_tx",
    SchBcBstRx => "sch_bc_bst_rx",
    SchUcBstTx => "sch_uc_bst_tx",
    SchUcBstRx => "sch_uc_bst_rx",
    SchPpBstTx => "sch_pp_bst_tx",
    SchPpBstRx => "sch_pp_bst_rx",
    SchBcUpaTx => "sch_bc_upa_tx",
    SchBcUpaRx => "sch_bc_upa_rx",
    SchUcUpaTx => "sch_uc_upa_tx",
    SchUcUpaRx => "sch_uc_upa_rx",
    SchPpUpaTx => "sch_pp_upa_tx",
    SchPpUpaRx => "sch_pp_upa_rx",

    // Cell operations
    EbTxOp => "eb_tx_op",
    EbRxOp => "eb_rx_op",
    BcTxOp => "bc_tx_op",
    BcRxOp => "bc_rx_op",
    UcTxOp => "uc_tx_op",
    UcRxOp => "uc_rx_op",
    PpTxOp => "pp_tx_op",
    PpRxOp => "pp_rx_op",
    OdpTxOp => "odp_tx_op",
    OdpRxOp => "odp_rx_op",
    BcBstTxOp => "bc_bst_tx_op",
    BcBstRxOp => "bc_bst_rx_op",
    UcBstTxOp => "uc_bst_tx_op",
    UcBstRxOp => "uc_bst_rx_op",
    PpBstTxOp => "pp_bst_tx_op",
    PpBstRxOp => "pp_bst_rx_op",

    // Unused-cell utilization (UPA)
    BcUpaTxRs => "bc_upa_tx_rs",
    BcUpaRxRs => "bc_upa_rx_rs",
    UcUpaTxRs => "uc_upa_tx_rs",
    UcUpaRxRs => "uc_upa_rx_rs",
    PpUpaTxRs => "pp_upa_tx_rs",
    PpUpaRxRs => "pp_upa_rx_rs",
    BcUpaTxOk => "bc_upa_tx_ok",
    BcUpaRxOk => "bc_upa_rx_ok",
    UcUpaTxOk => "uc_upa_tx_ok",
    UcUpaRxOk => "uc_upa_rx_ok",
    PpUpaTxOk => "pp_upa_tx_ok",
    PpUpaRxOk => "pp_upa_rx_ok",
    BcUpaTxTs => "bc_upa_tx_ts",
    BcUpaRxTs => "bc_upa_rx_ts",
    UcUpaTxTs => "uc_upa_tx_ts",
    UcUpaRxTs => "uc_upa_rx_ts",
    PpUpaTxTs => "pp_upa_tx_ts",
    PpUpaRxTs => "pp_upa_rx_ts",

    // RPL
    Ps => "ps",
    LastP => "lastP",
    LocalRepair => "local_repair",
    DisSend => "dis_send",
    DioUSend => "dioU_send",
    DioMSend => "dioM_send",
    DaoPSend => "daoP_send",
    DaoNSend => "daoN_send",
    DaoPFwd => "daoP_fwd",
    DaoNFwd => "daoN_fwd",
    DaoASend => "daoA_send",
    HopDNow => "hopD_now",
    HopDSum => "hopD_sum",
    HopDCnt => "hopD_cnt",
    Rdt => "rdt",
    SubtreeNow => "subtree_now",
    SubtreeSum => "subtree_sum",
    SubtreeCnt => "subtree_cnt",

    // Duty cycle
    DcCount => "dc_count",
    DcTxSum => "dc_tx_sum",
    DcRxSum => "dc_rx_sum",
    DcTotalSum => "dc_total_sum",

    // Single-pair HCK records
    Txu => "txu",
    Rxu => "rxu",
    Txd => "txd",
    Rxd => "rxd",
    DisO => "dis_o",
    DioO => "dio_o",
    DaoO => "dao_o",
    DaoAO => "daoA_o",
    Child => "child",
    Fwo => "fwo",
    Qloss => "qloss",
    Enq => "enq",
    EbQl => "EBql",
    EbEnqCount => "EBenq",
    Noack => "noack",
    Ok => "ok",
    Dc => "dc",
}

/// Keys shared by the `[HK-P` formats, from application traffic onwards.
const HK_COMMON: &[MetricKey] = &[
    MetricKey::TxUp,
    MetricKey::RxUp,
    MetricKey::TxDown,
    MetricKey::RxDown,
    MetricKey::FwdOk,
    MetricKey::FwdNoNexthop,
    MetricKey::FwdErr,
    MetricKey::IpUcTx,
    MetricKey::IpUcOk,
    MetricKey::IpUcNoack,
    MetricKey::IpUcErr,
    MetricKey::IpUcIcmp6Tx,
    MetricKey::IpUcIcmp6Ok,
    MetricKey::IpUcIcmp6Noack,
    MetricKey::IpUcIcmp6Err,
    MetricKey::IpUcUdpTx,
    MetricKey::IpUcUdpOk,
    MetricKey::IpUcUdpNoack,
    MetricKey::IpUcUdpErr,
    MetricKey::Asso,
    MetricKey::AssoTs,
    MetricKey::Leaving,
    MetricKey::LeaveTime,
    MetricKey::EbQloss,
    MetricKey::EbEnq,
    MetricKey::EbOk,
    MetricKey::EbNoack,
    MetricKey::EbErr,
    MetricKey::KaSend,
    MetricKey::KaQloss,
    MetricKey::KaEnq,
    MetricKey::KaTx,
    MetricKey::KaOk,
    MetricKey::KaNoack,
    MetricKey::KaErr,
    MetricKey::IpQloss,
    MetricKey::IpEnq,
    MetricKey::IpOk,
    MetricKey::IpNoack,
    MetricKey::IpErr,
    MetricKey::IpIcmp6Qloss,
    MetricKey::IpIcmp6Enq,
    MetricKey::IpIcmp6Ok,
    MetricKey::IpIcmp6Noack,
    MetricKey::IpIcmp6Err,
    MetricKey::IpUdpQloss,
    MetricKey::IpUdpEnq,
    MetricKey::IpUdpOk,
    MetricKey::IpUdpNoack,
    MetricKey::IpUdpErr,
    MetricKey::InputFull,
    MetricKey::InputAvail,
    MetricKey::DequeuedFull,
    MetricKey::DequeuedAvail,
    MetricKey::EDrop,
    MetricKey::SchEb,
    MetricKey::SchBc,
    MetricKey::SchUc,
    MetricKey::SchPpTx,
    MetricKey::SchPpRx,
    MetricKey::SchOdpTx,
    MetricKey::SchOdpRx,
    MetricKey::SchBcBstTx,
    MetricKey::SchBcBstRx,
    MetricKey::SchUcBstTx,
    MetricKey::SchUcBstRx,
    MetricKey::SchPpBstTx,
    MetricKey::SchPpBstRx,
    MetricKey::SchBcUpaTx,
    MetricKey::SchBcUpaRx,
    MetricKey::SchUcUpaTx,
    MetricKey::SchUcUpaRx,
    MetricKey::SchPpUpaTx,
    MetricKey::SchPpUpaRx,
    MetricKey::EbTxOp,
    MetricKey::EbRxOp,
    MetricKey::BcTxOp,
    MetricKey::BcRxOp,
    MetricKey::UcTxOp,
    MetricKey::UcRxOp,
    MetricKey::PpTxOp,
    MetricKey::PpRxOp,
    MetricKey::OdpTxOp,
    MetricKey::OdpRxOp,
    MetricKey::BcBstTxOp,
    MetricKey::BcBstRxOp,
    MetricKey::UcBstTxOp,
    MetricKey::UcBstRxOp,
    MetricKey::PpBstTxOp,
    MetricKey::PpBstRxOp,
    MetricKey::BcUpaTxRs,
    MetricKey::BcUpaRxRs,
    MetricKey::UcUpaTxRs,
    MetricKey::UcUpaRxRs,
    MetricKey::PpUpaTxRs,
    MetricKey::PpUpaRxRs,
    MetricKey::BcUpaTxOk,
    MetricKey::BcUpaRxOk,
    MetricKey::UcUpaTxOk,
    MetricKey::UcUpaRxOk,
    MetricKey::PpUpaTxOk,
    MetricKey::PpUpaRxOk,
    MetricKey::BcUpaTxTs,
    MetricKey::BcUpaRxTs,
    MetricKey::UcUpaTxTs,
    MetricKey::UcUpaRxTs,
    MetricKey::PpUpaTxTs,
    MetricKey::PpUpaRxTs,
    MetricKey::Ps,
    MetricKey::LastP,
    MetricKey::LocalRepair,
    MetricKey::DisSend,
    MetricKey::DioUSend,
    MetricKey::DioMSend,
    MetricKey::DaoPSend,
    MetricKey::DaoNSend,
    MetricKey::DaoPFwd,
    MetricKey::DaoNFwd,
    MetricKey::DaoASend,
    MetricKey::HopDNow,
    MetricKey::HopDSum,
    MetricKey::HopDCnt,
    MetricKey::Rdt,
    MetricKey::SubtreeNow,
    MetricKey::SubtreeSum,
    MetricKey::SubtreeCnt,
    MetricKey::DcCount,
    MetricKey::DcTxSum,
    MetricKey::DcRxSum,
    MetricKey::DcTotalSum,
];

const HK_ONLY: &[MetricKey] = &[
    MetricKey::ResetLog,
    MetricKey::RsQExceptEb,
    MetricKey::RsOpku,
    MetricKey::LtUpSum,
    MetricKey::LtDownSum,
];

const HK_V6_ONLY: &[MetricKey] = &[
    MetricKey::LoggingDisrupted,
    MetricKey::FixedTopology,
    MetricKey::LiteLog,
    MetricKey::TrafficLoad,
    MetricKey::DownTrafficLoad,
    MetricKey::AppPayloadLen,
    MetricKey::SlotLen,
    MetricKey::UcsfPeriod,
    MetricKey::WithUpa,
    MetricKey::WithSla,
    MetricKey::SlaK,
    MetricKey::WithDbt,
    MetricKey::WithA3,
    MetricKey::A3MaxZone,
    MetricKey::ResetEval,
    MetricKey::RsOpku,
    MetricKey::RsQ,
    MetricKey::Opku,
];

const HCKIM_KEYS: &[MetricKey] = &[
    MetricKey::Txu,
    MetricKey::Rxu,
    MetricKey::Txd,
    MetricKey::Rxd,
    MetricKey::DisO,
    MetricKey::DioO,
    MetricKey::DaoO,
    MetricKey::DaoAO,
    MetricKey::Ps,
    MetricKey::LastP,
    MetricKey::Child,
    MetricKey::Fwo,
    MetricKey::Qloss,
    MetricKey::Enq,
    MetricKey::EbQl,
    MetricKey::EbEnqCount,
    MetricKey::Noack,
    MetricKey::Ok,
    MetricKey::Dc,
];

/// The set of keys a log format records; everything else is ignored.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    recognized: Vec<bool>,
}

impl Vocabulary {
    fn from_groups(groups: &[&[MetricKey]]) -> Self {
        let mut recognized = vec![false; MetricKey::COUNT];
        for key in groups.iter().flat_map(|group| group.iter()) {
            recognized[key.slot()] = true;
        }
        Self { recognized }
    }

    /// Vocabulary of the bootstrap/data `[HK-P` format.
    pub fn hk() -> Self {
        Self::from_groups(&[HK_ONLY, HK_COMMON])
    }

    /// Vocabulary of the three-phase `[HK-P` format.
    pub fn hk_v6() -> Self {
        Self::from_groups(&[HK_V6_ONLY, HK_COMMON])
    }

    /// Vocabulary of single-pair `HCK` records.
    pub fn hckim() -> Self {
        Self::from_groups(&[HCKIM_KEYS])
    }

    pub fn contains(&self, key: MetricKey) -> bool {
        self.recognized[key.slot()]
    }

    pub fn len(&self) -> usize {
        self.recognized.iter().filter(|r| **r).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
