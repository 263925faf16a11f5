//! Phase-segmented metric evaluation of RPL/TSCH node logs.
//!
//! Logs are scanned into per-node, per-phase counter tables
//! ([`parse_all_logs`]), turned into result rows ([`evaluate`]) and rendered
//! by the [`report`] module.

pub mod derive;
pub mod error;
pub mod keys;
pub mod latency;
pub mod line;
pub mod log_parser;
pub mod report;
pub mod summary;
pub mod types;

pub use derive::{evaluate, Evaluation};
pub use error::ParseError;
pub use log_parser::{learn_addresses, parse_all_logs};
pub use report::{
    generate_json_report, generate_summary_report, generate_text_report, print_report,
    print_summary, JsonReport, RunInfo,
};
pub use summary::EvalSummary;
pub use types::*;
