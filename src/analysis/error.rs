//! Errors raised while interpreting log lines.

use super::types::NodeId;

/// A log line that cannot be applied to the tables
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("node id {id} is not in the node registry")]
    UnknownNodeId { id: NodeId },
    #[error("address {address} is not in the node registry")]
    UnknownAddress { address: String },
    #[error("key {key} has no companion token {companion}")]
    MissingCompanion { key: String, companion: String },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("hop count must be positive, got {hops}")]
    InvalidHops { hops: i64 },
    #[error("row {index} is outside the {rows} node rows")]
    RowOutOfRange { index: usize, rows: usize },
    #[error("scan of node row {owner} cannot write row {index}")]
    ForeignRow { index: usize, owner: usize },
}
