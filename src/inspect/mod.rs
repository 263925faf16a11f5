//! # TSCH log inspection
//!
//! Single-purpose analyses over the slot-level event lines a node prints
//! for every scheduled cell:
//!
//! ```text
//! [INFO: TSCH      ] {asn 00.0000a3f1 link  0  17  1  0 ch 20} uc-1-0 tx st 0 idle 1840,22 a_seq 4
//! ```
//!
//! - [`residue`]: mean idle (residue) time per cell case
//! - [`neighbors`]: distinct link-layer senders heard per node
//! - [`queue`]: unicast queue additions and frees over time
//! - [`slot_timing`]: per-length timing of single frames and packet trains
//! - [`slot_efficiency`]: slots spent per packet train

use std::sync::LazyLock;

use regex::Regex;

pub mod neighbors;
pub mod queue;
pub mod residue;
pub mod slot_efficiency;
pub mod slot_timing;

/// Compiled patterns for slot event lines
pub struct SlotEventPatterns {
    /// Match: "] {asn ...} <contents>"
    pub asn_event: Regex,
    /// Match: "rx LL-<hex sender>-"
    pub link_sender: Regex,
}

impl SlotEventPatterns {
    pub fn new() -> Self {
        Self {
            asn_event: Regex::new(r"^[^\]]*\] \{asn [^}]*\} (.*)$").expect("Invalid asn_event regex"),
            link_sender: Regex::new(r"rx LL-([0-9a-fA-F]+)-").expect("Invalid link_sender regex"),
        }
    }
}

impl Default for SlotEventPatterns {
    fn default() -> Self {
        Self::new()
    }
}

pub static PATTERNS: LazyLock<SlotEventPatterns> = LazyLock::new(SlotEventPatterns::new);

/// Space-separated contents of a `{asn ...}` event line.
pub fn asn_event_contents(line: &str) -> Option<Vec<&str>> {
    let caps = PATTERNS.asn_event.captures(line)?;
    caps.get(1).map(|m| m.as_str().split(' ').collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asn_event_contents() {
        let line = "[INFO: TSCH      ] {asn 00.0000a3f1 link  0  17  1  0 ch 20} uc-1-0 tx st 0 idle 1840,22";
        let contents = asn_event_contents(line).unwrap();
        assert_eq!(contents[..3], ["uc-1-0", "tx", "st"]);

        assert!(asn_event_contents("[INFO: TSCH] scheduling cell").is_none());
        assert!(asn_event_contents("[INFO: App] rx {asn 1} x").is_none());
    }
}
