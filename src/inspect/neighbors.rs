//! Distinct link-layer senders heard by each node.

use std::collections::BTreeSet;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use rayon::prelude::*;

use super::PATTERNS;
use crate::analysis::types::NodeId;
use crate::registry::NodeRegistry;
use crate::utils::lines::open_log;
use crate::utils::naming::LogNaming;

/// Sender id of an `rx LL-<hex>-...` line
pub fn link_sender(line: &str) -> Option<u64> {
    let caps = PATTERNS.link_sender.captures(line)?;
    u64::from_str_radix(&caps[1], 16).ok()
}

/// Set of senders heard in one node's log.
pub fn heard_senders(path: &Path) -> Result<BTreeSet<u64>> {
    let mut senders = BTreeSet::new();
    for item in open_log(path)? {
        let (_, text) = item.with_context(|| format!("Failed to read log file: {}", path.display()))?;
        if let Some(sender) = link_sender(&text) {
            senders.insert(sender);
        }
    }
    Ok(senders)
}

/// Neighbour count of every node, root first.
pub fn neighbor_counts(registry: &NodeRegistry, naming: &LogNaming) -> Result<Vec<(NodeId, usize)>> {
    let ids: Vec<NodeId> = registry.iter().map(|(_, node)| node.id).collect();
    ids.into_par_iter()
        .map(|id| -> Result<(NodeId, usize)> {
            let senders = heard_senders(&naming.path(id))?;
            log::debug!("Node {} heard {:?}", id, senders);
            Ok((id, senders.len()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_link_sender() {
        assert_eq!(link_sender("[INFO: TSCH] rx LL-000a-0-1 len 40"), Some(10));
        assert_eq!(link_sender("[INFO: TSCH] tx LL-000a-0-1"), None);
    }

    #[test]
    fn test_senders_are_counted_once() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[INFO: TSCH] rx LL-0002-0 a\n[INFO: TSCH] rx LL-0003-0 b\n[INFO: TSCH] rx LL-0002-0 c"
        )
        .unwrap();

        let senders = heard_senders(file.path()).unwrap();
        assert_eq!(senders.into_iter().collect::<Vec<_>>(), vec![2, 3]);
    }
}
