//! # Node Registry
//!
//! Maps node ids and link-local address fragments to the row index used by
//! every per-node table. Index 0 is always the root; a non-root node's index
//! is its position in discovery order plus one.
//!
//! ## Sources
//!
//! The registry is discovered from a header section that firmware prints at
//! boot, in one of two forms:
//!
//! ```text
//! [INFO: App] HCK-NODE root 1 3261
//! [INFO: App] HCK-NODE non_root 2 b7a0
//! [INFO: App] HCK-NODE end
//! ```
//!
//! or one `[HK-N` line per node followed by an `end` body, in which case the
//! nodes are numbered `1..=n` with node 1 as the root. Alternatively a run's
//! configuration may declare the nodes explicitly.

use std::collections::HashMap;
use std::sync::LazyLock;

use color_eyre::eyre::{eyre, Context, Result};
use log::{debug, info, warn};
use regex::Regex;

use crate::analysis::error::ParseError;
use crate::analysis::types::NodeId;
use crate::config::{DeclaredNodes, EvalConfig};
use crate::utils::lines::open_log;
use crate::utils::naming::LogNaming;

/// Compiled patterns for registry discovery
pub struct HeaderPatterns {
    /// Match: "HCK-NODE root|non_root|non <id> <addr>"
    pub node_record: Regex,
    /// Match: "HCK-NODE end"
    pub node_end: Regex,
    /// Match: "Tentative link-local IPv6 address <addr>"
    pub link_local: Regex,
}

impl HeaderPatterns {
    pub fn new() -> Self {
        Self {
            node_record: Regex::new(r"HCK-NODE (root|non_root|non) (\d+) (\S+)")
                .expect("Invalid node_record regex"),
            node_end: Regex::new(r"HCK-NODE end\b").expect("Invalid node_end regex"),
            link_local: Regex::new(r"Tentative link-local IPv6 address (\S+)")
                .expect("Invalid link_local regex"),
        }
    }
}

impl Default for HeaderPatterns {
    fn default() -> Self {
        Self::new()
    }
}

pub static PATTERNS: LazyLock<HeaderPatterns> = LazyLock::new(HeaderPatterns::new);

/// A node known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredNode {
    pub id: NodeId,
    pub address: Option<String>,
}

/// Ordered node set of one run
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<RegisteredNode>,
    by_id: HashMap<NodeId, usize>,
    by_address: HashMap<String, usize>,
}

/// Registry discovery failures
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no root node announced in the header log")]
    NoRoot,
    #[error("header log announces a second root (ids {first} and {second})")]
    DuplicateRoot { first: NodeId, second: NodeId },
}

impl NodeRegistry {
    /// Create a registry containing only the root.
    pub fn with_root(id: NodeId, address: Option<String>) -> Self {
        let mut registry = Self {
            nodes: Vec::new(),
            by_id: HashMap::new(),
            by_address: HashMap::new(),
        };
        registry.push(RegisteredNode { id, address });
        registry
    }

    /// Append a non-root node at the next index.
    pub fn add_non_root(&mut self, id: NodeId, address: Option<String>) -> usize {
        self.push(RegisteredNode { id, address })
    }

    fn push(&mut self, node: RegisteredNode) -> usize {
        let index = self.nodes.len();
        self.by_id.entry(node.id).or_insert(index);
        if let Some(address) = &node.address {
            self.by_address.entry(address.clone()).or_insert(index);
        }
        self.nodes.push(node);
        index
    }

    /// Build from nodes declared in the run configuration.
    pub fn from_declared(declared: &DeclaredNodes) -> Self {
        let mut registry = Self::with_root(declared.root.id, declared.root.address.clone());
        for node in &declared.non_root {
            registry.add_non_root(node.id, node.address.clone());
        }
        registry
    }

    /// Discover the registry from the header section of a log.
    ///
    /// Stops at the first terminator. A missing terminator keeps whatever was
    /// collected.
    pub fn discover<I>(lines: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut root: Option<(NodeId, String)> = None;
        let mut non_root: Vec<(NodeId, String)> = Vec::new();
        let mut counted = 0u32;
        let mut terminated = false;

        for line in lines {
            if let Some(caps) = PATTERNS.node_record.captures(&line) {
                let Ok(id) = caps[2].parse::<NodeId>() else {
                    debug!("Skipping node record with unparsable id: {}", line);
                    continue;
                };
                let address = caps[3].to_string();
                if &caps[1] == "root" {
                    if let Some((first, _)) = &root {
                        return Err(RegistryError::DuplicateRoot { first: *first, second: id });
                    }
                    root = Some((id, address));
                } else {
                    non_root.push((id, address));
                }
                continue;
            }
            if PATTERNS.node_end.is_match(&line) {
                terminated = true;
                break;
            }
            if line.split(':').next() == Some("[HK-N") {
                match line.split("] ").nth(1).and_then(|body| body.split(' ').next()) {
                    Some("end") => {
                        terminated = true;
                        break;
                    }
                    Some(_) => counted += 1,
                    None => {}
                }
            }
        }

        if !terminated {
            warn!("Node header has no terminator; continuing with the nodes collected so far");
        }

        let registry = match root {
            Some((root_id, root_address)) => {
                let mut registry = Self::with_root(root_id, Some(root_address));
                for (id, address) in non_root {
                    registry.add_non_root(id, Some(address));
                }
                registry
            }
            None if counted > 0 => {
                let mut registry = Self::with_root(1, None);
                for id in 2..=counted {
                    registry.add_non_root(id, None);
                }
                registry
            }
            None => return Err(RegistryError::NoRoot),
        };
        debug!("Registry holds {} nodes", registry.len());
        Ok(registry)
    }

    /// Build the registry for a run: declared nodes win over the header log.
    pub fn load(config: &EvalConfig, naming: &LogNaming) -> Result<Self> {
        if let Some(declared) = &config.nodes {
            info!("Using {} declared nodes", declared.non_root.len() + 1);
            return Ok(Self::from_declared(declared));
        }

        let header_id = config
            .header_id
            .ok_or_else(|| eyre!("No header_id configured and no nodes declared"))?;
        let path = naming.path(header_id);
        info!("Discovering nodes from {}", path.display());

        let mut read_error = None;
        let lines = open_log(&path)?.map_while(|item| match item {
            Ok((_, text)) => Some(text),
            Err(e) => {
                read_error = Some(e);
                None
            }
        });
        let discovered = Self::discover(lines);
        if let Some(e) = read_error {
            return Err(e).with_context(|| format!("Failed to read header log: {}", path.display()));
        }
        discovered.with_context(|| format!("Failed to discover nodes from {}", path.display()))
    }

    /// Record a link-local address learned after discovery.
    pub fn set_address(&mut self, index: usize, address: String) {
        if let Some(node) = self.nodes.get_mut(index) {
            self.by_address.entry(address.clone()).or_insert(index);
            node.address = Some(address);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> &RegisteredNode {
        &self.nodes[0]
    }

    pub fn node(&self, index: usize) -> &RegisteredNode {
        &self.nodes[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &RegisteredNode)> {
        self.nodes.iter().enumerate()
    }

    /// Non-root nodes with their indices
    pub fn non_root(&self) -> impl Iterator<Item = (usize, &RegisteredNode)> {
        self.iter().skip(1)
    }

    pub fn index_of_id(&self, id: NodeId) -> Result<usize, ParseError> {
        self.by_id
            .get(&id)
            .copied()
            .ok_or(ParseError::UnknownNodeId { id })
    }

    pub fn index_of_address(&self, address: &str) -> Result<usize, ParseError> {
        self.by_address
            .get(address)
            .copied()
            .ok_or_else(|| ParseError::UnknownAddress {
                address: address.to_string(),
            })
    }
}

/// Extract the address fragment from a "Tentative link-local" boot line.
///
/// The fragment is the third `:`-separated group of the printed address.
pub fn link_local_fragment(line: &str) -> Option<String> {
    let caps = PATTERNS.link_local.captures(line)?;
    caps[1].split(':').nth(2).map(str::to_string)
}
