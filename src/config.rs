use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::types::{NodeId, Variant};

/// Evaluation run configuration, usually loaded from YAML
///
/// ```yaml
/// variant: hk-v6
/// log_dir: runs/alice-3
/// scheduler: alice
/// iteration: "3"
/// header_id: 1
/// show_all: true
/// output:
///   result_file: result.txt
///   summary_file: summary.txt
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EvalConfig {
    #[serde(default = "default_variant")]
    pub variant: Variant,
    /// Directory holding the per-node log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<String>,
    /// Node whose log carries the registry header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_id: Option<NodeId>,
    /// Print the extended metric block
    #[serde(default)]
    pub show_all: bool,
    /// Slot duration used when no slot epochs are announced
    #[serde(default = "default_slot_len_ms")]
    pub default_slot_len_ms: f64,
    /// Explicit node set, used instead of header discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<DeclaredNodes>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Explicitly declared node set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclaredNodes {
    pub root: DeclaredNode,
    #[serde(default)]
    pub non_root: Vec<DeclaredNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclaredNode {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Report files written next to the console output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_result_file")]
    pub result_file: PathBuf,
    #[serde(default = "default_summary_file")]
    pub summary_file: PathBuf,
    /// Write `result_file` and `summary_file` for variants that produce them
    #[serde(default = "default_true")]
    pub write_files: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            result_file: default_result_file(),
            summary_file: default_summary_file(),
            write_files: true,
            json: None,
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            log_dir: default_log_dir(),
            scheduler: None,
            iteration: None,
            header_id: None,
            show_all: false,
            default_slot_len_ms: default_slot_len_ms(),
            nodes: None,
            output: OutputConfig::default(),
        }
    }
}

fn default_variant() -> Variant {
    Variant::Hk
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_slot_len_ms() -> f64 {
    10.0
}

fn default_result_file() -> PathBuf {
    PathBuf::from("result.txt")
}

fn default_summary_file() -> PathBuf {
    PathBuf::from("summary.txt")
}

fn default_true() -> bool {
    true
}

impl EvalConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.default_slot_len_ms.is_finite() || self.default_slot_len_ms <= 0.0 {
            return Err(ValidationError::InvalidTiming(format!(
                "default_slot_len_ms must be a positive number, got {}",
                self.default_slot_len_ms
            )));
        }

        match (&self.nodes, self.header_id) {
            (None, None) => {
                return Err(ValidationError::InvalidNodes(
                    "either header_id or a nodes section must be provided".to_string(),
                ));
            }
            (Some(nodes), _) => {
                if nodes.non_root.iter().any(|n| n.id == nodes.root.id) {
                    return Err(ValidationError::InvalidNodes(format!(
                        "root id {} is also listed as a non-root node",
                        nodes.root.id
                    )));
                }
            }
            (None, Some(_)) => {}
        }

        if let Some(scheduler) = &self.scheduler {
            if scheduler.is_empty() || scheduler.contains('/') {
                return Err(ValidationError::InvalidNaming(format!(
                    "scheduler name {:?} cannot be used in a file name",
                    scheduler
                )));
            }
        }
        if let Some(iteration) = &self.iteration {
            if iteration.is_empty() || iteration.contains('/') {
                return Err(ValidationError::InvalidNaming(format!(
                    "iteration {:?} cannot be used in a file name",
                    iteration
                )));
            }
        }

        if self.output.write_files && self.output.result_file == self.output.summary_file {
            return Err(ValidationError::InvalidOutput(
                "result_file and summary_file must differ".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid node configuration: {0}")]
    InvalidNodes(String),
    #[error("Invalid timing configuration: {0}")]
    InvalidTiming(String),
    #[error("Invalid log naming: {0}")]
    InvalidNaming(String),
    #[error("Invalid output configuration: {0}")]
    InvalidOutput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: EvalConfig = serde_yaml::from_str("header_id: 1\n").unwrap();
        assert_eq!(config.variant, Variant::Hk);
        assert_eq!(config.default_slot_len_ms, 10.0);
        assert_eq!(config.output.result_file, PathBuf::from("result.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_declared_nodes_yaml() {
        let yaml = r#"
variant: hckim
nodes:
  root: { id: 7, address: "3261" }
  non_root:
    - { id: 1 }
    - { id: 2, address: "b7a0" }
"#;
        let config: EvalConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.variant, Variant::Hckim);
        let nodes = config.nodes.as_ref().unwrap();
        assert_eq!(nodes.root.id, 7);
        assert_eq!(nodes.non_root.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let config = EvalConfig::default();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidNodes(_))));

        let config = EvalConfig {
            header_id: Some(1),
            default_slot_len_ms: 0.0,
            ..EvalConfig::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidTiming(_))));

        let config = EvalConfig {
            header_id: Some(1),
            scheduler: Some("a/b".to_string()),
            ..EvalConfig::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidNaming(_))));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_yaml::from_str::<EvalConfig>("header_id: 1\nbogus: 2\n").is_err());
    }
}
