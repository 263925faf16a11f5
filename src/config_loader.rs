use crate::analysis::types::{NodeId, Variant};
use crate::config::EvalConfig;
use color_eyre::eyre::{Context, Result};
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<EvalConfig> {
    let config = read_config(config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse a YAML configuration without validating it.
///
/// Used when command-line overrides complete the file before validation.
pub fn read_config(config_path: &Path) -> Result<EvalConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config file: {}", config_path.display()))?;

    serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
}

/// Command-line values that override the YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub variant: Option<Variant>,
    pub log_dir: Option<PathBuf>,
    pub scheduler: Option<String>,
    pub iteration: Option<String>,
    pub header_id: Option<NodeId>,
    pub show_all: Option<bool>,
    pub json: Option<PathBuf>,
    pub no_files: bool,
}

/// Apply CLI overrides to a configuration and re-validate it
pub fn apply_overrides(config: &mut EvalConfig, overrides: &CliOverrides) -> Result<()> {
    if let Some(variant) = overrides.variant {
        config.variant = variant;
    }
    if let Some(dir) = &overrides.log_dir {
        config.log_dir = dir.clone();
    }
    if let Some(scheduler) = &overrides.scheduler {
        config.scheduler = Some(scheduler.clone());
    }
    if let Some(iteration) = &overrides.iteration {
        config.iteration = Some(iteration.clone());
    }
    if let Some(id) = overrides.header_id {
        config.header_id = Some(id);
    }
    if let Some(show_all) = overrides.show_all {
        config.show_all = show_all;
    }
    if let Some(json) = &overrides.json {
        config.output.json = Some(json.clone());
    }
    if overrides.no_files {
        config.output.write_files = false;
    }

    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "variant: hk-v6\nheader_id: 4\nshow_all: true").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.variant, Variant::HkV6);
        assert_eq!(config.header_id, Some(4));
        assert!(config.show_all);
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "variant: hk\n").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_read_config_defers_validation() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "variant: hckim").unwrap();

        let mut config = read_config(file.path()).unwrap();
        assert!(config.validate().is_err());

        let overrides = CliOverrides {
            header_id: Some(3),
            ..CliOverrides::default()
        };
        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.variant, Variant::Hckim);
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = EvalConfig {
            header_id: Some(1),
            ..EvalConfig::default()
        };
        let overrides = CliOverrides {
            variant: Some(Variant::HkV6),
            scheduler: Some("alice".to_string()),
            iteration: Some("2".to_string()),
            show_all: Some(true),
            no_files: true,
            ..CliOverrides::default()
        };
        apply_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.variant, Variant::HkV6);
        assert_eq!(config.scheduler.as_deref(), Some("alice"));
        assert!(config.show_all);
        assert!(!config.output.write_files);
    }
}
