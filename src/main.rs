use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use log::info;

use rpl_logeval::analysis::{
    self, generate_json_report, generate_summary_report, generate_text_report, print_report,
    print_summary, EvalSummary, JsonReport, NodeId, RunInfo, Variant,
};
use rpl_logeval::config::EvalConfig;
use rpl_logeval::config_loader::{self, CliOverrides};
use rpl_logeval::registry::NodeRegistry;
use rpl_logeval::utils::LogNaming;

/// Phase-segmented metric evaluation for RPL/TSCH testbed node logs
#[derive(Parser, Debug)]
#[command(name = "rpl-logeval")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Scheduler name used in log file names
    scheduler: Option<String>,

    /// Iteration used in log file names
    iter: Option<String>,

    /// Node whose log carries the node header
    any_id: Option<NodeId>,

    /// Print the extended metric block (0 or 1)
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    show_all: Option<u8>,

    /// Path to an evaluation configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log format family
    #[arg(long, value_enum)]
    variant: Option<Variant>,

    /// Directory holding the node logs
    #[arg(short = 'd', long)]
    log_dir: Option<PathBuf>,

    /// Also write a JSON report to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Do not write result and summary files
    #[arg(long)]
    no_files: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            variant: self.variant,
            log_dir: self.log_dir.clone(),
            scheduler: self.scheduler.clone(),
            iteration: self.iter.clone(),
            header_id: self.any_id,
            show_all: self.show_all.map(|v| v == 1),
            json: self.json.clone(),
            no_files: self.no_files,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let mut config = match &cli.config {
        Some(path) => config_loader::read_config(path)?,
        None => EvalConfig::default(),
    };
    config_loader::apply_overrides(&mut config, &cli.overrides())?;

    let naming = LogNaming::new(
        &config.log_dir,
        config.scheduler.clone(),
        config.iteration.clone(),
    );
    let mut registry = NodeRegistry::load(&config, &naming)?;
    if config.variant == Variant::Hckim {
        analysis::learn_addresses(&mut registry, &naming)?;
    }
    info!(
        "Evaluating {} nodes ({} variant), root {}",
        registry.len(),
        config.variant,
        registry.root().id
    );

    let tables = analysis::parse_all_logs(&config, &registry, &naming)?;
    let evaluation = analysis::evaluate(&tables, &registry);
    let run = RunInfo::new(&config, &registry);
    print_report(&run, &evaluation, config.show_all);

    let summary = EvalSummary::from_tables(&tables);
    if let Some(summary) = &summary {
        if config.output.write_files {
            generate_text_report(&evaluation, &config.output.result_file)?;
            generate_summary_report(summary, &config.output.summary_file)?;
        }
        print_summary(summary);
    }

    if let Some(json_path) = &config.output.json {
        let report = JsonReport::new(&run, &evaluation, tables.flags, summary.as_ref());
        generate_json_report(&report, json_path)?;
    }

    Ok(())
}
