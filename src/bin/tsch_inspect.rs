//! Slot-level inspection CLI for TSCH node logs.
//!
//! Complements `rpl-logeval` with single-purpose analyses over the per-cell
//! event lines: residue (idle) time per cell case, neighbour counts,
//! unicast queue traces, in-slot timing and slot efficiency of packet trains.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};

use rpl_logeval::analysis::report::format_value;
use rpl_logeval::analysis::NodeId;
use rpl_logeval::config::EvalConfig;
use rpl_logeval::inspect::queue::{self, QueueReportPaths, DEFAULT_SLOTFRAME_LEN};
use rpl_logeval::inspect::slot_efficiency::{self, EfficiencyMode};
use rpl_logeval::inspect::slot_timing::{self, TimingMode, MAX_TIMING_PACKETS};
use rpl_logeval::inspect::{neighbors, residue};
use rpl_logeval::registry::NodeRegistry;
use rpl_logeval::utils::LogNaming;

const SEPARATOR: &str = " \t";

#[derive(Parser)]
#[command(name = "tsch-inspect")]
#[command(about = "Slot-level inspection of TSCH node logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the node logs
    #[arg(short = 'd', long, default_value = ".")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Mean residue (idle) time per cell case in the data period
    Residue {
        scheduler: String,
        iter: String,
        /// Node whose log carries the node header
        any_id: NodeId,
    },

    /// Number of distinct link-layer senders heard by each node
    Neighbors {
        scheduler: String,
        iter: String,
        /// Node whose log carries the node header
        any_id: NodeId,
    },

    /// Unicast queue additions and frees of one node
    Queue {
        iter: String,
        id: NodeId,

        /// Slots per slotframe for the per-slotframe summaries
        #[arg(long, default_value_t = DEFAULT_SLOTFRAME_LEN)]
        slotframe_len: i64,

        /// Output directory for the queue tables
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// In-slot timing per frame length from one node's log
    SlotTiming {
        #[arg(value_enum)]
        mode: TimingMode,
        iter: String,
        id: NodeId,

        /// Frames per train to record (ep and upa modes)
        #[arg(short, long, default_value_t = 1)]
        packets: usize,

        /// Scheduler qualifier of the log file name
        #[arg(short, long)]
        scheduler: Option<String>,
    },

    /// Slots used per packet train by frame length and train size
    SlotEfficiency {
        #[arg(value_enum)]
        mode: EfficiencyMode,
        iter: String,
        id: NodeId,

        /// Scheduler qualifier of the log file name
        #[arg(short, long)]
        scheduler: Option<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Residue {
            scheduler,
            iter,
            any_id,
        } => {
            let naming = LogNaming::new(&cli.log_dir, Some(scheduler), Some(iter));
            let registry = load_registry(&naming, any_id)?;
            print_residue(&residue::residue_times(&registry, &naming)?);
        }
        Commands::Neighbors {
            scheduler,
            iter,
            any_id,
        } => {
            let naming = LogNaming::new(&cli.log_dir, Some(scheduler), Some(iter));
            let registry = load_registry(&naming, any_id)?;
            println!("id{}neighbors", SEPARATOR);
            for (id, count) in neighbors::neighbor_counts(&registry, &naming)? {
                println!("{}{}{}", id, SEPARATOR, count);
            }
        }
        Commands::Queue {
            iter,
            id,
            slotframe_len,
            output,
        } => {
            if slotframe_len <= 0 {
                bail!("Slotframe length must be positive, got {}", slotframe_len);
            }
            let naming = LogNaming::new(&cli.log_dir, None, Some(iter.clone()));
            let events = queue::queue_events(&naming.path(id))?;

            fs::create_dir_all(&output).with_context(|| {
                format!("Failed to create output directory: {}", output.display())
            })?;
            let paths = QueueReportPaths::new(&output, &iter, &id.to_string());
            queue::write_queue_reports(&events, &paths, slotframe_len)?;
        }
        Commands::SlotTiming {
            mode,
            iter,
            id,
            packets,
            scheduler,
        } => {
            if mode != TimingMode::Regular && !(1..=MAX_TIMING_PACKETS).contains(&packets) {
                bail!(
                    "Train size must be between 1 and {}, got {}",
                    MAX_TIMING_PACKETS,
                    packets
                );
            }
            let naming = LogNaming::new(&cli.log_dir, scheduler, Some(iter));
            let table = slot_timing::slot_timing(&naming.path(id), mode, packets)?;
            for line in table.lines(SEPARATOR) {
                println!("{}", line);
            }
        }
        Commands::SlotEfficiency {
            mode,
            iter,
            id,
            scheduler,
        } => {
            let naming = LogNaming::new(&cli.log_dir, scheduler, Some(iter));
            let table = slot_efficiency::slot_efficiency(&naming.path(id), mode)?;
            let lines = match mode {
                EfficiencyMode::Ep => table.slot_lines(SEPARATOR),
                EfficiencyMode::Upa => table.report_lines(SEPARATOR),
            };
            for line in lines {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn load_registry(naming: &LogNaming, header_id: NodeId) -> Result<NodeRegistry> {
    let config = EvalConfig {
        header_id: Some(header_id),
        ..EvalConfig::default()
    };
    NodeRegistry::load(&config, naming)
}

fn print_residue(tallies: &[(NodeId, residue::ResidueTally)]) {
    println!("----- Cases -----");
    let header: Vec<&str> = residue::ResidueCase::ALL.iter().map(|c| c.name()).collect();
    println!("id{}{}", SEPARATOR, header.join(SEPARATOR));
    for (id, tally) in tallies {
        let cells: Vec<String> = tally.means().iter().map(format_value).collect();
        println!("{}{}{}", id, SEPARATOR, cells.join(SEPARATOR));
    }
}
