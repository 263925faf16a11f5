//! # rpl-logeval - Evaluation of RPL/TSCH testbed node logs
//!
//! Every node of an emulated or testbed RPL + TSCH network writes one text
//! log. This library reads those logs, extracts the per-node counters the
//! firmware prints as tagged key/value lines, splits them into the phases of
//! an experiment and derives delivery ratios, latency, queue loss, link
//! efficiency, scheduling utilization and duty cycle per node and phase.
//!
//! ## Architecture
//!
//! - `config`: run configuration structures and validation
//! - `config_loader`: YAML loading and command-line overrides
//! - `registry`: node registry discovered from a header log or declared
//! - `analysis`: log scanning, phase tables, derived metrics and reports
//! - `inspect`: slot-level analyses (residue time, neighbours, queue traces,
//!   in-slot timing, slot efficiency)
//! - `utils`: log reading, file naming and decimal rounding
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rpl_logeval::{analysis, config_loader, registry::NodeRegistry, utils::LogNaming};
//!
//! let config = config_loader::load_config(std::path::Path::new("eval.yaml"))?;
//! let naming = LogNaming::new(&config.log_dir, config.scheduler.clone(), config.iteration.clone());
//! let registry = NodeRegistry::load(&config, &naming)?;
//!
//! let tables = analysis::parse_all_logs(&config, &registry, &naming)?;
//! let evaluation = analysis::evaluate(&tables, &registry);
//! let info = analysis::RunInfo::new(&config, &registry);
//! analysis::print_report(&info, &evaluation, config.show_all);
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Log Format
//!
//! ```text
//! [HK-P: 3] tx_up 12 rx_up 11 from 2 lt_up_sum 480 | trailing text
//! [INFO: App] HCK rxu 7 x x b7a0
//! ```
//!
//! ## Error Handling
//!
//! Library entry points return `color_eyre::eyre::Result` with the offending
//! file and line attached as context. Typed causes are in
//! [`analysis::ParseError`] and [`config::ValidationError`].

pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod inspect;
pub mod registry;
pub mod utils;
